//! Plan execution: wire up the shared context and drive the tick loop.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, instrument};

use crate::core::tick::{Runtime, Tick};
use crate::io::blackboard::{Blackboard, FailureRecord, pump_signals};
use crate::io::bus::{Bus, signal_topic};
use crate::io::config::RobotConfig;
use crate::io::leaves::{Action, Ctx};
use crate::io::notify::{Notifier, SmtpNotifier};
use crate::plan::{Node, Status};

/// What one run produced.
pub struct RunOutcome {
    pub status: Status,
    pub ticks: u64,
    pub failure: Option<FailureRecord>,
}

/// Execute a plan to its terminal status.
///
/// Runs until the root reports SUCCESS or FAILURE; the caller bounds the run
/// from outside by process supervision, not by a tick budget.
#[instrument(skip_all, fields(plan = %plan.name()))]
pub fn execute_plan(plan: &Node, config: RobotConfig) -> Result<RunOutcome> {
    let bus = Arc::new(Bus::new());
    let board = Arc::new(Blackboard::new());
    let notifier: Arc<dyn Notifier> = Arc::new(SmtpNotifier::from_config(&config.smtp)?);
    let config = Arc::new(config);

    // Feed incoming robot signals into the shared context. The pump ends on
    // its own once the bus drops with the process.
    let signal_prefix = signal_topic(&config.topic_header, "");
    let signals = bus.subscribe(&signal_prefix);
    {
        let board = board.clone();
        thread::spawn(move || pump_signals(&board, &signal_prefix, &signals));
    }

    let ctx = Ctx {
        bus,
        board: board.clone(),
        notifier,
        config: config.clone(),
    };
    let mut runtime = Runtime::build(plan, &mut |leaf| Action::from_leaf(leaf, ctx.clone()));

    let interval = Duration::from_millis(config.tick_interval_ms);
    let mut ticks = 0u64;
    let status = loop {
        let status = runtime.tick();
        ticks += 1;
        // Live status stream: one line per tick, relayed verbatim by the
        // dispatcher into the operator log.
        println!("tick {ticks}: {status}");
        if status.is_terminal() {
            break status;
        }
        thread::sleep(interval);
    };

    let failure = board.failure();
    match &failure {
        Some(record) => info!(%status, ticks, failed_leaf = %record.leaf, "plan finished"),
        None => info!(%status, ticks, "plan finished"),
    }
    Ok(RunOutcome {
        status,
        ticks,
        failure,
    })
}
