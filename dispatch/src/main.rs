//! Site dispatcher CLI.
//!
//! `serve` runs the intake gate and the execution supervisor against a
//! filesystem inbox; `submit` packages a plan file as a candidate for a
//! running `serve`.

mod cli;
mod config;
mod gate;
mod launch;
mod notices;
mod queue;
mod supervise;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "dispatch",
    version,
    about = "Certifies, queues and supervises compiled robot plans"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gate and supervisor loop until stopped.
    Serve {
        /// Dispatcher configuration file.
        #[arg(long, default_value = "dispatch.toml")]
        config: PathBuf,
    },
    /// Drop a candidate plan into the serve inbox.
    Submit {
        /// Compiled plan file to submit.
        plan: PathBuf,
        /// Submitting owner; decides the queue priority.
        #[arg(long, default_value = "user")]
        owner: String,
        /// Mark the candidate as a correction of a failed plan.
        #[arg(long)]
        correction: bool,
        /// Dispatcher configuration file.
        #[arg(long, default_value = "dispatch.toml")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    pilot::logging::init();
    let parsed = Cli::parse();
    match parsed.command {
        Command::Serve { config } => cli::serve(&config),
        Command::Submit {
            plan,
            owner,
            correction,
            config,
        } => cli::submit(&plan, &owner, correction, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve_with_default_config() {
        let parsed = Cli::parse_from(["dispatch", "serve"]);
        match parsed.command {
            Command::Serve { config } => {
                assert_eq!(config, PathBuf::from("dispatch.toml"));
            }
            Command::Submit { .. } => panic!("expected serve"),
        }
    }

    #[test]
    fn parse_submit_with_owner_and_correction() {
        let parsed = Cli::parse_from([
            "dispatch",
            "submit",
            "plan.json",
            "--owner",
            "emergency",
            "--correction",
        ]);
        match parsed.command {
            Command::Submit {
                plan,
                owner,
                correction,
                config,
            } => {
                assert_eq!(plan, PathBuf::from("plan.json"));
                assert_eq!(owner, "emergency");
                assert!(correction);
                assert_eq!(config, PathBuf::from("dispatch.toml"));
            }
            Command::Serve { .. } => panic!("expected submit"),
        }
    }
}
