//! Companion robot plan runner CLI.
//!
//! `run` executes one plan artifact to its terminal status; `verify`
//! certifies a candidate and writes a verdict report. Exit codes are part of
//! the contract with the dispatcher, see [`pilot::exit_codes`].

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use pilot::certify::{Report, certify_file};
use pilot::io::config::load_config;
use pilot::io::plan_store::load_plan;
use pilot::plan::Status;
use pilot::run::execute_plan;
use pilot::{exit_codes, logging};

#[derive(Parser)]
#[command(
    name = "pilot",
    version,
    about = "Tick-driven plan runner for a companion robot"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a plan file to its terminal status.
    Run {
        /// Plan artifact to execute.
        plan: PathBuf,
        /// Robot configuration file.
        #[arg(long, default_value = "robot.toml")]
        config: PathBuf,
    },
    /// Certify a candidate plan and write a verdict report.
    Verify {
        /// Candidate plan file.
        plan: PathBuf,
        /// Where to write the verdict report.
        #[arg(long, default_value = "result.json")]
        result: PathBuf,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::FAILED);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run { plan, config } => cmd_run(&plan, &config),
        Command::Verify { plan, result } => cmd_verify(&plan, &result),
    }
}

fn cmd_run(plan_path: &Path, config_path: &Path) -> Result<i32> {
    let config = load_config(config_path)?;
    let plan = load_plan(plan_path)?;
    let outcome = execute_plan(&plan, config)?;
    if let Some(record) = &outcome.failure {
        println!("leaf '{}' failed: {}", record.leaf, record.message);
    }
    println!("{}", outcome.status);
    Ok(match outcome.status {
        Status::Success => exit_codes::OK,
        _ => exit_codes::FAILED,
    })
}

fn cmd_verify(plan_path: &Path, result_path: &Path) -> Result<i32> {
    let report = certify_file(plan_path, result_path)?;
    Ok(match report {
        Report::Passed => exit_codes::OK,
        Report::Failed { .. } => exit_codes::FAILED,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_default_config() {
        let cli = Cli::parse_from(["pilot", "run", "task_1_0.json"]);
        match cli.command {
            Command::Run { plan, config } => {
                assert_eq!(plan, PathBuf::from("task_1_0.json"));
                assert_eq!(config, PathBuf::from("robot.toml"));
            }
            Command::Verify { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn parse_verify_with_result_path() {
        let cli = Cli::parse_from(["pilot", "verify", "plan.json", "--result", "out.json"]);
        match cli.command {
            Command::Verify { plan, result } => {
                assert_eq!(plan, PathBuf::from("plan.json"));
                assert_eq!(result, PathBuf::from("out.json"));
            }
            Command::Run { .. } => panic!("expected verify"),
        }
    }
}
