//! CLI tests for `pilot verify`.
//!
//! Spawns the pilot binary and checks the verdict file protocol: exit codes
//! plus the written report.

use std::process::Command;

use pilot::certify::{Report, read_report};
use pilot::exit_codes;
use pilot::io::plan_store::write_plan;
use pilot::test_support::{sequence, speak_leaf, standard_plan};

#[test]
fn verify_accepts_a_conforming_plan() {
    let temp = tempfile::tempdir().expect("tempdir");
    let plan_path = temp.path().join("task_1_0.json");
    let result_path = temp.path().join("result.json");

    let plan = standard_plan(sequence("main", vec![speak_leaf("announce", "hello")]));
    write_plan(&plan_path, &plan).expect("write plan");

    let status = Command::new(env!("CARGO_BIN_EXE_pilot"))
        .arg("verify")
        .arg(&plan_path)
        .arg("--result")
        .arg(&result_path)
        .status()
        .expect("pilot verify");

    assert_eq!(status.code(), Some(exit_codes::OK));
    assert_eq!(read_report(&result_path).expect("report"), Report::Passed);
}

#[test]
fn verify_rejects_duplicate_leaf_names() {
    let temp = tempfile::tempdir().expect("tempdir");
    let plan_path = temp.path().join("task_1_0.json");
    let result_path = temp.path().join("result.json");

    let plan = standard_plan(sequence(
        "main",
        vec![speak_leaf("echo", "a"), speak_leaf("echo", "b")],
    ));
    write_plan(&plan_path, &plan).expect("write plan");

    let status = Command::new(env!("CARGO_BIN_EXE_pilot"))
        .arg("verify")
        .arg(&plan_path)
        .arg("--result")
        .arg(&result_path)
        .status()
        .expect("pilot verify");

    assert_eq!(status.code(), Some(exit_codes::FAILED));
    match read_report(&result_path).expect("report") {
        Report::Failed { error } => assert!(error.contains("duplicate leaf names")),
        Report::Passed => panic!("expected a failed report"),
    }
}
