//! End-to-end dispatcher tests over scripted runner and verifier commands.
//!
//! `serve` is spawned against a throwaway workspace; plans go in through
//! `submit` and the outcome is read back from the artifact and log
//! directories.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use pilot::io::plan_store::write_plan;
use pilot::test_support::{sequence, speak_leaf, standard_plan};

struct Serve(Child);

impl Drop for Serve {
    fn drop(&mut self) {
        self.0.kill().ok();
        self.0.wait().ok();
    }
}

fn write_dispatch_config(root: &Path, run_script: &str, verify_script: &str) -> PathBuf {
    let config_path = root.join("dispatch.toml");
    let contents = format!(
        r#"poll_interval_ms = 25
monitor_wait_ms = 10000
grace_ms = 500
verify_wait_ms = 5000
robot_topic_header = "companion/unit0"

[launch]
command = ["sh", "{run}"]

[verify]
command = ["sh", "{verify}"]

[paths]
inbox_dir = "{inbox}"
artifact_dir = "{artifacts}"
log_dir = "{logs}"
"#,
        run = root.join(run_script).display(),
        verify = root.join(verify_script).display(),
        inbox = root.join("inbox").display(),
        artifacts = root.join("artifacts").display(),
        logs = root.join("logs").display(),
    );
    fs::write(&config_path, contents).expect("write config");
    config_path
}

fn stage_plan(root: &Path) -> PathBuf {
    let plan_path = root.join("plan.json");
    let plan = standard_plan(sequence("main", vec![speak_leaf("greet", "hello")]));
    write_plan(&plan_path, &plan).expect("write plan");
    plan_path
}

fn spawn_serve(config_path: &Path) -> Serve {
    let child = Command::new(env!("CARGO_BIN_EXE_dispatch"))
        .arg("serve")
        .arg("--config")
        .arg(config_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn serve");
    Serve(child)
}

fn submit(plan_path: &Path, config_path: &Path) {
    let output = Command::new(env!("CARGO_BIN_EXE_dispatch"))
        .arg("submit")
        .arg(plan_path)
        .arg("--config")
        .arg(config_path)
        .output()
        .expect("run submit");
    assert!(output.status.success(), "submit failed: {output:?}");
}

fn wait_for<F: Fn() -> bool>(what: &str, condition: F) {
    let started = Instant::now();
    while started.elapsed() < Duration::from_secs(10) {
        if condition() {
            return;
        }
        thread::sleep(Duration::from_millis(25));
    }
    panic!("timed out waiting for {what}");
}

#[test]
fn accepted_plan_runs_to_completion() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    fs::write(root.join("run.sh"), "echo \"running $1\"\nexit 0\n").expect("run script");
    fs::write(
        root.join("verify.sh"),
        "printf '{\"result\": \"PASSED\"}\\n' > \"$3\"\n",
    )
    .expect("verify script");
    let config_path = write_dispatch_config(root, "run.sh", "verify.sh");
    let plan_path = stage_plan(root);

    let _serve = spawn_serve(&config_path);
    submit(&plan_path, &config_path);

    let log_path = root.join("logs").join("task_2_0.log");
    let artifact = root.join("artifacts").join("task_2_0.json");
    wait_for("plan completion", || log_path.exists() && !artifact.exists());

    let log = fs::read_to_string(&log_path).expect("read log");
    assert!(log.contains("running"), "log was: {log}");
    // The candidate was renamed on admission, not left behind.
    assert!(!root.join("artifacts").join("candidate_0.json").exists());
    // The inbox file was consumed.
    let inbox_left = fs::read_dir(root.join("inbox")).expect("read inbox").count();
    assert_eq!(inbox_left, 0);
}

#[test]
fn rejected_plan_is_retained_and_never_launched() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    fs::write(root.join("run.sh"), "exit 0\n").expect("run script");
    fs::write(
        root.join("verify.sh"),
        "printf '{\"result\": \"FAILED\", \"error\": \"tree rejected\"}\\n' > \"$3\"\n",
    )
    .expect("verify script");
    let config_path = write_dispatch_config(root, "run.sh", "verify.sh");
    let plan_path = stage_plan(root);

    let _serve = spawn_serve(&config_path);
    submit(&plan_path, &config_path);

    let candidate = root.join("artifacts").join("candidate_0.json");
    wait_for("candidate rejection", || candidate.exists());

    // Give the loop a few more cycles; nothing may be admitted or launched.
    thread::sleep(Duration::from_millis(300));
    assert!(candidate.exists());
    assert!(!root.join("artifacts").join("task_2_0.json").exists());
    assert!(!root.join("logs").join("task_2_0.log").exists());
}
