//! Plan artifact load/save helpers with schema + shape validation.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::{Validator, validator_for};
use serde_json::Value;

use crate::plan::{Node, check_shape};

/// Parse and schema-validate a plan file, without the executable-shape check.
///
/// This is the certification entry point: candidates that are valid trees but
/// not runnable plans still deserve a structured verdict rather than a parse
/// error.
pub fn read_candidate(path: &Path) -> Result<Node> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read plan {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse plan {}", path.display()))?;
    validate_schema(&value)?;
    let plan: Node = serde_json::from_value(value)
        .with_context(|| format!("deserialize plan {}", path.display()))?;
    Ok(plan)
}

/// Load a plan for execution: schema plus the executable root shape.
pub fn load_plan(path: &Path) -> Result<Node> {
    let plan = read_candidate(path)?;
    let findings = check_shape(&plan);
    if findings.is_empty() {
        return Ok(plan);
    }
    Err(anyhow!("plan shape check failed: {}", findings.join("; ")))
}

/// Write a plan to disk, pretty-printed with a trailing newline.
pub fn write_plan(path: &Path, plan: &Node) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(plan)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write plan {}", path.display()))
}

/// Remove a plan artifact. Already-gone is fine.
pub fn delete_artifact(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("delete plan {}", path.display())),
    }
}

/// File name for a queued plan artifact.
pub fn artifact_name(priority: u32, identifier: u64) -> String {
    format!("task_{priority}_{identifier}.json")
}

/// Recover `(priority, identifier)` from an artifact file name.
pub fn parse_artifact_name(name: &str) -> Option<(u32, u64)> {
    use std::sync::LazyLock;
    static NAME_RE: LazyLock<regex::Regex> =
        LazyLock::new(|| regex::Regex::new(r"^task_(\d+)_(\d+)\.json$").unwrap());

    let caps = NAME_RE.captures(name)?;
    let priority = caps[1].parse().ok()?;
    let identifier = caps[2].parse().ok()?;
    Some((priority, identifier))
}

fn validate_schema(plan: &Value) -> Result<()> {
    use std::sync::LazyLock;
    static VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
        let schema: Value = serde_json::from_str(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../schemas/plan/v1.schema.json"
        )))
        .unwrap();
        validator_for(&schema).unwrap()
    });

    if !VALIDATOR.is_valid(plan) {
        let messages = VALIDATOR
            .iter_errors(plan)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "plan schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}
