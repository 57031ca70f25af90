//! Wire payloads exchanged with the plan producer.
//!
//! Shapes here are a protocol surface shared with the producer and must not
//! drift. The `correction` flag travels as the literal string `"True"` or
//! `"False"`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

const FLAG_TRUE: &str = "True";
const FLAG_FALSE: &str = "False";

fn flag_word(value: bool) -> String {
    if value { FLAG_TRUE } else { FLAG_FALSE }.to_string()
}

/// Candidate submission from the plan producer.
///
/// `plan` is either a compiled plan tree (JSON object) or bare clarification
/// text (JSON string) when the producer could not compile one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub plan: Value,
    pub user: String,
    pub correction: String,
}

impl Candidate {
    pub fn new(plan: Value, user: &str, correction: bool) -> Self {
        Self {
            plan,
            user: user.to_string(),
            correction: flag_word(correction),
        }
    }

    pub fn is_correction(&self) -> bool {
        self.correction == FLAG_TRUE
    }
}

/// Record handed to the supervisor once a candidate is certified and stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeRecord {
    /// Artifact file name, `task_<priority>_<identifier>.json`.
    pub task: String,
    pub user: String,
    pub correction: String,
}

impl IntakeRecord {
    pub fn new(task: &str, user: &str, correction: bool) -> Self {
        Self {
            task: task.to_string(),
            user: user.to_string(),
            correction: flag_word(correction),
        }
    }

    pub fn is_correction(&self) -> bool {
        self.correction == FLAG_TRUE
    }
}

/// Tells the producer the finished plan's slot is free again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionNotice {
    pub plan: String,
}

impl Default for CompletionNotice {
    fn default() -> Self {
        Self {
            plan: "finished".to_string(),
        }
    }
}

/// Tells the producer a plan was rejected or failed, and for whom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureNotice {
    pub filename: String,
    pub error: String,
    pub user: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correction_flag_uses_title_case_words() {
        let record = IntakeRecord::new("task_2_0.json", "user", true);
        assert_eq!(record.correction, "True");
        assert!(record.is_correction());

        let record = IntakeRecord::new("task_2_0.json", "user", false);
        assert_eq!(record.correction, "False");
        assert!(!record.is_correction());
    }

    #[test]
    fn intake_record_wire_shape() {
        let record = IntakeRecord::new("task_3_7.json", "emergency", false);
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "task": "task_3_7.json",
                "user": "emergency",
                "correction": "False",
            })
        );
    }

    #[test]
    fn candidate_accepts_tree_or_clarification_text() {
        let tree: Candidate =
            serde_json::from_str(r#"{"plan": {"type": "sequence"}, "user": "user", "correction": "False"}"#)
                .expect("tree candidate");
        assert!(tree.plan.is_object());

        let text: Candidate =
            serde_json::from_str(r#"{"plan": "which kitchen?", "user": "user", "correction": "False"}"#)
                .expect("text candidate");
        assert_eq!(text.plan.as_str(), Some("which kitchen?"));
    }

    #[test]
    fn completion_notice_says_finished() {
        let value = serde_json::to_value(CompletionNotice::default()).expect("serialize");
        assert_eq!(value, serde_json::json!({"plan": "finished"}));
    }
}
