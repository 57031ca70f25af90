//! Serializable plan trees.
//!
//! A plan is data: composite and leaf nodes as tagged enums, interpreted by
//! [`crate::core::tick`] and certified by [`crate::core::verify`]. Plans are
//! never expressed as executable code; the producer hands over JSON and the
//! runtime walks it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of ticking a node.
///
/// `Running` is non-terminal: the node yielded and must be ticked again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
    Running,
}

impl Status {
    /// True for `Success` and `Failure`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::Running)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Success => "success",
            Status::Failure => "failure",
            Status::Running => "running",
        };
        f.write_str(label)
    }
}

/// One node of a plan tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// Ticks children left-to-right; fails or yields on the first
    /// non-success, succeeds when all children succeed.
    Sequence {
        name: String,
        #[serde(default = "default_memory")]
        memory: bool,
        children: Vec<Node>,
    },
    /// Ticks children left-to-right; succeeds or yields on the first
    /// non-failure, fails when all children fail.
    Selector {
        name: String,
        #[serde(default = "default_memory")]
        memory: bool,
        children: Vec<Node>,
    },
    /// Remaps the child's FAILURE to SUCCESS; everything else passes through.
    FailureIsSuccess { name: String, child: Box<Node> },
    Leaf(Leaf),
}

fn default_memory() -> bool {
    true
}

/// Leaf action declaration: the kind tag plus its parameters.
///
/// Runtime behaviour lives in `io::leaves`; this type only names the action
/// and carries what the producer decided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Leaf {
    /// Drive to a named destination.
    Move { name: String, destination: String },
    /// Say a message out loud.
    Speak { name: String, message: String },
    /// Ask and capture the user's answer (never fails).
    Ask { name: String, question: String },
    /// Compare one shared-context field against an expected value.
    Condition {
        name: String,
        field: String,
        expected: String,
    },
    /// Start a video call to a contact.
    Call { name: String, contact: String },
    /// Send a message to a contact over the notification channel.
    Alert {
        name: String,
        contact: String,
        message: String,
    },
    /// Run the fall-detection acquisition window.
    DetectFall { name: String },
    /// Summary reporter; always the last leaf of a plan.
    Remind { name: String },
}

impl Leaf {
    pub fn name(&self) -> &str {
        match self {
            Leaf::Move { name, .. }
            | Leaf::Speak { name, .. }
            | Leaf::Ask { name, .. }
            | Leaf::Condition { name, .. }
            | Leaf::Call { name, .. }
            | Leaf::Alert { name, .. }
            | Leaf::DetectFall { name }
            | Leaf::Remind { name } => name,
        }
    }
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Sequence { name, .. }
            | Node::Selector { name, .. }
            | Node::FailureIsSuccess { name, .. } => name,
            Node::Leaf(leaf) => leaf.name(),
        }
    }

    /// Leaf names in declaration order (pre-order walk).
    pub fn leaf_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_leaf_names(&mut names);
        names
    }

    fn collect_leaf_names(&self, names: &mut Vec<String>) {
        match self {
            Node::Sequence { children, .. } | Node::Selector { children, .. } => {
                for child in children {
                    child.collect_leaf_names(names);
                }
            }
            Node::FailureIsSuccess { child, .. } => child.collect_leaf_names(names),
            Node::Leaf(leaf) => names.push(leaf.name().to_string()),
        }
    }
}

/// Check the structural contract for executable plans.
///
/// The root must be a two-child memory sequence: the main branch wrapped in
/// `FailureIsSuccess`, then a `Remind` summary leaf, so the outcome report
/// runs no matter how the main branch resolves. Returns human-readable
/// findings; empty means conforming.
pub fn check_shape(root: &Node) -> Vec<String> {
    let mut findings = Vec::new();
    let Node::Sequence {
        memory, children, ..
    } = root
    else {
        findings.push("plan root must be a sequence".to_string());
        return findings;
    };
    if !memory {
        findings.push("plan root sequence must have memory".to_string());
    }
    if children.len() != 2 {
        findings.push(format!(
            "plan root must have exactly 2 children, found {}",
            children.len()
        ));
        return findings;
    }
    if !matches!(children[0], Node::FailureIsSuccess { .. }) {
        findings.push(format!(
            "first child of the root must be a failure_is_success wrapper, found '{}'",
            children[0].name()
        ));
    }
    if !matches!(children[1], Node::Leaf(Leaf::Remind { .. })) {
        findings.push(format!(
            "second child of the root must be a remind leaf, found '{}'",
            children[1].name()
        ));
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan_json() -> serde_json::Value {
        serde_json::json!({
            "type": "sequence",
            "name": "root",
            "children": [
                {
                    "type": "failure_is_success",
                    "name": "main_guard",
                    "child": {
                        "type": "sequence",
                        "name": "main",
                        "children": [
                            {"type": "leaf", "action": "move", "name": "go_kitchen", "destination": "kitchen"},
                            {"type": "leaf", "action": "speak", "name": "announce", "message": "dinner time"}
                        ]
                    }
                },
                {"type": "leaf", "action": "remind", "name": "report"}
            ]
        })
    }

    #[test]
    fn parses_tagged_plan_json() {
        let plan: Node = serde_json::from_value(sample_plan_json()).expect("parse");
        assert_eq!(plan.name(), "root");
        assert_eq!(plan.leaf_names(), vec!["go_kitchen", "announce", "report"]);
    }

    #[test]
    fn memory_defaults_to_true() {
        let plan: Node = serde_json::from_value(serde_json::json!({
            "type": "sequence", "name": "s", "children": []
        }))
        .expect("parse");
        match plan {
            Node::Sequence { memory, .. } => assert!(memory),
            _ => panic!("expected sequence"),
        }
    }

    #[test]
    fn conforming_root_shape_passes() {
        let plan: Node = serde_json::from_value(sample_plan_json()).expect("parse");
        assert!(check_shape(&plan).is_empty());
    }

    #[test]
    fn shape_rejects_missing_summary_leaf() {
        let plan: Node = serde_json::from_value(serde_json::json!({
            "type": "sequence",
            "name": "root",
            "children": [
                {
                    "type": "failure_is_success",
                    "name": "main_guard",
                    "child": {"type": "leaf", "action": "speak", "name": "a", "message": "m"}
                },
                {"type": "leaf", "action": "speak", "name": "b", "message": "m"}
            ]
        }))
        .expect("parse");
        let findings = check_shape(&plan);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].contains("remind"));
    }

    #[test]
    fn shape_rejects_selector_root() {
        let plan: Node = serde_json::from_value(serde_json::json!({
            "type": "selector", "name": "root", "children": []
        }))
        .expect("parse");
        assert_eq!(check_shape(&plan), vec!["plan root must be a sequence"]);
    }
}
