//! Exhaustive structural certification of candidate plans.
//!
//! Plans arrive from a generative producer, so shape and leaf identity vary
//! per plan and nothing can be proven statically. Instead every leaf is
//! replaced by a replay stub and the tree is ticked under all 2^n
//! success/failure assignments. A plan is certified only when no leaf name
//! repeats and every declared leaf is visited under at least one assignment.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::tick::{Runtime, Tick};
use crate::plan::{Node, Status};

/// Upper bound on ticks per synthetic run. Replay leaves resolve on their
/// first tick, so this only guards against a tree that loops under RUNNING.
pub const TICK_BUDGET: usize = 20;

/// Largest leaf count the 2^n enumeration will take on.
pub const MAX_LEAVES: usize = 12;

/// Outcome of a certification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
}

/// Structured rejection causes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Leaf names declared more than once, sorted.
    DuplicateNames(Vec<String>),
    /// Declared leaves never visited under any outcome assignment, sorted.
    UnreachableLeaves(Vec<String>),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::DuplicateNames(names) => {
                write!(f, "duplicate leaf names: {}", names.join(", "))
            }
            Rejection::UnreachableLeaves(names) => {
                write!(f, "unreachable leaves: {}", names.join(", "))
            }
        }
    }
}

struct Replay {
    name: String,
    outcome: Status,
    ticks: u32,
}

impl Tick for Replay {
    fn initialise(&mut self) {}

    fn update(&mut self) -> Status {
        self.ticks += 1;
        self.outcome
    }
}

/// Certify a candidate plan.
///
/// `Err` covers plans the enumeration cannot take on at all; a [`Verdict`]
/// is a completed check, accepted or rejected.
pub fn certify(plan: &Node) -> Result<Verdict, String> {
    let declared = plan.leaf_names();
    let n = declared.len();
    if n == 0 {
        return Err("plan declares no leaves".to_string());
    }
    if n > MAX_LEAVES {
        return Err(format!(
            "plan declares {n} leaves; the exhaustive check caps at {MAX_LEAVES}"
        ));
    }

    let duplicates = duplicate_names(&declared);
    if !duplicates.is_empty() {
        return Ok(Verdict::Rejected(Rejection::DuplicateNames(duplicates)));
    }

    let mut visited = BTreeSet::new();
    for assignment in 0..(1usize << n) {
        let mut position = 0;
        let mut runtime = Runtime::build(plan, &mut |leaf| {
            let outcome = if assignment & (1 << position) == 0 {
                Status::Success
            } else {
                Status::Failure
            };
            position += 1;
            Replay {
                name: leaf.name().to_string(),
                outcome,
                ticks: 0,
            }
        });

        for _ in 0..TICK_BUDGET {
            if runtime.tick().is_terminal() {
                break;
            }
        }

        runtime.for_each_leaf(&mut |leaf| {
            if leaf.ticks > 0 {
                visited.insert(leaf.name.clone());
            }
        });
    }

    let unreachable: Vec<String> = declared
        .iter()
        .filter(|name| !visited.contains(*name))
        .cloned()
        .collect();
    if unreachable.is_empty() {
        Ok(Verdict::Accepted)
    } else {
        Ok(Verdict::Rejected(Rejection::UnreachableLeaves(unreachable)))
    }
}

fn duplicate_names(declared: &[String]) -> Vec<String> {
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for name in declared {
        *counts.entry(name).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name.to_string())
        .collect()
}
