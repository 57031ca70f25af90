//! Pending-plan queue with the dispatch order.
//!
//! Corrections outrank everything, then higher priority, then submission
//! order (identifiers are allocated monotonically, so ascending identifier
//! is first-in first-out within a rank).

use std::cmp::Reverse;
use std::path::PathBuf;

/// One admitted plan awaiting or undergoing execution.
#[derive(Debug)]
pub struct Plan {
    pub identifier: u64,
    pub priority: u32,
    pub owner: String,
    /// Stored plan file under the artifact directory.
    pub artifact: PathBuf,
    pub correction: bool,
}

impl Plan {
    fn rank(&self) -> (Reverse<bool>, Reverse<u32>, u64) {
        (Reverse(self.correction), Reverse(self.priority), self.identifier)
    }
}

#[derive(Debug, Default)]
pub struct PlanQueue {
    plans: Vec<Plan>,
}

impl PlanQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a plan and restore the dispatch order.
    pub fn insert(&mut self, plan: Plan) {
        self.plans.push(plan);
        self.plans.sort_by_key(Plan::rank);
    }

    /// Next plan in dispatch order, if any.
    pub fn head(&self) -> Option<&Plan> {
        self.plans.first()
    }

    pub fn remove(&mut self, identifier: u64) -> Option<Plan> {
        let index = self.plans.iter().position(|p| p.identifier == identifier)?;
        Some(self.plans.remove(index))
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(identifier: u64, priority: u32, correction: bool) -> Plan {
        Plan {
            identifier,
            priority,
            owner: "user".to_string(),
            artifact: PathBuf::from(format!("task_{priority}_{identifier}.json")),
            correction,
        }
    }

    /// Drain the queue front to back.
    fn order(queue: &mut PlanQueue) -> Vec<u64> {
        let mut identifiers = Vec::new();
        while let Some(head) = queue.head() {
            let identifier = head.identifier;
            queue.remove(identifier);
            identifiers.push(identifier);
        }
        identifiers
    }

    #[test]
    fn corrections_outrank_higher_priority() {
        let mut queue = PlanQueue::new();
        queue.insert(plan(0, 1, false));
        queue.insert(plan(1, 3, false));
        queue.insert(plan(2, 1, true));
        assert_eq!(order(&mut queue), vec![2, 1, 0]);
    }

    #[test]
    fn equal_rank_is_first_in_first_out() {
        let mut queue = PlanQueue::new();
        queue.insert(plan(4, 2, false));
        queue.insert(plan(7, 2, false));
        queue.insert(plan(5, 2, false));
        assert_eq!(order(&mut queue), vec![4, 5, 7]);
    }

    #[test]
    fn remove_takes_the_named_plan_only() {
        let mut queue = PlanQueue::new();
        queue.insert(plan(0, 1, false));
        queue.insert(plan(1, 2, false));
        let removed = queue.remove(0).expect("removed");
        assert_eq!(removed.identifier, 0);
        assert_eq!(queue.len(), 1);
        assert_eq!(order(&mut queue), vec![1]);
        assert!(queue.remove(9).is_none());
        assert!(queue.is_empty());
    }
}
