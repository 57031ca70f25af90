//! Tick evaluation over runtime trees.
//!
//! [`Runtime`] mirrors the plan structure but owns the per-composite resume
//! cursor and the leaf activation latch. It is generic over the leaf
//! behaviour so the verifier can run replay stubs through the exact
//! composite semantics the real leaves get.

use crate::plan::{Leaf, Node, Status};

/// Behaviour of a leaf under tick.
pub trait Tick {
    /// Fires exactly once per activation, before the first `update`.
    fn initialise(&mut self);
    /// Fires every tick while the leaf is active.
    fn update(&mut self) -> Status;
}

/// Runtime node: plan structure plus tick state.
pub enum Runtime<L> {
    Sequence {
        memory: bool,
        cursor: usize,
        children: Vec<Runtime<L>>,
    },
    Selector {
        memory: bool,
        cursor: usize,
        children: Vec<Runtime<L>>,
    },
    FailureIsSuccess {
        child: Box<Runtime<L>>,
    },
    Leaf {
        leaf: L,
        active: bool,
    },
}

impl<L: Tick> Runtime<L> {
    /// Build a runtime tree from a plan, instantiating each leaf through
    /// `make` in declaration order.
    pub fn build<F>(node: &Node, make: &mut F) -> Self
    where
        F: FnMut(&Leaf) -> L,
    {
        match node {
            Node::Sequence {
                memory, children, ..
            } => Runtime::Sequence {
                memory: *memory,
                cursor: 0,
                children: children.iter().map(|c| Self::build(c, make)).collect(),
            },
            Node::Selector {
                memory, children, ..
            } => Runtime::Selector {
                memory: *memory,
                cursor: 0,
                children: children.iter().map(|c| Self::build(c, make)).collect(),
            },
            Node::FailureIsSuccess { child, .. } => Runtime::FailureIsSuccess {
                child: Box::new(Self::build(child, make)),
            },
            Node::Leaf(leaf) => Runtime::Leaf {
                leaf: make(leaf),
                active: false,
            },
        }
    }

    /// Tick this node once.
    pub fn tick(&mut self) -> Status {
        match self {
            Runtime::Sequence {
                memory,
                cursor,
                children,
            } => {
                let start = if *memory { *cursor } else { 0 };
                for (index, child) in children.iter_mut().enumerate().skip(start) {
                    match child.tick() {
                        Status::Success => {}
                        status => {
                            // Resume here on the next external tick.
                            *cursor = index;
                            return status;
                        }
                    }
                }
                *cursor = 0;
                Status::Success
            }
            Runtime::Selector {
                memory,
                cursor,
                children,
            } => {
                let start = if *memory { *cursor } else { 0 };
                for (index, child) in children.iter_mut().enumerate().skip(start) {
                    match child.tick() {
                        Status::Failure => {}
                        status => {
                            *cursor = index;
                            return status;
                        }
                    }
                }
                *cursor = 0;
                Status::Failure
            }
            Runtime::FailureIsSuccess { child } => match child.tick() {
                Status::Failure => Status::Success,
                status => status,
            },
            Runtime::Leaf { leaf, active } => {
                if !*active {
                    leaf.initialise();
                    *active = true;
                }
                let status = leaf.update();
                if status.is_terminal() {
                    *active = false;
                }
                status
            }
        }
    }

    /// Visit every leaf in declaration order.
    pub fn for_each_leaf(&self, visit: &mut impl FnMut(&L)) {
        match self {
            Runtime::Sequence { children, .. } | Runtime::Selector { children, .. } => {
                for child in children {
                    child.for_each_leaf(visit);
                }
            }
            Runtime::FailureIsSuccess { child } => child.for_each_leaf(visit),
            Runtime::Leaf { leaf, .. } => visit(leaf),
        }
    }
}
