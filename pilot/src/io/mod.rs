//! Side-effecting layer: configuration, messaging, shared state, and the
//! leaf state machines that drive the robot.

pub mod blackboard;
pub mod bus;
pub mod config;
pub mod leaves;
pub mod notify;
pub mod plan_store;
