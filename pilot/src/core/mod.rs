//! Deterministic plan logic.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! plan trees and return deterministic outputs suitable for tests.

pub mod tick;
pub mod verify;
