//! Deterministic, pure logic shared by the journey engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod audit_format;
pub mod invariants;
pub mod resolver;
pub mod sequence;
pub mod types;
