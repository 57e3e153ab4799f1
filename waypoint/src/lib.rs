//! Resumable, ordered journeys through instructional pieces.
//!
//! A journey is a declared sequence of pieces served one at a time. Progress
//! is persisted so a journey continues correctly after an interruption,
//! restart or crash. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (sequence model, resolution,
//!   audit line format). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (declarations, progress store,
//!   audit trail, config). Behind traits so tests can substitute memory doubles.
//!
//! Orchestration modules ([`controller`], [`surface`]) coordinate core logic
//! with I/O to implement the journey operations and the CLI.

pub mod controller;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod journey;
pub mod logging;
pub mod surface;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
