//! Error kinds returned across the journey operation boundary.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JourneyError {
    #[error("invalid declaration: {0}")]
    InvalidDeclaration(String),
    #[error("duplicate sequence number {number} ('{first}' and '{second}')")]
    DuplicateSequenceNumber {
        number: i64,
        first: String,
        second: String,
    },
    #[error("unknown journey '{0}' (start it first)")]
    UnknownJourney(String),
    #[error("declaration for '{domain}' contains no pieces")]
    EmptySequence { domain: String },
    /// A resolved sequence number has no piece in the loaded model.
    #[error("no piece with sequence number {0}")]
    PieceNotFound(i64),
    #[error("progress store unavailable: {0}")]
    StoreUnavailable(String),
}

impl JourneyError {
    /// Wrap an `anyhow` chain from the I/O layer as a store failure.
    pub fn store(err: &anyhow::Error) -> Self {
        Self::StoreUnavailable(format!("{err:#}"))
    }
}
