//! Deterministic selection of the next piece to serve.

use std::collections::{BTreeSet, HashSet};

use crate::core::sequence::SequenceModel;
use crate::core::types::ProgressRecord;

/// Result of resolving a journey position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Next(i64),
    Done,
}

/// How the current position is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveStrategy {
    /// Durable counter from the progress store. `None` means nothing served yet.
    Counter { last_served: Option<i64> },
    /// Completed set rebuilt from the audit trail when no record is available.
    Reconstructed { completed: BTreeSet<i64> },
}

impl ResolveStrategy {
    /// Prefer the stored counter; only build the completed set when there is
    /// no usable record.
    pub fn select<F>(record: Option<&ProgressRecord>, reconstruct: F) -> Self
    where
        F: FnOnce() -> BTreeSet<i64>,
    {
        match record {
            Some(record) => Self::Counter {
                last_served: record.last_served_sequence,
            },
            None => Self::Reconstructed {
                completed: reconstruct(),
            },
        }
    }

    /// The position once `served` has been handed out.
    pub fn after_serving(&self, served: i64) -> Self {
        match self {
            Self::Counter { .. } => Self::Counter {
                last_served: Some(served),
            },
            Self::Reconstructed { completed } => {
                let mut completed = completed.clone();
                completed.insert(served);
                Self::Reconstructed { completed }
            }
        }
    }

    /// Number of pieces already served before anything new is handed out.
    pub fn served_so_far(&self, model: &SequenceModel) -> usize {
        match self {
            Self::Counter { last_served: None } => 0,
            Self::Counter {
                last_served: Some(last),
            } => model
                .all_pieces_sorted()
                .iter()
                .take_while(|piece| piece.sequence_number <= *last)
                .count(),
            Self::Reconstructed { completed } => completed.len(),
        }
    }
}

/// Compute the next sequence number to serve, ascending numeric order only.
pub fn resolve_next(model: &SequenceModel, strategy: &ResolveStrategy) -> Resolution {
    let mut pieces = model.all_pieces_sorted().iter();
    let found = match strategy {
        ResolveStrategy::Counter { last_served: None } => pieces.next(),
        ResolveStrategy::Counter {
            last_served: Some(last),
        } => pieces.find(|piece| piece.sequence_number > *last),
        ResolveStrategy::Reconstructed { completed } => {
            pieces.find(|piece| !completed.contains(&piece.sequence_number))
        }
    };
    match found {
        Some(piece) => Resolution::Next(piece.sequence_number),
        None => Resolution::Done,
    }
}

/// Map recovered piece names back to sequence numbers.
///
/// A name declared more than once maps to every piece carrying it.
pub fn completed_numbers(model: &SequenceModel, names: &[String]) -> BTreeSet<i64> {
    let names: HashSet<&str> = names.iter().map(String::as_str).collect();
    model
        .all_pieces_sorted()
        .iter()
        .filter(|piece| names.contains(piece.name.as_str()))
        .map(|piece| piece.sequence_number)
        .collect()
}
