//! Shared deterministic types for journey core logic.
//!
//! These types define stable contracts between core components and the
//! persisted progress format. They must not depend on external state or I/O.

use serde::{Deserialize, Serialize};

/// Lifecycle of a single journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JourneyStatus {
    NotStarted,
    InProgress,
    Complete,
}

impl JourneyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::InProgress => "in-progress",
            Self::Complete => "complete",
        }
    }
}

/// Durable progress for one journey (`.waypoint/state/journeys/<key>.json`).
///
/// Always written as a whole record recomputed from the journey facts; there
/// is no partial update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub journey_id: String,
    pub domain: String,
    pub version: String,
    pub workflow_name: String,
    /// Sequence number of the last piece handed out, if any.
    pub last_served_sequence: Option<i64>,
    pub total_pieces: usize,
    pub last_served_name: String,
    pub completed_count: usize,
    pub status: JourneyStatus,
}

/// Read-only progress view derived from the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub domain: String,
    pub version: String,
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,
    pub entry_point: String,
}

/// `completed / total * 100`, or `0.0` for an empty journey.
pub fn completion_percentage(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    completed as f64 / total as f64 * 100.0
}
