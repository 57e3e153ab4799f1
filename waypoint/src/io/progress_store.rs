//! Durable progress records, one per journey.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::debug;

use super::init::WaypointPaths;
use crate::core::types::ProgressRecord;

/// Whole-record persistence for journey progress.
pub trait ProgressStore {
    /// `Ok(None)` when the journey has no record.
    fn read(&self, journey_id: &str) -> Result<Option<ProgressRecord>>;
    /// Replace the record for `record.journey_id`.
    fn write(&self, record: &ProgressRecord) -> Result<()>;
    /// Remove the record; clearing a missing record is not an error.
    fn clear(&self, journey_id: &str) -> Result<()>;
}

/// JSON files under `.waypoint/state/journeys/`.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    paths: WaypointPaths,
}

impl FileProgressStore {
    pub fn new(paths: WaypointPaths) -> Self {
        Self { paths }
    }

    fn path(&self, journey_id: &str) -> PathBuf {
        self.paths.record_path(journey_id)
    }
}

impl ProgressStore for FileProgressStore {
    fn read(&self, journey_id: &str) -> Result<Option<ProgressRecord>> {
        let path = self.path(journey_id);
        debug!(path = %path.display(), journey_id, "loading progress record");
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("read progress {}", path.display()));
            }
        };
        let record: ProgressRecord = serde_json::from_str(&contents)
            .with_context(|| format!("parse progress {}", path.display()))?;
        if record.journey_id != journey_id {
            bail!(
                "progress {} belongs to journey '{}', not '{}'",
                path.display(),
                record.journey_id,
                journey_id
            );
        }
        debug!(
            last_served = ?record.last_served_sequence,
            completed = record.completed_count,
            status = record.status.as_str(),
            "progress record loaded"
        );
        Ok(Some(record))
    }

    /// Atomically write the record (temp file + rename).
    fn write(&self, record: &ProgressRecord) -> Result<()> {
        let path = self.path(&record.journey_id);
        debug!(
            path = %path.display(),
            journey_id = %record.journey_id,
            last_served = ?record.last_served_sequence,
            "writing progress record"
        );
        let mut buf = serde_json::to_string_pretty(record)?;
        buf.push('\n');
        super::write_atomic(&path, "json.tmp", &buf)
    }

    fn clear(&self, journey_id: &str) -> Result<()> {
        let path = self.path(journey_id);
        debug!(path = %path.display(), journey_id, "clearing progress record");
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("remove progress {}", path.display())),
        }
    }
}
