//! Append-only audit trail under `.waypoint/audit/`.
//!
//! The trail is product output: every start, served piece, completion and
//! reset is appended as one v1 line (see [`crate::core::audit_format`]).
//! It doubles as the recovery source when a progress record is missing.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::debug;

use super::init::WaypointPaths;
use crate::core::audit_format::{AuditEntry, EpochBoundary, completed_labels, parse_line};

/// Write side of the audit trail.
pub trait AuditTrail {
    fn append(&self, journey_id: &str, entry: &AuditEntry) -> Result<()>;
}

/// Recovers the names of pieces already served in the current epoch.
pub trait CompletedSetSource {
    fn completed_names(&self, journey_id: &str, domain: &str, version: &str) -> Result<Vec<String>>;
}

/// One log file per journey.
#[derive(Debug, Clone)]
pub struct FileAuditTrail {
    paths: WaypointPaths,
    boundary: EpochBoundary,
}

impl FileAuditTrail {
    pub fn new(paths: WaypointPaths, boundary: EpochBoundary) -> Self {
        Self { paths, boundary }
    }

    /// Raw lines of a journey's trail, oldest first.
    pub fn read_lines(&self, journey_id: &str) -> Result<Vec<String>> {
        let path = self.paths.audit_path(journey_id);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(contents.lines().map(str::to_string).collect()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err).with_context(|| format!("read audit {}", path.display())),
        }
    }
}

impl AuditTrail for FileAuditTrail {
    fn append(&self, journey_id: &str, entry: &AuditEntry) -> Result<()> {
        let path = self.paths.audit_path(journey_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let line = format!("{}\n", entry.render_at(Utc::now()));
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open audit {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append audit {}", path.display()))?;
        debug!(path = %path.display(), status = entry.status.as_str(), label = %entry.label, "audit entry appended");
        Ok(())
    }
}

impl CompletedSetSource for FileAuditTrail {
    fn completed_names(&self, journey_id: &str, domain: &str, version: &str) -> Result<Vec<String>> {
        let lines = self.read_lines(journey_id)?;
        let total = lines.len();
        let entries: Vec<AuditEntry> = lines.iter().filter_map(|line| parse_line(line)).collect();
        if entries.len() < total {
            debug!(
                skipped = total - entries.len(),
                journey_id,
                "ignored unrecognized audit lines"
            );
        }
        Ok(completed_labels(entries, domain, version, self.boundary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audit_format::{AuditStatus, START_LABEL};

    fn trail(boundary: EpochBoundary) -> (tempfile::TempDir, FileAuditTrail) {
        let temp = tempfile::tempdir().expect("tempdir");
        let trail = FileAuditTrail::new(WaypointPaths::new(temp.path()), boundary);
        (temp, trail)
    }

    #[test]
    fn appends_timestamped_lines_in_order() {
        let (_temp, trail) = trail(EpochBoundary::StartOnly);
        trail
            .append("j", &AuditEntry::new("course", "v01", START_LABEL, AuditStatus::Start))
            .expect("append start");
        trail
            .append(
                "j",
                &AuditEntry::new("course", "v01", "a.md", AuditStatus::Served).with_step_info("step 1/2"),
            )
            .expect("append served");

        let lines = trail.read_lines("j").expect("read");
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("@waypoint:course:v01(workflow) START"));
        assert!(lines[1].ends_with("@waypoint:course:v01(a.md) SERVED step 1/2"));
        let (timestamp, _) = lines[0].split_once(' ').expect("timestamp");
        assert!(timestamp.ends_with('Z'), "timestamp should be UTC: {timestamp}");
    }

    #[test]
    fn missing_trail_recovers_nothing() {
        let (_temp, trail) = trail(EpochBoundary::StartOnly);
        assert!(trail.completed_names("j", "course", "v01").expect("names").is_empty());
    }

    /// Hand-edited or foreign lines are skipped rather than guessed at.
    #[test]
    fn recovery_skips_foreign_lines() {
        let (temp, trail) = trail(EpochBoundary::StartOnly);
        let path = WaypointPaths::new(temp.path()).audit_path("j");
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(
            &path,
            "2026-01-01T00:00:00Z @waypoint:course:v01(a.md) SERVED step 1/3\n\
             agent note: finished b.md\n\
             agent note: @waypoint:course:v01(c.md) SERVED step 3/3\n\
             2026-01-01T00:00:30Z operator wrote @waypoint:course:v01(c.md) SERVED\n\
             2026-01-01T00:01:00Z @waypoint:course:v01(b.md) SERVED step 2/3 - done\n\
             2026-01-01T00:02:00Z @waypoint:course:v02(c.md) SERVED step 1/1\n",
        )
        .expect("write");

        let names = trail.completed_names("j", "course", "v01").expect("names");
        assert_eq!(names, vec!["a.md".to_string(), "b.md".to_string()]);
    }

    #[test]
    fn trails_are_separate_per_journey() {
        let (_temp, trail) = trail(EpochBoundary::StartOnly);
        trail
            .append("a", &AuditEntry::new("course", "v01", "x.md", AuditStatus::Served))
            .expect("append");
        assert!(trail.completed_names("b", "course", "v01").expect("names").is_empty());
        assert_eq!(
            trail.completed_names("a", "course", "v01").expect("names"),
            vec!["x.md".to_string()]
        );
    }
}
