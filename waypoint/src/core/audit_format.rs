//! Audit line format (v1).
//!
//! ```text
//! <timestamp> @waypoint:<domain>:<version>(<label>) <STATUS>[ <step info>][ - <notes>]
//! ```
//!
//! Recovery only trusts lines that match this layout from the first byte;
//! anything else, including prose that merely mentions a marker, is skipped.

use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;

pub const MARKER: &str = "@waypoint:";
pub const START_LABEL: &str = "workflow";
pub const END_LABEL: &str = "completion";
pub const RESET_LABEL: &str = "reset";
pub const RESUME_LABEL: &str = "resume";

static LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2}) @waypoint:(?P<domain>[^:\s()]+):(?P<version>[^:\s()]+)\((?P<label>[^()\r\n]+)\) (?P<status>START|SERVED|END|RESET|RESUME)(?: (?P<rest>.*))?$",
    )
    .expect("audit line regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Start,
    Served,
    End,
    Reset,
    Resume,
}

impl AuditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Served => "SERVED",
            Self::End => "END",
            Self::Reset => "RESET",
            Self::Resume => "RESUME",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "START" => Some(Self::Start),
            "SERVED" => Some(Self::Served),
            "END" => Some(Self::End),
            "RESET" => Some(Self::Reset),
            "RESUME" => Some(Self::Resume),
            _ => None,
        }
    }
}

/// Which markers open a fresh epoch during recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochBoundary {
    StartOnly,
    StartOrReset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub domain: String,
    pub version: String,
    pub label: String,
    pub status: AuditStatus,
    pub step_info: Option<String>,
    pub notes: Option<String>,
}

impl AuditEntry {
    pub fn new(domain: &str, version: &str, label: &str, status: AuditStatus) -> Self {
        Self {
            domain: domain.to_string(),
            version: version.to_string(),
            label: label.to_string(),
            status,
            step_info: None,
            notes: None,
        }
    }

    pub fn with_step_info(mut self, step_info: impl Into<String>) -> Self {
        self.step_info = Some(single_line(&step_info.into()));
        self
    }

    /// Attach notes; empty notes are dropped.
    pub fn with_notes(mut self, notes: &str) -> Self {
        let notes = single_line(notes);
        self.notes = (!notes.is_empty()).then_some(notes);
        self
    }

    /// Full log line stamped with `at` (RFC 3339, UTC, whole seconds).
    pub fn render_at(&self, at: DateTime<Utc>) -> String {
        format!(
            "{} {}",
            at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.render()
        )
    }

    /// Render without the timestamp prefix.
    pub fn render(&self) -> String {
        let mut line = format!(
            "{MARKER}{}:{}({}) {}",
            self.domain,
            self.version,
            self.label,
            self.status.as_str()
        );
        if let Some(step_info) = &self.step_info {
            line.push(' ');
            line.push_str(step_info);
        }
        if let Some(notes) = &self.notes {
            line.push_str(" - ");
            line.push_str(notes);
        }
        line
    }
}

/// Parse one timestamped audit line. Returns `None` for anything not in the
/// v1 format.
pub fn parse_line(line: &str) -> Option<AuditEntry> {
    let caps = LINE.captures(line.trim_end())?;
    let status = AuditStatus::parse(&caps["status"])?;
    let (step_info, notes) = match caps.name("rest").map(|m| m.as_str()) {
        None | Some("") => (None, None),
        Some(rest) => split_rest(rest),
    };
    Some(AuditEntry {
        domain: caps["domain"].to_string(),
        version: caps["version"].to_string(),
        label: caps["label"].to_string(),
        status,
        step_info,
        notes,
    })
}

/// Labels served in the current epoch of `domain:version`, oldest first.
pub fn completed_labels<I>(entries: I, domain: &str, version: &str, boundary: EpochBoundary) -> Vec<String>
where
    I: IntoIterator<Item = AuditEntry>,
{
    let mut labels: Vec<String> = Vec::new();
    for entry in entries {
        if entry.domain != domain || entry.version != version {
            continue;
        }
        match entry.status {
            AuditStatus::Start => labels.clear(),
            AuditStatus::Reset if boundary == EpochBoundary::StartOrReset => labels.clear(),
            AuditStatus::Served => {
                if !labels.contains(&entry.label) {
                    labels.push(entry.label);
                }
            }
            AuditStatus::Reset | AuditStatus::End | AuditStatus::Resume => {}
        }
    }
    labels
}

fn split_rest(rest: &str) -> (Option<String>, Option<String>) {
    if let Some(notes) = rest.strip_prefix("- ") {
        return (None, Some(notes.to_string()));
    }
    match rest.split_once(" - ") {
        Some((step_info, notes)) => (Some(step_info.to_string()), Some(notes.to_string())),
        None => (Some(rest.to_string()), None),
    }
}

fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
