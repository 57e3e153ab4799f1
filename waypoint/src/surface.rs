//! Transport-agnostic request/reply surface over [`JourneyController`].
//!
//! Errors never cross this boundary as `Err`: every failure becomes a
//! [`Reply::Failure`] whose message starts with [`FAILURE_MARKER`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::controller::{AdvanceOutcome, JourneyController, Served};
use crate::core::types::{JourneyStatus, ProgressReport};
use crate::error::JourneyError;
use crate::io::audit_log::{AuditTrail, CompletedSetSource};
use crate::io::declaration::{load_declaration, parse_declaration};
use crate::io::progress_store::ProgressStore;
use crate::journey::JourneyDeclaration;

pub const FAILURE_MARKER: &str = "ERROR:";

/// Where a declaration comes from. Inline documents are schema-checked the
/// same way as files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationSource {
    Path(PathBuf),
    Inline(Value),
}

impl DeclarationSource {
    fn load(&self) -> Result<JourneyDeclaration, JourneyError> {
        let loaded = match self {
            Self::Path(path) => load_declaration(path),
            Self::Inline(value) => parse_declaration(value.clone()),
        };
        loaded.map_err(|err| JourneyError::InvalidDeclaration(format!("{err:#}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Start {
        journey_id: String,
        declaration: DeclarationSource,
        #[serde(default)]
        notes: String,
    },
    Resume {
        journey_id: String,
        declaration: DeclarationSource,
        #[serde(default)]
        notes: String,
    },
    Advance {
        journey_id: String,
        #[serde(default)]
        notes: String,
    },
    Progress {
        journey_id: String,
    },
    Reset {
        journey_id: String,
        #[serde(default)]
        notes: String,
    },
}

impl Request {
    pub fn journey_id(&self) -> &str {
        match self {
            Self::Start { journey_id, .. }
            | Self::Resume { journey_id, .. }
            | Self::Advance { journey_id, .. }
            | Self::Progress { journey_id }
            | Self::Reset { journey_id, .. } => journey_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    Content {
        journey_id: String,
        sequence_number: i64,
        name: String,
        title: String,
        content: String,
        completed: usize,
        total: usize,
        status: JourneyStatus,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    Complete {
        journey_id: String,
        message: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    Progress {
        journey_id: String,
        #[serde(flatten)]
        report: ProgressReport,
    },
    Resumed {
        journey_id: String,
        domain: String,
        version: String,
        completed: usize,
        total: usize,
        status: JourneyStatus,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    Reset {
        journey_id: String,
        domain: String,
        version: String,
        cleared_progress: bool,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    Failure {
        journey_id: String,
        error: String,
    },
}

impl Reply {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    fn content(journey_id: &str, served: Served) -> Self {
        Self::Content {
            journey_id: journey_id.to_string(),
            sequence_number: served.sequence_number,
            name: served.name,
            title: served.title,
            content: served.content,
            completed: served.completed_count,
            total: served.total_pieces,
            status: served.status,
            warnings: served.warnings,
        }
    }

    fn failure(journey_id: &str, err: &JourneyError) -> Self {
        Self::Failure {
            journey_id: journey_id.to_string(),
            error: format!("{FAILURE_MARKER} {err}"),
        }
    }
}

/// Run one request against `controller`.
pub fn dispatch<S, A, C>(controller: &JourneyController<S, A, C>, request: &Request) -> Reply
where
    S: ProgressStore,
    A: AuditTrail,
    C: CompletedSetSource,
{
    let journey_id = request.journey_id();
    debug!(journey_id, ?request, "dispatching request");
    handle(controller, request).unwrap_or_else(|err| Reply::failure(journey_id, &err))
}

/// Parse one JSON request line and run it. Malformed input becomes a
/// failure reply rather than an error.
pub fn dispatch_line<S, A, C>(controller: &JourneyController<S, A, C>, line: &str) -> Reply
where
    S: ProgressStore,
    A: AuditTrail,
    C: CompletedSetSource,
{
    match serde_json::from_str::<Request>(line) {
        Ok(request) => dispatch(controller, &request),
        Err(err) => Reply::Failure {
            journey_id: String::new(),
            error: format!("{FAILURE_MARKER} malformed request: {err}"),
        },
    }
}

/// Decode one raw request line. Bytes that are not UTF-8 become a failure
/// reply so a transport can keep reading.
pub fn dispatch_bytes<S, A, C>(controller: &JourneyController<S, A, C>, line: &[u8]) -> Reply
where
    S: ProgressStore,
    A: AuditTrail,
    C: CompletedSetSource,
{
    match std::str::from_utf8(line) {
        Ok(line) => dispatch_line(controller, line),
        Err(err) => Reply::Failure {
            journey_id: String::new(),
            error: format!("{FAILURE_MARKER} malformed request: not valid UTF-8 ({err})"),
        },
    }
}

fn handle<S, A, C>(
    controller: &JourneyController<S, A, C>,
    request: &Request,
) -> Result<Reply, JourneyError>
where
    S: ProgressStore,
    A: AuditTrail,
    C: CompletedSetSource,
{
    let reply = match request {
        Request::Start {
            journey_id,
            declaration,
            notes,
        } => {
            let decl = declaration.load()?;
            Reply::content(journey_id, controller.start(journey_id, &decl, notes)?)
        }
        Request::Resume {
            journey_id,
            declaration,
            notes,
        } => {
            let decl = declaration.load()?;
            let outcome = controller.resume(journey_id, &decl, notes)?;
            Reply::Resumed {
                journey_id: journey_id.clone(),
                domain: outcome.domain,
                version: outcome.version,
                completed: outcome.completed_count,
                total: outcome.total_pieces,
                status: outcome.status,
                warnings: outcome.warnings,
            }
        }
        Request::Advance { journey_id, notes } => match controller.advance(journey_id, notes)? {
            AdvanceOutcome::Served(served) => Reply::content(journey_id, served),
            AdvanceOutcome::Complete { warnings } => Reply::Complete {
                journey_id: journey_id.clone(),
                message: "all waypoints traversed".to_string(),
                warnings,
            },
        },
        Request::Progress { journey_id } => Reply::Progress {
            journey_id: journey_id.clone(),
            report: controller.progress(journey_id)?,
        },
        Request::Reset { journey_id, notes } => {
            let outcome = controller.reset(journey_id, notes)?;
            Reply::Reset {
                journey_id: journey_id.clone(),
                domain: outcome.domain,
                version: outcome.version,
                cleared_progress: outcome.cleared_progress,
                warnings: outcome.warnings,
            }
        }
    };
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Harness, numbered};
    use serde_json::json;

    fn inline(numbers: &[i64]) -> DeclarationSource {
        DeclarationSource::Inline(serde_json::to_value(numbered("course", numbers)).expect("value"))
    }

    #[test]
    fn requests_parse_from_json() {
        let request: Request = serde_json::from_value(json!({
            "op": "start",
            "journey_id": "j",
            "declaration": {"path": "course.json"}
        }))
        .expect("parse");
        assert_eq!(
            request,
            Request::Start {
                journey_id: "j".to_string(),
                declaration: DeclarationSource::Path(PathBuf::from("course.json")),
                notes: String::new(),
            }
        );

        let request: Request =
            serde_json::from_value(json!({"op": "advance", "journey_id": "j", "notes": "done"}))
                .expect("parse");
        assert_eq!(request.journey_id(), "j");
    }

    #[test]
    fn start_then_advance_to_completion() {
        let harness = Harness::new();
        let start = Request::Start {
            journey_id: "j".to_string(),
            declaration: inline(&[1, 2]),
            notes: String::new(),
        };
        let reply = dispatch(&harness.controller, &start);
        assert!(
            matches!(&reply, Reply::Content { sequence_number: 1, completed: 1, total: 2, .. }),
            "{reply:?}"
        );

        let advance = Request::Advance {
            journey_id: "j".to_string(),
            notes: String::new(),
        };
        let reply = dispatch(&harness.controller, &advance);
        assert!(
            matches!(&reply, Reply::Content { sequence_number: 2, status: JourneyStatus::Complete, .. }),
            "{reply:?}"
        );
        let reply = dispatch(&harness.controller, &advance);
        assert!(matches!(reply, Reply::Complete { .. }), "{reply:?}");
    }

    #[test]
    fn failures_carry_marker() {
        let harness = Harness::new();
        let reply = dispatch(
            &harness.controller,
            &Request::Progress {
                journey_id: "missing".to_string(),
            },
        );
        let Reply::Failure { error, .. } = reply else {
            panic!("expected failure, got {reply:?}");
        };
        assert!(error.starts_with(FAILURE_MARKER));
        assert!(error.contains("unknown journey 'missing'"));
    }

    #[test]
    fn malformed_line_is_a_failure_reply() {
        let harness = Harness::new();
        let reply = dispatch_line(&harness.controller, r#"{"op": "teleport"}"#);
        let Reply::Failure { error, .. } = reply else {
            panic!("expected failure, got {reply:?}");
        };
        assert!(error.starts_with("ERROR: malformed request"), "{error}");
    }

    #[test]
    fn undecodable_bytes_are_a_failure_reply() {
        let harness = Harness::new();
        let reply = dispatch_bytes(&harness.controller, b"{\"op\": \"progress\xff\"}");
        let Reply::Failure { journey_id, error } = reply else {
            panic!("expected failure, got {reply:?}");
        };
        assert!(journey_id.is_empty());
        assert!(error.starts_with("ERROR: malformed request: not valid UTF-8"), "{error}");
    }

    #[test]
    fn inline_declaration_is_schema_checked() {
        let harness = Harness::new();
        let reply = dispatch(
            &harness.controller,
            &Request::Start {
                journey_id: "j".to_string(),
                declaration: DeclarationSource::Inline(json!({"root_pieces": []})),
                notes: String::new(),
            },
        );
        let Reply::Failure { error, .. } = reply else {
            panic!("expected failure, got {reply:?}");
        };
        assert!(error.contains("invalid declaration"), "{error}");
        assert!(!harness.controller.is_registered("j"));
    }

    #[test]
    fn progress_reply_flattens_report() {
        let harness = Harness::new();
        dispatch(
            &harness.controller,
            &Request::Start {
                journey_id: "j".to_string(),
                declaration: inline(&[1, 2, 3, 4]),
                notes: String::new(),
            },
        );
        let reply = dispatch(
            &harness.controller,
            &Request::Progress {
                journey_id: "j".to_string(),
            },
        );
        let value = serde_json::to_value(&reply).expect("serialize");
        assert_eq!(value["reply"], "progress");
        assert_eq!(value["completed"], 1);
        assert_eq!(value["total"], 4);
        assert_eq!(value["percentage"], 25.0);
        assert_eq!(value["entry_point"], "README.md");
    }
}
