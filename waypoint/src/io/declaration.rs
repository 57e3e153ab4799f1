//! Journey declaration loading with schema validation.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use jsonschema::{Validator, validator_for};
use serde_json::Value;
use tracing::debug;

use crate::journey::JourneyDeclaration;

const JOURNEY_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/journey/v1.schema.json"
));

static SCHEMA: LazyLock<Result<Validator, String>> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(JOURNEY_SCHEMA).map_err(|err| format!("parse schema: {err}"))?;
    validator_for(&schema).map_err(|err| format!("invalid schema: {err}"))
});

/// Load a declaration from disk.
///
/// The document must satisfy the v1 schema. `workflow_name` defaults to the
/// file stem. Semantic invariants are checked when the sequence model is
/// built, not here.
pub fn load_declaration(path: &Path) -> Result<JourneyDeclaration> {
    debug!(path = %path.display(), "loading declaration");
    let contents =
        fs::read_to_string(path).with_context(|| format!("read declaration {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse declaration {}", path.display()))?;
    let mut decl =
        parse_declaration(value).with_context(|| format!("validate declaration {}", path.display()))?;
    if decl.workflow_name.is_none() {
        decl.workflow_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
    }
    Ok(decl)
}

/// Schema-check and deserialize an in-memory declaration document.
pub fn parse_declaration(value: Value) -> Result<JourneyDeclaration> {
    validate_schema(&value)?;
    serde_json::from_value(value).context("deserialize declaration")
}

fn validate_schema(value: &Value) -> Result<()> {
    let compiled = SCHEMA.as_ref().map_err(|err| anyhow!("{err}"))?;
    if compiled.is_valid(value) {
        return Ok(());
    }
    let messages = compiled
        .iter_errors(value)
        .map(|err| err.to_string())
        .collect::<Vec<_>>();
    Err(anyhow!(
        "declaration schema validation failed: {}",
        messages.join("; ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn load_fills_workflow_name_from_file_stem() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("onboarding.json");
        fs::write(
            &path,
            json!({
                "domain": "onboarding",
                "root_pieces": [
                    {"sequence_number": 1, "name": "01_welcome.md", "content": "hello"}
                ]
            })
            .to_string(),
        )
        .expect("write");

        let decl = load_declaration(&path).expect("load");
        assert_eq!(decl.workflow_name.as_deref(), Some("onboarding"));
        assert_eq!(decl.root_pieces[0].content, "hello");
    }

    #[test]
    fn explicit_workflow_name_wins() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("file.json");
        fs::write(
            &path,
            json!({"domain": "d", "workflow_name": "named"}).to_string(),
        )
        .expect("write");
        let decl = load_declaration(&path).expect("load");
        assert_eq!(decl.workflow_name.as_deref(), Some("named"));
    }

    #[test]
    fn schema_rejects_piece_without_sequence_number() {
        let err = parse_declaration(json!({
            "domain": "d",
            "root_pieces": [{"name": "a", "content": ""}]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("schema validation failed"));
    }

    #[test]
    fn schema_rejects_both_field_spellings() {
        let err = parse_declaration(json!({
            "domain": "d",
            "root_pieces": [],
            "root_files": []
        }))
        .unwrap_err();
        assert!(err.to_string().contains("schema validation failed"));
    }

    #[test]
    fn unreadable_file_reports_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_declaration(&temp.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("read declaration"));
    }
}
