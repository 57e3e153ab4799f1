//! Waypoint configuration stored under `.waypoint/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Waypoint configuration (TOML).
///
/// Edited by humans; missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WaypointConfig {
    /// Whether `reset` also deletes the journey's progress record and opens a
    /// fresh audit epoch. Off by default: reset only writes an audit marker.
    pub reset_clears_progress: bool,

    /// Rebuild progress from the audit trail when no progress record exists.
    pub reconstruct_from_audit: bool,

    /// Truncate caller notes beyond this many bytes before auditing them.
    pub notes_limit_bytes: usize,
}

impl Default for WaypointConfig {
    fn default() -> Self {
        Self {
            reset_clears_progress: false,
            reconstruct_from_audit: true,
            notes_limit_bytes: 2_000,
        }
    }
}

impl WaypointConfig {
    pub fn validate(&self) -> Result<()> {
        if self.notes_limit_bytes == 0 {
            return Err(anyhow!("notes_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `WaypointConfig::default()`.
pub fn load_config(path: &Path) -> Result<WaypointConfig> {
    if !path.exists() {
        let cfg = WaypointConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: WaypointConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &WaypointConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    super::write_atomic(path, "toml.tmp", &buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, WaypointConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = WaypointConfig {
            reset_clears_progress: true,
            ..WaypointConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "reconstruct_from_audit = false\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert!(!cfg.reconstruct_from_audit);
        assert!(!cfg.reset_clears_progress);
        assert_eq!(cfg.notes_limit_bytes, 2_000);
    }

    #[test]
    fn zero_notes_limit_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "notes_limit_bytes = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("notes_limit_bytes"));
    }
}
