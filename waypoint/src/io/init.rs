//! Initialization helpers for `.waypoint/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use sha2::{Digest, Sha256};

use super::config::{WaypointConfig, write_config};

/// All canonical paths within `.waypoint/` for a project root.
#[derive(Debug, Clone)]
pub struct WaypointPaths {
    pub root: PathBuf,
    pub waypoint_dir: PathBuf,
    pub state_dir: PathBuf,
    pub journeys_dir: PathBuf,
    pub audit_dir: PathBuf,
    pub config_path: PathBuf,
}

impl WaypointPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let waypoint_dir = root.join(".waypoint");
        let state_dir = waypoint_dir.join("state");
        Self {
            root: root.clone(),
            waypoint_dir: waypoint_dir.clone(),
            state_dir: state_dir.clone(),
            journeys_dir: state_dir.join("journeys"),
            audit_dir: waypoint_dir.join("audit"),
            config_path: waypoint_dir.join("config.toml"),
        }
    }

    /// Progress record for `journey_id`.
    pub fn record_path(&self, journey_id: &str) -> PathBuf {
        self.journeys_dir
            .join(format!("{}.json", journey_key(journey_id)))
    }

    /// Audit log for `journey_id`.
    pub fn audit_path(&self, journey_id: &str) -> PathBuf {
        self.audit_dir.join(format!("{}.log", journey_key(journey_id)))
    }
}

/// Stable filesystem key for a journey id (first 16 bytes of SHA-256, hex).
///
/// Journey ids are caller-chosen and frequently look like paths, so they are
/// never used as file names directly.
pub fn journey_key(journey_id: &str) -> String {
    let digest = Sha256::digest(journey_id.as_bytes());
    hex::encode(&digest[..16])
}

/// Options for `init_waypoint`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing waypoint-owned files.
    pub force: bool,
}

/// Create `.waypoint/` scaffolding in `root`.
///
/// Fails if `.waypoint/` already exists unless `options.force` is set.
/// Existing journey records and audit logs are never removed.
pub fn init_waypoint(root: &Path, options: &InitOptions) -> Result<WaypointPaths> {
    let paths = WaypointPaths::new(root);
    if paths.waypoint_dir.exists() && !paths.waypoint_dir.is_dir() {
        return Err(anyhow!(
            "waypoint init: .waypoint exists but is not a directory"
        ));
    }
    if paths.waypoint_dir.exists() && !options.force {
        return Err(anyhow!(
            "waypoint init: .waypoint already exists (use --force to overwrite)"
        ));
    }

    create_dir(&paths.waypoint_dir)?;
    create_dir(&paths.state_dir)?;
    create_dir(&paths.journeys_dir)?;
    create_dir(&paths.audit_dir)?;
    write_config(&paths.config_path, &WaypointConfig::default())?;

    Ok(paths)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::load_config;

    /// Verifies init creates the directory layout and a default config.
    #[test]
    fn init_creates_expected_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_waypoint(temp.path(), &InitOptions { force: false }).expect("init");

        assert!(paths.waypoint_dir.is_dir());
        assert!(paths.state_dir.is_dir());
        assert!(paths.journeys_dir.is_dir());
        assert!(paths.audit_dir.is_dir());
        assert!(paths.config_path.is_file());
        assert_eq!(
            load_config(&paths.config_path).expect("config"),
            WaypointConfig::default()
        );
    }

    #[test]
    fn init_without_force_refuses_existing_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_waypoint(temp.path(), &InitOptions { force: false }).expect("init");
        let err = init_waypoint(temp.path(), &InitOptions { force: false }).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    /// Re-init with force restores the config but keeps journey state.
    #[test]
    fn init_with_force_keeps_journey_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_waypoint(temp.path(), &InitOptions { force: false }).expect("init");
        let record = paths.record_path("journey");
        fs::write(&record, "{}").expect("write record");
        fs::write(&paths.config_path, "reset_clears_progress = true\n").expect("write config");

        init_waypoint(temp.path(), &InitOptions { force: true }).expect("re-init");

        assert!(record.is_file());
        assert_eq!(
            load_config(&paths.config_path).expect("config"),
            WaypointConfig::default()
        );
    }

    #[test]
    fn journey_keys_are_stable_and_path_safe() {
        let key = journey_key("/tmp/agent_learning_session");
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, journey_key("/tmp/agent_learning_session"));
        assert_ne!(key, journey_key("/tmp/other_session"));

        let paths = WaypointPaths::new("/project");
        assert!(
            paths
                .record_path("/tmp/agent_learning_session")
                .starts_with("/project/.waypoint/state/journeys")
        );
    }
}
