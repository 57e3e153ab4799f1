//! Test-only helpers for building declarations and in-memory backends.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, anyhow};
use chrono::Utc;
use tempfile::TempDir;

use crate::controller::{ControllerOptions, FileController, JourneyController};
use crate::core::audit_format::{AuditEntry, EpochBoundary, completed_labels, parse_line};
use crate::core::types::ProgressRecord;
use crate::io::audit_log::{AuditTrail, CompletedSetSource};
use crate::io::config::{WaypointConfig, write_config};
use crate::io::init::{InitOptions, WaypointPaths, init_waypoint};
use crate::io::progress_store::ProgressStore;
use crate::journey::{DEFAULT_ENTRY_POINT, DEFAULT_VERSION, JourneyDeclaration, PieceDecl};

/// A piece with deterministic title and content derived from its name.
pub fn piece(sequence_number: i64, name: &str) -> PieceDecl {
    PieceDecl {
        sequence_number,
        name: name.to_string(),
        title: format!("{name} title"),
        content: format!("{name} content"),
        dependencies: Vec::new(),
    }
}

/// A declaration with only root pieces.
pub fn declaration(domain: &str, root_pieces: Vec<PieceDecl>) -> JourneyDeclaration {
    JourneyDeclaration {
        domain: domain.to_string(),
        version: DEFAULT_VERSION.to_string(),
        description: format!("{domain} description"),
        entry_point: DEFAULT_ENTRY_POINT.to_string(),
        workflow_name: None,
        root_pieces,
        groups: Default::default(),
    }
}

pub fn declaration_with_groups(
    domain: &str,
    root_pieces: Vec<PieceDecl>,
    groups: Vec<(&str, Vec<PieceDecl>)>,
) -> JourneyDeclaration {
    JourneyDeclaration {
        groups: groups
            .into_iter()
            .map(|(name, pieces)| (name.to_string(), pieces))
            .collect(),
        ..declaration(domain, root_pieces)
    }
}

/// Root pieces named `piece-<n>` for each number.
pub fn numbered(domain: &str, numbers: &[i64]) -> JourneyDeclaration {
    declaration(
        domain,
        numbers.iter().map(|n| piece(*n, &format!("piece-{n}"))).collect(),
    )
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct StoreState {
    records: HashMap<String, ProgressRecord>,
    fail_reads: bool,
    fail_writes: bool,
    writes: usize,
}

/// Shared in-memory progress store with failure switches.
#[derive(Clone, Default)]
pub struct MemoryProgressStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryProgressStore {
    pub fn record(&self, journey_id: &str) -> Option<ProgressRecord> {
        lock(&self.state).records.get(journey_id).cloned()
    }

    pub fn insert(&self, record: ProgressRecord) {
        lock(&self.state)
            .records
            .insert(record.journey_id.clone(), record);
    }

    pub fn fail_reads(&self, fail: bool) {
        lock(&self.state).fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> usize {
        lock(&self.state).writes
    }
}

impl ProgressStore for MemoryProgressStore {
    fn read(&self, journey_id: &str) -> Result<Option<ProgressRecord>> {
        let state = lock(&self.state);
        if state.fail_reads {
            return Err(anyhow!("store offline"));
        }
        Ok(state.records.get(journey_id).cloned())
    }

    fn write(&self, record: &ProgressRecord) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_writes {
            return Err(anyhow!("disk full"));
        }
        state.writes += 1;
        state
            .records
            .insert(record.journey_id.clone(), record.clone());
        Ok(())
    }

    fn clear(&self, journey_id: &str) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_writes {
            return Err(anyhow!("disk full"));
        }
        state.records.remove(journey_id);
        Ok(())
    }
}

#[derive(Default)]
struct TrailState {
    lines: HashMap<String, Vec<String>>,
    fail_appends: bool,
}

/// In-memory audit trail storing the same timestamped lines as the file trail.
#[derive(Clone)]
pub struct MemoryAuditTrail {
    state: Arc<Mutex<TrailState>>,
    boundary: EpochBoundary,
}

impl MemoryAuditTrail {
    pub fn new(boundary: EpochBoundary) -> Self {
        Self {
            state: Arc::default(),
            boundary,
        }
    }

    pub fn lines(&self, journey_id: &str) -> Vec<String> {
        lock(&self.state)
            .lines
            .get(journey_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Lines with the timestamp prefix removed, for exact comparisons.
    pub fn bodies(&self, journey_id: &str) -> Vec<String> {
        self.lines(journey_id)
            .into_iter()
            .map(|line| match line.split_once(' ') {
                Some((_, body)) => body.to_string(),
                None => line,
            })
            .collect()
    }

    /// Append a raw line, e.g. one written by an older process.
    pub fn push_line(&self, journey_id: &str, line: &str) {
        lock(&self.state)
            .lines
            .entry(journey_id.to_string())
            .or_default()
            .push(line.to_string());
    }

    pub fn fail_appends(&self, fail: bool) {
        lock(&self.state).fail_appends = fail;
    }
}

impl AuditTrail for MemoryAuditTrail {
    fn append(&self, journey_id: &str, entry: &AuditEntry) -> Result<()> {
        if lock(&self.state).fail_appends {
            return Err(anyhow!("audit volume unavailable"));
        }
        self.push_line(journey_id, &entry.render_at(Utc::now()));
        Ok(())
    }
}

impl CompletedSetSource for MemoryAuditTrail {
    fn completed_names(&self, journey_id: &str, domain: &str, version: &str) -> Result<Vec<String>> {
        let entries = self
            .lines(journey_id)
            .iter()
            .filter_map(|line| parse_line(line))
            .collect::<Vec<_>>();
        Ok(completed_labels(entries, domain, version, self.boundary))
    }
}

pub type MemoryController = JourneyController<MemoryProgressStore, MemoryAuditTrail, MemoryAuditTrail>;

/// A controller wired to in-memory backends, with handles to inspect them.
pub struct Harness {
    pub controller: MemoryController,
    pub store: MemoryProgressStore,
    pub audit: MemoryAuditTrail,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(ControllerOptions::default())
    }

    pub fn with_options(options: ControllerOptions) -> Self {
        Self::build(options, true)
    }

    pub fn without_reconstruction() -> Self {
        Self::build(ControllerOptions::default(), false)
    }

    /// A second controller over the same backends, as after a restart.
    pub fn restarted(&self, options: ControllerOptions) -> MemoryController {
        JourneyController::new(
            self.store.clone(),
            self.audit.clone(),
            Some(self.audit.clone()),
            options,
        )
    }

    fn build(options: ControllerOptions, reconstruct: bool) -> Self {
        let store = MemoryProgressStore::default();
        let audit = MemoryAuditTrail::new(options.epoch_boundary());
        let controller = JourneyController::new(
            store.clone(),
            audit.clone(),
            reconstruct.then(|| audit.clone()),
            options,
        );
        Self {
            controller,
            store,
            audit,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// An initialized `.waypoint/` layout in a temporary directory.
pub struct TestWaypoint {
    pub temp: TempDir,
    pub paths: WaypointPaths,
}

impl TestWaypoint {
    pub fn new() -> Self {
        Self::with_config(&WaypointConfig::default())
    }

    pub fn with_config(config: &WaypointConfig) -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_waypoint(temp.path(), &InitOptions { force: false }).expect("init waypoint");
        write_config(&paths.config_path, config).expect("write config");
        Self { temp, paths }
    }

    pub fn root(&self) -> PathBuf {
        self.temp.path().to_path_buf()
    }

    /// Open a fresh file-backed controller, as a new process would.
    pub fn controller(&self) -> FileController {
        FileController::from_root(self.temp.path()).expect("open controller")
    }

    /// Write `decl` as `<name>.json` under the temp root.
    pub fn write_declaration(&self, name: &str, decl: &JourneyDeclaration) -> PathBuf {
        let path = self.temp.path().join(format!("{name}.json"));
        let json = serde_json::to_string_pretty(decl).expect("serialize declaration");
        fs::write(&path, json).expect("write declaration");
        path
    }
}

impl Default for TestWaypoint {
    fn default() -> Self {
        Self::new()
    }
}
