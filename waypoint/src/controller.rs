//! Journey orchestration: start, advance, progress, reset and resume.
//!
//! The controller owns the in-memory registry of loaded sequence models and
//! coordinates the resolver with the progress store and audit trail. Every
//! operation on a journey holds that journey's lock for its whole
//! read-resolve-write cycle, so two callers can never serve the same piece.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::core::audit_format::{
    AuditEntry, AuditStatus, END_LABEL, EpochBoundary, RESET_LABEL, RESUME_LABEL, START_LABEL,
};
use crate::core::resolver::{Resolution, ResolveStrategy, completed_numbers, resolve_next};
use crate::core::sequence::SequenceModel;
use crate::core::types::{JourneyStatus, ProgressRecord, ProgressReport, completion_percentage};
use crate::error::JourneyError;
use crate::io::audit_log::{AuditTrail, CompletedSetSource, FileAuditTrail};
use crate::io::config::{WaypointConfig, load_config};
use crate::io::init::WaypointPaths;
use crate::io::progress_store::{FileProgressStore, ProgressStore};
use crate::journey::JourneyDeclaration;

/// Behavior switches taken from [`WaypointConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    pub reset_clears_progress: bool,
    pub notes_limit_bytes: usize,
}

impl ControllerOptions {
    /// Audit markers that open a new recovery epoch under these options.
    pub fn epoch_boundary(&self) -> EpochBoundary {
        if self.reset_clears_progress {
            EpochBoundary::StartOrReset
        } else {
            EpochBoundary::StartOnly
        }
    }
}

impl From<&WaypointConfig> for ControllerOptions {
    fn from(config: &WaypointConfig) -> Self {
        Self {
            reset_clears_progress: config.reset_clears_progress,
            notes_limit_bytes: config.notes_limit_bytes,
        }
    }
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from(&WaypointConfig::default())
    }
}

/// A piece handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub sequence_number: i64,
    pub name: String,
    pub title: String,
    pub content: String,
    pub completed_count: usize,
    pub total_pieces: usize,
    pub status: JourneyStatus,
    /// Non-fatal problems, e.g. progress that could not be persisted.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Served(Served),
    /// Every piece has been served.
    Complete { warnings: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetOutcome {
    pub domain: String,
    pub version: String,
    pub cleared_progress: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeOutcome {
    pub domain: String,
    pub version: String,
    pub completed_count: usize,
    pub total_pieces: usize,
    pub status: JourneyStatus,
    pub warnings: Vec<String>,
}

#[derive(Default)]
struct JourneySlot {
    model: Mutex<Option<SequenceModel>>,
}

pub struct JourneyController<S, A, C> {
    store: S,
    audit: A,
    /// `None` disables recovery from the audit trail.
    completed: Option<C>,
    options: ControllerOptions,
    journeys: Mutex<HashMap<String, Arc<JourneySlot>>>,
}

/// Controller backed by `.waypoint/` files.
pub type FileController = JourneyController<FileProgressStore, FileAuditTrail, FileAuditTrail>;

impl FileController {
    pub fn open(paths: &WaypointPaths, config: &WaypointConfig) -> Self {
        let options = ControllerOptions::from(config);
        let audit = FileAuditTrail::new(paths.clone(), options.epoch_boundary());
        let completed = config.reconstruct_from_audit.then(|| audit.clone());
        Self::new(FileProgressStore::new(paths.clone()), audit, completed, options)
    }

    /// Open with the config found under `root/.waypoint/`.
    pub fn from_root(root: &Path) -> Result<Self> {
        let paths = WaypointPaths::new(root);
        let config = load_config(&paths.config_path)?;
        Ok(Self::open(&paths, &config))
    }
}

impl<S, A, C> JourneyController<S, A, C>
where
    S: ProgressStore,
    A: AuditTrail,
    C: CompletedSetSource,
{
    pub fn new(store: S, audit: A, completed: Option<C>, options: ControllerOptions) -> Self {
        Self {
            store,
            audit,
            completed,
            options,
            journeys: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_registered(&self, journey_id: &str) -> bool {
        self.slot(journey_id)
            .is_ok_and(|slot| lock(&slot.model).is_some())
    }

    /// Register `decl` for `journey_id` and serve its first piece.
    ///
    /// A completed record is cleared so the journey can run again; an
    /// in-progress record is overwritten by the first piece.
    pub fn start(
        &self,
        journey_id: &str,
        decl: &JourneyDeclaration,
        notes: &str,
    ) -> Result<Served, JourneyError> {
        let model = load_servable(decl)?;
        for warning in model.warnings() {
            warn!(journey_id, %warning, "declaration warning");
        }

        let slot = self.slot_or_insert(journey_id);
        let mut guard = lock(&slot.model);
        let mut warnings = Vec::new();

        match self.store.read(journey_id) {
            Ok(Some(record)) if record.status == JourneyStatus::Complete => {
                match self.store.clear(journey_id) {
                    Ok(()) => debug!(journey_id, "cleared completed record for restart"),
                    Err(err) => warnings.push(store_warning(&err)),
                }
            }
            Ok(_) => {}
            Err(err) => warnings.push(store_warning(&err)),
        }

        self.audit_entry(
            journey_id,
            AuditEntry::new(model.domain(), model.version(), START_LABEL, AuditStatus::Start)
                .with_step_info(format!(
                    "journey initialized with {} pieces",
                    model.total_count()
                ))
                .with_notes(self.notes(notes)),
        );

        let model = guard.insert(model);
        let strategy = ResolveStrategy::Counter { last_served: None };
        let Resolution::Next(first) = resolve_next(model, &strategy) else {
            return Err(JourneyError::EmptySequence {
                domain: model.domain().to_string(),
            });
        };
        info!(
            journey_id,
            domain = model.domain(),
            version = model.version(),
            total = model.total_count(),
            "journey started"
        );
        self.serve(journey_id, model, &strategy, first, "", warnings)
    }

    /// Serve the next piece, or report completion.
    pub fn advance(&self, journey_id: &str, notes: &str) -> Result<AdvanceOutcome, JourneyError> {
        let slot = self.slot(journey_id)?;
        let guard = lock(&slot.model);
        let model = registered(&guard, journey_id)?;
        let mut warnings = Vec::new();

        let strategy = self.strategy(journey_id, model, &mut warnings);
        match resolve_next(model, &strategy) {
            Resolution::Next(sequence_number) => self
                .serve(journey_id, model, &strategy, sequence_number, notes, warnings)
                .map(AdvanceOutcome::Served),
            Resolution::Done => {
                self.audit_entry(
                    journey_id,
                    AuditEntry::new(model.domain(), model.version(), END_LABEL, AuditStatus::End)
                        .with_step_info("all waypoints traversed")
                        .with_notes(self.notes(notes)),
                );
                info!(journey_id, "journey complete");
                Ok(AdvanceOutcome::Complete { warnings })
            }
        }
    }

    /// Completion derived from the audit trail.
    ///
    /// This is a diagnostic view and may disagree with the stored counter.
    /// With recovery disabled the stored `completed_count` is reported instead.
    pub fn progress(&self, journey_id: &str) -> Result<ProgressReport, JourneyError> {
        let slot = self.slot(journey_id)?;
        let guard = lock(&slot.model);
        let model = registered(&guard, journey_id)?;

        let completed = match &self.completed {
            Some(_) => self
                .reconstruct(journey_id, model)
                .map_err(|err| JourneyError::store(&err))?
                .len(),
            None => self
                .store
                .read(journey_id)
                .map_err(|err| JourneyError::store(&err))?
                .filter(|record| matches_model(record, model))
                .map_or(0, |record| record.completed_count),
        };
        let total = model.total_count();

        Ok(ProgressReport {
            domain: model.domain().to_string(),
            version: model.version().to_string(),
            completed,
            total,
            percentage: completion_percentage(completed, total),
            entry_point: model.entry_point().to_string(),
        })
    }

    /// Write a reset marker, and clear stored progress when configured to.
    pub fn reset(&self, journey_id: &str, notes: &str) -> Result<ResetOutcome, JourneyError> {
        let slot = self.slot(journey_id)?;
        let guard = lock(&slot.model);
        let model = registered(&guard, journey_id)?;
        let mut warnings = Vec::new();

        self.audit_entry(
            journey_id,
            AuditEntry::new(model.domain(), model.version(), RESET_LABEL, AuditStatus::Reset)
                .with_step_info("navigation sequence restarted")
                .with_notes(self.notes(notes)),
        );

        let cleared_progress = self.options.reset_clears_progress
            && match self.store.clear(journey_id) {
                Ok(()) => true,
                Err(err) => {
                    warnings.push(store_warning(&err));
                    false
                }
            };
        info!(journey_id, cleared_progress, "journey reset");

        Ok(ResetOutcome {
            domain: model.domain().to_string(),
            version: model.version().to_string(),
            cleared_progress,
            warnings,
        })
    }

    /// Register `decl` without serving anything, continuing from whatever
    /// progress survived a restart.
    pub fn resume(
        &self,
        journey_id: &str,
        decl: &JourneyDeclaration,
        notes: &str,
    ) -> Result<ResumeOutcome, JourneyError> {
        let model = load_servable(decl)?;
        let slot = self.slot_or_insert(journey_id);
        let mut guard = lock(&slot.model);
        let mut warnings = Vec::new();

        let strategy = self.strategy(journey_id, &model, &mut warnings);
        let completed_count = strategy.served_so_far(&model);
        let total_pieces = model.total_count();
        let status = match resolve_next(&model, &strategy) {
            Resolution::Done => JourneyStatus::Complete,
            Resolution::Next(_) if completed_count == 0 => JourneyStatus::NotStarted,
            Resolution::Next(_) => JourneyStatus::InProgress,
        };

        self.audit_entry(
            journey_id,
            AuditEntry::new(model.domain(), model.version(), RESUME_LABEL, AuditStatus::Resume)
                .with_step_info(format!("resumed at {completed_count}/{total_pieces}"))
                .with_notes(self.notes(notes)),
        );
        info!(journey_id, completed_count, total_pieces, status = status.as_str(), "journey resumed");

        let outcome = ResumeOutcome {
            domain: model.domain().to_string(),
            version: model.version().to_string(),
            completed_count,
            total_pieces,
            status,
            warnings,
        };
        *guard = Some(model);
        Ok(outcome)
    }

    fn serve(
        &self,
        journey_id: &str,
        model: &SequenceModel,
        strategy: &ResolveStrategy,
        sequence_number: i64,
        notes: &str,
        mut warnings: Vec<String>,
    ) -> Result<Served, JourneyError> {
        let piece = model.find(sequence_number).ok_or_else(|| {
            error!(journey_id, sequence_number, "resolved piece missing from model");
            JourneyError::PieceNotFound(sequence_number)
        })?;
        let total_pieces = model.total_count();
        let after = strategy.after_serving(sequence_number);
        let completed_count = after.served_so_far(model);
        let status = match resolve_next(model, &after) {
            Resolution::Done => JourneyStatus::Complete,
            Resolution::Next(_) => JourneyStatus::InProgress,
        };

        let record = ProgressRecord {
            journey_id: journey_id.to_string(),
            domain: model.domain().to_string(),
            version: model.version().to_string(),
            workflow_name: model.workflow_name().to_string(),
            last_served_sequence: Some(sequence_number),
            total_pieces,
            last_served_name: piece.name.clone(),
            completed_count,
            status,
        };
        if let Err(err) = self.store.write(&record) {
            warnings.push(store_warning(&err));
        }

        self.audit_entry(
            journey_id,
            AuditEntry::new(model.domain(), model.version(), &piece.name, AuditStatus::Served)
                .with_step_info(format!("step {completed_count}/{total_pieces}"))
                .with_notes(self.notes(notes)),
        );
        info!(
            journey_id,
            sequence_number,
            name = %piece.name,
            completed = completed_count,
            total = total_pieces,
            "piece served"
        );

        Ok(Served {
            sequence_number,
            name: piece.name.clone(),
            title: piece.title.clone(),
            content: piece.content.clone(),
            completed_count,
            total_pieces,
            status,
            warnings,
        })
    }

    /// Use the stored counter when it belongs to this model, otherwise
    /// recover from the audit trail.
    fn strategy(
        &self,
        journey_id: &str,
        model: &SequenceModel,
        warnings: &mut Vec<String>,
    ) -> ResolveStrategy {
        let record = match self.store.read(journey_id) {
            Ok(Some(record)) if matches_model(&record, model) => Some(record),
            Ok(Some(record)) => {
                let warning = format!(
                    "ignoring stale progress for {}:{}; recovering from audit trail",
                    record.domain, record.version
                );
                warn!(journey_id, %warning);
                warnings.push(warning);
                None
            }
            Ok(None) => None,
            Err(err) => {
                warnings.push(store_warning(&err));
                None
            }
        };

        ResolveStrategy::select(record.as_ref(), || {
            self.reconstruct(journey_id, model).unwrap_or_else(|err| {
                let warning = format!("audit trail unreadable, treating journey as fresh: {err:#}");
                warn!(journey_id, %warning);
                warnings.push(warning);
                BTreeSet::new()
            })
        })
    }

    fn reconstruct(&self, journey_id: &str, model: &SequenceModel) -> Result<BTreeSet<i64>> {
        let Some(source) = &self.completed else {
            debug!(journey_id, "audit recovery disabled");
            return Ok(BTreeSet::new());
        };
        let names = source.completed_names(journey_id, model.domain(), model.version())?;
        let completed = completed_numbers(model, &names);
        debug!(journey_id, recovered = completed.len(), "completed set rebuilt from audit trail");
        Ok(completed)
    }

    /// Best-effort: audit failures never fail the operation.
    fn audit_entry(&self, journey_id: &str, entry: AuditEntry) {
        if let Err(err) = self.audit.append(journey_id, &entry) {
            warn!(
                journey_id,
                status = entry.status.as_str(),
                error = %format!("{err:#}"),
                "audit write failed"
            );
        }
    }

    fn notes<'a>(&self, notes: &'a str) -> &'a str {
        truncate_on_char_boundary(notes, self.options.notes_limit_bytes)
    }

    fn slot(&self, journey_id: &str) -> Result<Arc<JourneySlot>, JourneyError> {
        lock(&self.journeys)
            .get(journey_id)
            .cloned()
            .ok_or_else(|| JourneyError::UnknownJourney(journey_id.to_string()))
    }

    fn slot_or_insert(&self, journey_id: &str) -> Arc<JourneySlot> {
        Arc::clone(lock(&self.journeys).entry(journey_id.to_string()).or_default())
    }
}

fn load_servable(decl: &JourneyDeclaration) -> Result<SequenceModel, JourneyError> {
    let model = SequenceModel::load(decl)?;
    if model.total_count() == 0 {
        return Err(JourneyError::EmptySequence {
            domain: model.domain().to_string(),
        });
    }
    Ok(model)
}

fn registered<'a>(
    guard: &'a MutexGuard<'_, Option<SequenceModel>>,
    journey_id: &str,
) -> Result<&'a SequenceModel, JourneyError> {
    guard
        .as_ref()
        .ok_or_else(|| JourneyError::UnknownJourney(journey_id.to_string()))
}

fn matches_model(record: &ProgressRecord, model: &SequenceModel) -> bool {
    record.domain == model.domain() && record.version == model.version()
}

fn store_warning(err: &anyhow::Error) -> String {
    let warning = JourneyError::store(err).to_string();
    warn!(%warning, "progress may not survive a restart");
    warning
}

fn truncate_on_char_boundary(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
