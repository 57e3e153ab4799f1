//! Immutable, validated view of one journey's pieces.

use std::collections::BTreeMap;

use crate::core::invariants::{duplicate_sequence_numbers, sequence_warnings, validate_invariants};
use crate::error::JourneyError;
use crate::journey::JourneyDeclaration;

/// One servable piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub sequence_number: i64,
    pub name: String,
    pub title: String,
    pub content: String,
    /// Owning group, `None` for root pieces.
    pub group: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SequenceModel {
    domain: String,
    version: String,
    description: String,
    entry_point: String,
    workflow_name: String,
    /// Every piece, ascending by sequence number.
    sorted: Vec<Piece>,
    /// Group name -> sequence numbers in declared order.
    groups: BTreeMap<String, Vec<i64>>,
    warnings: Vec<String>,
}

impl SequenceModel {
    /// Validate a declaration and build the model.
    ///
    /// Colliding sequence numbers are reported as `DuplicateSequenceNumber`,
    /// every other structural problem as `InvalidDeclaration`. A declaration
    /// with zero pieces is accepted here; callers decide whether that is
    /// servable.
    pub fn load(decl: &JourneyDeclaration) -> Result<Self, JourneyError> {
        if let Some(dup) = duplicate_sequence_numbers(decl).into_iter().next() {
            return Err(JourneyError::DuplicateSequenceNumber {
                number: dup.number,
                first: dup.first,
                second: dup.second,
            });
        }
        let errors = validate_invariants(decl);
        if !errors.is_empty() {
            return Err(JourneyError::InvalidDeclaration(errors.join("; ")));
        }

        let mut sorted: Vec<Piece> = decl
            .pieces()
            .map(|(group, piece)| Piece {
                sequence_number: piece.sequence_number,
                name: piece.name.clone(),
                title: piece.title.clone(),
                content: piece.content.clone(),
                group: group.map(str::to_string),
            })
            .collect();
        sorted.sort_by_key(|piece| piece.sequence_number);

        let groups = decl
            .groups
            .iter()
            .map(|(name, pieces)| {
                let numbers = pieces.iter().map(|piece| piece.sequence_number).collect();
                (name.clone(), numbers)
            })
            .collect();

        Ok(Self {
            domain: decl.domain.clone(),
            version: decl.version.clone(),
            description: decl.description.clone(),
            entry_point: decl.entry_point.clone(),
            workflow_name: decl
                .workflow_name
                .clone()
                .unwrap_or_else(|| decl.domain.clone()),
            sorted,
            groups,
            warnings: sequence_warnings(decl),
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    /// Non-fatal authoring issues found while loading.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn total_count(&self) -> usize {
        self.sorted.len()
    }

    pub fn find(&self, sequence_number: i64) -> Option<&Piece> {
        self.sorted
            .binary_search_by_key(&sequence_number, |piece| piece.sequence_number)
            .ok()
            .map(|idx| &self.sorted[idx])
    }

    /// All pieces ascending by sequence number. Uniqueness is enforced by
    /// [`SequenceModel::load`], so the order has no ties.
    pub fn all_pieces_sorted(&self) -> &[Piece] {
        &self.sorted
    }

    /// 1-based position of `sequence_number` in sorted order.
    pub fn rank(&self, sequence_number: i64) -> Option<usize> {
        self.sorted
            .binary_search_by_key(&sequence_number, |piece| piece.sequence_number)
            .ok()
            .map(|idx| idx + 1)
    }

    /// Root pieces ascending by sequence number.
    pub fn root_pieces(&self) -> impl Iterator<Item = &Piece> {
        self.sorted.iter().filter(|piece| piece.group.is_none())
    }

    /// Group names with their sequence numbers in declared order.
    pub fn groups(&self) -> &BTreeMap<String, Vec<i64>> {
        &self.groups
    }
}
