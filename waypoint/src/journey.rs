//! Journey declarations as authored on disk.
//!
//! A declaration is the external description of one curriculum: a flat list of
//! root pieces plus named groups of pieces. Older declarations used
//! `root_files` / `directories` / `filename`; those names are accepted as
//! aliases so existing documents keep loading.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_VERSION: &str = "v01";
pub const DEFAULT_ENTRY_POINT: &str = "README.md";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PieceDecl {
    pub sequence_number: i64,
    #[serde(alias = "filename")]
    pub name: String,
    #[serde(default)]
    pub title: String,
    pub content: String,
    /// Sequence numbers the author expects to be read first. Advisory only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct JourneyDeclaration {
    pub domain: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_name: Option<String>,
    #[serde(default, alias = "root_files")]
    pub root_pieces: Vec<PieceDecl>,
    #[serde(default, alias = "directories")]
    pub groups: BTreeMap<String, Vec<PieceDecl>>,
}

impl JourneyDeclaration {
    /// Iterate every declared piece with its group (`None` for root pieces),
    /// root pieces first, then groups in name order.
    pub fn pieces(&self) -> impl Iterator<Item = (Option<&str>, &PieceDecl)> {
        self.root_pieces.iter().map(|piece| (None, piece)).chain(
            self.groups
                .iter()
                .flat_map(|(group, pieces)| pieces.iter().map(move |piece| (Some(group.as_str()), piece))),
        )
    }

    pub fn piece_count(&self) -> usize {
        self.root_pieces.len() + self.groups.values().map(Vec::len).sum::<usize>()
    }
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_entry_point() -> String {
    DEFAULT_ENTRY_POINT.to_string()
}
