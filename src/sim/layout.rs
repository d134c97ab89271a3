//! Final layout ingestion
//!
//! The server sends the post-reshuffle grid as one list of names per column.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ReshuffleError;
use crate::settings::ColumnOrder;

/// Server-authoritative arrangement of symbol names, `columns[column][row]`
/// with row 0 at the top
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalLayout {
    columns: Vec<Vec<String>>,
}

impl FinalLayout {
    /// Build from columns already in reading order
    pub fn new(columns: Vec<Vec<String>>) -> Result<Self, ReshuffleError> {
        let expected = columns.first().map(Vec::len).unwrap_or(0);
        if expected == 0 {
            return Err(ReshuffleError::EmptyLayout);
        }
        for (column, col) in columns.iter().enumerate() {
            if col.len() != expected {
                return Err(ReshuffleError::RaggedLayout {
                    column,
                    expected,
                    found: col.len(),
                });
            }
        }
        Ok(Self { columns })
    }

    /// Build from server column lists, normalizing the row order once
    pub fn from_server_columns(
        mut columns: Vec<Vec<String>>,
        order: ColumnOrder,
    ) -> Result<Self, ReshuffleError> {
        if order == ColumnOrder::BottomUp {
            for col in &mut columns {
                col.reverse();
            }
        }
        Self::new(columns)
    }

    /// Parse a JSON array of columns (`[["A","B"],["C","D"]]`)
    pub fn from_json(json: &str, order: ColumnOrder) -> Result<Self, ReshuffleError> {
        let columns: Vec<Vec<String>> = serde_json::from_str(json)?;
        Self::from_server_columns(columns, order)
    }

    pub fn columns(&self) -> usize {
        self.columns.len()
    }

    pub fn rows(&self) -> usize {
        self.columns.first().map(Vec::len).unwrap_or(0)
    }

    pub fn name(&self, column: usize, row: usize) -> Option<&str> {
        self.columns.get(column)?.get(row).map(String::as_str)
    }

    /// Cells in landing scan order: column-major, row ascending
    pub fn column_major(&self) -> impl Iterator<Item = (usize, usize, &str)> + '_ {
        self.columns.iter().enumerate().flat_map(|(column, col)| {
            col.iter()
                .enumerate()
                .map(move |(row, name)| (column, row, name.as_str()))
        })
    }

    /// Multiset of names
    pub fn name_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for (_, _, name) in self.column_major() {
            *counts.entry(name).or_insert(0) += 1;
        }
        counts
    }

    pub fn as_columns(&self) -> &[Vec<String>] {
        &self.columns
    }
}
