//! Error and fault types
//!
//! `ReshuffleError` is returned synchronously when a request is rejected
//! before any state changes. `Fault` values describe recoverable problems
//! found while a reshuffle is in flight; they are logged and collected into
//! the run report, never propagated.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::{PieceId, ReshufflePhase};

#[derive(Debug, Error)]
pub enum ReshuffleError {
    #[error("reshuffle already in progress (phase {phase:?})")]
    AlreadyRunning { phase: ReshufflePhase },

    #[error("layout is {layout_columns}x{layout_rows} but grid is {grid_columns}x{grid_rows}")]
    LayoutShape {
        layout_columns: usize,
        layout_rows: usize,
        grid_columns: usize,
        grid_rows: usize,
    },

    #[error("final layout is empty")]
    EmptyLayout,

    #[error("final layout column {column} has {found} rows, expected {expected}")]
    RaggedLayout {
        column: usize,
        expected: usize,
        found: usize,
    },

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Recoverable problem encountered during a reshuffle
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum Fault {
    /// Layout asked for a name with no queued piece left
    #[error("no piece left for '{name}' at cell ({column}, {row})")]
    MissingPiece {
        column: usize,
        row: usize,
        name: String,
    },

    /// Directed piece hit its search deadline and was snapped to its target
    #[error("piece {piece} ('{name}') snapped to destination after search timeout")]
    ForcedArrival { piece: PieceId, name: String },

    /// Piece was picked up but never requested by the layout
    #[error("piece {piece} ('{name}') was never claimed by the layout")]
    UnclaimedPiece { piece: PieceId, name: String },

    /// Second landing requested for a cell already filled this run
    #[error("cell ({column}, {row}) was already consumed")]
    CellAlreadyConsumed { column: usize, row: usize },
}
