//! Error types for model mutations.

use crate::cell::CellId;
use thiserror::Error;

/// Errors produced by rejected model mutations.
///
/// A rejected mutation is never applied and never appends a change-log
/// entry; the transaction it was issued in stays open.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cell {0} is not part of the model")]
    UnknownCell(CellId),
    #[error("cell {0} is already part of the model")]
    DuplicateCell(CellId),
    #[error("moving {cell} under {parent} would create a cycle")]
    WouldCycle { cell: CellId, parent: CellId },
    #[error("geometry has negative extent ({width} x {height})")]
    InvalidGeometry { width: f64, height: f64 },
    #[error("cell {0} is not an edge")]
    NotAnEdge(CellId),
    #[error("cell {0} does not accept connections")]
    NotConnectable(CellId),
    #[error("the root cell cannot be removed")]
    RootRemoval,
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
