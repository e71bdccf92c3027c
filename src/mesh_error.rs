//! MeshError: unified error type for mesh-morph public APIs.
//!
//! Structural problems (bad mesh kind, incoherent patch content, distributed
//! inconsistencies) surface as `Err(MeshError)`. Anticipated mutation failures
//! such as a duplicate id are reported through `Option`/`bool` returns instead.

use thiserror::Error;

use crate::object::MeshKind;
use crate::topology::cell_type::ElementType;

/// Unified error type for mesh-morph operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshError {
    /// Integer code does not name a mesh kind (valid codes are 1..=4).
    #[error("unrecognized mesh kind code {0}")]
    UnrecognizedMeshKind(i32),
    /// A patch holds an element kind that the requested mesh kind cannot host.
    #[error("element kind {element:?} is not legal for a {kind:?} mesh")]
    IncoherentMeshKind { kind: MeshKind, element: ElementType },
    /// The external patch has no vertices, or no cells for a connected mesh kind.
    #[error("patch is empty or lacks the cells its mesh kind requires")]
    EmptyPatch,
    /// A surface-only query was issued on a tree built over a non-surface patch.
    #[error("spatial query requires a tree built over a surface or curve patch")]
    NotASurfaceTree,
    /// Triangulation met cells it cannot split.
    #[error("unsupported cell type for triangulation in cells {cells:?}")]
    UnsupportedCellType { cells: Vec<i64> },
    /// Restored stream was written by a run with a different number of ranks.
    #[error("rank count mismatch: stream has {found}, communicator has {expected}")]
    RankCountMismatch { expected: usize, found: usize },
    /// User-supplied partition map targets ranks outside the communicator.
    #[error("partition count mismatch: communicator has {expected} ranks, map uses {found}")]
    PartitionCountMismatch { expected: usize, found: usize },
    /// Cell id not present in the patch.
    #[error("unknown cell id {0}")]
    UnknownCell(i64),
    /// Vertex id not present in the patch.
    #[error("unknown vertex id {0}")]
    UnknownVertex(i64),
    /// Geometry is degenerate or malformed for the requested measure.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    /// Dump/restore or payload (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// A collective exchange delivered an unexpected payload.
    #[error("communication error: {0}")]
    Communication(String),
}

impl From<bincode::Error> for MeshError {
    fn from(err: bincode::Error) -> Self {
        MeshError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for MeshError {
    fn from(err: std::io::Error) -> Self {
        MeshError::Serialization(err.to_string())
    }
}
