#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-morph
//!
//! mesh-morph is the geometry core of a free-form deformation toolkit: an
//! unstructured mesh container that keeps its derived acceleration structures
//! consistent under incremental edits, plus nearest-element, containment and
//! narrow-band queries that also run over distributed (multi-rank) meshes.
//!
//! ## Features
//! - Surface, volume, curve and point-cloud containers over a [`MeshPatch`](topology::MeshPatch)
//!   that is either owned or borrowed
//! - Lazily rebuilt adjacencies, interfaces, cell/vertex trees, numbering, bounding box,
//!   point connectivity and ghost exchange lists, tracked by an explicit sync-state machine
//! - Distance, signed distance, projection, location and selection queries on a cell tree
//! - Pluggable collectives (serial, in-process threads, MPI) for distributed queries
//! - Boundary extraction, narrow bands, degenerate element repair and binary dumps
//!
//! ## Determinism
//!
//! Containers iterate ids in ascending order and distributed reductions break
//! ties by distance, then rank, then id, so repeated runs give identical
//! results. Tests that draw random data use fixed `SmallRng` seeds.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-morph = "0.3"
//! # features = ["mpi-support"]
//! ```
//!
//! ```
//! use mesh_morph::prelude::*;
//!
//! let ctx = Context::serial();
//! let verts = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
//! let cells = vec![vec![0, 1, 2], vec![0, 2, 3]];
//! let mut mesh = MeshObject::from_arrays(MeshKind::Surface, &verts, Some(&cells), &ctx);
//! assert_eq!(mesh.extract_boundary_vertex_id(false), vec![0, 1, 2, 3]);
//! assert!(mesh.ensure_current(Structure::CellTree));
//! let view = mesh.tree_view().unwrap();
//! let hit = mesh_morph::spatial::queries::distance([0.5, 0.5, 2.0], &view, f64::MAX).unwrap();
//! assert!((hit.distance - 2.0).abs() < 1e-12);
//! ```

pub mod algs;
pub mod config;
pub mod context;
pub mod geometry;
pub mod mesh_error;
pub mod object;
pub mod spatial;
pub mod topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Coordinator, NoComm, ThreadComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::reduction::ReduceOp;
    pub use crate::config::GeometryConfig;
    pub use crate::context::Context;
    pub use crate::geometry::{Aabb, Point3};
    pub use crate::mesh_error::MeshError;
    pub use crate::object::{DegenerateReport, MeshKind, MeshObject, PatchHandle};
    pub use crate::spatial::{KdTree, Proximity, Radius, SignedProximity, SkdTree, SkdTreeView};
    pub use crate::topology::{Cell, ElementType, InvalidateCache, MeshPatch, Structure, SyncState};
}
