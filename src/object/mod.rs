//! The geometry container: a mesh patch plus the derived structures kept
//! consistent with it (adjacencies, interfaces, spatial trees, numbering,
//! point connectivity, ghost exchange lists).
//!
//! # Ownership
//! A container either owns its patch or borrows one for its whole lifetime
//! (see [`PatchHandle`]). Dropping the container drops an owned patch only.
//!
//! # Distributed use
//! When the [`Context`] coordinator spans several ranks, every operation that
//! rebuilds a structure (`update`, `ensure_current`, global counts, boundary
//! extraction with ghosts, narrow bands) is collective and must be called by
//! every rank in the same order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::geometry::{Aabb, Point3};
use crate::mesh_error::MeshError;
use crate::spatial::{KdTree, SkdTree, SkdTreeView};
use crate::topology::cache::InvalidateCache;
use crate::topology::cell_type::ElementType;
use crate::topology::patch::MeshPatch;
use crate::topology::sync::{Structure, SyncState, SyncTable};

pub mod boundary;
pub mod dump;
pub mod measure;
pub mod mutate;
pub mod narrow_band;
pub mod partition;
pub mod query;
pub mod repair;
pub mod sync;

pub use mutate::desume_element;
pub use repair::DegenerateReport;
pub use sync::{GhostExchange, NumberingInfo};

/// Kind of mesh a container holds, fixed at construction.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum MeshKind {
    Surface,
    Volume,
    PointCloud,
    Curve,
}

impl MeshKind {
    pub fn code(self) -> i32 {
        match self {
            MeshKind::Surface => 1,
            MeshKind::Volume => 2,
            MeshKind::PointCloud => 3,
            MeshKind::Curve => 4,
        }
    }

    /// Element kinds a mesh of this kind may hold.
    pub fn legal_elements(self) -> &'static [ElementType] {
        match self {
            MeshKind::Surface => &[
                ElementType::Triangle,
                ElementType::Quad,
                ElementType::Pixel,
                ElementType::Polygon,
            ],
            MeshKind::Volume => &[
                ElementType::Tetra,
                ElementType::Voxel,
                ElementType::Hexahedron,
                ElementType::Wedge,
                ElementType::Pyramid,
                ElementType::Polyhedron,
            ],
            MeshKind::Curve => &[ElementType::Line],
            MeshKind::PointCloud => &[ElementType::Vertex],
        }
    }

    pub fn allows(self, element: ElementType) -> bool {
        self.legal_elements().contains(&element)
    }

    /// Kind of the boundary of a mesh of this kind; point clouds have none.
    pub fn boundary_kind(self) -> Option<MeshKind> {
        match self {
            MeshKind::Volume => Some(MeshKind::Surface),
            MeshKind::Surface => Some(MeshKind::Curve),
            MeshKind::Curve => Some(MeshKind::PointCloud),
            MeshKind::PointCloud => None,
        }
    }

    /// Structures that can never be built for this kind.
    fn unsupported(self) -> &'static [Structure] {
        match self {
            MeshKind::PointCloud => &[
                Structure::CellTree,
                Structure::Adjacency,
                Structure::Interfaces,
                Structure::PointConnectivity,
            ],
            _ => &[],
        }
    }
}

impl TryFrom<i32> for MeshKind {
    type Error = MeshError;

    fn try_from(code: i32) -> Result<Self, MeshError> {
        match code {
            1 => Ok(MeshKind::Surface),
            2 => Ok(MeshKind::Volume),
            3 => Ok(MeshKind::PointCloud),
            4 => Ok(MeshKind::Curve),
            other => Err(MeshError::UnrecognizedMeshKind(other)),
        }
    }
}

/// The patch behind a container: owned, or borrowed from the caller.
#[derive(Debug)]
pub enum PatchHandle<'a> {
    Owned(Box<MeshPatch>),
    Borrowed(&'a mut MeshPatch),
}

impl PatchHandle<'_> {
    pub fn get(&self) -> &MeshPatch {
        match self {
            PatchHandle::Owned(p) => p,
            PatchHandle::Borrowed(p) => p,
        }
    }

    pub fn get_mut(&mut self) -> &mut MeshPatch {
        match self {
            PatchHandle::Owned(p) => p,
            PatchHandle::Borrowed(p) => p,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, PatchHandle::Owned(_))
    }
}

/// Geometry container over a [`MeshPatch`].
pub struct MeshObject<'a> {
    id: u64,
    kind: MeshKind,
    patch: PatchHandle<'a>,
    ctx: Context,
    tolerance: f64,
    pids: BTreeMap<i64, String>,
    sync: SyncTable,
    cell_tree: Option<SkdTree>,
    point_tree: Option<KdTree>,
    numbering: Option<NumberingInfo>,
    bbox: Option<Aabb>,
    point_connectivity: BTreeMap<i64, BTreeSet<i64>>,
    ghost_exchange: Option<GhostExchange>,
}

impl<'a> MeshObject<'a> {
    fn with_handle(kind: MeshKind, patch: PatchHandle<'a>, ctx: Context) -> Self {
        let mut sync = SyncTable::default();
        for s in kind.unsupported() {
            sync.mark_unsupported(*s);
        }
        if !ctx.is_distributed() {
            sync.mark_unsupported(Structure::GhostExchange);
        }
        MeshObject {
            id: ctx.next_object_id(),
            kind,
            patch,
            tolerance: ctx.config().tolerance,
            ctx,
            pids: BTreeMap::new(),
            sync,
            cell_tree: None,
            point_tree: None,
            numbering: None,
            bbox: None,
            point_connectivity: BTreeMap::new(),
            ghost_exchange: None,
        }
    }

    /// Empty container owning a fresh patch.
    pub fn new(kind: MeshKind, ctx: &Context) -> MeshObject<'static> {
        let patch = MeshPatch::new(ctx.comm().rank());
        MeshObject::with_handle(kind, PatchHandle::Owned(Box::new(patch)), ctx.clone())
    }

    /// Container built from coordinates and per-cell connectivity records.
    ///
    /// Vertices get ids `0..N`. Each record's element kind is inferred with
    /// [`desume_element`]; records that match no kind are skipped. Without
    /// connectivity the result is a point cloud whatever `kind` says.
    pub fn from_arrays(
        kind: MeshKind,
        vertices: &[Point3],
        connectivity: Option<&[Vec<i64>]>,
        ctx: &Context,
    ) -> MeshObject<'static> {
        let kind = if connectivity.is_some() { kind } else { MeshKind::PointCloud };
        let mut obj = MeshObject::new(kind, ctx);
        for (i, v) in vertices.iter().enumerate() {
            obj.add_vertex(*v, Some(i as i64));
        }
        if let Some(records) = connectivity {
            for (i, rec) in records.iter().enumerate() {
                let element = desume_element(kind, rec);
                if element == ElementType::Undefined {
                    log::warn!(target: ctx.log_target(), "record {i}: undefined cell type, skipped");
                    continue;
                }
                if obj.add_connected_cell(rec.clone(), element, 0, None, None).is_none() {
                    log::warn!(target: ctx.log_target(), "record {i}: rejected {element:?} connectivity {rec:?}");
                }
            }
            obj.pids.entry(0).or_default();
        }
        obj
    }

    /// Container soft-linked to a caller-owned patch.
    pub fn link(kind: MeshKind, patch: &'a mut MeshPatch, ctx: &Context) -> Result<Self, MeshError> {
        Self::adopt(kind, PatchHandle::Borrowed(patch), ctx)
    }

    /// Container taking ownership of an existing patch.
    pub fn absorb(kind: MeshKind, patch: Box<MeshPatch>, ctx: &Context) -> Result<MeshObject<'static>, MeshError> {
        MeshObject::adopt(kind, PatchHandle::Owned(patch), ctx)
    }

    fn adopt(kind: MeshKind, handle: PatchHandle<'a>, ctx: &Context) -> Result<Self, MeshError> {
        let patch = handle.get();
        if patch.vertex_count() == 0 || (patch.cell_count() == 0 && kind != MeshKind::PointCloud) {
            return Err(MeshError::EmptyPatch);
        }
        if let Some(cell) = patch.cells().find(|c| !kind.allows(c.kind())) {
            return Err(MeshError::IncoherentMeshKind {
                kind,
                element: cell.kind(),
            });
        }
        let adjacency = patch.adjacencies_built();
        let interfaces = patch.interfaces_built();
        let mut obj = MeshObject::with_handle(kind, handle, ctx.clone());
        obj.resync_pid();
        if adjacency {
            obj.sync.set(Structure::Adjacency, SyncState::Stale);
        }
        if interfaces {
            obj.sync.set(Structure::Interfaces, SyncState::Stale);
        }
        Ok(obj)
    }

    /// Hard copy into a new owned container with a fresh id.
    ///
    /// Adjacencies and interfaces are rebuilt when the source had them; PID
    /// names are copied.
    pub fn clone_object(&self) -> MeshObject<'static> {
        let mut patch = self.patch().clone();
        patch.clear_interfaces();
        patch.clear_adjacencies();
        let mut obj = MeshObject::with_handle(self.kind, PatchHandle::Owned(Box::new(patch)), self.ctx.clone());
        obj.tolerance = self.tolerance;
        obj.pids = self.pids.clone();
        if self.patch().adjacencies_built() {
            obj.ensure_current(Structure::Adjacency);
        }
        if self.patch().interfaces_built() {
            obj.ensure_current(Structure::Interfaces);
        }
        obj
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> MeshKind {
        self.kind
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn patch(&self) -> &MeshPatch {
        self.patch.get()
    }

    /// Direct patch access. Mutating through it bypasses invalidation; call
    /// [`invalidate_cache`](InvalidateCache::invalidate_cache) afterwards.
    pub fn patch_mut(&mut self) -> &mut MeshPatch {
        self.patch.get_mut()
    }

    pub fn owns_patch(&self) -> bool {
        self.patch.is_owned()
    }

    pub fn is_distributed(&self) -> bool {
        self.ctx.is_distributed()
    }

    pub fn rank(&self) -> usize {
        self.patch().rank()
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Set the coincidence tolerance, clamped to at least 1e-15.
    pub fn set_tolerance(&mut self, tol: f64) {
        self.tolerance = tol.max(crate::config::MIN_TOLERANCE);
    }

    pub fn pids(&self) -> &BTreeMap<i64, String> {
        &self.pids
    }

    pub fn sync_state(&self, s: Structure) -> SyncState {
        self.sync.get(s)
    }

    pub fn is_empty(&self) -> bool {
        self.patch().vertex_count() == 0
    }

    /// Cell tree, if built.
    pub fn cell_tree(&self) -> Option<&SkdTree> {
        self.cell_tree.as_ref()
    }

    /// Vertex kd-tree, if built.
    pub fn point_tree(&self) -> Option<&KdTree> {
        self.point_tree.as_ref()
    }

    /// Query view over the cell tree, if built.
    pub fn tree_view(&self) -> Option<SkdTreeView<'_>> {
        let tree = self.cell_tree.as_ref()?;
        Some(SkdTreeView::new(self.patch(), tree, self.tolerance).with_config(self.ctx.config()))
    }

    pub(crate) fn invalidate(&mut self, structures: &[Structure]) {
        self.sync.invalidate(structures);
    }

    pub(crate) fn log_target(&self) -> &str {
        self.ctx.log_target()
    }
}

impl InvalidateCache for MeshObject<'_> {
    fn invalidate_structures(&mut self, structures: &[Structure]) {
        self.sync.invalidate(structures);
    }
}

impl std::fmt::Debug for MeshObject<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshObject")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("owned", &self.patch.is_owned())
            .field("vertices", &self.patch().vertex_count())
            .field("cells", &self.patch().cell_count())
            .field("sync", &self.sync)
            .finish()
    }
}
