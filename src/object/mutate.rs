//! Incremental mutation of a [`MeshObject`] and PID bookkeeping.
//!
//! Every successful mutation downgrades the structures it can affect from
//! `Current` to `Stale`; nothing is rebuilt until `update` or
//! `ensure_current` is called.

use std::collections::{BTreeMap, BTreeSet};

use super::{MeshKind, MeshObject};
use crate::geometry::Point3;
use crate::topology::cell_type::{ElementType, check_cell_conn_coherence};
use crate::topology::sync::Structure;

const ON_ADD_VERTEX: [Structure; 5] = [
    Structure::PointTree,
    Structure::NumberingInfo,
    Structure::BoundingBox,
    Structure::PointConnectivity,
    Structure::GhostExchange,
];

const ON_MODIFY_VERTEX: [Structure; 5] = [
    Structure::CellTree,
    Structure::PointTree,
    Structure::NumberingInfo,
    Structure::BoundingBox,
    Structure::GhostExchange,
];

const ON_ADD_CELL: [Structure; 6] = [
    Structure::CellTree,
    Structure::Adjacency,
    Structure::Interfaces,
    Structure::NumberingInfo,
    Structure::GhostExchange,
    Structure::PointConnectivity,
];

/// Infer the element kind of a connectivity record for a mesh of `kind`.
///
/// Returns [`ElementType::Undefined`] when no legal kind matches.
pub fn desume_element(kind: MeshKind, conn: &[i64]) -> ElementType {
    let n = conn.len();
    let candidate = match kind {
        MeshKind::Surface => match n {
            3 => ElementType::Triangle,
            4 => ElementType::Quad,
            n if n > 4 => ElementType::Polygon,
            _ => ElementType::Undefined,
        },
        MeshKind::Volume => match n {
            4 => ElementType::Tetra,
            5 => ElementType::Pyramid,
            6 => ElementType::Wedge,
            8 => ElementType::Hexahedron,
            n if n > 8 => ElementType::Polyhedron,
            _ => ElementType::Undefined,
        },
        MeshKind::Curve if n == 2 => ElementType::Line,
        MeshKind::PointCloud if n == 1 => ElementType::Vertex,
        _ => ElementType::Undefined,
    };
    if candidate.is_variable() && !check_cell_conn_coherence(candidate, conn) {
        return ElementType::Undefined;
    }
    candidate
}

impl MeshObject<'_> {
    /// Insert a vertex; `None` when the id is already taken.
    pub fn add_vertex(&mut self, coords: Point3, id: Option<i64>) -> Option<i64> {
        let id = self.patch_mut().add_vertex(coords, id)?;
        self.invalidate(&ON_ADD_VERTEX);
        Some(id)
    }

    /// Move an existing vertex; `false` when it does not exist.
    pub fn modify_vertex(&mut self, coords: Point3, id: i64) -> bool {
        if !self.patch_mut().set_vertex_coords(id, coords) {
            return false;
        }
        self.invalidate(&ON_MODIFY_VERTEX);
        true
    }

    /// Insert a cell over existing vertices.
    ///
    /// `owner` defaults to the local rank. Returns `None` for an illegal kind,
    /// a point cloud, an empty or incoherent connectivity, a duplicate id or a
    /// reference to an unknown vertex.
    pub fn add_connected_cell(
        &mut self,
        conn: Vec<i64>,
        kind: ElementType,
        pid: i64,
        id: Option<i64>,
        owner: Option<usize>,
    ) -> Option<i64> {
        if self.kind() == MeshKind::PointCloud || conn.is_empty() || !self.kind().allows(kind) {
            return None;
        }
        let owner = owner.unwrap_or(self.rank());
        let id = self.patch_mut().add_cell(kind, conn, pid, owner, id)?;
        self.pids.entry(pid).or_default();
        self.invalidate(&ON_ADD_CELL);
        Some(id)
    }

    /// Assign PIDs positionally to the cells in id order. Extra values are
    /// ignored; missing ones leave cells untouched.
    pub fn set_pid(&mut self, pids: &[i64]) {
        let ids: Vec<i64> = self.patch().cells().map(|c| c.id()).collect();
        for (id, pid) in ids.into_iter().zip(pids) {
            self.set_pid_cell(id, *pid);
        }
    }

    /// Assign PIDs by cell id; unknown ids are skipped.
    pub fn set_pid_map(&mut self, pids: &BTreeMap<i64, i64>) {
        for (id, pid) in pids {
            self.set_pid_cell(*id, *pid);
        }
    }

    /// Assign one cell's PID; `false` when the cell does not exist.
    pub fn set_pid_cell(&mut self, id: i64, pid: i64) -> bool {
        if !self.patch_mut().set_cell_pid(id, pid) {
            return false;
        }
        self.pids.entry(pid).or_default();
        true
    }

    /// Name a registered PID; `false` when the PID is unknown.
    pub fn set_pid_name(&mut self, pid: i64, name: impl Into<String>) -> bool {
        match self.pids.get_mut(&pid) {
            Some(slot) => {
                *slot = name.into();
                true
            }
            None => false,
        }
    }

    /// Rebuild the PID set from the cells, keeping the names of the PIDs
    /// still in use.
    pub fn resync_pid(&mut self) {
        let used: BTreeSet<i64> = self.patch().cells().map(|c| c.pid()).collect();
        let mut pids = std::mem::take(&mut self.pids);
        pids.retain(|pid, _| used.contains(pid));
        for pid in used {
            pids.entry(pid).or_default();
        }
        self.pids = pids;
    }

    /// Renumber the PIDs in use as `0..n`, preserving their order and names.
    /// Returns the old-to-new map.
    pub fn compact_pids(&mut self) -> BTreeMap<i64, i64> {
        self.resync_pid();
        let remap: BTreeMap<i64, i64> = self.pids.keys().enumerate().map(|(i, pid)| (*pid, i as i64)).collect();
        let changes: Vec<(i64, i64)> = self
            .patch()
            .cells()
            .filter_map(|c| {
                let new = remap.get(&c.pid()).copied()?;
                (new != c.pid()).then_some((c.id(), new))
            })
            .collect();
        for (id, pid) in changes {
            self.patch_mut().set_cell_pid(id, pid);
        }
        let old = std::mem::take(&mut self.pids);
        self.pids = old
            .into_iter()
            .filter_map(|(pid, name)| remap.get(&pid).map(|new| (*new, name)))
            .collect();
        remap
    }

    /// PID of every cell.
    pub fn cell_pids(&self) -> BTreeMap<i64, i64> {
        self.patch().cells().map(|c| (c.id(), c.pid())).collect()
    }
}
