//! Building, rebuilding and releasing the derived structures of a container.
//!
//! `ensure_current` builds one structure (and what it depends on); `update`
//! brings every stale structure back to `Current` in [`REBUILD_ORDER`].
//! Cell tree, numbering and ghost exchange communicate when the context is
//! distributed, so calls touching them are collective.

use std::collections::{BTreeMap, BTreeSet};

use super::MeshObject;
use crate::algs::communicator::Coordinator;
use crate::algs::reduction::ReduceOp;
use crate::algs::wire::{cast_slice, decode_records};
use crate::spatial::{KdTree, SkdTree};
use crate::topology::patch::MeshPatch;
use crate::topology::sync::{REBUILD_ORDER, Structure, SyncState};

/// Consecutive global numbering of interior cells and vertices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NumberingInfo {
    cell_index: BTreeMap<i64, usize>,
    cell_offset: usize,
    global_cells: usize,
    point_index: BTreeMap<i64, usize>,
    point_offset: usize,
    global_points: usize,
}

impl NumberingInfo {
    fn build(patch: &MeshPatch, comm: &dyn Coordinator) -> Self {
        let cells: Vec<i64> = patch
            .cells()
            .filter(|c| c.owner() == patch.rank())
            .map(|c| c.id())
            .collect();
        let points: Vec<i64> = patch.vertex_ownership().owned_points().collect();
        let counts = comm.all_gather_i64(&[cells.len() as i64, points.len() as i64]);
        let mut info = NumberingInfo::default();
        for (rank, c) in counts.iter().enumerate() {
            let (nc, np) = (c.first().copied().unwrap_or(0) as usize, c.get(1).copied().unwrap_or(0) as usize);
            if rank < comm.rank() {
                info.cell_offset += nc;
                info.point_offset += np;
            }
            info.global_cells += nc;
            info.global_points += np;
        }
        info.cell_index = cells.into_iter().enumerate().map(|(i, id)| (id, info.cell_offset + i)).collect();
        info.point_index = points.into_iter().enumerate().map(|(i, id)| (id, info.point_offset + i)).collect();
        info
    }

    /// Global index of an interior cell.
    pub fn cell_index(&self, id: i64) -> Option<usize> {
        self.cell_index.get(&id).copied()
    }

    pub fn cell_offset(&self) -> usize {
        self.cell_offset
    }

    pub fn global_cells(&self) -> usize {
        self.global_cells
    }

    /// Global index of an interior vertex.
    pub fn point_index(&self, id: i64) -> Option<usize> {
        self.point_index.get(&id).copied()
    }

    pub fn point_offset(&self) -> usize {
        self.point_offset
    }

    pub fn global_points(&self) -> usize {
        self.global_points
    }
}

/// Per-rank lists used to push data from owners to ghost copies.
///
/// `*_sources[r]` are local interior elements that rank `r` holds as ghosts;
/// `*_targets[r]` are local ghosts owned by `r`. Lists are sorted by id, and
/// the sources of one rank match the targets of its peer element for element.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GhostExchange {
    pub cell_sources: BTreeMap<usize, Vec<i64>>,
    pub cell_targets: BTreeMap<usize, Vec<i64>>,
    pub point_sources: BTreeMap<usize, Vec<i64>>,
    pub point_targets: BTreeMap<usize, Vec<i64>>,
}

impl GhostExchange {
    fn build(patch: &MeshPatch, comm: &dyn Coordinator) -> Self {
        let mut out = GhostExchange::default();
        for cell in patch.cells().filter(|c| c.owner() != patch.rank()) {
            out.cell_targets.entry(cell.owner()).or_default().push(cell.id());
        }
        let requests: BTreeMap<usize, Vec<u8>> = out
            .cell_targets
            .iter()
            .map(|(rank, ids)| (*rank, cast_slice(ids).to_vec()))
            .collect();
        for (rank, payload) in comm.exchange(requests) {
            let mut ids: Vec<i64> = decode_records::<i64>(&payload)
                .into_iter()
                .filter(|id| patch.cell(*id).is_some_and(|c| c.owner() == patch.rank()))
                .collect();
            ids.sort_unstable();
            if !ids.is_empty() {
                out.cell_sources.insert(rank, ids);
            }
        }
        let ranks: BTreeSet<usize> = out.cell_sources.keys().chain(out.cell_targets.keys()).copied().collect();
        for rank in ranks {
            let src = vertices_of(patch, out.cell_sources.get(&rank));
            let tgt = vertices_of(patch, out.cell_targets.get(&rank));
            let only_src: Vec<i64> = src.difference(&tgt).copied().collect();
            let only_tgt: Vec<i64> = tgt.difference(&src).copied().collect();
            if !only_src.is_empty() {
                out.point_sources.insert(rank, only_src);
            }
            if !only_tgt.is_empty() {
                out.point_targets.insert(rank, only_tgt);
            }
        }
        out
    }

    /// Ranks sharing at least one element with this one.
    pub fn neighbour_ranks(&self) -> BTreeSet<usize> {
        self.cell_sources.keys().chain(self.cell_targets.keys()).copied().collect()
    }
}

fn vertices_of(patch: &MeshPatch, cells: Option<&Vec<i64>>) -> BTreeSet<i64> {
    cells
        .into_iter()
        .flatten()
        .filter_map(|id| patch.cell(*id))
        .flat_map(|c| c.vertex_ids())
        .collect()
}

// Structures whose rebuild communicates in distributed mode.
const COLLECTIVE: [Structure; 3] = [Structure::CellTree, Structure::NumberingInfo, Structure::GhostExchange];

impl MeshObject<'_> {
    /// Build `s` if it is not current, building its dependencies first.
    ///
    /// Returns `false` for a structure that is not supported by this container.
    pub fn ensure_current(&mut self, s: Structure) -> bool {
        match self.sync.get(s) {
            SyncState::NotSupported => false,
            SyncState::Current => true,
            _ => {
                for dep in s.dependencies() {
                    if !self.ensure_current(*dep) {
                        return false;
                    }
                }
                self.rebuild(s);
                true
            }
        }
    }

    /// Rebuild every stale structure, dependencies first.
    pub fn update(&mut self) {
        let mut stale: Vec<Structure> = self.sync.stale();
        if self.is_distributed() {
            let flags: Vec<i64> = REBUILD_ORDER.iter().map(|s| stale.contains(s) as i64).collect();
            let any = self.ctx.comm().all_reduce_i64(&flags, ReduceOp::Max);
            for (s, f) in REBUILD_ORDER.iter().zip(any) {
                let state = self.sync.get(*s);
                if f > 0 && COLLECTIVE.contains(s) && state != SyncState::NotSupported && !stale.contains(s) {
                    stale.push(*s);
                }
            }
            stale.sort_by_key(|s| REBUILD_ORDER.iter().position(|x| x == s));
        }

        let mut temporary_adjacency = false;
        if self.is_distributed()
            && self.sync.get(Structure::Adjacency) == SyncState::None
            && stale
                .iter()
                .any(|s| matches!(s, Structure::Interfaces | Structure::NumberingInfo | Structure::GhostExchange))
        {
            self.rebuild(Structure::Adjacency);
            temporary_adjacency = true;
        }
        for s in [Structure::Adjacency, Structure::Interfaces] {
            if stale.contains(&s) {
                self.rebuild(s);
            }
        }
        let altered = self.patch_mut().update();
        if !altered.is_empty() {
            log::debug!(target: self.log_target(), "object {}: {} cells altered since last update", self.id, altered.len());
        }
        for s in stale.iter().filter(|s| !matches!(s, Structure::Adjacency | Structure::Interfaces)) {
            self.rebuild(*s);
        }
        if temporary_adjacency {
            self.release(Structure::Adjacency);
        }
    }

    /// Drop a structure; its state goes back to `None`.
    pub fn release(&mut self, s: Structure) {
        if self.sync.get(s) == SyncState::NotSupported {
            return;
        }
        match s {
            Structure::Adjacency => self.patch_mut().clear_adjacencies(),
            Structure::Interfaces => self.patch_mut().clear_interfaces(),
            Structure::CellTree => self.cell_tree = None,
            Structure::PointTree => self.point_tree = None,
            Structure::NumberingInfo => self.numbering = None,
            Structure::BoundingBox => self.bbox = None,
            Structure::PointConnectivity => self.point_connectivity.clear(),
            Structure::GhostExchange => self.ghost_exchange = None,
        }
        self.sync.set(s, SyncState::None);
    }

    fn rebuild(&mut self, s: Structure) {
        if self.sync.get(s) == SyncState::NotSupported {
            return;
        }
        match s {
            Structure::Adjacency => self.patch_mut().build_adjacencies(),
            Structure::Interfaces => self.patch_mut().build_interfaces(),
            Structure::CellTree => {
                let mut tree = SkdTree::build(self.patch(), self.ctx.config().skd_leaf_capacity, true);
                if self.is_distributed() {
                    tree.gather_partition_boxes(self.ctx.comm());
                }
                self.cell_tree = Some(tree);
            }
            Structure::PointTree => self.point_tree = Some(KdTree::from_patch(self.patch())),
            Structure::NumberingInfo => {
                self.numbering = Some(NumberingInfo::build(self.patch.get(), self.ctx.comm()));
            }
            Structure::BoundingBox => self.bbox = self.patch().bounding_box(),
            Structure::PointConnectivity => self.point_connectivity = point_connectivity(self.patch()),
            Structure::GhostExchange => {
                self.ghost_exchange = Some(GhostExchange::build(self.patch.get(), self.ctx.comm()));
            }
        }
        self.sync.set(s, SyncState::Current);
        log::debug!(target: self.log_target(), "object {}: rebuilt {s:?}", self.id);
    }

    /// Numbering info, building it if needed. Collective when distributed.
    pub fn numbering(&mut self) -> Option<&NumberingInfo> {
        self.ensure_current(Structure::NumberingInfo);
        self.numbering.as_ref()
    }

    /// Ghost exchange lists, building them if needed. Collective; `None` on a
    /// serial container.
    pub fn ghost_exchange(&mut self) -> Option<&GhostExchange> {
        if !self.ensure_current(Structure::GhostExchange) {
            return None;
        }
        self.ghost_exchange.as_ref()
    }
}

// Edge-connected neighbours of every vertex referenced by a cell.
fn point_connectivity(patch: &MeshPatch) -> BTreeMap<i64, BTreeSet<i64>> {
    let mut out: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    for cell in patch.cells() {
        for [a, b] in cell.edges() {
            if a == b {
                continue;
            }
            out.entry(a).or_default().insert(b);
            out.entry(b).or_default().insert(a);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::object::MeshKind;

    fn strip(ctx: &Context) -> MeshObject<'static> {
        let verts = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [2.0, 1.0, 0.0],
        ];
        let conn = vec![vec![0, 1, 4, 3], vec![1, 2, 5, 4]];
        MeshObject::from_arrays(MeshKind::Surface, &verts, Some(&conn), ctx)
    }

    #[test]
    fn ensure_current_builds_dependencies() {
        let ctx = Context::serial();
        let mut obj = strip(&ctx);
        assert!(obj.ensure_current(Structure::Interfaces));
        assert_eq!(obj.sync_state(Structure::Adjacency), SyncState::Current);
        assert_eq!(obj.patch().interface_count(), 7);
        assert!(!obj.ensure_current(Structure::GhostExchange));
        assert!(obj.ghost_exchange().is_none());
    }

    #[test]
    fn update_only_touches_stale() {
        let ctx = Context::serial();
        let mut obj = strip(&ctx);
        obj.ensure_current(Structure::PointTree);
        obj.ensure_current(Structure::BoundingBox);
        obj.modify_vertex([2.0, 3.0, 0.0], 5);
        assert_eq!(obj.sync_state(Structure::BoundingBox), SyncState::Stale);
        obj.update();
        assert_eq!(obj.sync_state(Structure::BoundingBox), SyncState::Current);
        assert_eq!(obj.sync_state(Structure::PointTree), SyncState::Current);
        assert_eq!(obj.sync_state(Structure::CellTree), SyncState::None);
        assert_eq!(obj.bounding_box(false).max, [2.0, 3.0, 0.0]);
        let before = obj.sync;
        obj.update();
        assert_eq!(obj.sync, before);
    }

    #[test]
    fn serial_numbering() {
        let ctx = Context::serial();
        let mut obj = strip(&ctx);
        let info = obj.numbering().unwrap().clone();
        assert_eq!(info.global_cells(), 2);
        assert_eq!(info.global_points(), 6);
        assert_eq!(info.cell_index(1), Some(1));
        assert_eq!(info.point_offset(), 0);
    }

    #[test]
    fn connectivity_and_release() {
        let ctx = Context::serial();
        let mut obj = strip(&ctx);
        obj.ensure_current(Structure::PointConnectivity);
        assert_eq!(obj.point_connectivity(4), BTreeSet::from([1, 3, 5]));
        obj.release(Structure::PointConnectivity);
        assert_eq!(obj.sync_state(Structure::PointConnectivity), SyncState::None);
    }
}
