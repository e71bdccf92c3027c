//! Migration of cells to the ranks named by a caller-supplied owner map.
//!
//! Computing the map is left to external graph partitioners. Once applied,
//! every rank holds its interior cells plus one layer of face-neighbour
//! ghosts, and ghost copies keep their ids.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::MeshObject;
use crate::algs::reduction::ReduceOp;
use crate::geometry::Point3;
use crate::mesh_error::MeshError;
use crate::topology::cell::Cell;
use crate::topology::patch::MeshPatch;
use crate::topology::sync::{Structure, SyncState};

#[derive(Default, Serialize, Deserialize)]
struct Migration {
    vertices: Vec<(i64, Point3)>,
    cells: Vec<Cell>,
}

impl MeshObject<'_> {
    /// Move every local interior cell to `owners[cell]` (cells absent from
    /// the map stay where they are). Collective; the map should be the same
    /// on every rank.
    pub fn partition(&mut self, owners: &BTreeMap<i64, usize>) -> Result<(), MeshError> {
        let ctx = self.ctx.clone();
        let comm = ctx.comm();
        let size = comm.size();
        let local_max = owners.values().copied().max().map_or(-1, |m| m as i64);
        let global_max = comm.all_reduce_i64(&[local_max], ReduceOp::Max);
        let found = global_max.first().copied().unwrap_or(-1) + 1;
        if found as usize > size {
            return Err(MeshError::PartitionCountMismatch {
                expected: size,
                found: found as usize,
            });
        }
        if !self.is_distributed() {
            return Ok(());
        }

        let had_adjacency = self.sync_state(Structure::Adjacency) != SyncState::None;
        let had_interfaces = self.sync_state(Structure::Interfaces) != SyncState::None;
        self.ensure_current(Structure::Adjacency);

        let rank = self.rank();
        let patch = self.patch();
        let dest = |c: &Cell| owners.get(&c.id()).copied().unwrap_or(c.owner());
        let mut outgoing: BTreeMap<usize, Migration> = BTreeMap::new();
        let mut layers: BTreeMap<usize, BTreeSet<i64>> = BTreeMap::new();
        for cell in patch.cells().filter(|c| c.owner() == rank) {
            let d = dest(cell);
            let slot = layers.entry(d).or_default();
            slot.insert(cell.id());
            for f in 0..cell.face_count() {
                slot.extend(cell.adjacencies(f).iter().copied());
            }
        }
        for (d, ids) in layers {
            let mut payload = Migration::default();
            let mut verts: BTreeSet<i64> = BTreeSet::new();
            for cell in ids.iter().filter_map(|id| patch.cell(*id)) {
                let moved = Cell::new(cell.id(), cell.kind(), cell.connect().to_vec(), cell.pid(), dest(cell));
                verts.extend(moved.vertex_ids());
                payload.cells.push(moved);
            }
            payload.vertices = verts.into_iter().filter_map(|v| patch.vertex(v).map(|p| (v, p))).collect();
            outgoing.insert(d, payload);
        }
        let mut encoded = BTreeMap::new();
        for (d, payload) in outgoing {
            encoded.insert(d, bincode::serialize(&payload)?);
        }

        let mut fresh = MeshPatch::new(rank);
        let mut ghosts: Vec<Cell> = Vec::new();
        for buf in comm.exchange(encoded).values() {
            let payload: Migration = bincode::deserialize(buf)?;
            for (id, p) in payload.vertices {
                fresh.add_vertex(p, Some(id));
            }
            for cell in payload.cells {
                if cell.owner() == rank {
                    fresh.add_cell(cell.kind(), cell.connect().to_vec(), cell.pid(), rank, Some(cell.id()));
                } else {
                    ghosts.push(cell);
                }
            }
        }
        for cell in ghosts {
            fresh.add_cell(cell.kind(), cell.connect().to_vec(), cell.pid(), cell.owner(), Some(cell.id()));
        }
        let names: Vec<(i64, String)> = self
            .pids
            .iter()
            .filter(|(_, n)| !n.is_empty())
            .map(|(p, n)| (*p, n.clone()))
            .collect();
        let gathered = comm.all_gather_bytes(&bincode::serialize(&names)?);

        *self.patch_mut() = fresh;
        for buf in gathered {
            let remote: Vec<(i64, String)> = bincode::deserialize(&buf)?;
            for (pid, name) in remote {
                self.pids.entry(pid).or_insert(name);
            }
        }
        self.resync_pid();
        self.invalidate(&Structure::ALL);
        for (s, keep) in [(Structure::Adjacency, had_adjacency), (Structure::Interfaces, had_interfaces)] {
            if keep {
                self.sync.set(s, SyncState::Stale);
            } else {
                self.sync.set(s, SyncState::None);
            }
        }
        self.update();
        log::info!(
            target: self.log_target(),
            "object {}: rank {rank} holds {} interior and {} ghost cells after partitioning",
            self.id,
            self.n_internal_cells(),
            self.n_cells() - self.n_internal_cells()
        );
        Ok(())
    }
}
