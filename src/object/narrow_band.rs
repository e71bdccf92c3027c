//! Narrow band of a container around an external surface: the cells (by
//! centroid) or vertices lying closer than a threshold to the surface.
//!
//! The band grows breadth-first from accepted seeds through face adjacency
//! (cells) or edge connectivity (vertices); every element is evaluated once.
//! When distributed, elements accepted next to a partition seam are handed to
//! the neighbouring ranks as new seeds until no rank has any left. All ranks
//! must call these functions together, each with its own copy of the surface.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::{MeshKind, MeshObject};
use crate::algs::reduction::ReduceOp;
use crate::algs::wire::{cast_slice, decode_records};
use crate::geometry::Point3;
use crate::mesh_error::MeshError;
use crate::spatial::queries::{distance, select_by_patch};
use crate::spatial::SkdTreeView;
use crate::topology::sync::Structure;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Band {
    Cells,
    Vertices,
}

#[derive(Default)]
struct BandState {
    accepted: BTreeMap<i64, f64>,
    visited: BTreeSet<i64>,
}

impl MeshObject<'_> {
    /// Cells whose centroid lies closer than `max_dist` to `surface`, with
    /// their distances.
    pub fn cells_narrow_band_to_ext_surface_wdist(
        &mut self,
        surface: &mut MeshObject<'_>,
        max_dist: f64,
        seeds: Option<&[i64]>,
    ) -> Result<BTreeMap<i64, f64>, MeshError> {
        self.narrow_band(surface, max_dist, seeds, Band::Cells)
    }

    pub fn cells_narrow_band_to_ext_surface(
        &mut self,
        surface: &mut MeshObject<'_>,
        max_dist: f64,
        seeds: Option<&[i64]>,
    ) -> Result<Vec<i64>, MeshError> {
        Ok(self.narrow_band(surface, max_dist, seeds, Band::Cells)?.into_keys().collect())
    }

    /// Vertices closer than `max_dist` to `surface`, with their distances.
    pub fn vertices_narrow_band_to_ext_surface_wdist(
        &mut self,
        surface: &mut MeshObject<'_>,
        max_dist: f64,
        seeds: Option<&[i64]>,
    ) -> Result<BTreeMap<i64, f64>, MeshError> {
        self.narrow_band(surface, max_dist, seeds, Band::Vertices)
    }

    pub fn vertices_narrow_band_to_ext_surface(
        &mut self,
        surface: &mut MeshObject<'_>,
        max_dist: f64,
        seeds: Option<&[i64]>,
    ) -> Result<Vec<i64>, MeshError> {
        Ok(self.narrow_band(surface, max_dist, seeds, Band::Vertices)?.into_keys().collect())
    }

    fn narrow_band(
        &mut self,
        surface: &mut MeshObject<'_>,
        max_dist: f64,
        seeds: Option<&[i64]>,
        band: Band,
    ) -> Result<BTreeMap<i64, f64>, MeshError> {
        if surface.kind() != MeshKind::Surface || surface.n_cells() == 0 {
            log::warn!(
                target: self.log_target(),
                "object {}: narrow band needs a non-empty surface, got {:?} with {} cells",
                self.id,
                surface.kind(),
                surface.n_cells()
            );
            return Ok(BTreeMap::new());
        }
        // Everything collective is built up front, on every rank.
        surface.ensure_current(Structure::CellTree);
        let has_tree = self.ensure_current(Structure::CellTree);
        let has_links = match band {
            Band::Cells => self.ensure_current(Structure::Adjacency),
            Band::Vertices => self.ensure_current(Structure::PointConnectivity),
        };
        let shared = if self.is_distributed() {
            self.shared_by_rank(band)
        } else {
            BTreeMap::new()
        };
        let view = surface
            .tree_view()
            .ok_or_else(|| MeshError::InvalidGeometry("surface has no cell tree".into()))?;

        let mut state = BandState::default();
        if band == Band::Cells && self.is_point_cloud() {
            return self.finish_band(state, &view, &shared, max_dist, band);
        }
        let mut frontier = Vec::new();
        for id in seeds.unwrap_or_default() {
            if self.element_point(band, *id).is_some() {
                self.visit(&mut state, &view, *id, max_dist, band, &mut frontier)?;
            }
        }
        if state.accepted.is_empty() {
            let candidates: Vec<i64> = match (has_tree, self.cell_tree(), surface.cell_tree()) {
                (true, Some(own), Some(ext)) => {
                    let cells = select_by_patch(ext, own, max_dist);
                    match band {
                        Band::Cells => cells,
                        Band::Vertices => self.vertex_from_cell_list(&cells),
                    }
                }
                _ => self.vertex_ids(false),
            };
            for id in candidates {
                if !state.visited.contains(&id) {
                    self.visit(&mut state, &view, id, max_dist, band, &mut frontier)?;
                }
            }
        }
        if has_links {
            self.propagate(&mut state, &view, frontier, max_dist, band)?;
        }
        self.finish_band(state, &view, &shared, max_dist, band)
    }

    // Hand accepted seam elements to the neighbouring ranks until no rank
    // receives anything new.
    fn finish_band(
        &self,
        mut state: BandState,
        view: &SkdTreeView<'_>,
        shared: &BTreeMap<usize, BTreeSet<i64>>,
        max_dist: f64,
        band: Band,
    ) -> Result<BTreeMap<i64, f64>, MeshError> {
        if !self.is_distributed() {
            return Ok(state.accepted);
        }
        let comm = self.ctx.comm();
        let mut fresh: BTreeSet<i64> = state.accepted.keys().copied().collect();
        loop {
            let outgoing: BTreeMap<usize, Vec<u8>> = shared
                .iter()
                .map(|(rank, ids)| {
                    let send: Vec<i64> = fresh.intersection(ids).copied().collect();
                    (*rank, cast_slice(&send).to_vec())
                })
                .collect();
            let before: BTreeSet<i64> = state.accepted.keys().copied().collect();
            let mut frontier = Vec::new();
            for buf in comm.exchange(outgoing).values() {
                for id in decode_records::<i64>(buf) {
                    if !state.visited.contains(&id) && self.element_point(band, id).is_some() {
                        self.visit(&mut state, view, id, max_dist, band, &mut frontier)?;
                    }
                }
            }
            let received = comm.all_reduce_i64(&[frontier.len() as i64], ReduceOp::Sum);
            if received.first().copied().unwrap_or(0) == 0 {
                break;
            }
            self.propagate(&mut state, view, frontier, max_dist, band)?;
            fresh = state.accepted.keys().filter(|id| !before.contains(id)).copied().collect();
        }
        log::debug!(
            target: self.log_target(),
            "object {}: narrow band of {} {:?} on rank {}",
            self.id,
            state.accepted.len(),
            band,
            self.rank()
        );
        Ok(state.accepted)
    }

    // Elements shared with every other rank, from the ghost exchange lists.
    fn shared_by_rank(&mut self, band: Band) -> BTreeMap<usize, BTreeSet<i64>> {
        let Some(ghosts) = self.ghost_exchange().cloned() else {
            return BTreeMap::new();
        };
        let mut out: BTreeMap<usize, BTreeSet<i64>> = BTreeMap::new();
        for lists in [&ghosts.cell_sources, &ghosts.cell_targets] {
            for (rank, cells) in lists {
                let slot = out.entry(*rank).or_default();
                match band {
                    Band::Cells => slot.extend(cells.iter().copied()),
                    Band::Vertices => slot.extend(self.vertex_from_cell_list(cells)),
                }
            }
        }
        out
    }

    fn element_point(&self, band: Band, id: i64) -> Option<Point3> {
        match band {
            Band::Cells => self.patch().cell(id).map(|_| self.eval_cell_centroid(id)),
            Band::Vertices => self.patch().vertex(id),
        }
    }

    // Evaluate one element; accepted ones join the frontier.
    fn visit(
        &self,
        state: &mut BandState,
        view: &SkdTreeView<'_>,
        id: i64,
        max_dist: f64,
        band: Band,
        frontier: &mut Vec<i64>,
    ) -> Result<(), MeshError> {
        if !state.visited.insert(id) {
            return Ok(());
        }
        let Some(p) = self.element_point(band, id) else {
            return Ok(());
        };
        let d = distance(p, view, max_dist)?.distance;
        if d < max_dist {
            state.accepted.insert(id, d);
            frontier.push(id);
        }
        Ok(())
    }

    fn propagate(
        &self,
        state: &mut BandState,
        view: &SkdTreeView<'_>,
        frontier: Vec<i64>,
        max_dist: f64,
        band: Band,
    ) -> Result<(), MeshError> {
        let mut queue: VecDeque<i64> = frontier.into();
        let mut next = Vec::new();
        while let Some(id) = queue.pop_front() {
            for n in self.band_neighbours(band, id) {
                self.visit(state, view, n, max_dist, band, &mut next)?;
            }
            queue.extend(next.drain(..));
        }
        Ok(())
    }

    fn band_neighbours(&self, band: Band, id: i64) -> Vec<i64> {
        match band {
            Band::Cells => self
                .patch()
                .cell(id)
                .map(|c| (0..c.face_count()).flat_map(|f| c.adjacencies(f).to_vec()).collect())
                .unwrap_or_default(),
            Band::Vertices => self
                .point_connectivity
                .get(&id)
                .map(|s| s.iter().copied().collect())
                .unwrap_or_default(),
        }
    }
}
