//! Boundary and border extraction.
//!
//! *Boundary* is the physical boundary of the whole (possibly distributed)
//! mesh. *Border* is any local face without a neighbour, partition seams
//! included; it never communicates.

use std::collections::{BTreeMap, BTreeSet};

use super::{MeshKind, MeshObject};
use crate::algs::wire::{cast_slice, decode_records};
use crate::mesh_error::MeshError;
use crate::topology::cell_type::ElementType;
use crate::topology::patch::MeshPatch;
use crate::topology::sync::{Structure, SyncState};

impl MeshObject<'_> {
    /// Boundary faces per cell.
    ///
    /// Interior cells contribute their neighbourless faces. With
    /// `include_ghosts`, ghost cells contribute the faces their owner reports
    /// as boundary; this is collective when distributed.
    pub fn extract_boundary_face_cell_id(&mut self, include_ghosts: bool) -> BTreeMap<i64, BTreeSet<usize>> {
        let mut out: BTreeMap<i64, BTreeSet<usize>> = BTreeMap::new();
        if !self.ensure_current(Structure::Adjacency) {
            return out;
        }
        let rank = self.rank();
        for cell in self.patch().cells().filter(|c| c.owner() == rank) {
            let faces: BTreeSet<usize> = (0..cell.face_count()).filter(|&f| cell.is_face_border(f)).collect();
            if !faces.is_empty() {
                out.insert(cell.id(), faces);
            }
        }
        if include_ghosts && self.is_distributed() {
            for (cell, face) in self.confirm_ghost_boundary(&out) {
                out.entry(cell).or_default().insert(face);
            }
        }
        out
    }

    // Owners send the boundary faces of their source cells to every rank
    // holding those cells as ghosts.
    fn confirm_ghost_boundary(&mut self, interior: &BTreeMap<i64, BTreeSet<usize>>) -> Vec<(i64, usize)> {
        let Some(ghosts) = self.ghost_exchange().cloned() else {
            return Vec::new();
        };
        let outgoing: BTreeMap<usize, Vec<u8>> = ghosts
            .cell_sources
            .iter()
            .map(|(rank, cells)| {
                let pairs: Vec<i64> = cells
                    .iter()
                    .filter_map(|id| interior.get(id).map(|faces| (id, faces)))
                    .flat_map(|(id, faces)| faces.iter().flat_map(move |f| [*id, *f as i64]))
                    .collect();
                (*rank, cast_slice(&pairs).to_vec())
            })
            .collect();
        let patch = self.patch();
        self.ctx
            .comm()
            .exchange(outgoing)
            .values()
            .flat_map(|buf| {
                decode_records::<i64>(buf)
                    .chunks_exact(2)
                    .map(|p| (p[0], p[1] as usize))
                    .collect::<Vec<_>>()
            })
            .filter(|(id, f)| patch.cell(*id).is_some_and(|c| *f < c.face_count()))
            .collect()
    }

    /// Cells with at least one boundary face.
    pub fn extract_boundary_cell_id(&mut self, include_ghosts: bool) -> Vec<i64> {
        self.extract_boundary_face_cell_id(include_ghosts).into_keys().collect()
    }

    /// Sorted vertices of the boundary faces.
    pub fn extract_boundary_vertex_id(&mut self, include_ghosts: bool) -> Vec<i64> {
        let faces = self.extract_boundary_face_cell_id(include_ghosts);
        face_vertices(self.patch(), &faces)
    }

    /// Border interfaces lying on boundary faces.
    pub fn extract_boundary_interface_id(&mut self, include_ghosts: bool) -> Vec<i64> {
        let faces = self.extract_boundary_face_cell_id(include_ghosts);
        if !self.ensure_current(Structure::Interfaces) {
            return Vec::new();
        }
        face_interfaces(self.patch(), &faces)
    }

    /// Neighbourless faces of every local cell, ghosts included.
    pub fn border_face_cells(&mut self) -> BTreeMap<i64, BTreeSet<usize>> {
        let mut out = BTreeMap::new();
        if !self.ensure_current(Structure::Adjacency) {
            return out;
        }
        for cell in self.patch().cells() {
            let faces: BTreeSet<usize> = (0..cell.face_count()).filter(|&f| cell.is_face_border(f)).collect();
            if !faces.is_empty() {
                out.insert(cell.id(), faces);
            }
        }
        out
    }

    pub fn border_cells(&mut self) -> Vec<i64> {
        self.border_face_cells().into_keys().collect()
    }

    pub fn border_vertices(&mut self) -> Vec<i64> {
        let faces = self.border_face_cells();
        face_vertices(self.patch(), &faces)
    }

    /// The local boundary as a container of the next lower dimension.
    ///
    /// Each boundary interface becomes a cell carrying the interface id and
    /// the PID of its owner cell. Returns `None` for a point cloud.
    pub fn extract_boundary_mesh(&mut self) -> Result<Option<MeshObject<'static>>, MeshError> {
        let Some(kind) = self.kind().boundary_kind() else {
            return Ok(None);
        };
        let had_interfaces = self.sync_state(Structure::Interfaces) != SyncState::None;
        let faces = self.extract_boundary_face_cell_id(false);
        self.ensure_current(Structure::Interfaces);
        let interfaces = face_interfaces(self.patch(), &faces);

        let src = self.patch();
        let mut patch = MeshPatch::new(src.rank());
        for v in interfaces
            .iter()
            .filter_map(|id| src.interface(*id))
            .flat_map(|i| i.vertex_ids().iter().copied())
            .collect::<BTreeSet<i64>>()
        {
            if let Some(p) = src.vertex(v) {
                patch.add_vertex(p, Some(v));
            }
        }
        for iface in interfaces.iter().filter_map(|id| src.interface(*id)) {
            let Some(owner) = src.cell(iface.owner()) else { continue };
            let mut connect = iface.vertex_ids().to_vec();
            if iface.kind() == ElementType::Polygon {
                connect.insert(0, connect.len() as i64);
            }
            if patch
                .add_cell(iface.kind(), connect, owner.pid(), owner.owner(), Some(iface.id()))
                .is_none()
            {
                log::warn!(target: self.log_target(), "boundary interface {} skipped", iface.id());
            }
        }
        if !had_interfaces {
            self.release(Structure::Interfaces);
        }

        let mut boundary = if patch.vertex_count() == 0 {
            MeshObject::new(kind, &self.ctx)
        } else {
            MeshObject::absorb(kind, Box::new(patch), &self.ctx)?
        };
        boundary.set_tolerance(self.tolerance);
        for (pid, name) in &self.pids {
            boundary.set_pid_name(*pid, name.clone());
        }
        log::debug!(
            target: self.log_target(),
            "object {}: boundary mesh {} with {} cells",
            self.id,
            boundary.id(),
            boundary.n_cells()
        );
        Ok(Some(boundary))
    }

    /// Cells tagged with `pid`, empty for an unknown PID.
    pub fn extract_pid_cells(&self, pid: i64) -> Vec<i64> {
        self.extract_pid_cells_list(&[pid])
    }

    /// Cells tagged with any of `pids`.
    pub fn extract_pid_cells_list(&self, pids: &[i64]) -> Vec<i64> {
        let wanted: BTreeSet<i64> = pids.iter().copied().filter(|p| self.pids.contains_key(p)).collect();
        if wanted.is_empty() {
            return Vec::new();
        }
        self.patch()
            .cells()
            .filter(|c| wanted.contains(&c.pid()))
            .map(|c| c.id())
            .collect()
    }

    /// Cells grouped by PID.
    pub fn extract_pid_subdivision(&self) -> BTreeMap<i64, Vec<i64>> {
        let mut out: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for cell in self.patch().cells() {
            out.entry(cell.pid()).or_default().push(cell.id());
        }
        out
    }

    pub(crate) fn is_point_cloud(&self) -> bool {
        self.kind() == MeshKind::PointCloud
    }
}

fn face_vertices(patch: &MeshPatch, faces: &BTreeMap<i64, BTreeSet<usize>>) -> Vec<i64> {
    let set: BTreeSet<i64> = faces
        .iter()
        .filter_map(|(id, fs)| patch.cell(*id).map(|c| (c, fs)))
        .flat_map(|(c, fs)| fs.iter().flat_map(|f| c.face_vertex_ids(*f)))
        .collect();
    set.into_iter().collect()
}

fn face_interfaces(patch: &MeshPatch, faces: &BTreeMap<i64, BTreeSet<usize>>) -> Vec<i64> {
    let set: BTreeSet<i64> = faces
        .iter()
        .filter_map(|(id, fs)| patch.cell(*id).map(|c| (c, fs)))
        .flat_map(|(c, fs)| fs.iter().flat_map(|f| c.face_interfaces(*f).to_vec()))
        .collect();
    set.into_iter().collect()
}
