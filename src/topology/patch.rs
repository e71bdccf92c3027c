//! Unstructured mesh patch: vertex and cell storage keyed by id, face
//! adjacencies, interfaces and a binary dump format.
//!
//! The patch knows nothing about mesh kinds or derived acceleration
//! structures; [`MeshObject`](crate::object::MeshObject) layers those on top.
//! Cells owned by another rank are ghosts. Ghost copies share the owner's
//! cell and vertex ids.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::cell::{Cell, Interface};
use super::cell_type::{ElementType, check_cell_conn_coherence};
use super::ownership::VertexOwnership;
use crate::geometry::{Aabb, Point3};
use crate::mesh_error::MeshError;

/// Bump when the dump layout changes.
pub const PATCH_DUMP_VERSION: u16 = 1;

#[derive(Clone, Debug, Default)]
pub struct MeshPatch {
    rank: usize,
    vertices: BTreeMap<i64, Point3>,
    cells: BTreeMap<i64, Cell>,
    interfaces: BTreeMap<i64, Interface>,
    adjacencies_built: bool,
    interfaces_built: bool,
    altered: BTreeSet<i64>,
}

#[derive(Serialize, Deserialize)]
struct PatchDump {
    version: u16,
    rank: usize,
    vertices: Vec<(i64, Point3)>,
    cells: Vec<Cell>,
    adjacencies_built: bool,
    interfaces_built: bool,
}

impl MeshPatch {
    /// Empty patch living on `rank`.
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            ..Default::default()
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    /// Number of cells owned by this rank.
    pub fn internal_cell_count(&self) -> usize {
        self.cells.values().filter(|c| c.owner() == self.rank).count()
    }

    pub fn vertices(&self) -> impl Iterator<Item = (i64, Point3)> + '_ {
        self.vertices.iter().map(|(id, p)| (*id, *p))
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.cells.values()
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &Interface> + '_ {
        self.interfaces.values()
    }

    pub fn vertex(&self, id: i64) -> Option<Point3> {
        self.vertices.get(&id).copied()
    }

    pub fn cell(&self, id: i64) -> Option<&Cell> {
        self.cells.get(&id)
    }

    pub fn interface(&self, id: i64) -> Option<&Interface> {
        self.interfaces.get(&id)
    }

    pub fn contains_vertex(&self, id: i64) -> bool {
        self.vertices.contains_key(&id)
    }

    pub fn contains_cell(&self, id: i64) -> bool {
        self.cells.contains_key(&id)
    }

    /// True if the cell exists and is owned by another rank.
    pub fn is_ghost_cell(&self, id: i64) -> bool {
        self.cells.get(&id).is_some_and(|c| c.owner() != self.rank)
    }

    pub fn adjacencies_built(&self) -> bool {
        self.adjacencies_built
    }

    pub fn interfaces_built(&self) -> bool {
        self.interfaces_built
    }

    fn next_vertex_id(&self) -> i64 {
        self.vertices.keys().next_back().map_or(0, |id| id + 1)
    }

    fn next_cell_id(&self) -> i64 {
        self.cells.keys().next_back().map_or(0, |id| id + 1)
    }

    /// Insert a vertex; `None` when `id` is already taken.
    pub fn add_vertex(&mut self, coords: Point3, id: Option<i64>) -> Option<i64> {
        let id = match id {
            Some(id) if self.vertices.contains_key(&id) => return None,
            Some(id) => id,
            None => self.next_vertex_id(),
        };
        self.vertices.insert(id, coords);
        Some(id)
    }

    /// Overwrite vertex coordinates; `false` when the vertex is absent.
    pub fn set_vertex_coords(&mut self, id: i64, coords: Point3) -> bool {
        match self.vertices.get_mut(&id) {
            Some(p) => {
                *p = coords;
                true
            }
            None => false,
        }
    }

    pub fn delete_vertex(&mut self, id: i64) -> bool {
        self.vertices.remove(&id).is_some()
    }

    /// Insert a cell after checking its arity and that its vertices exist.
    ///
    /// Returns `None` on a duplicate id or invalid connectivity.
    pub fn add_cell(
        &mut self,
        kind: ElementType,
        connect: Vec<i64>,
        pid: i64,
        owner: usize,
        id: Option<i64>,
    ) -> Option<i64> {
        if !check_cell_conn_coherence(kind, &connect) {
            return None;
        }
        let id = match id {
            Some(id) if self.cells.contains_key(&id) => return None,
            Some(id) => id,
            None => self.next_cell_id(),
        };
        let mut cell = Cell::new(id, kind, connect, pid, owner);
        if !cell.vertex_ids().iter().all(|v| self.vertices.contains_key(v)) {
            return None;
        }
        let n_faces = cell.face_count();
        if self.adjacencies_built {
            cell.adjacency = vec![Vec::new(); n_faces];
        }
        if self.interfaces_built {
            cell.interfaces = vec![Vec::new(); n_faces];
        }
        self.cells.insert(id, cell);
        self.altered.insert(id);
        Some(id)
    }

    /// Remove a cell and detach it from its neighbours and interfaces.
    pub fn delete_cell(&mut self, id: i64) -> Option<Cell> {
        let cell = self.cells.remove(&id)?;
        for neigh in cell.adjacency.iter().flatten() {
            if let Some(other) = self.cells.get_mut(neigh) {
                for list in other.adjacency.iter_mut() {
                    list.retain(|&n| n != id);
                }
            }
        }
        for iface_id in cell.interfaces.iter().flatten() {
            let Some(iface) = self.interfaces.remove(iface_id) else {
                continue;
            };
            let other = if iface.owner == id {
                iface.neigh.map(|(n, _)| n)
            } else {
                Some(iface.owner)
            };
            if let Some(other) = other.and_then(|n| self.cells.get_mut(&n)) {
                for list in other.interfaces.iter_mut() {
                    list.retain(|i| i != iface_id);
                }
            }
        }
        self.altered.insert(id);
        Some(cell)
    }

    pub(crate) fn set_cell_pid(&mut self, id: i64, pid: i64) -> bool {
        match self.cells.get_mut(&id) {
            Some(cell) => {
                cell.set_pid(pid);
                true
            }
            None => false,
        }
    }

    /// Apply a vertex-id substitution to every cell's connectivity.
    pub(crate) fn remap_cell_vertices(&mut self, remap: &BTreeMap<i64, i64>) {
        if remap.is_empty() {
            return;
        }
        for cell in self.cells.values_mut() {
            if cell.vertex_ids().iter().any(|v| remap.contains_key(v)) {
                cell.remap_vertices(|v| remap.get(&v).copied().unwrap_or(v));
                self.altered.insert(cell.id());
            }
        }
    }

    /// Coordinates of a cell's distinct vertices, in first-appearance order.
    pub fn cell_vertex_coords(&self, cell: &Cell) -> Vec<Point3> {
        cell.vertex_ids().iter().filter_map(|v| self.vertex(*v)).collect()
    }

    /// Coordinates of every face loop of a cell.
    pub fn cell_face_coords(&self, cell: &Cell) -> Vec<Vec<Point3>> {
        cell.faces()
            .iter()
            .map(|face| face.iter().filter_map(|v| self.vertex(*v)).collect())
            .collect()
    }

    /// Coordinates of an id list, skipping unknown ids.
    pub fn coords_of(&self, ids: &[i64]) -> Vec<Point3> {
        ids.iter().filter_map(|v| self.vertex(*v)).collect()
    }

    /// Box around every vertex, `None` for an empty patch.
    pub fn bounding_box(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.values())
    }

    /// Every cell containing each vertex.
    pub fn vertex_cells(&self) -> BTreeMap<i64, Vec<i64>> {
        let mut out: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        for cell in self.cells.values() {
            for v in cell.vertex_ids() {
                out.entry(v).or_default().push(cell.id());
            }
        }
        out
    }

    /// Owner rank of every vertex referenced by a cell, lowest rank first.
    pub fn vertex_ownership(&self) -> VertexOwnership {
        let mut own = VertexOwnership::default();
        for cell in self.cells.values() {
            for v in cell.vertex_ids() {
                own.set_owner_min(v, cell.owner(), self.rank);
            }
        }
        for id in self.vertices.keys() {
            if own.owner(*id).is_none() {
                own.set_from_owner(*id, self.rank, self.rank);
            }
        }
        own
    }

    /// Rebuild face adjacencies from shared face vertex sets.
    pub fn build_adjacencies(&mut self) {
        let mut face_map: HashMap<Vec<i64>, Vec<(i64, usize)>> = HashMap::new();
        for cell in self.cells.values() {
            for f in 0..cell.face_count() {
                let mut key = cell.face_vertex_ids(f);
                key.sort_unstable();
                face_map.entry(key).or_default().push((cell.id(), f));
            }
        }
        for cell in self.cells.values_mut() {
            cell.adjacency = vec![Vec::new(); cell.face_count()];
        }
        for sharing in face_map.values().filter(|s| s.len() > 1) {
            for &(id, face) in sharing {
                let neighs: Vec<i64> = sharing
                    .iter()
                    .map(|(n, _)| *n)
                    .filter(|&n| n != id)
                    .collect();
                if let Some(cell) = self.cells.get_mut(&id) {
                    let list = &mut cell.adjacency[face];
                    for n in neighs {
                        if !list.contains(&n) {
                            list.push(n);
                        }
                    }
                }
            }
        }
        self.adjacencies_built = true;
    }

    pub fn clear_adjacencies(&mut self) {
        for cell in self.cells.values_mut() {
            cell.adjacency.clear();
        }
        self.adjacencies_built = false;
    }

    /// Rebuild interfaces, building adjacencies first when needed.
    ///
    /// Each shared face yields one interface owned by the lower cell id; each
    /// face without neighbours yields a border interface.
    pub fn build_interfaces(&mut self) {
        if !self.adjacencies_built {
            self.build_adjacencies();
        }
        self.clear_interfaces();
        let mut records: Vec<Interface> = Vec::new();
        for cell in self.cells.values() {
            for f in 0..cell.face_count() {
                let connect = cell.face_vertex_ids(f);
                let kind = ElementType::face_kind(connect.len());
                let neighs = cell.adjacencies(f);
                if neighs.is_empty() {
                    records.push(Interface {
                        id: records.len() as i64,
                        kind,
                        connect,
                        owner: cell.id(),
                        owner_face: f,
                        neigh: None,
                    });
                    continue;
                }
                let mut key = connect.clone();
                key.sort_unstable();
                for &n in neighs.iter().filter(|&&n| n > cell.id()) {
                    let Some(other) = self.cells.get(&n) else { continue };
                    let Some(nf) = matching_face(other, &key) else { continue };
                    records.push(Interface {
                        id: records.len() as i64,
                        kind,
                        connect: connect.clone(),
                        owner: cell.id(),
                        owner_face: f,
                        neigh: Some((n, nf)),
                    });
                }
            }
        }
        for iface in records {
            if let Some(cell) = self.cells.get_mut(&iface.owner) {
                cell.interfaces[iface.owner_face].push(iface.id);
            }
            if let Some((n, nf)) = iface.neigh {
                if let Some(cell) = self.cells.get_mut(&n) {
                    cell.interfaces[nf].push(iface.id);
                }
            }
            self.interfaces.insert(iface.id, iface);
        }
        self.interfaces_built = true;
    }

    pub fn clear_interfaces(&mut self) {
        self.interfaces.clear();
        for cell in self.cells.values_mut() {
            cell.interfaces = vec![Vec::new(); cell.face_count()];
        }
        self.interfaces_built = false;
    }

    /// Drain the ids of cells added, deleted or remapped since the last call.
    pub fn update(&mut self) -> Vec<i64> {
        std::mem::take(&mut self.altered).into_iter().collect()
    }

    /// Write the patch as a bincode stream.
    pub fn dump<W: Write>(&self, writer: &mut W) -> Result<(), MeshError> {
        let record = PatchDump {
            version: PATCH_DUMP_VERSION,
            rank: self.rank,
            vertices: self.vertices().collect(),
            cells: self.cells.values().cloned().collect(),
            adjacencies_built: self.adjacencies_built,
            interfaces_built: self.interfaces_built,
        };
        bincode::serialize_into(writer, &record)?;
        Ok(())
    }

    /// Read a patch written by [`dump`](Self::dump).
    pub fn restore<R: Read>(reader: &mut R) -> Result<Self, MeshError> {
        let record: PatchDump = bincode::deserialize_from(reader)?;
        if record.version != PATCH_DUMP_VERSION {
            return Err(MeshError::Serialization(format!(
                "unsupported patch dump version {}",
                record.version
            )));
        }
        let mut patch = MeshPatch::new(record.rank);
        patch.vertices = record.vertices.into_iter().collect();
        patch.cells = record.cells.into_iter().map(|c| (c.id(), c)).collect();
        if record.adjacencies_built {
            patch.build_adjacencies();
        }
        if record.interfaces_built {
            patch.build_interfaces();
        }
        Ok(patch)
    }
}

fn matching_face(cell: &Cell, sorted_key: &[i64]) -> Option<usize> {
    (0..cell.face_count()).find(|&f| {
        let mut ids = cell.face_vertex_ids(f);
        ids.sort_unstable();
        ids == sorted_key
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles() -> MeshPatch {
        let mut p = MeshPatch::new(0);
        for (i, c) in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]]
            .into_iter()
            .enumerate()
        {
            p.add_vertex(c, Some(i as i64)).unwrap();
        }
        p.add_cell(ElementType::Triangle, vec![0, 1, 2], 0, 0, None).unwrap();
        p.add_cell(ElementType::Triangle, vec![0, 2, 3], 0, 0, None).unwrap();
        p
    }

    #[test]
    fn rejects_duplicates_and_dangling_vertices() {
        let mut p = two_triangles();
        assert_eq!(p.add_vertex([0.0; 3], Some(1)), None);
        assert_eq!(p.add_vertex([0.0; 3], None), Some(4));
        assert_eq!(p.add_cell(ElementType::Triangle, vec![0, 1, 3], 0, 0, Some(1)), None);
        assert_eq!(p.add_cell(ElementType::Triangle, vec![0, 1, 99], 0, 0, None), None);
        assert_eq!(p.add_cell(ElementType::Quad, vec![0, 1, 2], 0, 0, None), None);
    }

    #[test]
    fn adjacency_and_interfaces() {
        let mut p = two_triangles();
        p.build_interfaces();
        assert!(p.adjacencies_built());
        let c0 = p.cell(0).unwrap();
        assert_eq!(c0.adjacencies(2), &[1]);
        assert!(c0.is_face_border(0));
        // 4 border edges + 1 shared diagonal
        assert_eq!(p.interface_count(), 5);
        assert_eq!(p.interfaces().filter(|i| i.is_border()).count(), 4);
        let shared = p.interfaces().find(|i| !i.is_border()).unwrap();
        assert_eq!(shared.owner(), 0);
        assert_eq!(shared.neigh(), Some((1, 0)));
    }

    #[test]
    fn delete_detaches_neighbours() {
        let mut p = two_triangles();
        p.build_interfaces();
        let removed = p.delete_cell(1).unwrap();
        assert_eq!(removed.id(), 1);
        assert!(p.cell(0).unwrap().is_face_border(2));
        assert!(p.cell(0).unwrap().face_interfaces(2).is_empty());
        assert_eq!(p.update(), vec![0, 1]);
        assert!(p.update().is_empty());
    }

    #[test]
    fn dump_restore_roundtrip() {
        let mut p = two_triangles();
        p.set_cell_pid(1, 4);
        p.build_adjacencies();
        let mut buf = Vec::new();
        p.dump(&mut buf).unwrap();
        let q = MeshPatch::restore(&mut buf.as_slice()).unwrap();
        assert_eq!(q.vertex_count(), 4);
        assert_eq!(q.cell(1).unwrap().pid(), 4);
        assert_eq!(q.cell(1).unwrap().connect(), &[0, 2, 3]);
        assert!(q.adjacencies_built());
        assert!(!q.interfaces_built());
    }
}
