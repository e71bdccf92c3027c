//! Read-side queries: ids and counts, list conversions, local topology walks,
//! compact maps and the bounding box.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::{MeshKind, MeshObject};
use crate::algs::reduction::ReduceOp;
use crate::geometry::Aabb;
use crate::topology::sync::Structure;

impl MeshObject<'_> {
    /// Cell ids in ascending order; ghosts are skipped with `internals_only`.
    pub fn cell_ids(&self, internals_only: bool) -> Vec<i64> {
        let rank = self.rank();
        self.patch()
            .cells()
            .filter(|c| !internals_only || c.owner() == rank)
            .map(|c| c.id())
            .collect()
    }

    /// Vertex ids in ascending order; ghost vertices are skipped with
    /// `internals_only`.
    pub fn vertex_ids(&self, internals_only: bool) -> Vec<i64> {
        if !internals_only {
            return self.patch().vertices().map(|(id, _)| id).collect();
        }
        self.patch().vertex_ownership().owned_points().collect()
    }

    pub fn n_cells(&self) -> usize {
        self.patch().cell_count()
    }

    pub fn n_vertices(&self) -> usize {
        self.patch().vertex_count()
    }

    pub fn n_internal_cells(&self) -> usize {
        self.patch().internal_cell_count()
    }

    pub fn n_internal_vertices(&self) -> usize {
        self.patch().vertex_ownership().owned_points().count()
    }

    /// Interior cells over every rank. Collective when distributed.
    pub fn n_global_cells(&mut self) -> usize {
        self.numbering().map_or(0, |n| n.global_cells())
    }

    /// Interior vertices over every rank. Collective when distributed.
    pub fn n_global_vertices(&mut self) -> usize {
        self.numbering().map_or(0, |n| n.global_points())
    }

    /// Global interior cell count and the offset of this rank's first cell.
    pub fn cell_global_count_offset(&mut self) -> (usize, usize) {
        self.numbering().map_or((0, 0), |n| (n.global_cells(), n.cell_offset()))
    }

    /// Global interior vertex count and the offset of this rank's first vertex.
    pub fn point_global_count_offset(&mut self) -> (usize, usize) {
        self.numbering().map_or((0, 0), |n| (n.global_points(), n.point_offset()))
    }

    /// True when the vertex exists and is owned by this rank.
    pub fn is_point_interior(&self, id: i64) -> bool {
        self.patch().vertex_ownership().is_ghost(id) == Some(false)
    }

    /// Sorted unique vertices of the given cells.
    pub fn vertex_from_cell_list(&self, cells: &[i64]) -> Vec<i64> {
        let set: BTreeSet<i64> = cells
            .iter()
            .filter_map(|id| self.patch().cell(*id))
            .flat_map(|c| c.vertex_ids())
            .collect();
        set.into_iter().collect()
    }

    /// Cells whose vertices all lie in `vertices` (`strict`) or that touch at
    /// least one of them.
    pub fn cell_from_vertex_list(&self, vertices: &[i64], strict: bool) -> Vec<i64> {
        let set: BTreeSet<i64> = vertices.iter().copied().collect();
        self.patch()
            .cells()
            .filter(|c| {
                let ids = c.vertex_ids();
                if strict {
                    ids.iter().all(|v| set.contains(v))
                } else {
                    ids.iter().any(|v| set.contains(v))
                }
            })
            .map(|c| c.id())
            .collect()
    }

    /// Interfaces touching the given cells. Without `all`, only interfaces
    /// with both sides in the list (or border interfaces of listed cells).
    pub fn interface_from_cell_list(&mut self, cells: &[i64], all: bool) -> Vec<i64> {
        if !self.ensure_current(Structure::Interfaces) {
            return Vec::new();
        }
        let set: BTreeSet<i64> = cells.iter().copied().collect();
        let mut out: BTreeSet<i64> = BTreeSet::new();
        for iface in self.patch().interfaces() {
            let owner_in = set.contains(&iface.owner());
            let neigh_in = iface.neigh().is_some_and(|(n, _)| set.contains(&n));
            let keep = if all {
                owner_in || neigh_in
            } else {
                owner_in && (iface.is_border() || neigh_in)
            };
            if keep {
                out.insert(iface.id());
            }
        }
        out.into_iter().collect()
    }

    /// Interfaces by vertex membership, with the same `strict` rule as
    /// [`cell_from_vertex_list`](Self::cell_from_vertex_list). With `border`,
    /// only border interfaces are returned.
    pub fn interface_from_vertex_list(&mut self, vertices: &[i64], strict: bool, border: bool) -> Vec<i64> {
        if !self.ensure_current(Structure::Interfaces) {
            return Vec::new();
        }
        let set: BTreeSet<i64> = vertices.iter().copied().collect();
        self.patch()
            .interfaces()
            .filter(|i| !border || i.is_border())
            .filter(|i| {
                let ids = i.vertex_ids();
                if strict {
                    ids.iter().all(|v| set.contains(v))
                } else {
                    ids.iter().any(|v| set.contains(v))
                }
            })
            .map(|i| i.id())
            .collect()
    }

    /// Vertices sharing a cell with `vertex` around the fan reached from
    /// `cell` through faces containing `vertex`.
    pub fn find_vertex_vertex_one_ring(&mut self, cell: i64, vertex: i64) -> BTreeSet<i64> {
        let mut ring = BTreeSet::new();
        if self.kind() == MeshKind::PointCloud || self.patch().is_ghost_cell(cell) {
            return ring;
        }
        if !self.patch().cell(cell).is_some_and(|c| c.find_vertex(vertex).is_some()) {
            return ring;
        }
        self.ensure_current(Structure::Adjacency);
        let patch = self.patch();
        let mut visited = BTreeSet::from([cell]);
        let mut queue = VecDeque::from([cell]);
        while let Some(id) = queue.pop_front() {
            let Some(c) = patch.cell(id) else { continue };
            ring.extend(c.vertex_ids());
            for f in 0..c.face_count() {
                if !c.face_vertex_ids(f).contains(&vertex) {
                    continue;
                }
                for &n in c.adjacencies(f) {
                    if visited.insert(n) {
                        queue.push_back(n);
                    }
                }
            }
        }
        ring.remove(&vertex);
        ring
    }

    /// One cell containing each vertex (the last in id order).
    pub fn inverse_connectivity(&self) -> BTreeMap<i64, i64> {
        let mut out = BTreeMap::new();
        if self.kind() == MeshKind::PointCloud {
            return out;
        }
        for cell in self.patch().cells() {
            for v in cell.vertex_ids() {
                out.insert(v, cell.id());
            }
        }
        out
    }

    /// Edge-connected neighbours of a vertex.
    pub fn point_connectivity(&mut self, vertex: i64) -> BTreeSet<i64> {
        if !self.ensure_current(Structure::PointConnectivity) {
            return BTreeSet::new();
        }
        self.point_connectivity.get(&vertex).cloned().unwrap_or_default()
    }

    /// True when no interior cell has a border face. Collective when
    /// distributed.
    pub fn is_closed_loop(&mut self) -> bool {
        let local = if self.ensure_current(Structure::Adjacency) {
            let rank = self.rank();
            !self
                .patch()
                .cells()
                .filter(|c| c.owner() == rank)
                .any(|c| (0..c.face_count()).any(|f| c.is_face_border(f)))
        } else {
            false
        };
        if !self.is_distributed() {
            return local;
        }
        let reduced = self.ctx.comm().all_reduce_i64(&[local as i64], ReduceOp::Min);
        reduced.first().is_some_and(|v| *v == 1)
    }

    /// Connected components of the face-adjacency graph, each sorted.
    pub fn decompose_loop(&mut self) -> Vec<Vec<i64>> {
        if !self.ensure_current(Structure::Adjacency) {
            return Vec::new();
        }
        let patch = self.patch();
        let mut seen: BTreeSet<i64> = BTreeSet::new();
        let mut components = Vec::new();
        for start in patch.cells().map(|c| c.id()) {
            if !seen.insert(start) {
                continue;
            }
            let mut component = vec![start];
            let mut stack = vec![start];
            while let Some(id) = stack.pop() {
                let Some(c) = patch.cell(id) else { continue };
                for f in 0..c.face_count() {
                    for &n in c.adjacencies(f) {
                        if seen.insert(n) {
                            component.push(n);
                            stack.push(n);
                        }
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    /// Compact index to vertex id. Without ghosts, only interior vertices.
    pub fn vertex_map_data(&self, with_ghosts: bool) -> Vec<i64> {
        self.vertex_ids(!with_ghosts)
    }

    /// Vertex id to compact index.
    pub fn vertex_map_data_inv(&self, with_ghosts: bool) -> BTreeMap<i64, usize> {
        invert(&self.vertex_map_data(with_ghosts))
    }

    /// Compact index to cell id. Without ghosts, only interior cells.
    pub fn cell_map_data(&self, with_ghosts: bool) -> Vec<i64> {
        self.cell_ids(!with_ghosts)
    }

    /// Cell id to compact index.
    pub fn cell_map_data_inv(&self, with_ghosts: bool) -> BTreeMap<i64, usize> {
        invert(&self.cell_map_data(with_ghosts))
    }

    /// Raw connectivity of every cell, in id order.
    pub fn connectivity(&self) -> Vec<Vec<i64>> {
        self.patch().cells().map(|c| c.connect().to_vec()).collect()
    }

    /// Connectivity of every cell with vertex ids replaced by compact vertex
    /// indices (count prefixes of variable kinds are kept).
    pub fn compact_connectivity(&self) -> Vec<Vec<i64>> {
        let index = self.vertex_map_data_inv(true);
        self.patch()
            .cells()
            .map(|c| {
                let mut c = c.clone();
                c.remap_vertices(|v| index.get(&v).map_or(-1, |i| *i as i64));
                c.connect().to_vec()
            })
            .collect()
    }

    /// Bounding box of the vertices; with `global`, the union over every rank
    /// (collective).
    pub fn bounding_box(&mut self, global: bool) -> Aabb {
        self.ensure_current(Structure::BoundingBox);
        let local = self.bbox.unwrap_or(Aabb::EMPTY);
        if !global || !self.is_distributed() {
            return local;
        }
        let packed = [
            local.min[0],
            local.min[1],
            local.min[2],
            -local.max[0],
            -local.max[1],
            -local.max[2],
        ];
        let r = self.ctx.comm().all_reduce_f64(&packed, ReduceOp::Min);
        match r.as_slice() {
            [a, b, c, d, e, f] => Aabb::new([*a, *b, *c], [-d, -e, -f]),
            _ => local,
        }
    }
}

fn invert(ids: &[i64]) -> BTreeMap<i64, usize> {
    ids.iter().enumerate().map(|(i, id)| (*id, i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::topology::cell_type::ElementType;

    // 2x2 quads over a 3x3 vertex grid, ids row-major.
    fn grid(ctx: &Context) -> MeshObject<'static> {
        let mut verts = Vec::new();
        for j in 0..3 {
            for i in 0..3 {
                verts.push([i as f64, j as f64, 0.0]);
            }
        }
        let conn = vec![vec![0, 1, 4, 3], vec![1, 2, 5, 4], vec![3, 4, 7, 6], vec![4, 5, 8, 7]];
        MeshObject::from_arrays(MeshKind::Surface, &verts, Some(&conn), ctx)
    }

    #[test]
    fn list_conversions() {
        let ctx = Context::serial();
        let mut obj = grid(&ctx);
        assert_eq!(obj.vertex_from_cell_list(&[0, 3]), vec![0, 1, 3, 4, 5, 7, 8]);
        assert_eq!(obj.cell_from_vertex_list(&[0, 1, 3, 4], true), vec![0]);
        assert_eq!(obj.cell_from_vertex_list(&[4], false), vec![0, 1, 2, 3]);
        let all = obj.interface_from_cell_list(&[0], true);
        assert_eq!(all.len(), 4);
        let inner = obj.interface_from_cell_list(&[0, 1], false);
        // cell 0: 2 border + shared with 1; cell 1: 2 border
        assert_eq!(inner.len(), 5);
        let border = obj.interface_from_vertex_list(&[0, 1, 2], true, true);
        assert_eq!(border.len(), 2);
    }

    #[test]
    fn one_ring_and_inverse() {
        let ctx = Context::serial();
        let mut obj = grid(&ctx);
        assert_eq!(obj.find_vertex_vertex_one_ring(0, 4), BTreeSet::from([0, 1, 2, 3, 5, 6, 7, 8]));
        assert_eq!(obj.find_vertex_vertex_one_ring(0, 0), BTreeSet::from([1, 3, 4]));
        assert!(obj.find_vertex_vertex_one_ring(0, 8).is_empty());
        let inv = obj.inverse_connectivity();
        assert_eq!(inv[&4], 3);
        assert_eq!(inv[&0], 0);
    }

    #[test]
    fn loops_and_components() {
        let ctx = Context::serial();
        let mut obj = grid(&ctx);
        assert!(!obj.is_closed_loop());
        obj.add_vertex([10.0, 0.0, 0.0], Some(20));
        obj.add_vertex([11.0, 0.0, 0.0], Some(21));
        obj.add_vertex([10.0, 1.0, 0.0], Some(22));
        obj.add_connected_cell(vec![20, 21, 22], ElementType::Triangle, 0, Some(9), None);
        assert_eq!(obj.decompose_loop(), vec![vec![0, 1, 2, 3], vec![9]]);

        // closed triangle loop of lines
        let verts = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let conn = vec![vec![0, 1], vec![1, 2], vec![2, 0]];
        let mut curve = MeshObject::from_arrays(MeshKind::Curve, &verts, Some(&conn), &ctx);
        assert!(curve.is_closed_loop());
    }

    #[test]
    fn compact_maps() {
        let ctx = Context::serial();
        let mut obj = MeshObject::new(MeshKind::Surface, &ctx);
        for (id, x) in [(10, 0.0), (20, 1.0), (30, 2.0)] {
            obj.add_vertex([x, x * x, 0.0], Some(id));
        }
        obj.add_connected_cell(vec![3, 10, 20, 30], ElementType::Polygon, 0, Some(5), None);
        assert_eq!(obj.vertex_map_data(true), vec![10, 20, 30]);
        assert_eq!(obj.cell_map_data_inv(true)[&5], 0);
        assert_eq!(obj.connectivity(), vec![vec![3, 10, 20, 30]]);
        assert_eq!(obj.compact_connectivity(), vec![vec![3, 0, 1, 2]]);
        assert_eq!(obj.bounding_box(true).max, [2.0, 4.0, 0.0]);
        assert!(obj.is_point_interior(10));
        assert!(!obj.is_point_interior(11));
    }
}
