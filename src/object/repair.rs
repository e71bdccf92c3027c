//! Geometry repair: coincident and orphan vertex cleanup, degenerate element
//! degradation and fan triangulation.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

use super::{MeshKind, MeshObject};
use crate::geometry::vector::distance;
use crate::mesh_error::MeshError;
use crate::spatial::KdTree;
use crate::spatial::skd_tree::surface_loop_ids;
use crate::topology::cell::Cell;
use crate::topology::cell_type::ElementType;
use crate::topology::sync::Structure;

/// Outcome of [`MeshObject::degrade_degenerate_elements`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DegenerateReport {
    /// Cells re-added under a new form, as they were before.
    pub degraded: BTreeMap<i64, Cell>,
    /// Cells removed because nothing legal was left of them.
    pub deleted: Vec<i64>,
    /// Collapsed vertex to the vertex it collapsed onto.
    pub collapsed: BTreeMap<i64, i64>,
}

impl DegenerateReport {
    pub fn is_empty(&self) -> bool {
        self.degraded.is_empty() && self.deleted.is_empty() && self.collapsed.is_empty()
    }
}

impl MeshObject<'_> {
    /// Delete orphan ghosts, merge coincident vertices and drop unreferenced
    /// ones. Returns `true` if the patch changed.
    pub fn clean_geometry(&mut self) -> bool {
        let mut changed = false;
        if self.is_distributed() && self.ensure_current(Structure::Adjacency) {
            let rank = self.rank();
            let patch = self.patch();
            let orphans: Vec<i64> = patch
                .cells()
                .filter(|c| c.owner() != rank)
                .filter(|c| {
                    !(0..c.face_count())
                        .flat_map(|f| c.adjacencies(f))
                        .any(|n| patch.cell(*n).is_some_and(|nc| nc.owner() == rank))
                })
                .map(|c| c.id())
                .collect();
            for id in &orphans {
                self.patch_mut().delete_cell(*id);
            }
            if !orphans.is_empty() {
                log::info!(target: self.log_target(), "object {}: removed {} orphan ghosts", self.id, orphans.len());
                changed = true;
            }
        }

        let merged = self.merge_coincident_vertices();
        if !merged.is_empty() {
            log::info!(target: self.log_target(), "object {}: merged {} coincident vertices", self.id, merged.len());
            changed = true;
        }

        if self.kind() != MeshKind::PointCloud {
            let orphans = self.unreferenced_vertices();
            for id in &orphans {
                self.patch_mut().delete_vertex(*id);
            }
            if !orphans.is_empty() {
                log::info!(target: self.log_target(), "object {}: removed {} orphan vertices", self.id, orphans.len());
                changed = true;
            }
        }
        if changed {
            self.invalidate(&Structure::ALL);
        }
        changed
    }

    // Fold every vertex onto the lowest id within tolerance of it.
    fn merge_coincident_vertices(&mut self) -> BTreeMap<i64, i64> {
        let tol = self.tolerance;
        let tree = KdTree::from_patch(self.patch());
        let mut remap: BTreeMap<i64, i64> = BTreeMap::new();
        for (id, p) in self.patch().vertices() {
            if remap.contains_key(&id) {
                continue;
            }
            for other in tree.within(p, tol) {
                if other > id && !remap.contains_key(&other) {
                    remap.insert(other, id);
                }
            }
        }
        if remap.is_empty() {
            return remap;
        }
        let patch = self.patch_mut();
        patch.remap_cell_vertices(&remap);
        for id in remap.keys() {
            patch.delete_vertex(*id);
        }
        remap
    }

    fn unreferenced_vertices(&self) -> Vec<i64> {
        let used: BTreeSet<i64> = self.patch().cells().flat_map(|c| c.vertex_ids()).collect();
        self.patch()
            .vertices()
            .map(|(id, _)| id)
            .filter(|id| !used.contains(id))
            .collect()
    }

    /// Collapse repeated and coincident vertices inside each cell and degrade
    /// the cell to the kind its remaining vertices support.
    pub fn degrade_degenerate_elements(&mut self) -> DegenerateReport {
        let mut report = DegenerateReport::default();
        if self.kind() == MeshKind::PointCloud {
            return report;
        }
        let tol = self.tolerance;
        let cells: Vec<Cell> = self.patch().cells().cloned().collect();
        for cell in cells {
            let Some((kind, conn)) = self.collapse_cell(&cell, tol, &mut report.collapsed) else {
                continue;
            };
            self.patch_mut().delete_cell(cell.id());
            if kind == ElementType::Undefined {
                report.deleted.push(cell.id());
                continue;
            }
            let id = self
                .patch_mut()
                .add_cell(kind, conn, cell.pid(), cell.owner(), Some(cell.id()));
            if id.is_none() {
                report.deleted.push(cell.id());
                continue;
            }
            report.degraded.insert(cell.id(), cell);
        }

        let remap = resolve_chains(&report.collapsed);
        self.patch_mut().remap_cell_vertices(&remap);
        let used: BTreeSet<i64> = self.patch().cells().flat_map(|c| c.vertex_ids()).collect();
        for v in remap.keys().filter(|v| !used.contains(v)) {
            self.patch_mut().delete_vertex(*v);
        }
        report.collapsed = remap;

        if !report.is_empty() {
            log::info!(
                target: self.log_target(),
                "object {}: {} cells degraded, {} deleted, {} vertices collapsed",
                self.id,
                report.degraded.len(),
                report.deleted.len(),
                report.collapsed.len()
            );
        }
        if !report.deleted.is_empty() {
            self.invalidate(&Structure::ALL);
            self.update();
        } else if !report.is_empty() {
            self.invalidate(&Structure::ALL);
        }
        report
    }

    // New kind and connectivity of a cell with collapsed vertices, or `None`
    // when the cell is well formed.
    fn collapse_cell(
        &self,
        cell: &Cell,
        tol: f64,
        collapsed: &mut BTreeMap<i64, i64>,
    ) -> Option<(ElementType, Vec<i64>)> {
        let patch = self.patch();
        let ordered = match cell.kind() {
            ElementType::Polyhedron => cell.vertex_ids(),
            kind if kind.dimension() == 2 => surface_loop_ids(cell),
            _ => cell.connect().to_vec(),
        };
        let mut unique: Vec<i64> = Vec::with_capacity(ordered.len());
        let mut local: BTreeMap<i64, i64> = BTreeMap::new();
        let mut repeated = cell.kind() == ElementType::Polyhedron && polyhedron_repeats(cell);
        for v in ordered {
            if unique.contains(&v) {
                repeated = true;
                continue;
            }
            let p = patch.vertex(v);
            let twin = unique
                .iter()
                .copied()
                .find(|u| matches!((p, patch.vertex(*u)), (Some(a), Some(b)) if distance(a, b) <= tol));
            match twin {
                Some(u) => {
                    local.insert(v, u);
                }
                None => unique.push(v),
            }
        }
        if local.is_empty() && !repeated {
            return None;
        }
        for (v, u) in &local {
            collapsed.entry(*v).or_insert(*u);
        }
        let n = unique.len();
        let degraded = match (cell.kind().dimension(), n) {
            (1, 2) => (ElementType::Line, unique),
            (2, 3) => (ElementType::Triangle, unique),
            (2, 4) => (ElementType::Quad, unique),
            (2, n) if n > 4 => {
                let mut conn = vec![n as i64];
                conn.extend(unique);
                (ElementType::Polygon, conn)
            }
            (3, 4) => (ElementType::Tetra, unique),
            (3, 5 | 6) => {
                let faces = collapsed_face_loops(cell, &local);
                let rebuilt = if n == 5 {
                    pyramid_from_faces(&faces).map(|conn| (ElementType::Pyramid, conn))
                } else {
                    wedge_from_faces(&faces).map(|conn| (ElementType::Wedge, conn))
                };
                rebuilt.unwrap_or((ElementType::Undefined, Vec::new()))
            }
            (3, n) if n > 6 => match face_stream(collapsed_face_loops(cell, &local)) {
                Some(stream) => (ElementType::Polyhedron, stream),
                None => (ElementType::Undefined, Vec::new()),
            },
            _ => (ElementType::Undefined, Vec::new()),
        };
        Some(degraded)
    }

    /// Split quads, pixels and polygons into fans of triangles.
    ///
    /// The first triangle of a fan keeps the cell id; the others get fresh
    /// ids. Fails without touching anything if a cell kind cannot be split.
    pub fn triangulate(&mut self) -> Result<bool, MeshError> {
        let unsupported: Vec<i64> = self
            .patch()
            .cells()
            .filter(|c| {
                !matches!(
                    c.kind(),
                    ElementType::Triangle | ElementType::Quad | ElementType::Pixel | ElementType::Polygon
                )
            })
            .map(|c| c.id())
            .collect();
        if !unsupported.is_empty() {
            return Err(MeshError::UnsupportedCellType { cells: unsupported });
        }
        let targets: Vec<Cell> = self
            .patch()
            .cells()
            .filter(|c| c.kind() != ElementType::Triangle)
            .cloned()
            .collect();
        if targets.is_empty() {
            return Ok(false);
        }
        let patch = self.patch_mut();
        for cell in &targets {
            let ring = surface_loop_ids(cell);
            let Some(&apex) = ring.first() else { continue };
            patch.delete_cell(cell.id());
            for (k, (a, b)) in ring.iter().skip(1).tuple_windows().enumerate() {
                let id = (k == 0).then_some(cell.id());
                patch.add_cell(ElementType::Triangle, vec![apex, *a, *b], cell.pid(), cell.owner(), id);
            }
        }
        self.invalidate(&Structure::ALL);
        log::info!(target: self.log_target(), "object {}: triangulated {} cells", self.id, targets.len());
        Ok(true)
    }
}

// A polyhedron face listing a vertex twice.
fn polyhedron_repeats(cell: &Cell) -> bool {
    cell.faces().iter().any(|f| {
        let set: BTreeSet<i64> = f.iter().copied().collect();
        set.len() != f.len()
    })
}

// Face loops of a volume cell after collapsing, dropping faces left with
// fewer than three distinct vertices.
fn collapsed_face_loops(cell: &Cell, local: &BTreeMap<i64, i64>) -> Vec<Vec<i64>> {
    let mut faces: Vec<Vec<i64>> = Vec::new();
    for face in cell.faces() {
        let mut loop_ids: Vec<i64> = Vec::with_capacity(face.len());
        for v in face {
            let v = local.get(&v).copied().unwrap_or(v);
            if !loop_ids.contains(&v) {
                loop_ids.push(v);
            }
        }
        if loop_ids.len() >= 3 {
            faces.push(loop_ids);
        }
    }
    faces
}

// Polyhedron stream of the face loops; `None` if fewer than four remain.
fn face_stream(faces: Vec<Vec<i64>>) -> Option<Vec<i64>> {
    if faces.len() < 4 {
        return None;
    }
    let mut stream = vec![faces.len() as i64];
    for f in faces {
        stream.push(f.len() as i64);
        stream.extend(f);
    }
    Some(stream)
}

// Pyramid connectivity: the only quadrilateral face as base, then the apex.
fn pyramid_from_faces(faces: &[Vec<i64>]) -> Option<Vec<i64>> {
    let mut quads = faces.iter().filter(|f| f.len() == 4);
    let base = quads.next()?;
    if quads.next().is_some() {
        return None;
    }
    let mut rest = faces
        .iter()
        .flatten()
        .copied()
        .filter(|v| !base.contains(v))
        .collect::<BTreeSet<i64>>()
        .into_iter();
    let apex = rest.next()?;
    if rest.next().is_some() {
        return None;
    }
    let mut conn = base.clone();
    conn.push(apex);
    Some(conn)
}

// Wedge connectivity: two disjoint triangles, the second listed so that
// vertex `i + 3` shares an edge with vertex `i`.
fn wedge_from_faces(faces: &[Vec<i64>]) -> Option<Vec<i64>> {
    let tris: Vec<&Vec<i64>> = faces.iter().filter(|f| f.len() == 3).collect();
    let (bottom, top) = tris
        .iter()
        .tuple_combinations()
        .find(|(a, b)| a.iter().all(|v| !b.contains(v)))?;
    let edges: BTreeSet<(i64, i64)> = faces
        .iter()
        .flat_map(|f| f.iter().copied().circular_tuple_windows::<(i64, i64)>())
        .map(|(a, b)| (a.min(b), a.max(b)))
        .collect();
    let mut conn = bottom.to_vec();
    for &v in bottom.iter() {
        let mut partners = top.iter().copied().filter(|w| edges.contains(&(v.min(*w), v.max(*w))));
        let partner = partners.next()?;
        if partners.next().is_some() || conn.contains(&partner) {
            return None;
        }
        conn.push(partner);
    }
    Some(conn)
}

// Follow collapse chains (a -> b -> c) to their final survivor.
fn resolve_chains(map: &BTreeMap<i64, i64>) -> BTreeMap<i64, i64> {
    map.keys()
        .map(|&v| {
            let mut target = map[&v];
            let mut hops = 0;
            while let Some(next) = map.get(&target) {
                if hops > map.len() {
                    break;
                }
                target = *next;
                hops += 1;
            }
            (v, target)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn clean_merges_and_drops() {
        let ctx = Context::serial();
        let verts = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 0.0, 1e-9],
            [1.0, 1.0, 0.0],
            [7.0, 7.0, 7.0],
        ];
        let conn = vec![vec![0, 1, 2], vec![3, 4, 2]];
        let mut obj = MeshObject::from_arrays(MeshKind::Surface, &verts, Some(&conn), &ctx);
        assert!(obj.clean_geometry());
        assert_eq!(obj.vertex_ids(false), vec![0, 1, 2, 4]);
        assert_eq!(obj.patch().cell(1).unwrap().connect(), &[1, 4, 2]);
        assert!(!obj.clean_geometry());
    }

    #[test]
    fn quad_with_repeated_vertex_becomes_triangle() {
        let ctx = Context::serial();
        let verts = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        let mut obj = MeshObject::new(MeshKind::Surface, &ctx);
        for (i, v) in verts.iter().enumerate() {
            obj.add_vertex(*v, Some(i as i64));
        }
        obj.add_connected_cell(vec![0, 1, 2, 2], ElementType::Quad, 3, Some(10), None);
        obj.add_connected_cell(vec![0, 2, 3], ElementType::Triangle, 3, Some(11), None);
        let report = obj.degrade_degenerate_elements();
        assert_eq!(report.degraded[&10].kind(), ElementType::Quad);
        assert!(report.deleted.is_empty());
        let cell = obj.patch().cell(10).unwrap();
        assert_eq!(cell.kind(), ElementType::Triangle);
        assert_eq!(cell.connect(), &[0, 1, 2]);
        assert_eq!(cell.pid(), 3);
        assert!(obj.degrade_degenerate_elements().is_empty());
    }

    #[test]
    fn coincident_collapse_deletes_sliver() {
        let ctx = Context::serial();
        let verts = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1e-8], [0.0, 1.0, 0.0]];
        let conn = vec![vec![0, 1, 2], vec![0, 2, 3]];
        let mut obj = MeshObject::from_arrays(MeshKind::Surface, &verts, Some(&conn), &ctx);
        obj.ensure_current(Structure::Adjacency);
        let report = obj.degrade_degenerate_elements();
        assert_eq!(report.deleted, vec![0]);
        assert_eq!(report.collapsed, BTreeMap::from([(2, 1)]));
        assert_eq!(obj.patch().cell(1).unwrap().connect(), &[0, 1, 3]);
        assert!(!obj.patch().contains_vertex(2));
        assert_eq!(obj.sync_state(Structure::Adjacency), crate::topology::sync::SyncState::Current);
    }

    #[test]
    fn hexahedron_degrades_by_unique_count() {
        let ctx = Context::serial();
        let verts = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
        ];
        let mut obj = MeshObject::new(MeshKind::Volume, &ctx);
        for (i, v) in verts.iter().enumerate() {
            obj.add_vertex(*v, Some(i as i64));
        }
        // top face collapsed onto an edge: 6 distinct vertices
        obj.add_connected_cell(vec![0, 1, 2, 3, 4, 5, 5, 4], ElementType::Hexahedron, 0, Some(0), None);
        let report = obj.degrade_degenerate_elements();
        assert!(report.degraded.contains_key(&0));
        let cell = obj.patch().cell(0).unwrap();
        assert_eq!(cell.kind(), ElementType::Wedge);
        // triangles [1, 2, 5] and [3, 0, 4], joined by the edges 1-0, 2-3, 5-4
        assert_eq!(cell.connect(), &[1, 2, 5, 0, 3, 4]);
        let quads = cell.faces().into_iter().filter(|f| f.len() == 4).count();
        assert_eq!(quads, 3);
        let vol = obj.eval_cell_volume(0);
        assert!((vol - 0.5).abs() < 1e-12, "{vol}");
    }

    #[test]
    fn hexahedron_collapsed_to_a_point_becomes_a_pyramid() {
        let ctx = Context::serial();
        let verts = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.5, 0.5, 1.0],
        ];
        let mut obj = MeshObject::new(MeshKind::Volume, &ctx);
        for (i, v) in verts.iter().enumerate() {
            obj.add_vertex(*v, Some(i as i64));
        }
        obj.add_connected_cell(vec![0, 1, 2, 3, 4, 4, 4, 4], ElementType::Hexahedron, 0, Some(0), None);
        obj.degrade_degenerate_elements();
        let cell = obj.patch().cell(0).unwrap();
        assert_eq!(cell.kind(), ElementType::Pyramid);
        assert_eq!(cell.connect(), &[0, 3, 2, 1, 4]);
        assert!((obj.eval_cell_volume(0) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn wedge_pairing_needs_two_disjoint_triangles() {
        // only one triangle left among the faces
        let faces = vec![vec![0, 1, 2], vec![0, 1, 4, 3], vec![1, 2, 5, 4], vec![2, 0, 3, 5]];
        assert_eq!(wedge_from_faces(&faces), None);
        let faces = vec![vec![0, 1, 2], vec![3, 4, 5], vec![0, 3, 4, 1], vec![1, 4, 5, 2], vec![2, 5, 3, 0]];
        assert_eq!(wedge_from_faces(&faces), Some(vec![0, 1, 2, 3, 4, 5]));
        assert_eq!(pyramid_from_faces(&faces), None);
    }

    #[test]
    fn triangulate_fans() {
        let ctx = Context::serial();
        let verts = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.5, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        let mut obj = MeshObject::from_arrays(MeshKind::Surface, &verts, Some(&[vec![5, 0, 1, 2, 3, 4]]), &ctx);
        assert!(obj.triangulate().unwrap());
        assert_eq!(obj.connectivity(), vec![vec![0, 1, 2], vec![0, 2, 3], vec![0, 3, 4]]);
        assert!(!obj.triangulate().unwrap());

        let line = [[0.0; 3], [1.0, 0.0, 0.0]];
        let mut curve = MeshObject::from_arrays(MeshKind::Curve, &line, Some(&[vec![0, 1]]), &ctx);
        assert_eq!(curve.triangulate(), Err(MeshError::UnsupportedCellType { cells: vec![0] }));
    }
}
