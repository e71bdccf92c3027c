//! Cell and interface measures.

use std::collections::BTreeMap;

use super::{MeshKind, MeshObject};
use crate::geometry::Point3;
use crate::geometry::cg::polygon_area;
use crate::geometry::metrics::{cell_centroid, cell_measure, cell_normal, face_normal, surface_aspect_ratio, volume_aspect_ratio};
use crate::geometry::vector::{cross, distance, mean, normalize, sub};
use crate::topology::sync::Structure;

const EPS: f64 = 1e-24;

impl MeshObject<'_> {
    /// Volume, area or length of a cell depending on its dimension; 0 for
    /// point clouds, unknown cells and malformed geometry.
    pub fn eval_cell_volume(&self, id: i64) -> f64 {
        if self.kind() == MeshKind::PointCloud {
            return 0.0;
        }
        let Some(cell) = self.patch().cell(id) else {
            return 0.0;
        };
        let verts = self.patch().cell_vertex_coords(cell);
        let faces = self.patch().cell_face_coords(cell);
        match cell_measure(cell.kind(), &verts, &faces) {
            Ok(v) => v,
            Err(e) => {
                log::warn!(target: self.log_target(), "cell {id}: {e}");
                0.0
            }
        }
    }

    pub fn eval_cell_volumes(&self) -> BTreeMap<i64, f64> {
        if self.kind() == MeshKind::PointCloud {
            return BTreeMap::new();
        }
        self.patch().cells().map(|c| (c.id(), self.eval_cell_volume(c.id()))).collect()
    }

    /// Aspect ratio of a cell: hydraulic ratio for volumes, longest over
    /// shortest edge for surfaces, 0 otherwise.
    pub fn eval_cell_aspect_ratio(&mut self, id: i64) -> f64 {
        match self.kind() {
            MeshKind::Volume => {
                self.ensure_current(Structure::Interfaces);
                let v = self.eval_cell_volume(id);
                volume_aspect_ratio(v, self.cell_faces_area(id))
            }
            MeshKind::Surface => self.patch().cell(id).map_or(0.0, |c| {
                surface_aspect_ratio(c.kind(), &self.patch().cell_vertex_coords(c))
            }),
            MeshKind::Curve | MeshKind::PointCloud => 0.0,
        }
    }

    pub fn eval_cell_aspect_ratios(&mut self) -> BTreeMap<i64, f64> {
        if matches!(self.kind(), MeshKind::Curve | MeshKind::PointCloud) {
            return BTreeMap::new();
        }
        let ids = self.cell_ids(false);
        ids.into_iter().map(|id| (id, self.eval_cell_aspect_ratio(id))).collect()
    }

    // Sum of face areas, read through the interfaces of each face.
    fn cell_faces_area(&self, id: i64) -> f64 {
        let patch = self.patch();
        let Some(cell) = patch.cell(id) else {
            return 0.0;
        };
        (0..cell.face_count())
            .map(|f| {
                let ids = match cell.face_interfaces(f).first().and_then(|i| patch.interface(*i)) {
                    Some(iface) => iface.vertex_ids().to_vec(),
                    None => cell.face_vertex_ids(f),
                };
                polygon_area(&patch.coords_of(&ids))
            })
            .sum()
    }

    /// Vertex-average centroid of a cell, origin for unknown ids.
    pub fn eval_cell_centroid(&self, id: i64) -> Point3 {
        self.patch()
            .cell(id)
            .map_or([0.0; 3], |c| cell_centroid(&self.patch().cell_vertex_coords(c)))
    }

    /// Centroid of an interface; origin when interfaces are not built.
    pub fn eval_interface_centroid(&self, id: i64) -> Point3 {
        if !self.patch().interfaces_built() {
            return [0.0; 3];
        }
        self.patch()
            .interface(id)
            .map_or([0.0; 3], |i| mean(&self.patch().coords_of(i.vertex_ids())))
    }

    /// Area of an interface: face area for volumes, edge length for surfaces,
    /// 0 otherwise or when interfaces are not built.
    pub fn eval_interface_area(&self, id: i64) -> f64 {
        let patch = self.patch();
        let Some(iface) = patch.interface(id).filter(|_| patch.interfaces_built()) else {
            return 0.0;
        };
        let pts = patch.coords_of(iface.vertex_ids());
        match self.kind() {
            MeshKind::Volume => polygon_area(&pts),
            MeshKind::Surface if pts.len() == 2 => distance(pts[0], pts[1]),
            _ => 0.0,
        }
    }

    /// Unit normal of an interface, pointing from owner to neighbour.
    ///
    /// For surfaces it is the in-plane normal of the edge; for curves the
    /// tangent leaving the owner line. Zero when interfaces are not built.
    pub fn eval_interface_normal(&self, id: i64) -> Point3 {
        let patch = self.patch();
        let Some(iface) = patch.interface(id).filter(|_| patch.interfaces_built()) else {
            return [0.0; 3];
        };
        let Some(owner) = patch.cell(iface.owner()) else {
            return [0.0; 3];
        };
        let pts = patch.coords_of(iface.vertex_ids());
        match self.kind() {
            MeshKind::Volume => face_normal(&pts),
            MeshKind::Surface if pts.len() == 2 => {
                let n = cell_normal(owner.kind(), &patch.cell_vertex_coords(owner));
                normalize(cross(sub(pts[1], pts[0]), n), EPS)
            }
            MeshKind::Curve => {
                let ends = patch.cell_vertex_coords(owner);
                match (pts.first(), ends.as_slice()) {
                    (Some(p), [a, b]) => {
                        let other = if distance(*p, *a) <= distance(*p, *b) { *b } else { *a };
                        normalize(sub(*p, other), EPS)
                    }
                    _ => [0.0; 3],
                }
            }
            _ => [0.0; 3],
        }
    }
}
