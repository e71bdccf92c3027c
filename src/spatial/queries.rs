//! Serial queries on a cell tree: distance, signed distance, projection,
//! point location and tree-versus-tree selection.
//!
//! A search radius bounds every query; a point with nothing inside the radius
//! gets [`Proximity::NOT_FOUND`]. Surface-only queries reject trees built over
//! volume or point-cloud patches with [`MeshError::NotASurfaceTree`].

use crate::config::{GeometryConfig, sane_growth};
use crate::geometry::cg::{
    is_point_inside_convex, is_point_inside_polygon, is_point_inside_segment, project_point_polygon,
};
use crate::geometry::metrics::{cell_centroid, cell_normal};
use crate::geometry::vector::{add, dot, norm, normalize, scale, sub};
use crate::geometry::{Aabb, Point3};
use crate::mesh_error::MeshError;
use crate::topology::cell::Cell;
use crate::topology::cell_type::ElementType;
use crate::topology::patch::MeshPatch;

use super::skd_tree::{SkdTree, surface_loop_ids};

/// A tree together with the patch it indexes.
#[derive(Clone, Copy)]
pub struct SkdTreeView<'a> {
    pub patch: &'a MeshPatch,
    pub tree: &'a SkdTree,
    pub tol: f64,
    pub growth: f64,
    pub containment_tol: f64,
}

impl<'a> SkdTreeView<'a> {
    pub fn new(patch: &'a MeshPatch, tree: &'a SkdTree, tol: f64) -> Self {
        let cfg = GeometryConfig::default();
        Self {
            patch,
            tree,
            tol,
            growth: cfg.projection_growth,
            containment_tol: cfg.containment_tolerance,
        }
    }

    pub fn with_config(mut self, cfg: &GeometryConfig) -> Self {
        self.growth = sane_growth(cfg.projection_growth);
        self.containment_tol = cfg.containment_tolerance.max(0.0);
        self
    }

    /// Next radius of a growing search. Always strictly larger than `r`,
    /// whatever was written into `growth`.
    pub(crate) fn grow(&self, r: f64) -> f64 {
        (r * sane_growth(self.growth)).max(f64::MIN_POSITIVE)
    }

    fn require_surface(&self) -> Result<(), MeshError> {
        if self.tree.is_surface() {
            Ok(())
        } else {
            Err(MeshError::NotASurfaceTree)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Proximity {
    pub cell: Option<i64>,
    pub distance: f64,
}

impl Proximity {
    pub const NOT_FOUND: Proximity = Proximity {
        cell: None,
        distance: f64::MAX,
    };

    pub fn is_found(&self) -> bool {
        self.cell.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SignedProximity {
    pub cell: Option<i64>,
    /// Signed distance, positive on the side the vertex normals point to.
    pub distance: f64,
    pub pseudo_normal: Point3,
}

impl SignedProximity {
    pub const NOT_FOUND: SignedProximity = SignedProximity {
        cell: None,
        distance: f64::MAX,
        pseudo_normal: [0.0; 3],
    };
}

/// Search radius of a bulk query.
#[derive(Clone, Copy, Debug)]
pub enum Radius<'a> {
    Shared(f64),
    PerPoint(&'a [f64]),
}

impl Radius<'_> {
    pub fn at(&self, i: usize) -> f64 {
        match self {
            Radius::Shared(r) => *r,
            Radius::PerPoint(rs) => rs.get(i).copied().unwrap_or(f64::MAX),
        }
    }
}

/// Closest point on a 0D/1D/2D cell and the weights of its loop vertices.
///
/// Returns the loop vertex ids with the weights, so callers can blend
/// per-vertex data.
pub(crate) fn project_on_cell(patch: &MeshPatch, cell: &Cell, p: Point3) -> Option<(Point3, Vec<i64>, Vec<f64>)> {
    let ids = surface_loop_ids(cell);
    let pts = patch.coords_of(&ids);
    if pts.is_empty() || pts.len() != ids.len() {
        return None;
    }
    let (x, lambda) = project_point_polygon(p, &pts);
    Some((x, ids, lambda))
}

/// Distance from `p` to any cell kind. Volume cells count as solid: zero
/// inside, otherwise the distance to the nearest face.
pub fn cell_distance(patch: &MeshPatch, cell: &Cell, p: Point3, tol: f64) -> f64 {
    if cell.kind().dimension() == 3 {
        let faces = patch.cell_face_coords(cell);
        let centroid = cell_centroid(&patch.cell_vertex_coords(cell));
        if is_point_inside_convex(p, &faces, centroid, tol) {
            return 0.0;
        }
        return faces
            .iter()
            .map(|f| {
                let (x, _) = project_point_polygon(p, f);
                norm(sub(p, x))
            })
            .fold(f64::MAX, f64::min);
    }
    match project_on_cell(patch, cell, p) {
        Some((x, _, _)) => norm(sub(p, x)),
        None => f64::MAX,
    }
}

fn nearest(view: &SkdTreeView<'_>, p: Point3, r: f64) -> Proximity {
    let found = view.tree.nearest_by(p, r, |id| {
        view.patch
            .cell(id)
            .map_or(f64::MAX, |c| cell_distance(view.patch, c, p, view.tol))
    });
    match found {
        Some((id, d)) => Proximity {
            cell: Some(id),
            distance: d,
        },
        None => Proximity::NOT_FOUND,
    }
}

/// Unsigned distance from `p` to the surface within radius `r`.
pub fn distance(p: Point3, view: &SkdTreeView<'_>, r: f64) -> Result<Proximity, MeshError> {
    view.require_surface()?;
    Ok(nearest(view, p, r))
}

pub fn distances(points: &[Point3], view: &SkdTreeView<'_>, r: Radius<'_>) -> Result<Vec<Proximity>, MeshError> {
    view.require_surface()?;
    Ok(points.iter().enumerate().map(|(i, p)| nearest(view, *p, r.at(i))).collect())
}

/// Sign and pseudo-normal of `p` relative to a known closest cell.
pub(crate) fn signed_for_cell(view: &SkdTreeView<'_>, p: Point3, cell_id: i64) -> SignedProximity {
    let Some(cell) = view.patch.cell(cell_id) else {
        return SignedProximity::NOT_FOUND;
    };
    let Some((x, ids, lambda)) = project_on_cell(view.patch, cell, p) else {
        return SignedProximity::NOT_FOUND;
    };
    let blended = ids
        .iter()
        .zip(&lambda)
        .fold([0.0; 3], |acc, (v, l)| add(acc, scale(view.tree.vertex_normal(*v), *l)));
    let diff = sub(p, x);
    let h = norm(diff);
    let s = if dot(blended, diff) < 0.0 { -1.0 } else { 1.0 };
    let pseudo_normal = if h < view.tol && cell.kind() == ElementType::Line {
        normalize(blended, 1e-300)
    } else if h < view.tol {
        cell_normal(cell.kind(), &view.patch.cell_vertex_coords(cell))
    } else {
        scale(diff, s / h)
    };
    SignedProximity {
        cell: Some(cell_id),
        distance: s * h,
        pseudo_normal,
    }
}

/// Signed distance from `p` to the surface within radius `r`.
pub fn signed_distance(p: Point3, view: &SkdTreeView<'_>, r: f64) -> Result<SignedProximity, MeshError> {
    view.require_surface()?;
    Ok(match nearest(view, p, r).cell {
        Some(id) => signed_for_cell(view, p, id),
        None => SignedProximity::NOT_FOUND,
    })
}

pub fn signed_distances(
    points: &[Point3],
    view: &SkdTreeView<'_>,
    r: Radius<'_>,
) -> Result<Vec<SignedProximity>, MeshError> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| signed_distance(*p, view, r.at(i)))
        .collect()
}

/// Project `p` onto the surface, growing the radius until a cell is found.
pub fn project_point(p: Point3, view: &SkdTreeView<'_>, r: f64) -> Result<Point3, MeshError> {
    view.require_surface()?;
    if view.tree.is_empty() {
        return Err(MeshError::EmptyPatch);
    }
    let mut r = r.max(view.tol);
    loop {
        let sp = signed_distance(p, view, r)?;
        if sp.distance != f64::MAX {
            return Ok(sub(p, scale(sp.pseudo_normal, sp.distance)));
        }
        if !r.is_finite() {
            return Err(MeshError::InvalidGeometry(format!("no cell reachable from {p:?}")));
        }
        r = view.grow(r);
    }
}

pub fn project_points(points: &[Point3], view: &SkdTreeView<'_>, r: Radius<'_>) -> Result<Vec<Point3>, MeshError> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| project_point(*p, view, r.at(i)))
        .collect()
}

/// True when `p` lies inside the 0D/1D/2D cell within `tol`.
pub(crate) fn cell_contains(patch: &MeshPatch, cell: &Cell, p: Point3, tol: f64) -> bool {
    let ids = surface_loop_ids(cell);
    let pts = patch.coords_of(&ids);
    match (cell.kind(), pts.as_slice()) {
        (ElementType::Line, [a, b]) => is_point_inside_segment(p, *a, *b, tol),
        (ElementType::Vertex, [a]) => norm(sub(p, *a)) <= tol,
        (kind, _) if kind.dimension() == 2 => is_point_inside_polygon(p, &pts, tol),
        (kind, _) if kind.dimension() == 3 => {
            let centroid = cell_centroid(&patch.cell_vertex_coords(cell));
            is_point_inside_convex(p, &patch.cell_face_coords(cell), centroid, tol)
        }
        _ => false,
    }
}

/// The cell containing `p`, if the nearest cell contains it.
pub fn locate_point_on_patch(p: Point3, view: &SkdTreeView<'_>) -> Result<Option<i64>, MeshError> {
    view.require_surface()?;
    let hit = nearest(view, p, f64::MAX);
    Ok(hit.cell.filter(|&id| {
        view.patch
            .cell(id)
            .is_some_and(|c| cell_contains(view.patch, c, p, view.containment_tol))
    }))
}

/// Nearest cell for any tree kind.
pub fn find_point_closest_cell(p: Point3, view: &SkdTreeView<'_>, r: f64) -> Proximity {
    nearest(view, p, r)
}

/// Leaf boxes of `selection` that touch the root box of `target`, inflated by `tol`.
fn candidate_boxes(selection: &SkdTree, target: &SkdTree, tol: f64) -> Vec<Aabb> {
    let Some(root) = target.root_box() else {
        return Vec::new();
    };
    selection
        .leaf_indices()
        .map(|l| selection.node(l).bbox.inflated(tol))
        .filter(|b| b.intersects(&root))
        .collect()
}

/// Walk `target` with a worklist of `(node, candidate boxes)`; children
/// whose candidate list becomes empty are pruned. Returns the sorted ids of
/// every reached leaf.
pub fn extract_target(target: &SkdTree, boxes: Vec<Aabb>) -> Vec<i64> {
    let mut out = Vec::new();
    if target.is_empty() || boxes.is_empty() {
        return out;
    }
    let mut work: Vec<(usize, Vec<Aabb>)> = vec![(0, boxes)];
    while let Some((i, candidates)) = work.pop() {
        let node = target.node(i);
        match node.children() {
            None => out.extend_from_slice(target.leaf_cells(i)),
            Some(children) => {
                for c in children {
                    let cb = target.node(c).bbox;
                    let hits: Vec<Aabb> = candidates.iter().filter(|b| b.intersects(&cb)).copied().collect();
                    if !hits.is_empty() {
                        work.push((c, hits));
                    }
                }
            }
        }
    }
    out.sort_unstable();
    out.dedup();
    out
}

/// Cells of `target` whose leaf boxes come within `tol` of `selection`.
pub fn select_by_patch(selection: &SkdTree, target: &SkdTree, tol: f64) -> Vec<i64> {
    let boxes = candidate_boxes(selection, target, tol);
    extract_target(target, boxes)
}
