//! Distributed variants of the tree queries. Every function here is
//! collective over the coordinator.
//!
//! Each rank searches its own partition and proposes a [`CellInfo`]; the
//! element-wise minimum over ranks (distance, then owner rank, then id) picks
//! the winner. When the query points differ per rank (`shared == false`) they
//! are gathered first, answered by everybody, and each rank keeps its slice.

use crate::algs::communicator::Coordinator;
use crate::algs::reduction::ReduceOp;
use crate::algs::wire::{CellInfo, NULL_ID, cast_slice, decode_records};
use crate::geometry::vector::{scale, sub};
use crate::geometry::{Aabb, Point3};
use crate::mesh_error::MeshError;

use super::queries::{
    Radius, SignedProximity, SkdTreeView, cell_contains, extract_target, find_point_closest_cell,
    signed_for_cell,
};
use super::skd_tree::SkdTree;

/// Winner of a distributed closest-cell search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlobalProximity {
    pub cell: Option<i64>,
    /// Rank owning `cell`.
    pub rank: Option<usize>,
    pub distance: f64,
}

impl From<CellInfo> for GlobalProximity {
    fn from(info: CellInfo) -> Self {
        if info.is_found() {
            Self {
                cell: Some(info.id()),
                rank: Some(info.rank()),
                distance: info.distance(),
            }
        } else {
            Self {
                cell: None,
                rank: None,
                distance: f64::MAX,
            }
        }
    }
}

// Query points of every rank, concatenated in rank order.
struct Gathered {
    points: Vec<Point3>,
    radii: Vec<f64>,
    offset: usize,
    local: usize,
}

fn gather_queries(points: &[Point3], r: Radius<'_>, shared: bool, comm: &dyn Coordinator) -> Gathered {
    let radii: Vec<f64> = (0..points.len()).map(|i| r.at(i)).collect();
    if shared || !comm.is_distributed() {
        return Gathered {
            points: points.to_vec(),
            radii,
            offset: 0,
            local: points.len(),
        };
    }
    let mut raw = Vec::with_capacity(points.len() * 4);
    for (p, r) in points.iter().zip(&radii) {
        raw.extend_from_slice(&[p[0], p[1], p[2], *r]);
    }
    let mut out = Gathered {
        points: Vec::new(),
        radii: Vec::new(),
        offset: 0,
        local: points.len(),
    };
    for (rank, buf) in comm.all_gather_bytes(cast_slice(&raw)).iter().enumerate() {
        if rank == comm.rank() {
            out.offset = out.points.len();
        }
        for rec in decode_records::<f64>(buf).chunks_exact(4) {
            out.points.push([rec[0], rec[1], rec[2]]);
            out.radii.push(rec[3]);
        }
    }
    out
}

fn local_candidates(g: &Gathered, view: &SkdTreeView<'_>) -> Vec<CellInfo> {
    g.points
        .iter()
        .zip(&g.radii)
        .map(|(p, r)| {
            let hit = find_point_closest_cell(*p, view, *r);
            match hit.cell.and_then(|id| view.patch.cell(id)) {
                Some(cell) => CellInfo::new(hit.distance, cell.owner(), cell.id()),
                None => CellInfo::NOT_FOUND,
            }
        })
        .collect()
}

// Reduced winners for every gathered point.
fn global_winners(g: &Gathered, view: &SkdTreeView<'_>, comm: &dyn Coordinator) -> Vec<CellInfo> {
    comm.reduce_min_cell_info(&local_candidates(g, view))
}

/// Closest cell over the whole distributed surface.
pub fn global_distance(
    points: &[Point3],
    view: &SkdTreeView<'_>,
    r: Radius<'_>,
    shared: bool,
    comm: &dyn Coordinator,
) -> Result<Vec<GlobalProximity>, MeshError> {
    if !view.tree.is_surface() && !view.tree.is_empty() {
        return Err(MeshError::NotASurfaceTree);
    }
    let g = gather_queries(points, r, shared, comm);
    let winners = global_winners(&g, view, comm);
    Ok(winners[g.offset..g.offset + g.local].iter().map(|w| (*w).into()).collect())
}

/// Signed distance over the distributed surface. The owner of the winning
/// cell evaluates sign and pseudo-normal; the others contribute `f64::MAX`.
pub fn signed_global_distance(
    points: &[Point3],
    view: &SkdTreeView<'_>,
    r: Radius<'_>,
    shared: bool,
    comm: &dyn Coordinator,
) -> Result<Vec<SignedProximity>, MeshError> {
    if !view.tree.is_surface() && !view.tree.is_empty() {
        return Err(MeshError::NotASurfaceTree);
    }
    let g = gather_queries(points, r, shared, comm);
    let winners = global_winners(&g, view, comm);
    let me = comm.rank();
    let mut values = Vec::with_capacity(winners.len() * 4);
    for (p, w) in g.points.iter().zip(&winners) {
        if w.is_found() && w.rank() == me {
            let sp = signed_for_cell(view, *p, w.id());
            values.extend_from_slice(&[sp.distance, sp.pseudo_normal[0], sp.pseudo_normal[1], sp.pseudo_normal[2]]);
        } else {
            values.extend_from_slice(&[f64::MAX; 4]);
        }
    }
    let reduced = comm.all_reduce_f64(&values, ReduceOp::Min);
    Ok(winners
        .iter()
        .zip(reduced.chunks_exact(4))
        .skip(g.offset)
        .take(g.local)
        .map(|(w, v)| {
            if w.is_found() && v[0] != f64::MAX {
                SignedProximity {
                    cell: Some(w.id()),
                    distance: v[0],
                    pseudo_normal: [v[1], v[2], v[3]],
                }
            } else {
                SignedProximity::NOT_FOUND
            }
        })
        .collect())
}

/// Project points on the distributed surface; the radius of every point
/// grows until the global search finds a cell.
pub fn project_point_global(
    points: &[Point3],
    view: &SkdTreeView<'_>,
    r: Radius<'_>,
    shared: bool,
    comm: &dyn Coordinator,
) -> Result<Vec<Point3>, MeshError> {
    let total = comm.all_reduce_i64(&[view.tree.len() as i64], ReduceOp::Sum);
    if total.first().copied().unwrap_or(0) == 0 {
        return Err(MeshError::EmptyPatch);
    }
    let mut radii: Vec<f64> = (0..points.len()).map(|i| r.at(i).max(view.tol)).collect();
    let mut out: Vec<Option<Point3>> = vec![None; points.len()];
    let mut unreachable = None;
    loop {
        let pending: Vec<usize> = (0..points.len()).filter(|&i| out[i].is_none()).collect();
        let remaining = comm.all_reduce_i64(&[pending.len() as i64], ReduceOp::Sum);
        if remaining.first().copied().unwrap_or(0) == 0 {
            break;
        }
        let pts: Vec<Point3> = pending.iter().map(|&i| points[i]).collect();
        let rs: Vec<f64> = pending.iter().map(|&i| radii[i]).collect();
        let res = signed_global_distance(&pts, view, Radius::PerPoint(&rs), shared, comm)?;
        for (k, sp) in pending.iter().zip(res) {
            if sp.distance != f64::MAX {
                out[*k] = Some(sub(points[*k], scale(sp.pseudo_normal, sp.distance)));
            } else if !radii[*k].is_finite() {
                // keep participating in the collectives, report once done
                unreachable.get_or_insert(points[*k]);
                out[*k] = Some(points[*k]);
            } else {
                radii[*k] = view.grow(radii[*k]);
            }
        }
    }
    if let Some(p) = unreachable {
        return Err(MeshError::InvalidGeometry(format!("no cell reachable from {p:?}")));
    }
    Ok(out.into_iter().zip(points).map(|(x, p)| x.unwrap_or(*p)).collect())
}

/// Cell containing each point over the distributed surface. The owner of the
/// closest cell tests containment; the answer is reduced by max over ids.
pub fn locate_point_on_global_patch(
    points: &[Point3],
    view: &SkdTreeView<'_>,
    shared: bool,
    comm: &dyn Coordinator,
) -> Result<Vec<Option<i64>>, MeshError> {
    if !view.tree.is_surface() && !view.tree.is_empty() {
        return Err(MeshError::NotASurfaceTree);
    }
    let g = gather_queries(points, Radius::Shared(f64::MAX), shared, comm);
    let winners = global_winners(&g, view, comm);
    let me = comm.rank();
    let ids: Vec<i64> = g
        .points
        .iter()
        .zip(&winners)
        .map(|(p, w)| {
            let inside = w.is_found()
                && w.rank() == me
                && view
                    .patch
                    .cell(w.id())
                    .is_some_and(|c| cell_contains(view.patch, c, *p, view.containment_tol));
            if inside { w.id() } else { NULL_ID }
        })
        .collect();
    let reduced = comm.all_reduce_i64(&ids, ReduceOp::Max);
    Ok(reduced[g.offset..g.offset + g.local]
        .iter()
        .map(|&id| (id != NULL_ID).then_some(id))
        .collect())
}

/// Cells of the local `target` partition close to the selection of any rank.
pub fn select_by_global_patch(
    selection: &SkdTree,
    target: &SkdTree,
    tol: f64,
    comm: &dyn Coordinator,
) -> Vec<i64> {
    let local: Vec<f64> = selection
        .leaf_indices()
        .flat_map(|l| {
            let b = selection.node(l).bbox.inflated(tol);
            [b.min, b.max].concat()
        })
        .collect();
    let boxes: Vec<Aabb> = comm
        .all_gather_bytes(cast_slice(&local))
        .iter()
        .flat_map(|buf| {
            decode_records::<f64>(buf)
                .chunks_exact(6)
                .map(|c| Aabb::new([c[0], c[1], c[2]], [c[3], c[4], c[5]]))
                .collect::<Vec<_>>()
        })
        .collect();
    let Some(root) = target.root_box() else {
        return Vec::new();
    };
    let boxes: Vec<Aabb> = boxes.into_iter().filter(|b| b.intersects(&root)).collect();
    extract_target(target, boxes)
}
