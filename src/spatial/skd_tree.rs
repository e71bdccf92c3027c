//! Bounding-volume tree over the cells of a [`MeshPatch`].
//!
//! Nodes live in a flat vector; node 0 is the root. A leaf owns a contiguous
//! range of the permuted cell-id array, an internal node owns two children.
//! The tree also caches vertex normals, used by signed distance queries,
//! and the root boxes of every rank when built over a
//! distributed patch.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::algs::communicator::Coordinator;
use crate::algs::wire::{cast_slice, decode_records};
use crate::geometry::metrics::{cell_centroid, cell_normal};
use crate::geometry::vector::{add, cross, dot, mean, norm, normalize, scale, sub};
use crate::geometry::{Aabb, Point3};
use crate::topology::cell::Cell;
use crate::topology::cell_type::ElementType;
use crate::topology::patch::MeshPatch;

#[derive(Clone, Debug, PartialEq)]
pub struct SkdNode {
    pub bbox: Aabb,
    children: Option<[usize; 2]>,
    range: Range<usize>,
}

impl SkdNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Child node indices, `None` for a leaf.
    pub fn children(&self) -> Option<[usize; 2]> {
        self.children
    }
}

#[derive(Clone, Debug, Default)]
pub struct SkdTree {
    nodes: Vec<SkdNode>,
    cell_ids: Vec<i64>,
    leaf_capacity: usize,
    dimension: u8,
    vertex_normals: BTreeMap<i64, Point3>,
    partition_boxes: Vec<Aabb>,
}

struct Item {
    id: i64,
    bbox: Aabb,
    centroid: Point3,
}

impl SkdTree {
    /// Build over every cell of `patch`; ghosts are skipped unless
    /// `include_ghosts` is set.
    pub fn build(patch: &MeshPatch, leaf_capacity: usize, include_ghosts: bool) -> Self {
        let mut items: Vec<Item> = patch
            .cells()
            .filter(|c| include_ghosts || c.owner() == patch.rank())
            .filter_map(|c| {
                let pts = patch.cell_vertex_coords(c);
                let bbox = Aabb::from_points(pts.iter())?;
                Some(Item {
                    id: c.id(),
                    bbox,
                    centroid: cell_centroid(&pts),
                })
            })
            .collect();
        let dimension = patch.cells().map(|c| c.kind().dimension()).max().unwrap_or(0);
        let mut tree = SkdTree {
            nodes: Vec::new(),
            cell_ids: Vec::with_capacity(items.len()),
            leaf_capacity: leaf_capacity.max(1),
            dimension,
            vertex_normals: vertex_normals(patch),
            partition_boxes: Vec::new(),
        };
        if !items.is_empty() {
            tree.split(&mut items);
        }
        tree.cell_ids = items.iter().map(|it| it.id).collect();
        tree
    }

    // Median split on the longest centroid axis, iterative over a work stack.
    fn split(&mut self, items: &mut [Item]) {
        let mut stack: Vec<(usize, Range<usize>)> = Vec::new();
        self.nodes.push(make_node(items, 0..items.len()));
        stack.push((0, 0..items.len()));
        while let Some((node, range)) = stack.pop() {
            if range.len() <= self.leaf_capacity {
                continue;
            }
            let slice = &mut items[range.clone()];
            let mut centroids = Aabb::EMPTY;
            for it in slice.iter() {
                centroids.grow(it.centroid);
            }
            let axis = centroids.longest_axis();
            let mid = slice.len() / 2;
            slice.select_nth_unstable_by(mid, |a, b| a.centroid[axis].total_cmp(&b.centroid[axis]));
            let left = range.start..range.start + mid;
            let right = range.start + mid..range.end;
            let l = self.nodes.len();
            self.nodes.push(make_node(items, left.clone()));
            self.nodes.push(make_node(items, right.clone()));
            self.nodes[node].children = Some([l, l + 1]);
            stack.push((l, left));
            stack.push((l + 1, right));
        }
    }

    /// Gather the root box of every rank. Collective.
    pub fn gather_partition_boxes(&mut self, comm: &dyn Coordinator) {
        let local = self.root_box().unwrap_or(Aabb::EMPTY);
        let raw = [local.min, local.max].concat();
        self.partition_boxes = comm
            .all_gather_bytes(cast_slice(&raw))
            .iter()
            .map(|b| {
                let v: Vec<f64> = decode_records(b);
                match v.as_slice() {
                    [a, b, c, d, e, f] => Aabb::new([*a, *b, *c], [*d, *e, *f]),
                    _ => Aabb::EMPTY,
                }
            })
            .collect();
    }

    pub fn nodes(&self) -> &[SkdNode] {
        &self.nodes
    }

    pub fn node(&self, i: usize) -> &SkdNode {
        &self.nodes[i]
    }

    pub fn is_empty(&self) -> bool {
        self.cell_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cell_ids.len()
    }

    pub fn root_box(&self) -> Option<Aabb> {
        self.nodes.first().map(|n| n.bbox)
    }

    /// Cell ids stored in a leaf.
    pub fn leaf_cells(&self, node: usize) -> &[i64] {
        &self.cell_ids[self.nodes[node].range.clone()]
    }

    pub fn leaf_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(|&i| self.nodes[i].is_leaf())
    }

    pub fn leaf_capacity(&self) -> usize {
        self.leaf_capacity
    }

    /// Highest dimension among the indexed cells.
    pub fn dimension(&self) -> u8 {
        self.dimension
    }

    /// True for trees built over curves or surfaces.
    pub fn is_surface(&self) -> bool {
        matches!(self.dimension, 1 | 2)
    }

    pub fn vertex_normal(&self, id: i64) -> Point3 {
        self.vertex_normals.get(&id).copied().unwrap_or([0.0; 3])
    }

    /// Root box per rank; empty until [`gather_partition_boxes`](Self::gather_partition_boxes).
    pub fn partition_boxes(&self) -> &[Aabb] {
        &self.partition_boxes
    }

    /// Closest cell to `p` under `dist`, searching no farther than `r`.
    ///
    /// Subtrees whose box lies farther than the best hit so far are skipped.
    pub fn nearest_by(&self, p: Point3, r: f64, mut dist: impl FnMut(i64) -> f64) -> Option<(i64, f64)> {
        let mut best: Option<(i64, f64)> = None;
        let mut bound = r;
        let mut stack = Vec::new();
        if !self.nodes.is_empty() {
            stack.push(0usize);
        }
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            if node.bbox.distance(p) > bound {
                continue;
            }
            match node.children {
                Some([l, rgt]) => {
                    // visit the closer child first
                    let (dl, dr) = (self.nodes[l].bbox.distance(p), self.nodes[rgt].bbox.distance(p));
                    if dl <= dr {
                        stack.push(rgt);
                        stack.push(l);
                    } else {
                        stack.push(l);
                        stack.push(rgt);
                    }
                }
                None => {
                    for &id in &self.cell_ids[node.range.clone()] {
                        let d = dist(id);
                        if d <= bound && best.is_none_or(|(bid, bd)| d < bd || (d == bd && id < bid)) {
                            best = Some((id, d));
                            bound = d;
                        }
                    }
                }
            }
        }
        best
    }
}

fn make_node(items: &[Item], range: Range<usize>) -> SkdNode {
    let mut bbox = Aabb::EMPTY;
    for it in &items[range.clone()] {
        bbox.merge(&it.bbox);
    }
    SkdNode {
        bbox,
        children: None,
        range,
    }
}

// Angle-weighted average of the normals of the 2D cells around each vertex,
// plus the in-plane normals of the segments of a planar curve.
fn vertex_normals(patch: &MeshPatch) -> BTreeMap<i64, Point3> {
    let mut acc: BTreeMap<i64, Point3> = BTreeMap::new();
    accumulate_segment_normals(patch, &mut acc);
    for cell in patch.cells().filter(|c| c.kind().dimension() == 2) {
        let ids = surface_loop_ids(cell);
        let pts = patch.coords_of(&ids);
        if pts.len() != ids.len() {
            continue;
        }
        let n = cell_normal(ElementType::Polygon, &pts);
        let m = pts.len();
        for k in 0..m {
            let e1 = sub(pts[(k + 1) % m], pts[k]);
            let e2 = sub(pts[(k + m - 1) % m], pts[k]);
            let (l1, l2) = (norm(e1), norm(e2));
            if l1 <= f64::MIN_POSITIVE || l2 <= f64::MIN_POSITIVE {
                continue;
            }
            let angle = (dot(e1, e2) / (l1 * l2)).clamp(-1.0, 1.0).acos();
            let slot = acc.entry(ids[k]).or_insert([0.0; 3]);
            *slot = add(*slot, scale(n, angle));
        }
    }
    acc.into_iter().map(|(id, v)| (id, normalize(v, 1e-300))).collect()
}

// A segment's normal lies in the plane of the curve and points to the right
// of its direction when the plane normal points at the viewer, so a
// counter-clockwise loop gets outward normals. The plane is the area vector of
// the segments taken around their common centroid; a straight curve has none
// and its distances stay unsigned.
fn accumulate_segment_normals(patch: &MeshPatch, acc: &mut BTreeMap<i64, Point3>) {
    let segments: Vec<[Point3; 2]> = patch
        .cells()
        .filter(|c| c.kind() == ElementType::Line)
        .filter_map(|c| match patch.coords_of(&c.vertex_ids()).as_slice() {
            [a, b] => Some([*a, *b]),
            _ => None,
        })
        .collect();
    if segments.is_empty() {
        return;
    }
    let ends: Vec<Point3> = segments.iter().flatten().copied().collect();
    let c = mean(&ends);
    let area = segments
        .iter()
        .fold([0.0; 3], |acc, [a, b]| add(acc, cross(sub(*a, c), sub(*b, c))));
    let plane = normalize(area, 1e-300);
    if plane == [0.0; 3] {
        return;
    }
    for cell in patch.cells().filter(|c| c.kind() == ElementType::Line) {
        let ids = cell.vertex_ids();
        let pts = patch.coords_of(&ids);
        let [a, b] = pts.as_slice() else {
            continue;
        };
        let n = normalize(cross(sub(*b, *a), plane), 1e-300);
        for id in ids {
            let slot = acc.entry(id).or_insert([0.0; 3]);
            *slot = add(*slot, n);
        }
    }
}

/// Vertex ids of a cell in boundary-loop order (pixels are stored
/// lexicographically).
pub fn surface_loop_ids(cell: &Cell) -> Vec<i64> {
    let ids = cell.vertex_ids();
    if cell.kind() == ElementType::Pixel && ids.len() == 4 {
        vec![ids[0], ids[1], ids[3], ids[2]]
    } else {
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(n: usize) -> MeshPatch {
        let mut p = MeshPatch::new(0);
        for i in 0..=n {
            p.add_vertex([i as f64, 0.0, 0.0], Some(2 * i as i64)).unwrap();
            p.add_vertex([i as f64, 1.0, 0.0], Some(2 * i as i64 + 1)).unwrap();
        }
        for i in 0..n as i64 {
            p.add_cell(ElementType::Quad, vec![2 * i, 2 * i + 2, 2 * i + 3, 2 * i + 1], 0, 0, None)
                .unwrap();
        }
        p
    }

    #[test]
    fn leaves_partition_every_cell() {
        let p = strip(9);
        let t = SkdTree::build(&p, 2, true);
        let mut ids: Vec<i64> = t.leaf_indices().flat_map(|l| t.leaf_cells(l).to_vec()).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..9).collect::<Vec<_>>());
        assert!(t.leaf_indices().all(|l| t.leaf_cells(l).len() <= 2));
        let root = t.root_box().unwrap();
        assert_eq!(root.max, [9.0, 1.0, 0.0]);
        assert!(t.is_surface());
    }

    #[test]
    fn nearest_prunes_by_radius() {
        let p = strip(5);
        let t = SkdTree::build(&p, 1, true);
        let centroid_dist = |id: i64| {
            let c = p.cell(id).unwrap();
            norm(sub(cell_centroid(&p.cell_vertex_coords(c)), [3.4, 0.5, 0.0]))
        };
        assert_eq!(t.nearest_by([3.4, 0.5, 0.0], f64::MAX, centroid_dist).map(|h| h.0), Some(3));
        assert_eq!(t.nearest_by([30.0, 0.5, 0.0], 1.0, |_| 29.0), None);
    }

    #[test]
    fn flat_strip_normals_point_up() {
        let t = SkdTree::build(&strip(2), 1, true);
        for v in 0..6 {
            let n = t.vertex_normal(v);
            assert!((n[2] - 1.0).abs() < 1e-12, "{n:?}");
        }
    }

    // Unit square traversed counter-clockwise in the plane z = 0.
    fn square_loop() -> MeshPatch {
        let mut p = MeshPatch::new(0);
        for (i, c) in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]]
            .into_iter()
            .enumerate()
        {
            p.add_vertex(c, Some(i as i64)).unwrap();
        }
        for i in 0..4i64 {
            p.add_cell(ElementType::Line, vec![i, (i + 1) % 4], 0, 0, None).unwrap();
        }
        p
    }

    #[test]
    fn curve_normals_point_out_of_the_loop() {
        let t = SkdTree::build(&square_loop(), 1, true);
        let h = 0.5f64.sqrt();
        for (v, want) in [(0, [-h, -h, 0.0]), (2, [h, h, 0.0])] {
            let n = t.vertex_normal(v);
            for k in 0..3 {
                assert!((n[k] - want[k]).abs() < 1e-12, "{v}: {n:?}");
            }
        }

        // a straight polyline has no plane
        let mut p = MeshPatch::new(0);
        for i in 0..3 {
            p.add_vertex([i as f64, 0.0, 0.0], Some(i)).unwrap();
        }
        p.add_cell(ElementType::Line, vec![0, 1], 0, 0, None).unwrap();
        p.add_cell(ElementType::Line, vec![1, 2], 0, 0, None).unwrap();
        let t = SkdTree::build(&p, 1, true);
        assert_eq!(t.vertex_normal(1), [0.0; 3]);
    }
}
