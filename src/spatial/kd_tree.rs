//! Point kd-tree over patch vertices.
//!
//! Implicit layout: points are permuted so that every subrange `lo..hi` has
//! its splitting point at `(lo + hi) / 2`, with the axis cycling by depth.

use crate::geometry::Point3;
use crate::geometry::vector::distance;
use crate::topology::patch::MeshPatch;

#[derive(Clone, Debug, Default)]
pub struct KdTree {
    points: Vec<(i64, Point3)>,
}

impl KdTree {
    pub fn build(points: impl IntoIterator<Item = (i64, Point3)>) -> Self {
        let mut points: Vec<(i64, Point3)> = points.into_iter().collect();
        let mut stack = vec![(0usize, points.len(), 0usize)];
        while let Some((lo, hi, depth)) = stack.pop() {
            if hi - lo <= 1 {
                continue;
            }
            let axis = depth % 3;
            let mid = (lo + hi) / 2;
            points[lo..hi].select_nth_unstable_by(mid - lo, |a, b| {
                a.1[axis].total_cmp(&b.1[axis]).then(a.0.cmp(&b.0))
            });
            stack.push((lo, mid, depth + 1));
            stack.push((mid + 1, hi, depth + 1));
        }
        Self { points }
    }

    pub fn from_patch(patch: &MeshPatch) -> Self {
        Self::build(patch.vertices())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Closest vertex and its distance; ties go to the lowest id.
    pub fn nearest(&self, p: Point3) -> Option<(i64, f64)> {
        let mut best: Option<(i64, f64)> = None;
        self.visit(p, |bound| bound, |id, d, best_bound| {
            if best.is_none_or(|(bid, bd)| d < bd || (d == bd && id < bid)) {
                best = Some((id, d));
                *best_bound = d;
            }
        }, f64::MAX);
        best
    }

    /// Every vertex within `r` of `p` (inclusive), sorted by id.
    pub fn within(&self, p: Point3, r: f64) -> Vec<i64> {
        let mut out = Vec::new();
        self.visit(p, |_| r, |id, d, _| {
            if d <= r {
                out.push(id);
            }
        }, r);
        out.sort_unstable();
        out
    }

    // Shared traversal: `bound` gives the current pruning radius.
    fn visit(
        &self,
        p: Point3,
        bound: impl Fn(f64) -> f64,
        mut hit: impl FnMut(i64, f64, &mut f64),
        start: f64,
    ) {
        let mut radius = start;
        let mut stack = vec![(0usize, self.points.len(), 0usize)];
        while let Some((lo, hi, depth)) = stack.pop() {
            if lo >= hi {
                continue;
            }
            let mid = (lo + hi) / 2;
            let (id, q) = self.points[mid];
            hit(id, distance(p, q), &mut radius);
            let axis = depth % 3;
            let delta = p[axis] - q[axis];
            let (near, far) = if delta <= 0.0 {
                ((lo, mid), (mid + 1, hi))
            } else {
                ((mid + 1, hi), (lo, mid))
            };
            if delta.abs() <= bound(radius) {
                stack.push((far.0, far.1, depth + 1));
            }
            stack.push((near.0, near.1, depth + 1));
        }
    }
}
