//! Axis-aligned bounding boxes.

use serde::{Deserialize, Serialize};

use super::vector::Point3;

/// Axis-aligned box given by its min and max corners.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3,
    pub max: Point3,
}

impl Aabb {
    /// Box that contains nothing; growing it by any point yields that point.
    pub const EMPTY: Aabb = Aabb {
        min: [f64::MAX; 3],
        max: [f64::MIN; 3],
    };

    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Smallest box holding every point, `None` for an empty iterator.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Option<Self> {
        let mut bbox = Aabb::EMPTY;
        let mut any = false;
        for p in points {
            bbox.grow(*p);
            any = true;
        }
        any.then_some(bbox)
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|d| self.min[d] > self.max[d])
    }

    pub fn grow(&mut self, p: Point3) {
        for d in 0..3 {
            self.min[d] = self.min[d].min(p[d]);
            self.max[d] = self.max[d].max(p[d]);
        }
    }

    pub fn merge(&mut self, other: &Aabb) {
        for d in 0..3 {
            self.min[d] = self.min[d].min(other.min[d]);
            self.max[d] = self.max[d].max(other.max[d]);
        }
    }

    /// Copy of the box enlarged by `tol` on every side.
    pub fn inflated(&self, tol: f64) -> Aabb {
        Aabb {
            min: [self.min[0] - tol, self.min[1] - tol, self.min[2] - tol],
            max: [self.max[0] + tol, self.max[1] + tol, self.max[2] + tol],
        }
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        (0..3).all(|d| self.min[d] <= other.max[d] && other.min[d] <= self.max[d])
    }

    pub fn contains(&self, p: Point3) -> bool {
        (0..3).all(|d| self.min[d] <= p[d] && p[d] <= self.max[d])
    }

    /// Euclidean distance from `p` to the box, zero inside.
    pub fn distance(&self, p: Point3) -> f64 {
        let mut sq = 0.0;
        for d in 0..3 {
            let excess = if p[d] < self.min[d] {
                self.min[d] - p[d]
            } else if p[d] > self.max[d] {
                p[d] - self.max[d]
            } else {
                0.0
            };
            sq += excess * excess;
        }
        sq.sqrt()
    }

    /// Index of the longest side.
    pub fn longest_axis(&self) -> usize {
        let ext = [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ];
        if ext[0] >= ext[1] && ext[0] >= ext[2] {
            0
        } else if ext[1] >= ext[2] {
            1
        } else {
            2
        }
    }
}
