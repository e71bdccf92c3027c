//! Geometric primitives and cell metrics.
//!
//! All coordinates are `[f64; 3]`; 2D meshes simply keep `z` constant.

pub mod bbox;
pub mod cg;
pub mod metrics;
pub mod vector;

pub use bbox::Aabb;
pub use vector::Point3;
