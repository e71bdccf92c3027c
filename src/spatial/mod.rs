//! Spatial indexing: a bounding-volume tree over cells, a kd-tree over
//! vertices and the queries built on them.

pub mod global;
pub mod kd_tree;
pub mod queries;
pub mod skd_tree;

pub use kd_tree::KdTree;
pub use queries::{Proximity, Radius, SignedProximity, SkdTreeView};
pub use skd_tree::SkdTree;
