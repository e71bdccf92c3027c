//! Mesh topology: element kinds, cells, the patch storing them, vertex
//! ownership and the synchronization state of derived structures.
//!
//! Most users go through [`MeshObject`](crate::object::MeshObject); the types
//! here are the storage layer it builds on.

pub mod cache;
pub mod cell;
pub mod cell_type;
pub mod ownership;
pub mod patch;
pub mod sync;

pub use cache::InvalidateCache;
pub use cell::{Cell, Interface};
pub use cell_type::{ElementType, check_cell_conn_coherence};
pub use patch::MeshPatch;
pub use sync::{Structure, SyncState, SyncTable};
