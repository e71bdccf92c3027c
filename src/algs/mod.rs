//! Distributed coordination: collectives, wire records and reductions.

pub mod communicator;
pub mod reduction;
pub mod wire;

pub use communicator::{Coordinator, NoComm, ThreadComm};
#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
pub use reduction::ReduceOp;
pub use wire::CellInfo;
