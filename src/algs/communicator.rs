//! Thin façade over serial, in-process (threads) or inter-process (MPI)
//! collectives.
//!
//! Every method here is collective: all ranks of a group must call it in the
//! same order, otherwise the group deadlocks. Messages are contiguous byte
//! buffers; typed helpers on top go through [`wire`](super::wire).

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use parking_lot::{Condvar, Mutex};

use super::reduction::{ReduceOp, fold_into, min_cell_info};
use super::wire::{CellInfo, cast_slice, decode_records};

/// Collective communication used by distributed mesh queries.
pub trait Coordinator {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Gather one buffer per rank, indexed by rank.
    fn all_gather_bytes(&self, buf: &[u8]) -> Vec<Bytes>;

    /// Sparse all-to-all: send `outgoing[dst]` to `dst`, return what each
    /// source sent to this rank. A source that listed this rank appears even
    /// with an empty payload; sources that did not are absent. Every backend
    /// returns the same map shape.
    fn exchange(&self, outgoing: BTreeMap<usize, Vec<u8>>) -> BTreeMap<usize, Bytes> {
        let mut framed = BytesMut::new();
        for (dst, payload) in &outgoing {
            framed.put_u32_le(*dst as u32);
            framed.put_u32_le(payload.len() as u32);
            framed.put_slice(payload);
        }
        let me = self.rank();
        let mut incoming = BTreeMap::new();
        for (src, mut frame) in self.all_gather_bytes(&framed).into_iter().enumerate() {
            while frame.remaining() >= 8 {
                let dst = frame.get_u32_le() as usize;
                let len = (frame.get_u32_le() as usize).min(frame.remaining());
                let payload = frame.split_to(len);
                if dst == me {
                    incoming.insert(src, payload);
                }
            }
        }
        incoming
    }

    fn barrier(&self);

    fn is_distributed(&self) -> bool {
        self.size() > 1
    }

    /// Element-wise minimum of closest-cell candidates over every rank.
    fn reduce_min_cell_info(&self, local: &[CellInfo]) -> Vec<CellInfo> {
        if !self.is_distributed() {
            return local.to_vec();
        }
        let mut acc = Vec::new();
        for buf in self.all_gather_bytes(cast_slice(local)) {
            fold_into(&mut acc, &decode_records::<CellInfo>(&buf), min_cell_info);
        }
        acc
    }

    fn all_reduce_f64(&self, local: &[f64], op: ReduceOp) -> Vec<f64> {
        if !self.is_distributed() {
            return local.to_vec();
        }
        let mut acc = Vec::new();
        for buf in self.all_gather_bytes(cast_slice(local)) {
            fold_into(&mut acc, &decode_records::<f64>(&buf), |a, b| op.apply_f64(a, b));
        }
        acc
    }

    fn all_reduce_i64(&self, local: &[i64], op: ReduceOp) -> Vec<i64> {
        if !self.is_distributed() {
            return local.to_vec();
        }
        let mut acc = Vec::new();
        for buf in self.all_gather_bytes(cast_slice(local)) {
            fold_into(&mut acc, &decode_records::<i64>(&buf), |a, b| op.apply_i64(a, b));
        }
        acc
    }

    /// Gather every rank's list, indexed by rank.
    fn all_gather_i64(&self, local: &[i64]) -> Vec<Vec<i64>> {
        if !self.is_distributed() {
            return vec![local.to_vec()];
        }
        self.all_gather_bytes(cast_slice(local))
            .iter()
            .map(|b| decode_records(b))
            .collect()
    }
}

/// Serial backend: rank 0 of 1.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Coordinator for NoComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_gather_bytes(&self, buf: &[u8]) -> Vec<Bytes> {
        vec![Bytes::copy_from_slice(buf)]
    }

    fn exchange(&self, mut outgoing: BTreeMap<usize, Vec<u8>>) -> BTreeMap<usize, Bytes> {
        outgoing
            .remove(&0)
            .map(|b| BTreeMap::from([(0, Bytes::from(b))]))
            .unwrap_or_default()
    }

    fn barrier(&self) {}
}

// --- ThreadComm: in-process ranks, one thread each ---

#[derive(Default)]
struct HubState {
    slots: Vec<Option<Bytes>>,
    arrived: usize,
    departed: usize,
    generation: u64,
    draining: bool,
    result: Option<Arc<Vec<Bytes>>>,
}

struct Hub {
    size: usize,
    state: Mutex<HubState>,
    cv: Condvar,
}

impl Hub {
    fn all_gather(&self, rank: usize, buf: Bytes) -> Vec<Bytes> {
        let mut st = self.state.lock();
        // previous round still handing out results
        while st.draining {
            self.cv.wait(&mut st);
        }
        st.slots[rank] = Some(buf);
        st.arrived += 1;
        if st.arrived == self.size {
            let gathered: Vec<Bytes> = st.slots.iter_mut().map(|s| s.take().unwrap_or_default()).collect();
            st.result = Some(Arc::new(gathered));
            st.draining = true;
            st.departed = 0;
            st.generation += 1;
            self.cv.notify_all();
        } else {
            let generation = st.generation;
            while st.generation == generation {
                self.cv.wait(&mut st);
            }
        }
        let out = st.result.as_ref().map(|r| r.as_ref().clone()).unwrap_or_default();
        st.departed += 1;
        if st.departed == self.size {
            st.draining = false;
            st.arrived = 0;
            st.result = None;
            self.cv.notify_all();
        }
        out
    }
}

/// In-process backend: `size` ranks sharing a hub, each driven by its own
/// thread. Used to exercise the distributed code paths in tests.
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    hub: Arc<Hub>,
}

impl ThreadComm {
    /// One handle per rank; move each into its own thread.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        let size = size.max(1);
        let hub = Arc::new(Hub {
            size,
            state: Mutex::new(HubState {
                slots: vec![None; size],
                ..Default::default()
            }),
            cv: Condvar::new(),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                hub: Arc::clone(&hub),
            })
            .collect()
    }
}

impl std::fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.hub.size)
            .finish()
    }
}

impl Coordinator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.hub.size
    }

    fn all_gather_bytes(&self, buf: &[u8]) -> Vec<Bytes> {
        self.hub.all_gather(self.rank, Bytes::copy_from_slice(buf))
    }

    fn barrier(&self) {
        self.hub.all_gather(self.rank, Bytes::new());
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::datatype::{Partition, PartitionMut};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;
    use mpi::{Count, environment::Universe};

    pub struct MpiComm {
        // finalizes MPI on drop; must outlive `world`
        _universe: Option<Universe>,
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        /// Initialize MPI and wrap `MPI_COMM_WORLD`. `None` if MPI was
        /// already initialized.
        pub fn new() -> Option<Self> {
            let universe = mpi::initialize()?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Some(Self {
                _universe: Some(universe),
                world,
                rank,
                size,
            })
        }
    }

    fn displacements(counts: &[Count]) -> Vec<Count> {
        counts
            .iter()
            .scan(0, |acc, &c| {
                let d = *acc;
                *acc += c;
                Some(d)
            })
            .collect()
    }

    fn split(buf: Vec<u8>, counts: &[Count]) -> Vec<Bytes> {
        let mut all = Bytes::from(buf);
        counts.iter().map(|&c| all.split_to(c as usize)).collect()
    }

    impl Coordinator for MpiComm {
        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn all_gather_bytes(&self, buf: &[u8]) -> Vec<Bytes> {
            let n = buf.len() as Count;
            let mut counts = vec![0 as Count; self.size];
            self.world.all_gather_into(&n, &mut counts[..]);
            let displs = displacements(&counts);
            let total: Count = counts.iter().sum();
            let mut recv = vec![0u8; total as usize];
            {
                let mut part = PartitionMut::new(&mut recv[..], &counts[..], &displs[..]);
                self.world.all_gather_varcount_into(buf, &mut part);
            }
            split(recv, &counts)
        }

        fn exchange(&self, outgoing: BTreeMap<usize, Vec<u8>>) -> BTreeMap<usize, Bytes> {
            let mut send_counts = vec![0 as Count; self.size];
            let mut send_headers = vec![0 as Count; self.size];
            let mut send_buf = Vec::new();
            for dst in 0..self.size {
                if let Some(payload) = outgoing.get(&dst) {
                    send_counts[dst] = payload.len() as Count;
                    send_headers[dst] = payload.len() as Count + 1;
                    send_buf.extend_from_slice(payload);
                }
            }
            let mut recv_headers = vec![0 as Count; self.size];
            self.world.all_to_all_into(&send_headers[..], &mut recv_headers[..]);
            let (recv_counts, present) = decode_headers(&recv_headers);
            let send_displs = displacements(&send_counts);
            let recv_displs = displacements(&recv_counts);
            let total: Count = recv_counts.iter().sum();
            let mut recv = vec![0u8; total as usize];
            {
                let send = Partition::new(&send_buf[..], &send_counts[..], &send_displs[..]);
                let mut part = PartitionMut::new(&mut recv[..], &recv_counts[..], &recv_displs[..]);
                self.world.all_to_all_varcount_into(&send, &mut part);
            }
            split(recv, &recv_counts)
                .into_iter()
                .enumerate()
                .filter(|(src, _)| present[*src])
                .collect()
        }

        fn barrier(&self) {
            self.world.barrier();
        }
    }

    // A header is the payload length plus one, or 0 when nothing was sent.
    fn decode_headers(headers: &[Count]) -> (Vec<Count>, Vec<bool>) {
        headers.iter().map(|&h| ((h - 1).max(0), h > 0)).unzip()
    }

}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn no_comm_is_identity() {
        let c = NoComm;
        assert_eq!(c.all_reduce_i64(&[3, 4], ReduceOp::Sum), vec![3, 4]);
        let got = c.exchange(BTreeMap::from([(0, vec![1u8, 2])]));
        assert_eq!(got[&0].as_ref(), &[1, 2]);
        assert!(!c.is_distributed());
    }

    #[test]
    fn thread_comm_collectives() {
        let handles: Vec<_> = ThreadComm::group(3)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let r = comm.rank() as i64;
                    let sum = comm.all_reduce_i64(&[r, 1], ReduceOp::Sum);
                    let max = comm.all_reduce_f64(&[r as f64], ReduceOp::Max);
                    let gathered = comm.all_gather_i64(&vec![r; comm.rank() + 1]);
                    // ring exchange: each rank sends its id to the next one
                    let next = (comm.rank() + 1) % comm.size();
                    let got = comm.exchange(BTreeMap::from([(next, vec![comm.rank() as u8])]));
                    comm.barrier();
                    (comm.rank(), sum, max, gathered, got)
                })
            })
            .collect();
        for h in handles {
            let (rank, sum, max, gathered, got) = h.join().unwrap();
            assert_eq!(sum, vec![3, 3]);
            assert_eq!(max, vec![2.0]);
            assert_eq!(gathered, vec![vec![0], vec![1, 1], vec![2, 2, 2]]);
            let prev = (rank + 2) % 3;
            assert_eq!(got.len(), 1);
            assert_eq!(got[&prev].as_ref(), &[prev as u8]);
        }
    }

    #[test]
    fn empty_payloads_are_still_delivered() {
        assert!(NoComm.exchange(BTreeMap::from([(0, Vec::new())]))[&0].is_empty());
        let handles: Vec<_> = ThreadComm::group(3)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    // rank 0 addresses rank 1 with nothing, rank 2 stays silent
                    let outgoing = match comm.rank() {
                        0 => BTreeMap::from([(1, Vec::new()), (2, vec![7u8])]),
                        _ => BTreeMap::new(),
                    };
                    (comm.rank(), comm.exchange(outgoing))
                })
            })
            .collect();
        for h in handles {
            let (rank, got) = h.join().unwrap();
            match rank {
                0 => assert!(got.is_empty()),
                1 => {
                    assert_eq!(got.keys().copied().collect::<Vec<_>>(), vec![0]);
                    assert!(got[&0].is_empty());
                }
                _ => assert_eq!(got[&0].as_ref(), &[7]),
            }
        }
    }

    #[test]
    fn thread_comm_min_cell_info() {
        let handles: Vec<_> = ThreadComm::group(2)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let local = if comm.rank() == 0 {
                        vec![CellInfo::new(1.0, 0, 4), CellInfo::NOT_FOUND]
                    } else {
                        vec![CellInfo::new(1.0, 1, 2), CellInfo::new(0.25, 1, 8)]
                    };
                    comm.reduce_min_cell_info(&local)
                })
            })
            .collect();
        for h in handles {
            let out = h.join().unwrap();
            assert_eq!(out[0].id(), 4);
            assert_eq!(out[1].id(), 8);
        }
    }
}
