//! Element-wise reductions used by the provided [`Coordinator`](super::communicator::Coordinator)
//! collectives.

use super::wire::CellInfo;

/// Reduction operator for numeric all-reduces.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReduceOp {
    Min,
    Max,
    Sum,
}

impl ReduceOp {
    pub fn apply_f64(self, a: f64, b: f64) -> f64 {
        match self {
            ReduceOp::Min => a.min(b),
            ReduceOp::Max => a.max(b),
            ReduceOp::Sum => a + b,
        }
    }

    pub fn apply_i64(self, a: i64, b: i64) -> i64 {
        match self {
            ReduceOp::Min => a.min(b),
            ReduceOp::Max => a.max(b),
            ReduceOp::Sum => a + b,
        }
    }
}

/// Smaller of two candidates, comparing distance, then rank, then id.
pub fn min_cell_info(a: CellInfo, b: CellInfo) -> CellInfo {
    let ka = (a.distance(), a.rank(), a.id());
    let kb = (b.distance(), b.rank(), b.id());
    match ka.partial_cmp(&kb) {
        Some(std::cmp::Ordering::Greater) => b,
        // NaN distances never win over a real candidate
        None if a.distance().is_nan() => b,
        _ => a,
    }
}

/// Fold one rank's contribution into the accumulator, element by element.
///
/// `acc` is sized by the first contribution; extra elements are ignored.
pub fn fold_into<T: Copy>(acc: &mut Vec<T>, contrib: &[T], op: impl Fn(T, T) -> T) {
    if acc.is_empty() {
        acc.extend_from_slice(contrib);
        return;
    }
    for (a, b) in acc.iter_mut().zip(contrib) {
        *a = op(*a, *b);
    }
}
