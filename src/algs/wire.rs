//! Fixed-size little-endian wire records for coordinator payloads.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::{align_of, size_of};

/// Encode a slice of records as raw bytes.
pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Decode records from a byte buffer of any alignment.
///
/// Trailing bytes that do not form a whole record are ignored.
pub fn decode_records<T: Pod>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

/// Closest-cell candidate exchanged by distributed distance queries.
///
/// All multi-byte fields are stored pre-LE with `.to_le()`; use the accessors.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CellInfo {
    distance_bits_le: u64,
    rank_le: u32,
    _pad: u32, // pad to 8-byte alignment (explicit)
    id_le: i64,
}

/// Id carried by [`CellInfo::NOT_FOUND`].
pub const NULL_ID: i64 = -1;

impl CellInfo {
    pub const SIZE: usize = 24;

    pub const NOT_FOUND: CellInfo = CellInfo {
        distance_bits_le: f64::MAX.to_bits().to_le(),
        rank_le: u32::MAX.to_le(),
        _pad: 0,
        id_le: NULL_ID.to_le(),
    };

    pub fn new(distance: f64, rank: usize, id: i64) -> Self {
        Self {
            distance_bits_le: distance.to_bits().to_le(),
            rank_le: (rank as u32).to_le(),
            _pad: 0,
            id_le: id.to_le(),
        }
    }

    pub fn distance(&self) -> f64 {
        f64::from_bits(u64::from_le(self.distance_bits_le))
    }

    /// Owner rank of the cell.
    pub fn rank(&self) -> usize {
        u32::from_le(self.rank_le) as usize
    }

    pub fn id(&self) -> i64 {
        i64::from_le(self.id_le)
    }

    pub fn is_found(&self) -> bool {
        self.id() != NULL_ID
    }
}

impl PartialEq for CellInfo {
    fn eq(&self, other: &Self) -> bool {
        self.distance() == other.distance() && self.rank() == other.rank() && self.id() == other.id()
    }
}

const_assert_eq!(size_of::<CellInfo>(), CellInfo::SIZE);
const_assert_eq!(align_of::<CellInfo>(), 8);
