//! Synchronization state of the structures derived from a mesh patch.
//!
//! Every derived structure moves through `None -> Current -> Stale -> Current`.
//! Mutations only ever downgrade `Current` to `Stale`; a structure reaches
//! `Current` again only through an explicit rebuild. `NotSupported` is fixed
//! at construction and never changes.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// State of one derived structure.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum SyncState {
    NotSupported,
    /// Never built, or released.
    None,
    /// Built, but the patch changed since.
    Stale,
    Current,
}

impl SyncState {
    /// Integer code used by the dump format.
    pub fn code(self) -> i32 {
        match self {
            SyncState::NotSupported => -1,
            SyncState::None => 0,
            SyncState::Stale => 1,
            SyncState::Current => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(SyncState::NotSupported),
            0 => Some(SyncState::None),
            1 => Some(SyncState::Stale),
            2 => Some(SyncState::Current),
            _ => None,
        }
    }

    /// True for `Stale` and `Current`.
    pub fn is_built(self) -> bool {
        matches!(self, SyncState::Stale | SyncState::Current)
    }
}

/// Structures derived from the patch geometry/topology.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Structure {
    Adjacency,
    Interfaces,
    CellTree,
    PointTree,
    NumberingInfo,
    BoundingBox,
    PointConnectivity,
    GhostExchange,
}

impl Structure {
    pub const ALL: [Structure; 8] = [
        Structure::Adjacency,
        Structure::Interfaces,
        Structure::CellTree,
        Structure::PointTree,
        Structure::NumberingInfo,
        Structure::BoundingBox,
        Structure::PointConnectivity,
        Structure::GhostExchange,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Structures rebuilt before this one during an update.
    pub fn dependencies(self) -> &'static [Structure] {
        match self {
            Structure::Interfaces | Structure::NumberingInfo | Structure::GhostExchange => {
                &[Structure::Adjacency]
            }
            _ => &[],
        }
    }
}

/// Topological order of [`Structure::dependencies`], ties kept in declaration order.
pub static REBUILD_ORDER: Lazy<Vec<Structure>> = Lazy::new(|| {
    let mut order = Vec::with_capacity(Structure::ALL.len());
    let mut pending: Vec<Structure> = Structure::ALL.to_vec();
    while !pending.is_empty() {
        let ready = pending
            .iter()
            .position(|s| s.dependencies().iter().all(|d| order.contains(d)));
        match ready {
            Some(i) => order.push(pending.remove(i)),
            // cycle: keep the remaining ones in declaration order
            None => order.append(&mut pending),
        }
    }
    order
});

/// One [`SyncState`] per [`Structure`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncTable {
    states: [SyncState; 8],
}

impl Default for SyncTable {
    fn default() -> Self {
        Self {
            states: [SyncState::None; 8],
        }
    }
}

impl SyncTable {
    pub fn get(&self, s: Structure) -> SyncState {
        self.states[s.index()]
    }

    /// Set a state; a `NotSupported` entry is never overwritten.
    pub fn set(&mut self, s: Structure, state: SyncState) {
        let slot = &mut self.states[s.index()];
        if *slot != SyncState::NotSupported {
            *slot = state;
        }
    }

    pub fn mark_unsupported(&mut self, s: Structure) {
        self.states[s.index()] = SyncState::NotSupported;
    }

    /// Downgrade every listed `Current` entry to `Stale`.
    pub fn invalidate(&mut self, structures: &[Structure]) {
        for &s in structures {
            if self.get(s) == SyncState::Current {
                self.states[s.index()] = SyncState::Stale;
            }
        }
    }

    /// Stale structures in rebuild order.
    pub fn stale(&self) -> Vec<Structure> {
        REBUILD_ORDER
            .iter()
            .copied()
            .filter(|s| self.get(*s) == SyncState::Stale)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_respects_dependencies() {
        for (i, s) in REBUILD_ORDER.iter().enumerate() {
            for dep in s.dependencies() {
                let j = REBUILD_ORDER.iter().position(|x| x == dep).unwrap();
                assert!(j < i, "{dep:?} must precede {s:?}");
            }
        }
        assert_eq!(REBUILD_ORDER.len(), Structure::ALL.len());
        assert_eq!(REBUILD_ORDER[0], Structure::Adjacency);
    }

    #[test]
    fn invalidate_only_touches_current() {
        let mut t = SyncTable::default();
        t.mark_unsupported(Structure::CellTree);
        t.set(Structure::Adjacency, SyncState::Current);
        t.set(Structure::CellTree, SyncState::Current);
        t.invalidate(&Structure::ALL);
        assert_eq!(t.get(Structure::Adjacency), SyncState::Stale);
        assert_eq!(t.get(Structure::Interfaces), SyncState::None);
        assert_eq!(t.get(Structure::CellTree), SyncState::NotSupported);
        assert_eq!(t.stale(), vec![Structure::Adjacency]);
    }

    #[test]
    fn codes_roundtrip() {
        for s in [SyncState::NotSupported, SyncState::None, SyncState::Stale, SyncState::Current] {
            assert_eq!(SyncState::from_code(s.code()), Some(s));
        }
        assert_eq!(SyncState::from_code(9), None);
    }
}
