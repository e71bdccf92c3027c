//! Ownership metadata for patch vertices.
//!
//! Cells carry their owner rank explicitly. A vertex is owned by the lowest
//! rank among the cells that contain it, and is a ghost on every other rank.
//! Vertices outside any cell belong to the local rank.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct OwnershipEntry {
    pub owner: usize,
    pub is_ghost: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VertexOwnership {
    entries: BTreeMap<i64, OwnershipEntry>,
}

impl VertexOwnership {
    /// Returns the number of tracked vertices.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries exist in the map.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or update an entry, using `my_rank` to determine ghostness.
    pub fn set_from_owner(&mut self, vertex: i64, owner: usize, my_rank: usize) {
        self.entries.insert(
            vertex,
            OwnershipEntry {
                owner,
                is_ghost: owner != my_rank,
            },
        );
    }

    /// Insert or update an entry, keeping the smallest owner when repeated.
    pub fn set_owner_min(&mut self, vertex: i64, owner: usize, my_rank: usize) {
        let updated_owner = match self.entries.get(&vertex) {
            Some(existing) => existing.owner.min(owner),
            None => owner,
        };
        self.set_from_owner(vertex, updated_owner, my_rank);
    }

    /// Retrieve the owning rank for a vertex.
    pub fn owner(&self, vertex: i64) -> Option<usize> {
        self.entries.get(&vertex).map(|entry| entry.owner)
    }

    /// Returns whether the vertex is a ghost on this rank.
    pub fn is_ghost(&self, vertex: i64) -> Option<bool> {
        self.entries.get(&vertex).map(|entry| entry.is_ghost)
    }

    /// Iterate over owned vertices in id order.
    pub fn owned_points(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.is_ghost)
            .map(|(id, _)| *id)
    }

    /// Iterate over ghost vertices in id order.
    pub fn ghost_points(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_ghost)
            .map(|(id, _)| *id)
    }
}
