//! Binary dump and restore of a container.
//!
//! The stream is a sequence of `bincode` values: kind code, rank count (only
//! when distributed), PIDs, PID names, the states of adjacency, interfaces
//! and point connectivity, the tolerance, and finally the patch dump.

use std::io::{Read, Write};

use super::{MeshKind, MeshObject, PatchHandle};
use crate::context::Context;
use crate::mesh_error::MeshError;
use crate::topology::patch::MeshPatch;
use crate::topology::sync::{Structure, SyncState};

const DUMPED_STATES: [Structure; 3] = [Structure::Adjacency, Structure::Interfaces, Structure::PointConnectivity];

impl MeshObject<'_> {
    pub fn dump<W: Write>(&self, writer: &mut W) -> Result<(), MeshError> {
        bincode::serialize_into(&mut *writer, &self.kind().code())?;
        if self.is_distributed() {
            bincode::serialize_into(&mut *writer, &(self.ctx.comm().size() as u32))?;
        }
        let pids: Vec<i64> = self.pids.keys().copied().collect();
        let names: Vec<String> = self.pids.values().cloned().collect();
        bincode::serialize_into(&mut *writer, &pids)?;
        bincode::serialize_into(&mut *writer, &names)?;
        for s in DUMPED_STATES {
            bincode::serialize_into(&mut *writer, &self.sync_state(s).code())?;
        }
        bincode::serialize_into(&mut *writer, &self.tolerance)?;
        self.patch().dump(writer)
    }

    /// Read a container written by [`dump`](Self::dump). Structures dumped
    /// in any state but `None` come back `Current`.
    pub fn restore<R: Read>(reader: &mut R, ctx: &Context) -> Result<MeshObject<'static>, MeshError> {
        let code: i32 = bincode::deserialize_from(&mut *reader)?;
        let kind = MeshKind::try_from(code)?;
        if ctx.is_distributed() {
            let found: u32 = bincode::deserialize_from(&mut *reader)?;
            let expected = ctx.comm().size();
            if found as usize != expected {
                return Err(MeshError::RankCountMismatch {
                    expected,
                    found: found as usize,
                });
            }
        }
        let pids: Vec<i64> = bincode::deserialize_from(&mut *reader)?;
        let names: Vec<String> = bincode::deserialize_from(&mut *reader)?;
        if pids.len() != names.len() {
            return Err(MeshError::Serialization(format!(
                "{} pids but {} pid names",
                pids.len(),
                names.len()
            )));
        }
        let mut states = Vec::with_capacity(DUMPED_STATES.len());
        for _ in DUMPED_STATES {
            let code: i32 = bincode::deserialize_from(&mut *reader)?;
            states.push(
                SyncState::from_code(code)
                    .ok_or_else(|| MeshError::Serialization(format!("unknown sync state code {code}")))?,
            );
        }
        let tolerance: f64 = bincode::deserialize_from(&mut *reader)?;
        let patch = MeshPatch::restore(reader)?;

        let mut obj = MeshObject::with_handle(kind, PatchHandle::Owned(Box::new(patch)), ctx.clone());
        obj.set_tolerance(tolerance);
        obj.pids = pids.into_iter().zip(names).collect();
        for (s, state) in DUMPED_STATES.into_iter().zip(states) {
            if state == SyncState::None || state == SyncState::NotSupported {
                continue;
            }
            let restored = match s {
                Structure::Adjacency => obj.patch().adjacencies_built(),
                Structure::Interfaces => obj.patch().interfaces_built(),
                _ => false,
            };
            if restored {
                obj.sync.set(s, SyncState::Current);
            } else {
                obj.ensure_current(s);
            }
        }
        log::debug!(
            target: ctx.log_target(),
            "restored object {} ({kind:?}, {} vertices, {} cells)",
            obj.id(),
            obj.n_vertices(),
            obj.n_cells()
        );
        Ok(obj)
    }
}
