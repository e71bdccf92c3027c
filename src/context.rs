//! Explicit per-run state handed to container constructors: the coordinator,
//! an id allocator for containers, geometry configuration and a log target.
//!
//! Nothing here is global, so independent contexts can live side by side in
//! the same process (one per test, one per in-process rank, ...).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::algs::communicator::{Coordinator, NoComm};
use crate::config::GeometryConfig;

#[derive(Clone)]
pub struct Context {
    comm: Arc<dyn Coordinator>,
    next_id: Arc<AtomicU64>,
    config: GeometryConfig,
    log_target: String,
}

impl Context {
    pub fn new(comm: Arc<dyn Coordinator>, config: GeometryConfig) -> Self {
        Self {
            comm,
            next_id: Arc::new(AtomicU64::new(0)),
            config: config.sanitized(),
            log_target: "mesh_morph".to_string(),
        }
    }

    /// Serial context with default configuration.
    pub fn serial() -> Self {
        Self::new(Arc::new(NoComm), GeometryConfig::default())
    }

    pub fn with_log_target(mut self, target: impl Into<String>) -> Self {
        self.log_target = target.into();
        self
    }

    pub fn with_config(mut self, config: GeometryConfig) -> Self {
        self.config = config.sanitized();
        self
    }

    pub fn comm(&self) -> &dyn Coordinator {
        self.comm.as_ref()
    }

    pub fn config(&self) -> &GeometryConfig {
        &self.config
    }

    pub fn log_target(&self) -> &str {
        &self.log_target
    }

    pub fn is_distributed(&self) -> bool {
        self.comm.is_distributed()
    }

    /// Allocate a fresh container id.
    pub fn next_object_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::serial()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("rank", &self.comm.rank())
            .field("size", &self.comm.size())
            .field("config", &self.config)
            .field("log_target", &self.log_target)
            .finish()
    }
}
