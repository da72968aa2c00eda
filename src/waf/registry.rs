//! Name-keyed checkpoint registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::waf::checkpoint::Checkpoint;
use crate::waf::remote_addr::RemoteAddrCheckpoint;
use crate::waf::request_attrs::*;
use crate::waf::response_attrs::*;

#[derive(Debug, Clone, Default)]
pub struct CheckpointRegistry {
    checkpoints: HashMap<&'static str, Arc<dyn Checkpoint>>,
}

impl CheckpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in checkpoint.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RemoteAddrCheckpoint));
        registry.register(Arc::new(RawRemoteAddrCheckpoint));
        registry.register(Arc::new(RemotePortCheckpoint));
        registry.register(Arc::new(RequestMethodCheckpoint));
        registry.register(Arc::new(RequestUriCheckpoint));
        registry.register(Arc::new(RequestPathCheckpoint));
        registry.register(Arc::new(RequestHostCheckpoint));
        registry.register(Arc::new(RequestHeaderCheckpoint));
        registry.register(Arc::new(RequestArgCheckpoint));
        registry.register(Arc::new(RequestLengthCheckpoint));
        registry.register(Arc::new(ResponseStatusCheckpoint));
        registry.register(Arc::new(ResponseHeaderCheckpoint));
        registry.register(Arc::new(ResponseBodySizeCheckpoint));
        registry
    }

    /// Register a checkpoint under its own name, replacing any previous one.
    pub fn register(&mut self, checkpoint: Arc<dyn Checkpoint>) {
        self.checkpoints.insert(checkpoint.name(), checkpoint);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Checkpoint>> {
        self.checkpoints.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.checkpoints.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }
}
