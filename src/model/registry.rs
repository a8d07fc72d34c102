use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, RwLock},
};

use crate::{
    error::{PipelineError, validation_error},
    model::types::{Model, ModelKey},
};

pub type SharedModel = Arc<Mutex<Model>>;

#[derive(Default)]
struct RegistryState {
    version: u64,
    by_key: BTreeMap<ModelKey, SharedModel>,
}

/// Known models of a processing session, keyed by [`ModelKey`].
///
/// The registry lock only guards insert/lookup/remove. Each model sits behind
/// its own mutex so independent pipelines never contend on the registry while
/// a stage runs.
#[derive(Default)]
pub struct ModelRegistry {
    state: RwLock<RegistryState>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.state.read().expect("lock poisoned").version
    }

    pub fn len(&self) -> usize {
        self.state.read().expect("lock poisoned").by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn register(&self, model: Model) -> Result<SharedModel, PipelineError> {
        let key = model.key().clone();
        let mut guard = self.state.write().expect("lock poisoned");
        if guard.by_key.contains_key(&key) {
            return Err(validation_error(format!("model already registered: {key}")));
        }

        let shared = Arc::new(Mutex::new(model));
        guard.by_key.insert(key, Arc::clone(&shared));
        guard.version = guard.version.saturating_add(1);
        Ok(shared)
    }

    /// Inserts or replaces the entry for the model's key.
    pub fn upsert(&self, model: Model) -> SharedModel {
        let key = model.key().clone();
        let shared = Arc::new(Mutex::new(model));
        let mut guard = self.state.write().expect("lock poisoned");
        guard.by_key.insert(key, Arc::clone(&shared));
        guard.version = guard.version.saturating_add(1);
        shared
    }

    pub fn unregister(&self, key: &ModelKey) -> Option<SharedModel> {
        let mut guard = self.state.write().expect("lock poisoned");
        let removed = guard.by_key.remove(key);
        if removed.is_some() {
            guard.version = guard.version.saturating_add(1);
        }
        removed
    }

    pub fn resolve(&self, key: &ModelKey) -> Option<SharedModel> {
        self.state
            .read()
            .expect("lock poisoned")
            .by_key
            .get(key)
            .map(Arc::clone)
    }

    pub fn keys(&self) -> Vec<ModelKey> {
        self.state
            .read()
            .expect("lock poisoned")
            .by_key
            .keys()
            .cloned()
            .collect()
    }
}
