//! Worker registry

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::EngineError;
use crate::worker::AnalysisWorker;

/// Ordered set of workers, keyed by id
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    workers: Vec<Arc<dyn AnalysisWorker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a worker; ids must be unique
    pub fn register(&mut self, worker: Arc<dyn AnalysisWorker>) -> Result<(), EngineError> {
        if self.get(worker.id()).is_some() {
            return Err(EngineError::DuplicateWorker(worker.id().to_string()));
        }
        self.workers.push(worker);
        Ok(())
    }

    /// Build a registry from a list, rejecting duplicate ids
    pub fn from_workers(
        workers: impl IntoIterator<Item = Arc<dyn AnalysisWorker>>,
    ) -> Result<Self, EngineError> {
        let mut registry = Self::new();
        let mut seen = HashSet::new();
        for worker in workers {
            if !seen.insert(worker.id().to_string()) {
                return Err(EngineError::DuplicateWorker(worker.id().to_string()));
            }
            registry.workers.push(worker);
        }
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn AnalysisWorker>> {
        self.workers.iter().find(|w| w.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn AnalysisWorker>> {
        self.workers.iter()
    }

    /// Worker ids in registration order
    pub fn ids(&self) -> Vec<String> {
        self.workers.iter().map(|w| w.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRegistry")
            .field("workers", &self.ids())
            .finish()
    }
}
