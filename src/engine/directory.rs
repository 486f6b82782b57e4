use std::collections::HashMap;

use crate::engine::errors::EngineError;

/// Resolves a worker name to a transport endpoint. Pure lookup; unknown
/// names raise `UnknownWorker`, which is non-retryable and surfaces to the
/// step's error mode.
pub trait WorkerDirectory: Send + Sync {
    fn resolve(&self, worker_name: &str) -> Result<String, EngineError>;
}

/// Default directory: an in-memory table loaded at startup from
/// configuration (`worker_endpoints`).
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkerDirectory {
    endpoints: HashMap<String, String>,
}

impl InMemoryWorkerDirectory {
    pub fn new(endpoints: HashMap<String, String>) -> Self {
        InMemoryWorkerDirectory { endpoints }
    }

    pub fn insert(&mut self, worker_name: impl Into<String>, endpoint: impl Into<String>) {
        self.endpoints.insert(worker_name.into(), endpoint.into());
    }
}

impl WorkerDirectory for InMemoryWorkerDirectory {
    fn resolve(&self, worker_name: &str) -> Result<String, EngineError> {
        self.endpoints
            .get(worker_name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownWorker(worker_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_worker() {
        let mut dir = InMemoryWorkerDirectory::default();
        dir.insert("architect", "http://localhost:9001/mcp");
        assert_eq!(dir.resolve("architect").unwrap(), "http://localhost:9001/mcp");
    }

    #[test]
    fn unknown_worker_is_non_retryable() {
        let dir = InMemoryWorkerDirectory::default();
        let err = dir.resolve("ghost").unwrap_err();
        assert!(matches!(err, EngineError::UnknownWorker(ref w) if w == "ghost"));
        assert!(!err.is_retryable(&Default::default()));
    }
}
