use crate::frontier::FrontierStore;
use crate::storage::{StorageError, StorageResult};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Process-local Frontier Store
#[derive(Debug, Default)]
pub struct MemoryFrontier {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    to_visit: VecDeque<String>,
    download_requested: HashSet<String>,
    parse_requested: HashSet<String>,
}

impl MemoryFrontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl FrontierStore for MemoryFrontier {
    fn request_download(&self, url: &str) -> StorageResult<bool> {
        let mut inner = self.lock()?;
        if !inner.download_requested.insert(url.to_string()) {
            return Ok(false);
        }
        inner.to_visit.push_back(url.to_string());
        Ok(true)
    }

    fn request_parse(&self, url: &str) -> StorageResult<bool> {
        let mut inner = self.lock()?;
        Ok(inner.parse_requested.insert(url.to_string()))
    }

    fn next_to_visit(&self) -> StorageResult<Option<String>> {
        let mut inner = self.lock()?;
        Ok(inner.to_visit.pop_front())
    }

    fn pending(&self) -> StorageResult<usize> {
        Ok(self.lock()?.to_visit.len())
    }
}
