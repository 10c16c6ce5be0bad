use std::sync::{Mutex, MutexGuard};

use crate::error::{Result, StoreError};
use crate::records::Records;
use crate::Store;

/// Store held entirely in memory. Used by tests and embedded callers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Records) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Records>> {
        self.records.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl Store for MemoryStore {
    fn read<T>(&self, f: impl FnOnce(&Records) -> T) -> Result<T> {
        let guard = self.lock()?;
        Ok(f(&guard))
    }

    fn transaction<T, E>(&self, f: impl FnOnce(&mut Records) -> std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.lock()?;
        let mut working = guard.clone();
        let value = f(&mut working)?;
        *guard = working;
        Ok(value)
    }
}
