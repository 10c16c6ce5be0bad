//! Transactional record storage for the DNA lab tracker.
//!
//! The core treats storage as a durable record store with all-or-nothing,
//! isolated multi-step writes. This crate provides that contract:
//!
//! - [`Store`] - read views and serialized transactions over [`Records`]
//! - [`MemoryStore`] - in-process storage
//! - [`FileStore`] - JSON file storage with atomic writes and a SHA-256
//!   payload checksum
//!
//! A transaction runs against a private copy of the records while holding the
//! writer lock. The copy replaces the committed state only when the closure
//! returns `Ok` (and, for the file store, once it is on disk). Concurrent
//! writers are therefore serialized and never observe each other's partial
//! work. The file store holds an OS file lock for the whole transaction and
//! reloads the file first, so this also holds across processes.
//!
//! The private copy is the whole record set, audit trail included, so the
//! cost of a transaction grows with the stored history: [`MemoryStore`]
//! clones it and [`FileStore`] reloads and rewrites the file. That is fine
//! for one lab's volume; a store backed by a database would replace it with
//! row-level writes.

mod error;
mod file;
mod memory;
mod records;

pub use error::{Result, StoreError};
pub use file::{CURRENT_SCHEMA_VERSION, FORMAT_TAG, FileStore, load_records, save_records, sha256_hex};
pub use memory::MemoryStore;
pub use records::{RecordSnapshot, Records};

/// Durable record storage with serializable transactions.
pub trait Store: Send + Sync {
    /// Runs `f` against a consistent view of the committed records.
    fn read<T>(&self, f: impl FnOnce(&Records) -> T) -> Result<T>;

    /// Runs `f` as one transaction. Changes are published only if `f`
    /// returns `Ok`; an `Err` discards every change made inside it.
    ///
    /// `f` receives a copy of all committed records, so each call costs
    /// time proportional to the total stored history.
    fn transaction<T, E>(
        &self,
        f: impl FnOnce(&mut Records) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<StoreError>;
}

impl<S: Store> Store for std::sync::Arc<S> {
    fn read<T>(&self, f: impl FnOnce(&Records) -> T) -> Result<T> {
        (**self).read(f)
    }

    fn transaction<T, E>(
        &self,
        f: impl FnOnce(&mut Records) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<StoreError>,
    {
        (**self).transaction(f)
    }
}
