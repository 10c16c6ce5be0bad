//! JSON file store.
//!
//! File layout:
//!
//! ```text
//! {"format":"labtrack-store","schema_version":1,"checksum":"<sha256 hex>"}\n
//! <records payload JSON>
//! ```
//!
//! The checksum covers the payload bytes exactly as written. Every committed
//! transaction rewrites the file through a temp file + fsync + rename, so a
//! crash leaves either the old or the new state on disk.
//!
//! Other processes may share the file. Access goes through an advisory lock
//! on a sidecar `<file>.lock`: reads take it shared, transactions take it
//! exclusive and reload the file before running, so every transaction sees
//! the latest committed state no matter which process wrote it.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, StoreError};
use crate::records::{RecordSnapshot, Records};
use crate::Store;

/// Format tag of the header line.
pub const FORMAT_TAG: &str = "labtrack-store";

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct FileHeader {
    format: String,
    schema_version: u32,
    checksum: String,
}

/// Store persisted to a single JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    /// Serializes writers within this process before they queue on the file
    /// lock.
    writer: Mutex<()>,
}

impl FileStore {
    /// Opens the store at `path`, starting empty when the file does not exist.
    /// An existing file is verified immediately.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io("create directory", parent, e))?;
        }
        let store = Self {
            lock_path: lock_path(&path),
            path,
            writer: Mutex::new(()),
        };
        {
            let _lock = store.lock_file(false)?;
            if store.path.exists() {
                load_records(&store.path)?;
            } else {
                tracing::debug!(path = %store.path.display(), "store file missing, starting empty");
            }
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the sidecar lock file and blocks until the lock is held. The
    /// lock is released when the returned handle is dropped.
    fn lock_file(&self, exclusive: bool) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| StoreError::io("open", &self.lock_path, e))?;
        let locked = if exclusive {
            FileExt::lock_exclusive(&file)
        } else {
            FileExt::lock_shared(&file)
        };
        locked.map_err(|e| StoreError::io("lock", &self.lock_path, e))?;
        Ok(file)
    }

    /// Committed records as currently on disk. Callers hold the file lock.
    fn load_committed(&self) -> Result<Records> {
        if self.path.exists() {
            load_records(&self.path)
        } else {
            Ok(Records::new())
        }
    }
}

impl Store for FileStore {
    fn read<T>(&self, f: impl FnOnce(&Records) -> T) -> Result<T> {
        let _lock = self.lock_file(false)?;
        let records = self.load_committed()?;
        Ok(f(&records))
    }

    fn transaction<T, E>(&self, f: impl FnOnce(&mut Records) -> std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: From<StoreError>,
    {
        let _writer = self.writer.lock().map_err(|_| StoreError::Poisoned)?;
        let _lock = self.lock_file(true)?;
        let mut working = self.load_committed()?;
        let value = f(&mut working)?;
        save_records(&working, &self.path)?;
        Ok(value)
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Loads and verifies a store file.
pub fn load_records(path: &Path) -> Result<Records> {
    let bytes = fs::read(path).map_err(|e| StoreError::io("read", path, e))?;
    let split = bytes
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| StoreError::InvalidFormat {
            path: path.to_path_buf(),
            reason: "missing header line".to_string(),
        })?;
    let (header, payload) = (&bytes[..split], &bytes[split + 1..]);
    let header: FileHeader =
        serde_json::from_slice(header).map_err(|_| StoreError::InvalidFormat {
            path: path.to_path_buf(),
            reason: "unreadable header".to_string(),
        })?;
    if header.format != FORMAT_TAG {
        return Err(StoreError::InvalidFormat {
            path: path.to_path_buf(),
            reason: format!("unexpected format tag '{}'", header.format),
        });
    }
    if header.schema_version > CURRENT_SCHEMA_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found: header.schema_version,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }
    let actual = sha256_hex(payload);
    if !actual.eq_ignore_ascii_case(&header.checksum) {
        return Err(StoreError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: header.checksum,
            actual,
        });
    }
    let snapshot: RecordSnapshot = serde_json::from_slice(payload)
        .map_err(|source| StoreError::Deserialization { source })?;
    let records = Records::from_snapshot(snapshot)?;
    tracing::debug!(path = %path.display(), "loaded store file");
    Ok(records)
}

/// Writes a store file atomically.
pub fn save_records(records: &Records, path: &Path) -> Result<()> {
    let payload = serde_json::to_vec_pretty(&records.to_snapshot())
        .map_err(|source| StoreError::Serialization { source })?;
    let header = FileHeader {
        format: FORMAT_TAG.to_string(),
        schema_version: CURRENT_SCHEMA_VERSION,
        checksum: sha256_hex(&payload),
    };
    let mut bytes =
        serde_json::to_vec(&header).map_err(|source| StoreError::Serialization { source })?;
    bytes.push(b'\n');
    bytes.extend_from_slice(&payload);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::io("create directory", parent, e))?;
    }

    let temp_path = path.with_extension("json.tmp");
    let mut file = File::create(&temp_path).map_err(|e| StoreError::io("create", &temp_path, e))?;
    file.write_all(&bytes)
        .map_err(|e| StoreError::io("write", &temp_path, e))?;
    file.sync_all()
        .map_err(|e| StoreError::io("sync", &temp_path, e))?;

    fs::rename(&temp_path, path).map_err(|e| StoreError::AtomicWriteFailed {
        temp_path: temp_path.clone(),
        target_path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved store file");
    Ok(())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
