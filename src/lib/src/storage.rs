//! Persistent storage backends for the secure item store
//!
//! The item store addresses everything by a fully-qualified key (type prefix
//! followed by the item name). This module abstracts where those records live:
//! - In memory (tests, host tooling)
//! - One file per record in a directory (factory stations, development)
//!
//! A flash-backed implementation for a real device implements the same
//! [`ItemStorage`] trait.

use crate::error::FccError;
use crate::secure_file;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Attributes persisted alongside each record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryAttributes {
    /// Written during factory provisioning; survives a factory reset
    pub is_factory: bool,
    /// Record must be encrypted at rest by the backing store
    pub is_encrypted: bool,
}

impl EntryAttributes {
    const FACTORY_BIT: u8 = 0x01;
    const ENCRYPTED_BIT: u8 = 0x02;

    /// Pack into the single attribute byte used by file records
    pub fn to_byte(self) -> u8 {
        let mut byte = 0;
        if self.is_factory {
            byte |= Self::FACTORY_BIT;
        }
        if self.is_encrypted {
            byte |= Self::ENCRYPTED_BIT;
        }
        byte
    }

    /// Unpack an attribute byte; unknown bits mean the record is corrupt
    pub fn from_byte(byte: u8) -> Result<Self, FccError> {
        if byte & !(Self::FACTORY_BIT | Self::ENCRYPTED_BIT) != 0 {
            return Err(FccError::StorageCryptoError);
        }
        Ok(Self {
            is_factory: byte & Self::FACTORY_BIT != 0,
            is_encrypted: byte & Self::ENCRYPTED_BIT != 0,
        })
    }
}

/// One persisted record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub data: Vec<u8>,
    pub attributes: EntryAttributes,
}

/// Backing persistence for the secure item store
///
/// Keys are opaque byte strings. Implementations never overwrite: a write to
/// an existing key fails with `FileExistsError`.
pub trait ItemStorage: Send {
    /// Prepare the backend (open partitions, create directories)
    fn init(&mut self) -> Result<(), FccError> {
        Ok(())
    }

    /// Release the backend
    fn finalize(&mut self) -> Result<(), FccError> {
        Ok(())
    }

    /// Persist a new record
    fn write(&mut self, key: &[u8], entry: &StoredEntry) -> Result<(), FccError>;

    /// Load a record, `None` if absent
    fn read(&self, key: &[u8]) -> Result<Option<StoredEntry>, FccError>;

    /// Payload size of a record, `None` if absent
    fn size(&self, key: &[u8]) -> Result<Option<usize>, FccError>;

    /// Remove a record; returns whether it existed
    fn delete(&mut self, key: &[u8]) -> Result<bool, FccError>;

    /// Every key currently stored
    fn keys(&self) -> Result<Vec<Vec<u8>>, FccError>;

    /// Human-readable backend name for diagnostics
    fn name(&self) -> &'static str;
}

/// In-memory record storage
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    records: BTreeMap<Vec<u8>, StoredEntry>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ItemStorage for MemoryStorage {
    fn write(&mut self, key: &[u8], entry: &StoredEntry) -> Result<(), FccError> {
        if self.records.contains_key(key) {
            return Err(FccError::FileExistsError);
        }
        self.records.insert(key.to_vec(), entry.clone());
        Ok(())
    }

    fn read(&self, key: &[u8]) -> Result<Option<StoredEntry>, FccError> {
        Ok(self.records.get(key).cloned())
    }

    fn size(&self, key: &[u8]) -> Result<Option<usize>, FccError> {
        Ok(self.records.get(key).map(|e| e.data.len()))
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool, FccError> {
        Ok(self.records.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>, FccError> {
        Ok(self.records.keys().cloned().collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Directory-backed record storage
///
/// Each record is a file named after the hex-encoded key, holding one
/// attribute byte followed by the payload.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Store records under `dir` (created on `init`)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &[u8]) -> PathBuf {
        self.dir.join(hex::encode(key))
    }
}

impl ItemStorage for FileStorage {
    fn init(&mut self) -> Result<(), FccError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            FccError::StorageError(format!(
                "Failed to create storage directory '{}': {}",
                self.dir.display(),
                e
            ))
        })?;
        log::debug!("File storage ready at '{}'", self.dir.display());
        Ok(())
    }

    fn write(&mut self, key: &[u8], entry: &StoredEntry) -> Result<(), FccError> {
        let mut record = Vec::with_capacity(entry.data.len() + 1);
        record.push(entry.attributes.to_byte());
        record.extend_from_slice(&entry.data);
        secure_file::write_new_secure(&self.path_for(key), &record)
    }

    fn read(&self, key: &[u8]) -> Result<Option<StoredEntry>, FccError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let record = secure_file::read_secure(&path)?;
        let (&attr, data) = record.split_first().ok_or(FccError::StorageCryptoError)?;
        Ok(Some(StoredEntry {
            data: data.to_vec(),
            attributes: EntryAttributes::from_byte(attr)?,
        }))
    }

    fn size(&self, key: &[u8]) -> Result<Option<usize>, FccError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let len = std::fs::metadata(&path)?.len() as usize;
        if len == 0 {
            return Err(FccError::StorageCryptoError);
        }
        Ok(Some(len - 1))
    }

    fn delete(&mut self, key: &[u8]) -> Result<bool, FccError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        Ok(true)
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>, FccError> {
        let mut keys = Vec::new();
        for dir_entry in std::fs::read_dir(&self.dir)? {
            let file_name = dir_entry?.file_name();
            match file_name.to_str().and_then(|name| hex::decode(name).ok()) {
                Some(key) => keys.push(key),
                None => log::warn!("Ignoring foreign file {:?} in item storage", file_name),
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
