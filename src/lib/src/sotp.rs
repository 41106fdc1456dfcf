//! Write-once slots for the root of trust, entropy and the factory-disable flag
//!
//! # Slot Model
//!
//! Each slot has a fixed size and a lock bit, like a one-time-programmable
//! fuse bank or a locked secure-element slot:
//!
//! ```text
//! ┌────────────────────┬───────┐
//! │ RootOfTrust        │ 24 B  │
//! │ FactoryDisableFlag │  8 B  │
//! │ Entropy            │ 56 B  │
//! └────────────────────┴───────┘
//! ```
//!
//! The first successful write sets the lock; later writes fail until
//! `reset`, which exists only in test builds or with the `sotp-reset`
//! feature.
//!
//! [`MemorySotp`] is a logical stand-in. [`FileSotp`] persists slots as
//! sealed files so the lock survives restarts; a device build should back
//! the trait with real OTP or a secure element.

use crate::error::FccError;
use crate::secure_file;
use std::fmt;
use std::path::PathBuf;

/// SOTP slot identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SotpSlot {
    RootOfTrust,
    FactoryDisableFlag,
    Entropy,
}

impl SotpSlot {
    /// All slots, in storage order
    pub const ALL: [SotpSlot; 3] = [
        SotpSlot::RootOfTrust,
        SotpSlot::FactoryDisableFlag,
        SotpSlot::Entropy,
    ];

    /// Exact number of bytes a write must supply
    pub const fn size(self) -> usize {
        match self {
            SotpSlot::RootOfTrust => 24,
            SotpSlot::FactoryDisableFlag => 8,
            SotpSlot::Entropy => 56,
        }
    }

    fn index(self) -> usize {
        match self {
            SotpSlot::RootOfTrust => 0,
            SotpSlot::FactoryDisableFlag => 1,
            SotpSlot::Entropy => 2,
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            SotpSlot::RootOfTrust => "sotp_rot",
            SotpSlot::FactoryDisableFlag => "sotp_factory_disable",
            SotpSlot::Entropy => "sotp_entropy",
        }
    }
}

impl fmt::Display for SotpSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SotpSlot::RootOfTrust => write!(f, "RootOfTrust"),
            SotpSlot::FactoryDisableFlag => write!(f, "FactoryDisableFlag"),
            SotpSlot::Entropy => write!(f, "Entropy"),
        }
    }
}

/// Write-once slot store
pub trait SotpStore: Send {
    /// Program `slot`. `data` must be exactly `slot.size()` bytes and the
    /// slot must not be locked.
    fn write(&mut self, slot: SotpSlot, data: &[u8]) -> Result<(), FccError>;

    /// Read `slot` into a buffer of at most `max_size` bytes.
    fn read(&self, slot: SotpSlot, max_size: usize) -> Result<Vec<u8>, FccError>;

    /// Clear every slot and lock bit.
    #[cfg(any(test, feature = "sotp-reset"))]
    fn reset(&mut self) -> Result<(), FccError>;
}

fn check_write_size(slot: SotpSlot, data: &[u8]) -> Result<(), FccError> {
    if data.len() != slot.size() {
        log::error!(
            "SOTP {} write of {} bytes rejected (expected {})",
            slot,
            data.len(),
            slot.size()
        );
        return Err(FccError::WrongItemDataSize);
    }
    Ok(())
}

fn check_read_size(slot: SotpSlot, max_size: usize) -> Result<(), FccError> {
    if max_size < slot.size() {
        return Err(FccError::WrongItemDataSize);
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct SlotState {
    data: Option<Vec<u8>>,
    locked: bool,
}

/// In-memory SOTP test double
#[derive(Debug, Clone, Default)]
pub struct MemorySotp {
    slots: [SlotState; 3],
}

impl MemorySotp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `slot` has been programmed
    pub fn is_locked(&self, slot: SotpSlot) -> bool {
        self.slots[slot.index()].locked
    }
}

impl SotpStore for MemorySotp {
    fn write(&mut self, slot: SotpSlot, data: &[u8]) -> Result<(), FccError> {
        check_write_size(slot, data)?;
        let state = &mut self.slots[slot.index()];
        if state.locked {
            return Err(FccError::SotpSlotLocked(slot));
        }
        state.data = Some(data.to_vec());
        state.locked = true;
        log::debug!("SOTP {} programmed", slot);
        Ok(())
    }

    fn read(&self, slot: SotpSlot, max_size: usize) -> Result<Vec<u8>, FccError> {
        let data = self.slots[slot.index()]
            .data
            .as_ref()
            .ok_or(FccError::ItemNotExist)?;
        check_read_size(slot, max_size)?;
        Ok(data.clone())
    }

    #[cfg(any(test, feature = "sotp-reset"))]
    fn reset(&mut self) -> Result<(), FccError> {
        log::warn!("Resetting in-memory SOTP slots");
        self.slots = Default::default();
        Ok(())
    }
}

/// File-backed SOTP store
///
/// A slot file is created exclusively and sealed read-only; its presence is
/// the lock bit.
#[derive(Debug, Clone)]
pub struct FileSotp {
    dir: PathBuf,
}

impl FileSotp {
    /// Keep slot files under `dir`, creating it if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, FccError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            FccError::StorageError(format!(
                "Failed to create SOTP directory '{}': {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir })
    }

    fn path_for(&self, slot: SotpSlot) -> PathBuf {
        self.dir.join(slot.file_name())
    }
}

impl SotpStore for FileSotp {
    fn write(&mut self, slot: SotpSlot, data: &[u8]) -> Result<(), FccError> {
        check_write_size(slot, data)?;
        let path = self.path_for(slot);
        match secure_file::write_new_secure(&path, data) {
            Ok(()) => {}
            Err(FccError::FileExistsError) => return Err(FccError::SotpSlotLocked(slot)),
            Err(err) => return Err(err),
        }
        secure_file::seal_read_only(&path)?;
        log::debug!("SOTP {} programmed at '{}'", slot, path.display());
        Ok(())
    }

    fn read(&self, slot: SotpSlot, max_size: usize) -> Result<Vec<u8>, FccError> {
        let path = self.path_for(slot);
        if !path.exists() {
            return Err(FccError::ItemNotExist);
        }
        check_read_size(slot, max_size)?;
        let data = secure_file::read_secure(&path)?;
        if data.len() != slot.size() {
            return Err(FccError::StorageCryptoError);
        }
        Ok(data)
    }

    #[cfg(any(test, feature = "sotp-reset"))]
    fn reset(&mut self) -> Result<(), FccError> {
        log::warn!("Resetting SOTP slots in '{}'", self.dir.display());
        for slot in SotpSlot::ALL {
            let path = self.path_for(slot);
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}
