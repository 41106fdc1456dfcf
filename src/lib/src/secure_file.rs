//! Owner-only record files for the file-backed stores
//!
//! Provisioned keys, the root of trust and entropy all end up on disk when
//! the file backends are used. Records are created exclusively (never
//! truncated in place) with mode 0600, and SOTP records are sealed to 0400
//! once written.
//!
//! # Example
//!
//! ```no_run
//! use fcc::secure_file;
//! use std::path::Path;
//!
//! let path = Path::new("/var/lib/fcc/items/4366675f6e616d65");
//! secure_file::write_new_secure(path, b"record")?;
//! let data = secure_file::read_secure(path)?;
//! # Ok::<(), fcc::FccError>(())
//! ```

use crate::error::FccError;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

/// Owner read/write
#[cfg(unix)]
pub const SECURE_FILE_MODE: u32 = 0o600;

/// Owner read only, used for sealed write-once records
#[cfg(unix)]
pub const SEALED_FILE_MODE: u32 = 0o400;

/// Log a warning if group or others can access `path`.
#[cfg(unix)]
pub fn check_permissions(path: &Path) -> Result<(), FccError> {
    use std::os::unix::fs::PermissionsExt;

    let perm_bits = fs::metadata(path)?.permissions().mode() & 0o777;
    if perm_bits & 0o077 != 0 {
        log::warn!(
            "Record '{}' has permissive mode {:o}; expected 0600 or stricter",
            path.display(),
            perm_bits
        );
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn check_permissions(path: &Path) -> Result<(), FccError> {
    log::debug!("Permission check skipped for '{}'", path.display());
    Ok(())
}

/// Create `path` exclusively with owner-only permissions.
///
/// Fails with `FileExistsError` if the file is already present.
#[cfg(unix)]
pub fn create_new_secure(path: &Path) -> Result<File, FccError> {
    use std::os::unix::fs::OpenOptionsExt;

    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(SECURE_FILE_MODE)
        .open(path)?;
    Ok(file)
}

#[cfg(not(unix))]
pub fn create_new_secure(path: &Path) -> Result<File, FccError> {
    let file = OpenOptions::new().write(true).create_new(true).open(path)?;
    Ok(file)
}

/// Write a new record; an existing record is never replaced.
pub fn write_new_secure(path: &Path, data: &[u8]) -> Result<(), FccError> {
    let mut file = create_new_secure(path)?;
    if let Err(err) = file.write_all(data).and_then(|_| file.sync_all()) {
        drop(file);
        // Do not leave a truncated record behind
        fs::remove_file(path).ok();
        return Err(err.into());
    }
    Ok(())
}

/// Drop write permission on a record.
#[cfg(unix)]
pub fn seal_read_only(path: &Path) -> Result<(), FccError> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(SEALED_FILE_MODE);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
pub fn seal_read_only(path: &Path) -> Result<(), FccError> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms)?;
    Ok(())
}

/// Read a record, warning about permissive modes.
pub fn read_secure(path: &Path) -> Result<Vec<u8>, FccError> {
    check_permissions(path)?;
    let mut file = File::open(path)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    Ok(contents)
}
