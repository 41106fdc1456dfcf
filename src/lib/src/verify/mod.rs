//! Device configuration verifier
//!
//! Checks that a provisioned device holds everything it needs to connect to
//! its service, in a fixed order:
//!
//! ```text
//! general info → metadata → bootstrap mode → security objects
//!              → firmware update certificate → time synchronization
//! ```
//!
//! Each check either passes, records a warning and continues, or records an
//! error and stops the whole pass. Warnings and errors land in the
//! [`OutputInfo`] passed in by the caller.

mod security;
mod timing;

pub use timing::is_valid_utc_offset;

use crate::config::FccConfig;
use crate::error::FccError;
use crate::kcm::{ItemType, SecureItemStore};
use crate::output_info::{warnings, OutputInfo};
use crate::params;
use crate::time::TimeSource;

/// One verification pass over the secure item store
pub struct DeviceVerifier<'a> {
    store: &'a mut SecureItemStore,
    clock: &'a dyn TimeSource,
    config: &'a FccConfig,
    output: &'a mut OutputInfo,
    use_bootstrap: bool,
}

impl<'a> DeviceVerifier<'a> {
    pub fn new(
        store: &'a mut SecureItemStore,
        clock: &'a dyn TimeSource,
        config: &'a FccConfig,
        output: &'a mut OutputInfo,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            output,
            use_bootstrap: false,
        }
    }

    /// Run every check, stopping at the first error.
    pub fn run(mut self) -> Result<(), FccError> {
        log::info!("Verifying device configuration");
        let endpoint_name = self.check_general_info()?;
        self.check_metadata()?;
        self.resolve_bootstrap_mode()?;
        self.check_security_objects(&endpoint_name)?;
        self.check_firmware_update_certificate()?;
        self.check_time_synchronization()?;
        log::info!("Device configuration verified");
        Ok(())
    }

    /// Record `error` against `parameter` and hand it back for propagation.
    fn fail(&mut self, parameter: &[u8], error: FccError) -> FccError {
        match self.output.record_error(parameter, error.clone()) {
            Ok(()) => error,
            Err(record_err) => record_err,
        }
    }

    fn warn(&mut self, parameter: &[u8], warning: &str) -> Result<(), FccError> {
        self.output.record_warning(parameter, warning)
    }

    /// Read an item that must exist and be non-empty.
    fn read_required(&mut self, name: &[u8], item_type: ItemType) -> Result<Vec<u8>, FccError> {
        match self.store.get_item(name, item_type) {
            Ok(data) if data.is_empty() => Err(self.fail(name, FccError::EmptyItem)),
            Ok(data) => Ok(data),
            Err(err) => Err(self.fail(name, err)),
        }
    }

    /// Read an item that may be absent.
    fn read_optional(
        &mut self,
        name: &[u8],
        item_type: ItemType,
    ) -> Result<Option<Vec<u8>>, FccError> {
        match self.store.get_item(name, item_type) {
            Ok(data) => Ok(Some(data)),
            Err(FccError::ItemNotExist) => Ok(None),
            Err(err) => Err(self.fail(name, err)),
        }
    }

    /// Read a 4-byte little-endian flag, `None` if absent. Any other length
    /// fails with `size_error`.
    fn read_flag(&mut self, name: &[u8], size_error: FccError) -> Result<Option<u32>, FccError> {
        let data = match self.read_optional(name, ItemType::ConfigParam)? {
            Some(data) => data,
            None => return Ok(None),
        };
        match <[u8; 4]>::try_from(data.as_slice()) {
            Ok(bytes) => Ok(Some(u32::from_le_bytes(bytes))),
            Err(_) => Err(self.fail(name, size_error)),
        }
    }

    /// Warn when an item belonging to the inactive mode is present.
    fn warn_if_present(&mut self, name: &[u8], item_type: ItemType) -> Result<(), FccError> {
        if self.store.get_size(name, item_type).is_ok() {
            self.warn(name, warnings::UNUSED_ITEM)?;
        }
        Ok(())
    }

    fn check_general_info(&mut self) -> Result<Vec<u8>, FccError> {
        self.read_required(params::ENDPOINT_NAME, ItemType::ConfigParam)
    }

    fn check_metadata(&mut self) -> Result<(), FccError> {
        for name in params::REQUIRED_METADATA {
            if let Err(err) = self.store.get_size(name, ItemType::ConfigParam) {
                return Err(self.fail(name, err));
            }
        }
        Ok(())
    }

    fn resolve_bootstrap_mode(&mut self) -> Result<(), FccError> {
        let flag = match self.read_flag(params::USE_BOOTSTRAP, FccError::BootstrapModeError)? {
            Some(flag) => flag,
            None => return Err(self.fail(params::USE_BOOTSTRAP, FccError::ItemNotExist)),
        };
        match flag {
            0 => {
                self.use_bootstrap = false;
                self.warn(params::USE_BOOTSTRAP, warnings::BOOTSTRAP_DISABLED)?;
            }
            1 => self.use_bootstrap = true,
            _ => return Err(self.fail(params::USE_BOOTSTRAP, FccError::BootstrapModeError)),
        }
        log::debug!("Bootstrap mode resolved: {}", self.use_bootstrap);
        Ok(())
    }

    fn check_firmware_update_certificate(&mut self) -> Result<(), FccError> {
        let name = params::UPDATE_AUTH_CERT;
        match self.read_optional(name, ItemType::Certificate)? {
            None => self.warn(name, warnings::ITEM_NOT_SET),
            Some(data) if data.is_empty() => self.warn(name, warnings::ITEM_IS_EMPTY),
            Some(data) => {
                let cert = match crate::kcm::der::parse_certificate(&data) {
                    Ok(cert) => cert,
                    Err(err) => return Err(self.fail(name, err)),
                };
                let validity = cert.validity();
                self.check_certificate_expiry(
                    name,
                    validity.not_before.timestamp(),
                    validity.not_after.timestamp(),
                )
            }
        }
    }
}
