//! Factory configurator context
//!
//! [`FactoryConfigurator`] owns every store the provisioning flow touches:
//! the secure item store, the SOTP slots, the device clock and the
//! diagnostics record. One instance stands for one device; calls on it are
//! not meant to run concurrently.
//!
//! # Example
//!
//! ```rust
//! use fcc::{FactoryConfigurator, FccConfig};
//! use fcc::sotp::MemorySotp;
//! use fcc::storage::MemoryStorage;
//! use fcc::time::RtcTimeSource;
//!
//! let mut fcc = FactoryConfigurator::new(
//!     Box::new(MemoryStorage::new()),
//!     Box::new(MemorySotp::new()),
//!     Box::new(RtcTimeSource::new()),
//!     FccConfig::default(),
//! );
//! fcc.init()?;
//!
//! // Not a valid bundle, but a response is still produced
//! let (result, response) = fcc.handle_bundle(&[0xff]);
//! assert!(result.is_err());
//! assert!(response.is_some());
//!
//! fcc.finalize()?;
//! # Ok::<(), fcc::FccError>(())
//! ```

use crate::bundle::{self, BundleResponse};
use crate::config::FccConfig;
use crate::error::FccError;
use crate::kcm::SecureItemStore;
use crate::output_info::OutputInfo;
use crate::sotp::{SotpSlot, SotpStore};
use crate::storage::ItemStorage;
use crate::time::TimeSource;
use crate::verify::DeviceVerifier;

/// Value of the factory-disable slot once the device is locked
const FACTORY_DISABLED: u64 = 1;

/// Provisioning context for one device
pub struct FactoryConfigurator {
    pub(crate) items: SecureItemStore,
    pub(crate) sotp: Box<dyn SotpStore>,
    pub(crate) clock: Box<dyn TimeSource>,
    pub(crate) output: OutputInfo,
    pub(crate) config: FccConfig,
    initialized: bool,
}

impl FactoryConfigurator {
    pub fn new(
        storage: Box<dyn ItemStorage>,
        sotp: Box<dyn SotpStore>,
        clock: Box<dyn TimeSource>,
        config: FccConfig,
    ) -> Self {
        Self {
            items: SecureItemStore::new(storage),
            sotp,
            clock,
            output: OutputInfo::new(),
            config,
            initialized: false,
        }
    }

    pub fn init(&mut self) -> Result<(), FccError> {
        if self.initialized {
            return Ok(());
        }
        self.items.init()?;
        self.initialized = true;
        log::info!("Factory configurator initialized");
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<(), FccError> {
        if !self.initialized {
            return Ok(());
        }
        self.items.finalize()?;
        self.output.clear();
        self.initialized = false;
        log::info!("Factory configurator finalized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn ensure_initialized(&self) -> Result<(), FccError> {
        if !self.initialized {
            return Err(FccError::NotInitialized);
        }
        Ok(())
    }

    fn ensure_not_disabled(&self) -> Result<(), FccError> {
        if self.is_factory_disabled()? {
            log::error!("Factory flow is disabled on this device");
            return Err(FccError::FactoryDisabled);
        }
        Ok(())
    }

    /// Process one provisioning bundle.
    ///
    /// Returns the status together with the encoded response. The response
    /// is `None` only when the response itself cannot be encoded.
    pub fn handle_bundle(&mut self, blob: &[u8]) -> (Result<(), FccError>, Option<Vec<u8>>) {
        self.output.clear();

        let result = self.process_bundle(blob);
        match &result {
            Ok(()) => log::info!("Bundle processed"),
            Err(err) => log::error!("Bundle failed: {}", err),
        }

        let response = BundleResponse::new(&result, &self.output).to_cbor();
        self.output.clear();
        match response {
            Ok(response) => (result, Some(response)),
            Err(err) => (result.and(Err(err)), None),
        }
    }

    fn process_bundle(&mut self, blob: &[u8]) -> Result<(), FccError> {
        self.ensure_initialized()?;
        self.ensure_not_disabled()?;
        bundle::process(self, blob)
    }

    /// Check that the device is ready to connect. Diagnostics are left in
    /// [`output_info`](Self::output_info).
    pub fn verify_device_configured(&mut self) -> Result<(), FccError> {
        self.ensure_initialized()?;
        self.output.clear();
        self.run_verifier()
    }

    pub(crate) fn run_verifier(&mut self) -> Result<(), FccError> {
        DeviceVerifier::new(
            &mut self.items,
            self.clock.as_ref(),
            &self.config,
            &mut self.output,
        )
        .run()
    }

    /// Program the entropy slot.
    pub fn entropy_set(&mut self, entropy: &[u8]) -> Result<(), FccError> {
        self.ensure_initialized()?;
        self.ensure_not_disabled()?;
        self.sotp.write(SotpSlot::Entropy, entropy)
    }

    /// Program the root-of-trust slot.
    pub fn rot_set(&mut self, rot: &[u8]) -> Result<(), FccError> {
        self.ensure_initialized()?;
        self.ensure_not_disabled()?;
        self.sotp.write(SotpSlot::RootOfTrust, rot)
    }

    /// Set the device clock.
    pub fn time_set(&mut self, unix_secs: u64) -> Result<(), FccError> {
        self.clock.set_time(unix_secs)
    }

    /// Current device time, `0` if unset
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Permanently close the factory flow on this device.
    pub fn factory_disable(&mut self) -> Result<(), FccError> {
        if self.is_factory_disabled()? {
            return Ok(());
        }
        self.sotp
            .write(SotpSlot::FactoryDisableFlag, &FACTORY_DISABLED.to_le_bytes())?;
        log::info!("Factory flow disabled");
        Ok(())
    }

    pub fn is_factory_disabled(&self) -> Result<bool, FccError> {
        let slot = SotpSlot::FactoryDisableFlag;
        match self.sotp.read(slot, slot.size()) {
            Ok(data) => Ok(data.as_slice() == FACTORY_DISABLED.to_le_bytes()),
            Err(FccError::ItemNotExist) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Erase every item that was not factory-provisioned.
    pub fn storage_delete(&mut self) -> Result<(), FccError> {
        self.ensure_initialized()?;
        self.items.factory_reset()
    }

    /// Diagnostics of the last standalone verification
    pub fn output_info(&self) -> &OutputInfo {
        &self.output
    }

    pub fn item_store(&mut self) -> &mut SecureItemStore {
        &mut self.items
    }

    pub fn config(&self) -> &FccConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sotp::MemorySotp;
    use crate::storage::MemoryStorage;
    use crate::time::FixedTimeSource;

    fn configurator() -> FactoryConfigurator {
        let mut fcc = FactoryConfigurator::new(
            Box::new(MemoryStorage::new()),
            Box::new(MemorySotp::new()),
            Box::new(FixedTimeSource::from_unix_secs(0)),
            FccConfig::default(),
        );
        fcc.init().unwrap();
        fcc
    }

    #[test]
    fn test_requires_init() {
        let mut fcc = FactoryConfigurator::new(
            Box::new(MemoryStorage::new()),
            Box::new(MemorySotp::new()),
            Box::new(FixedTimeSource::from_unix_secs(0)),
            FccConfig::default(),
        );
        assert_eq!(fcc.entropy_set(&[0; 56]), Err(FccError::NotInitialized));

        let (result, response) = fcc.handle_bundle(b"\xa0");
        assert_eq!(result, Err(FccError::NotInitialized));
        let response = BundleResponse::from_cbor(&response.unwrap()).unwrap();
        assert_eq!(response.return_status, FccError::NotInitialized.status_code());
    }

    #[test]
    fn test_factory_disable_is_sticky() {
        let mut fcc = configurator();
        assert!(!fcc.is_factory_disabled().unwrap());
        fcc.factory_disable().unwrap();
        assert!(fcc.is_factory_disabled().unwrap());

        // Idempotent
        fcc.factory_disable().unwrap();

        assert_eq!(fcc.entropy_set(&[0; 56]), Err(FccError::FactoryDisabled));
        assert_eq!(fcc.rot_set(&[0; 24]), Err(FccError::FactoryDisabled));

        let (result, response) = fcc.handle_bundle(b"\xa0");
        assert_eq!(result, Err(FccError::FactoryDisabled));
        let response = BundleResponse::from_cbor(&response.unwrap()).unwrap();
        assert_eq!(response.error_info, "Factory disabled");
    }

    #[test]
    fn test_direct_sotp_writes() {
        let mut fcc = configurator();
        fcc.entropy_set(&[1; 56]).unwrap();
        fcc.rot_set(&[2; 24]).unwrap();
        assert!(matches!(
            fcc.rot_set(&[3; 24]),
            Err(FccError::SotpSlotLocked(SotpSlot::RootOfTrust))
        ));
        assert_eq!(fcc.entropy_set(&[1; 55]), Err(FccError::WrongItemDataSize));
    }

    #[test]
    fn test_time_set() {
        let mut fcc = configurator();
        assert_eq!(fcc.now(), 0);
        fcc.time_set(1_800_000_000).unwrap();
        assert_eq!(fcc.now(), 1_800_000_000);
    }

    #[test]
    fn test_standalone_verify_keeps_diagnostics() {
        let mut fcc = configurator();
        assert_eq!(fcc.verify_device_configured(), Err(FccError::ItemNotExist));
        assert_eq!(
            fcc.output_info().first_error_text().unwrap(),
            "Item does not exist: mbed.EndpointName"
        );
    }

    #[test]
    fn test_finalize_without_init() {
        let mut fcc = FactoryConfigurator::new(
            Box::new(MemoryStorage::new()),
            Box::new(MemorySotp::new()),
            Box::new(FixedTimeSource::from_unix_secs(0)),
            FccConfig::default(),
        );
        fcc.finalize().unwrap();
        fcc.init().unwrap();
        fcc.init().unwrap();
        fcc.finalize().unwrap();
        assert!(!fcc.is_initialized());
    }
}
