//! Factory configurator client.
//!
//! Provisions a device with its identity (keys, certificates, configuration)
//! from a CBOR bundle sent by a factory tool, and verifies that the device is
//! fully configured before it may connect to its service.

#![forbid(unsafe_code)]

mod error;

/// Provisioning bundle decoding, group dispatch and response encoding
pub mod bundle;

/// Tunable thresholds
pub mod config;

/// Per-device provisioning context
pub mod configurator;

/// Secure Item Store (keys, certificates, config parameters)
pub mod kcm;

/// Diagnostics recorded while processing a bundle
pub mod output_info;

/// Well-known parameter names
pub mod params;

/// Secure file operations with restrictive permissions
///
/// Used by the file-backed item storage and SOTP store. On Unix systems,
/// records are created with 0600 and write-once records sealed to 0400.
pub mod secure_file;

/// Write-once SOTP slots
pub mod sotp;

/// Persistent storage backends
pub mod storage;

/// Device clock abstraction
///
/// Factory devices often have no battery-backed RTC; every source reports
/// an unset clock as `0`.
pub mod time;

/// Device configuration verifier
pub mod verify;

pub use bundle::{BundleResponse, SCHEME_VERSION};
pub use config::FccConfig;
pub use configurator::FactoryConfigurator;
pub use error::FccError;

pub mod reexports {
    pub use {log, serde_cbor, thiserror};
}
