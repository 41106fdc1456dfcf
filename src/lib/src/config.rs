//! Configuration for the factory configurator

use std::time::Duration;

/// Default largest accepted bundle (64 KiB)
pub const DEFAULT_MAX_BUNDLE_SIZE: usize = 64 * 1024;

/// Tunable behaviour of [`FactoryConfigurator`](crate::FactoryConfigurator)
#[derive(Debug, Clone)]
pub struct FccConfig {
    /// Run the device verifier after a bundle that carries neither a
    /// verify nor a factory-disable group
    ///
    /// Older provisioning tools rely on this.
    pub legacy_auto_verify: bool,

    /// Slack before a certificate whose validity starts in the future is
    /// reported
    pub clock_skew_tolerance: Duration,

    /// Remaining validity below which a certificate is reported as short-lived
    pub min_certificate_validity: Duration,

    /// Bundles larger than this are rejected before decoding
    pub max_bundle_size: usize,
}

impl Default for FccConfig {
    fn default() -> Self {
        Self {
            legacy_auto_verify: true,
            clock_skew_tolerance: Duration::from_secs(60),
            min_certificate_validity: Duration::from_secs(315_360_000), // 10 years
            max_bundle_size: DEFAULT_MAX_BUNDLE_SIZE,
        }
    }
}

impl FccConfig {
    /// Disable the legacy auto-verify step
    pub fn without_auto_verify(mut self) -> Self {
        self.legacy_auto_verify = false;
        self
    }

    pub fn with_clock_skew_tolerance(mut self, tolerance: Duration) -> Self {
        self.clock_skew_tolerance = tolerance;
        self
    }

    pub fn with_min_certificate_validity(mut self, validity: Duration) -> Self {
        self.min_certificate_validity = validity;
        self
    }

    pub fn with_max_bundle_size(mut self, size: usize) -> Self {
        self.max_bundle_size = size;
        self
    }
}
