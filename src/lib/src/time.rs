//! Device clock abstraction
//!
//! Factory stations provision devices that often have no battery-backed
//! RTC, so the clock can legitimately be "unset". Every source reports an
//! unset clock as `0`, and the verifier downgrades its time-based checks
//! to warnings in that case.
//!
//! # Usage
//!
//! ```rust
//! use fcc::time::{FixedTimeSource, RtcTimeSource, TimeSource};
//!
//! // An RTC that has never been set
//! let rtc = RtcTimeSource::new();
//! assert_eq!(rtc.now(), 0);
//!
//! // Bundles can carry `mbed.CurrentTime` to set it
//! rtc.set_time(1_704_067_200).unwrap();
//! assert!(rtc.now() >= 1_704_067_200);
//!
//! // Fixed time for tests
//! let fixed = FixedTimeSource::from_unix_secs(1_704_067_200);
//! assert_eq!(fixed.now(), 1_704_067_200);
//! ```

use crate::error::FccError;
use std::sync::Mutex;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Pluggable device clock.
///
/// Implement this for the platform's RTC. `now` must return `0` while the
/// clock has not been set.
pub trait TimeSource: Send + Sync {
    /// Current time as Unix seconds, or `0` if the clock is unset.
    fn now(&self) -> u64;

    /// Set the clock to `unix_secs`.
    ///
    /// Sources that cannot be set return `InvalidParameter`.
    fn set_time(&self, unix_secs: u64) -> Result<(), FccError> {
        let _ = unix_secs;
        Err(FccError::InvalidParameter)
    }
}

/// Host system clock. Read-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Settable clock that keeps running from the last `set_time`.
///
/// Behaves like a device RTC: it reads `0` until set, and afterwards
/// advances with the monotonic clock.
#[derive(Debug, Default)]
pub struct RtcTimeSource {
    base: Mutex<Option<(u64, Instant)>>,
}

impl RtcTimeSource {
    /// An unset clock
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock seeded from the host system time (used by the CLI)
    pub fn from_system() -> Self {
        let rtc = Self::new();
        let now = SystemTimeSource.now();
        if now != 0 {
            if let Ok(mut base) = rtc.base.lock() {
                *base = Some((now, Instant::now()));
            }
        }
        rtc
    }
}

impl TimeSource for RtcTimeSource {
    fn now(&self) -> u64 {
        match self.base.lock() {
            Ok(base) => base
                .map(|(secs, at)| secs.saturating_add(at.elapsed().as_secs()))
                .unwrap_or(0),
            Err(_) => 0,
        }
    }

    fn set_time(&self, unix_secs: u64) -> Result<(), FccError> {
        let mut base = self
            .base
            .lock()
            .map_err(|e| FccError::StorageError(format!("Clock lock poisoned: {}", e)))?;
        *base = if unix_secs == 0 {
            None
        } else {
            Some((unix_secs, Instant::now()))
        };
        log::info!("Device time set to {}", unix_secs);
        Ok(())
    }
}

/// Fixed clock for tests and replay. `set_time` replaces the value.
#[derive(Debug, Default)]
pub struct FixedTimeSource {
    secs: Mutex<u64>,
}

impl FixedTimeSource {
    /// Clock frozen at `secs` (`0` means unset)
    pub fn from_unix_secs(secs: u64) -> Self {
        Self {
            secs: Mutex::new(secs),
        }
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> u64 {
        self.secs.lock().map(|s| *s).unwrap_or(0)
    }

    fn set_time(&self, unix_secs: u64) -> Result<(), FccError> {
        let mut secs = self
            .secs
            .lock()
            .map_err(|e| FccError::StorageError(format!("Clock lock poisoned: {}", e)))?;
        *secs = unix_secs;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_source() {
        // 2024-01-01
        assert!(SystemTimeSource.now() > 1_704_067_200);
        assert!(SystemTimeSource.set_time(5).is_err());
    }

    #[test]
    fn test_rtc_unset_reads_zero() {
        let rtc = RtcTimeSource::new();
        assert_eq!(rtc.now(), 0);
    }

    #[test]
    fn test_rtc_set_and_clear() {
        let rtc = RtcTimeSource::new();
        rtc.set_time(1_800_000_000).unwrap();
        let now = rtc.now();
        assert!((1_800_000_000..1_800_000_010).contains(&now));

        rtc.set_time(0).unwrap();
        assert_eq!(rtc.now(), 0);
    }

    #[test]
    fn test_rtc_from_system() {
        let rtc = RtcTimeSource::from_system();
        assert!(rtc.now() > 1_704_067_200);
    }

    #[test]
    fn test_fixed_time_source() {
        let fixed = FixedTimeSource::from_unix_secs(42);
        assert_eq!(fixed.now(), 42);
        fixed.set_time(7).unwrap();
        assert_eq!(fixed.now(), 7);
    }
}
