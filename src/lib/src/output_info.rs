//! Diagnostics collected while a bundle is processed
//!
//! Processors and verifier checks record `(parameter, error)` and
//! `(parameter, warning)` entries here; the response builder turns them into
//! the `ErrorInfo` and `WarningInfo` fields. Recording is fallible: if the
//! record cannot grow, the caller gets `DiagnosticRecordingError`, because
//! the diagnostics are part of the response contract.

use crate::error::FccError;

/// Warning texts the verifier emits
pub mod warnings {
    pub const BOOTSTRAP_DISABLED: &str = "Bootstrap mode is disabled";
    pub const ITEM_NOT_SET: &str = "Item is not set";
    pub const ITEM_IS_EMPTY: &str = "Item is empty";
    pub const UNUSED_ITEM: &str = "Item is not used in the current mode";
    pub const SELF_SIGNED_CERT: &str = "Certificate is self-signed";
    pub const CERT_NOT_YET_VALID: &str = "Certificate validity starts in the future";
    pub const CERT_SHORT_VALIDITY: &str = "Certificate validity is less than 10 years";
    pub const CERT_TIME_UNCHECKED: &str = "Certificate validity not checked, device time is not set";
    pub const TIME_NOT_SET: &str = "Device time is not set";
}

/// Ordered error and warning records
#[derive(Debug, Default)]
pub struct OutputInfo {
    errors: Vec<(String, FccError)>,
    warnings: Vec<(String, String)>,
}

fn lossy(parameter: &[u8]) -> String {
    String::from_utf8_lossy(parameter).into_owned()
}

impl OutputInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.errors.clear();
        self.warnings.clear();
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[(String, FccError)] {
        &self.errors
    }

    pub fn warnings(&self) -> &[(String, String)] {
        &self.warnings
    }

    /// Attribute `error` to `parameter`.
    pub fn record_error(&mut self, parameter: &[u8], error: FccError) -> Result<(), FccError> {
        self.errors.try_reserve(1)?;
        log::error!("{}: {}", lossy(parameter), error);
        self.errors.push((lossy(parameter), error));
        Ok(())
    }

    /// Attach a warning to `parameter`.
    pub fn record_warning(&mut self, parameter: &[u8], warning: &str) -> Result<(), FccError> {
        self.warnings.try_reserve(1)?;
        log::warn!("{}: {}", lossy(parameter), warning);
        self.warnings.push((lossy(parameter), warning.to_string()));
        Ok(())
    }

    /// `"<error>: <parameter>"` for the first recorded error
    pub fn first_error_text(&self) -> Option<String> {
        self.errors
            .first()
            .map(|(parameter, error)| format!("{}: {}", error, parameter))
    }

    /// All warnings as `"<warning>: <parameter>"`, joined with `"; "`
    pub fn warning_text(&self) -> Option<String> {
        if self.warnings.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .warnings
            .iter()
            .map(|(parameter, warning)| format!("{}: {}", warning, parameter))
            .collect();
        Some(parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record() {
        let info = OutputInfo::new();
        assert!(!info.has_warnings());
        assert!(!info.has_errors());
        assert_eq!(info.first_error_text(), None);
        assert_eq!(info.warning_text(), None);
    }

    #[test]
    fn test_first_error_wins() {
        let mut info = OutputInfo::new();
        info.record_error(b"mbed.EndpointName", FccError::ItemNotExist).unwrap();
        info.record_error(b"mbed.Other", FccError::EmptyItem).unwrap();
        assert_eq!(
            info.first_error_text().unwrap(),
            "Item does not exist: mbed.EndpointName"
        );
        assert_eq!(info.errors().len(), 2);
    }

    #[test]
    fn test_warnings_joined_in_order() {
        let mut info = OutputInfo::new();
        info.record_warning(b"mbed.UseBootstrap", warnings::BOOTSTRAP_DISABLED).unwrap();
        info.record_warning(b"mbed.Timezone", warnings::ITEM_NOT_SET).unwrap();
        assert!(info.has_warnings());
        assert_eq!(
            info.warning_text().unwrap(),
            "Bootstrap mode is disabled: mbed.UseBootstrap; Item is not set: mbed.Timezone"
        );

        info.clear();
        assert!(!info.has_warnings());
    }
}
