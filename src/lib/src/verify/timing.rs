use super::DeviceVerifier;
use crate::error::FccError;
use crate::kcm::ItemType;
use crate::output_info::warnings;
use crate::params;

/// `[+-]DD:DD`. The hour and minute magnitudes are not range-checked.
pub fn is_valid_utc_offset(value: &[u8]) -> bool {
    matches!(
        value,
        [sign, h1, h2, b':', m1, m2]
            if matches!(*sign, b'+' | b'-')
                && [*h1, *h2, *m1, *m2].iter().all(u8::is_ascii_digit)
    )
}

impl<'a> DeviceVerifier<'a> {
    /// Shared validity-window rule for device and firmware certificates.
    pub(super) fn check_certificate_expiry(
        &mut self,
        name: &[u8],
        valid_from: i64,
        valid_until: i64,
    ) -> Result<(), FccError> {
        let now = self.clock.now();
        if now == 0 {
            return self.warn(name, warnings::CERT_TIME_UNCHECKED);
        }
        let now = i64::try_from(now).unwrap_or(i64::MAX);

        if now > valid_until {
            return Err(self.fail(name, FccError::ExpiredCertificate));
        }

        let skew = self.config.clock_skew_tolerance.as_secs() as i64;
        if now.saturating_add(skew) < valid_from {
            self.warn(name, warnings::CERT_NOT_YET_VALID)?;
        }

        let min_validity = self.config.min_certificate_validity.as_secs() as i64;
        if valid_until - now < min_validity {
            self.warn(name, warnings::CERT_SHORT_VALIDITY)?;
        }
        Ok(())
    }

    pub(super) fn check_utc_offset(&mut self) -> Result<(), FccError> {
        let name = params::UTC_OFFSET;
        match self.read_optional(name, ItemType::ConfigParam)? {
            None => self.warn(name, warnings::ITEM_NOT_SET),
            Some(value) if value.is_empty() => self.warn(name, warnings::ITEM_IS_EMPTY),
            Some(value) if is_valid_utc_offset(&value) => Ok(()),
            Some(_) => Err(self.fail(name, FccError::UtcOffsetWrongFormat)),
        }
    }

    pub(super) fn check_time_synchronization(&mut self) -> Result<(), FccError> {
        if self.clock.now() == 0 {
            self.warn(params::CURRENT_TIME, warnings::TIME_NOT_SET)?;
        }

        match self.read_optional(params::TIMEZONE, ItemType::ConfigParam)? {
            None => self.warn(params::TIMEZONE, warnings::ITEM_NOT_SET)?,
            Some(value) if value.is_empty() => self.warn(params::TIMEZONE, warnings::ITEM_IS_EMPTY)?,
            Some(_) => {}
        }

        self.check_utc_offset()
    }
}
