use super::DeviceVerifier;
use crate::error::FccError;
use crate::kcm::{der, ItemType};
use crate::output_info::warnings;
use crate::params::{self, SecurityObjectNames, BOOTSTRAP_OBJECTS, LWM2M_OBJECTS};

const URI_SCHEMES: [&[u8]; 2] = [b"coap://", b"coaps://"];
const AID_MARKERS: [&[u8]; 2] = [b"?aid=", b"&aid="];

/// Everything after the first account-id marker, if the URI has one.
fn account_id(uri: &[u8]) -> Option<&[u8]> {
    AID_MARKERS
        .iter()
        .filter_map(|marker| {
            uri.windows(marker.len())
                .position(|w| w == *marker)
                .map(|pos| pos + marker.len())
        })
        .min()
        .map(|start| &uri[start..])
}

impl<'a> DeviceVerifier<'a> {
    pub(super) fn check_security_objects(&mut self, endpoint_name: &[u8]) -> Result<(), FccError> {
        let (active, companion) = if self.use_bootstrap {
            (BOOTSTRAP_OBJECTS, LWM2M_OBJECTS)
        } else {
            (LWM2M_OBJECTS, BOOTSTRAP_OBJECTS)
        };

        self.read_required(active.server_ca_cert, ItemType::Certificate)?;
        self.warn_if_present(companion.server_ca_cert, ItemType::Certificate)?;

        let account_id = self.check_server_uri(&active)?;
        self.warn_if_present(companion.server_uri, ItemType::ConfigParam)?;

        self.warn_if_present(companion.device_private_key, ItemType::PrivateKey)?;
        self.warn_if_present(companion.device_cert, ItemType::Certificate)?;
        self.check_device_credentials(&active, endpoint_name, account_id.as_deref())
    }

    /// Validate the active server URI; returns its account id, if any.
    fn check_server_uri(
        &mut self,
        names: &SecurityObjectNames,
    ) -> Result<Option<Vec<u8>>, FccError> {
        let uri = self.read_required(names.server_uri, ItemType::ConfigParam)?;
        if !URI_SCHEMES.iter().any(|scheme| uri.starts_with(scheme)) {
            return Err(self.fail(names.server_uri, FccError::UriWrongFormat));
        }

        let first_to_claim = self
            .read_flag(params::FIRST_TO_CLAIM, FccError::WrongItemDataSize)?
            .unwrap_or(0)
            != 0;
        let aid = account_id(&uri).map(<[u8]>::to_vec);

        if first_to_claim {
            if !self.use_bootstrap || aid.is_some() {
                return Err(self.fail(params::FIRST_TO_CLAIM, FccError::FirstToClaimNotAllowed));
            }
        } else if aid.is_none() {
            return Err(self.fail(names.server_uri, FccError::UriWrongFormat));
        }
        Ok(aid)
    }

    fn check_device_credentials(
        &mut self,
        names: &SecurityObjectNames,
        endpoint_name: &[u8],
        account_id: Option<&[u8]>,
    ) -> Result<(), FccError> {
        let key_der = self.read_required(names.device_private_key, ItemType::PrivateKey)?;
        let cert_der = self.read_required(names.device_cert, ItemType::Certificate)?;

        let cert = match der::parse_certificate(&cert_der) {
            Ok(cert) => cert,
            Err(err) => return Err(self.fail(names.device_cert, err)),
        };
        let private_key = match der::parse_private_key(&key_der) {
            Ok(key) => key,
            Err(err) => return Err(self.fail(names.device_private_key, err)),
        };
        if let Err(err) = der::certificate_matches_private_key(&cert, &private_key) {
            return Err(self.fail(names.device_cert, err));
        }

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok());
        if common_name.map(str::as_bytes) != Some(endpoint_name) {
            return Err(self.fail(names.device_cert, FccError::CnAttributeMismatch));
        }

        if !self.use_bootstrap {
            let unit = cert
                .subject()
                .iter_organizational_unit()
                .next()
                .and_then(|ou| ou.as_str().ok());
            if account_id.is_none() || unit.map(str::as_bytes) != account_id {
                return Err(self.fail(names.device_cert, FccError::InvalidCertAttribute));
            }
        }

        if der::is_self_signed(&cert) {
            self.warn(names.device_cert, warnings::SELF_SIGNED_CERT)?;
        }

        let validity = cert.validity();
        self.check_certificate_expiry(
            names.device_cert,
            validity.not_before.timestamp(),
            validity.not_after.timestamp(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_extraction() {
        assert_eq!(
            account_id(b"coaps://lwm2m.example.com:5684?aid=0123abcd"),
            Some(&b"0123abcd"[..])
        );
        assert_eq!(
            account_id(b"coap://bs.example.com?iep=x&aid=acct"),
            Some(&b"acct"[..])
        );
        assert_eq!(account_id(b"coaps://bs.example.com:5684"), None);
        assert_eq!(account_id(b"coaps://host?aid="), Some(&b""[..]));
    }
}
