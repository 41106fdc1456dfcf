//! Bundle response encoding

use super::SCHEME_VERSION;
use crate::error::FccError;
use crate::output_info::OutputInfo;
use serde::{Deserialize, Serialize};

/// `ErrorInfo` text of a successful call
pub const SUCCESS_TEXT: &str = "Success";

/// Response returned to the provisioning host after every bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleResponse {
    #[serde(rename = "ReturnStatus")]
    pub return_status: i64,

    #[serde(rename = "SchemeVersion", with = "cbor_bytes")]
    pub scheme_version: Vec<u8>,

    #[serde(rename = "ErrorInfo")]
    pub error_info: String,

    #[serde(
        rename = "WarningInfo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub warning_info: Option<String>,
}

impl BundleResponse {
    /// Response for `result` with the diagnostics recorded in `output`.
    pub fn new(result: &Result<(), FccError>, output: &OutputInfo) -> Self {
        let (return_status, error_info) = match result {
            Ok(()) => (0, SUCCESS_TEXT.to_string()),
            Err(err) => (
                err.status_code(),
                output.first_error_text().unwrap_or_else(|| err.to_string()),
            ),
        };
        Self {
            return_status,
            scheme_version: SCHEME_VERSION.to_vec(),
            error_info,
            warning_info: output.warning_text(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.return_status == 0
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, FccError> {
        serde_cbor::to_vec(self).map_err(|e| {
            log::error!("Failed to encode bundle response: {}", e);
            FccError::BundleResponseError
        })
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, FccError> {
        Ok(serde_cbor::from_slice(bytes)?)
    }
}

/// Vec<u8> as a CBOR byte string rather than an array of integers
mod cbor_bytes {
    use serde::de::{Deserializer, Error, Visitor};
    use serde::Serializer;
    use std::fmt;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        struct BytesVisitor;

        impl<'de> Visitor<'de> for BytesVisitor {
            type Value = Vec<u8>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a byte string")
            }

            fn visit_bytes<E: Error>(self, v: &[u8]) -> Result<Vec<u8>, E> {
                Ok(v.to_vec())
            }

            fn visit_byte_buf<E: Error>(self, v: Vec<u8>) -> Result<Vec<u8>, E> {
                Ok(v)
            }
        }

        deserializer.deserialize_byte_buf(BytesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output_info::warnings;
    use serde_cbor::Value;

    #[test]
    fn test_success_response() {
        let output = OutputInfo::new();
        let response = BundleResponse::new(&Ok(()), &output);
        assert!(response.is_success());
        assert_eq!(response.error_info, "Success");
        assert_eq!(response.warning_info, None);
        assert_eq!(response.scheme_version, b"0.0.1");
    }

    #[test]
    fn test_error_response_prefers_recorded_error() {
        let mut output = OutputInfo::new();
        output.record_error(b"mbed.EndpointName", FccError::ItemNotExist).unwrap();
        output.record_warning(b"mbed.UseBootstrap", warnings::BOOTSTRAP_DISABLED).unwrap();

        let response = BundleResponse::new(&Err(FccError::ItemNotExist), &output);
        assert_eq!(response.return_status, FccError::ItemNotExist.status_code());
        assert_eq!(response.error_info, "Item does not exist: mbed.EndpointName");
        assert_eq!(
            response.warning_info.as_deref(),
            Some("Bootstrap mode is disabled: mbed.UseBootstrap")
        );

        let unrecorded = BundleResponse::new(&Err(FccError::BundleInvalidScheme), &OutputInfo::new());
        assert_eq!(unrecorded.error_info, "Invalid scheme version");
    }

    #[test]
    fn test_wire_layout() {
        let response = BundleResponse::new(&Ok(()), &OutputInfo::new());
        let value: Value = serde_cbor::from_slice(&response.to_cbor().unwrap()).unwrap();
        let map = match value {
            Value::Map(map) => map,
            other => panic!("expected map, got {:?}", other),
        };
        assert_eq!(map.len(), 3);
        assert_eq!(
            map.get(&Value::Text("ReturnStatus".into())),
            Some(&Value::Integer(0))
        );
        assert_eq!(
            map.get(&Value::Text("SchemeVersion".into())),
            Some(&Value::Bytes(b"0.0.1".to_vec()))
        );
        assert_eq!(
            map.get(&Value::Text("ErrorInfo".into())),
            Some(&Value::Text("Success".into()))
        );
    }

    #[test]
    fn test_decode_response() {
        let mut output = OutputInfo::new();
        output.record_warning(b"mbed.Timezone", warnings::ITEM_NOT_SET).unwrap();
        let response = BundleResponse::new(&Ok(()), &output);
        let decoded = BundleResponse::from_cbor(&response.to_cbor().unwrap()).unwrap();
        assert_eq!(decoded, response);
    }
}
