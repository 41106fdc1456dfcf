use crate::sotp::SotpSlot;

/// The factory configurator error type.
///
/// Every variant maps to a stable numeric status through
/// [`FccError::status_code`]; that number is what a provisioning host sees
/// in the `ReturnStatus` field of a bundle response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FccError {
    #[error("General error")]
    General,

    #[error("Out of memory")]
    OutOfMemory,

    #[error("Invalid parameter")]
    InvalidParameter,

    #[error("Not initialized")]
    NotInitialized,

    // Secure item store and persistence
    #[error("Item does not exist")]
    ItemNotExist,

    #[error("Item is empty")]
    EmptyItem,

    #[error("Wrong item data size")]
    WrongItemDataSize,

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Storage integrity error")]
    StorageCryptoError,

    #[error("Item already exists")]
    FileExistsError,

    #[error("SOTP slot {0} is already written")]
    SotpSlotLocked(SotpSlot),

    // Certificate and key checks
    #[error("Invalid certificate")]
    InvalidCertificate,

    #[error("Invalid certificate attribute")]
    InvalidCertAttribute,

    #[error("Certificate public key does not match private key")]
    CertificatePublicKeyMismatch,

    #[error("Certificate expired")]
    ExpiredCertificate,

    #[error("Certificate CN attribute does not match endpoint name")]
    CnAttributeMismatch,

    // Configuration checks
    #[error("URI wrong format")]
    UriWrongFormat,

    #[error("First to claim not allowed")]
    FirstToClaimNotAllowed,

    #[error("Wrong bootstrap mode value")]
    BootstrapModeError,

    #[error("UTC offset wrong format")]
    UtcOffsetWrongFormat,

    // Bundle protocol
    #[error("Malformed bundle")]
    BundleMalformed,

    #[error("Invalid scheme version")]
    BundleInvalidScheme,

    #[error("Invalid group content")]
    BundleInvalidGroup,

    #[error("Unsupported group")]
    BundleUnsupportedGroup,

    #[error("Failed to create bundle response")]
    BundleResponseError,

    #[error("Factory disabled")]
    FactoryDisabled,

    #[error("Failed to record diagnostic information")]
    DiagnosticRecordingError,
}

impl FccError {
    /// Status code reported in `ReturnStatus`. Zero is reserved for success.
    pub fn status_code(&self) -> i64 {
        match self {
            FccError::General => 1,
            FccError::OutOfMemory => 2,
            FccError::InvalidParameter => 3,
            FccError::NotInitialized => 4,
            FccError::ItemNotExist => 5,
            FccError::EmptyItem => 6,
            FccError::WrongItemDataSize => 7,
            FccError::StorageError(_) => 8,
            FccError::StorageCryptoError => 9,
            FccError::FileExistsError => 10,
            FccError::SotpSlotLocked(_) => 11,
            FccError::InvalidCertificate => 12,
            FccError::InvalidCertAttribute => 13,
            FccError::CertificatePublicKeyMismatch => 14,
            FccError::ExpiredCertificate => 15,
            FccError::CnAttributeMismatch => 16,
            FccError::UriWrongFormat => 17,
            FccError::FirstToClaimNotAllowed => 18,
            FccError::BootstrapModeError => 19,
            FccError::UtcOffsetWrongFormat => 20,
            FccError::BundleMalformed => 21,
            FccError::BundleInvalidScheme => 22,
            FccError::BundleInvalidGroup => 23,
            FccError::BundleUnsupportedGroup => 24,
            FccError::BundleResponseError => 25,
            FccError::FactoryDisabled => 26,
            FccError::DiagnosticRecordingError => 27,
        }
    }
}

impl From<std::io::Error> for FccError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::AlreadyExists => FccError::FileExistsError,
            std::io::ErrorKind::OutOfMemory => FccError::OutOfMemory,
            _ => FccError::StorageError(err.to_string()),
        }
    }
}

impl From<serde_cbor::Error> for FccError {
    fn from(err: serde_cbor::Error) -> Self {
        log::debug!("CBOR decode failure: {}", err);
        FccError::BundleMalformed
    }
}

impl From<x509_parser::nom::Err<x509_parser::error::X509Error>> for FccError {
    fn from(err: x509_parser::nom::Err<x509_parser::error::X509Error>) -> Self {
        log::debug!("X509 parse failure: {:?}", err);
        FccError::InvalidCertificate
    }
}

impl From<std::collections::TryReserveError> for FccError {
    fn from(_: std::collections::TryReserveError) -> Self {
        FccError::DiagnosticRecordingError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(FccError::ItemNotExist.to_string(), "Item does not exist");
        assert_eq!(FccError::BundleInvalidScheme.to_string(), "Invalid scheme version");
        assert_eq!(FccError::FactoryDisabled.to_string(), "Factory disabled");
        assert_eq!(
            FccError::SotpSlotLocked(SotpSlot::Entropy).to_string(),
            "SOTP slot Entropy is already written"
        );
        assert_eq!(
            FccError::StorageError("disk full".to_string()).to_string(),
            "Storage error: disk full"
        );
    }

    #[test]
    fn test_status_codes_are_unique_and_nonzero() {
        let all = [
            FccError::General,
            FccError::OutOfMemory,
            FccError::InvalidParameter,
            FccError::NotInitialized,
            FccError::ItemNotExist,
            FccError::EmptyItem,
            FccError::WrongItemDataSize,
            FccError::StorageError(String::new()),
            FccError::StorageCryptoError,
            FccError::FileExistsError,
            FccError::SotpSlotLocked(SotpSlot::RootOfTrust),
            FccError::InvalidCertificate,
            FccError::InvalidCertAttribute,
            FccError::CertificatePublicKeyMismatch,
            FccError::ExpiredCertificate,
            FccError::CnAttributeMismatch,
            FccError::UriWrongFormat,
            FccError::FirstToClaimNotAllowed,
            FccError::BootstrapModeError,
            FccError::UtcOffsetWrongFormat,
            FccError::BundleMalformed,
            FccError::BundleInvalidScheme,
            FccError::BundleInvalidGroup,
            FccError::BundleUnsupportedGroup,
            FccError::BundleResponseError,
            FccError::FactoryDisabled,
            FccError::DiagnosticRecordingError,
        ];
        let mut codes: Vec<i64> = all.iter().map(FccError::status_code).collect();
        assert!(codes.iter().all(|&c| c != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn test_error_from_io_error() {
        let err: FccError =
            std::io::Error::new(std::io::ErrorKind::AlreadyExists, "exists").into();
        assert!(matches!(err, FccError::FileExistsError));

        let err: FccError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, FccError::StorageError(_)));
    }

    #[test]
    fn test_error_from_cbor_error() {
        let err = serde_cbor::from_slice::<serde_cbor::Value>(&[0xff]).unwrap_err();
        assert!(matches!(FccError::from(err), FccError::BundleMalformed));
    }
}
