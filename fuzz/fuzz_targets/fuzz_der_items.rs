//! Fuzz target for structural DER validation of stored items
//!
//! Private keys, public keys and certificates are validated before they are
//! persisted. Malformed DER must be rejected without panicking.

#![no_main]

use fcc::kcm::der;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = der::validate_private_key(data);
    let _ = der::validate_public_key(data);

    if let Ok(cert) = der::parse_certificate(data) {
        let _ = der::is_self_signed(&cert);
        if let Ok(key) = der::parse_private_key(data) {
            let _ = der::certificate_matches_private_key(&cert, &key);
        }
    }
});
