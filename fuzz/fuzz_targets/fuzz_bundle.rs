//! Fuzz target for provisioning bundle handling
//!
//! Bundles arrive from the factory network and are untrusted. This target
//! feeds arbitrary bytes through the full dispatcher:
//! - CBOR decoding of the outer map and every group
//! - Scheme version and group-count checks
//! - Item storage, SOTP writes and the legacy verifier pass
//!
//! Every input must produce a status and a decodable response.

#![no_main]

use fcc::sotp::MemorySotp;
use fcc::storage::MemoryStorage;
use fcc::time::FixedTimeSource;
use fcc::{BundleResponse, FactoryConfigurator, FccConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut fcc = FactoryConfigurator::new(
        Box::new(MemoryStorage::new()),
        Box::new(MemorySotp::new()),
        Box::new(FixedTimeSource::from_unix_secs(1_800_000_000)),
        FccConfig::default(),
    );
    if fcc.init().is_err() {
        return;
    }

    let (result, response) = fcc.handle_bundle(data);
    let response = response.expect("response must always be produced");
    let decoded = BundleResponse::from_cbor(&response).expect("response must decode");
    assert_eq!(decoded.is_success(), result.is_ok());
});
