//! Provisioning bundle protocol
//!
//! A bundle is a CBOR map holding a scheme version and named groups:
//!
//! ```text
//! {
//!   "SchemeVersion":      "0.0.1",
//!   "EntropyData":        h'...'            (56 bytes)
//!   "ROT":                h'...'            (24 bytes)
//!   "Keys":               [{Name, Type, Format?, Data, ACL?}, ...]
//!   "Certificates":       [{Name, Format?, Data, ACL?}, ...]
//!   "ConfigParams":       [{Name, Data, ACL?}, ...]
//!   "CertificateChains":  [{Name, ACL?, DataArray: [h'root', ...]}, ...]
//!   "VerifyDeviceConfig": 0 | 1
//!   "FactoryDisable":     0 | 1
//! }
//! ```
//!
//! Groups run in [`GROUP_TABLE`] order, whatever their order on the wire.
//! Entropy and the root of trust come first so that the device is seeded
//! before any key material is handled. The first failing group aborts the
//! rest of the bundle.

pub mod decode;
pub mod groups;
pub mod response;

pub use response::{BundleResponse, SUCCESS_TEXT};

use crate::configurator::FactoryConfigurator;
use crate::error::FccError;
use decode::BundleMap;

/// Bundle scheme version understood by this device
pub const SCHEME_VERSION: &[u8] = b"0.0.1";

pub const SCHEME_VERSION_GROUP: &str = "SchemeVersion";
pub const ENTROPY_GROUP: &str = "EntropyData";
pub const ROT_GROUP: &str = "ROT";
pub const KEYS_GROUP: &str = "Keys";
pub const CERTIFICATES_GROUP: &str = "Certificates";
pub const CONFIG_PARAMS_GROUP: &str = "ConfigParams";
pub const CERTIFICATE_CHAINS_GROUP: &str = "CertificateChains";
pub const VERIFY_GROUP: &str = "VerifyDeviceConfig";
pub const FACTORY_DISABLE_GROUP: &str = "FactoryDisable";

/// Reserved for certificate signing requests; not accepted
pub const CSRS_GROUP: &str = "Csrs";

/// Encoded nodes per group entry (key and value)
pub const FIELDS_PER_GROUP: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupType {
    SchemeVersion,
    Entropy,
    RootOfTrust,
    Keys,
    Certificates,
    ConfigParams,
    CertificateChains,
    VerifyTrigger,
    DisableTrigger,
    Csrs,
}

#[derive(Debug, Clone, Copy)]
pub struct GroupEntry {
    pub name: &'static str,
    pub group_type: GroupType,
}

/// Dispatch table; the position of an entry is its processing order
pub const GROUP_TABLE: [GroupEntry; 9] = [
    GroupEntry { name: SCHEME_VERSION_GROUP, group_type: GroupType::SchemeVersion },
    GroupEntry { name: ENTROPY_GROUP, group_type: GroupType::Entropy },
    GroupEntry { name: ROT_GROUP, group_type: GroupType::RootOfTrust },
    GroupEntry { name: KEYS_GROUP, group_type: GroupType::Keys },
    GroupEntry { name: CERTIFICATES_GROUP, group_type: GroupType::Certificates },
    GroupEntry { name: CONFIG_PARAMS_GROUP, group_type: GroupType::ConfigParams },
    GroupEntry { name: CERTIFICATE_CHAINS_GROUP, group_type: GroupType::CertificateChains },
    GroupEntry { name: VERIFY_GROUP, group_type: GroupType::VerifyTrigger },
    GroupEntry { name: FACTORY_DISABLE_GROUP, group_type: GroupType::DisableTrigger },
];

/// Largest outer map, counted in encoded nodes
pub const MAX_BUNDLE_NODES: usize = GROUP_TABLE.len() * FIELDS_PER_GROUP;

fn check_scheme_version(bundle: &BundleMap) -> Result<(), FccError> {
    let version = bundle
        .get(SCHEME_VERSION_GROUP)
        .and_then(|value| decode::as_string_bytes(value).ok());
    if version != Some(SCHEME_VERSION) {
        log::error!("Bundle scheme version {:?} is not supported", version);
        return Err(FccError::BundleInvalidScheme);
    }
    Ok(())
}

/// Decode `blob` and run its groups against `fcc`.
pub(crate) fn process(fcc: &mut FactoryConfigurator, blob: &[u8]) -> Result<(), FccError> {
    if blob.is_empty() || blob.len() > fcc.config.max_bundle_size {
        log::error!("Bundle size {} rejected", blob.len());
        return Err(FccError::InvalidParameter);
    }

    let bundle = BundleMap::decode(blob)?;
    if bundle.node_count() > MAX_BUNDLE_NODES {
        log::error!("Bundle has {} top-level entries", bundle.entries.len());
        return Err(FccError::BundleMalformed);
    }
    if !GROUP_TABLE.iter().any(|entry| bundle.contains(entry.name)) {
        log::error!("Bundle holds no known group");
        return Err(FccError::InvalidParameter);
    }
    check_scheme_version(&bundle)?;

    let mut groups_seen = 0usize;
    let mut trigger_seen = false;
    for entry in GROUP_TABLE.iter() {
        let value = match bundle.get(entry.name) {
            Some(value) => value,
            None => continue,
        };
        let handler = groups::handler_for(entry.group_type).ok_or_else(|| {
            log::error!("No processor for group {}", entry.name);
            FccError::BundleInvalidGroup
        })?;

        log::info!("Processing {} group", entry.name);
        if let Err(err) = handler(fcc, value) {
            log::error!("{} group failed: {}", entry.name, err);
            return Err(err);
        }

        groups_seen += 1;
        if matches!(
            entry.group_type,
            GroupType::VerifyTrigger | GroupType::DisableTrigger
        ) {
            trigger_seen = true;
        }
    }

    if groups_seen == 0 {
        return Err(FccError::InvalidParameter);
    }
    if groups_seen != bundle.node_count() / FIELDS_PER_GROUP {
        log::error!(
            "Bundle carries {} entries but only {} supported groups",
            bundle.entries.len(),
            groups_seen
        );
        return Err(FccError::BundleUnsupportedGroup);
    }

    if !trigger_seen && fcc.config.legacy_auto_verify {
        log::info!("No verify or disable group, verifying device configuration");
        fcc.run_verifier()?;
    }
    Ok(())
}
