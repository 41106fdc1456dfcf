//! Group processors
//!
//! One function per group type. Item failures are recorded against the item
//! (or chain) name before they propagate, so the response can name the
//! offending parameter.

use super::decode::{self, as_array, as_map, as_string_bytes, as_text, as_u32, as_u64};
use super::{
    GroupType, CERTIFICATE_CHAINS_GROUP, ENTROPY_GROUP, FACTORY_DISABLE_GROUP, ROT_GROUP,
    VERIFY_GROUP,
};
use crate::configurator::FactoryConfigurator;
use crate::error::FccError;
use crate::kcm::{self, ItemType, MAX_CHAIN_LENGTH};
use crate::params;
use crate::sotp::SotpSlot;
use serde_cbor::Value;
use std::collections::BTreeMap;

pub const NAME_FIELD: &str = "Name";
pub const TYPE_FIELD: &str = "Type";
pub const FORMAT_FIELD: &str = "Format";
pub const DATA_FIELD: &str = "Data";
pub const ACL_FIELD: &str = "ACL";
pub const DATA_ARRAY_FIELD: &str = "DataArray";

pub const KEY_TYPE_PRIVATE: &str = "ECCPrivate";
pub const KEY_TYPE_PUBLIC: &str = "ECCPublic";
pub const KEY_TYPE_SYMMETRIC: &str = "Symmetric";
pub const FORMAT_DER: &str = "der";

/// Processor for one group's value
pub type GroupHandler = fn(&mut FactoryConfigurator, &Value) -> Result<(), FccError>;

/// Handler for a group type, `None` for types with no processor
pub fn handler_for(group_type: GroupType) -> Option<GroupHandler> {
    match group_type {
        GroupType::SchemeVersion => Some(process_scheme_version),
        GroupType::Entropy => Some(process_entropy),
        GroupType::RootOfTrust => Some(process_rot),
        GroupType::Keys => Some(process_keys),
        GroupType::Certificates => Some(process_certificates),
        GroupType::ConfigParams => Some(process_config_params),
        GroupType::CertificateChains => Some(process_certificate_chains),
        GroupType::VerifyTrigger => Some(process_verify_trigger),
        GroupType::DisableTrigger => Some(process_disable_trigger),
        GroupType::Csrs => None,
    }
}

/// Run `op`, attributing any failure to `parameter`.
fn attributed<T>(
    fcc: &mut FactoryConfigurator,
    parameter: &[u8],
    op: impl FnOnce(&mut FactoryConfigurator) -> Result<T, FccError>,
) -> Result<T, FccError> {
    match op(fcc) {
        Ok(value) => Ok(value),
        Err(err) => {
            fcc.output.record_error(parameter, err.clone())?;
            Err(err)
        }
    }
}

/// Fields shared by key, certificate and config items
struct ItemFields<'a> {
    name: &'a [u8],
    map: &'a BTreeMap<Value, Value>,
}

impl<'a> ItemFields<'a> {
    fn parse(value: &'a Value) -> Result<Self, FccError> {
        let map = as_map(value)?;
        let name = as_string_bytes(decode::required_field(map, NAME_FIELD)?)?;
        if decode::field(map, ACL_FIELD).is_some() {
            log::debug!("Item ACL present, not interpreted");
        }
        Ok(Self { name, map })
    }

    fn data(&self) -> Result<&'a [u8], FccError> {
        decode::as_bytes(decode::required_field(self.map, DATA_FIELD)?)
    }

    fn check_der_format(&self) -> Result<(), FccError> {
        match decode::field(self.map, FORMAT_FIELD) {
            None => Ok(()),
            Some(format) if as_text(format)? == FORMAT_DER => Ok(()),
            Some(_) => Err(FccError::InvalidParameter),
        }
    }
}

fn process_scheme_version(_: &mut FactoryConfigurator, _: &Value) -> Result<(), FccError> {
    // Checked by the dispatcher before any group runs
    Ok(())
}

fn process_sotp_buffer(
    fcc: &mut FactoryConfigurator,
    group: &str,
    slot: SotpSlot,
    value: &Value,
) -> Result<(), FccError> {
    attributed(fcc, group.as_bytes(), |fcc| {
        let data = decode::as_bytes(value)?;
        fcc.sotp.write(slot, data)?;
        log::info!("{} written ({} bytes)", slot, data.len());
        Ok(())
    })
}

fn process_entropy(fcc: &mut FactoryConfigurator, value: &Value) -> Result<(), FccError> {
    process_sotp_buffer(fcc, ENTROPY_GROUP, SotpSlot::Entropy, value)
}

fn process_rot(fcc: &mut FactoryConfigurator, value: &Value) -> Result<(), FccError> {
    process_sotp_buffer(fcc, ROT_GROUP, SotpSlot::RootOfTrust, value)
}

fn key_item_type(type_name: &str) -> Result<ItemType, FccError> {
    match type_name {
        KEY_TYPE_PRIVATE => Ok(ItemType::PrivateKey),
        KEY_TYPE_PUBLIC => Ok(ItemType::PublicKey),
        KEY_TYPE_SYMMETRIC => Ok(ItemType::SymmetricKey),
        other => {
            log::error!("Unknown key type '{}'", other);
            Err(FccError::BundleInvalidGroup)
        }
    }
}

fn process_keys(fcc: &mut FactoryConfigurator, value: &Value) -> Result<(), FccError> {
    for item in as_array(value)? {
        let fields = ItemFields::parse(item)?;
        attributed(fcc, fields.name, |fcc| {
            let item_type = key_item_type(as_text(decode::required_field(fields.map, TYPE_FIELD)?)?)?;
            fields.check_der_format()?;
            fcc.items.store(fields.name, item_type, true, fields.data()?, None)
        })?;
    }
    Ok(())
}

fn process_certificates(fcc: &mut FactoryConfigurator, value: &Value) -> Result<(), FccError> {
    for item in as_array(value)? {
        let fields = ItemFields::parse(item)?;
        attributed(fcc, fields.name, |fcc| {
            fields.check_der_format()?;
            fcc.items
                .store(fields.name, ItemType::Certificate, true, fields.data()?, None)
        })?;
    }
    Ok(())
}

/// Config values may be bytes, text, or an unsigned integer stored as a
/// 4-byte little-endian word.
fn config_value(value: &Value) -> Result<Vec<u8>, FccError> {
    match value {
        Value::Bytes(bytes) => Ok(bytes.clone()),
        Value::Text(text) => Ok(text.as_bytes().to_vec()),
        Value::Integer(_) => Ok(as_u32(value)?.to_le_bytes().to_vec()),
        _ => Err(FccError::BundleMalformed),
    }
}

fn process_config_params(fcc: &mut FactoryConfigurator, value: &Value) -> Result<(), FccError> {
    for item in as_array(value)? {
        let fields = ItemFields::parse(item)?;
        attributed(fcc, fields.name, |fcc| {
            let data = decode::required_field(fields.map, DATA_FIELD)?;
            if fields.name == params::CURRENT_TIME {
                let unix_secs = as_u64(data).map_err(|_| FccError::InvalidParameter)?;
                return fcc.time_set(unix_secs);
            }
            let data = config_value(data)?;
            fcc.items
                .store(fields.name, ItemType::ConfigParam, true, &data, None)
        })?;
    }
    Ok(())
}

fn process_certificate_chains(fcc: &mut FactoryConfigurator, value: &Value) -> Result<(), FccError> {
    for chain in as_array(value)? {
        let map = as_map(chain)?;
        let base = as_string_bytes(decode::required_field(map, NAME_FIELD)?)?;
        attributed(fcc, base, |fcc| {
            let certificates = as_array(decode::required_field(map, DATA_ARRAY_FIELD)?)?;
            if certificates.len() > MAX_CHAIN_LENGTH {
                log::error!(
                    "Certificate chain holds {} certificates, limit is {}",
                    certificates.len(),
                    MAX_CHAIN_LENGTH
                );
                return Err(FccError::InvalidParameter);
            }
            let certificates = certificates
                .iter()
                .map(|cert| decode::as_bytes(cert).map(<[u8]>::to_vec))
                .collect::<Result<Vec<_>, _>>()?;
            kcm::store_chain(&mut fcc.items, base, &certificates, true)
        })?;
    }
    log::debug!("{} processed", CERTIFICATE_CHAINS_GROUP);
    Ok(())
}

/// Trigger groups carry a 4-byte unsigned integer that must be 0 or 1.
fn trigger_value(value: &Value) -> Result<bool, FccError> {
    match as_u32(value)? {
        0 => Ok(false),
        1 => Ok(true),
        other => {
            log::error!("Trigger value {} is neither 0 nor 1", other);
            Err(FccError::BundleMalformed)
        }
    }
}

fn process_verify_trigger(fcc: &mut FactoryConfigurator, value: &Value) -> Result<(), FccError> {
    let requested = attributed(fcc, VERIFY_GROUP.as_bytes(), |_| trigger_value(value))?;
    if !requested {
        log::info!("Device verification not requested");
        return Ok(());
    }
    // The verifier records its own diagnostics
    fcc.run_verifier()
}

fn process_disable_trigger(fcc: &mut FactoryConfigurator, value: &Value) -> Result<(), FccError> {
    attributed(fcc, FACTORY_DISABLE_GROUP.as_bytes(), |fcc| {
        if trigger_value(value)? {
            fcc.factory_disable()
        } else {
            log::info!("Factory disable not requested");
            Ok(())
        }
    })
}
