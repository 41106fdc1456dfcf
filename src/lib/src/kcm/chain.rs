//! Certificate chain decomposition
//!
//! A chain arrives as one named entry holding DER certificates, root first.
//! Each certificate is stored as its own certificate item named
//! `base ++ letter(index)`, and a small descriptor holding the chain length
//! is stored under the chain namespace.
//!
//! The suffix alphabet is `'a'..='z'`, so a chain holds at most 26
//! certificates. Longer chains would need a different naming scheme
//! (numeric suffixes, for instance) and a storage migration.

use super::{ItemType, SecureItemStore};
use crate::error::FccError;

/// Longest chain the suffix alphabet can name
pub const MAX_CHAIN_LENGTH: usize = 26;

/// Suffix letter for the certificate at `index` (0 is the root).
pub fn chain_suffix(index: usize) -> Result<u8, FccError> {
    if index >= MAX_CHAIN_LENGTH {
        log::error!(
            "Certificate chain index {} exceeds the {} certificate limit",
            index,
            MAX_CHAIN_LENGTH
        );
        return Err(FccError::InvalidParameter);
    }
    Ok(b'a' + index as u8)
}

/// Item name of the certificate at `index` in chain `base`.
pub fn chain_item_name(base: &[u8], index: usize) -> Result<Vec<u8>, FccError> {
    let suffix = chain_suffix(index)?;
    let mut name = Vec::with_capacity(base.len() + 1);
    name.extend_from_slice(base);
    name.push(suffix);
    Ok(name)
}

/// Store every certificate of a chain in root-first order, then its descriptor.
///
/// A chain longer than [`MAX_CHAIN_LENGTH`] is rejected before anything is
/// stored. Otherwise the first store failure aborts the chain and the
/// certificates already written for it are removed again.
pub fn store_chain(
    store: &mut SecureItemStore,
    base: &[u8],
    certificates: &[Vec<u8>],
    is_factory: bool,
) -> Result<(), FccError> {
    if certificates.is_empty() || certificates.len() > MAX_CHAIN_LENGTH {
        log::error!(
            "Certificate chain of {} certificates is not storable",
            certificates.len()
        );
        return Err(FccError::InvalidParameter);
    }

    let mut written = Vec::with_capacity(certificates.len());
    if let Err(err) = store_chain_items(store, base, certificates, is_factory, &mut written) {
        for name in &written {
            if let Err(cleanup_err) = store.discard(name, ItemType::Certificate) {
                log::warn!("Failed to remove partial chain certificate: {}", cleanup_err);
            }
        }
        log::error!(
            "Certificate chain aborted, removed {} stored certificates",
            written.len()
        );
        return Err(err);
    }

    log::debug!(
        "Stored certificate chain of {} certificates",
        certificates.len()
    );
    Ok(())
}

fn store_chain_items(
    store: &mut SecureItemStore,
    base: &[u8],
    certificates: &[Vec<u8>],
    is_factory: bool,
    written: &mut Vec<Vec<u8>>,
) -> Result<(), FccError> {
    for (index, certificate) in certificates.iter().enumerate() {
        let name = chain_item_name(base, index)?;
        store.store(&name, ItemType::Certificate, is_factory, certificate, None)?;
        written.push(name);
    }

    let descriptor = (certificates.len() as u32).to_le_bytes();
    store.store(base, ItemType::CertificateChain, is_factory, &descriptor, None)
}

/// Load a chain previously written by [`store_chain`], root first.
pub fn load_chain(store: &mut SecureItemStore, base: &[u8]) -> Result<Vec<Vec<u8>>, FccError> {
    let descriptor = store.get_data(base, ItemType::CertificateChain, 4)?;
    let bytes: [u8; 4] = descriptor
        .as_slice()
        .try_into()
        .map_err(|_| FccError::WrongItemDataSize)?;
    let length = u32::from_le_bytes(bytes) as usize;
    if length == 0 || length > MAX_CHAIN_LENGTH {
        return Err(FccError::StorageCryptoError);
    }

    let mut certificates = Vec::with_capacity(length);
    for index in 0..length {
        let name = chain_item_name(base, index)?;
        certificates.push(store.get_item(&name, ItemType::Certificate)?);
    }
    Ok(certificates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_alphabet() {
        assert_eq!(chain_suffix(0).unwrap(), b'a');
        assert_eq!(chain_suffix(1).unwrap(), b'b');
        assert_eq!(chain_suffix(25).unwrap(), b'z');
        assert!(matches!(chain_suffix(26), Err(FccError::InvalidParameter)));
    }

    #[test]
    fn test_chain_item_name() {
        assert_eq!(chain_item_name(b"mbed.Chain", 2).unwrap(), b"mbed.Chainc");
        assert!(chain_item_name(b"mbed.Chain", 26).is_err());
    }
}
