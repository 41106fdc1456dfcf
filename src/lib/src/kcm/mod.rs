//! Secure Item Store (KCM)
//!
//! A namespaced, type-validated key/value store for provisioned keys,
//! certificates and configuration parameters.
//!
//! # Key Layout
//!
//! ```text
//! storage key = prefix(type) ++ name
//!
//!   PrvKey_    private key         (P-256 DER, encrypted)
//!   PubKey_    public key          (P-256 SPKI DER)
//!   SymKey_    symmetric key       (opaque, encrypted)
//!   Cert_      certificate         (X.509 DER)
//!   Cfg_       config parameter    (opaque, may be empty, encrypted)
//!   CrtChain_  chain descriptor    (opaque, encrypted)
//!
//!   Bkp_ ++ storage key            factory backup copy
//! ```
//!
//! Items stored with the factory flag get a backup copy so that
//! [`SecureItemStore::factory_reset`] can bring the device back to its
//! provisioned state.

pub mod chain;
pub mod der;

pub use chain::{chain_item_name, chain_suffix, load_chain, store_chain, MAX_CHAIN_LENGTH};

use crate::error::FccError;
use crate::storage::{EntryAttributes, ItemStorage, StoredEntry};

/// Longest accepted item name in bytes
pub const MAX_ITEM_NAME_LEN: usize = 100;

const BACKUP_PREFIX: &[u8] = b"Bkp_";

/// Type of a stored item; selects the storage prefix and write validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    PrivateKey,
    PublicKey,
    SymmetricKey,
    Certificate,
    ConfigParam,
    CertificateChain,
}

impl ItemType {
    pub const ALL: [ItemType; 6] = [
        ItemType::PrivateKey,
        ItemType::PublicKey,
        ItemType::SymmetricKey,
        ItemType::Certificate,
        ItemType::ConfigParam,
        ItemType::CertificateChain,
    ];

    pub const fn prefix(self) -> &'static [u8] {
        match self {
            ItemType::PrivateKey => b"PrvKey_",
            ItemType::PublicKey => b"PubKey_",
            ItemType::SymmetricKey => b"SymKey_",
            ItemType::Certificate => b"Cert_",
            ItemType::ConfigParam => b"Cfg_",
            ItemType::CertificateChain => b"CrtChain_",
        }
    }

    /// Whether the backing store must encrypt this type at rest
    pub const fn is_encrypted(self) -> bool {
        !matches!(self, ItemType::PublicKey | ItemType::Certificate)
    }

    /// Config parameters may be stored empty ("set but empty")
    pub const fn allows_empty(self) -> bool {
        matches!(self, ItemType::ConfigParam)
    }

    fn validate(self, data: &[u8]) -> Result<(), FccError> {
        match self {
            ItemType::PrivateKey => der::validate_private_key(data),
            ItemType::PublicKey => der::validate_public_key(data),
            ItemType::Certificate => der::validate_certificate(data),
            ItemType::SymmetricKey | ItemType::ConfigParam | ItemType::CertificateChain => Ok(()),
        }
    }
}

fn validate_name(name: &[u8]) -> Result<(), FccError> {
    if name.is_empty() || name.len() > MAX_ITEM_NAME_LEN {
        log::error!("Item name length {} out of range", name.len());
        return Err(FccError::InvalidParameter);
    }
    let valid = name
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
    if !valid {
        log::error!("Item name contains unsupported characters");
        return Err(FccError::InvalidParameter);
    }
    Ok(())
}

fn storage_key(name: &[u8], item_type: ItemType) -> Vec<u8> {
    let prefix = item_type.prefix();
    let mut key = Vec::with_capacity(prefix.len() + name.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(name);
    key
}

fn backup_key(key: &[u8]) -> Vec<u8> {
    let mut backup = Vec::with_capacity(BACKUP_PREFIX.len() + key.len());
    backup.extend_from_slice(BACKUP_PREFIX);
    backup.extend_from_slice(key);
    backup
}

/// Secure Item Store over a pluggable [`ItemStorage`] backend
pub struct SecureItemStore {
    storage: Box<dyn ItemStorage>,
    initialized: bool,
}

impl SecureItemStore {
    pub fn new(storage: Box<dyn ItemStorage>) -> Self {
        Self {
            storage,
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Initialize the backend. Repeated calls are no-ops.
    pub fn init(&mut self) -> Result<(), FccError> {
        if self.initialized {
            return Ok(());
        }
        self.storage.init()?;
        self.initialized = true;
        log::debug!("Secure item store initialized ({} backend)", self.storage.name());
        Ok(())
    }

    /// Release the backend. A no-op when not initialized.
    pub fn finalize(&mut self) -> Result<(), FccError> {
        if !self.initialized {
            return Ok(());
        }
        self.storage.finalize()?;
        self.initialized = false;
        log::debug!("Secure item store finalized");
        Ok(())
    }

    /// Store a new item.
    ///
    /// `acl` is accepted for wire compatibility and not interpreted.
    pub fn store(
        &mut self,
        name: &[u8],
        item_type: ItemType,
        is_factory: bool,
        data: &[u8],
        acl: Option<&[u8]>,
    ) -> Result<(), FccError> {
        let _ = acl;
        validate_name(name)?;
        self.init()?;

        if data.is_empty() && !item_type.allows_empty() {
            log::error!("Refusing to store empty {:?} item", item_type);
            return Err(FccError::InvalidParameter);
        }
        item_type.validate(data)?;

        let key = storage_key(name, item_type);
        let entry = StoredEntry {
            data: data.to_vec(),
            attributes: EntryAttributes {
                is_factory,
                is_encrypted: item_type.is_encrypted(),
            },
        };
        self.storage.write(&key, &entry)?;

        if is_factory {
            let backup = backup_key(&key);
            let backed_up = self
                .storage
                .delete(&backup)
                .and_then(|_| self.storage.write(&backup, &entry));
            if let Err(err) = backed_up {
                // Roll back so the item is not left without its backup
                self.storage.delete(&key)?;
                return Err(err);
            }
        }

        log::debug!(
            "Stored {:?} item ({} bytes, factory={})",
            item_type,
            data.len(),
            is_factory
        );
        Ok(())
    }

    pub fn get_size(&mut self, name: &[u8], item_type: ItemType) -> Result<usize, FccError> {
        validate_name(name)?;
        self.init()?;
        self.storage
            .size(&storage_key(name, item_type))?
            .ok_or(FccError::ItemNotExist)
    }

    /// Read an item into a buffer of at most `max_size` bytes.
    pub fn get_data(
        &mut self,
        name: &[u8],
        item_type: ItemType,
        max_size: usize,
    ) -> Result<Vec<u8>, FccError> {
        validate_name(name)?;
        self.init()?;
        let entry = self
            .storage
            .read(&storage_key(name, item_type))?
            .ok_or(FccError::ItemNotExist)?;
        if entry.data.len() > max_size {
            return Err(FccError::WrongItemDataSize);
        }
        Ok(entry.data)
    }

    /// Read an item whatever its size.
    pub fn get_item(&mut self, name: &[u8], item_type: ItemType) -> Result<Vec<u8>, FccError> {
        self.get_data(name, item_type, usize::MAX)
    }

    /// Delete an item. Its factory backup, if any, is kept.
    pub fn delete(&mut self, name: &[u8], item_type: ItemType) -> Result<(), FccError> {
        validate_name(name)?;
        self.init()?;
        if !self.storage.delete(&storage_key(name, item_type))? {
            return Err(FccError::ItemNotExist);
        }
        Ok(())
    }

    /// Remove an item together with its factory backup. Absent records are
    /// ignored.
    pub(crate) fn discard(&mut self, name: &[u8], item_type: ItemType) -> Result<(), FccError> {
        let key = storage_key(name, item_type);
        self.storage.delete(&key)?;
        self.storage.delete(&backup_key(&key))?;
        Ok(())
    }

    /// Erase every item, then restore factory items from their backups.
    pub fn factory_reset(&mut self) -> Result<(), FccError> {
        self.init()?;
        let keys = self.storage.keys()?;

        let mut erased = 0usize;
        for key in keys.iter().filter(|k| !k.starts_with(BACKUP_PREFIX)) {
            self.storage.delete(key)?;
            erased += 1;
        }

        let mut restored = 0usize;
        for backup in keys.iter().filter(|k| k.starts_with(BACKUP_PREFIX)) {
            let entry = match self.storage.read(backup)? {
                Some(entry) => entry,
                None => continue,
            };
            self.storage.write(&backup[BACKUP_PREFIX.len()..], &entry)?;
            restored += 1;
        }

        log::info!(
            "Factory reset: erased {} items, restored {} factory items",
            erased,
            restored
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use rcgen::{CertificateParams, KeyPair};

    fn store() -> SecureItemStore {
        SecureItemStore::new(Box::new(MemoryStorage::new()))
    }

    fn certificate() -> Vec<u8> {
        let key = KeyPair::generate().unwrap();
        CertificateParams::default()
            .self_signed(&key)
            .unwrap()
            .der()
            .to_vec()
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(storage_key(b"x", ItemType::PrivateKey), b"PrvKey_x");
        assert_eq!(storage_key(b"x", ItemType::PublicKey), b"PubKey_x");
        assert_eq!(storage_key(b"x", ItemType::SymmetricKey), b"SymKey_x");
        assert_eq!(storage_key(b"x", ItemType::Certificate), b"Cert_x");
        assert_eq!(storage_key(b"x", ItemType::ConfigParam), b"Cfg_x");
        assert_eq!(storage_key(b"x", ItemType::CertificateChain), b"CrtChain_x");
    }

    #[test]
    fn test_store_and_read_every_type() {
        let mut store = store();
        let key = KeyPair::generate().unwrap();
        let items: Vec<(ItemType, Vec<u8>)> = vec![
            (ItemType::PrivateKey, key.serialize_der()),
            (ItemType::PublicKey, key.public_key_der()),
            (ItemType::SymmetricKey, vec![0x11; 32]),
            (ItemType::Certificate, certificate()),
            (ItemType::ConfigParam, b"value".to_vec()),
            (ItemType::CertificateChain, 1u32.to_le_bytes().to_vec()),
        ];

        for (item_type, data) in &items {
            store.store(b"item", *item_type, false, data, None).unwrap();
            assert_eq!(store.get_size(b"item", *item_type).unwrap(), data.len());
            assert_eq!(&store.get_item(b"item", *item_type).unwrap(), data);
        }
        assert!(matches!(
            store.get_item(b"absent", ItemType::SymmetricKey),
            Err(FccError::ItemNotExist)
        ));
    }

    #[test]
    fn test_same_name_different_types_do_not_collide() {
        let mut store = store();
        store.store(b"n", ItemType::ConfigParam, false, b"cfg", None).unwrap();
        store.store(b"n", ItemType::SymmetricKey, false, b"sym", None).unwrap();
        assert_eq!(store.get_item(b"n", ItemType::ConfigParam).unwrap(), b"cfg");
        assert_eq!(store.get_item(b"n", ItemType::SymmetricKey).unwrap(), b"sym");
    }

    #[test]
    fn test_empty_items() {
        let mut store = store();
        store.store(b"mbed.Timezone", ItemType::ConfigParam, false, b"", None).unwrap();
        assert_eq!(store.get_size(b"mbed.Timezone", ItemType::ConfigParam).unwrap(), 0);

        for item_type in [ItemType::PrivateKey, ItemType::SymmetricKey, ItemType::Certificate] {
            assert!(matches!(
                store.store(b"empty", item_type, false, b"", None),
                Err(FccError::InvalidParameter)
            ));
        }
    }

    #[test]
    fn test_structural_validation() {
        let mut store = store();
        assert!(matches!(
            store.store(b"k", ItemType::PrivateKey, false, b"junk", None),
            Err(FccError::InvalidParameter)
        ));
        assert!(matches!(
            store.store(b"k", ItemType::PublicKey, false, b"junk", None),
            Err(FccError::InvalidParameter)
        ));
        assert!(matches!(
            store.store(b"c", ItemType::Certificate, false, b"junk", None),
            Err(FccError::InvalidCertificate)
        ));
        assert!(matches!(
            store.get_item(b"c", ItemType::Certificate),
            Err(FccError::ItemNotExist)
        ));
    }

    #[test]
    fn test_name_rules() {
        let mut store = store();
        let long = vec![b'a'; MAX_ITEM_NAME_LEN + 1];
        for name in [&b""[..], &b"bad/name"[..], &b"space name"[..], &long[..]] {
            assert!(matches!(
                store.store(name, ItemType::ConfigParam, false, b"v", None),
                Err(FccError::InvalidParameter)
            ));
        }
        let max = vec![b'a'; MAX_ITEM_NAME_LEN];
        store.store(&max, ItemType::ConfigParam, false, b"v", None).unwrap();
    }

    #[test]
    fn test_store_refuses_overwrite() {
        let mut store = store();
        store.store(b"dup", ItemType::ConfigParam, false, b"1", None).unwrap();
        assert!(matches!(
            store.store(b"dup", ItemType::ConfigParam, false, b"2", None),
            Err(FccError::FileExistsError)
        ));
        store.delete(b"dup", ItemType::ConfigParam).unwrap();
        store.store(b"dup", ItemType::ConfigParam, false, b"2", None).unwrap();
        assert_eq!(store.get_item(b"dup", ItemType::ConfigParam).unwrap(), b"2");
    }

    #[test]
    fn test_get_data_buffer_too_small() {
        let mut store = store();
        store.store(b"v", ItemType::ConfigParam, false, b"12345", None).unwrap();
        assert!(matches!(
            store.get_data(b"v", ItemType::ConfigParam, 4),
            Err(FccError::WrongItemDataSize)
        ));
        assert_eq!(store.get_data(b"v", ItemType::ConfigParam, 5).unwrap(), b"12345");
    }

    #[test]
    fn test_delete_absent() {
        let mut store = store();
        assert!(matches!(
            store.delete(b"nothing", ItemType::ConfigParam),
            Err(FccError::ItemNotExist)
        ));
    }

    #[test]
    fn test_factory_reset_restores_factory_items() {
        let mut store = store();
        store.store(b"factory", ItemType::ConfigParam, true, b"f", None).unwrap();
        store.store(b"user", ItemType::ConfigParam, false, b"u", None).unwrap();
        store.delete(b"factory", ItemType::ConfigParam).unwrap();

        store.factory_reset().unwrap();
        assert_eq!(store.get_item(b"factory", ItemType::ConfigParam).unwrap(), b"f");
        assert!(matches!(
            store.get_item(b"user", ItemType::ConfigParam),
            Err(FccError::ItemNotExist)
        ));

        // A second reset is idempotent
        store.factory_reset().unwrap();
        assert_eq!(store.get_item(b"factory", ItemType::ConfigParam).unwrap(), b"f");
    }

    #[test]
    fn test_lazy_init_and_symmetric_finalize() {
        let mut store = store();
        store.finalize().unwrap();
        assert!(!store.is_initialized());

        store.store(b"x", ItemType::ConfigParam, false, b"1", None).unwrap();
        assert!(store.is_initialized());
        store.finalize().unwrap();
        assert!(!store.is_initialized());
    }

    #[test]
    fn test_chain_round_trip() {
        let mut store = store();
        let certs: Vec<Vec<u8>> = (0..3).map(|_| certificate()).collect();
        store_chain(&mut store, b"mbed.Chain", &certs, true).unwrap();

        for (i, cert) in certs.iter().enumerate() {
            let name = chain_item_name(b"mbed.Chain", i).unwrap();
            assert_eq!(&store.get_item(&name, ItemType::Certificate).unwrap(), cert);
        }
        assert_eq!(load_chain(&mut store, b"mbed.Chain").unwrap(), certs);
    }

    #[test]
    fn test_chain_too_long_stores_nothing() {
        let mut store = store();
        let cert = certificate();
        let certs = vec![cert; MAX_CHAIN_LENGTH + 1];
        assert!(matches!(
            store_chain(&mut store, b"long", &certs, false),
            Err(FccError::InvalidParameter)
        ));
        assert!(matches!(
            store.get_item(b"longa", ItemType::Certificate),
            Err(FccError::ItemNotExist)
        ));
    }

    #[test]
    fn test_chain_failure_removes_partial_chain() {
        let mut store = store();
        let good = certificate();
        let certs = vec![good.clone(), good.clone(), b"junk".to_vec()];
        assert!(matches!(
            store_chain(&mut store, b"mbed.Chain", &certs, true),
            Err(FccError::InvalidCertificate)
        ));
        for name in [b"mbed.Chaina", b"mbed.Chainb"] {
            assert!(matches!(
                store.get_item(name, ItemType::Certificate),
                Err(FccError::ItemNotExist)
            ));
        }

        // No backup survives to be restored by a reset
        store.factory_reset().unwrap();
        assert!(matches!(
            store.get_item(b"mbed.Chaina", ItemType::Certificate),
            Err(FccError::ItemNotExist)
        ));

        let fixed = vec![good.clone(), certificate()];
        store_chain(&mut store, b"mbed.Chain", &fixed, true).unwrap();
        assert_eq!(load_chain(&mut store, b"mbed.Chain").unwrap(), fixed);
    }

    #[test]
    fn test_chain_failure_keeps_unrelated_items() {
        let mut store = store();
        let cert = certificate();
        store.store(b"mbed.Chainb", ItemType::Certificate, false, &cert, None).unwrap();

        let certs = vec![cert.clone(), cert.clone()];
        assert!(matches!(
            store_chain(&mut store, b"mbed.Chain", &certs, false),
            Err(FccError::FileExistsError)
        ));
        assert!(matches!(
            store.get_item(b"mbed.Chaina", ItemType::Certificate),
            Err(FccError::ItemNotExist)
        ));
        assert_eq!(store.get_item(b"mbed.Chainb", ItemType::Certificate).unwrap(), cert);
    }

    /// Memory storage whose backup deletes fail
    struct BrokenBackupStorage(MemoryStorage);

    impl ItemStorage for BrokenBackupStorage {
        fn write(&mut self, key: &[u8], entry: &StoredEntry) -> Result<(), FccError> {
            self.0.write(key, entry)
        }

        fn read(&self, key: &[u8]) -> Result<Option<StoredEntry>, FccError> {
            self.0.read(key)
        }

        fn size(&self, key: &[u8]) -> Result<Option<usize>, FccError> {
            self.0.size(key)
        }

        fn delete(&mut self, key: &[u8]) -> Result<bool, FccError> {
            if key.starts_with(BACKUP_PREFIX) {
                return Err(FccError::StorageError("backup partition busy".to_string()));
            }
            self.0.delete(key)
        }

        fn keys(&self) -> Result<Vec<Vec<u8>>, FccError> {
            self.0.keys()
        }

        fn name(&self) -> &'static str {
            "broken-backup"
        }
    }

    #[test]
    fn test_factory_item_rolled_back_when_backup_cannot_be_cleared() {
        let mut store = SecureItemStore::new(Box::new(BrokenBackupStorage(MemoryStorage::new())));
        assert!(matches!(
            store.store(b"factory", ItemType::ConfigParam, true, b"f", None),
            Err(FccError::StorageError(_))
        ));
        assert!(matches!(
            store.get_item(b"factory", ItemType::ConfigParam),
            Err(FccError::ItemNotExist)
        ));

        // Non-factory items never touch the backup area
        store.store(b"user", ItemType::ConfigParam, false, b"u", None).unwrap();
    }
}
