//! The Certificate Store: serial number → platform public key.
//!
//! Reads happen on every inbound verification; writes happen only during a
//! certificate refresh. `replace_all` is the only writer and is atomic with
//! respect to concurrent lookups because the whole map is swapped in one
//! assignment under the lock — no reader ever observes a torn map.

use rsa::RsaPublicKey;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
pub struct CertificateStore {
    certs: RwLock<HashMap<String, RsaPublicKey>>,
}

impl CertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, RsaPublicKey)>) -> Self {
        let store = Self::new();
        store.replace_all(pairs);
        store
    }

    pub fn put(&self, serial: String, key: RsaPublicKey) {
        self.certs.write().unwrap().insert(serial, key);
    }

    pub fn lookup(&self, serial: &str) -> Option<RsaPublicKey> {
        self.certs.read().unwrap().get(serial).cloned()
    }

    /// Atomically replaces the entire set. `lookup(s)` returns a key after
    /// this call iff `s` was present in `pairs`.
    pub fn replace_all(&self, pairs: impl IntoIterator<Item = (String, RsaPublicKey)>) {
        let map: HashMap<String, RsaPublicKey> = pairs.into_iter().collect();
        *self.certs.write().unwrap() = map;
    }

    pub fn is_empty(&self) -> bool {
        self.certs.read().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.certs.read().unwrap().len()
    }
}

impl Clone for CertificateStore {
    fn clone(&self) -> Self {
        let snapshot = self.certs.read().unwrap().clone();
        CertificateStore {
            certs: RwLock::new(snapshot),
        }
    }
}

impl std::fmt::Debug for CertificateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateStore")
            .field("serials", &self.certs.read().unwrap().keys().collect::<Vec<_>>())
            .finish()
    }
}
