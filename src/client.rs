//! The Endpoint Facade: one operation per WeChat Pay API, plus the
//! non-HTTP helpers (`miniapp_pay_form`, `verify`, `decrypt`,
//! `handle_refund_notification`).

use crate::certificates::{self, CertificateRecord};
use crate::config::{Config, ConfigSettings, ConfigStore};
use crate::decryptor::EncryptedResource;
use crate::error::Result;
use crate::refresher::CertificateRefresher;
use std::sync::Arc;
use std::time::Duration;

/// A WeChat Pay APIv3 client. Cheap to clone — internally an `Arc` around
/// the Config Store and, once started, the Certificate Refresher handle.
/// Multiple independent clients may coexist in one process; there is no
/// global registry.
#[derive(Clone)]
pub struct WechatPayClient {
    pub(crate) store: Arc<ConfigStore>,
    pub(crate) refresher: Option<CertificateRefresher>,
}

impl WechatPayClient {
    pub fn builder(settings: ConfigSettings) -> Result<WechatPayClientBuilder> {
        let config = crate::config::validate(settings)?;
        Ok(WechatPayClientBuilder {
            config,
            auto_refresh: None,
        })
    }

    /// The current configuration snapshot.
    pub fn config(&self) -> Arc<Config> {
        self.store.load()
    }

    /// Replaces the whole configuration.
    pub fn replace_config(&self, settings: ConfigSettings) -> Result<()> {
        self.store.replace(settings)
    }

    /// Merges a partial configuration update.
    pub fn update_config(&self, patch: crate::config::ConfigPatch) -> Result<()> {
        self.store.update(patch)
    }

    /// Fetches `/v3/certificates`, decrypts each entry, and replaces the
    /// Certificate Store. `verify` should be `false` only for the very
    /// first bootstrap call while the store is still empty.
    pub async fn get_certificates(&self, verify: bool) -> Result<Vec<CertificateRecord>> {
        let config = self.store.load();
        let records = certificates::get_certificates(&config, verify).await?;
        let pairs = records
            .iter()
            .filter_map(|r| r.public_key.clone().map(|k| (r.serial_no.clone(), k)))
            .collect();
        self.store.update_certificates(pairs);
        Ok(records)
    }

    /// Starts the background Certificate Refresher on the given interval.
    /// Idempotent to call again with a new interval — it reschedules rather
    /// than spawning a second task.
    pub fn enable_certificate_refresh(&mut self, interval: Duration) -> &CertificateRefresher {
        let refresher = self
            .refresher
            .get_or_insert_with(|| CertificateRefresher::spawn(self.store.clone()));
        refresher.enable(interval);
        refresher
    }

    pub fn disable_certificate_refresh(&self) {
        if let Some(r) = &self.refresher {
            r.disable();
        }
    }

    /// Direct exposure of the Verifier, for callers that need to check a
    /// signature without going through `handle_refund_notification`.
    pub fn verify(&self, headers: &[(String, String)], body: &[u8]) -> bool {
        let config = self.store.load();
        crate::verifier::verify(&config, headers, body)
    }

    /// Direct exposure of the Resource Decryptor, for callers handling an
    /// encrypted resource outside the standard webhook flow.
    pub fn decrypt(&self, resource: &EncryptedResource) -> Result<Vec<u8>> {
        let config = self.store.load();
        crate::decryptor::decrypt(config.apiv3_key.as_bytes(), resource)
    }
}

pub struct WechatPayClientBuilder {
    config: Config,
    auto_refresh: Option<Duration>,
}

impl WechatPayClientBuilder {
    /// Starts the Certificate Refresher immediately on build, at the given
    /// interval. Callers are still expected to seed `platform_certs` or call
    /// `get_certificates(false)` once before serving traffic if the store
    /// starts empty.
    pub fn auto_refresh_certificates(mut self, interval: Duration) -> Self {
        self.auto_refresh = Some(interval);
        self
    }

    pub fn build(self) -> WechatPayClient {
        let store = Arc::new(ConfigStore::new(self.config));
        let refresher = self.auto_refresh.map(|interval| {
            let r = CertificateRefresher::spawn(store.clone());
            r.enable(interval);
            r
        });
        WechatPayClient { store, refresher }
    }
}
