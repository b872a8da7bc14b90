//! Configuration: a validated, atomically-replaceable snapshot.
//!
//! `Config` is immutable once built. `ConfigStore` is the single source of
//! truth a running client reads from; `Replace`/`Update`/`UpdateCertificates`
//! are the only ways to change what it holds, and each one revalidates before
//! committing so readers never observe a half-updated snapshot.

use crate::cert_store::CertificateStore;
use crate::error::{Result, WechatPayError};
use crate::json::{JsonCodec, SerdeJsonCodec};
use crate::transport::{ReqwestTransport, Transport};
use arc_swap::ArcSwap;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use x509_cert::Certificate;

pub const DEFAULT_SERVICE_HOST: &str = "api.mch.weixin.qq.com";
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// The validated, immutable configuration snapshot a running client reads.
#[derive(Clone)]
pub struct Config {
    pub app_id: String,
    pub mch_id: String,
    pub service_host: String,
    pub notify_url: String,
    pub apiv3_key: String,
    pub merchant_serial: String,
    pub merchant_private_key: RsaPrivateKey,
    pub merchant_certificate: Certificate,
    pub platform_certs: Arc<CertificateStore>,
    pub timeout: Duration,
    pub log_level: tracing::Level,
    pub transport: Arc<dyn Transport>,
    pub json: Arc<dyn JsonCodec>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("app_id", &self.app_id)
            .field("mch_id", &self.mch_id)
            .field("service_host", &self.service_host)
            .field("notify_url", &self.notify_url)
            .field("merchant_serial", &self.merchant_serial)
            .field("apiv3_key", &"...")
            .field("merchant_private_key", &"...")
            .field("platform_certs_count", &self.platform_certs.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Builder-friendly set of raw settings, validated into a [`Config`] by
/// [`validate`]. This is the typed replacement for a loose key-value list.
pub struct ConfigSettings {
    pub app_id: String,
    pub mch_id: String,
    pub service_host: Option<String>,
    pub notify_url: String,
    pub apiv3_key: String,
    pub merchant_serial: String,
    pub merchant_private_key_pem: String,
    pub merchant_certificate_pem: String,
    pub platform_certs: Vec<(String, RsaPublicKey)>,
    pub timeout: Option<Duration>,
    pub log_level: Option<tracing::Level>,
    pub transport: Option<Arc<dyn Transport>>,
    pub json: Option<Arc<dyn JsonCodec>>,
}

impl ConfigSettings {
    pub fn new(
        app_id: impl Into<String>,
        mch_id: impl Into<String>,
        notify_url: impl Into<String>,
        apiv3_key: impl Into<String>,
        merchant_serial: impl Into<String>,
        merchant_private_key_pem: impl Into<String>,
        merchant_certificate_pem: impl Into<String>,
    ) -> Self {
        ConfigSettings {
            app_id: app_id.into(),
            mch_id: mch_id.into(),
            service_host: None,
            notify_url: notify_url.into(),
            apiv3_key: apiv3_key.into(),
            merchant_serial: merchant_serial.into(),
            merchant_private_key_pem: merchant_private_key_pem.into(),
            merchant_certificate_pem: merchant_certificate_pem.into(),
            platform_certs: Vec::new(),
            timeout: None,
            log_level: None,
            transport: None,
            json: None,
        }
    }
}

/// Validates raw settings into an immutable [`Config`] snapshot.
///
/// Checks: `app_id`, `mch_id`, `notify_url`, `merchant_serial`,
/// `merchant_private_key`, `merchant_certificate` must be present and
/// parseable; `merchant_private_key` must successfully sign a probe value;
/// `apiv3_key` may be empty (checked again at first AEAD use) but if
/// non-empty must be exactly 32 bytes; `platform_certs` serials must be
/// unique (enforced by `CertificateStore` itself, a map).
pub fn validate(settings: ConfigSettings) -> Result<Config> {
    if settings.app_id.trim().is_empty() {
        return Err(WechatPayError::ConfigInvalid("app_id is required".into()));
    }
    if settings.mch_id.trim().is_empty() {
        return Err(WechatPayError::ConfigInvalid("mch_id is required".into()));
    }
    if settings.notify_url.trim().is_empty() {
        return Err(WechatPayError::ConfigInvalid(
            "notify_url is required".into(),
        ));
    }
    if settings.merchant_serial.trim().is_empty() {
        return Err(WechatPayError::ConfigInvalid(
            "merchant_serial is required".into(),
        ));
    }
    if !settings.apiv3_key.is_empty() && settings.apiv3_key.len() != 32 {
        return Err(WechatPayError::ConfigInvalid(format!(
            "apiv3_key must be exactly 32 bytes, got {}",
            settings.apiv3_key.len()
        )));
    }

    let private_key = crate::crypto::parse_private_key(&settings.merchant_private_key_pem)
        .map_err(|e| WechatPayError::ConfigInvalid(format!("merchant_private_key: {e}")))?;

    // Validation rule: the private key must successfully sign a probe value.
    crate::crypto::sign(&private_key, b"wechatpay-config-probe")
        .map_err(|e| WechatPayError::ConfigInvalid(format!("merchant_private_key: {e}")))?;

    let certificate = crate::crypto::parse_certificate(&settings.merchant_certificate_pem)
        .map_err(|e| WechatPayError::ConfigInvalid(format!("merchant_certificate: {e}")))?;

    Ok(Config {
        app_id: settings.app_id,
        mch_id: settings.mch_id,
        service_host: settings
            .service_host
            .unwrap_or_else(|| DEFAULT_SERVICE_HOST.to_string()),
        notify_url: settings.notify_url,
        apiv3_key: settings.apiv3_key,
        merchant_serial: settings.merchant_serial,
        merchant_private_key: private_key,
        merchant_certificate: certificate,
        platform_certs: Arc::new(CertificateStore::from_pairs(settings.platform_certs)),
        timeout: settings
            .timeout
            .unwrap_or_else(|| Duration::from_millis(DEFAULT_TIMEOUT_MS)),
        log_level: settings.log_level.unwrap_or(tracing::Level::INFO),
        transport: settings
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new())),
        json: settings.json.unwrap_or_else(|| Arc::new(SerdeJsonCodec)),
    })
}

/// A partial update applied on top of the current snapshot by
/// [`ConfigStore::update`]. Every field is optional; absent fields keep
/// their current value.
#[derive(Default)]
pub struct ConfigPatch {
    pub app_id: Option<String>,
    pub mch_id: Option<String>,
    pub service_host: Option<String>,
    pub notify_url: Option<String>,
    pub apiv3_key: Option<String>,
    pub merchant_serial: Option<String>,
    pub merchant_private_key_pem: Option<String>,
    pub merchant_certificate_pem: Option<String>,
    pub timeout: Option<Duration>,
    pub log_level: Option<tracing::Level>,
}

/// The single source of truth for the validated `Config`.
///
/// Reads (`load`) are lock-free `Arc` loads and always see a complete
/// snapshot. Writes (`replace`/`update`/`update_certificates`) are
/// serialized against each other by `write_lock` but never block readers;
/// each writer installs its new snapshot with one atomic store.
pub struct ConfigStore {
    current: ArcSwap<Config>,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(config: Config) -> Self {
        ConfigStore {
            current: ArcSwap::from_pointee(config),
            write_lock: Mutex::new(()),
        }
    }

    /// A cheap snapshot of the current configuration. Every outbound
    /// operation and every verification call takes exactly one of these and
    /// reuses it for the whole request.
    pub fn load(&self) -> Arc<Config> {
        self.current.load_full()
    }

    /// Replaces the whole configuration. Validated before commit; on
    /// failure the store is left unchanged.
    pub fn replace(&self, settings: ConfigSettings) -> Result<()> {
        let new_config = validate(settings)?;
        let _guard = self.write_lock.lock().unwrap();
        self.current.store(Arc::new(new_config));
        Ok(())
    }

    /// Merges `patch` onto the current snapshot, revalidates, and replaces.
    /// Idempotent: applying the same patch twice yields the same snapshot.
    pub fn update(&self, patch: ConfigPatch) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        let current = self.current.load();

        let private_key = match patch.merchant_private_key_pem {
            Some(pem) => {
                let key = crate::crypto::parse_private_key(&pem).map_err(|e| {
                    WechatPayError::ConfigInvalid(format!("merchant_private_key: {e}"))
                })?;
                crate::crypto::sign(&key, b"wechatpay-config-probe").map_err(|e| {
                    WechatPayError::ConfigInvalid(format!("merchant_private_key: {e}"))
                })?;
                key
            }
            None => current.merchant_private_key.clone(),
        };

        let certificate = match patch.merchant_certificate_pem {
            Some(pem) => crate::crypto::parse_certificate(&pem)
                .map_err(|e| WechatPayError::ConfigInvalid(format!("merchant_certificate: {e}")))?,
            None => current.merchant_certificate.clone(),
        };

        let apiv3_key = patch.apiv3_key.unwrap_or_else(|| current.apiv3_key.clone());
        if !apiv3_key.is_empty() && apiv3_key.len() != 32 {
            return Err(WechatPayError::ConfigInvalid(format!(
                "apiv3_key must be exactly 32 bytes, got {}",
                apiv3_key.len()
            )));
        }

        let app_id = patch.app_id.unwrap_or_else(|| current.app_id.clone());
        let mch_id = patch.mch_id.unwrap_or_else(|| current.mch_id.clone());
        let notify_url = patch
            .notify_url
            .unwrap_or_else(|| current.notify_url.clone());
        let merchant_serial = patch
            .merchant_serial
            .unwrap_or_else(|| current.merchant_serial.clone());

        if app_id.trim().is_empty()
            || mch_id.trim().is_empty()
            || notify_url.trim().is_empty()
            || merchant_serial.trim().is_empty()
        {
            return Err(WechatPayError::ConfigInvalid(
                "app_id, mch_id, notify_url and merchant_serial must not be empty".into(),
            ));
        }

        let new_config = Config {
            app_id,
            mch_id,
            service_host: patch
                .service_host
                .unwrap_or_else(|| current.service_host.clone()),
            notify_url,
            apiv3_key,
            merchant_serial,
            merchant_private_key: private_key,
            merchant_certificate: certificate,
            platform_certs: current.platform_certs.clone(),
            timeout: patch.timeout.unwrap_or(current.timeout),
            log_level: patch.log_level.unwrap_or(current.log_level),
            transport: current.transport.clone(),
            json: current.json.clone(),
        };
        self.current.store(Arc::new(new_config));
        Ok(())
    }

    /// Replaces the platform certificate set wholesale. Called only by the
    /// Certificate Refresher (or an application-triggered manual refresh).
    pub fn update_certificates(&self, pairs: Vec<(String, RsaPublicKey)>) {
        let _guard = self.write_lock.lock().unwrap();
        let current = self.current.load();
        let store = CertificateStore::from_pairs(pairs);
        let new_config = Config {
            app_id: current.app_id.clone(),
            mch_id: current.mch_id.clone(),
            service_host: current.service_host.clone(),
            notify_url: current.notify_url.clone(),
            apiv3_key: current.apiv3_key.clone(),
            merchant_serial: current.merchant_serial.clone(),
            merchant_private_key: current.merchant_private_key.clone(),
            merchant_certificate: current.merchant_certificate.clone(),
            platform_certs: Arc::new(store),
            timeout: current.timeout,
            log_level: current.log_level,
            transport: current.transport.clone(),
            json: current.json.clone(),
        };
        self.current.store(Arc::new(new_config));
    }
}
