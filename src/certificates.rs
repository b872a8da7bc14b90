//! `GetCertificates`: fetches `/v3/certificates` and decrypts each entry.
//!
//! This endpoint is special-cased rather than routed through the generic
//! Request Pipeline (`pipeline.rs`): during bootstrap, the Certificate Store
//! is still empty, so verification must be skippable for exactly this one
//! call. Both branches — verify enabled and disabled — decrypt and return
//! the certificate list; only the verify-disabled branch skips the Verifier
//! call itself.

use crate::config::Config;
use crate::crypto;
use crate::decryptor::{self, EncryptedResource};
use crate::error::{Result, WechatPayError};
use crate::signer;
use crate::transport::{Method, TransportRequest};
use crate::util::datetime_fmt;
use crate::verifier;
use chrono::{DateTime, Local};
use rsa::RsaPublicKey;
use serde::Deserialize;

pub const PATH: &str = "/v3/certificates";

/// One platform certificate entry, after decryption.
#[derive(Debug, Clone)]
pub struct CertificateRecord {
    pub serial_no: String,
    pub effective_time: DateTime<Local>,
    pub expire_time: DateTime<Local>,
    /// The decrypted certificate, PEM-encoded.
    pub certificate: String,
    pub public_key: Option<RsaPublicKey>,
}

#[derive(Deserialize)]
struct WireRecord {
    serial_no: String,
    #[serde(with = "datetime_fmt")]
    effective_time: DateTime<Local>,
    #[serde(with = "datetime_fmt")]
    expire_time: DateTime<Local>,
    encrypt_certificate: EncryptedResource,
}

#[derive(Deserialize)]
struct WireResponse {
    data: Vec<WireRecord>,
}

/// Fetches and decrypts the platform certificate list. When `verify` is
/// `false` (used only for the first bootstrap call against an empty
/// Certificate Store), the Verifier is not consulted, but decryption and
/// the returned list are exactly the same as the verified path.
pub async fn get_certificates(config: &Config, verify: bool) -> Result<Vec<CertificateRecord>> {
    let envelope = signer::sign(config, Method::Get, PATH, &[], b"")?;

    let headers = vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        ("Accept".to_string(), "application/json".to_string()),
        ("Authorization".to_string(), envelope.authorization),
    ];

    let request = TransportRequest {
        method: Method::Get,
        url: format!("https://{}{}", config.service_host, envelope.canonical_url),
        headers,
        body: Vec::new(),
        timeout: config.timeout,
    };

    let response = config.transport.exchange(request).await?;

    if !response.is_success() {
        return Err(WechatPayError::BadResponse {
            status: response.status,
            body: String::from_utf8_lossy(&response.body).to_string(),
        });
    }

    if verify && !verifier::verify(config, &response.headers, &response.body) {
        return Err(WechatPayError::VerifyFail(
            "certificates response failed verification".into(),
        ));
    }

    let wire: WireResponse = config
        .json
        .decode(&response.body)
        .and_then(|v| serde_json::from_value(v).map_err(|e| WechatPayError::DecodeFail(e.to_string())))?;

    wire.data
        .into_iter()
        .map(|item| {
            let plaintext = decryptor::decrypt(config.apiv3_key.as_bytes(), &item.encrypt_certificate)?;
            let pem = String::from_utf8(plaintext)
                .map_err(|e| WechatPayError::DecryptFail(e.to_string()))?;
            let public_key = crypto::parse_certificate(&pem)
                .ok()
                .and_then(|cert| crypto::public_key_of(&cert).ok());
            Ok(CertificateRecord {
                serial_no: item.serial_no,
                effective_time: item.effective_time,
                expire_time: item.expire_time,
                certificate: pem,
                public_key,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{validate, ConfigSettings};
    use crate::transport::test_support::FakeTransport;
    use crate::transport::TransportResponse;
    use aes_gcm::aead::{Aead, KeyInit, Payload};
    use aes_gcm::{Aes256Gcm, Nonce};
    use base64::prelude::*;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::RsaPrivateKey;
    use std::sync::Arc;

    fn apiv3_key() -> String {
        "0".repeat(32)
    }

    fn seal_cert(key: &str, cert_pem: &str) -> EncryptedResource {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).unwrap();
        let nonce = "000000000000";
        let aad = "certificate";
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(nonce.as_bytes()),
                Payload {
                    msg: cert_pem.as_bytes(),
                    aad: aad.as_bytes(),
                },
            )
            .unwrap();
        EncryptedResource {
            algorithm: "AEAD_AES_256_GCM".to_string(),
            ciphertext: BASE64_STANDARD.encode(sealed),
            nonce: nonce.to_string(),
            associated_data: aad.to_string(),
        }
    }

    #[tokio::test]
    async fn bootstrap_with_verify_disabled_still_decrypts_and_returns() {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let pem = key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        let cert_pem = include_str!("../tests/fixtures/test_cert.pem").to_string();

        let encrypted = seal_cert(&apiv3_key(), &cert_pem);
        let body = serde_json::json!({
            "data": [{
                "serial_no": "S1",
                "effective_time": "2024-01-01T00:00:00+08:00",
                "expire_time": "2029-01-01T00:00:00+08:00",
                "encrypt_certificate": {
                    "algorithm": encrypted.algorithm,
                    "ciphertext": encrypted.ciphertext,
                    "nonce": encrypted.nonce,
                    "associated_data": encrypted.associated_data,
                }
            }]
        });

        let fake = Arc::new(FakeTransport::new(TransportResponse {
            status: 200,
            headers: vec![],
            body: serde_json::to_vec(&body).unwrap(),
        }));

        let mut settings = ConfigSettings::new(
            "wxapp",
            "1900000",
            "https://example.com/notify",
            apiv3_key(),
            "SERIAL1",
            pem,
            cert_pem.clone(),
        );
        settings.transport = Some(fake);
        let config = validate(settings).unwrap();

        let records = get_certificates(&config, false).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].serial_no, "S1");
        assert_eq!(records[0].certificate, cert_pem);
    }

    #[tokio::test]
    async fn verify_enabled_rejects_unverifiable_response() {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let pem = key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        let cert_pem = include_str!("../tests/fixtures/test_cert.pem").to_string();

        let fake = Arc::new(FakeTransport::new(TransportResponse {
            status: 200,
            headers: vec![],
            body: br#"{"data":[]}"#.to_vec(),
        }));

        let mut settings = ConfigSettings::new(
            "wxapp",
            "1900000",
            "https://example.com/notify",
            apiv3_key(),
            "SERIAL1",
            pem,
            cert_pem,
        );
        settings.transport = Some(fake);
        let config = validate(settings).unwrap();

        let err = get_certificates(&config, true).await.unwrap_err();
        assert!(matches!(err, WechatPayError::VerifyFail(_)));
    }
}
