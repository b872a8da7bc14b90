//! Inbound webhook handling: refund (and trade) result notifications.

use crate::decryptor::{self, EncryptedResource};
use crate::error::{Result, WechatPayError};
use crate::refund::RefundQueryResponse;
use crate::trade::TradeQueryResponse;
use crate::util::datetime_fmt;
use crate::client::WechatPayClient;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const ENCRYPT_RESOURCE: &str = "encrypt-resource";

/// A webhook event as delivered by WeChat Pay. When `resource_type` is
/// `encrypt-resource`, `resource` carries an [`EncryptedResource`] until
/// [`WechatPayClient::handle_refund_notification`] opens it and substitutes
/// the decrypted JSON object back in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(with = "datetime_fmt")]
    pub create_time: DateTime<Local>,
    pub event_type: String,
    pub resource_type: String,
    pub summary: String,
    pub resource: Value,
}

/// Wire shape of the encrypted resource as WeChat Pay sends it: the four
/// Encrypted Resource fields plus `original_type`, which names what the
/// decrypted payload actually is (`transaction` or `refund`).
#[derive(Debug, Clone, Deserialize)]
struct WireResource {
    algorithm: String,
    ciphertext: String,
    nonce: String,
    associated_data: String,
    #[serde(default)]
    original_type: String,
}

impl Event {
    /// `resource.original_type` as delivered on the wire, once decrypted.
    /// Empty until the resource has been opened.
    pub fn decrypted_as_trade(&self) -> Result<TradeQueryResponse> {
        serde_json::from_value(self.resource.clone())
            .map_err(|e| WechatPayError::DecodeFail(e.to_string()))
    }

    pub fn decrypted_as_refund(&self) -> Result<RefundQueryResponse> {
        serde_json::from_value(self.resource.clone())
            .map_err(|e| WechatPayError::DecodeFail(e.to_string()))
    }
}

impl WechatPayClient {
    /// Verifies, decodes, and opens a refund (or trade) result notification
    /// delivered to the merchant's webhook endpoint. `headers` must include
    /// the four `Wechatpay-*` headers; case is not significant.
    pub fn handle_refund_notification(
        &self,
        headers: &[(String, String)],
        body: &[u8],
    ) -> Result<Event> {
        let config = self.config();

        if !crate::verifier::verify(&config, headers, body) {
            return Err(WechatPayError::VerifyFail(
                "notification failed verification".into(),
            ));
        }

        let value = config.json.decode(body)?;
        let mut event: Event =
            serde_json::from_value(value).map_err(|e| WechatPayError::DecodeFail(e.to_string()))?;

        if event.resource_type == ENCRYPT_RESOURCE {
            let wire: WireResource = serde_json::from_value(event.resource.clone())
                .map_err(|e| WechatPayError::DecodeFail(e.to_string()))?;
            let sealed = EncryptedResource {
                algorithm: wire.algorithm,
                ciphertext: wire.ciphertext,
                nonce: wire.nonce,
                associated_data: wire.associated_data,
            };
            let plaintext = decryptor::decrypt(config.apiv3_key.as_bytes(), &sealed)?;
            let decoded: Value = serde_json::from_slice(&plaintext)
                .map_err(|e| WechatPayError::DecodeFail(e.to_string()))?;
            event.resource = decoded;
        }

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{validate, ConfigSettings};
    use aes_gcm::aead::{Aead, KeyInit, Payload};
    use aes_gcm::{Aes256Gcm, Nonce};
    use base64::prelude::*;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::RsaPrivateKey;

    fn client() -> WechatPayClient {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let pem = key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        let cert_pem = include_str!("../tests/fixtures/test_cert.pem").to_string();
        let settings = ConfigSettings::new(
            "wxapp",
            "1900000",
            "https://example.com/notify",
            "0".repeat(32),
            "SERIAL1",
            pem,
            cert_pem,
        );
        let config = validate(settings).unwrap();
        WechatPayClient {
            store: std::sync::Arc::new(crate::config::ConfigStore::new(config)),
            refresher: None,
        }
    }

    fn seal(key: &str, plaintext: &str) -> (String, String, String) {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).unwrap();
        let nonce = "000000000000";
        let aad = "refund";
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(nonce.as_bytes()),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: aad.as_bytes(),
                },
            )
            .unwrap();
        (BASE64_STANDARD.encode(sealed), nonce.to_string(), aad.to_string())
    }

    #[test]
    fn unverifiable_notification_is_rejected() {
        let client = client();
        let body = br#"{"id":"1","create_time":"2024-01-01T00:00:00+08:00","event_type":"REFUND.SUCCESS","resource_type":"encrypt-resource","summary":"x","resource":{}}"#;
        let err = client.handle_refund_notification(&[], body).unwrap_err();
        assert!(matches!(err, WechatPayError::VerifyFail(_)));
    }

    #[test]
    fn event_rejects_tampered_ciphertext() {
        let (ciphertext, nonce, aad) = seal(&"0".repeat(32), r#"{"out_refund_no":"R1"}"#);
        let mut resource = serde_json::json!({
            "algorithm": "AEAD_AES_256_GCM",
            "ciphertext": ciphertext,
            "nonce": nonce,
            "associated_data": aad,
            "original_type": "refund",
        });
        resource["ciphertext"] = serde_json::Value::String("AAAA".to_string());
        let event = Event {
            id: "1".to_string(),
            create_time: Local::now(),
            event_type: "REFUND.SUCCESS".to_string(),
            resource_type: ENCRYPT_RESOURCE.to_string(),
            summary: "x".to_string(),
            resource,
        };
        let wire: WireResource = serde_json::from_value(event.resource.clone()).unwrap();
        let sealed = EncryptedResource {
            algorithm: wire.algorithm,
            ciphertext: wire.ciphertext,
            nonce: wire.nonce,
            associated_data: wire.associated_data,
        };
        assert!(decryptor::decrypt("0".repeat(32).as_bytes(), &sealed).is_err());
    }
}
