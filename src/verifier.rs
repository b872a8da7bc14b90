//! The Verifier: validates an inbound response or webhook.
//!
//! Note the asymmetry with the Signer (`signer.rs`): the string-to-verify is
//! just `TIMESTAMP "\n" NONCE "\n" BODY "\n"` — no method, no URL. This is
//! intentional and must not be "symmetrized" with the Signer's
//! string-to-sign.

use crate::config::Config;
use crate::crypto;
use base64::prelude::*;

/// Header names the Verifier consults; everything else in a response or
/// webhook is ignored.
pub const HEADER_SERIAL: &str = "Wechatpay-Serial";
pub const HEADER_TIMESTAMP: &str = "Wechatpay-Timestamp";
pub const HEADER_NONCE: &str = "Wechatpay-Nonce";
pub const HEADER_SIGNATURE: &str = "Wechatpay-Signature";

/// Verifies `body` against the four named headers using `config`'s
/// Certificate Store. Never errors — a missing header, an unknown serial, a
/// malformed base64 signature, or an actual mismatch all report `false`, so
/// a caller can decide whether to retry after a certificate refresh.
pub fn verify(config: &Config, headers: &[(String, String)], body: &[u8]) -> bool {
    let get = |name: &str| -> Option<&str> {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    };

    let serial = match get(HEADER_SERIAL) {
        Some(s) => s,
        None => return false,
    };
    let timestamp = match get(HEADER_TIMESTAMP) {
        Some(s) => s,
        None => return false,
    };
    let nonce = match get(HEADER_NONCE) {
        Some(s) => s,
        None => return false,
    };
    let signature_b64 = match get(HEADER_SIGNATURE) {
        Some(s) => s,
        None => return false,
    };

    let public_key = match config.platform_certs.lookup(serial) {
        Some(k) => k,
        None => return false,
    };

    let signature_bytes = match BASE64_STANDARD.decode(signature_b64.as_bytes()) {
        Ok(b) => b,
        Err(_) => return false,
    };

    let string_to_verify = format!(
        "{}\n{}\n{}\n",
        timestamp,
        nonce,
        String::from_utf8_lossy(body)
    );

    crypto::verify(&public_key, string_to_verify.as_bytes(), &signature_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{validate, ConfigSettings};
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::RsaPrivateKey;

    fn config_with_cert(serial: &str, private_key: &RsaPrivateKey) -> Config {
        let pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        let cert_pem = include_str!("../tests/fixtures/test_cert.pem").to_string();
        let mut settings = ConfigSettings::new(
            "wxapp",
            "1900000",
            "https://example.com/notify",
            "",
            "SERIAL1",
            pem,
            cert_pem,
        );
        settings
            .platform_certs
            .push((serial.to_string(), private_key.to_public_key()));
        validate(settings).unwrap()
    }

    fn headers(serial: &str, timestamp: &str, nonce: &str, signature: &str) -> Vec<(String, String)> {
        vec![
            (HEADER_SERIAL.to_string(), serial.to_string()),
            (HEADER_TIMESTAMP.to_string(), timestamp.to_string()),
            (HEADER_NONCE.to_string(), nonce.to_string()),
            (HEADER_SIGNATURE.to_string(), signature.to_string()),
        ]
    }

    fn sign_for(key: &RsaPrivateKey, timestamp: &str, nonce: &str, body: &str) -> String {
        let msg = format!("{timestamp}\n{nonce}\n{body}\n");
        let sig = crypto::sign(key, msg.as_bytes()).unwrap();
        BASE64_STANDARD.encode(sig)
    }

    #[test]
    fn verify_success_then_rejects_any_single_mutation() {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let config = config_with_cert("S1", &key);

        let timestamp = "1700000001";
        let nonce = "MNO";
        let body = "{}";
        let signature = sign_for(&key, timestamp, nonce, body);

        assert!(verify(
            &config,
            &headers("S1", timestamp, nonce, &signature),
            body.as_bytes()
        ));

        assert!(!verify(
            &config,
            &headers("S1", timestamp, nonce, &signature),
            b"{\"mutated\":true}"
        ));
        assert!(!verify(
            &config,
            &headers("S1", "1700000002", nonce, &signature),
            body.as_bytes()
        ));
        assert!(!verify(
            &config,
            &headers("S1", timestamp, "XYZ", &signature),
            body.as_bytes()
        ));
        assert!(!verify(
            &config,
            &headers("S1", timestamp, nonce, "bm90LWEtc2ln"),
            body.as_bytes()
        ));
        assert!(!verify(
            &config,
            &headers("S2", timestamp, nonce, &signature),
            body.as_bytes()
        ));
    }

    #[test]
    fn verify_fails_when_header_missing() {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let config = config_with_cert("S1", &key);
        let partial = vec![(HEADER_SERIAL.to_string(), "S1".to_string())];
        assert!(!verify(&config, &partial, b"{}"));
    }

    #[test]
    fn verify_fails_when_certificate_store_empty() {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let pem = key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        let cert_pem = include_str!("../tests/fixtures/test_cert.pem").to_string();
        let settings = ConfigSettings::new(
            "wxapp",
            "1900000",
            "https://example.com/notify",
            "",
            "SERIAL1",
            pem,
            cert_pem,
        );
        let config = validate(settings).unwrap();
        let signature = sign_for(&key, "1700000001", "MNO", "{}");
        assert!(!verify(
            &config,
            &headers("S1", "1700000001", "MNO", &signature),
            b"{}"
        ));
    }
}
