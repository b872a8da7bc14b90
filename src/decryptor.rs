//! The Resource Decryptor: opens AEAD-sealed resources and platform
//! certificate payloads.

use crate::error::{Result, WechatPayError};
use base64::prelude::*;
use serde::{Deserialize, Serialize};

const ALGORITHM: &str = "AEAD_AES_256_GCM";
const TAG_LEN: usize = 16;

/// `{ algorithm, ciphertext, nonce, associated_data }` as delivered by
/// WeChat Pay in responses and webhooks. `ciphertext` is base64 and encodes
/// `plaintext || tag` with a 16-byte tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedResource {
    pub algorithm: String,
    pub ciphertext: String,
    pub nonce: String,
    pub associated_data: String,
}

/// Opens `resource` with the merchant's 32-byte `apiv3_key`.
///
/// A wrong-length key surfaces `ConfigInvalid`, not `DecryptFail` — this is
/// a misconfigured client, not a tampered or malformed message.
pub fn decrypt(apiv3_key: &[u8], resource: &EncryptedResource) -> Result<Vec<u8>> {
    if apiv3_key.len() != 32 {
        return Err(WechatPayError::ConfigInvalid(format!(
            "apiv3_key must be exactly 32 bytes, got {}",
            apiv3_key.len()
        )));
    }

    if resource.algorithm != ALGORITHM {
        return Err(WechatPayError::DecryptFail(format!(
            "unsupported algorithm: {}",
            resource.algorithm
        )));
    }

    let sealed = BASE64_STANDARD
        .decode(resource.ciphertext.as_bytes())
        .map_err(|e| WechatPayError::DecryptFail(format!("invalid base64 ciphertext: {e}")))?;

    if sealed.len() < TAG_LEN {
        return Err(WechatPayError::DecryptFail(
            "ciphertext shorter than AEAD tag".into(),
        ));
    }

    crate::crypto::open_aead(
        apiv3_key,
        resource.nonce.as_bytes(),
        resource.associated_data.as_bytes(),
        &sealed,
    )
    .map_err(|e| WechatPayError::DecryptFail(e.to_string()))
}

/// Convenience wrapper returning the opened resource as a UTF-8 string.
pub fn decrypt_to_string(apiv3_key: &str, resource: &EncryptedResource) -> Result<String> {
    let bytes = decrypt(apiv3_key.as_bytes(), resource)?;
    String::from_utf8(bytes).map_err(|e| WechatPayError::DecryptFail(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_gcm::aead::{Aead, KeyInit, Payload};
    use aes_gcm::{Aes256Gcm, Nonce};

    fn seal(key: &[u8; 32], nonce: &str, aad: &str, plaintext: &str) -> EncryptedResource {
        let cipher = Aes256Gcm::new_from_slice(key).unwrap();
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(nonce.as_bytes()),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: aad.as_bytes(),
                },
            )
            .unwrap();
        EncryptedResource {
            algorithm: ALGORITHM.to_string(),
            ciphertext: BASE64_STANDARD.encode(sealed),
            nonce: nonce.to_string(),
            associated_data: aad.to_string(),
        }
    }

    #[test]
    fn decrypt_round_trips_and_rejects_tampered_aad() {
        let key = [0u8; 32];
        let mut resource = seal(&key, "000000000000", "certificate", "hello");
        let plaintext = decrypt_to_string("\0".repeat(32).as_str(), &resource).unwrap();
        assert_eq!(plaintext, "hello");

        resource.associated_data = "tampered".to_string();
        assert!(decrypt_to_string("\0".repeat(32).as_str(), &resource).is_err());
    }

    #[test]
    fn decrypt_rejects_unsupported_algorithm() {
        let key = [0u8; 32];
        let mut resource = seal(&key, "000000000000", "certificate", "hello");
        resource.algorithm = "AEAD_AES_128_GCM".to_string();
        assert!(decrypt_to_string("\0".repeat(32).as_str(), &resource).is_err());
    }

    #[test]
    fn decrypt_rejects_invalid_base64() {
        let resource = EncryptedResource {
            algorithm: ALGORITHM.to_string(),
            ciphertext: "not base64!!".to_string(),
            nonce: "000000000000".to_string(),
            associated_data: "certificate".to_string(),
        };
        assert!(decrypt_to_string("\0".repeat(32).as_str(), &resource).is_err());
    }

    #[test]
    fn decrypt_rejects_wrong_length_key_as_config_invalid() {
        let key = [0u8; 32];
        let resource = seal(&key, "000000000000", "certificate", "hello");
        let err = decrypt_to_string("short-key", &resource).unwrap_err();
        assert!(matches!(err, WechatPayError::ConfigInvalid(_)));
    }
}
