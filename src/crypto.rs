//! RSA-SHA256 sign/verify, AES-256-GCM AEAD open, and PEM/certificate parsing.
//!
//! This is the leaf layer of the client: every other module either signs,
//! verifies, or decrypts by calling into here. None of these functions retry;
//! a failure here is fatal for the request that triggered it.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::sha2::Sha256;
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier as _};
use rsa::{RsaPrivateKey, RsaPublicKey};
use thiserror::Error;
use x509_cert::der::DecodePem;
use x509_cert::Certificate;

/// Failure of a crypto primitive: a parse error, or a signature/tag mismatch.
/// Callers map this onto the public `WechatPayError` variant appropriate to
/// their context (`ConfigInvalid` for a bad key at startup, `DecryptFail` for
/// an AEAD open, etc) — this type never escapes the crate's public API.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("{0}")]
    Parse(String),
    #[error("{0}")]
    Mismatch(String),
}

type Result<T> = std::result::Result<T, CryptoError>;

/// RSA-PKCS#1 v1.5 signature over SHA-256 of `message`.
pub fn sign(private_key: &RsaPrivateKey, message: &[u8]) -> Result<Vec<u8>> {
    let mut rng = rand::thread_rng();
    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    let signature = signing_key.sign_with_rng(&mut rng, message);
    Ok(signature.to_vec())
}

/// Verifies an RSA-PKCS#1 v1.5 / SHA-256 signature. Never errors: a malformed
/// signature or a mismatch both report `false`.
pub fn verify(public_key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> bool {
    let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
    match Signature::try_from(signature) {
        Ok(sig) => verifying_key.verify(message, &sig).is_ok(),
        Err(_) => false,
    }
}

/// AES-256-GCM open. `ciphertext` is `plaintext || tag` with a 16-byte tag.
pub fn open_aead(key: &[u8], nonce: &[u8], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| CryptoError::Parse(format!("invalid AEAD key: {e}")))?;
    let nonce = Nonce::from_slice(nonce);
    let payload = Payload {
        msg: ciphertext,
        aad,
    };
    cipher
        .decrypt(nonce, payload)
        .map_err(|e| CryptoError::Mismatch(format!("AEAD open failed: {e}")))
}

/// Parses a single PEM-encoded RSA private key. On multi-block input, only
/// the first block is read; additional blocks are ignored. Accepts either
/// PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1 (`BEGIN RSA PRIVATE KEY`) framing,
/// since merchant certificate tooling has issued both over the years.
pub fn parse_private_key(pem: &str) -> Result<RsaPrivateKey> {
    use rsa::pkcs1::DecodeRsaPrivateKey;
    RsaPrivateKey::from_pkcs8_pem(pem).or_else(|pkcs8_err| {
        RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|_| CryptoError::Parse(format!("invalid RSA private key: {pkcs8_err}")))
    })
}

/// Parses a single PEM-encoded X.509 certificate.
pub fn parse_certificate(pem: &str) -> Result<Certificate> {
    Certificate::from_pem(pem.as_bytes())
        .map_err(|e| CryptoError::Parse(format!("invalid certificate: {e}")))
}

/// Parses a DER-encoded PKCS#1 RSA public key, as embedded in an X.509
/// `SubjectPublicKeyInfo`.
pub fn parse_public_key_der(der: &[u8]) -> Result<RsaPublicKey> {
    RsaPublicKey::from_pkcs1_der(der)
        .map_err(|e| CryptoError::Parse(format!("invalid RSA public key: {e}")))
}

/// Extracts the RSA public key carried by a certificate.
pub fn public_key_of(certificate: &Certificate) -> Result<RsaPublicKey> {
    let bytes = certificate
        .tbs_certificate
        .subject_public_key_info
        .subject_public_key
        .raw_bytes();
    parse_public_key_der(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::EncodePrivateKey;

    fn test_key() -> RsaPrivateKey {
        let mut rng = rand::thread_rng();
        RsaPrivateKey::new(&mut rng, 2048).unwrap()
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let key = test_key();
        let public = RsaPublicKey::from(&key);
        let msg = b"1700000001\nMNO\n{}\n";
        let sig = sign(&key, msg).unwrap();
        assert!(verify(&public, msg, &sig));
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let key = test_key();
        let public = RsaPublicKey::from(&key);
        let sig = sign(&key, b"original").unwrap();
        assert!(!verify(&public, b"tampered", &sig));
    }

    #[test]
    fn verify_rejects_malformed_signature() {
        let key = test_key();
        let public = RsaPublicKey::from(&key);
        assert!(!verify(&public, b"msg", b"not-a-signature"));
    }

    #[test]
    fn aead_open_round_trips_and_rejects_tamper() {
        let key = [0u8; 32];
        let nonce = b"000000000000";
        let aad = b"certificate";
        let plaintext = b"hello";

        let cipher = Aes256Gcm::new_from_slice(&key).unwrap();
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .unwrap();

        let opened = open_aead(&key, nonce, aad, &sealed).unwrap();
        assert_eq!(opened, plaintext);

        let mut bad_aad = aad.to_vec();
        bad_aad[0] ^= 0xff;
        assert!(open_aead(&key, nonce, &bad_aad, &sealed).is_err());
    }

    #[test]
    fn parse_private_key_round_trips_pem() {
        let key = test_key();
        let pem = key
            .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
            .unwrap()
            .to_string();
        let parsed = parse_private_key(&pem).unwrap();
        assert_eq!(parsed.to_public_key(), key.to_public_key());
    }
}
