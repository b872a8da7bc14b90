//! Mini-program (JSAPI-style) pay form construction.
//!
//! Unlike every other endpoint, this is pure computation over the current
//! configuration snapshot and a caller-supplied `prepay_id` — no network
//! call, so it cannot fail once the configuration itself is valid.

use crate::client::WechatPayClient;
use crate::signer::generate_nonce;
use base64::prelude::*;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

impl WechatPayClient {
    /// Builds the JS-bridge parameter map a mini-program passes to
    /// `wx.requestPayment`. Keys match the documented call exactly:
    /// `appId`, `timeStamp`, `nonceStr`, `package`, `signType`, `paySign`.
    pub fn miniapp_pay_form(&self, prepay_id: &str) -> BTreeMap<String, String> {
        let config = self.config();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            .to_string();
        let nonce = generate_nonce();
        let package = format!("prepay_id={prepay_id}");

        let to_sign = format!("{}\n{}\n{}\n{}\n", config.app_id, timestamp, nonce, package);
        let signature = crate::crypto::sign(&config.merchant_private_key, to_sign.as_bytes())
            .expect("merchant private key validated at config build time");
        let pay_sign = BASE64_STANDARD.encode(signature);

        let mut form = BTreeMap::new();
        form.insert("appId".to_string(), config.app_id.clone());
        form.insert("timeStamp".to_string(), timestamp);
        form.insert("nonceStr".to_string(), nonce);
        form.insert("package".to_string(), package);
        form.insert("signType".to_string(), "RSA".to_string());
        form.insert("paySign".to_string(), pay_sign);
        form
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{validate, ConfigStore};
    use crate::config::ConfigSettings;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::RsaPrivateKey;
    use std::sync::Arc;

    fn client() -> WechatPayClient {
        let mut rng = rand::thread_rng();
        let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let pem = key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        let cert_pem = include_str!("../tests/fixtures/test_cert.pem").to_string();
        let settings = ConfigSettings::new(
            "wx-app-id",
            "1900000",
            "https://example.com/notify",
            "0".repeat(32),
            "SERIAL1",
            pem,
            cert_pem,
        );
        let config = validate(settings).unwrap();
        WechatPayClient {
            store: Arc::new(ConfigStore::new(config)),
            refresher: None,
        }
    }

    #[test]
    fn pay_form_uses_app_id_key() {
        let client = client();
        let form = client.miniapp_pay_form("wx281e0ccb8");
        assert_eq!(form.get("appId").unwrap(), "wx-app-id");
        assert!(form.get("appid").is_none());
        assert_eq!(form.get("package").unwrap(), "prepay_id=wx281e0ccb8");
        assert_eq!(form.get("signType").unwrap(), "RSA");
        assert!(form.contains_key("paySign"));
        assert!(form.contains_key("nonceStr"));
        assert!(form.contains_key("timeStamp"));
    }

    #[test]
    fn pay_sign_verifies_against_the_merchant_public_key() {
        let client = client();
        let config = client.config();
        let form = client.miniapp_pay_form("wx281e0ccb8");
        let to_sign = format!(
            "{}\n{}\n{}\n{}\n",
            form["appId"], form["timeStamp"], form["nonceStr"], form["package"]
        );
        let signature = BASE64_STANDARD.decode(form["paySign"].as_bytes()).unwrap();
        let public_key = config.merchant_private_key.to_public_key();
        assert!(crate::crypto::verify(&public_key, to_sign.as_bytes(), &signature));
    }
}
