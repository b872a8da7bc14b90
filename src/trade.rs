//! Order creation (Native / JSAPI / H5), order query, and order close.

use crate::client::WechatPayClient;
use crate::pipeline::{self, Prefill};
use crate::transport::Method;
use crate::util::option_datetime_fmt;
use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;

impl WechatPayClient {
    /// Native (scannable QR) order creation. Returns the `code_url` used to
    /// render the payment QR code.
    pub async fn create_native(&self, params: &NativeCreateTradeParams) -> crate::error::Result<String> {
        let config = self.config();
        let res: NativeCreateTradeResponse = pipeline::execute(
            &config,
            Method::Post,
            "/v3/pay/transactions/native",
            vec![],
            Some(
                serde_json::to_value(params)
                    .map_err(|e| crate::error::WechatPayError::DecodeFail(e.to_string()))?,
            ),
            Prefill::CREATE_TRANSACTION,
        )
        .await?;
        Ok(res.code_url)
    }

    /// JSAPI (in-app / official account) order creation. Returns `prepay_id`.
    pub async fn create_jsapi(&self, params: &JsApiCreateTradeParams) -> crate::error::Result<String> {
        let config = self.config();
        let res: JsApiCreateTradeResponse = pipeline::execute(
            &config,
            Method::Post,
            "/v3/pay/transactions/jsapi",
            vec![],
            Some(
                serde_json::to_value(params)
                    .map_err(|e| crate::error::WechatPayError::DecodeFail(e.to_string()))?,
            ),
            Prefill::CREATE_TRANSACTION,
        )
        .await?;
        Ok(res.prepay_id)
    }

    /// H5 (mobile web) order creation. Returns `h5_url`.
    pub async fn create_h5(&self, params: &H5CreateTradeParams) -> crate::error::Result<String> {
        let config = self.config();
        let res: H5CreateTradeResponse = pipeline::execute(
            &config,
            Method::Post,
            "/v3/pay/transactions/h5",
            vec![],
            Some(
                serde_json::to_value(params)
                    .map_err(|e| crate::error::WechatPayError::DecodeFail(e.to_string()))?,
            ),
            Prefill::CREATE_TRANSACTION,
        )
        .await?;
        Ok(res.h5_url)
    }

    /// Queries an order by WeChat Pay's own transaction id.
    pub async fn query_trade_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> crate::error::Result<TradeQueryResponse> {
        let config = self.config();
        pipeline::execute(
            &config,
            Method::Get,
            &format!("/v3/pay/transactions/id/{transaction_id}"),
            vec![("mchid".to_string(), config.mch_id.clone())],
            None,
            Prefill::NONE,
        )
        .await
    }

    /// Queries an order by the merchant's own order number.
    pub async fn query_trade_by_out_trade_no(
        &self,
        out_trade_no: &str,
    ) -> crate::error::Result<TradeQueryResponse> {
        let config = self.config();
        pipeline::execute(
            &config,
            Method::Get,
            &format!("/v3/pay/transactions/out-trade-no/{out_trade_no}"),
            vec![("mchid".to_string(), config.mch_id.clone())],
            None,
            Prefill::NONE,
        )
        .await
    }

    /// Closes an unpaid order. Body is exactly `{"mchid":"…"}`; any 2xx
    /// verifying response (typically empty) is success.
    pub async fn close_trade(&self, out_trade_no: &str) -> crate::error::Result<()> {
        let config = self.config();
        pipeline::execute_unit(
            &config,
            Method::Post,
            &format!("/v3/pay/transactions/out-trade-no/{out_trade_no}/close"),
            vec![],
            Some(json!({ "mchid": config.mch_id })),
            Prefill::NONE,
        )
        .await
    }
}

/// Order amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Amount {
    /// Total amount in cents/fen.
    pub total: i64,
    /// ISO 4217 currency code. Mainland merchants only support `CNY`.
    pub currency: String,
}

impl Amount {
    pub fn cny(total: i64) -> Amount {
        Amount {
            total,
            currency: "CNY".to_string(),
        }
    }
}

/// Amount as it appears on a paid order's query response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaidAmount {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub payer_total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub payer_currency: Option<String>,
}

/// Payer identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payer {
    pub openid: Option<String>,
}

impl Payer {
    pub fn new(openid: String) -> Payer {
        Payer {
            openid: Some(openid),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTradeGoodsDetail {
    pub merchant_goods_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub wechatpay_goods_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub goods_name: Option<String>,
    pub quantity: i64,
    pub unit_price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTradePromotionDetail {
    pub cost_price: Option<i64>,
    pub invoice_id: Option<String>,
    pub goods_detail: Vec<CreateTradeGoodsDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeGoodsDetail {
    pub goods_id: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub discount_amount: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub goods_remark: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePromotionDetail {
    pub coupon_id: String,
    pub name: Option<String>,
    pub scope: Option<String>,
    #[serde(rename = "type")]
    pub promotion_type: Option<String>,
    pub amount: i64,
    pub stock_id: Option<String>,
    pub wechatpay_contribute: Option<i64>,
    pub merchant_contribute: Option<i64>,
    pub other_contribute: Option<i64>,
    pub currency: Option<String>,
    pub goods_detail: Vec<TradeGoodsDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreInfo {
    pub id: String,
    pub name: String,
    pub area_code: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTradeSceneInfo {
    pub payer_client_ip: String,
    pub device_id: String,
    pub store_info: StoreInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSceneInfo {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleInfo {
    pub profit_sharing: Option<bool>,
}

/// Shared body fields across the three create-transaction channels. The
/// pipeline fills `appid`, `mchid`, and `notify_url` from the configuration
/// snapshot when the caller leaves them absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeCreateTradeParams {
    #[serde(rename = "appid", skip_serializing_if = "Option::is_none", default)]
    pub app_id: Option<String>,
    #[serde(rename = "mchid", skip_serializing_if = "Option::is_none", default)]
    pub mch_id: Option<String>,
    pub description: String,
    pub out_trade_no: String,
    #[serde(with = "option_datetime_fmt", skip_serializing_if = "Option::is_none", default)]
    pub time_expire: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub attach: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notify_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub goods_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub support_fapiao: Option<bool>,
    pub amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<CreateTradePromotionDetail>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub scene_info: Option<CreateTradeSceneInfo>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub settle_info: Option<SettleInfo>,
}

impl NativeCreateTradeParams {
    pub fn new(description: String, out_trade_no: String, amount: Amount) -> Self {
        NativeCreateTradeParams {
            app_id: None,
            mch_id: None,
            description,
            out_trade_no,
            time_expire: None,
            attach: None,
            notify_url: None,
            goods_tag: None,
            support_fapiao: None,
            amount,
            detail: None,
            scene_info: None,
            settle_info: None,
        }
    }
}

/// H5 create-transaction params. Identical shape to Native.
pub type H5CreateTradeParams = NativeCreateTradeParams;

/// JSAPI create-transaction params: same as Native plus a required `payer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsApiCreateTradeParams {
    #[serde(rename = "appid", skip_serializing_if = "Option::is_none", default)]
    pub app_id: Option<String>,
    #[serde(rename = "mchid", skip_serializing_if = "Option::is_none", default)]
    pub mch_id: Option<String>,
    pub description: String,
    pub out_trade_no: String,
    #[serde(with = "option_datetime_fmt", skip_serializing_if = "Option::is_none", default)]
    pub time_expire: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub attach: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notify_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub goods_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub support_fapiao: Option<bool>,
    pub amount: Amount,
    pub payer: Payer,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<CreateTradePromotionDetail>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub scene_info: Option<CreateTradeSceneInfo>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub settle_info: Option<SettleInfo>,
}

impl JsApiCreateTradeParams {
    pub fn new(
        description: String,
        out_trade_no: String,
        amount: Amount,
        payer_openid: String,
    ) -> Self {
        JsApiCreateTradeParams {
            app_id: None,
            mch_id: None,
            description,
            out_trade_no,
            time_expire: None,
            attach: None,
            notify_url: None,
            goods_tag: None,
            support_fapiao: None,
            amount,
            payer: Payer::new(payer_openid),
            detail: None,
            scene_info: None,
            settle_info: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct NativeCreateTradeResponse {
    code_url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct JsApiCreateTradeResponse {
    prepay_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct H5CreateTradeResponse {
    h5_url: String,
}

/// Order query response, shared by both query-by-id operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeQueryResponse {
    #[serde(rename = "appid")]
    pub app_id: String,
    #[serde(rename = "mchid")]
    pub mch_id: String,
    pub out_trade_no: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub trade_type: Option<TradeType>,
    pub trade_state: TradeState,
    pub trade_state_desc: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bank_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub attach: Option<String>,
    #[serde(with = "option_datetime_fmt", skip_serializing_if = "Option::is_none", default)]
    pub success_time: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub payer: Option<Payer>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub amount: Option<PaidAmount>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub scene_info: Option<TradeSceneInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub promotion_detail: Vec<TradePromotionDetail>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeType {
    JsApi,
    Native,
    Mweb,
    Micropay,
    Facepay,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::JsApi => "JSAPI",
            TradeType::Native => "NATIVE",
            TradeType::Mweb => "MWEB",
            TradeType::Micropay => "MICROPAY",
            TradeType::Facepay => "FACEPAY",
        }
    }
}

impl<'de> Deserialize<'de> for TradeType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?.to_ascii_uppercase();
        match s.as_str() {
            "JSAPI" => Ok(TradeType::JsApi),
            "NATIVE" => Ok(TradeType::Native),
            "MWEB" => Ok(TradeType::Mweb),
            "MICROPAY" => Ok(TradeType::Micropay),
            "FACEPAY" => Ok(TradeType::Facepay),
            _ => Err(serde::de::Error::custom(format!("unknown trade type: {s}"))),
        }
    }
}

impl Serialize for TradeType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeState {
    Success,
    Refund,
    NotPay,
    Closed,
    Revoked,
    UserPaying,
    PayError,
}

impl TradeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeState::Success => "SUCCESS",
            TradeState::Refund => "REFUND",
            TradeState::NotPay => "NOTPAY",
            TradeState::Closed => "CLOSED",
            TradeState::Revoked => "REVOKED",
            TradeState::UserPaying => "USERPAYING",
            TradeState::PayError => "PAYERROR",
        }
    }
}

impl<'de> Deserialize<'de> for TradeState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?.to_ascii_uppercase();
        match s.as_str() {
            "SUCCESS" => Ok(TradeState::Success),
            "REFUND" => Ok(TradeState::Refund),
            "NOTPAY" => Ok(TradeState::NotPay),
            "CLOSED" => Ok(TradeState::Closed),
            "REVOKED" => Ok(TradeState::Revoked),
            "USERPAYING" => Ok(TradeState::UserPaying),
            "PAYERROR" => Ok(TradeState::PayError),
            _ => Err(serde::de::Error::custom(format!("unknown trade state: {s}"))),
        }
    }
}

impl Serialize for TradeState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_type_serde_round_trips() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            tt: TradeType,
        }
        let s = serde_json::to_string(&Wrapper { tt: TradeType::JsApi }).unwrap();
        assert_eq!(s, r#"{"tt":"JSAPI"}"#);
        let w: Wrapper = serde_json::from_str(r#"{"tt":"native"}"#).unwrap();
        assert_eq!(w.tt, TradeType::Native);
    }

    #[test]
    fn trade_state_serde_round_trips() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            ts: TradeState,
        }
        let s = serde_json::to_string(&Wrapper { ts: TradeState::Success }).unwrap();
        assert_eq!(s, r#"{"ts":"SUCCESS"}"#);
        let w: Wrapper = serde_json::from_str(r#"{"ts":"notpay"}"#).unwrap();
        assert_eq!(w.ts, TradeState::NotPay);
    }

    #[test]
    fn create_trade_params_omit_absent_optional_fields() {
        let params = NativeCreateTradeParams::new(
            "a coffee".to_string(),
            "OUT1".to_string(),
            Amount::cny(100),
        );
        let value = serde_json::to_value(&params).unwrap();
        assert!(value.get("appid").is_none());
        assert!(value.get("mchid").is_none());
        assert!(value.get("notify_url").is_none());
    }
}
