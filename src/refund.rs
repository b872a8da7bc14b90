//! Refund creation and refund query.

use crate::client::WechatPayClient;
use crate::pipeline::{self, Prefill};
use crate::transport::Method;
use crate::util::datetime_fmt;
use crate::util::option_datetime_fmt;
use chrono::{DateTime, Local};
use serde::Deserializer;
use serde::{Deserialize, Serialize};

impl WechatPayClient {
    /// Creates a refund. `notify_url` is filled from the configuration
    /// snapshot when the caller leaves it absent.
    pub async fn create_refund(&self, params: &RefundParams) -> crate::error::Result<RefundQueryResponse> {
        let config = self.config();
        pipeline::execute(
            &config,
            Method::Post,
            "/v3/refund/domestic/refunds",
            vec![],
            Some(
                serde_json::to_value(params)
                    .map_err(|e| crate::error::WechatPayError::DecodeFail(e.to_string()))?,
            ),
            Prefill::CREATE_REFUND,
        )
        .await
    }

    /// Queries a refund by the merchant's own refund number.
    pub async fn query_refund(&self, out_refund_no: &str) -> crate::error::Result<RefundQueryResponse> {
        let config = self.config();
        pipeline::execute(
            &config,
            Method::Get,
            &format!("/v3/refund/domestic/refunds/{out_refund_no}"),
            vec![],
            None,
            Prefill::NONE,
        )
        .await
    }
}

/// Refund creation params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundParams {
    #[serde(flatten)]
    pub trade_id: TradeId,
    pub out_refund_no: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notify_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub funds_account: Option<String>,
    pub amount: RefundApplyingAmount,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub goods_detail: Vec<RefundGoodsDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TradeId {
    #[serde(rename = "transaction_id")]
    TransactionId(String),
    #[serde(rename = "out_trade_no")]
    OutTradeNo(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundApplyingAmount {
    pub total: i64,
    pub refund: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub from: Vec<RefundFromAccount>,
}

impl RefundApplyingAmount {
    pub fn cny(total: i64, refund: i64) -> RefundApplyingAmount {
        RefundApplyingAmount {
            total,
            refund,
            currency: "CNY".to_string(),
            from: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundFromAccount {
    pub account: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundGoodsDetail {
    pub merchant_goods_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub wechatpay_goods_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub goods_name: Option<String>,
    pub unit_price: i64,
    pub refund_amount: i64,
    pub refund_quantity: i64,
}

/// Returned by both `create_refund` and `query_refund`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundQueryResponse {
    pub refund_id: String,
    pub out_refund_no: String,
    pub transaction_id: String,
    pub out_trade_no: String,
    pub channel: String,
    pub user_received_account: String,
    #[serde(with = "option_datetime_fmt", skip_serializing_if = "Option::is_none", default)]
    pub success_time: Option<DateTime<Local>>,
    #[serde(with = "datetime_fmt", default)]
    pub create_time: DateTime<Local>,
    pub status: RefundStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub funds_account: Option<String>,
    pub amount: RefundActualAmount,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub promotion_detail: Vec<RefundPromotionDetail>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundStatus {
    Success,
    Closed,
    Processing,
    Abnormal,
}

impl<'de> Deserialize<'de> for RefundStatus {
    fn deserialize<D>(deserializer: D) -> Result<RefundStatus, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?.to_ascii_uppercase();
        match s.as_str() {
            "SUCCESS" => Ok(RefundStatus::Success),
            "CLOSED" => Ok(RefundStatus::Closed),
            "PROCESSING" => Ok(RefundStatus::Processing),
            "ABNORMAL" => Ok(RefundStatus::Abnormal),
            _ => Err(serde::de::Error::custom(format!("unknown refund status: {s}"))),
        }
    }
}

impl Serialize for RefundStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            RefundStatus::Success => "SUCCESS",
            RefundStatus::Closed => "CLOSED",
            RefundStatus::Processing => "PROCESSING",
            RefundStatus::Abnormal => "ABNORMAL",
        };
        serializer.serialize_str(s)
    }
}

/// `refund` is the amount requested in `RefundParams.amount.refund`;
/// `payer_refund` is what the payer actually receives back, which can
/// differ when the original order was paid partly with a coupon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundActualAmount {
    pub total: i64,
    pub refund: i64,
    pub payer_total: i64,
    pub payer_refund: i64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub from: Vec<RefundFromAccount>,
    pub settlement_total: i64,
    pub settlement_refund: i64,
    pub discount_refund: i64,
    pub currency: String,
    pub refund_fee: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundPromotionDetail {
    pub coupon_id: String,
    pub scope: Option<String>,
    #[serde(rename = "type")]
    pub promotion_type: Option<String>,
    pub amount: i64,
    pub refund_amount: i64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub goods_detail: Vec<RefundGoodsDetail>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refund_status_serde_round_trips() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            s: RefundStatus,
        }
        let s = serde_json::to_string(&Wrapper { s: RefundStatus::Success }).unwrap();
        assert_eq!(s, r#"{"s":"SUCCESS"}"#);
        let w: Wrapper = serde_json::from_str(r#"{"s":"abnormal"}"#).unwrap();
        assert_eq!(w.s, RefundStatus::Abnormal);
    }

    #[test]
    fn trade_id_flattens_to_single_field() {
        let params = RefundParams {
            trade_id: TradeId::OutTradeNo("OUT1".to_string()),
            out_refund_no: "REF1".to_string(),
            reason: None,
            notify_url: None,
            funds_account: None,
            amount: RefundApplyingAmount::cny(100, 50),
            goods_detail: Vec::new(),
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["out_trade_no"], "OUT1");
        assert!(value.get("transaction_id").is_none());
    }
}
