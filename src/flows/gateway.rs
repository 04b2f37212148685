//! Hosted payment popup capability.
//!
//! The popup is opened with an order the server created at the gateway. The
//! signed confirmation it returns is forwarded to the server; the client
//! never judges a signature itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Display name shown in the popup header.
pub const MERCHANT_NAME: &str = "LAPTIX";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefill {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
}

/// What the server returns when it has opened a gateway order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub key_id: String,
    /// Minor units (paise).
    pub amount: u64,
    pub currency: String,
    pub order_id: String,
    #[serde(default)]
    pub prefill: Prefill,
    #[serde(default)]
    pub notes: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfirmation {
    #[serde(rename = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(rename = "razorpay_order_id")]
    pub order_id: String,
    #[serde(rename = "razorpay_signature")]
    pub signature: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    Completed(GatewayConfirmation),
    /// The user closed the popup.
    Dismissed,
    /// The gateway reported a failed attempt.
    Failed { payment_id: Option<String>, order_id: Option<String>, reason: Option<String> },
}

#[async_trait]
pub trait HostedPaymentPopup: Send + Sync {
    /// Opens the popup and resolves when the user pays, closes it, or the
    /// gateway gives up. Retries inside the popup are expected to be off.
    async fn open(&self, order: &GatewayOrder, merchant: &str) -> PaymentOutcome;
}
