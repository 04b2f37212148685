//! Profile wallet page: top-ups through the hosted gateway and gift cards.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use validator::{Validate, ValidationError};

use super::fallback_for;
use super::gateway::{GatewayConfirmation, GatewayOrder, HostedPaymentPopup, PaymentOutcome, MERCHANT_NAME};
use crate::api::Ack;
use crate::domain::{Money, MoneyError};
use crate::page::PageContext;
use crate::surface::{Control, ControlGuard};
use crate::{Result, StorefrontError};

pub const TOP_UP_PATH: &str = "/profile/wallet/add/amount";
pub const TOP_UP_VERIFY_PATH: &str = "/profile/wallet/add/amount/verify";
pub const GIFT_CARD_PATH: &str = "/profile/wallet/send/gift/card";
pub const RELOAD_DELAY: Duration = Duration::from_millis(3000);

pub const MIN_TOP_UP: Decimal = Decimal::ONE;
/// Whole rupees.
pub const MIN_GIFT_CARD: i64 = 5;

const GIFT_AMOUNT_MESSAGE: &str = "Please enter an amount of at least ₹5";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TopUpRequest<'a> {
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    payment_method: &'a str,
}

#[derive(Debug, Serialize)]
struct TopUpVerification<'a> {
    #[serde(flatten)]
    confirmation: &'a GatewayConfirmation,
    amount: u64,
}

/// Gift card form as submitted. Fields are trimmed before validation.
#[derive(Clone, Debug, Default, Serialize, Validate)]
pub struct GiftCard {
    #[validate(length(min = 1, message = "Please enter recipient name"))]
    pub recipient_name: String,
    #[validate(email(message = "Please enter a valid email"))]
    pub recipient_email: String,
    #[serde(with = "rust_decimal::serde::float")]
    #[validate(custom = "gift_amount")]
    pub amount: Decimal,
    pub message: String,
}

fn gift_amount(amount: &Decimal) -> std::result::Result<(), ValidationError> {
    if *amount >= Decimal::from(MIN_GIFT_CARD) {
        return Ok(());
    }
    let mut err = ValidationError::new("min_amount");
    err.message = Some(Cow::Borrowed(GIFT_AMOUNT_MESSAGE));
    Err(err)
}

impl GiftCard {
    /// Builds the form from raw inputs. An amount that does not parse is
    /// kept as zero so validation reports it like any amount under the minimum.
    pub fn from_inputs(name: &str, email: &str, amount: &str, message: &str) -> Self {
        Self {
            recipient_name: name.trim().to_string(),
            recipient_email: email.trim().to_string(),
            amount: Money::parse_input(amount, "INR").map(|m| m.amount()).unwrap_or(Decimal::ZERO),
            message: message.trim().to_string(),
        }
    }

    /// First failing rule in form order.
    fn check(&self) -> std::result::Result<(), String> {
        let Err(errors) = self.validate() else { return Ok(()) };
        let fields = errors.field_errors();
        for field in ["recipient_name", "recipient_email", "amount"] {
            if let Some(first) = fields.get(field).and_then(|errs| errs.first()) {
                return Err(first.message.as_deref().unwrap_or("Invalid input").to_string());
            }
        }
        Err(errors.to_string())
    }
}

pub struct Wallet {
    ctx: Arc<PageContext>,
    popup: Arc<dyn HostedPaymentPopup>,
    add_button: Arc<dyn Control>,
    gift_button: Arc<dyn Control>,
}

impl Wallet {
    pub fn new(ctx: Arc<PageContext>, popup: Arc<dyn HostedPaymentPopup>, add_button: Arc<dyn Control>, gift_button: Arc<dyn Control>) -> Self {
        Self { ctx, popup, add_button, gift_button }
    }

    /// Tops the wallet up by `raw_amount` via the hosted gateway. The page
    /// reloads a few seconds after the payment is verified.
    pub async fn add_money(&self, raw_amount: &str, payment_method: &str) -> Result<()> {
        let amount = match parse_top_up(raw_amount) {
            Ok(amount) => amount,
            Err(_) => {
                let err = StorefrontError::Invalid("Please select or enter a valid amount".into());
                self.ctx.report(&err, "");
                return Err(err);
            }
        };

        let guard = ControlGuard::engage(Arc::clone(&self.add_button), "Processing...");
        let request = TopUpRequest { amount: amount.amount(), payment_method };
        let order = match self.ctx.api.post_json::<_, GatewayOrder>(TOP_UP_PATH, &request).await {
            Ok(order) => order,
            Err(e) => {
                self.ctx.report(&e, fallback_for(&e, "Failed to add money. Please try again."));
                return Err(e);
            }
        };
        self.ctx.notifier.success("Payment initiated successfully!");
        info!(order_id = %order.order_id, amount = %amount, "top-up started");

        match self.popup.open(&order, MERCHANT_NAME).await {
            PaymentOutcome::Completed(confirmation) => {
                let body = TopUpVerification { confirmation: &confirmation, amount: order.amount };
                match self.ctx.api.post_json::<_, Ack>(TOP_UP_VERIFY_PATH, &body).await {
                    Ok(_) => {
                        self.ctx.notifier.success("Amount Added Successfully");
                        guard.hold();
                        self.ctx.reload_after(RELOAD_DELAY);
                        Ok(())
                    }
                    Err(e) => {
                        self.ctx.report(&e, fallback_for(&e, "Payment verification failed."));
                        Err(e)
                    }
                }
            }
            PaymentOutcome::Dismissed => {
                let err = StorefrontError::PaymentCancelled;
                self.ctx.report(&err, "");
                Err(err)
            }
            PaymentOutcome::Failed { payment_id, reason, .. } => {
                warn!(?payment_id, ?reason, "top-up payment failed");
                let err = StorefrontError::PaymentFailed;
                self.ctx.report(&err, "");
                Err(err)
            }
        }
    }

    pub async fn send_gift_card(&self, card: &GiftCard) -> Result<String> {
        if let Err(message) = card.check() {
            let err = StorefrontError::Invalid(message);
            self.ctx.report(&err, "");
            return Err(err);
        }

        let _guard = ControlGuard::engage(Arc::clone(&self.gift_button), "Sending...");
        match self.ctx.api.post_json::<_, Ack>(GIFT_CARD_PATH, card).await {
            Ok(ack) => {
                let message = ack.message_or("Gift card sent successfully!");
                info!(recipient = %card.recipient_email, amount = %card.amount, "gift card sent");
                self.ctx.notifier.success(message.clone());
                self.ctx.reload_after(RELOAD_DELAY);
                Ok(message)
            }
            Err(e) => {
                self.ctx.report(&e, fallback_for(&e, "Failed to send gift card"));
                Err(e)
            }
        }
    }
}

fn parse_top_up(raw: &str) -> std::result::Result<Money, MoneyError> {
    let money = Money::parse_input(raw, "INR")?;
    money.at_least(MIN_TOP_UP)?;
    Ok(money)
}
