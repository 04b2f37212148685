//! Address step of checkout.
//!
//! The shopper picks a shipping address, optionally carrying a coupon from
//! the cart, and the server answers with where the payment page lives.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::address::AddressBook;
use super::checkout::AppliedCoupon;
use super::fallback_for;
use crate::page::PageContext;
use crate::surface::{lock, Control, ControlGuard};
use crate::{Result, StorefrontError};

pub const PAYMENT_STEP_PATH: &str = "/checkout/payment";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentStepRequest<'a> {
    address_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    coupon_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    coupon_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    coupon_discount_amount: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentStep {
    redirect_url: String,
}

pub struct ShippingStep {
    ctx: Arc<PageContext>,
    book: AddressBook,
    proceed_button: Arc<dyn Control>,
    coupon: Mutex<Option<AppliedCoupon>>,
}

impl ShippingStep {
    pub fn new(ctx: Arc<PageContext>, proceed_button: Arc<dyn Control>) -> Self {
        let book = AddressBook::new(Arc::clone(&ctx));
        Self { ctx, book, proceed_button, coupon: Mutex::new(None) }
    }

    pub fn addresses(&self) -> &AddressBook { &self.book }

    pub fn apply_coupon(&self, coupon: Option<AppliedCoupon>) {
        *lock(&self.coupon) = coupon;
    }

    /// Sends the chosen address and follows the server to the payment page.
    pub async fn proceed_to_payment(&self) -> Result<String> {
        let Some(address) = self.book.selected() else {
            let err = StorefrontError::Invalid("Please select a shipping address".into());
            self.ctx.report(&err, "");
            return Err(err);
        };
        let coupon = lock(&self.coupon).clone();
        let request = PaymentStepRequest {
            address_id: address.to_string(),
            coupon_code: coupon.as_ref().map(|c| c.code.as_str()),
            coupon_id: coupon.as_ref().map(|c| c.id.as_str()),
            coupon_discount_amount: coupon.as_ref().map(|c| c.discount.as_str()),
        };

        let guard = ControlGuard::engage(Arc::clone(&self.proceed_button), "Processing...");
        match self.ctx.api.post_json::<_, PaymentStep>(PAYMENT_STEP_PATH, &request).await {
            Ok(step) => {
                info!(address, to = %step.redirect_url, "moving to payment");
                guard.hold();
                self.ctx.navigator.redirect(&step.redirect_url);
                Ok(step.redirect_url)
            }
            Err(e) => {
                let fallback = if matches!(e, StorefrontError::Api { .. }) {
                    "Payment proceeding failed"
                } else {
                    fallback_for(&e, "Error proceeding to payment")
                };
                self.ctx.report(&e, fallback);
                Err(e)
            }
        }
    }
}
