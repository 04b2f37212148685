//! Checkout payment page.
//!
//! Owns the address choice, the payment method choice and the pay button.
//! Wallet eligibility follows the last balance the server reported; a failed
//! balance check counts as an empty wallet.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::address::{Address, AddressBook};
use super::fallback_for;
use super::gateway::{GatewayOrder, HostedPaymentPopup, PaymentOutcome, MERCHANT_NAME};
use crate::api::Ack;
use crate::domain::Money;
use crate::format::DeliveryEstimate;
use crate::page::PageContext;
use crate::surface::{lock, Control, ControlGuard, DeliveryDisplay};
use crate::{Result, StorefrontError};

pub const BALANCE_PATH: &str = "/checkout/check/wallet/balance";
pub const REDEEM_PATH: &str = "/checkout/redeem/gift/code";
pub const PROCEED_PATH: &str = "/checkout/payment/proceed";
pub const VERIFY_PATH: &str = "/checkout/payment/verify";
pub const FAILED_REPORT_PATH: &str = "/order/failed";
pub const SUCCESS_PAGE: &str = "/order/success";
pub const FAILURE_PAGE: &str = "/payment-failed";
pub const FAILURE_REDIRECT_DELAY: Duration = Duration::from_millis(3000);

const DELIVERY_CLOCK: &str = "delivery-estimate";

// ============================================================================
// Payment methods
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "Razorpay")]
    Gateway,
    #[serde(rename = "COD")]
    Cod,
    Wallet,
}

impl PaymentMethod {
    /// Display order on the page.
    pub const ALL: [PaymentMethod; 3] = [PaymentMethod::Gateway, PaymentMethod::Wallet, PaymentMethod::Cod];

    pub fn unavailable_reason(&self) -> &'static str {
        match self {
            Self::Wallet => "Insufficient wallet balance",
            Self::Cod => "Cash on Delivery is not available for this order",
            Self::Gateway => "This payment option is unavailable",
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct WalletBalance {
    balance: Decimal,
}

/// Coupon already applied on the cart page, echoed back on proceed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppliedCoupon {
    pub id: String,
    pub code: String,
    pub discount: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProceedRequest<'a> {
    payment_method: PaymentMethod,
    address_id: String,
    coupon_code: &'a str,
    coupon_id: &'a str,
    coupon_discount_amount: &'a str,
}

// ============================================================================
// Controller
// ============================================================================

#[derive(Default)]
struct CheckoutState {
    balance: Money,
    method: Option<PaymentMethod>,
    coupon: AppliedCoupon,
}

pub struct Checkout {
    ctx: Arc<PageContext>,
    book: AddressBook,
    popup: Arc<dyn HostedPaymentPopup>,
    pay_button: Arc<dyn Control>,
    total: Money,
    cod_available: bool,
    state: Mutex<CheckoutState>,
}

impl Checkout {
    pub fn new(
        ctx: Arc<PageContext>,
        popup: Arc<dyn HostedPaymentPopup>,
        pay_button: Arc<dyn Control>,
        total: Money,
        cod_available: bool,
    ) -> Self {
        let state = CheckoutState { balance: Money::zero(total.currency()), ..CheckoutState::default() };
        let book = AddressBook::new(Arc::clone(&ctx));
        let checkout = Self { ctx, book, popup, pay_button, total, cod_available, state: Mutex::new(state) };
        checkout.select_first_available();
        checkout
    }

    pub fn total(&self) -> &Money { &self.total }
    pub fn balance(&self) -> Money { lock(&self.state).balance.clone() }
    pub fn selected_method(&self) -> Option<PaymentMethod> { lock(&self.state).method }
    pub fn selected_address(&self) -> Option<u64> { self.book.selected() }
    pub fn addresses(&self) -> Vec<Address> { self.book.addresses() }
    pub fn address_book(&self) -> &AddressBook { &self.book }

    pub fn set_coupon(&self, coupon: AppliedCoupon) {
        lock(&self.state).coupon = coupon;
    }

    pub fn is_available(&self, method: PaymentMethod) -> bool {
        match method {
            PaymentMethod::Gateway => true,
            PaymentMethod::Cod => self.cod_available,
            PaymentMethod::Wallet => lock(&self.state).balance.covers(&self.total),
        }
    }

    /// Selecting a disabled option is refused and leaves the choice as it was.
    pub fn select_method(&self, method: PaymentMethod) -> Result<()> {
        if !self.is_available(method) {
            return Err(StorefrontError::Invalid(method.unavailable_reason().to_string()));
        }
        lock(&self.state).method = Some(method);
        Ok(())
    }

    fn select_first_available(&self) {
        let first = PaymentMethod::ALL.into_iter().find(|m| self.is_available(*m));
        lock(&self.state).method = first;
    }

    pub fn select_address(&self, id: u64) -> bool {
        self.book.select(id)
    }

    /// Loads the saved addresses and selects the default one, else the first.
    pub async fn load_addresses(&self) -> Result<Vec<Address>> {
        self.book.load().await
    }

    /// Refreshes the wallet balance. Any failure is treated as a zero
    /// balance, which also moves the selection off the wallet.
    pub async fn refresh_wallet_balance(&self) -> Money {
        let balance = match self.ctx.api.get_json::<WalletBalance>(BALANCE_PATH).await {
            Ok(b) => Money::new(b.balance, self.total.currency()),
            Err(e) => {
                warn!(error = %e, "wallet balance unavailable");
                Money::zero(self.total.currency())
            }
        };
        lock(&self.state).balance = balance.clone();

        if self.selected_method() == Some(PaymentMethod::Wallet) && !self.is_available(PaymentMethod::Wallet) {
            self.select_first_available();
        }
        balance
    }

    pub async fn redeem_gift_card(&self, code: &str) -> Result<String> {
        let code = code.trim();
        if code.is_empty() {
            let err = StorefrontError::Invalid("Please enter a gift card code".into());
            self.ctx.report(&err, "");
            return Err(err);
        }

        match self.ctx.api.post_json::<_, Ack>(REDEEM_PATH, &json!({ "code": code })).await {
            Ok(ack) => {
                let message = ack.message_or("Gift card applied successfully");
                self.ctx.notifier.success(message.clone());
                self.refresh_wallet_balance().await;
                Ok(message)
            }
            Err(e) => {
                self.ctx.report(&e, fallback_for(&e, "Invalid gift card code"));
                Err(e)
            }
        }
    }

    /// Places the order with the selected method.
    ///
    /// The pay button stays disabled from the request until the page either
    /// navigates away or hands control back to the user.
    pub async fn proceed(&self) -> Result<()> {
        let address = self.book.selected();
        let (method, coupon) = {
            let state = lock(&self.state);
            (state.method, state.coupon.clone())
        };
        let (Some(method), Some(address)) = (method, address) else {
            let err = StorefrontError::Invalid("Missing payment method or address.".into());
            self.ctx.report(&err, "");
            return Err(err);
        };

        let guard = ControlGuard::engage(Arc::clone(&self.pay_button), "Processing...");
        let request = ProceedRequest {
            payment_method: method,
            address_id: address.to_string(),
            coupon_code: &coupon.code,
            coupon_id: &coupon.id,
            coupon_discount_amount: &coupon.discount,
        };
        let body = match self.ctx.api.post_json::<_, serde_json::Value>(PROCEED_PATH, &request).await {
            Ok(body) => body,
            Err(e) => {
                self.ctx.report(&e, fallback_for(&e, "Payment failed."));
                return Err(e);
            }
        };
        info!(?method, address, "order placed");

        match method {
            PaymentMethod::Cod | PaymentMethod::Wallet => {
                guard.hold();
                self.ctx.navigator.redirect(SUCCESS_PAGE);
                Ok(())
            }
            PaymentMethod::Gateway => {
                let order: GatewayOrder = serde_json::from_value(body).map_err(|e| {
                    let err = StorefrontError::from(e);
                    self.ctx.report(&err, "An error occurred while processing the payment.");
                    err
                })?;
                self.pay_with_gateway(&order, guard).await
            }
        }
    }

    async fn pay_with_gateway(&self, order: &GatewayOrder, guard: ControlGuard) -> Result<()> {
        match self.popup.open(order, MERCHANT_NAME).await {
            PaymentOutcome::Completed(confirmation) => {
                match self.ctx.api.post_json::<_, Ack>(VERIFY_PATH, &confirmation).await {
                    Ok(_) => {
                        info!(order_id = %confirmation.order_id, "payment verified");
                        guard.hold();
                        self.ctx.navigator.redirect(SUCCESS_PAGE);
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
            PaymentOutcome::Failed { payment_id, order_id, reason } => {
                warn!(?payment_id, ?order_id, ?reason, "gateway reported failure");
                let report = json!({ "razorpay_payment_id": payment_id, "razorpay_order_id": order_id });
                if let Err(e) = self.ctx.api.post_json::<_, Ack>(FAILED_REPORT_PATH, &report).await {
                    warn!(error = %e, "failed payment not recorded");
                }
                let err = StorefrontError::PaymentFailed;
                self.ctx.report(&err, "");
                guard.hold();
                self.ctx.redirect_after(FAILURE_REDIRECT_DELAY, FAILURE_PAGE);
                Err(err)
            }
        }
    }

    /// Keeps the delivery estimate live, once a second, for the life of the page.
    pub fn start_delivery_clock(&self, display: Arc<dyn DeliveryDisplay>) {
        self.ctx.scope.every(DELIVERY_CLOCK, Duration::from_secs(1), move || display.update(&DeliveryEstimate::now()));
    }
}
