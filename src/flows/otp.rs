//! Email OTP verification page.

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::Form;
use tracing::info;

use super::fallback_for;
use crate::api::Ack;
use crate::domain::OtpCode;
use crate::page::PageContext;
use crate::surface::{CountdownDisplay, OtpFields};
use crate::{Result, StorefrontError};

pub const VERIFY_PATH: &str = "/auth/signup/otp";
pub const RESEND_PATH: &str = "/auth/signup/otp/resend";
pub const LOGIN_PATH: &str = "/auth/login";
pub const REDIRECT_DELAY: Duration = Duration::from_millis(1500);

const RESEND_TIMER: &str = "otp-resend";
const CODE_INVALID: &str = "INVALID_OTP";
const CODE_EXPIRED: &str = "OTP_EXPIRED";

pub struct OtpVerification {
    ctx: Arc<PageContext>,
    fields: Arc<dyn OtpFields>,
    countdown: Arc<dyn CountdownDisplay>,
    verify_path: String,
}

impl OtpVerification {
    pub fn new(ctx: Arc<PageContext>, fields: Arc<dyn OtpFields>, countdown: Arc<dyn CountdownDisplay>) -> Self {
        Self { ctx, fields, countdown, verify_path: VERIFY_PATH.to_string() }
    }

    /// Posts to the form's own action instead of the signup endpoint.
    pub fn with_action(mut self, path: impl Into<String>) -> Self {
        self.verify_path = path.into();
        self
    }

    /// Page load: the resend link stays hidden until the countdown ends.
    pub fn start(&self) {
        self.restart_countdown();
    }

    pub async fn submit(&self) -> Result<()> {
        let code = match OtpCode::from_digits(&self.fields.values()) {
            Ok(code) => code,
            Err(e) => {
                let err = StorefrontError::Invalid(e.to_string());
                self.ctx.report(&err, "Please enter the OTP");
                self.fields.focus(self.first_empty_field());
                return Err(err);
            }
        };

        let form = Form::new().text("otp", code.to_string());
        match self.ctx.api.post_form::<Ack>(&self.verify_path, form).await {
            Ok(ack) => {
                info!("otp verified");
                self.ctx.notifier.success(ack.message_or("OTP verified successfully!"));
                self.ctx.scope.cancel(RESEND_TIMER);
                self.ctx.redirect_after(REDIRECT_DELAY, LOGIN_PATH);
                Ok(())
            }
            Err(e) if e.code() == Some(CODE_EXPIRED) => {
                self.ctx.report(&e, "OTP has expired. Please request a new one.");
                self.ctx.scope.cancel(RESEND_TIMER);
                self.countdown.finished();
                Err(e)
            }
            Err(e @ StorefrontError::Api { .. }) => {
                let fallback = if e.code() == Some(CODE_INVALID) { "Invalid OTP. Please try again." } else { "Verification failed. Please try again." };
                self.ctx.report(&e, fallback);
                self.fields.clear();
                self.fields.focus(0);
                Err(e)
            }
            Err(e) => {
                self.ctx.report(&e, fallback_for(&e, "Verification failed. Please try again."));
                Err(e)
            }
        }
    }

    pub async fn resend(&self) -> Result<()> {
        match self.ctx.api.post_empty::<Ack>(RESEND_PATH).await {
            Ok(ack) => {
                info!("otp resent");
                self.ctx.notifier.success(ack.message_or("OTP resent successfully!"));
                self.restart_countdown();
                self.fields.clear();
                self.fields.focus(0);
                Ok(())
            }
            Err(e) => {
                self.ctx.report(&e, fallback_for(&e, "Failed to resend OTP. Please try again."));
                Err(e)
            }
        }
    }

    fn restart_countdown(&self) {
        self.ctx.scope.countdown(RESEND_TIMER, self.ctx.config.otp_resend_secs, Arc::clone(&self.countdown));
    }

    fn first_empty_field(&self) -> usize {
        self.fields.values().iter().position(|v| v.trim().is_empty()).unwrap_or(0)
    }
}
