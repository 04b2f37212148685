//! Client configuration loaded from the environment.

use std::time::Duration;

use crate::{Result, StorefrontError};

pub const DEFAULT_TOAST_MS: u64 = 3000;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_CROP_SIZE: u32 = 400;
pub const DEFAULT_OTP_RESEND_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub toast_duration: Duration,
    pub max_upload_bytes: u64,
    pub crop_width: u32,
    pub crop_height: u32,
    pub otp_resend_secs: u64,
    pub http_timeout: Duration,
    /// Sent as `X-CSRF-TOKEN` on every request when set.
    pub csrf_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            toast_duration: Duration::from_millis(DEFAULT_TOAST_MS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            crop_width: DEFAULT_CROP_SIZE,
            crop_height: DEFAULT_CROP_SIZE,
            otp_resend_secs: DEFAULT_OTP_RESEND_SECS,
            http_timeout: Duration::from_secs(30),
            csrf_token: None,
        }
    }
}

impl ClientConfig {
    /// Reads `STOREFRONT_*` variables, after loading a `.env` file if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let d = Self::default();
        let cfg = Self {
            base_url: lookup("STOREFRONT_BASE_URL").unwrap_or(d.base_url).trim_end_matches('/').to_string(),
            toast_duration: Duration::from_millis(parse_or(&lookup, "STOREFRONT_TOAST_MS", DEFAULT_TOAST_MS)?),
            max_upload_bytes: parse_or(&lookup, "STOREFRONT_MAX_UPLOAD_BYTES", d.max_upload_bytes)?,
            crop_width: parse_or(&lookup, "STOREFRONT_CROP_WIDTH", d.crop_width)?,
            crop_height: parse_or(&lookup, "STOREFRONT_CROP_HEIGHT", d.crop_height)?,
            otp_resend_secs: parse_or(&lookup, "STOREFRONT_OTP_RESEND_SECS", d.otp_resend_secs)?,
            http_timeout: Duration::from_secs(parse_or(&lookup, "STOREFRONT_HTTP_TIMEOUT_SECS", 30)?),
            csrf_token: lookup("STOREFRONT_CSRF_TOKEN").filter(|t| !t.trim().is_empty()),
        };
        if cfg.crop_width == 0 || cfg.crop_height == 0 {
            return Err(StorefrontError::Config("crop output size must be non-zero".into()));
        }
        Ok(cfg)
    }
}

fn parse_or<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| StorefrontError::Config(format!("{key} is not a valid number: {raw}"))),
        None => Ok(default),
    }
}
