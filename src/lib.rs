//! Storefront client core
//!
//! Headless interaction layer for a server-rendered storefront and admin
//! console. Page capabilities (toast region, previews, inputs, navigation,
//! hosted payment popup) are traits in [`surface`]; everything else is plain
//! async Rust driven from a [`page::PageContext`].
//!
//! ## Features
//! - Toast notifications with replace-and-restart dismissal
//! - Image upload slots with validation, previews and fixed-ratio cropping
//! - OTP entry with a resend countdown
//! - Checkout payment and wallet flows over a hosted payment popup
//! - Date formatting for server timestamps

pub mod api;
pub mod config;
pub mod domain;
pub mod flows;
pub mod format;
pub mod notify;
pub mod page;
pub mod scope;
pub mod surface;
pub mod telemetry;
pub mod upload;

pub use config::ClientConfig;
pub use notify::{Notifier, Severity, ToastRequest};
pub use page::PageContext;
pub use upload::{Coordinator, Rejection, ValidationOutcome};

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("{0}")]
    Invalid(String),

    #[error("request failed with status {status}")]
    Api {
        status: u16,
        code: Option<String>,
        message: Option<String>,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("a crop session is already active")]
    CropInProgress,

    #[error("crop session is no longer active")]
    StaleCropSession,

    #[error("payment cancelled")]
    PaymentCancelled,

    #[error("payment failed")]
    PaymentFailed,

    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse grouping used when deciding how a failure is surfaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Network,
    Payment,
    Internal,
}

impl StorefrontError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Rejected(_) | Self::Invalid(_) | Self::CropInProgress | Self::StaleCropSession => ErrorKind::Validation,
            Self::Api { .. } | Self::Transport(_) | Self::Decode(_) => ErrorKind::Network,
            Self::PaymentCancelled | Self::PaymentFailed => ErrorKind::Payment,
            Self::Image(_) | Self::Task(_) | Self::Config(_) => ErrorKind::Internal,
        }
    }

    /// Server code from an error body, e.g. `INVALID_OTP`.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Text to show the user. Server-provided messages and local validation
    /// messages win; transport and internal failures fall back.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Api { message: Some(m), .. } if !m.trim().is_empty() => m.clone(),
            Self::Rejected(r) => r.to_string(),
            Self::Invalid(m) => m.clone(),
            Self::PaymentCancelled => "Payment cancelled".to_string(),
            Self::PaymentFailed => "Payment Failed".to_string(),
            _ => fallback.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_message_wins_over_fallback() {
        let err = StorefrontError::Api { status: 400, code: None, message: Some("Invalid OTP".into()) };
        assert_eq!(err.user_message("Verification failed"), "Invalid OTP");
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[test]
    fn blank_api_message_uses_fallback() {
        let err = StorefrontError::Api { status: 500, code: Some("X".into()), message: Some("  ".into()) };
        assert_eq!(err.user_message("Something went wrong"), "Something went wrong");
        assert_eq!(err.code(), Some("X"));
    }
}
