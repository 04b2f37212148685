//! Page controllers
//!
//! Each flow is linear async code over a [`crate::page::PageContext`]: check
//! input locally, call the server, report through the notifier, then either
//! navigate or hand control back to the user.

pub mod address;
pub mod catalog;
pub mod checkout;
pub mod gateway;
pub mod otp;
pub mod shipping;
pub mod wallet;

use crate::StorefrontError;

pub const NETWORK_ERROR: &str = "Network error. Please check your connection.";

/// Fallback text for `err`: a generic network line when the request never
/// reached the server, otherwise the flow's own wording.
pub(crate) fn fallback_for<'a>(err: &StorefrontError, rejected: &'a str) -> &'a str {
    match err {
        StorefrontError::Transport(_) => NETWORK_ERROR,
        _ => rejected,
    }
}
