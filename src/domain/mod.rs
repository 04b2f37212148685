//! Domain module
pub mod value_objects;

pub use value_objects::{Money, MoneyError, OtpCode, OtpError};
