//! Error types for shared bankrate values.

use thiserror::Error;

/// A string that is not a usable currency code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid currency code: '{0}' (expected 3-4 ASCII letters)")]
pub struct CurrencyCodeError(pub String);

/// Errors raised while validating query preferences.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreferenceError {
    /// Day offset outside the supported window.
    #[error("Wrong day diff {days}, please specify an integer in range 0-{max}")]
    DaysOutOfRange { days: i64, max: u32 },

    /// Currency argument is neither a code nor "all".
    #[error(transparent)]
    InvalidCurrency(#[from] CurrencyCodeError),
}
