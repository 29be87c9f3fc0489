//! Rate engine error types.

use bankrate_common::CurrencyCodeError;
use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur in the rate engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No registered bank matches the requested name.
    #[error("Unknown bank: {0}")]
    ParserLookup(String),

    /// Currency is not published by the bank.
    #[error("Incorrect currency '{currency}' for {bank}, allowed values: {allowed}")]
    UnsupportedCurrency {
        bank: String,
        currency: String,
        allowed: String,
    },

    /// Requested date predates what the source can serve.
    #[error("Date {date} is too old for {bank}, minimal date is {minimal}")]
    DateOutOfRange {
        bank: String,
        date: NaiveDate,
        minimal: NaiveDate,
    },

    /// The bank's source could not be reached or read.
    #[error("Source {bank} unavailable: {source}")]
    SourceUnavailable {
        bank: String,
        #[source]
        source: FetchError,
    },

    /// Day offset beyond the supported history.
    #[error("Days ago must be between 0 and {max}, got {days}")]
    DaysOutOfRange { days: u32, max: u32 },

    /// Every bank came back empty for a best-rate query.
    #[error("No quotes available for {0}")]
    NoQuotesAvailable(String),

    /// Two parsers share a name or short name.
    #[error("Parser already registered: {0}")]
    DuplicateParser(String),

    /// Malformed currency argument.
    #[error(transparent)]
    InvalidCurrency(#[from] CurrencyCodeError),

    /// Invalid engine or sampler configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl EngineError {
    /// Check if this error was caused by the caller's input.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            EngineError::ParserLookup(_)
                | EngineError::UnsupportedCurrency { .. }
                | EngineError::DateOutOfRange { .. }
                | EngineError::DaysOutOfRange { .. }
                | EngineError::InvalidCurrency(_)
        )
    }

    /// Stable code for front-end rendering.
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::ParserLookup(_) => "PARSER_LOOKUP",
            EngineError::UnsupportedCurrency { .. } => "UNSUPPORTED_CURRENCY",
            EngineError::DateOutOfRange { .. } => "DATE_OUT_OF_RANGE",
            EngineError::DaysOutOfRange { .. } => "DAYS_OUT_OF_RANGE",
            EngineError::SourceUnavailable { .. } => "SOURCE_UNAVAILABLE",
            EngineError::NoQuotesAvailable(_) => "NO_QUOTES_AVAILABLE",
            EngineError::DuplicateParser(_) => "DUPLICATE_PARSER",
            EngineError::InvalidCurrency(_) => "INVALID_CURRENCY",
            EngineError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Failure reported by a bank source fetcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out: {0}")]
    Timeout(String),

    /// The page arrived but has no recognizable rate table.
    #[error("malformed page: {0}")]
    Malformed(String),
}

/// Failure reported by a cache store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Cache store unavailable: {0}")]
    Unavailable(String),
}

/// One record of a page that could not be normalized.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("row {row}: {reason}")]
pub struct RowParseError {
    pub row: usize,
    pub reason: String,
}
