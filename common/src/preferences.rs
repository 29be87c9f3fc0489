//! Per-request query preferences.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::currency::CurrencyCode;
use crate::error::PreferenceError;
use crate::time::{constants, date_from_offset};

/// Which currencies a query asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrencySelection {
    /// Every currency the bank publishes.
    All,
    /// One currency.
    One(CurrencyCode),
}

impl CurrencySelection {
    /// Parse a user argument: "all" (any case) or a currency code.
    pub fn parse(arg: &str) -> Result<Self, PreferenceError> {
        if arg.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        Ok(Self::One(CurrencyCode::parse(arg)?))
    }

    /// Pick the selected code, or `fallback` for `All`.
    pub fn or(&self, fallback: CurrencyCode) -> CurrencyCode {
        match self {
            Self::All => fallback,
            Self::One(code) => code.clone(),
        }
    }
}

/// Validated parameters for one front-end request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPreferences {
    pub days_ago: u32,
    pub currency: CurrencySelection,
    pub bank_name: Option<String>,
}

impl Default for QueryPreferences {
    fn default() -> Self {
        Self {
            days_ago: 0,
            currency: CurrencySelection::All,
            bank_name: None,
        }
    }
}

impl QueryPreferences {
    /// Build preferences, rejecting offsets outside `0..=MAX_DAYS_AGO`.
    pub fn new(days_ago: i64, currency: &str, bank_name: Option<&str>) -> Result<Self, PreferenceError> {
        let days_ago = u32::try_from(days_ago)
            .ok()
            .filter(|d| *d <= constants::MAX_DAYS_AGO)
            .ok_or(PreferenceError::DaysOutOfRange {
                days: days_ago,
                max: constants::MAX_DAYS_AGO,
            })?;

        Ok(Self {
            days_ago,
            currency: CurrencySelection::parse(currency)?,
            bank_name: bank_name
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(str::to_string),
        })
    }

    /// Bank requested explicitly, or the given default.
    pub fn bank_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.bank_name.as_deref().unwrap_or(default)
    }

    /// Calendar date this query refers to.
    pub fn query_date(&self, today: NaiveDate) -> NaiveDate {
        date_from_offset(today, self.days_ago)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let prefs = QueryPreferences::default();
        assert_eq!(prefs.days_ago, 0);
        assert_eq!(prefs.currency, CurrencySelection::All);
        assert_eq!(prefs.bank_or("bgp"), "bgp");
    }

    #[test]
    fn test_days_range_enforced() {
        assert!(QueryPreferences::new(2400, "usd", None).is_ok());
        assert!(matches!(
            QueryPreferences::new(2401, "usd", None),
            Err(PreferenceError::DaysOutOfRange { days: 2401, .. })
        ));
        assert!(QueryPreferences::new(-1, "usd", None).is_err());
    }

    #[test]
    fn test_currency_selection() {
        let prefs = QueryPreferences::new(3, "ALL", Some("nbrb")).unwrap();
        assert_eq!(prefs.currency, CurrencySelection::All);
        assert_eq!(prefs.bank_or("bgp"), "nbrb");
        assert_eq!(prefs.currency.or(CurrencyCode::usd()), CurrencyCode::usd());

        let prefs = QueryPreferences::new(3, "eur", None).unwrap();
        assert_eq!(prefs.currency, CurrencySelection::One(CurrencyCode::eur()));
        assert!(QueryPreferences::new(3, "euro!", None).is_err());
    }

    #[test]
    fn test_blank_bank_falls_back() {
        let prefs = QueryPreferences::new(0, "usd", Some("  ")).unwrap();
        assert_eq!(prefs.bank_or("bgp"), "bgp");
    }

    #[test]
    fn test_query_date() {
        let prefs = QueryPreferences::new(5, "usd", None).unwrap();
        let today = NaiveDate::from_ymd_opt(2016, 10, 10).unwrap();
        assert_eq!(prefs.query_date(today), NaiveDate::from_ymd_opt(2016, 10, 5).unwrap());
    }
}
