//! Normalized bank rate record.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::currency::CurrencyCode;

/// Display name carried by the "not found" sentinel.
pub const NO_VALUE: &str = "NoValue";

/// A currency quote from one bank on one date.
///
/// Immutable once built. `buy`/`sell` are the values as published; divide by
/// `multiplier` (see [`Rate::normalized_buy`]) to compare quotes from before
/// and after the redenomination.
///
/// Equality covers `(currency_iso, buy, sell, multiplier)` only, so the same
/// quote published by two banks compares equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rate {
    bank_short_name: String,
    currency_iso: String,
    display_name: String,
    buy: Option<f64>,
    sell: Option<f64>,
    multiplier: u32,
}

impl Rate {
    /// Create a rate with multiplier 1.
    pub fn new(
        bank_short_name: &str,
        currency: &CurrencyCode,
        display_name: impl Into<String>,
        buy: Option<f64>,
        sell: Option<f64>,
    ) -> Self {
        Self {
            bank_short_name: bank_short_name.trim().to_lowercase(),
            currency_iso: currency.as_str().to_string(),
            display_name: display_name.into(),
            buy,
            sell,
            multiplier: 1,
        }
    }

    /// Replace the multiplier (clamped to at least 1).
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier.max(1);
        self
    }

    /// The "not found" sentinel.
    pub fn empty() -> Self {
        Self {
            bank_short_name: String::new(),
            currency_iso: String::new(),
            display_name: NO_VALUE.to_string(),
            buy: None,
            sell: None,
            multiplier: 1,
        }
    }

    /// Check whether this is the "not found" sentinel.
    pub fn is_empty(&self) -> bool {
        self.bank_short_name.is_empty()
            && self.currency_iso.is_empty()
            && self.buy.is_none()
            && self.sell.is_none()
    }

    pub fn bank_short_name(&self) -> &str {
        &self.bank_short_name
    }

    pub fn currency_iso(&self) -> &str {
        &self.currency_iso
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn buy(&self) -> Option<f64> {
        self.buy
    }

    pub fn sell(&self) -> Option<f64> {
        self.sell
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Buy value on the post-redenomination scale.
    pub fn normalized_buy(&self) -> Option<f64> {
        self.buy.map(|v| v / f64::from(self.multiplier))
    }

    /// Sell value on the post-redenomination scale.
    pub fn normalized_sell(&self) -> Option<f64> {
        self.sell.map(|v| v / f64::from(self.multiplier))
    }
}

impl PartialEq for Rate {
    fn eq(&self, other: &Self) -> bool {
        self.currency_iso == other.currency_iso
            && self.buy == other.buy
            && self.sell == other.sell
            && self.multiplier == other.multiplier
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "<Rate {}>", NO_VALUE);
        }
        let show = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v));
        write!(
            f,
            "<Rate {} {}: buy {} sell {} x{}>",
            self.bank_short_name,
            self.currency_iso,
            show(self.buy),
            show(self.sell),
            self.multiplier
        )
    }
}

fn display_priority(iso: &str) -> Option<u8> {
    match iso {
        "USD" => Some(1),
        "EUR" => Some(2),
        "RUB" => Some(3),
        _ => None,
    }
}

/// Order rates for listings: USD, EUR, RUB first, then alphabetically by code.
pub fn sort_rates(mut rates: Vec<Rate>) -> Vec<Rate> {
    rates.sort_by(|a, b| {
        match (display_priority(&a.currency_iso), display_priority(&b.currency_iso)) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.currency_iso.cmp(&b.currency_iso),
        }
    });
    rates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(bank: &str, iso: &str, buy: f64, sell: f64) -> Rate {
        Rate::new(bank, &CurrencyCode::parse(iso).unwrap(), iso, Some(buy), Some(sell))
    }

    #[test]
    fn test_empty_sentinel() {
        let empty = Rate::empty();
        assert!(empty.is_empty());
        assert_eq!(empty.display_name(), NO_VALUE);
        assert!(!rate("bgp", "USD", 2.0, 2.1).is_empty());
    }

    #[test]
    fn test_rate_with_only_sell_is_not_empty() {
        let r = Rate::new("nbrb", &CurrencyCode::usd(), "USD", None, Some(1.98));
        assert!(!r.is_empty());
    }

    #[test]
    fn test_equality_ignores_bank_and_name() {
        let a = rate("bgp", "USD", 2.0, 2.1);
        let b = Rate::new("prbp", &CurrencyCode::usd(), "Dollar", Some(2.0), Some(2.1));
        assert_eq!(a, b);
        assert_ne!(a, a.clone().with_multiplier(10_000));
        assert_ne!(a, rate("bgp", "EUR", 2.0, 2.1));
    }

    #[test]
    fn test_bank_name_is_lowercased() {
        assert_eq!(rate("BGP", "USD", 1.0, 1.0).bank_short_name(), "bgp");
    }

    #[test]
    fn test_normalized_values() {
        let r = rate("bgp", "USD", 20_000.0, 20_500.0).with_multiplier(10_000);
        assert_eq!(r.normalized_buy(), Some(2.0));
        assert_eq!(r.normalized_sell(), Some(2.05));
    }

    #[test]
    fn test_multiplier_never_zero() {
        assert_eq!(rate("bgp", "USD", 1.0, 1.0).with_multiplier(0).multiplier(), 1);
    }

    #[test]
    fn test_generic_currencies_sorted_alphabetically() {
        let sorted = sort_rates(vec![
            rate("b", "PLZ", 20.0, 30.0),
            rate("b", "AUD", 20.0, 30.0),
            rate("b", "BLZ", 20.0, 30.0),
            rate("b", "ZLT", 20.0, 30.0),
        ]);
        let codes: Vec<&str> = sorted.iter().map(|r| r.currency_iso()).collect();
        assert_eq!(codes, vec!["AUD", "BLZ", "PLZ", "ZLT"]);
    }

    #[test]
    fn test_priority_currencies_come_first() {
        let sorted = sort_rates(vec![
            rate("b", "RUB", 20.0, 30.0),
            rate("b", "BLZ", 20.0, 30.0),
            rate("b", "USD", 20.0, 30.0),
            rate("b", "ZLT", 20.0, 30.0),
            rate("b", "EUR", 20.0, 30.0),
        ]);
        let codes: Vec<&str> = sorted.iter().map(|r| r.currency_iso()).collect();
        assert_eq!(codes, vec!["USD", "EUR", "RUB", "BLZ", "ZLT"]);
    }
}
