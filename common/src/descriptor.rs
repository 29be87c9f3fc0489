//! Static description of a bank source.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::currency::CurrencyCode;
use crate::time::constants;

/// Identity and capabilities of one bank parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserDescriptor {
    /// Human-readable bank name, e.g. "Белгазпромбанк".
    pub name: String,
    /// Unique lowercase key, e.g. "bgp".
    pub short_name: String,
    /// Currencies this bank may publish.
    pub allowed_currencies: BTreeSet<CurrencyCode>,
    /// Inactive parsers stay registered but are hidden from queries.
    pub is_active: bool,
    /// Earliest date the source can answer for.
    pub minimal_date: NaiveDate,
}

impl ParserDescriptor {
    /// Create an active descriptor with no currencies and no date floor.
    pub fn new(name: impl Into<String>, short_name: &str) -> Self {
        Self {
            name: name.into(),
            short_name: short_name.trim().to_lowercase(),
            allowed_currencies: BTreeSet::new(),
            is_active: true,
            minimal_date: NaiveDate::MIN,
        }
    }

    pub fn with_currencies(mut self, currencies: impl IntoIterator<Item = CurrencyCode>) -> Self {
        self.allowed_currencies.extend(currencies);
        self
    }

    pub fn with_minimal_date(mut self, date: NaiveDate) -> Self {
        self.minimal_date = date;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Check if this bank may publish `currency` (case-insensitive).
    pub fn supports(&self, currency: &str) -> bool {
        CurrencyCode::parse(currency)
            .map(|code| self.allowed_currencies.contains(&code))
            .unwrap_or(false)
    }

    /// Check if `query` names this bank by full or short name (case-insensitive).
    pub fn matches_name(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        !query.is_empty() && (self.name.to_lowercase() == query || self.short_name == query)
    }

    /// Check if `date` is within the range the source can serve.
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.minimal_date
    }

    /// Comma-separated list of allowed codes, for error messages.
    pub fn allowed_list(&self) -> String {
        self.allowed_currencies
            .iter()
            .map(CurrencyCode::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn denomination_date(&self) -> NaiveDate {
        constants::DENOMINATION_DATE
    }

    pub fn denomination_multiplier(&self) -> u32 {
        constants::DENOMINATION_MULTIPLIER
    }
}
