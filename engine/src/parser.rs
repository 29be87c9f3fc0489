//! Bank parser contract and the generic fetcher-backed parser.

use async_trait::async_trait;
use bankrate_common::{denomination_multiplier, CurrencyCode, ParserDescriptor, Rate};
use chrono::NaiveDate;
use tracing::{debug, instrument, warn};

use crate::error::{EngineError, EngineResult, RowParseError};
use crate::fetcher::{RawRow, SourceFetcher};

/// Trait for bank rate parsers.
///
/// Implemented by every bank parser and by the caching proxy that wraps one,
/// so callers can use either interchangeably.
#[async_trait]
pub trait RateParser: Send + Sync {
    /// Static identity of the bank.
    fn descriptor(&self) -> &ParserDescriptor;

    /// Every currency the source publishes for `date`, denomination applied.
    /// Malformed rows show up as empty rates.
    async fn get_all_currencies(&self, date: NaiveDate) -> EngineResult<Vec<Rate>>;

    /// The rate for one currency, or [`Rate::empty`] when the source does not
    /// publish it on `date`.
    async fn get_currency(&self, currency: &str, date: NaiveDate) -> EngineResult<Rate>;

    fn short_name(&self) -> &str {
        &self.descriptor().short_name
    }

    fn name(&self) -> &str {
        &self.descriptor().name
    }
}

/// Resolve `currency` against the bank's allowed list.
pub fn require_supported(descriptor: &ParserDescriptor, currency: &str) -> EngineResult<CurrencyCode> {
    match CurrencyCode::parse(currency) {
        Ok(code) if descriptor.allowed_currencies.contains(&code) => Ok(code),
        _ => Err(EngineError::UnsupportedCurrency {
            bank: descriptor.short_name.clone(),
            currency: currency.to_string(),
            allowed: descriptor.allowed_list(),
        }),
    }
}

/// Parser that normalizes the rows of a [`SourceFetcher`].
pub struct BankParser<F> {
    descriptor: ParserDescriptor,
    fetcher: F,
}

impl<F: SourceFetcher> BankParser<F> {
    /// Create a parser for one bank.
    pub fn new(descriptor: ParserDescriptor, fetcher: F) -> Self {
        Self {
            descriptor,
            fetcher,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    fn check_date(&self, date: NaiveDate) -> EngineResult<()> {
        if self.descriptor.covers(date) {
            Ok(())
        } else {
            Err(EngineError::DateOutOfRange {
                bank: self.descriptor.short_name.clone(),
                date,
                minimal: self.descriptor.minimal_date,
            })
        }
    }
}

#[async_trait]
impl<F: SourceFetcher> RateParser for BankParser<F> {
    fn descriptor(&self) -> &ParserDescriptor {
        &self.descriptor
    }

    #[instrument(skip(self), fields(bank = %self.descriptor.short_name))]
    async fn get_all_currencies(&self, date: NaiveDate) -> EngineResult<Vec<Rate>> {
        self.check_date(date)?;

        let page = self
            .fetcher
            .fetch(date)
            .await
            .map_err(|source| EngineError::SourceUnavailable {
                bank: self.descriptor.short_name.clone(),
                source,
            })?;

        let multiplier = denomination_multiplier(date);
        let rates: Vec<Rate> = page
            .iter()
            .enumerate()
            .map(|(idx, row)| match normalize_row(&self.descriptor.short_name, idx, row) {
                Ok(rate) => rate.with_multiplier(multiplier),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed row");
                    Rate::empty()
                }
            })
            .collect();

        debug!(rows = rates.len(), multiplier, "Parsed rate page");
        Ok(rates)
    }

    async fn get_currency(&self, currency: &str, date: NaiveDate) -> EngineResult<Rate> {
        let code = require_supported(&self.descriptor, currency)?;

        let found = self
            .get_all_currencies(date)
            .await?
            .into_iter()
            .find(|rate| !rate.is_empty() && rate.currency_iso() == code.as_str());

        Ok(found.unwrap_or_else(|| {
            debug!(bank = %self.descriptor.short_name, currency = %code, %date, "Currency not published");
            Rate::empty()
        }))
    }
}

/// Turn one raw row into a rate with multiplier 1.
///
/// Codes may carry a quote unit ("100 RUB"); buy and sell are divided by it.
pub fn normalize_row(bank: &str, idx: usize, row: &RawRow) -> Result<Rate, RowParseError> {
    let fail = |reason: String| RowParseError { row: idx, reason };

    let raw_code = row
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| fail("missing currency code".to_string()))?;
    let (unit, code) = split_unit(raw_code).map_err(fail)?;

    let buy = parse_amount(row.buy.as_deref()).map_err(|e| fail(format!("buy: {}", e)))?;
    let sell = parse_amount(row.sell.as_deref()).map_err(|e| fail(format!("sell: {}", e)))?;
    if buy.is_none() && sell.is_none() {
        return Err(fail(format!("no values for {}", code)));
    }

    let unit = f64::from(unit);
    let name = row
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(code.as_str())
        .to_string();

    Ok(Rate::new(bank, &code, name, buy.map(|v| v / unit), sell.map(|v| v / unit)))
}

/// Split "100 RUB" into (100, RUB); a bare code has unit 1.
fn split_unit(raw: &str) -> Result<(u32, CurrencyCode), String> {
    let mut parts = raw.split_whitespace();
    let (unit, code) = match (parts.next(), parts.next(), parts.next()) {
        (Some(code), None, _) => (1, code),
        (Some(unit), Some(code), None) => {
            let unit: u32 = unit
                .parse()
                .map_err(|_| format!("bad quote unit in '{}'", raw))?;
            (unit, code)
        }
        _ => return Err(format!("unrecognized currency '{}'", raw)),
    };

    if unit == 0 {
        return Err(format!("zero quote unit in '{}'", raw));
    }

    let code = CurrencyCode::parse(code).map_err(|e| e.to_string())?;
    Ok((unit, code))
}

/// Parse a published amount; blanks and "-" mean "not quoted".
fn parse_amount(raw: Option<&str>) -> Result<Option<f64>, String> {
    let cleaned: String = match raw {
        Some(raw) => raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| if c == ',' { '.' } else { c })
            .collect(),
        None => return Ok(None),
    };

    if cleaned.is_empty() || cleaned == "-" {
        return Ok(None);
    }

    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(Some(v)),
        Ok(v) => Err(format!("out of range value {}", v)),
        Err(_) => Err(format!("not a number '{}'", cleaned)),
    }
}

/// Parser with canned rates, for tests.
#[cfg(any(test, feature = "test-utils"))]
pub type StaticParser = BankParser<crate::fetcher::StaticFetcher>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetcher::StaticFetcher;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn descriptor() -> ParserDescriptor {
        ParserDescriptor::new("Белгазпромбанк", "bgp")
            .with_currencies(CurrencyCode::parse_list(&["USD", "EUR", "RUB", "GBP"]).unwrap())
            .with_minimal_date(date(2004, 5, 1))
    }

    fn page() -> Vec<RawRow> {
        vec![
            RawRow::new("USD", "1.9650", "1.9850").with_name("Доллар США"),
            RawRow::new("EUR", "2,1800", "2,2100"),
            RawRow::new("100 RUB", "3.05", "3.12"),
            RawRow::new("USD/EUR", "1.1", "1.2"),
        ]
    }

    fn parser() -> StaticParser {
        BankParser::new(descriptor(), StaticFetcher::new(page()))
    }

    #[tokio::test]
    async fn test_all_currencies_keeps_malformed_rows_as_empty() {
        let rates = parser().get_all_currencies(date(2020, 5, 5)).await.unwrap();

        assert_eq!(rates.len(), 4);
        assert_eq!(rates[0].currency_iso(), "USD");
        assert_eq!(rates[0].display_name(), "Доллар США");
        assert_eq!(rates[1].buy(), Some(2.18));
        assert!((rates[2].sell().unwrap() - 0.0312).abs() < 1e-12);
        assert!(rates[3].is_empty());
    }

    #[tokio::test]
    async fn test_denomination_applied_before_switch() {
        let parser = parser();

        let before = parser.get_all_currencies(date(2016, 6, 30)).await.unwrap();
        assert!(before.iter().filter(|r| !r.is_empty()).all(|r| r.multiplier() == 10_000));

        let after = parser.get_all_currencies(date(2016, 7, 1)).await.unwrap();
        assert!(after.iter().filter(|r| !r.is_empty()).all(|r| r.multiplier() == 1));

        let single = parser.get_currency("usd", date(2015, 1, 1)).await.unwrap();
        assert_eq!(single.multiplier(), 10_000);
    }

    #[tokio::test]
    async fn test_get_currency_found() {
        let rate = parser().get_currency("EUR", date(2020, 5, 5)).await.unwrap();
        assert_eq!(rate.bank_short_name(), "bgp");
        assert_eq!(rate.sell(), Some(2.21));
    }

    #[tokio::test]
    async fn test_get_currency_absent_is_empty() {
        let rate = parser().get_currency("GBP", date(2020, 5, 5)).await.unwrap();
        assert!(rate.is_empty());
    }

    #[tokio::test]
    async fn test_get_currency_unsupported() {
        let parser = parser();
        let result = parser.get_currency("JPY", date(2020, 5, 5)).await;

        assert!(matches!(result, Err(EngineError::UnsupportedCurrency { .. })));
        assert_eq!(parser.fetcher().calls(), 0);
    }

    #[tokio::test]
    async fn test_date_before_minimal() {
        let result = parser().get_all_currencies(date(2000, 1, 1)).await;
        assert!(matches!(result, Err(EngineError::DateOutOfRange { .. })));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_source_unavailable() {
        let parser = parser();
        let day = date(2020, 5, 5);
        parser.fetcher().fail_on(day);

        match parser.get_currency("USD", day).await {
            Err(EngineError::SourceUnavailable { bank, source }) => {
                assert_eq!(bank, "bgp");
                assert!(matches!(source, FetchError::Network(_)));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_normalize_row_errors() {
        let missing_code = RawRow {
            buy: Some("1".into()),
            ..Default::default()
        };
        assert!(normalize_row("bgp", 0, &missing_code).is_err());
        assert!(normalize_row("bgp", 1, &RawRow::new("USD", "abc", "1.0")).is_err());
        assert!(normalize_row("bgp", 2, &RawRow::new("0 USD", "1.0", "1.0")).is_err());
        assert!(normalize_row("bgp", 3, &RawRow::new("USD", "-", "")).is_err());
    }

    #[test]
    fn test_normalize_row_partial_quote() {
        let rate = normalize_row("nbrb", 0, &RawRow::new("USD", "", "2.5")).unwrap();
        assert_eq!(rate.buy(), None);
        assert_eq!(rate.sell(), Some(2.5));
    }

    #[test]
    fn test_parse_amount_spaces() {
        assert_eq!(parse_amount(Some("20 150")).unwrap(), Some(20150.0));
        assert_eq!(parse_amount(Some(" 1,5 ")).unwrap(), Some(1.5));
        assert_eq!(parse_amount(None).unwrap(), None);
        assert!(parse_amount(Some("-3")).is_err());
    }
}
