//! Cross-bank best-rate reduction.

use std::sync::Arc;

use bankrate_common::{CurrencyCode, Rate};
use chrono::NaiveDate;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::error::{EngineError, EngineResult};
use crate::parser::RateParser;

/// One side of a best-rate answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestQuote {
    pub bank_name: String,
    pub bank_short_name: String,
    pub rate: Rate,
}

/// Lowest buy and lowest sell for one currency across banks.
///
/// A side is `None` when no quoting bank publishes it, e.g. a national bank
/// that only sets an official rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestRate {
    pub currency: CurrencyCode,
    pub buy: Option<BestQuote>,
    pub sell: Option<BestQuote>,
}

/// Queries every bank for one currency and keeps the lowest quotes.
pub struct BestRateAggregator {
    parsers: Vec<Arc<dyn RateParser>>,
}

impl BestRateAggregator {
    /// `parsers` order is the tie-break order.
    pub fn new(parsers: Vec<Arc<dyn RateParser>>) -> Self {
        Self { parsers }
    }

    #[instrument(skip(self), fields(banks = self.parsers.len()))]
    pub async fn best_rate(&self, currency: &str, date: NaiveDate) -> EngineResult<BestRate> {
        let code = CurrencyCode::parse(currency)?;

        let candidates: Vec<&Arc<dyn RateParser>> = self
            .parsers
            .iter()
            .filter(|p| p.descriptor().allowed_currencies.contains(&code))
            .collect();

        let results = join_all(
            candidates
                .iter()
                .map(|parser| parser.get_currency(code.as_str(), date)),
        )
        .await;

        let quotes: Vec<(&Arc<dyn RateParser>, Rate)> = candidates
            .into_iter()
            .zip(results)
            .filter_map(|(parser, result)| match result {
                Ok(rate) if !rate.is_empty() => Some((parser, rate)),
                Ok(_) => None,
                Err(e) => {
                    warn!(bank = %parser.short_name(), error = %e, "Bank skipped in best-rate query");
                    None
                }
            })
            .collect();

        debug!(quotes = quotes.len(), "Collected best-rate candidates");

        if quotes.is_empty() {
            return Err(EngineError::NoQuotesAvailable(code.to_string()));
        }

        Ok(BestRate {
            buy: lowest(&quotes, Rate::normalized_buy),
            sell: lowest(&quotes, Rate::normalized_sell),
            currency: code,
        })
    }
}

/// First quote with the strictly smallest value; earlier entries win ties.
fn lowest(
    quotes: &[(&Arc<dyn RateParser>, Rate)],
    value: fn(&Rate) -> Option<f64>,
) -> Option<BestQuote> {
    let mut best: Option<(f64, &Arc<dyn RateParser>, &Rate)> = None;
    for (parser, rate) in quotes {
        let Some(v) = value(rate) else { continue };
        if best.map_or(true, |(current, _, _)| v < current) {
            best = Some((v, parser, rate));
        }
    }

    best.map(|(_, parser, rate)| BestQuote {
        bank_name: parser.name().to_string(),
        bank_short_name: parser.short_name().to_string(),
        rate: rate.clone(),
    })
}
