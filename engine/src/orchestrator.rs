//! Concurrent multi-date fetches for time series.

use std::collections::HashMap;
use std::sync::Arc;

use bankrate_common::Rate;
use chrono::NaiveDate;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::error::EngineResult;
use crate::parser::{require_supported, RateParser};

/// Fetches one currency over many dates with a bounded number of workers.
#[derive(Debug, Clone)]
pub struct FetchOrchestrator {
    workers: usize,
}

impl Default for FetchOrchestrator {
    fn default() -> Self {
        Self::new(10)
    }
}

impl FetchOrchestrator {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fetch `currency` for every date, returning rates in the order of `dates`.
    ///
    /// A date whose fetch fails yields [`Rate::empty`] at its position; the
    /// other dates are unaffected. An unsupported currency fails the whole
    /// call before anything is dispatched.
    #[instrument(skip(self, source, dates), fields(bank = %source.short_name(), points = dates.len()))]
    pub async fn fetch_series(
        &self,
        source: Arc<dyn RateParser>,
        currency: &str,
        dates: &[NaiveDate],
    ) -> EngineResult<Vec<Rate>> {
        let code = require_supported(source.descriptor(), currency)?;
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        let mut dispatched: Vec<NaiveDate> = Vec::with_capacity(dates.len());
        for &date in dates {
            if dispatched.contains(&date) {
                continue;
            }
            dispatched.push(date);

            let source = source.clone();
            let semaphore = semaphore.clone();
            let currency = code.as_str().to_string();
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => source.get_currency(&currency, date).await,
                    Err(_) => Ok(Rate::empty()),
                };
                (date, result)
            });
        }

        let mut by_date: HashMap<NaiveDate, Rate> = HashMap::with_capacity(dispatched.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((date, Ok(rate))) => {
                    by_date.insert(date, rate);
                }
                Ok((date, Err(e))) => {
                    warn!(%date, error = %e, "Series point failed, leaving a gap");
                    by_date.insert(date, Rate::empty());
                }
                Err(e) => warn!(error = %e, "Series task aborted"),
            }
        }

        let series: Vec<Rate> = dates
            .iter()
            .map(|date| by_date.get(date).cloned().unwrap_or_else(Rate::empty))
            .collect();

        debug!(
            gaps = series.iter().filter(|r| r.is_empty()).count(),
            "Series assembled"
        );
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, FetchError};
    use crate::fetcher::{RawPage, RawRow, SourceFetcher, StaticFetcher};
    use crate::parser::{BankParser, StaticParser};
    use async_trait::async_trait;
    use bankrate_common::{CurrencyCode, ParserDescriptor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fetcher that tracks how many calls overlap.
    #[derive(Default)]
    struct GaugedFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl SourceFetcher for GaugedFetcher {
        async fn fetch(&self, _date: NaiveDate) -> Result<RawPage, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![RawRow::new("USD", "", "3.0")])
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn parser() -> Arc<StaticParser> {
        let descriptor = ParserDescriptor::new("Нацбанк РБ", "nbrb")
            .with_currencies(CurrencyCode::parse_list(&["USD", "EUR"]).unwrap());
        Arc::new(BankParser::new(descriptor, StaticFetcher::new(Vec::new())))
    }

    fn page(sell: &str) -> Vec<RawRow> {
        vec![RawRow::new("USD", "", sell)]
    }

    #[tokio::test]
    async fn test_series_keeps_input_order_under_reverse_completion() {
        let parser = parser();
        let dates = [date(2024, 3, 3), date(2024, 3, 2), date(2024, 3, 1)];
        for (i, d) in dates.iter().enumerate() {
            parser.fetcher().set_page(*d, page(&format!("3.{}", i + 1)));
            // earlier positions finish last
            parser
                .fetcher()
                .set_delay(*d, Duration::from_millis(60 - 25 * i as u64));
        }

        let series = FetchOrchestrator::new(10)
            .fetch_series(parser.clone(), "USD", &dates)
            .await
            .unwrap();

        let sells: Vec<Option<f64>> = series.iter().map(|r| r.sell()).collect();
        assert_eq!(sells, vec![Some(3.1), Some(3.2), Some(3.3)]);
    }

    #[tokio::test]
    async fn test_failed_date_becomes_gap() {
        let parser = parser();
        let dates = [date(2024, 1, 3), date(2024, 1, 2), date(2024, 1, 1)];
        for d in &dates {
            parser.fetcher().set_page(*d, page("3.0"));
        }
        parser.fetcher().fail_on(dates[1]);

        let series = FetchOrchestrator::default()
            .fetch_series(parser.clone(), "usd", &dates)
            .await
            .unwrap();

        assert_eq!(series.len(), 3);
        assert!(!series[0].is_empty());
        assert!(series[1].is_empty());
        assert!(!series[2].is_empty());
    }

    #[tokio::test]
    async fn test_single_worker_still_completes() {
        let parser = parser();
        let dates: Vec<NaiveDate> = (1..=5).map(|d| date(2024, 2, d)).collect();
        for d in &dates {
            parser.fetcher().set_page(*d, page("2.5"));
        }

        let series = FetchOrchestrator::new(1)
            .fetch_series(parser.clone(), "USD", &dates)
            .await
            .unwrap();

        assert_eq!(series.len(), 5);
        assert!(series.iter().all(|r| r.sell() == Some(2.5)));
        assert_eq!(parser.fetcher().calls(), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_in_flight_fetches_bounded_by_workers() {
        let descriptor = ParserDescriptor::new("Нацбанк РБ", "nbrb")
            .with_currencies(CurrencyCode::parse_list(&["USD"]).unwrap());
        let parser = Arc::new(BankParser::new(descriptor, GaugedFetcher::default()));
        let dates: Vec<NaiveDate> = (1..=10).map(|d| date(2024, 4, d)).collect();

        let series = FetchOrchestrator::new(2)
            .fetch_series(parser.clone(), "USD", &dates)
            .await
            .unwrap();

        assert_eq!(series.len(), 10);
        assert!(series.iter().all(|r| r.sell() == Some(3.0)));
        let peak = parser.fetcher().peak.load(Ordering::SeqCst);
        assert!(peak <= 2, "peak in-flight fetches was {}", peak);
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn test_duplicate_dates_fetched_once() {
        let parser = parser();
        let d = date(2024, 2, 1);
        parser.fetcher().set_page(d, page("2.5"));

        let series = FetchOrchestrator::default()
            .fetch_series(parser.clone(), "USD", &[d, d])
            .await
            .unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series[0], series[1]);
        assert_eq!(parser.fetcher().calls(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_currency_rejected_upfront() {
        let parser = parser();
        let result = FetchOrchestrator::default()
            .fetch_series(parser.clone(), "GBP", &[date(2024, 1, 1)])
            .await;

        assert!(matches!(result, Err(EngineError::UnsupportedCurrency { .. })));
        assert_eq!(parser.fetcher().calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_dates() {
        let series = FetchOrchestrator::default()
            .fetch_series(parser(), "USD", &[])
            .await
            .unwrap();
        assert!(series.is_empty());
    }
}
