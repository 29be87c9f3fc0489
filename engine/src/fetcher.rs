//! Source fetcher contract.
//!
//! A fetcher owns the bank-specific extraction (HTML table, JSON payload) and
//! hands the parser raw string fields, one [`RawRow`] per published line.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::FetchError;

/// One published line of a bank's rate table, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    /// Display name as printed by the bank.
    pub name: Option<String>,
    /// Currency code, optionally prefixed with a quote unit ("100 RUB").
    pub code: Option<String>,
    pub buy: Option<String>,
    pub sell: Option<String>,
}

impl RawRow {
    pub fn new(code: &str, buy: &str, sell: &str) -> Self {
        Self {
            name: None,
            code: Some(code.to_string()),
            buy: Some(buy.to_string()),
            sell: Some(sell.to_string()),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

/// Raw rows for one date.
pub type RawPage = Vec<RawRow>;

/// Trait for bank source fetchers.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch every published row for `date`.
    async fn fetch(&self, date: NaiveDate) -> Result<RawPage, FetchError>;
}

#[async_trait]
impl<T: SourceFetcher + ?Sized> SourceFetcher for Arc<T> {
    async fn fetch(&self, date: NaiveDate) -> Result<RawPage, FetchError> {
        (**self).fetch(date).await
    }
}

/// Fetcher serving canned pages, for tests.
#[cfg(any(test, feature = "test-utils"))]
pub struct StaticFetcher {
    default_page: RawPage,
    pages: dashmap::DashMap<NaiveDate, RawPage>,
    delays: dashmap::DashMap<NaiveDate, std::time::Duration>,
    failures: dashmap::DashSet<NaiveDate>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl StaticFetcher {
    /// Create a fetcher that answers `default_page` for every date.
    pub fn new(default_page: RawPage) -> Self {
        Self {
            default_page,
            pages: dashmap::DashMap::new(),
            delays: dashmap::DashMap::new(),
            failures: dashmap::DashSet::new(),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Serve `page` for `date` instead of the default.
    pub fn set_page(&self, date: NaiveDate, page: RawPage) {
        self.pages.insert(date, page);
    }

    /// Delay the answer for `date`.
    pub fn set_delay(&self, date: NaiveDate, delay: std::time::Duration) {
        self.delays.insert(date, delay);
    }

    /// Fail every fetch for `date` with a network error.
    pub fn fail_on(&self, date: NaiveDate) {
        self.failures.insert(date);
    }

    /// Number of fetches served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl SourceFetcher for StaticFetcher {
    async fn fetch(&self, date: NaiveDate) -> Result<RawPage, FetchError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let delay = self.delays.get(&date).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failures.contains(&date) {
            return Err(FetchError::Network(format!("connection reset for {}", date)));
        }

        Ok(self
            .pages
            .get(&date)
            .map(|p| p.clone())
            .unwrap_or_else(|| self.default_page.clone()))
    }
}
