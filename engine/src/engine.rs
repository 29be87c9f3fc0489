//! Rate engine facade.

use std::sync::Arc;

use bankrate_common::{
    dates_from_offsets, sort_rates, Clock, CurrencyCode, CurrencySelection, PreferenceError,
    QueryPreferences, Rate,
};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument};

use crate::best_rate::{BestRate, BestRateAggregator};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::orchestrator::FetchOrchestrator;
use crate::parser::RateParser;
use crate::preferences::BankPreferences;
use crate::proxy::CacheProxy;
use crate::registry::ParserRegistry;
use crate::sampler::DateSampler;
use crate::store::{CacheStore, StoreHandle};

/// Rates of one bank for one date, as answered to a course query.
#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub bank_short_name: String,
    pub date: NaiveDate,
    pub rates: Vec<Rate>,
}

/// Entry point for front ends.
///
/// Every bank is reached through a [`CacheProxy`] sharing one store handle, so
/// a store outage detected by any query switches caching off for all of them.
pub struct RateEngine {
    registry: Arc<ParserRegistry>,
    store: Arc<StoreHandle>,
    clock: Arc<dyn Clock>,
    orchestrator: FetchOrchestrator,
    sampler: DateSampler,
    preferences: BankPreferences,
    default_currency: CurrencyCode,
    config: EngineConfig,
}

impl RateEngine {
    /// Create an engine over registered parsers and a cache store.
    pub fn new(
        registry: ParserRegistry,
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        config.validate().map_err(EngineError::Configuration)?;

        let sampler = DateSampler::new(config.min_bucket, config.max_bucket)?;
        let default_currency = CurrencyCode::parse(&config.default_currency)
            .map_err(|e| EngineError::Configuration(e.to_string()))?;
        let store = Arc::new(StoreHandle::new(store));
        let preferences = BankPreferences::new(store.clone(), config.default_bank.clone());

        info!(
            banks = registry.len(),
            workers = config.workers,
            default_bank = %config.default_bank,
            "Rate engine ready"
        );

        Ok(Self {
            registry: Arc::new(registry),
            store,
            clock,
            orchestrator: FetchOrchestrator::new(config.workers),
            sampler,
            preferences,
            default_currency,
            config,
        })
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn preferences(&self) -> &BankPreferences {
        &self.preferences
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Check whether the cache store is still in use.
    pub fn cache_available(&self) -> bool {
        self.store.is_available()
    }

    /// Resolve a currency argument; "all" stands for the configured default.
    fn single_currency(&self, currency: &str) -> EngineResult<CurrencyCode> {
        let selection = CurrencySelection::parse(currency).map_err(|e| match e {
            PreferenceError::InvalidCurrency(e) => EngineError::InvalidCurrency(e),
            other => EngineError::Configuration(other.to_string()),
        })?;
        Ok(selection.or(self.default_currency.clone()))
    }

    /// Cached access to one bank.
    pub fn proxy(&self, bank: &str) -> EngineResult<Arc<CacheProxy>> {
        let parser = self.registry.lookup(bank)?;
        Ok(Arc::new(self.wrap(parser)))
    }

    /// Cached access to every active bank, in registration order.
    pub fn proxies(&self) -> Vec<Arc<dyn RateParser>> {
        self.registry
            .active_parsers()
            .into_iter()
            .map(|parser| Arc::new(self.wrap(parser)) as Arc<dyn RateParser>)
            .collect()
    }

    fn wrap(&self, parser: Arc<dyn RateParser>) -> CacheProxy {
        CacheProxy::new(parser, self.store.clone(), self.clock.clone())
    }

    /// One currency from one bank.
    pub async fn rate(&self, bank: &str, currency: &str, date: NaiveDate) -> EngineResult<Rate> {
        self.proxy(bank)?.get_currency(currency, date).await
    }

    /// Every quoted currency from one bank, in listing order. Malformed rows
    /// are left out.
    pub async fn all_rates(&self, bank: &str, date: NaiveDate) -> EngineResult<Vec<Rate>> {
        let rates = self.proxy(bank)?.get_all_currencies(date).await?;
        Ok(sort_rates(rates.into_iter().filter(|r| !r.is_empty()).collect()))
    }

    /// Answer a course request.
    ///
    /// The bank is the one named in `prefs`, else the user's saved bank, else
    /// the configured default.
    #[instrument(skip(self, prefs), fields(days_ago = prefs.days_ago))]
    pub async fn course(&self, prefs: &QueryPreferences, user_id: Option<&str>) -> EngineResult<Course> {
        let bank = match (&prefs.bank_name, user_id) {
            (Some(bank), _) => bank.clone(),
            (None, Some(user)) => self.preferences.bank_for(user).await,
            (None, None) => self.config.default_bank.clone(),
        };

        let proxy = self.proxy(&bank)?;
        let date = prefs.query_date(self.today());

        let rates = match &prefs.currency {
            CurrencySelection::All => self.all_rates(&bank, date).await?,
            CurrencySelection::One(code) => {
                let rate = proxy.get_currency(code.as_str(), date).await?;
                if rate.is_empty() {
                    Vec::new()
                } else {
                    vec![rate]
                }
            }
        };

        Ok(Course {
            bank_short_name: proxy.short_name().to_string(),
            date,
            rates,
        })
    }

    /// Sampled history of one currency, oldest point first.
    ///
    /// `days_ago == 0` means the default range and a currency of "all" means
    /// the default currency. Points that could not be fetched are empty rates.
    #[instrument(skip(self))]
    pub async fn series(
        &self,
        bank: &str,
        currency: &str,
        days_ago: u32,
    ) -> EngineResult<Vec<(NaiveDate, Rate)>> {
        let days = if days_ago == 0 {
            self.config.default_series_days
        } else {
            days_ago
        };
        if days > self.config.max_days_ago {
            return Err(EngineError::DaysOutOfRange {
                days,
                max: self.config.max_days_ago,
            });
        }

        let code = self.single_currency(currency)?;
        let proxy = self.proxy(bank)?;
        let mut offsets = self.sampler.sample(days);
        offsets.reverse();
        let dates = dates_from_offsets(self.today(), &offsets);

        let rates = self
            .orchestrator
            .fetch_series(proxy, code.as_str(), &dates)
            .await?;

        Ok(dates.into_iter().zip(rates).collect())
    }

    /// Best buy and sell for `currency` today.
    pub async fn best_rate(&self, currency: &str) -> EngineResult<BestRate> {
        self.best_rate_on(currency, self.today()).await
    }

    /// Best buy and sell for `currency` on `date` across active banks. A
    /// currency of "all" means the default currency.
    pub async fn best_rate_on(&self, currency: &str, date: NaiveDate) -> EngineResult<BestRate> {
        let code = self.single_currency(currency)?;
        BestRateAggregator::new(self.proxies())
            .best_rate(code.as_str(), date)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{RawRow, StaticFetcher};
    use crate::parser::{BankParser, StaticParser};
    use crate::store::MemoryStore;
    use bankrate_common::{CurrencyCode, FixedClock, ParserDescriptor};
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    struct Fixture {
        engine: RateEngine,
        bgp: Arc<StaticParser>,
        nbrb: Arc<StaticParser>,
        store: Arc<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let bgp = Arc::new(BankParser::new(
            ParserDescriptor::new("Белгазпромбанк", "bgp")
                .with_currencies(CurrencyCode::parse_list(&["USD", "EUR", "RUB", "PLN"]).unwrap()),
            StaticFetcher::new(vec![
                RawRow::new("PLN", "0.79", "0.83"),
                RawRow::new("EUR", "3.40", "3.48"),
                RawRow::new("USD", "3.17", "3.22"),
                RawRow::new("XX", "1", "1"),
            ]),
        ));
        let nbrb = Arc::new(BankParser::new(
            ParserDescriptor::new("Нацбанк РБ", "nbrb")
                .with_currencies(CurrencyCode::parse_list(&["USD", "EUR"]).unwrap()),
            StaticFetcher::new(vec![
                RawRow::new("USD", "3.15", "3.25"),
                RawRow::new("EUR", "3.42", "3.45"),
            ]),
        ));
        let store = Arc::new(MemoryStore::new());

        let registry = ParserRegistry::from_parsers(vec![
            bgp.clone() as Arc<dyn RateParser>,
            nbrb.clone() as Arc<dyn RateParser>,
        ])
        .unwrap();
        let engine = RateEngine::new(
            registry,
            store.clone(),
            Arc::new(FixedClock(today())),
            EngineConfig::default(),
        )
        .unwrap();

        Fixture {
            engine,
            bgp,
            nbrb,
            store,
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.workers = 0;
        let result = RateEngine::new(
            ParserRegistry::new(),
            Arc::new(MemoryStore::new()),
            Arc::new(FixedClock(today())),
            config,
        );
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_rate_through_cache() {
        let f = fixture();
        let yesterday = today() - Duration::days(1);

        let first = f.engine.rate("BGP", "usd", yesterday).await.unwrap();
        let second = f.engine.rate("Белгазпромбанк", "USD", yesterday).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(f.bgp.fetcher().calls(), 1);
        assert!(f.store.peek("bgp_usd_2024-06-09").is_some());
    }

    #[tokio::test]
    async fn test_all_rates_sorted_without_empties() {
        let f = fixture();
        let rates = f.engine.all_rates("bgp", today()).await.unwrap();

        let codes: Vec<&str> = rates.iter().map(|r| r.currency_iso()).collect();
        assert_eq!(codes, vec!["USD", "EUR", "PLN"]);
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_course_bank_resolution() {
        let f = fixture();

        let prefs = QueryPreferences::new(0, "USD", None).unwrap();
        let course = f.engine.course(&prefs, None).await.unwrap();
        assert_eq!(course.bank_short_name, "bgp");
        assert_eq!(course.rates.len(), 1);

        f.engine
            .preferences()
            .set_bank("u1", "Нацбанк РБ", f.engine.registry())
            .await
            .unwrap();
        let course = f.engine.course(&prefs, Some("u1")).await.unwrap();
        assert_eq!(course.bank_short_name, "nbrb");
        assert_eq!(course.rates[0].buy(), Some(3.15));

        let explicit = QueryPreferences::new(3, "all", Some("bgp")).unwrap();
        let course = f.engine.course(&explicit, Some("u1")).await.unwrap();
        assert_eq!(course.bank_short_name, "bgp");
        assert_eq!(course.date, today() - Duration::days(3));
        assert_eq!(course.rates.len(), 3);
    }

    #[tokio::test]
    async fn test_course_unknown_bank() {
        let f = fixture();
        let prefs = QueryPreferences::new(0, "all", Some("nope")).unwrap();
        let result = f.engine.course(&prefs, None).await;
        assert!(matches!(result, Err(EngineError::ParserLookup(_))));
    }

    #[tokio::test]
    async fn test_series_default_range_is_chronological() {
        let f = fixture();
        let series = f.engine.series("nbrb", "EUR", 0).await.unwrap();

        assert_eq!(series.len(), 31);
        assert_eq!(series[0].0, today() - Duration::days(30));
        assert_eq!(series[30].0, today());
        assert!(series.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(series.iter().all(|(_, r)| r.sell() == Some(3.45)));
        // today is never cached
        assert_eq!(f.store.len(), 30);
    }

    #[tokio::test]
    async fn test_series_long_range_is_sampled() {
        let f = fixture();
        let series = f.engine.series("nbrb", "USD", 2400).await.unwrap();

        assert_eq!(series.len(), 13);
        assert_eq!(series[0].0, today() - Duration::days(2400));
        assert_eq!(f.nbrb.fetcher().calls(), 13);
    }

    #[tokio::test]
    async fn test_series_range_checked() {
        let f = fixture();
        let result = f.engine.series("nbrb", "USD", 2401).await;
        assert!(matches!(result, Err(EngineError::DaysOutOfRange { .. })));
    }

    #[tokio::test]
    async fn test_best_rate_across_banks() {
        let f = fixture();
        let best = f.engine.best_rate("USD").await.unwrap();

        assert_eq!(best.buy.unwrap().bank_short_name, "nbrb");
        assert_eq!(best.sell.unwrap().bank_short_name, "bgp");

        let rub = f.engine.best_rate("RUB").await;
        assert!(matches!(rub, Err(EngineError::NoQuotesAvailable(_))));
        assert_eq!(f.nbrb.fetcher().calls(), 1);
    }

    #[tokio::test]
    async fn test_all_means_default_currency() {
        let f = fixture();

        let series = f.engine.series("nbrb", "all", 5).await.unwrap();
        assert_eq!(series.len(), 6);
        assert!(series.iter().all(|(_, r)| r.currency_iso() == "USD"));

        let best = f.engine.best_rate("ALL").await.unwrap();
        assert_eq!(best.currency, CurrencyCode::usd());
        assert_eq!(best.buy.unwrap().bank_short_name, "nbrb");

        let bad = f.engine.series("nbrb", "dollars", 5).await;
        assert!(matches!(bad, Err(EngineError::InvalidCurrency(_))));
    }

    #[tokio::test]
    async fn test_all_follows_configured_currency() {
        let mut config = EngineConfig::default();
        config.default_currency = "EUR".to_string();
        let nbrb = Arc::new(BankParser::new(
            ParserDescriptor::new("Нацбанк РБ", "nbrb")
                .with_currencies(CurrencyCode::parse_list(&["USD", "EUR"]).unwrap()),
            StaticFetcher::new(vec![RawRow::new("EUR", "3.42", "3.45")]),
        ));
        let engine = RateEngine::new(
            ParserRegistry::from_parsers(vec![nbrb as Arc<dyn RateParser>]).unwrap(),
            Arc::new(MemoryStore::new()),
            Arc::new(FixedClock(today())),
            config,
        )
        .unwrap();

        let best = engine.best_rate("all").await.unwrap();
        assert_eq!(best.currency, CurrencyCode::eur());
        assert_eq!(best.sell.unwrap().rate.sell(), Some(3.45));
    }
}
