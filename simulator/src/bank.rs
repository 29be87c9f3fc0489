//! Simulated bank sources.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use bankrate_common::{denomination_multiplier, CurrencyCode, ParserDescriptor};
use bankrate_engine::{FetchError, RawPage, RawRow, SourceFetcher};

use crate::scenario::FaultType;

/// Reference mid rates on the current scale.
const MID_RATES: &[(&str, &str, f64)] = &[
    ("USD", "Доллар США", 3.20),
    ("EUR", "Евро", 3.45),
    ("RUB", "Российский рубль", 0.035),
    ("PLN", "Злотый", 0.80),
    ("GBP", "Фунт стерлингов", 4.05),
    ("UAH", "Гривна", 0.078),
    ("CNY", "Юань", 0.44),
];

/// Behaviour knobs shared by every simulated bank.
#[derive(Debug, Clone)]
pub struct SourceProfile {
    pub latency: Duration,
    /// Chance that a date's page fails with a timeout.
    pub failure_rate: f64,
}

/// A bank web endpoint producing deterministic pages per seed and date.
pub struct SimulatedBank {
    short_name: String,
    currencies: Vec<CurrencyCode>,
    seed: u64,
    spread: f64,
    decimal_comma: bool,
    profile: SourceProfile,
    fault: RwLock<Option<FaultType>>,
    fetches: AtomicU64,
}

impl SimulatedBank {
    pub fn new(
        descriptor: &ParserDescriptor,
        seed: u64,
        spread: f64,
        decimal_comma: bool,
        profile: SourceProfile,
    ) -> Self {
        Self {
            short_name: descriptor.short_name.clone(),
            currencies: descriptor.allowed_currencies.iter().cloned().collect(),
            seed,
            spread,
            decimal_comma,
            profile,
            fault: RwLock::new(None),
            fetches: AtomicU64::new(0),
        }
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn inject_fault(&self, fault: FaultType) {
        *self.fault.write() = Some(fault);
    }

    pub fn clear_fault(&self) {
        *self.fault.write() = None;
    }

    /// Pages served so far, failures included.
    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    fn day_rng(&self, date: NaiveDate) -> StdRng {
        let mut hasher = DefaultHasher::new();
        (self.seed, &self.short_name, date).hash(&mut hasher);
        StdRng::seed_from_u64(hasher.finish())
    }

    /// Whether fetch number `attempt` of `date` times out. Retries draw again.
    fn times_out(&self, date: NaiveDate, attempt: u64) -> bool {
        if self.profile.failure_rate <= 0.0 {
            return false;
        }
        let mut hasher = DefaultHasher::new();
        (self.seed, &self.short_name, date, attempt).hash(&mut hasher);
        StdRng::seed_from_u64(hasher.finish()).gen_bool(self.profile.failure_rate.min(1.0))
    }

    fn format_amount(&self, value: f64) -> String {
        let text = format!("{:.4}", value);
        if self.decimal_comma {
            text.replace('.', ",")
        } else {
            text
        }
    }

    /// Build the page published on `date`.
    pub fn page(&self, date: NaiveDate) -> RawPage {
        let mut rng = self.day_rng(date);
        let scale = f64::from(denomination_multiplier(date));

        let mut page: RawPage = MID_RATES
            .iter()
            .filter(|(code, _, _)| self.currencies.iter().any(|c| c.as_str() == *code))
            .map(|(code, name, mid)| {
                let mid = mid * scale * (1.0 + rng.gen_range(-0.03..0.03));
                // small-valued currencies are quoted per 100
                let (unit, label) = if mid / scale < 0.1 {
                    (100.0, format!("100 {}", code))
                } else {
                    (1.0, code.to_string())
                };
                RawRow::new(
                    &label,
                    &self.format_amount(mid * unit * (1.0 - self.spread)),
                    &self.format_amount(mid * unit * (1.0 + self.spread)),
                )
                .with_name(name)
            })
            .collect();

        // conversion rows are published alongside
        page.push(RawRow::new("USD/EUR", "0,9200", "0,9350"));
        page
    }
}

#[async_trait]
impl SourceFetcher for SimulatedBank {
    async fn fetch(&self, date: NaiveDate) -> Result<RawPage, FetchError> {
        let attempt = self.fetches.fetch_add(1, Ordering::Relaxed);

        let fault = self.fault.read().clone();
        let latency = match &fault {
            Some(FaultType::NetworkLatency { delay_ms }) => {
                self.profile.latency + Duration::from_millis(*delay_ms)
            }
            _ => self.profile.latency,
        };
        tokio::time::sleep(latency).await;

        match fault {
            Some(FaultType::BankOffline) => {
                return Err(FetchError::Network(format!("{} refused connection", self.short_name)))
            }
            Some(FaultType::GarbledPage) => {
                return Ok(vec![RawRow::new("???", "<td>", "</td>")]);
            }
            _ => {}
        }

        if self.times_out(date, attempt) {
            return Err(FetchError::Timeout(format!("{} page for {}", self.short_name, date)));
        }

        Ok(self.page(date))
    }
}

/// Bank factory for creating simulated banks.
pub struct BankFactory;

impl BankFactory {
    /// Descriptors of the known banks, in registration order.
    pub fn descriptors() -> Vec<ParserDescriptor> {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN);
        let codes = |list: &[&str]| CurrencyCode::parse_list(list).unwrap_or_default();

        vec![
            ParserDescriptor::new("Белгазпромбанк", "bgp")
                .with_currencies(codes(&["USD", "EUR", "RUB", "PLN", "GBP"]))
                .with_minimal_date(date(2004, 5, 1)),
            ParserDescriptor::new("Нацбанк РБ", "nbrb")
                .with_currencies(codes(&["USD", "EUR", "RUB", "PLN", "GBP", "UAH", "CNY"]))
                .with_minimal_date(date(1995, 3, 28)),
            ParserDescriptor::new("БПС-Сбербанк", "bpsb")
                .with_currencies(codes(&["USD", "EUR", "RUB"]))
                .with_minimal_date(date(2010, 1, 1)),
            ParserDescriptor::new("Приорбанк", "prbp")
                .with_currencies(codes(&["USD", "EUR", "RUB", "PLN"]))
                .with_minimal_date(date(2008, 1, 1)),
            ParserDescriptor::new("Беларусбанк", "bwb")
                .with_currencies(codes(&["USD", "EUR", "RUB", "PLN", "UAH"]))
                .with_minimal_date(date(2012, 1, 1)),
            ParserDescriptor::new("МТБанк", "mtb")
                .with_currencies(codes(&["USD", "EUR", "RUB"]))
                .inactive(),
        ]
    }

    /// Create the first `count` banks.
    pub fn create_banks(
        count: usize,
        seed: u64,
        profile: &SourceProfile,
    ) -> Vec<(ParserDescriptor, Arc<SimulatedBank>)> {
        Self::descriptors()
            .into_iter()
            .take(count)
            .enumerate()
            .map(|(i, descriptor)| {
                let spread = 0.004 + 0.002 * i as f64;
                let bank = SimulatedBank::new(
                    &descriptor,
                    seed,
                    spread,
                    i % 2 == 1,
                    profile.clone(),
                );
                (descriptor, Arc::new(bank))
            })
            .collect()
    }
}
