//! Simulation controller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::RwLock;
use tracing::{info, warn};

use bankrate_common::{QueryPreferences, SystemClock};
use bankrate_engine::{
    BankParser, EngineConfig, EngineError, MemoryStore, ParserRegistry, RateEngine, RateParser,
};

use crate::bank::{BankFactory, SimulatedBank, SourceProfile};
use crate::metrics::{QueryKind, SimulationMetrics};
use crate::scenario::{AssertCondition, Scenario, ScenarioStep};

const RANDOM_CURRENCIES: &[&str] = &["USD", "EUR", "RUB", "PLN"];

/// Controls the simulation.
pub struct SimulationController {
    /// Engine under test.
    engine: Arc<RateEngine>,
    /// Simulated bank endpoints, registration order.
    banks: Vec<Arc<SimulatedBank>>,
    /// Backing store of the engine cache.
    store: Arc<MemoryStore>,
    /// Random number generator.
    rng: Arc<RwLock<StdRng>>,
    /// Simulation metrics.
    metrics: Arc<RwLock<SimulationMetrics>>,
    /// Running flag.
    running: Arc<RwLock<bool>>,
}

impl SimulationController {
    /// Create a controller with `bank_count` simulated banks wired into an engine.
    pub fn new(
        bank_count: usize,
        seed: Option<u64>,
        profile: SourceProfile,
        config: EngineConfig,
    ) -> anyhow::Result<Self> {
        if bank_count == 0 {
            anyhow::bail!("At least one bank is required");
        }

        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let bank_seed: u64 = rng.gen();

        let mut registry = ParserRegistry::new();
        let mut banks = Vec::new();
        for (descriptor, bank) in BankFactory::create_banks(bank_count, bank_seed, &profile) {
            info!(bank = %descriptor.short_name, name = %descriptor.name, "Initialized bank");
            registry.register(Arc::new(BankParser::new(descriptor, bank.clone())) as Arc<dyn RateParser>)?;
            banks.push(bank);
        }

        let store = Arc::new(MemoryStore::new());
        let engine = RateEngine::new(registry, store.clone(), Arc::new(SystemClock), config)?;

        Ok(Self {
            engine: Arc::new(engine),
            banks,
            store,
            rng: Arc::new(RwLock::new(rng)),
            metrics: Arc::new(RwLock::new(SimulationMetrics::new())),
            running: Arc::new(RwLock::new(false)),
        })
    }

    fn bank(&self, target: &str) -> anyhow::Result<&Arc<SimulatedBank>> {
        let short_name = self.engine.registry().lookup(target)?.short_name().to_string();
        self.banks
            .iter()
            .find(|b| b.short_name() == short_name)
            .ok_or_else(|| anyhow::anyhow!("No simulated endpoint for {}", target))
    }

    /// Run a scenario.
    pub async fn run_scenario(&self, scenario: Scenario) -> anyhow::Result<()> {
        info!("Running scenario: {} - {}", scenario.name, scenario.description);

        *self.running.write().await = true;

        for step in &scenario.steps {
            if !*self.running.read().await {
                break;
            }

            self.execute_step(step).await?;
        }

        *self.running.write().await = false;

        Ok(())
    }

    /// Run random queries until `duration` elapses or Ctrl+C.
    pub async fn run(&self, duration: Option<Duration>) -> anyhow::Result<()> {
        info!("Running simulation in continuous mode");

        *self.running.write().await = true;

        let engine = self.engine.clone();
        let metrics = self.metrics.clone();
        let rng = self.rng.clone();
        let running = self.running.clone();

        let handle = tokio::spawn(async move {
            loop {
                if !*running.read().await {
                    break;
                }

                let parsers = engine.registry().active_parsers();
                let (op, bank, currency, days) = {
                    let mut rng = rng.write().await;
                    (
                        rng.gen_range(0..3u8),
                        parsers[rng.gen_range(0..parsers.len())].short_name().to_string(),
                        RANDOM_CURRENCIES[rng.gen_range(0..RANDOM_CURRENCIES.len())],
                        rng.gen_range(0..120u32),
                    )
                };

                match op {
                    0 => {
                        let prefs = QueryPreferences::new(i64::from(days), currency, Some(bank.as_str()));
                        match prefs {
                            Ok(prefs) => course(&engine, &metrics, &prefs, None).await,
                            Err(e) => warn!(error = %e, "Rejected preferences"),
                        }
                    }
                    1 => series(&engine, &metrics, &bank, currency, days).await,
                    _ => best(&engine, &metrics, currency).await,
                }

                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        });

        match duration {
            Some(d) => {
                tokio::time::sleep(d).await;
            }
            None => {
                tokio::signal::ctrl_c().await?;
            }
        }

        *self.running.write().await = false;
        handle.await?;

        Ok(())
    }

    /// Execute a single scenario step.
    async fn execute_step(&self, step: &ScenarioStep) -> anyhow::Result<()> {
        match step {
            ScenarioStep::Wait { millis } => {
                info!("Waiting {} ms", millis);
                tokio::time::sleep(Duration::from_millis(*millis)).await;
            }
            ScenarioStep::QueryCourse {
                bank,
                user,
                currency,
                days_ago,
            } => match QueryPreferences::new(*days_ago, currency, bank.as_deref()) {
                Ok(prefs) => course(&self.engine, &self.metrics, &prefs, user.as_deref()).await,
                Err(e) => {
                    warn!(error = %e, "Rejected preferences");
                    self.metrics.write().await.record_failure(true);
                }
            },
            ScenarioStep::QuerySeries {
                bank,
                currency,
                days_ago,
            } => series(&self.engine, &self.metrics, bank, currency, *days_ago).await,
            ScenarioStep::QueryBest { currency } => {
                best(&self.engine, &self.metrics, currency).await
            }
            ScenarioStep::SetBank { user, bank } => {
                let saved = self
                    .engine
                    .preferences()
                    .set_bank(user, bank, self.engine.registry())
                    .await?;
                info!(user = %user, bank = %saved, "Bank preference set");
            }
            ScenarioStep::InjectFault { fault_type, target } => {
                info!("Injecting fault {:?} on {}", fault_type, target);
                self.bank(target)?.inject_fault(fault_type.clone());
            }
            ScenarioStep::ClearFault { target } => {
                info!("Clearing fault on {}", target);
                self.bank(target)?.clear_fault();
            }
            ScenarioStep::Assert { condition } => self.check(condition).await?,
        }

        Ok(())
    }

    async fn check(&self, condition: &AssertCondition) -> anyhow::Result<()> {
        let metrics = self.metrics.read().await;
        let holds = match condition {
            AssertCondition::FetchesAtMost { bank, count } => self.bank(bank)?.fetches() <= *count,
            AssertCondition::FailedQueries { count } => metrics.failed_queries == *count,
            AssertCondition::SeriesGapsAtLeast { count } => metrics.series_gaps >= *count,
        };

        if holds {
            info!("Assertion held: {:?}", condition);
            Ok(())
        } else {
            Err(anyhow::anyhow!("Assertion failed: {:?} (metrics: {:?})", condition, *metrics))
        }
    }

    /// Get simulation metrics.
    pub async fn get_metrics(&self) -> SimulationMetrics {
        self.metrics.read().await.clone()
    }

    /// Entries currently held by the cache store.
    pub fn cached_entries(&self) -> usize {
        self.store.len()
    }
}

async fn record(
    metrics: &RwLock<SimulationMetrics>,
    kind: QueryKind,
    started: Instant,
    error: Option<&EngineError>,
) {
    let mut metrics = metrics.write().await;
    match error {
        None => metrics.record_success(kind, started.elapsed().as_millis() as u64),
        Some(e) => {
            warn!(code = e.error_code(), error = %e, "Query failed");
            metrics.record_failure(e.is_caller_error());
        }
    }
}

async fn course(
    engine: &RateEngine,
    metrics: &RwLock<SimulationMetrics>,
    prefs: &QueryPreferences,
    user: Option<&str>,
) {
    let started = Instant::now();
    match engine.course(prefs, user).await {
        Ok(course) => {
            for rate in &course.rates {
                info!(bank = %course.bank_short_name, date = %course.date, "{}", rate);
            }
            if course.rates.is_empty() {
                info!(bank = %course.bank_short_name, date = %course.date, "No rates published");
            }
            record(metrics, QueryKind::Course, started, None).await;
        }
        Err(e) => record(metrics, QueryKind::Course, started, Some(&e)).await,
    }
}

async fn series(
    engine: &RateEngine,
    metrics: &RwLock<SimulationMetrics>,
    bank: &str,
    currency: &str,
    days_ago: u32,
) {
    let started = Instant::now();
    match engine.series(bank, currency, days_ago).await {
        Ok(points) => {
            let gaps = points.iter().filter(|(_, r)| r.is_empty()).count();
            let first = points.first().and_then(|(_, r)| r.normalized_sell());
            let last = points.last().and_then(|(_, r)| r.normalized_sell());
            info!(
                bank,
                currency,
                points = points.len(),
                gaps,
                first = ?first,
                last = ?last,
                "Series fetched"
            );
            metrics.write().await.record_gaps(gaps);
            record(metrics, QueryKind::Series, started, None).await;
        }
        Err(e) => record(metrics, QueryKind::Series, started, Some(&e)).await,
    }
}

async fn best(engine: &RateEngine, metrics: &RwLock<SimulationMetrics>, currency: &str) {
    let started = Instant::now();
    match engine.best_rate(currency).await {
        Ok(best) => {
            info!(
                currency = %best.currency,
                buy_bank = ?best.buy.as_ref().map(|q| &q.bank_name),
                buy = ?best.buy.as_ref().and_then(|q| q.rate.buy()),
                sell_bank = ?best.sell.as_ref().map(|q| &q.bank_name),
                sell = ?best.sell.as_ref().and_then(|q| q.rate.sell()),
                "Best rate"
            );
            record(metrics, QueryKind::BestRate, started, None).await;
        }
        Err(e) => record(metrics, QueryKind::BestRate, started, Some(&e)).await,
    }
}
