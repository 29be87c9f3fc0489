//! Simulation scenarios.

use serde::{Deserialize, Serialize};

/// A simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// A step in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScenarioStep {
    /// Wait for a duration.
    Wait { millis: u64 },
    /// Ask for one bank's rates, like the course command.
    QueryCourse {
        bank: Option<String>,
        user: Option<String>,
        currency: String,
        days_ago: i64,
    },
    /// Ask for a sampled history.
    QuerySeries {
        bank: String,
        currency: String,
        days_ago: u32,
    },
    /// Ask for the best rate across banks.
    QueryBest { currency: String },
    /// Remember a bank for a user.
    SetBank { user: String, bank: String },
    /// Inject a fault.
    InjectFault { fault_type: FaultType, target: String },
    /// Clear a fault.
    ClearFault { target: String },
    /// Assert a condition.
    Assert { condition: AssertCondition },
}

/// Types of faults that can be injected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultType {
    /// Bank endpoint refuses connections.
    BankOffline,
    /// Extra latency per page.
    NetworkLatency { delay_ms: u64 },
    /// Page comes back without a usable rate table.
    GarbledPage,
}

/// Conditions that can be asserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AssertCondition {
    /// A bank has served at most this many pages so far.
    FetchesAtMost { bank: String, count: u64 },
    /// Failed queries so far.
    FailedQueries { count: u64 },
    /// Series points that came back empty so far.
    SeriesGapsAtLeast { count: u64 },
}

impl Scenario {
    /// Load a scenario by name.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "course" => Ok(Self::course()),
            "series" => Ok(Self::series()),
            "best-rate" => Ok(Self::best_rate()),
            "outage" => Ok(Self::outage()),
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    pub fn names() -> &'static [&'static str] {
        &["course", "series", "best-rate", "outage"]
    }

    /// Course queries with explicit, remembered and default banks.
    fn course() -> Self {
        Self {
            name: "course".to_string(),
            description: "Course lookups and bank preferences".to_string(),
            steps: vec![
                ScenarioStep::QueryCourse {
                    bank: None,
                    user: None,
                    currency: "all".to_string(),
                    days_ago: 0,
                },
                ScenarioStep::SetBank {
                    user: "1001".to_string(),
                    bank: "Нацбанк РБ".to_string(),
                },
                ScenarioStep::QueryCourse {
                    bank: None,
                    user: Some("1001".to_string()),
                    currency: "USD".to_string(),
                    days_ago: 3,
                },
                // served from the cache
                ScenarioStep::QueryCourse {
                    bank: Some("nbrb".to_string()),
                    user: None,
                    currency: "USD".to_string(),
                    days_ago: 3,
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::FetchesAtMost {
                        bank: "nbrb".to_string(),
                        count: 1,
                    },
                },
                // oldest accepted offset
                ScenarioStep::QueryCourse {
                    bank: Some("bgp".to_string()),
                    user: None,
                    currency: "EUR".to_string(),
                    days_ago: 2400,
                },
                ScenarioStep::QueryCourse {
                    bank: Some("bgp".to_string()),
                    user: None,
                    currency: "UAH".to_string(),
                    days_ago: 0,
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::FailedQueries { count: 1 },
                },
            ],
        }
    }

    /// Long series, then the same series again from the cache.
    fn series() -> Self {
        Self {
            name: "series".to_string(),
            description: "Sampled history with cache reuse".to_string(),
            steps: vec![
                ScenarioStep::QuerySeries {
                    bank: "nbrb".to_string(),
                    currency: "USD".to_string(),
                    days_ago: 365,
                },
                ScenarioStep::QuerySeries {
                    bank: "nbrb".to_string(),
                    currency: "USD".to_string(),
                    days_ago: 365,
                },
                // 30 sampled points, only today is fetched again
                ScenarioStep::Assert {
                    condition: AssertCondition::FetchesAtMost {
                        bank: "nbrb".to_string(),
                        count: 31,
                    },
                },
                ScenarioStep::QuerySeries {
                    bank: "bgp".to_string(),
                    currency: "EUR".to_string(),
                    days_ago: 0,
                },
            ],
        }
    }

    /// Best rate with one bank unreachable.
    fn best_rate() -> Self {
        Self {
            name: "best-rate".to_string(),
            description: "Cross-bank best rate".to_string(),
            steps: vec![
                ScenarioStep::QueryBest {
                    currency: "USD".to_string(),
                },
                ScenarioStep::InjectFault {
                    fault_type: FaultType::BankOffline,
                    target: "bgp".to_string(),
                },
                ScenarioStep::QueryBest {
                    currency: "EUR".to_string(),
                },
                ScenarioStep::ClearFault {
                    target: "bgp".to_string(),
                },
                ScenarioStep::QueryBest {
                    currency: "GBP".to_string(),
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::FailedQueries { count: 0 },
                },
            ],
        }
    }

    /// Series through a flaky source.
    fn outage() -> Self {
        Self {
            name: "outage".to_string(),
            description: "Series gaps while a bank is down".to_string(),
            steps: vec![
                ScenarioStep::InjectFault {
                    fault_type: FaultType::NetworkLatency { delay_ms: 50 },
                    target: "prbp".to_string(),
                },
                ScenarioStep::QuerySeries {
                    bank: "prbp".to_string(),
                    currency: "EUR".to_string(),
                    days_ago: 14,
                },
                ScenarioStep::InjectFault {
                    fault_type: FaultType::BankOffline,
                    target: "prbp".to_string(),
                },
                ScenarioStep::QuerySeries {
                    bank: "prbp".to_string(),
                    currency: "USD".to_string(),
                    days_ago: 14,
                },
                ScenarioStep::Assert {
                    condition: AssertCondition::SeriesGapsAtLeast { count: 15 },
                },
                ScenarioStep::ClearFault {
                    target: "prbp".to_string(),
                },
                ScenarioStep::InjectFault {
                    fault_type: FaultType::GarbledPage,
                    target: "prbp".to_string(),
                },
                ScenarioStep::QueryCourse {
                    bank: Some("prbp".to_string()),
                    user: None,
                    currency: "all".to_string(),
                    days_ago: 0,
                },
                ScenarioStep::Wait { millis: 100 },
            ],
        }
    }
}
