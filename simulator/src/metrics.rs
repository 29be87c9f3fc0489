//! Simulation metrics.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

const LATENCY_WINDOW: usize = 2048;

/// Front-end operation a query exercised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryKind {
    Course,
    Series,
    BestRate,
}

/// Latency summary for one query kind over the recent window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LatencyReport {
    pub samples: usize,
    pub median_ms: u64,
    pub p99_ms: u64,
    pub max_ms: u64,
}

impl LatencyReport {
    fn from_window(window: &VecDeque<u64>) -> Self {
        let mut sorted: Vec<u64> = window.iter().copied().collect();
        sorted.sort_unstable();
        let Some(&max_ms) = sorted.last() else {
            return Self::default();
        };

        let rank = |pct: usize| sorted[(sorted.len() * pct / 100).min(sorted.len() - 1)];
        Self {
            samples: sorted.len(),
            median_ms: rank(50),
            p99_ms: rank(99),
            max_ms,
        }
    }
}

/// Simulation metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationMetrics {
    /// Total queries issued.
    pub total_queries: u64,
    /// Queries that returned an answer.
    pub successful_queries: u64,
    /// Queries that returned an error.
    pub failed_queries: u64,
    /// Failures caused by the request itself (unknown bank, bad currency).
    pub caller_errors: u64,
    /// Empty points across all series.
    pub series_gaps: u64,
    /// Recent answer latencies (ms) per query kind.
    #[serde(skip)]
    windows: BTreeMap<QueryKind, VecDeque<u64>>,
}

impl SimulationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a query that returned an answer.
    pub fn record_success(&mut self, kind: QueryKind, latency_ms: u64) {
        self.total_queries += 1;
        self.successful_queries += 1;

        let window = self.windows.entry(kind).or_default();
        if window.len() == LATENCY_WINDOW {
            window.pop_front();
        }
        window.push_back(latency_ms);
    }

    /// Record a failed query.
    pub fn record_failure(&mut self, caller_error: bool) {
        self.total_queries += 1;
        self.failed_queries += 1;
        if caller_error {
            self.caller_errors += 1;
        }
    }

    pub fn record_gaps(&mut self, gaps: usize) {
        self.series_gaps += gaps as u64;
    }

    /// Latency summary per query kind that answered at least once.
    pub fn latency(&self) -> BTreeMap<QueryKind, LatencyReport> {
        self.windows
            .iter()
            .map(|(kind, window)| (*kind, LatencyReport::from_window(window)))
            .collect()
    }

    /// Share of failures that were not the caller's fault.
    pub fn infrastructure_failure_rate(&self) -> f64 {
        if self.total_queries == 0 {
            return 0.0;
        }
        (self.failed_queries - self.caller_errors) as f64 / self.total_queries as f64
    }
}

/// Everything printed at the end of a run.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    #[serde(flatten)]
    pub metrics: SimulationMetrics,
    pub cached_entries: usize,
    pub latency: BTreeMap<QueryKind, LatencyReport>,
}

impl SimulationReport {
    pub fn new(metrics: SimulationMetrics, cached_entries: usize) -> Self {
        let latency = metrics.latency();
        Self {
            metrics,
            cached_entries,
            latency,
        }
    }
}
