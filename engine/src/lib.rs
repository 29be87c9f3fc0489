//! Bankrate Engine
//!
//! Aggregates currency buy/sell rates published by several banks.
//!
//! # Features
//!
//! - One [`RateParser`] per bank over a pluggable [`SourceFetcher`]
//! - Historical-rate caching through [`CacheProxy`]; today is always live
//! - Denomination-aware normalization
//! - Bounded-concurrency time series with date sampling
//! - Cross-bank best-rate queries
//!
//! # Example
//!
//! ```rust,ignore
//! use bankrate_engine::{EngineConfig, MemoryStore, ParserRegistry, RateEngine};
//! use bankrate_common::SystemClock;
//!
//! let engine = RateEngine::new(registry, Arc::new(MemoryStore::new()), Arc::new(SystemClock), EngineConfig::from_env())?;
//!
//! let usd = engine.rate("bgp", "USD", engine.today()).await?;
//! let history = engine.series("nbrb", "EUR", 90).await?;
//! let best = engine.best_rate("USD").await?;
//! ```

pub mod best_rate;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod orchestrator;
pub mod parser;
pub mod preferences;
pub mod proxy;
pub mod registry;
pub mod sampler;
pub mod store;

pub use best_rate::{BestQuote, BestRate, BestRateAggregator};
pub use config::EngineConfig;
pub use engine::{Course, RateEngine};
pub use error::{EngineError, EngineResult, FetchError, RowParseError, StoreError};
pub use fetcher::{RawPage, RawRow, SourceFetcher};
pub use orchestrator::FetchOrchestrator;
pub use parser::{BankParser, RateParser};
pub use preferences::BankPreferences;
pub use proxy::CacheProxy;
pub use registry::ParserRegistry;
pub use sampler::DateSampler;
pub use store::{CacheStore, MemoryStore, StoreHandle, StoreStats};

#[cfg(any(test, feature = "test-utils"))]
pub use fetcher::StaticFetcher;
#[cfg(any(test, feature = "test-utils"))]
pub use store::FailingStore;
