//! Engine configuration.

use bankrate_common::{constants, CurrencyCode};

use crate::sampler::{DEFAULT_MAX_BUCKET, DEFAULT_MIN_BUCKET};

/// Main engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Concurrent fetches per series request.
    pub workers: usize,
    /// Smallest bucket count tried by the date sampler.
    pub min_bucket: u32,
    /// Largest bucket count tried by the date sampler.
    pub max_bucket: u32,
    /// Bank used when neither the request nor the user names one.
    pub default_bank: String,
    /// Currency used when a series or best-rate query asks for "all".
    pub default_currency: String,
    /// Range used by a series query with a zero day offset.
    pub default_series_days: u32,
    /// Largest accepted day offset.
    pub max_days_ago: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            min_bucket: DEFAULT_MIN_BUCKET,
            max_bucket: DEFAULT_MAX_BUCKET,
            default_bank: "bgp".to_string(),
            default_currency: "USD".to_string(),
            default_series_days: 30,
            max_days_ago: constants::MAX_DAYS_AGO,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(workers) = std::env::var("BANKRATE_WORKERS") {
            if let Ok(workers) = workers.parse() {
                config.workers = workers;
            }
        }

        if let Ok(min) = std::env::var("BANKRATE_MIN_BUCKET") {
            if let Ok(min) = min.parse() {
                config.min_bucket = min;
            }
        }

        if let Ok(max) = std::env::var("BANKRATE_MAX_BUCKET") {
            if let Ok(max) = max.parse() {
                config.max_bucket = max;
            }
        }

        if let Ok(bank) = std::env::var("BANKRATE_DEFAULT_BANK") {
            config.default_bank = bank.to_lowercase();
        }

        if let Ok(currency) = std::env::var("BANKRATE_DEFAULT_CURRENCY") {
            config.default_currency = currency.to_uppercase();
        }

        if let Ok(days) = std::env::var("BANKRATE_MAX_DAYS_AGO") {
            if let Ok(days) = days.parse() {
                config.max_days_ago = days;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("Worker count cannot be 0".to_string());
        }

        if self.min_bucket == 0 || self.max_bucket < 2 {
            return Err("Sampler buckets must satisfy min >= 1 and max >= 2".to_string());
        }

        if self.min_bucket > self.max_bucket {
            return Err("Minimal bucket cannot exceed maximal bucket".to_string());
        }

        if self.default_bank.trim().is_empty() {
            return Err("Default bank cannot be empty".to_string());
        }

        if CurrencyCode::parse(&self.default_currency).is_err() {
            return Err(format!("Invalid default currency: {}", self.default_currency));
        }

        if self.default_series_days > self.max_days_ago {
            return Err("Default series range exceeds max days ago".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.workers, 10);
        assert_eq!(config.max_days_ago, 2400);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = EngineConfig::default();
        config.workers = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.min_bucket = 40;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.default_currency = "dollars".to_string();
        assert!(config.validate().is_err());
    }
}
