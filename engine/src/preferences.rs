//! Per-user bank preference.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::EngineResult;
use crate::registry::ParserRegistry;
use crate::store::StoreHandle;

/// Remembers which bank each user asked for, in a key-value store.
///
/// Shares the store handle (and its availability latch) with the rate cache.
/// When the store is down every user sees the default bank.
pub struct BankPreferences {
    store: Arc<StoreHandle>,
    default_bank: String,
}

impl BankPreferences {
    pub fn new(store: Arc<StoreHandle>, default_bank: impl Into<String>) -> Self {
        Self {
            store,
            default_bank: default_bank.into(),
        }
    }

    fn key(user_id: &str) -> String {
        format!("user_bank_{}", user_id)
    }

    pub fn default_bank(&self) -> &str {
        &self.default_bank
    }

    /// Short name of the user's bank, or the default.
    pub async fn bank_for(&self, user_id: &str) -> String {
        match self.store.read(&Self::key(user_id)).await {
            Some(value) => match String::from_utf8(value) {
                Ok(bank) if !bank.trim().is_empty() => bank,
                _ => self.default_bank.clone(),
            },
            None => {
                debug!(user_id, "No stored bank, using default");
                self.default_bank.clone()
            }
        }
    }

    /// Store the user's bank after resolving it; returns the stored short name.
    pub async fn set_bank(
        &self,
        user_id: &str,
        bank: &str,
        registry: &ParserRegistry,
    ) -> EngineResult<String> {
        let parser = registry.lookup(bank)?;
        let short_name = parser.short_name().to_string();

        if self.store.write(&Self::key(user_id), short_name.as_bytes()).await {
            info!(user_id, bank = %short_name, "Saved bank preference");
        }
        Ok(short_name)
    }
}
