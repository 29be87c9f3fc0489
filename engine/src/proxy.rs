//! Caching proxy around a bank parser.

use std::sync::Arc;

use async_trait::async_trait;
use bankrate_common::{Clock, ParserDescriptor, Rate};
use chrono::NaiveDate;
use tracing::{debug, instrument, warn};

use crate::codec::{cache_key, decode_rate, encode_rate};
use crate::error::EngineResult;
use crate::parser::{require_supported, RateParser};
use crate::store::StoreHandle;

/// Wraps a parser with the historical-rate cache.
///
/// Rates for today (or later) are always fetched live and never touch the
/// store, since a bank may still revise them during the day. Past rates are
/// served from the store when present and written back after a live fetch.
pub struct CacheProxy {
    parser: Arc<dyn RateParser>,
    store: Arc<StoreHandle>,
    clock: Arc<dyn Clock>,
}

impl CacheProxy {
    pub fn new(parser: Arc<dyn RateParser>, store: Arc<StoreHandle>, clock: Arc<dyn Clock>) -> Self {
        Self { parser, store, clock }
    }

    /// The wrapped parser.
    pub fn inner(&self) -> &Arc<dyn RateParser> {
        &self.parser
    }

    fn is_live(&self, date: NaiveDate) -> bool {
        date >= self.clock.today()
    }
}

#[async_trait]
impl RateParser for CacheProxy {
    fn descriptor(&self) -> &ParserDescriptor {
        self.parser.descriptor()
    }

    #[instrument(skip(self), fields(bank = %self.short_name()))]
    async fn get_currency(&self, currency: &str, date: NaiveDate) -> EngineResult<Rate> {
        let code = require_supported(self.descriptor(), currency)?;

        if self.is_live(date) {
            return self.parser.get_currency(code.as_str(), date).await;
        }

        let key = cache_key(self.short_name(), code.as_str(), date);
        if let Some(value) = self.store.read(&key).await {
            match decode_rate(self.short_name(), &code, date, &value) {
                Some(rate) => {
                    debug!(%key, "Cache hit");
                    return Ok(rate);
                }
                None => warn!(%key, "Unreadable cache entry, refetching"),
            }
        }

        debug!(%key, "Cache miss");
        let rate = self.parser.get_currency(code.as_str(), date).await?;
        if !rate.is_empty() {
            self.store.write(&key, &encode_rate(&rate)).await;
        }
        Ok(rate)
    }

    #[instrument(skip(self), fields(bank = %self.short_name()))]
    async fn get_all_currencies(&self, date: NaiveDate) -> EngineResult<Vec<Rate>> {
        let rates = self.parser.get_all_currencies(date).await?;
        if self.is_live(date) {
            return Ok(rates);
        }

        let mut written = 0usize;
        for rate in rates.iter().filter(|r| !r.is_empty()) {
            let key = cache_key(self.short_name(), rate.currency_iso(), date);
            if self.store.write(&key, &encode_rate(rate)).await {
                written += 1;
            }
        }
        debug!(written, total = rates.len(), "Cached rate batch");

        Ok(rates)
    }
}
