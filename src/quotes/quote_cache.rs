use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::QuoteError;
use crate::quotes::quote_source::QuoteSource;
use crate::types::quote::Quote;

/// Per-symbol quote cache. Only successful lookups are cached.
pub struct QuoteCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Quote)>>,
}

impl QuoteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn fresh(&self, symbol: &str) -> Option<Quote> {
        let entries = self.entries.lock();
        let (fetched_at, quote) = entries.get(symbol)?;

        (fetched_at.elapsed() < self.ttl).then(|| quote.clone())
    }

    /// Returns a quote younger than the TTL or asks `source` for a new one.
    pub async fn get_quote(
        &self,
        source: &dyn QuoteSource,
        symbol: &str,
    ) -> Result<Quote, QuoteError> {
        if let Some(quote) = self.fresh(symbol) {
            debug!(symbol, "quote served from cache");
            return Ok(quote);
        }

        let quote = source.quote(symbol).await?;
        self.entries
            .lock()
            .insert(symbol.to_string(), (Instant::now(), quote.clone()));

        Ok(quote)
    }
}
