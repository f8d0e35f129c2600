use std::time::Duration;

use tracing::{error, info};

use crate::quotes::quote_cache::QuoteCache;
use crate::quotes::quote_source::QuoteSource;
use crate::types::quote::QuoteRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    pub symbol: String,
    pub enabled: bool,
}

impl SymbolEntry {
    pub fn new(symbol: impl Into<String>, enabled: bool) -> Self {
        Self {
            symbol: symbol.into(),
            enabled,
        }
    }
}

pub struct BatchQuoteFetcher<'a> {
    cache: &'a QuoteCache,
    source: &'a dyn QuoteSource,
    request_delay: Duration,
}

impl<'a> BatchQuoteFetcher<'a> {
    pub fn new(cache: &'a QuoteCache, source: &'a dyn QuoteSource, request_delay: Duration) -> Self {
        Self {
            cache,
            source,
            request_delay,
        }
    }

    /// One row per entry, in input order. A failed lookup only affects its own row.
    pub async fn fetch_batch(&self, entries: &[SymbolEntry]) -> Vec<QuoteRow> {
        let mut rows = Vec::with_capacity(entries.len());
        let mut requested = false;
        let mut failed = 0usize;

        for entry in entries {
            let symbol = entry.symbol.trim();
            if !entry.enabled || symbol.is_empty() {
                rows.push(QuoteRow::Blank);
                continue;
            }

            if requested && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
            requested = true;

            match self.cache.get_quote(self.source, symbol).await {
                Ok(quote) => rows.push(QuoteRow::Filled(quote)),
                Err(error) => {
                    error!(symbol, source = self.source.name(), %error, "quote lookup failed");
                    failed += 1;
                    rows.push(QuoteRow::Failed);
                }
            }
        }

        info!(
            total = entries.len(),
            filled = rows.iter().filter(|row| row.quote().is_some()).count(),
            failed,
            "quote batch complete"
        );

        rows
    }
}
