use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local, Utc};
use tracing::{error, info, warn};

use crate::config::app_config::{
    AppConfig, FinnhubSettings, GroupSchedule, OpenExchangeRatesSettings, OutputConfig,
    QuoteGroupConfig, QuoteProvider,
};
use crate::config::credentials::{FinnhubCredentials, OpenExchangeRatesCredentials};
use crate::quotes::batch_fetcher::{BatchQuoteFetcher, SymbolEntry};
use crate::quotes::finnhub_client::FinnhubClient;
use crate::quotes::forex_client::OpenExchangeRatesClient;
use crate::quotes::quote_cache::QuoteCache;
use crate::quotes::quote_source::QuoteSource;
use crate::quotes::symbols::finnhub_symbol;
use crate::store::property_store::{PropertyStore, keys};
use crate::store::table_store::{TableStore, read_to_end};
use crate::types::quote::{Quote, QuoteRow};

/// Reads a group's symbols from its sheet, fetches quotes and writes the
/// result table back next to them.
pub struct QuoteGroupRunner {
    groups: Vec<QuoteGroupConfig>,
    finnhub: FinnhubSettings,
    open_exchange_rates: OpenExchangeRatesSettings,
    output: OutputConfig,
    table: Arc<dyn TableStore>,
    properties: Arc<dyn PropertyStore>,
    caches: HashMap<String, QuoteCache>,
}

impl QuoteGroupRunner {
    pub fn new(
        config: &AppConfig,
        table: Arc<dyn TableStore>,
        properties: Arc<dyn PropertyStore>,
    ) -> Self {
        let caches = config
            .quote_groups
            .iter()
            .map(|group| {
                let mut ttl = group.cache_ttl_seconds;
                if group.provider == QuoteProvider::OpenExchangeRates {
                    ttl = ttl.max(config.open_exchange_rates.min_update_interval_seconds);
                }

                (group.name.clone(), QuoteCache::new(Duration::from_secs(ttl)))
            })
            .collect();

        Self {
            groups: config.quote_groups.clone(),
            finnhub: config.finnhub.clone(),
            open_exchange_rates: config.open_exchange_rates.clone(),
            output: config.output.clone(),
            table,
            properties,
            caches,
        }
    }

    pub fn groups(&self) -> &[QuoteGroupConfig] {
        &self.groups
    }

    /// Credentials are resolved per run so a fixed credential is picked up
    /// by the next cycle.
    fn source_for(&self, group: &QuoteGroupConfig) -> Result<Box<dyn QuoteSource>> {
        let source: Box<dyn QuoteSource> = match group.provider {
            QuoteProvider::Finnhub => {
                let credentials = FinnhubCredentials::resolve(self.properties.as_ref())?;
                Box::new(FinnhubClient::new(&self.finnhub, credentials)?)
            }
            QuoteProvider::OpenExchangeRates => {
                let credentials = OpenExchangeRatesCredentials::resolve(self.properties.as_ref())?;
                Box::new(OpenExchangeRatesClient::new(
                    &self.open_exchange_rates,
                    credentials,
                )?)
            }
        };

        Ok(source)
    }

    /// Runs every group on `schedule`; one group failing does not stop the others.
    pub async fn run_schedule(&self, schedule: GroupSchedule) {
        for group in self.groups.iter().filter(|group| group.schedule == schedule) {
            if let Err(error) = self.run_group(&group.name).await {
                error!(group = %group.name, "quote group failed: {error:#}");
            }
        }
    }

    pub async fn run_group(&self, name: &str) -> Result<Vec<QuoteRow>> {
        let group = self
            .groups
            .iter()
            .find(|group| group.name == name)
            .ok_or_else(|| anyhow!("unknown quote group {name}"))?;

        let source = self.source_for(group)?;

        self.run_with_source(group, source.as_ref()).await
    }

    pub async fn run_with_source(
        &self,
        group: &QuoteGroupConfig,
        source: &dyn QuoteSource,
    ) -> Result<Vec<QuoteRow>> {
        let width = group.code_column.max(group.enabled_column);
        let sheet_rows = read_to_end(self.table.as_ref(), &group.sheet, group.first_row, width)
            .with_context(|| format!("failed to read symbols for {}", group.name))?;

        let entries: Vec<SymbolEntry> = sheet_rows
            .iter()
            .map(|row| {
                let code = row[group.code_column - 1].as_trimmed_string();
                let enabled = row[group.enabled_column - 1].is_truthy();
                let symbol = match (code.is_empty(), group.provider) {
                    (true, _) => String::new(),
                    (false, QuoteProvider::Finnhub) => {
                        finnhub_symbol(group.asset_class, &code, group.exchange.as_deref())
                    }
                    (false, QuoteProvider::OpenExchangeRates) => code.to_uppercase(),
                };

                SymbolEntry::new(symbol, enabled)
            })
            .collect();

        if entries.is_empty() {
            warn!(group = %group.name, "no symbols configured");
            return Ok(Vec::new());
        }

        let cache = self
            .caches
            .get(&group.name)
            .ok_or_else(|| anyhow!("no cache for quote group {}", group.name))?;
        let fetcher = BatchQuoteFetcher::new(
            cache,
            source,
            Duration::from_millis(group.request_delay_ms),
        );

        let now = Utc::now();
        let kept: Vec<bool> = entries
            .iter()
            .map(|entry| self.updated_recently(group, entry, now))
            .collect();
        let requested: Vec<SymbolEntry> = entries
            .iter()
            .zip(&kept)
            .map(|(entry, kept)| SymbolEntry::new(entry.symbol.clone(), entry.enabled && !kept))
            .collect();

        info!(group = %group.name, symbols = entries.len(), source = source.name(), "fetching quotes");
        let mut rows = fetcher.fetch_batch(&requested).await;
        for (row, kept) in rows.iter_mut().zip(&kept) {
            if *kept {
                *row = QuoteRow::Kept;
            }
        }

        self.write_rows(group, &rows)?;
        self.stamp_updates(group, &rows, now);

        if self.output.save_to_file {
            let quotes: Vec<&Quote> = rows.iter().filter_map(QuoteRow::quote).collect();
            if let Err(error) = self.save_to_file(&group.name, &quotes) {
                error!(group = %group.name, "failed to save quotes to file: {error:#}");
            }
        }

        Ok(rows)
    }

    /// Runs of kept rows are skipped so their cells survive.
    fn write_rows(&self, group: &QuoteGroupConfig, rows: &[QuoteRow]) -> Result<()> {
        let mut offset = 0;
        for run in rows.chunk_by(|left, right| left.is_kept() == right.is_kept()) {
            if !run[0].is_kept() {
                let cells: Vec<_> = run.iter().map(QuoteRow::to_cells).collect();
                self.table
                    .write_rows(
                        &group.sheet,
                        group.first_row + offset,
                        group.output_column,
                        &cells,
                    )
                    .with_context(|| format!("failed to write quotes for {}", group.name))?;
            }
            offset += run.len();
        }

        Ok(())
    }

    /// Exchange rates refresh at most once per update interval, across runs
    /// and restarts, so the last fetch time lives in the property store.
    fn updated_recently(
        &self,
        group: &QuoteGroupConfig,
        entry: &SymbolEntry,
        now: DateTime<Utc>,
    ) -> bool {
        if group.provider != QuoteProvider::OpenExchangeRates
            || !entry.enabled
            || entry.symbol.is_empty()
        {
            return false;
        }

        let raw = match self.properties.get(&keys::forex_last_update(&entry.symbol)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(error) => {
                warn!(symbol = %entry.symbol, "failed to read last update: {error:#}");
                return false;
            }
        };

        let Ok(updated_at) = DateTime::parse_from_rfc3339(&raw) else {
            warn!(symbol = %entry.symbol, %raw, "ignoring unreadable last update");
            return false;
        };

        let age_seconds = (now - updated_at.with_timezone(&Utc)).num_seconds();
        let interval_seconds =
            i64::try_from(self.open_exchange_rates.min_update_interval_seconds).unwrap_or(i64::MAX);
        age_seconds < interval_seconds
    }

    fn stamp_updates(&self, group: &QuoteGroupConfig, rows: &[QuoteRow], now: DateTime<Utc>) {
        if group.provider != QuoteProvider::OpenExchangeRates {
            return;
        }

        for quote in rows.iter().filter_map(QuoteRow::quote) {
            if let Err(error) = self
                .properties
                .set(&keys::forex_last_update(&quote.symbol), &now.to_rfc3339())
            {
                error!(symbol = %quote.symbol, "failed to record last update: {error:#}");
            }
        }
    }

    fn save_to_file(&self, group: &str, quotes: &[&Quote]) -> Result<PathBuf> {
        let directory = self
            .output
            .file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("data"));
        fs::create_dir_all(&directory)
            .with_context(|| format!("failed to create {}", directory.display()))?;

        let file_name = format!("{group}_{}.json", Local::now().format("%Y%m%d_%H%M%S"));
        let path = directory.join(file_name);
        let raw = serde_json::to_string_pretty(quotes).context("failed to serialize quotes")?;
        fs::write(&path, raw).with_context(|| format!("failed to write {}", path.display()))?;

        info!(path = %path.display(), count = quotes.len(), "quotes saved to file");
        Ok(path)
    }
}
