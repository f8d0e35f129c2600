use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::diff::duplicate_policy::DuplicateKeyPolicy;
use crate::scheduling::trading_window::TradingWindow;
use crate::types::asset_class::AssetClass;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub finnhub: FinnhubSettings,

    #[serde(default)]
    pub open_exchange_rates: OpenExchangeRatesSettings,

    #[serde(default)]
    pub trading_window: TradingWindow,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub quote_groups: Vec<QuoteGroupConfig>,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default directive when `RUST_LOG` is unset, e.g. `info`.
    pub level: String,

    /// Also append plain-text logs here.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub workbook_path: PathBuf,
    pub properties_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            workbook_path: PathBuf::from("workbook.json"),
            properties_path: PathBuf::from("properties.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FinnhubSettings {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for FinnhubSettings {
    fn default() -> Self {
        Self {
            base_url: "https://finnhub.io/api/v1".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenExchangeRatesSettings {
    pub base_url: String,
    pub timeout_seconds: u64,
    /// The free tier refreshes rates hourly.
    pub min_update_interval_seconds: u64,
}

impl Default for OpenExchangeRatesSettings {
    fn default() -> Self {
        Self {
            base_url: "https://openexchangerates.org/api".to_string(),
            timeout_seconds: 30,
            min_update_interval_seconds: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub window_interval_minutes: u32,
    pub always_interval_minutes: u32,
    pub monitor_interval_minutes: u32,
    pub reconcile_interval_minutes: u32,
    pub health_check_hour: u8,
    pub health_check_minute: u8,
    pub tick_seconds: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            window_interval_minutes: 1,
            always_interval_minutes: 5,
            monitor_interval_minutes: 5,
            reconcile_interval_minutes: 60,
            health_check_hour: 9,
            health_check_minute: 0,
            tick_seconds: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupSchedule {
    /// Polled only while the trading window is open.
    TradingWindow,
    /// Polled around the clock (24/7 markets).
    Always,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteProvider {
    #[default]
    Finnhub,
    OpenExchangeRates,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteGroupConfig {
    pub name: String,
    pub sheet: String,
    pub asset_class: AssetClass,
    pub schedule: GroupSchedule,

    #[serde(default)]
    pub provider: QuoteProvider,

    /// Exchange prefix for crypto symbols.
    #[serde(default)]
    pub exchange: Option<String>,

    #[serde(default = "default_first_row")]
    pub first_row: usize,

    #[serde(default = "default_code_column")]
    pub code_column: usize,

    #[serde(default = "default_enabled_column")]
    pub enabled_column: usize,

    /// First of the seven quote columns.
    #[serde(default = "default_output_column")]
    pub output_column: usize,

    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

fn default_first_row() -> usize {
    2
}

fn default_code_column() -> usize {
    1
}

fn default_enabled_column() -> usize {
    9
}

fn default_output_column() -> usize {
    2
}

fn default_cache_ttl_seconds() -> u64 {
    55
}

fn default_request_delay_ms() -> u64 {
    200
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CollectionConfig {
    /// Source identifier prefixed to every record key.
    pub id: String,
    pub label: String,
    pub sheet: String,

    #[serde(default = "default_header_rows")]
    pub header_rows: usize,

    #[serde(default = "default_code_column")]
    pub code_column: usize,

    #[serde(default = "default_label_column")]
    pub label_column: usize,

    pub decision_column: usize,
}

fn default_header_rows() -> usize {
    8
}

fn default_label_column() -> usize {
    2
}

impl CollectionConfig {
    pub fn first_data_row(&self) -> usize {
        self.header_rows + 1
    }

    pub fn width(&self) -> usize {
        self.code_column
            .max(self.label_column)
            .max(self.decision_column)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub collections: Vec<CollectionConfig>,
    pub duplicate_keys: DuplicateKeyPolicy,
    pub lease_seconds: u64,
    pub change_log_sheet: String,
    /// Health check warns when the last monitor run is older than this.
    pub stale_after_minutes: i64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            collections: Vec::new(),
            duplicate_keys: DuplicateKeyPolicy::default(),
            lease_seconds: 120,
            change_log_sheet: "ChangeLog".to_string(),
            stale_after_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub save_to_file: bool,
    pub file_path: Option<PathBuf>,
}

static CONFIG: OnceCell<AppConfig> = OnceCell::new();

impl AppConfig {
    pub const FILE_NAME: &'static str = "config.yml";

    /// Loads and validates the configuration once per process.
    pub fn load(path: &Path) -> Result<&'static AppConfig> {
        CONFIG.get_or_try_init(|| {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;

            Self::from_yaml(&raw).with_context(|| format!("invalid config {}", path.display()))
        })
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(raw).context("failed to parse config")?;
        config.validate()?;

        Ok(config)
    }

    pub fn quote_group(&self, name: &str) -> Option<&QuoteGroupConfig> {
        self.quote_groups.iter().find(|group| group.name == name)
    }

    fn validate(&self) -> Result<()> {
        self.trading_window
            .validate()
            .context("trading_window validation failed")?;

        let schedule = &self.schedule;
        for (name, minutes) in [
            ("window_interval_minutes", schedule.window_interval_minutes),
            ("always_interval_minutes", schedule.always_interval_minutes),
            ("monitor_interval_minutes", schedule.monitor_interval_minutes),
            ("reconcile_interval_minutes", schedule.reconcile_interval_minutes),
        ] {
            if minutes == 0 {
                bail!("schedule.{name} must be > 0");
            }
        }
        if schedule.health_check_hour > 23 || schedule.health_check_minute > 59 {
            bail!("schedule.health_check time is out of range");
        }
        if schedule.tick_seconds == 0 {
            bail!("schedule.tick_seconds must be > 0");
        }

        let mut group_names = HashSet::new();
        for group in &self.quote_groups {
            if !group_names.insert(group.name.as_str()) {
                bail!("duplicate quote group {}", group.name);
            }
            if group.provider == QuoteProvider::OpenExchangeRates
                && group.asset_class != AssetClass::Forex
            {
                bail!("quote group {}: open_exchange_rates only serves forex", group.name);
            }
            if group.first_row == 0
                || group.code_column == 0
                || group.enabled_column == 0
                || group.output_column == 0
            {
                bail!("quote group {}: rows and columns are 1-based", group.name);
            }
        }

        let mut collection_ids = HashSet::new();
        for collection in &self.monitor.collections {
            if !collection_ids.insert(collection.id.as_str()) {
                bail!("duplicate monitored collection id {}", collection.id);
            }
            if collection.code_column == 0
                || collection.label_column == 0
                || collection.decision_column == 0
            {
                bail!("collection {}: columns are 1-based", collection.label);
            }
        }

        if self.monitor.lease_seconds == 0 {
            bail!("monitor.lease_seconds must be > 0");
        }

        Ok(())
    }
}
