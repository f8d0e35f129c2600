use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing::{info, warn};

use quotewatch::config::app_config::AppConfig;
use quotewatch::jobs::health::check_health;
use quotewatch::jobs::{JobKind, JobRunner};
use quotewatch::logging;
use quotewatch::monitor::{CycleOutcome, DecisionMonitor};
use quotewatch::quotes::quote_group::QuoteGroupRunner;
use quotewatch::store::property_store::{JsonFilePropertyStore, PropertyStore};
use quotewatch::store::table_store::{JsonFileTableStore, TableStore};

#[derive(Debug, Clone, Parser)]
struct Args {
    #[arg(long, global = true, default_value = AppConfig::FILE_NAME)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the scheduler until interrupted.
    Run,
    /// Fetch one quote group now.
    Fetch {
        #[arg(long)]
        group: String,
    },
    /// Run one decision monitor cycle.
    Monitor,
    /// Log the health report once.
    Health,
    /// Run a single scheduled job once.
    Job {
        #[arg(value_enum)]
        kind: JobKind,
    },
    /// Persist a value in the property store, e.g. `webhook.url`.
    SetProperty { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let args = Args::parse();
    let config = AppConfig::load(&args.config)?;

    logging::init(&config.logging)?;

    let table: Arc<dyn TableStore> =
        Arc::new(JsonFileTableStore::new(&config.storage.workbook_path));
    let properties: Arc<dyn PropertyStore> =
        Arc::new(JsonFilePropertyStore::new(&config.storage.properties_path));

    match args.command {
        Command::Run => JobRunner::new(config, table, properties).run().await?,
        Command::Fetch { group } => {
            let rows = QuoteGroupRunner::new(config, table, properties)
                .run_group(&group)
                .await?;
            info!(group = %group, rows = rows.len(), "quote group fetched");
        }
        Command::Monitor => {
            match DecisionMonitor::new(config, table, properties)
                .run_cycle(Utc::now())
                .await?
            {
                CycleOutcome::Completed(report) => info!(
                    changes = report.changes.len(),
                    delivered = report.delivered,
                    failed = ?report.failed_collections,
                    "monitor cycle finished"
                ),
                CycleOutcome::Skipped => warn!("monitor cycle skipped"),
            }
        }
        Command::Health => {
            let now = Utc::now();
            let report = check_health(config, properties.as_ref(), None, now)?;
            report.log(now);

            if !report.is_healthy() {
                bail!("health check failed");
            }
        }
        Command::Job { kind } => {
            JobRunner::new(config, table, properties)
                .run_job(kind, Utc::now())
                .await
        }
        Command::SetProperty { key, value } => {
            properties.set(&key, &value)?;
            info!(key = %key, "property stored");
        }
    }

    Ok(())
}
