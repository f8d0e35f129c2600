use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::config::app_config::{AppConfig, CollectionConfig, MonitorConfig};
use crate::config::credentials::WebhookCredentials;
use crate::diff::capture::capture_snapshot;
use crate::diff::snapshot_diff::diff_snapshots;
use crate::notify::dispatch;
use crate::notify::notifier::Notifier;
use crate::notify::webhook::WebhookNotifier;
use crate::store::baseline_repository::{BaselineRepository, PropertyBaselineRepository};
use crate::store::change_log::ChangeLog;
use crate::store::lease::Lease;
use crate::store::property_store::{PropertyStore, keys};
use crate::store::table_store::{TableStore, read_to_end};
use crate::types::change::Change;

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub changes: Vec<Change>,
    pub failed_collections: Vec<String>,
    pub delivered: bool,
}

#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another invocation holds the monitor lease.
    Skipped,
}

/// Watches the decision column of every configured collection and reports
/// what changed since the previous cycle.
pub struct DecisionMonitor {
    config: MonitorConfig,
    utc_offset_minutes: i32,
    table: Arc<dyn TableStore>,
    properties: Arc<dyn PropertyStore>,
    baselines: Arc<dyn BaselineRepository>,
    lease: Lease,
}

impl DecisionMonitor {
    pub fn new(
        config: &AppConfig,
        table: Arc<dyn TableStore>,
        properties: Arc<dyn PropertyStore>,
    ) -> Self {
        let baselines = Arc::new(PropertyBaselineRepository::new(properties.clone()));
        let lease = Lease::new(
            properties.clone(),
            keys::MONITOR_LEASE,
            config.monitor.lease_seconds,
        );

        Self {
            config: config.monitor.clone(),
            utc_offset_minutes: config.trading_window.utc_offset_minutes,
            table,
            properties,
            baselines,
            lease,
        }
    }

    /// Full cycle against the configured webhook. A missing webhook aborts
    /// before any baseline is touched.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let credentials = WebhookCredentials::resolve(self.properties.as_ref())?;
        let notifier = WebhookNotifier::new(&credentials.url)?;

        self.run_cycle_with(&notifier, now).await
    }

    pub async fn run_cycle_with(
        &self,
        notifier: &dyn Notifier,
        now: DateTime<Utc>,
    ) -> Result<CycleOutcome> {
        if !self.lease.try_acquire(now).context("failed to acquire monitor lease")? {
            warn!("monitor cycle skipped, another run holds the lease");
            return Ok(CycleOutcome::Skipped);
        }

        let report = self.run_locked(notifier, now).await;

        if let Err(error) = self.lease.release() {
            error!("failed to release monitor lease: {error:#}");
        }

        Ok(CycleOutcome::Completed(report))
    }

    async fn run_locked(&self, notifier: &dyn Notifier, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();

        for collection in &self.config.collections {
            match self.check_collection(collection, now) {
                Ok(mut changes) => {
                    info!(
                        collection = %collection.label,
                        changes = changes.len(),
                        "collection checked"
                    );
                    report.changes.append(&mut changes);
                }
                Err(error) => {
                    error!(collection = %collection.label, "collection check failed: {error:#}");
                    report.failed_collections.push(collection.label.clone());
                }
            }
        }

        report.delivered = dispatch(notifier, &report.changes, now, self.utc_offset_minutes).await;

        /* a cycle that read nothing is not a check */
        let all_failed = !self.config.collections.is_empty()
            && report.failed_collections.len() == self.config.collections.len();
        if all_failed {
            warn!("every collection failed, last check time left unchanged");
        } else if let Err(error) = self.properties.set(keys::LAST_CHECK, &now.to_rfc3339()) {
            error!("failed to record last check time: {error:#}");
        }

        report
    }

    /// Read, diff, replace the baseline and log for one collection.
    pub fn check_collection(
        &self,
        collection: &CollectionConfig,
        now: DateTime<Utc>,
    ) -> Result<Vec<Change>> {
        let first_row = collection.first_data_row();
        let rows = read_to_end(
            self.table.as_ref(),
            &collection.sheet,
            first_row,
            collection.width(),
        )?;

        let current = capture_snapshot(&rows, first_row, collection, self.config.duplicate_keys)?;
        let previous = self.baselines.load(&collection.id)?;

        let changes = diff_snapshots(
            &previous,
            &current,
            &collection.label,
            self.config.duplicate_keys,
        );

        /* the baseline is replaced whether or not anything changed */
        self.baselines.save(&collection.id, &current)?;

        /* once the baseline has moved the changes must still be reported */
        if let Err(error) = ChangeLog::new(
            self.table.as_ref(),
            &self.config.change_log_sheet,
            self.utc_offset_minutes,
        )
        .append(&changes, now)
        {
            error!(
                collection = %collection.label,
                changes = changes.len(),
                "failed to append change log: {error:#}"
            );
        }

        Ok(changes)
    }
}
