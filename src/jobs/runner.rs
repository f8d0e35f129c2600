use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::app_config::{AppConfig, GroupSchedule};
use crate::jobs::health::check_health;
use crate::jobs::job_kind::JobKind;
use crate::monitor::{CycleOutcome, DecisionMonitor};
use crate::quotes::quote_group::QuoteGroupRunner;
use crate::scheduling::reconciler::WindowReconciler;
use crate::scheduling::trigger_registry::{InMemoryTriggerRegistry, TriggerRegistry, TriggerSchedule};
use crate::store::property_store::PropertyStore;
use crate::store::table_store::TableStore;

/// Long-running driver: owns the trigger registry, keeps the window job in
/// step with the trading window and dispatches due jobs one at a time.
pub struct JobRunner {
    config: AppConfig,
    registry: InMemoryTriggerRegistry,
    reconciler: WindowReconciler,
    quotes: QuoteGroupRunner,
    monitor: DecisionMonitor,
    properties: Arc<dyn PropertyStore>,
}

impl JobRunner {
    pub fn new(
        config: &AppConfig,
        table: Arc<dyn TableStore>,
        properties: Arc<dyn PropertyStore>,
    ) -> Self {
        let reconciler = WindowReconciler::new(
            config.trading_window.clone(),
            JobKind::QuotesWindow.handler(),
            TriggerSchedule::EveryMinutes(config.schedule.window_interval_minutes),
        );

        Self {
            config: config.clone(),
            registry: InMemoryTriggerRegistry::new(config.trading_window.utc_offset_minutes),
            reconciler,
            quotes: QuoteGroupRunner::new(config, table.clone(), properties.clone()),
            monitor: DecisionMonitor::new(config, table, properties.clone()),
            properties,
        }
    }

    pub fn registry(&self) -> &InMemoryTriggerRegistry {
        &self.registry
    }

    fn has_groups(&self, schedule: GroupSchedule) -> bool {
        self.quotes
            .groups()
            .iter()
            .any(|group| group.schedule == schedule)
    }

    /// Registers the unconditional triggers, reconciles the window job once
    /// and arms everything relative to `now`.
    pub fn install(&self, now: DateTime<Utc>) -> Result<()> {
        let schedule = &self.config.schedule;

        let mut unconditional = vec![
            (
                JobKind::MonitorDecisions,
                TriggerSchedule::EveryMinutes(schedule.monitor_interval_minutes),
            ),
            (
                JobKind::WindowReconcile,
                TriggerSchedule::EveryMinutes(schedule.reconcile_interval_minutes),
            ),
            (
                JobKind::HealthCheck,
                TriggerSchedule::DailyAt {
                    hour: schedule.health_check_hour,
                    minute: schedule.health_check_minute,
                },
            ),
        ];

        if self.has_groups(GroupSchedule::Always) {
            unconditional.insert(
                0,
                (
                    JobKind::QuotesAlways,
                    TriggerSchedule::EveryMinutes(schedule.always_interval_minutes),
                ),
            );
        }

        for (kind, trigger_schedule) in unconditional {
            if self.registry.find_by_handler(kind.handler()).is_empty() {
                self.registry
                    .create(kind.handler(), trigger_schedule)
                    .with_context(|| format!("failed to install {kind}"))?;
            }
        }

        self.reconcile(now);
        self.registry.take_due(now);

        Ok(())
    }

    fn reconcile(&self, now: DateTime<Utc>) {
        if !self.has_groups(GroupSchedule::TradingWindow) {
            return;
        }

        match self.reconciler.reconcile(&self.registry, now) {
            Ok(action) => debug!(registered = action.is_registered_after(), "window reconciled"),
            Err(error) => error!("window reconcile failed: {error:#}"),
        }
    }

    /// Runs every job due at `now` and returns what ran.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Vec<JobKind> {
        let mut ran = Vec::new();

        for trigger in self.registry.take_due(now) {
            match trigger.handler.parse::<JobKind>() {
                Ok(kind) => {
                    self.run_job(kind, now).await;
                    ran.push(kind);
                }
                Err(error) => warn!(id = %trigger.id, "skipping trigger: {error:#}"),
            }
        }

        ran
    }

    /// Errors are logged and never escape a job.
    pub async fn run_job(&self, kind: JobKind, now: DateTime<Utc>) {
        info!(job = %kind, "job started");

        match kind {
            JobKind::QuotesWindow => {
                if self.reconciler.window().is_active(now) {
                    self.quotes.run_schedule(GroupSchedule::TradingWindow).await;
                } else {
                    info!("trading window closed, skipping window quotes");
                }
            }
            JobKind::QuotesAlways => self.quotes.run_schedule(GroupSchedule::Always).await,
            JobKind::MonitorDecisions => match self.monitor.run_cycle(now).await {
                Ok(CycleOutcome::Completed(report)) => info!(
                    changes = report.changes.len(),
                    delivered = report.delivered,
                    failed = ?report.failed_collections,
                    "monitor cycle finished"
                ),
                Ok(CycleOutcome::Skipped) => {}
                Err(error) => error!("monitor cycle aborted: {error:#}"),
            },
            JobKind::WindowReconcile => self.reconcile(now),
            JobKind::HealthCheck => {
                match check_health(&self.config, self.properties.as_ref(), Some(&self.registry), now) {
                    Ok(report) => report.log(now),
                    Err(error) => error!("health check failed: {error:#}"),
                }
            }
        }
    }

    pub async fn run(&self) -> Result<()> {
        self.install(Utc::now())?;

        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.schedule.tick_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            tick_seconds = self.config.schedule.tick_seconds,
            triggers = self.registry.list().len(),
            "job runner started"
        );

        loop {
            ticker.tick().await;
            self.run_due(Utc::now()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::property_store::InMemoryPropertyStore;
    use crate::store::table_store::{InMemoryTableStore, Workbook};
    use chrono::{TimeDelta, TimeZone};

    const CONFIG: &str = r#"
schedule:
  window_interval_minutes: 1
  always_interval_minutes: 5
  monitor_interval_minutes: 5
  reconcile_interval_minutes: 60
quote_groups:
  - { name: us, sheet: US, asset_class: stock, schedule: trading_window }
  - { name: crypto, sheet: Crypto, asset_class: crypto, schedule: always }
"#;

    fn runner() -> JobRunner {
        let config = AppConfig::from_yaml(CONFIG).unwrap();
        JobRunner::new(
            &config,
            Arc::new(InMemoryTableStore::new(Workbook::default())),
            Arc::new(InMemoryPropertyStore::new()),
        )
    }

    fn handlers(runner: &JobRunner) -> Vec<String> {
        runner
            .registry()
            .list()
            .into_iter()
            .map(|trigger| trigger.handler)
            .collect()
    }

    // 2024-03-05 is a Tuesday; 15:00 UTC is 23:00 at UTC+8.
    fn open() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 15, 0, 0).unwrap()
    }

    fn closed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 4, 0, 0).unwrap()
    }

    #[test]
    fn install_inside_window_registers_window_job() {
        let runner = runner();
        runner.install(open()).unwrap();

        assert_eq!(
            handlers(&runner),
            vec![
                "quotes.always",
                "monitor.decisions",
                "window.reconcile",
                "health.check",
                "quotes.window",
            ]
        );
    }

    #[test]
    fn install_outside_window_leaves_window_job_out() {
        let runner = runner();
        runner.install(closed()).unwrap();

        assert!(!handlers(&runner).contains(&"quotes.window".to_string()));
    }

    #[test]
    fn install_twice_does_not_duplicate() {
        let runner = runner();
        runner.install(open()).unwrap();
        runner.install(open()).unwrap();

        assert_eq!(handlers(&runner).len(), 5);
    }

    #[tokio::test]
    async fn nothing_runs_before_the_first_interval() {
        let runner = runner();
        runner.install(closed()).unwrap();

        assert!(runner.run_due(closed() + TimeDelta::seconds(30)).await.is_empty());
    }

    #[tokio::test]
    async fn reconcile_job_removes_window_job_after_close() {
        let runner = runner();
        // Tuesday 04:00 local, one hour before the window closes
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 20, 0, 0).unwrap();
        runner.install(start).unwrap();
        assert!(handlers(&runner).contains(&"quotes.window".to_string()));

        let ran = runner.run_due(start + TimeDelta::minutes(60)).await;

        assert!(ran.contains(&JobKind::WindowReconcile));
        assert!(!handlers(&runner).contains(&"quotes.window".to_string()));
    }
}
