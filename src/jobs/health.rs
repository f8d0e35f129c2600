use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::app_config::AppConfig;
use crate::config::credentials::{
    FinnhubCredentials, OpenExchangeRatesCredentials, WebhookCredentials,
};
use crate::jobs::job_kind::JobKind;
use crate::scheduling::trigger_registry::TriggerRegistry;
use crate::store::property_store::{PropertyStore, keys};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub last_check: Option<DateTime<Utc>>,
    pub stale: bool,
    pub window_active: bool,
    /// `None` when no registry is attached, e.g. a one-shot CLI run.
    pub window_job_registered: Option<bool>,
    pub finnhub_credentials: bool,
    pub open_exchange_rates_credentials: bool,
    pub webhook_credentials: bool,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        !self.stale && self.webhook_credentials
    }

    pub fn log(&self, now: DateTime<Utc>) {
        let age_minutes = self.last_check.map(|at| (now - at).num_minutes());

        info!(
            ?age_minutes,
            window_active = self.window_active,
            window_job_registered = ?self.window_job_registered,
            finnhub = self.finnhub_credentials,
            open_exchange_rates = self.open_exchange_rates_credentials,
            webhook = self.webhook_credentials,
            "health check"
        );

        if self.stale {
            warn!(?age_minutes, "decision monitor has not completed recently");
        }

        if !self.webhook_credentials {
            warn!("webhook url is not configured, change digests cannot be sent");
        }

        if let Some(registered) = self.window_job_registered.filter(|r| *r != self.window_active) {
            warn!(
                window_active = self.window_active,
                registered, "window job registration out of step, next reconcile will fix it"
            );
        }
    }
}

pub fn check_health(
    config: &AppConfig,
    properties: &dyn PropertyStore,
    registry: Option<&dyn TriggerRegistry>,
    now: DateTime<Utc>,
) -> Result<HealthReport> {
    let last_check = match properties.get(keys::LAST_CHECK)? {
        Some(raw) => match DateTime::parse_from_rfc3339(&raw) {
            Ok(at) => Some(at.with_timezone(&Utc)),
            Err(error) => {
                warn!(%raw, %error, "unreadable last check timestamp");
                None
            }
        },
        None => None,
    };

    let stale = match last_check {
        Some(at) => (now - at).num_minutes() > config.monitor.stale_after_minutes,
        None => true,
    };

    let window_job_registered = registry.map(|registry| {
        !registry
            .find_by_handler(JobKind::QuotesWindow.handler())
            .is_empty()
    });

    Ok(HealthReport {
        last_check,
        stale,
        window_active: config.trading_window.is_active(now),
        window_job_registered,
        finnhub_credentials: FinnhubCredentials::resolve(properties).is_ok(),
        open_exchange_rates_credentials: OpenExchangeRatesCredentials::resolve(properties).is_ok(),
        webhook_credentials: WebhookCredentials::resolve(properties).is_ok(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::trigger_registry::{InMemoryTriggerRegistry, TriggerSchedule};
    use crate::store::property_store::InMemoryPropertyStore;
    use chrono::{TimeDelta, TimeZone};

    fn config() -> AppConfig {
        AppConfig::from_yaml("monitor:\n  stale_after_minutes: 30\n").unwrap()
    }

    #[test]
    fn never_checked_is_stale() {
        let properties = InMemoryPropertyStore::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 2, 0, 0).unwrap();

        let report = check_health(&config(), &properties, None, now).unwrap();

        assert!(report.stale);
        assert!(!report.is_healthy());
        assert_eq!(report.last_check, None);
        assert_eq!(report.window_job_registered, None);
    }

    #[test]
    fn recent_check_is_fresh_and_old_one_is_stale() {
        let properties = InMemoryPropertyStore::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 2, 0, 0).unwrap();

        properties
            .set(keys::LAST_CHECK, &(now - TimeDelta::minutes(10)).to_rfc3339())
            .unwrap();
        assert!(!check_health(&config(), &properties, None, now).unwrap().stale);

        properties
            .set(keys::LAST_CHECK, &(now - TimeDelta::minutes(45)).to_rfc3339())
            .unwrap();
        assert!(check_health(&config(), &properties, None, now).unwrap().stale);
    }

    #[test]
    fn reports_window_registration_and_stored_webhook() {
        let properties = InMemoryPropertyStore::new();
        properties
            .set(keys::WEBHOOK_URL, "https://hooks.example.com/send?key=abc")
            .unwrap();
        let registry = InMemoryTriggerRegistry::new(480);
        registry
            .create(JobKind::QuotesWindow.handler(), TriggerSchedule::EveryMinutes(1))
            .unwrap();

        // Tuesday 23:00 at UTC+8
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 15, 0, 0).unwrap();
        let report = check_health(&config(), &properties, Some(&registry), now).unwrap();

        assert!(report.window_active);
        assert_eq!(report.window_job_registered, Some(true));
        assert!(report.webhook_credentials);
        assert!(!report.is_healthy());
    }
}
