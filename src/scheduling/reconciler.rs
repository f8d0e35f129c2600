use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::scheduling::{
    trading_window::TradingWindow,
    trigger_registry::{TriggerRegistry, TriggerSchedule},
    types::ReconcileAction,
};

/// Keeps one conditional job registered exactly while the trading window is open.
pub struct WindowReconciler {
    window: TradingWindow,
    handler: String,
    schedule: TriggerSchedule,
}

impl WindowReconciler {
    pub fn new(window: TradingWindow, handler: impl Into<String>, schedule: TriggerSchedule) -> Self {
        Self {
            window,
            handler: handler.into(),
            schedule,
        }
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }

    pub fn window(&self) -> &TradingWindow {
        &self.window
    }

    pub fn reconcile(
        &self,
        registry: &dyn TriggerRegistry,
        now: DateTime<Utc>,
    ) -> Result<ReconcileAction> {
        let active = self.window.is_active(now);
        let existing = registry.find_by_handler(&self.handler);

        match (active, existing.is_empty()) {
            (true, true) => {
                let trigger = registry
                    .create(&self.handler, self.schedule)
                    .with_context(|| format!("failed to register {}", self.handler))?;

                info!(handler = %self.handler, id = %trigger.id, "trading window open, job registered");
                Ok(ReconcileAction::Registered(trigger.id))
            }
            (false, false) => {
                for trigger in &existing {
                    registry
                        .delete(trigger.id)
                        .with_context(|| format!("failed to deregister {}", self.handler))?;
                }

                info!(handler = %self.handler, removed = existing.len(), "trading window closed, job deregistered");
                Ok(ReconcileAction::Deregistered {
                    removed: existing.len(),
                })
            }
            (active, _) => {
                debug!(handler = %self.handler, active, "registration already matches window");
                Ok(ReconcileAction::NoChange { registered: active })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::trigger_registry::InMemoryTriggerRegistry;
    use chrono::TimeZone;

    const HANDLER: &str = "quotes.window";

    fn reconciler() -> WindowReconciler {
        WindowReconciler::new(
            TradingWindow::default(),
            HANDLER,
            TriggerSchedule::EveryMinutes(1),
        )
    }

    /// Monday 22:00 at UTC+8
    fn open() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 14, 0, 0).unwrap()
    }

    /// Monday 12:00 at UTC+8
    fn closed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 4, 0, 0).unwrap()
    }

    #[test]
    fn registers_when_active_and_absent() {
        let registry = InMemoryTriggerRegistry::new(480);
        let action = reconciler().reconcile(&registry, open()).unwrap();

        assert!(matches!(action, ReconcileAction::Registered(_)));
        assert_eq!(registry.find_by_handler(HANDLER).len(), 1);
    }

    #[test]
    fn deregisters_when_inactive_and_present() {
        let registry = InMemoryTriggerRegistry::new(480);
        registry
            .create(HANDLER, TriggerSchedule::EveryMinutes(1))
            .unwrap();

        let action = reconciler().reconcile(&registry, closed()).unwrap();

        assert_eq!(action, ReconcileAction::Deregistered { removed: 1 });
        assert!(registry.find_by_handler(HANDLER).is_empty());
    }

    #[test]
    fn inactive_and_absent_is_a_no_op() {
        let registry = InMemoryTriggerRegistry::new(480);
        let action = reconciler().reconcile(&registry, closed()).unwrap();

        assert_eq!(action, ReconcileAction::NoChange { registered: false });
        assert!(registry.list().is_empty());
    }

    #[test]
    fn reconciling_twice_is_idempotent() {
        let registry = InMemoryTriggerRegistry::new(480);
        let reconciler = reconciler();

        reconciler.reconcile(&registry, open()).unwrap();
        let after_first = registry.list();

        let second = reconciler.reconcile(&registry, open()).unwrap();

        assert_eq!(second, ReconcileAction::NoChange { registered: true });
        assert_eq!(registry.list(), after_first);
    }

    #[test]
    fn leaves_other_handlers_alone() {
        let registry = InMemoryTriggerRegistry::new(480);
        registry
            .create("quotes.always", TriggerSchedule::EveryMinutes(5))
            .unwrap();
        registry
            .create(HANDLER, TriggerSchedule::EveryMinutes(1))
            .unwrap();

        reconciler().reconcile(&registry, closed()).unwrap();

        let remaining = registry.list();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].handler, "quotes.always");
    }
}
