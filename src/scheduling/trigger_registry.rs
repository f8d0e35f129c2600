use std::fmt;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Days, NaiveTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

pub type TriggerId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSchedule {
    EveryMinutes(u32),
    /// Local wall-clock time at the registry's UTC offset.
    DailyAt { hour: u8, minute: u8 },
}

impl fmt::Display for TriggerSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EveryMinutes(minutes) => write!(f, "every {minutes}m"),
            Self::DailyAt { hour, minute } => write!(f, "daily at {hour:02}:{minute:02}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub id: TriggerId,
    pub handler: String,
    pub schedule: TriggerSchedule,
}

/// Recurring time-based registrations, addressed by handler name.
pub trait TriggerRegistry: Send + Sync {
    fn list(&self) -> Vec<Trigger>;
    fn create(&self, handler: &str, schedule: TriggerSchedule) -> Result<Trigger>;
    fn delete(&self, id: TriggerId) -> Result<()>;

    fn find_by_handler(&self, handler: &str) -> Vec<Trigger> {
        self.list()
            .into_iter()
            .filter(|trigger| trigger.handler == handler)
            .collect()
    }
}

struct Entry {
    trigger: Trigger,
    next_due: Option<DateTime<Utc>>,
}

/// Process-local registry that also tracks when each trigger is next due.
pub struct InMemoryTriggerRegistry {
    utc_offset_minutes: i32,
    entries: Mutex<Vec<Entry>>,
}

impl InMemoryTriggerRegistry {
    pub fn new(utc_offset_minutes: i32) -> Self {
        Self {
            utc_offset_minutes,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Returns the triggers due at `now` in registration order and schedules
    /// their next firing. A trigger seen for the first time is armed, not fired.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<Trigger> {
        let mut entries = self.entries.lock();
        let mut due = Vec::new();

        for entry in entries.iter_mut() {
            match entry.next_due {
                None => {
                    entry.next_due = Some(next_fire_after(
                        entry.trigger.schedule,
                        now,
                        self.utc_offset_minutes,
                    ));
                }
                Some(next_due) if now >= next_due => {
                    due.push(entry.trigger.clone());
                    entry.next_due = Some(next_fire_after(
                        entry.trigger.schedule,
                        now,
                        self.utc_offset_minutes,
                    ));
                }
                Some(_) => {}
            }
        }

        due
    }
}

impl TriggerRegistry for InMemoryTriggerRegistry {
    fn list(&self) -> Vec<Trigger> {
        self.entries
            .lock()
            .iter()
            .map(|entry| entry.trigger.clone())
            .collect()
    }

    fn create(&self, handler: &str, schedule: TriggerSchedule) -> Result<Trigger> {
        if let TriggerSchedule::EveryMinutes(0) = schedule {
            return Err(anyhow!("trigger interval must be at least one minute"));
        }

        let trigger = Trigger {
            id: Uuid::new_v4(),
            handler: handler.to_string(),
            schedule,
        };

        info!(handler, id = %trigger.id, %schedule, "trigger registered");

        self.entries.lock().push(Entry {
            trigger: trigger.clone(),
            next_due: None,
        });

        Ok(trigger)
    }

    fn delete(&self, id: TriggerId) -> Result<()> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|entry| entry.trigger.id != id);

        if entries.len() == before {
            return Err(anyhow!("no trigger with id {id}"));
        }

        debug!(%id, "trigger deleted");
        Ok(())
    }
}

pub fn next_fire_after(
    schedule: TriggerSchedule,
    after: DateTime<Utc>,
    utc_offset_minutes: i32,
) -> DateTime<Utc> {
    match schedule {
        TriggerSchedule::EveryMinutes(minutes) => after + TimeDelta::minutes(i64::from(minutes)),
        TriggerSchedule::DailyAt { hour, minute } => {
            let offset = TimeDelta::minutes(i64::from(utc_offset_minutes));
            let local = after.naive_utc() + offset;
            let at = NaiveTime::from_hms_opt(u32::from(hour.min(23)), u32::from(minute.min(59)), 0)
                .unwrap_or(NaiveTime::MIN);

            let mut candidate = local.date().and_time(at);
            if candidate <= local {
                candidate = candidate
                    .checked_add_days(Days::new(1))
                    .unwrap_or(candidate);
            }

            (candidate - offset).and_utc()
        }
    }
}
