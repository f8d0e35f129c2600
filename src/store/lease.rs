use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::store::property_store::PropertyStore;

const MAX_TTL_SECONDS: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LeaseRecord {
    holder: Uuid,
    expires_at: DateTime<Utc>,
}

/// Short-lived mutual exclusion through the property store, so overlapping
/// invocations cannot both consume the same baseline.
pub struct Lease {
    properties: Arc<dyn PropertyStore>,
    key: String,
    holder: Uuid,
    ttl: TimeDelta,
}

impl Lease {
    pub fn new(properties: Arc<dyn PropertyStore>, key: impl Into<String>, ttl_seconds: u64) -> Self {
        Self {
            properties,
            key: key.into(),
            holder: Uuid::new_v4(),
            ttl: TimeDelta::seconds(ttl_seconds.min(MAX_TTL_SECONDS) as i64),
        }
    }

    /// Returns `false` while another holder's lease is still live, or when
    /// another holder took it between our read and our write.
    pub fn try_acquire(&self, now: DateTime<Utc>) -> Result<bool> {
        let observed = self.properties.get(&self.key)?;
        if let Some(raw) = &observed {
            match serde_json::from_str::<LeaseRecord>(raw) {
                Ok(current) if current.holder != self.holder && current.expires_at > now => {
                    debug!(key = %self.key, holder = %current.holder, "lease held elsewhere");
                    return Ok(false);
                }
                Ok(_) => {}
                Err(error) => warn!(key = %self.key, %error, "ignoring unreadable lease"),
            }
        }

        let record = LeaseRecord {
            holder: self.holder,
            expires_at: now + self.ttl,
        };
        let raw = serde_json::to_string(&record).context("failed to serialize lease")?;

        let acquired = self
            .properties
            .compare_and_swap(&self.key, observed.as_deref(), Some(raw.as_str()))?;
        if !acquired {
            debug!(key = %self.key, "lease taken concurrently");
        }

        Ok(acquired)
    }

    pub fn release(&self) -> Result<()> {
        let Some(raw) = self.properties.get(&self.key)? else {
            return Ok(());
        };

        match serde_json::from_str::<LeaseRecord>(&raw) {
            Ok(current) if current.holder == self.holder => {
                if !self.properties.compare_and_swap(&self.key, Some(raw.as_str()), None)? {
                    debug!(key = %self.key, "lease changed hands before release");
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
