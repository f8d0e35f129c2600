pub mod digest;
pub mod notifier;
pub mod webhook;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::notify::digest::format_digest;
use crate::notify::notifier::Notifier;
use crate::types::change::Change;

/// Formats `changes` and hands them to `notifier`. Delivery is best effort:
/// failures are logged, never retried. Returns whether the digest was delivered.
pub async fn dispatch(
    notifier: &dyn Notifier,
    changes: &[Change],
    now: DateTime<Utc>,
    utc_offset_minutes: i32,
) -> bool {
    if changes.is_empty() {
        return false;
    }

    let content = format_digest(changes, now, utc_offset_minutes);
    match notifier.send(&content).await {
        Ok(()) => {
            info!(changes = changes.len(), "change digest delivered");
            true
        }
        Err(error) => {
            error!(changes = changes.len(), "change digest delivery failed: {error:#}");
            false
        }
    }
}
