use chrono::{DateTime, Utc};

use crate::store::change_log::format_local;
use crate::types::change::Change;

const EMPTY_VALUE: &str = "(empty)";

fn display_value(value: &str) -> &str {
    if value.is_empty() { EMPTY_VALUE } else { value }
}

/// Human-readable digest, one section per collection in first-appearance order.
pub fn format_digest(changes: &[Change], now: DateTime<Utc>, utc_offset_minutes: i32) -> String {
    let mut labels: Vec<&str> = Vec::new();
    for change in changes {
        if !labels.contains(&change.collection_label.as_str()) {
            labels.push(&change.collection_label);
        }
    }

    let mut lines = vec![format!(
        "Decision changes: {} ({})",
        changes.len(),
        format_local(now, utc_offset_minutes)
    )];

    for label in labels {
        lines.push(String::new());
        lines.push(format!("[{label}]"));

        for change in changes.iter().filter(|change| change.collection_label == label) {
            let name = if change.label.is_empty() {
                change.code.clone()
            } else {
                format!("{} {}", change.code, change.label)
            };

            let line = if change.is_new {
                format!("{name}: (new) {}", display_value(&change.current_value))
            } else {
                format!(
                    "{name}: {} -> {}",
                    display_value(&change.previous_value),
                    display_value(&change.current_value)
                )
            };
            lines.push(line);
        }
    }

    lines.join("\n")
}
