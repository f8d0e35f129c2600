use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};

use crate::store::table_store::TableStore;
use crate::types::cell::CellValue;
use crate::types::change::Change;

pub const HEADER: [&str; 7] = [
    "Time",
    "Collection",
    "Code",
    "Name",
    "Previous Decision",
    "Current Decision",
    "Row",
];

/// Append-only log of every detected change.
pub struct ChangeLog<'a> {
    store: &'a dyn TableStore,
    sheet: &'a str,
    utc_offset_minutes: i32,
}

impl<'a> ChangeLog<'a> {
    pub fn new(store: &'a dyn TableStore, sheet: &'a str, utc_offset_minutes: i32) -> Self {
        Self {
            store,
            sheet,
            utc_offset_minutes,
        }
    }

    pub fn append(&self, changes: &[Change], now: DateTime<Utc>) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        if !self.store.has_sheet(self.sheet)? || self.store.last_row(self.sheet)? == 0 {
            self.store
                .append_row(self.sheet, HEADER.iter().map(|title| CellValue::from(*title)).collect())
                .context("failed to write change log header")?;
        }

        let time = format_local(now, self.utc_offset_minutes);
        for change in changes {
            self.store
                .append_row(self.sheet, Self::row(change, &time))
                .with_context(|| format!("failed to log change for {}", change.key))?;
        }

        Ok(())
    }

    fn row(change: &Change, time: &str) -> Vec<CellValue> {
        vec![
            CellValue::text(time),
            CellValue::text(&change.collection_label),
            CellValue::text(&change.code),
            CellValue::text(&change.label),
            CellValue::text(&change.previous_value),
            CellValue::text(&change.current_value),
            CellValue::Number(change.position as f64),
        ]
    }
}

pub fn format_local(now: DateTime<Utc>, utc_offset_minutes: i32) -> String {
    (now.naive_utc() + TimeDelta::minutes(i64::from(utc_offset_minutes)))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::table_store::{InMemoryTableStore, Workbook};
    use chrono::TimeZone;

    fn change() -> Change {
        Change {
            key: "S_AAPL".to_string(),
            code: "AAPL".to_string(),
            label: "Apple".to_string(),
            collection_label: "US Stocks".to_string(),
            previous_value: "BUY".to_string(),
            current_value: "SELL".to_string(),
            is_new: false,
            position: 12,
        }
    }

    #[test]
    fn writes_header_once_and_appends() {
        let store = InMemoryTableStore::new(Workbook::default());
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 14, 0, 0).unwrap();
        let log = ChangeLog::new(&store, "ChangeLog", 480);

        log.append(&[change()], now).unwrap();
        log.append(&[change()], now).unwrap();

        assert_eq!(store.last_row("ChangeLog").unwrap(), 3);

        let row = &store.read_rows("ChangeLog", 2, 1, 1, 7).unwrap()[0];
        assert_eq!(row[0], CellValue::text("2024-03-04 22:00:00"));
        assert_eq!(row[5], CellValue::text("SELL"));
        assert_eq!(row[6], CellValue::Number(12.0));
    }

    #[test]
    fn nothing_to_log_leaves_store_untouched() {
        let store = InMemoryTableStore::new(Workbook::default());
        let log = ChangeLog::new(&store, "ChangeLog", 0);

        log.append(&[], Utc::now()).unwrap();

        assert!(!store.has_sheet("ChangeLog").unwrap());
    }
}
