use anyhow::{Result, bail};
use tracing::warn;

use crate::config::app_config::CollectionConfig;
use crate::diff::duplicate_policy::DuplicateKeyPolicy;
use crate::diff::snapshot_diff::find_duplicate_keys;
use crate::types::cell::CellValue;
use crate::types::record::{Record, Snapshot};

fn cell_at(row: &[CellValue], column: usize) -> String {
    /* columns are 1-based */
    column
        .checked_sub(1)
        .and_then(|index| row.get(index))
        .map(CellValue::as_trimmed_string)
        .unwrap_or_default()
}

/// Builds a snapshot from rows read starting at sheet row `first_row`.
/// Rows without a code are skipped.
pub fn capture_snapshot(
    rows: &[Vec<CellValue>],
    first_row: usize,
    collection: &CollectionConfig,
    policy: DuplicateKeyPolicy,
) -> Result<Snapshot> {
    let records: Vec<Record> = rows
        .iter()
        .enumerate()
        .filter_map(|(offset, row)| {
            let code = cell_at(row, collection.code_column);
            if code.is_empty() {
                return None;
            }

            Some(Record::new(
                &collection.id,
                &code,
                cell_at(row, collection.label_column),
                cell_at(row, collection.decision_column),
                first_row + offset,
            ))
        })
        .collect();

    let snapshot = Snapshot::new(records);
    let duplicates = find_duplicate_keys(&snapshot);

    if !duplicates.is_empty() {
        if policy == DuplicateKeyPolicy::Reject {
            bail!(
                "duplicate codes in collection {}: {}",
                collection.label,
                duplicates.join(", ")
            );
        }

        warn!(
            collection = %collection.label,
            ?duplicates,
            %policy,
            "duplicate codes in monitored collection"
        );
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection() -> CollectionConfig {
        CollectionConfig {
            id: "S".to_string(),
            label: "US Stocks".to_string(),
            sheet: "Watchlist".to_string(),
            header_rows: 8,
            code_column: 1,
            label_column: 2,
            decision_column: 4,
        }
    }

    fn row(cells: &[&str]) -> Vec<CellValue> {
        cells.iter().map(|cell| CellValue::text(*cell)).collect()
    }

    #[test]
    fn maps_columns_and_positions() {
        let rows = vec![
            row(&[" AAPL ", "Apple", "x", " BUY "]),
            row(&["", "blank code", "", "SELL"]),
            row(&["MSFT", "Microsoft"]),
        ];

        let snapshot =
            capture_snapshot(&rows, 9, &collection(), DuplicateKeyPolicy::LastWins).unwrap();

        assert_eq!(snapshot.len(), 2);

        let apple = &snapshot.records()[0];
        assert_eq!(apple.key, "S_AAPL");
        assert_eq!(apple.label, "Apple");
        assert_eq!(apple.decision, "BUY");
        assert_eq!(apple.position, 9);

        let microsoft = &snapshot.records()[1];
        assert_eq!(microsoft.decision, "");
        assert_eq!(microsoft.position, 11);
    }

    #[test]
    fn duplicates_are_kept_unless_rejected() {
        let rows = vec![row(&["AAPL", "", "", "BUY"]), row(&["AAPL", "", "", "SELL"])];

        let kept =
            capture_snapshot(&rows, 9, &collection(), DuplicateKeyPolicy::LastWins).unwrap();
        assert_eq!(kept.len(), 2);

        assert!(capture_snapshot(&rows, 9, &collection(), DuplicateKeyPolicy::Reject).is_err());
    }

    #[test]
    fn numeric_codes_are_rendered_as_text() {
        let rows = vec![vec![CellValue::Number(700.0), CellValue::Empty, CellValue::Empty, CellValue::text("HOLD")]];

        let snapshot =
            capture_snapshot(&rows, 9, &collection(), DuplicateKeyPolicy::LastWins).unwrap();

        assert_eq!(snapshot.records()[0].code, "700");
    }
}
