use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::store::property_store::write_json_atomically;
use crate::types::cell::CellValue;

/// Spreadsheet-like store. Rows and columns are 1-based.
pub trait TableStore: Send + Sync {
    fn has_sheet(&self, sheet: &str) -> Result<bool>;

    /// Reads a `num_rows` × `num_cols` region; short rows are padded with empty cells.
    fn read_rows(
        &self,
        sheet: &str,
        first_row: usize,
        first_col: usize,
        num_rows: usize,
        num_cols: usize,
    ) -> Result<Vec<Vec<CellValue>>>;

    fn write_rows(
        &self,
        sheet: &str,
        first_row: usize,
        first_col: usize,
        rows: &[Vec<CellValue>],
    ) -> Result<()>;

    /// Last row holding any non-empty cell, 0 for an empty sheet.
    fn last_row(&self, sheet: &str) -> Result<usize>;

    /// Appends below the last populated row, creating the sheet if needed.
    fn append_row(&self, sheet: &str, row: Vec<CellValue>) -> Result<()>;
}

/// Reads every row from `first_row` down to the last populated one.
pub fn read_to_end(
    store: &dyn TableStore,
    sheet: &str,
    first_row: usize,
    num_cols: usize,
) -> Result<Vec<Vec<CellValue>>> {
    if !store.has_sheet(sheet)? {
        return Err(ConfigError::MissingSheet(sheet.to_string()).into());
    }

    let last_row = store.last_row(sheet)?;
    if last_row < first_row {
        return Ok(Vec::new());
    }

    store.read_rows(sheet, first_row, 1, last_row - first_row + 1, num_cols)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workbook {
    sheets: BTreeMap<String, Vec<Vec<CellValue>>>,
}

impl Workbook {
    pub fn with_sheet(mut self, name: &str, rows: Vec<Vec<CellValue>>) -> Self {
        self.sheets.insert(name.to_string(), rows);
        self
    }

    pub fn sheet(&self, name: &str) -> Option<&Vec<Vec<CellValue>>> {
        self.sheets.get(name)
    }

    fn sheet_or_missing(&self, name: &str) -> Result<&Vec<Vec<CellValue>>> {
        self.sheets
            .get(name)
            .ok_or_else(|| ConfigError::MissingSheet(name.to_string()).into())
    }

    fn read_rows(
        &self,
        sheet: &str,
        first_row: usize,
        first_col: usize,
        num_rows: usize,
        num_cols: usize,
    ) -> Result<Vec<Vec<CellValue>>> {
        let rows = self.sheet_or_missing(sheet)?;
        let row_start = first_row.saturating_sub(1);
        let col_start = first_col.saturating_sub(1);

        Ok((row_start..row_start + num_rows)
            .map(|row_index| {
                (col_start..col_start + num_cols)
                    .map(|col_index| {
                        rows.get(row_index)
                            .and_then(|row| row.get(col_index))
                            .cloned()
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect())
    }

    fn write_rows(
        &mut self,
        sheet: &str,
        first_row: usize,
        first_col: usize,
        values: &[Vec<CellValue>],
    ) -> Result<()> {
        let rows = self
            .sheets
            .get_mut(sheet)
            .ok_or_else(|| ConfigError::MissingSheet(sheet.to_string()))?;
        let row_start = first_row.saturating_sub(1);
        let col_start = first_col.saturating_sub(1);

        for (offset, value_row) in values.iter().enumerate() {
            let row_index = row_start + offset;
            if rows.len() <= row_index {
                rows.resize_with(row_index + 1, Vec::new);
            }

            let row = &mut rows[row_index];
            if row.len() < col_start + value_row.len() {
                row.resize(col_start + value_row.len(), CellValue::Empty);
            }
            for (col_offset, value) in value_row.iter().enumerate() {
                row[col_start + col_offset] = value.clone();
            }
        }

        Ok(())
    }

    fn last_row(&self, sheet: &str) -> Result<usize> {
        let rows = self.sheet_or_missing(sheet)?;

        Ok(rows
            .iter()
            .rposition(|row| row.iter().any(|cell| !cell.is_empty()))
            .map(|index| index + 1)
            .unwrap_or(0))
    }

    fn append_row(&mut self, sheet: &str, row: Vec<CellValue>) -> Result<()> {
        let rows = self.sheets.entry(sheet.to_string()).or_default();
        let last = rows
            .iter()
            .rposition(|row| row.iter().any(|cell| !cell.is_empty()))
            .map(|index| index + 1)
            .unwrap_or(0);

        rows.truncate(last);
        rows.push(row);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTableStore {
    workbook: Mutex<Workbook>,
}

impl InMemoryTableStore {
    pub fn new(workbook: Workbook) -> Self {
        Self {
            workbook: Mutex::new(workbook),
        }
    }

    pub fn snapshot(&self) -> Workbook {
        self.workbook.lock().clone()
    }
}

impl TableStore for InMemoryTableStore {
    fn has_sheet(&self, sheet: &str) -> Result<bool> {
        Ok(self.workbook.lock().sheet(sheet).is_some())
    }

    fn read_rows(
        &self,
        sheet: &str,
        first_row: usize,
        first_col: usize,
        num_rows: usize,
        num_cols: usize,
    ) -> Result<Vec<Vec<CellValue>>> {
        self.workbook
            .lock()
            .read_rows(sheet, first_row, first_col, num_rows, num_cols)
    }

    fn write_rows(
        &self,
        sheet: &str,
        first_row: usize,
        first_col: usize,
        rows: &[Vec<CellValue>],
    ) -> Result<()> {
        self.workbook
            .lock()
            .write_rows(sheet, first_row, first_col, rows)
    }

    fn last_row(&self, sheet: &str) -> Result<usize> {
        self.workbook.lock().last_row(sheet)
    }

    fn append_row(&self, sheet: &str, row: Vec<CellValue>) -> Result<()> {
        self.workbook.lock().append_row(sheet, row)
    }
}

/// Workbook persisted as a JSON object of sheet name to rows of cells.
#[derive(Debug)]
pub struct JsonFileTableStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileTableStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<Workbook> {
        if !self.path.exists() {
            return Ok(Workbook::default());
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read workbook {}", self.path.display()))?;

        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse workbook {}", self.path.display()))
    }

    fn modify(&self, change: impl FnOnce(&mut Workbook) -> Result<()>) -> Result<()> {
        let _guard = self.lock.lock();
        let mut workbook = self.load()?;
        change(&mut workbook)?;
        write_json_atomically(&self.path, &workbook)
    }
}

impl TableStore for JsonFileTableStore {
    fn has_sheet(&self, sheet: &str) -> Result<bool> {
        let _guard = self.lock.lock();
        Ok(self.load()?.sheet(sheet).is_some())
    }

    fn read_rows(
        &self,
        sheet: &str,
        first_row: usize,
        first_col: usize,
        num_rows: usize,
        num_cols: usize,
    ) -> Result<Vec<Vec<CellValue>>> {
        let _guard = self.lock.lock();
        self.load()?
            .read_rows(sheet, first_row, first_col, num_rows, num_cols)
    }

    fn write_rows(
        &self,
        sheet: &str,
        first_row: usize,
        first_col: usize,
        rows: &[Vec<CellValue>],
    ) -> Result<()> {
        self.modify(|workbook| workbook.write_rows(sheet, first_row, first_col, rows))
    }

    fn last_row(&self, sheet: &str) -> Result<usize> {
        let _guard = self.lock.lock();
        self.load()?.last_row(sheet)
    }

    fn append_row(&self, sheet: &str, row: Vec<CellValue>) -> Result<()> {
        self.modify(|workbook| workbook.append_row(sheet, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<CellValue> {
        values.iter().map(|value| CellValue::from(*value)).collect()
    }

    fn store() -> InMemoryTableStore {
        InMemoryTableStore::new(Workbook::default().with_sheet(
            "Stocks",
            vec![
                cells(&["Code", "Price"]),
                cells(&["AAPL"]),
                cells(&["MSFT"]),
                vec![],
            ],
        ))
    }

    #[test]
    fn last_row_ignores_trailing_blank_rows() {
        assert_eq!(store().last_row("Stocks").unwrap(), 3);
    }

    #[test]
    fn reads_are_padded() {
        let rows = store().read_rows("Stocks", 2, 1, 2, 3).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["AAPL".into(), CellValue::Empty, CellValue::Empty]);
    }

    #[test]
    fn writes_extend_rows_and_columns() {
        let store = store();
        store
            .write_rows("Stocks", 3, 4, &[vec![CellValue::Number(1.0)], vec![CellValue::Number(2.0)]])
            .unwrap();

        let rows = store.read_rows("Stocks", 3, 4, 2, 1).unwrap();
        assert_eq!(rows, vec![vec![CellValue::Number(1.0)], vec![CellValue::Number(2.0)]]);
        assert_eq!(store.last_row("Stocks").unwrap(), 4);
    }

    #[test]
    fn missing_sheet_is_a_config_error() {
        let error = read_to_end(&store(), "Nope", 2, 1).unwrap_err();

        assert!(error.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn append_creates_sheet() {
        let store = store();
        store.append_row("Log", cells(&["a"])).unwrap();
        store.append_row("Log", cells(&["b"])).unwrap();

        assert_eq!(store.last_row("Log").unwrap(), 2);
    }

    #[test]
    fn file_store_persists_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workbook.json");
        let store = JsonFileTableStore::new(&path);

        store.append_row("Log", cells(&["first"])).unwrap();

        let reopened = JsonFileTableStore::new(&path);
        assert_eq!(
            reopened.read_rows("Log", 1, 1, 1, 1).unwrap(),
            vec![cells(&["first"])]
        );
    }
}
