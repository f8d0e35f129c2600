use serde::Serialize;

use crate::types::cell::CellValue;

/// Number of cells a quote occupies in an output row.
pub const QUOTE_COLUMNS: usize = 7;

pub const ERROR_PLACEHOLDER: &str = "Error";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub symbol: String,
    pub current: f64,
    pub change: Option<f64>,
    pub percent_change: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub open: Option<f64>,
    pub previous_close: Option<f64>,
}

impl Quote {
    pub fn to_cells(&self) -> Vec<CellValue> {
        vec![
            CellValue::Number(self.current),
            self.change.into(),
            self.percent_change.into(),
            self.high.into(),
            self.low.into(),
            self.open.into(),
            self.previous_close.into(),
        ]
    }
}

/// One output row of the batch fetcher.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteRow {
    Blank,
    Failed,
    Filled(Quote),
    /// Updated too recently; the cells already in the sheet stay as they are.
    Kept,
}

impl QuoteRow {
    pub fn is_kept(&self) -> bool {
        matches!(self, Self::Kept)
    }

    /// Cells to write; empty for a kept row.
    pub fn to_cells(&self) -> Vec<CellValue> {
        match self {
            Self::Kept => Vec::new(),
            Self::Blank => vec![CellValue::Empty; QUOTE_COLUMNS],
            Self::Failed => {
                let mut cells = vec![CellValue::Empty; QUOTE_COLUMNS];
                cells[0] = CellValue::text(ERROR_PLACEHOLDER);
                cells
            }
            Self::Filled(quote) => quote.to_cells(),
        }
    }

    pub fn quote(&self) -> Option<&Quote> {
        match self {
            Self::Filled(quote) => Some(quote),
            _ => None,
        }
    }
}
