use std::fmt;

use serde::{Deserialize, Serialize};

/// A single cell of a tabular store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Cell contents as trimmed text; empty cells become `""`.
    pub fn as_trimmed_string(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(text) => text.trim().to_string(),
            other => other.to_string(),
        }
    }

    /// Checkbox semantics: `TRUE`, `yes`, `y`, `1` and non-zero numbers enable.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Empty => false,
            Self::Bool(value) => *value,
            Self::Number(value) => *value != 0.0,
            Self::Text(text) => matches!(
                text.trim().to_ascii_lowercase().as_str(),
                "true" | "yes" | "y" | "1" | "on"
            ),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Bool(value) => write!(f, "{}", if *value { "TRUE" } else { "FALSE" }),
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(text) => write!(f, "{text}"),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Option<f64>> for CellValue {
    fn from(value: Option<f64>) -> Self {
        value.map(Self::Number).unwrap_or(Self::Empty)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkbox_values() {
        assert!(CellValue::Bool(true).is_truthy());
        assert!(CellValue::text(" TRUE ").is_truthy());
        assert!(CellValue::Number(1.0).is_truthy());
        assert!(!CellValue::text("no").is_truthy());
        assert!(!CellValue::Empty.is_truthy());
    }

    #[test]
    fn untagged_json_shape() {
        let row: Vec<CellValue> = serde_json::from_str(r#"["AAPL", 1.5, true, null]"#).unwrap();

        assert_eq!(
            row,
            vec![
                CellValue::text("AAPL"),
                CellValue::Number(1.5),
                CellValue::Bool(true),
                CellValue::Empty,
            ]
        );
    }
}
