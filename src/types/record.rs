use serde::{Deserialize, Serialize};

/// One monitored entity at capture time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    pub code: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub decision: String,
    /// Sheet row at capture time. Not part of identity.
    #[serde(default)]
    pub position: usize,
}

impl Record {
    pub fn new(
        source_id: &str,
        code: &str,
        label: impl Into<String>,
        decision: impl Into<String>,
        position: usize,
    ) -> Self {
        let code = code.trim().to_string();

        Self {
            key: record_key(source_id, &code),
            code,
            label: label.into(),
            decision: decision.into(),
            position,
        }
    }
}

/// Composite key; the source identifier keeps equal codes from two
/// collections apart.
pub fn record_key(source_id: &str, code: &str) -> String {
    format!("{source_id}_{}", code.trim())
}

/// Ordered records captured from one collection at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    records: Vec<Record>,
}

impl Snapshot {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
}

impl From<Vec<Record>> for Snapshot {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_joins_source_and_trimmed_code() {
        let record = Record::new("S", "  AAPL ", "Apple", "BUY", 9);

        assert_eq!(record.key, "S_AAPL");
        assert_eq!(record.code, "AAPL");
    }

    #[test]
    fn snapshot_serializes_as_plain_array() {
        let snapshot = Snapshot::new(vec![Record::new("C", "BTC", "", "HOLD", 10)]);
        let json = serde_json::to_string(&snapshot).unwrap();

        assert!(json.starts_with('['));
        assert_eq!(serde_json::from_str::<Snapshot>(&json).unwrap(), snapshot);
    }
}
