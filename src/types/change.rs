use serde::Serialize;

/// A detected difference in the decision field of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub key: String,
    pub code: String,
    pub label: String,
    pub collection_label: String,
    pub previous_value: String,
    pub current_value: String,
    pub is_new: bool,
    pub position: usize,
}
