use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use crate::store::property_store::{PropertyStore, keys};
use crate::types::record::Snapshot;

/// Previous-snapshot storage, one baseline per monitored collection.
pub trait BaselineRepository: Send + Sync {
    fn load(&self, collection_id: &str) -> Result<Snapshot>;
    fn save(&self, collection_id: &str, snapshot: &Snapshot) -> Result<()>;
}

/// Baselines serialized as JSON text in the property store.
pub struct PropertyBaselineRepository {
    properties: Arc<dyn PropertyStore>,
}

impl PropertyBaselineRepository {
    pub fn new(properties: Arc<dyn PropertyStore>) -> Self {
        Self { properties }
    }
}

impl BaselineRepository for PropertyBaselineRepository {
    fn load(&self, collection_id: &str) -> Result<Snapshot> {
        let key = keys::baseline(collection_id);
        let Some(raw) = self.properties.get(&key)? else {
            return Ok(Snapshot::default());
        };

        match serde_json::from_str(&raw) {
            Ok(snapshot) => Ok(snapshot),
            Err(error) => {
                /* a corrupt baseline is replaced at the end of the cycle */
                warn!(collection_id, %error, "unreadable baseline, starting from empty");
                Ok(Snapshot::default())
            }
        }
    }

    fn save(&self, collection_id: &str, snapshot: &Snapshot) -> Result<()> {
        let raw = serde_json::to_string(snapshot).context("failed to serialize baseline")?;

        self.properties
            .set(&keys::baseline(collection_id), &raw)
            .with_context(|| format!("failed to save baseline for {collection_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::property_store::InMemoryPropertyStore;
    use crate::types::record::Record;

    #[test]
    fn missing_baseline_is_empty() {
        let repository = PropertyBaselineRepository::new(Arc::new(InMemoryPropertyStore::new()));

        assert!(repository.load("S").unwrap().is_empty());
    }

    #[test]
    fn baselines_are_kept_per_collection() {
        let repository = PropertyBaselineRepository::new(Arc::new(InMemoryPropertyStore::new()));
        let stocks = Snapshot::new(vec![Record::new("S", "AAPL", "Apple", "BUY", 9)]);

        repository.save("S", &stocks).unwrap();

        assert_eq!(repository.load("S").unwrap(), stocks);
        assert!(repository.load("C").unwrap().is_empty());
    }

    #[test]
    fn corrupt_baseline_loads_as_empty() {
        let properties = Arc::new(InMemoryPropertyStore::new());
        properties.set(&keys::baseline("S"), "{not json").unwrap();

        let repository = PropertyBaselineRepository::new(properties);

        assert!(repository.load("S").unwrap().is_empty());
    }
}
