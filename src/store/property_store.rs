use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use parking_lot::Mutex;
use tracing::warn;

/// Well-known property keys.
pub mod keys {
    pub const WEBHOOK_URL: &str = "webhook.url";
    pub const FINNHUB_API_KEY: &str = "finnhub.api_key";
    pub const OXR_APP_ID: &str = "open_exchange_rates.app_id";
    pub const LAST_CHECK: &str = "monitor.last_check";
    pub const MONITOR_LEASE: &str = "monitor.lease";

    pub fn baseline(collection_id: &str) -> String {
        format!("baseline.{collection_id}")
    }

    pub fn forex_last_update(pair: &str) -> String {
        format!("forex.last_update.{pair}")
    }
}

/// Durable string key-value store.
pub trait PropertyStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;

    /// Replaces the value only while it still equals `expected` (`None` means
    /// absent); `value = None` deletes. Returns whether the swap happened.
    /// Atomic against every other handle on the same backing store.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: Option<&str>,
    ) -> Result<bool>;
}

#[derive(Debug, Default)]
pub struct InMemoryPropertyStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl InMemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PropertyStore for InMemoryPropertyStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: Option<&str>,
    ) -> Result<bool> {
        let mut values = self.values.lock();
        if values.get(key).map(String::as_str) != expected {
            return Ok(false);
        }

        match value {
            Some(value) => values.insert(key.to_string(), value.to_string()),
            None => values.remove(key),
        };
        Ok(true)
    }
}

const LOCK_RETRY: Duration = Duration::from_millis(10);
const LOCK_WAIT: Duration = Duration::from_secs(2);
/// A lock file older than this was left behind by a crashed process.
const LOCK_STALE_AFTER: Duration = Duration::from_secs(30);

/// Cross-process exclusion through an `O_EXCL` lock file next to the data
/// file. Removed on drop.
struct FileLock {
    path: PathBuf,
}

impl FileLock {
    fn acquire(path: PathBuf, wait: Duration) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let deadline = Instant::now() + wait;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                    if Self::is_stale(&path) {
                        warn!(path = %path.display(), "removing stale lock file");
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        bail!("timed out waiting for lock {}", path.display());
                    }
                    thread::sleep(LOCK_RETRY);
                }
                Err(error) => {
                    return Err(error)
                        .with_context(|| format!("failed to create lock {}", path.display()));
                }
            }
        }
    }

    fn is_stale(path: &Path) -> bool {
        fs::metadata(path)
            .and_then(|metadata| metadata.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age > LOCK_STALE_AFTER)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Properties kept in a JSON object on disk. Every operation re-reads the
/// file so separate processes observe each other's writes; every write runs
/// under a lock file so they cannot lose each other's updates.
#[derive(Debug)]
pub struct JsonFilePropertyStore {
    path: PathBuf,
    lock: Mutex<()>,
    lock_wait: Duration,
}

impl JsonFilePropertyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            lock_wait: LOCK_WAIT,
        }
    }

    pub fn with_lock_wait(mut self, lock_wait: Duration) -> Self {
        self.lock_wait = lock_wait;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read properties {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse properties {}", self.path.display()))
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<()> {
        write_json_atomically(&self.path, values)
    }

    fn modify<T>(&self, change: impl FnOnce(&mut BTreeMap<String, String>) -> (bool, T)) -> Result<T> {
        let _guard = self.lock.lock();
        let _file_lock = FileLock::acquire(self.path.with_extension("json.lock"), self.lock_wait)?;

        let mut values = self.read_all()?;
        let (dirty, result) = change(&mut values);
        if dirty {
            self.write_all(&values)?;
        }

        Ok(result)
    }
}

impl PropertyStore for JsonFilePropertyStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|values| {
            values.insert(key.to_string(), value.to_string());
            (true, ())
        })
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.modify(|values| (values.remove(key).is_some(), ()))
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: Option<&str>,
    ) -> Result<bool> {
        self.modify(|values| {
            if values.get(key).map(String::as_str) != expected {
                return (false, false);
            }

            match value {
                Some(value) => values.insert(key.to_string(), value.to_string()),
                None => values.remove(key),
            };
            (true, true)
        })
    }
}

/// Serializes `value` next to `path` and renames it into place.
pub(crate) fn write_json_atomically<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let raw = serde_json::to_string_pretty(value).context("failed to serialize json")?;
    let tmp = path.with_extension("json.tmp");

    fs::write(&tmp, raw).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("properties.json");
        let store = JsonFilePropertyStore::new(&path);

        assert_eq!(store.get("missing").unwrap(), None);

        store.set(keys::WEBHOOK_URL, "https://hook.example/abc").unwrap();
        assert_eq!(
            store.get(keys::WEBHOOK_URL).unwrap().as_deref(),
            Some("https://hook.example/abc")
        );

        store.delete(keys::WEBHOOK_URL).unwrap();
        assert_eq!(store.get(keys::WEBHOOK_URL).unwrap(), None);
    }

    #[test]
    fn file_store_sees_writes_from_another_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("properties.json");

        let first = JsonFilePropertyStore::new(&path);
        let second = JsonFilePropertyStore::new(&path);

        first.set("a", "1").unwrap();

        assert_eq!(second.get("a").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn swap_only_succeeds_against_the_expected_value() {
        let store = InMemoryPropertyStore::new();

        assert!(store.compare_and_swap("k", None, Some("a")).unwrap());
        assert!(!store.compare_and_swap("k", None, Some("b")).unwrap());
        assert!(!store.compare_and_swap("k", Some("b"), None).unwrap());
        assert_eq!(store.get("k").unwrap().as_deref(), Some("a"));

        assert!(store.compare_and_swap("k", Some("a"), None).unwrap());
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn racing_handles_on_one_file_cannot_both_swap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("properties.json");
        let first = JsonFilePropertyStore::new(&path);
        let second = JsonFilePropertyStore::new(&path);

        /* both observed the key as absent */
        assert_eq!(first.get("lease").unwrap(), None);
        assert_eq!(second.get("lease").unwrap(), None);

        assert!(first.compare_and_swap("lease", None, Some("first")).unwrap());
        assert!(!second.compare_and_swap("lease", None, Some("second")).unwrap());

        assert_eq!(second.get("lease").unwrap().as_deref(), Some("first"));
        assert!(!path.with_extension("json.lock").exists());
    }

    #[test]
    fn concurrent_writers_keep_every_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("properties.json");

        let handles: Vec<_> = (0..4)
            .map(|writer| {
                let path = path.clone();
                thread::spawn(move || {
                    let store = JsonFilePropertyStore::new(path);
                    for index in 0..10 {
                        store.set(&format!("w{writer}.{index}"), "x").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let store = JsonFilePropertyStore::new(&path);
        for writer in 0..4 {
            for index in 0..10 {
                assert!(store.get(&format!("w{writer}.{index}")).unwrap().is_some());
            }
        }
    }

    #[test]
    fn held_lock_file_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("properties.json");
        fs::write(path.with_extension("json.lock"), "").unwrap();

        let store = JsonFilePropertyStore::new(&path).with_lock_wait(Duration::from_millis(50));

        assert!(store.set("a", "1").is_err());
    }

    #[test]
    fn baseline_keys_are_namespaced() {
        assert_eq!(keys::baseline("S"), "baseline.S");
    }
}
