//! Local rental cache: the browser-session equivalent of `localStorage`.
//!
//! A durable mapping from bike id to rental-end timestamp, used to
//! reconstruct "my active rentals" after a reload without a server round
//! trip. The cache is advisory only; the remote bike record stays
//! authoritative and the cache reconciles toward it.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::warn;

use crate::error::Error;

/// Key-value port backing the cache: one opaque document, read and replaced
/// whole. Implementations may be files, embedded KV stores, or browser
/// storage depending on the target platform.
pub trait StateStore: Send + Sync {
    /// Current document contents, or `None` when absent/unreadable
    fn read(&self) -> Option<String>;

    /// Replace the document contents
    fn write(&self, contents: &str) -> Result<(), Error>;
}

/// File-backed state store, the default substrate
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateStore for FileStore {
    fn read(&self) -> Option<String> {
        fs::read_to_string(&self.path).ok()
    }

    fn write(&self, contents: &str) -> Result<(), Error> {
        fs::write(&self.path, contents)
            .map_err(|e| Error::general(format!("failed to persist rental cache: {}", e)))
    }
}

/// In-memory state store for tests and throwaway sessions
#[derive(Default)]
pub struct MemoryStore {
    contents: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with raw contents, valid or not
    pub fn seeded(contents: &str) -> Self {
        Self {
            contents: Mutex::new(Some(contents.to_string())),
        }
    }
}

impl StateStore for MemoryStore {
    fn read(&self) -> Option<String> {
        self.contents.lock().ok().and_then(|guard| guard.clone())
    }

    fn write(&self, contents: &str) -> Result<(), Error> {
        let mut guard = self
            .contents
            .lock()
            .map_err(|_| Error::general("state store lock poisoned"))?;
        *guard = Some(contents.to_string());
        Ok(())
    }
}

/// The rental cache itself: bike id → rental end, persisted as one JSON
/// object with RFC 3339 date strings.
///
/// Mutations replace the whole document, so they are serialized through an
/// internal lock; concurrent operations on different bikes must not lose
/// each other's entries.
pub struct RentalCache {
    store: Box<dyn StateStore>,
    mutate: Mutex<()>,
}

impl RentalCache {
    pub fn new(store: Box<dyn StateStore>) -> Self {
        Self {
            store,
            mutate: Mutex::new(()),
        }
    }

    /// Load the full mapping. Absent or malformed contents load as an empty
    /// mapping; corrupt state is never surfaced to the user.
    pub fn load(&self) -> BTreeMap<i64, DateTime<Utc>> {
        let Some(raw) = self.store.read() else {
            return BTreeMap::new();
        };
        let parsed: BTreeMap<String, String> = match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(e) => {
                warn!("rental cache is malformed, treating as empty: {}", e);
                return BTreeMap::new();
            }
        };
        let mut entries = BTreeMap::new();
        for (key, value) in parsed {
            let Ok(bike_id) = key.parse::<i64>() else {
                warn!("rental cache entry has non-numeric key {:?}, skipping", key);
                continue;
            };
            match DateTime::parse_from_rfc3339(&value) {
                Ok(end) => {
                    entries.insert(bike_id, end.with_timezone(&Utc));
                }
                Err(e) => {
                    warn!("rental cache entry for bike {} is unreadable, skipping: {}", bike_id, e);
                }
            }
        }
        entries
    }

    /// Record (or overwrite) the rental end for a bike and persist
    pub fn set(&self, bike_id: i64, rental_end: DateTime<Utc>) -> Result<(), Error> {
        let _guard = self.mutation_guard()?;
        let mut entries = self.load();
        entries.insert(bike_id, rental_end);
        self.persist(&entries)
    }

    /// Drop a bike from the mapping and persist. Removing an absent key is a
    /// no-op and reports `false`.
    pub fn remove(&self, bike_id: i64) -> Result<bool, Error> {
        let _guard = self.mutation_guard()?;
        let mut entries = self.load();
        if entries.remove(&bike_id).is_none() {
            return Ok(false);
        }
        self.persist(&entries)?;
        Ok(true)
    }

    fn mutation_guard(&self) -> Result<std::sync::MutexGuard<'_, ()>, Error> {
        self.mutate
            .lock()
            .map_err(|_| Error::general("rental cache lock poisoned"))
    }

    fn persist(&self, entries: &BTreeMap<i64, DateTime<Utc>>) -> Result<(), Error> {
        let serializable: BTreeMap<String, String> = entries
            .iter()
            .map(|(id, end)| (id.to_string(), end.to_rfc3339()))
            .collect();
        let raw = serde_json::to_string(&serializable)?;
        self.store.write(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cache() -> RentalCache {
        RentalCache::new(Box::new(MemoryStore::new()))
    }

    #[test]
    fn round_trips_a_single_entry() {
        let cache = cache();
        let end = Utc.timestamp_opt(1_900_000_000, 0).unwrap();
        assert!(cache.load().is_empty());

        cache.set(42, end).unwrap();
        let loaded = cache.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[&42], end);

        assert!(cache.remove(42).unwrap());
        assert!(cache.load().is_empty());
    }

    #[test]
    fn removing_an_absent_key_is_a_noop() {
        let cache = cache();
        assert!(!cache.remove(7).unwrap());
        assert!(cache.load().is_empty());
    }

    #[test]
    fn malformed_contents_load_as_empty() {
        let cache = RentalCache::new(Box::new(MemoryStore::seeded("definitely not json")));
        assert!(cache.load().is_empty());
    }

    #[test]
    fn unreadable_entries_are_skipped_not_fatal() {
        let raw = r#"{"42":"2031-01-01T00:00:00+00:00","9":"yesterday-ish"}"#;
        let cache = RentalCache::new(Box::new(MemoryStore::seeded(raw)));
        let loaded = cache.load();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key(&42));
    }

    #[test]
    fn concurrent_writers_never_lose_each_others_entries() {
        use std::sync::Arc;
        use std::thread;

        let end = Utc.timestamp_opt(1_900_000_000, 0).unwrap();
        let cache = Arc::new(RentalCache::new(Box::new(MemoryStore::new())));

        let writers: Vec<_> = [1i64, 2, 3]
            .into_iter()
            .map(|bike_id| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for _ in 0..500 {
                        cache.set(bike_id, end).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let loaded = cache.load();
        assert_eq!(loaded.len(), 3, "a writer overwrote another's entry");
        for bike_id in [1, 2, 3] {
            assert_eq!(loaded[&bike_id], end);
        }
    }

    #[test]
    fn survives_reload_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rental-data.json");
        let end = Utc.timestamp_opt(1_900_000_000, 0).unwrap();

        let cache = RentalCache::new(Box::new(FileStore::new(&path)));
        cache.set(3, end).unwrap();

        // a fresh cache over the same file sees the entry
        let reloaded = RentalCache::new(Box::new(FileStore::new(&path)));
        assert_eq!(reloaded.load()[&3], end);
    }
}
