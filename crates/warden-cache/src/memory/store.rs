//! In-memory store implementation using dashmap.
//!
//! Each entry carries an optional deadline measured on the tokio clock, so
//! expiry follows `tokio::time::pause`/`advance` in tests. Expired entries
//! are dropped lazily when touched. Compound operations run while holding
//! the entry's shard lock, which makes them atomic per key.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tokio::time::Instant;
use tracing::debug;

use warden_core::config::MemoryStoreConfig;
use warden_core::error::AppError;
use warden_core::result::AppResult;
use warden_core::traits::KeyValueStore;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    deadline: Instant,
}

impl Entry {
    fn new(value: Value, ttl: Duration) -> Self {
        Self {
            value,
            deadline: Instant::now() + ttl,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        now < self.deadline
    }
}

fn wrong_type(key: &str) -> AppError {
    AppError::cache(format!("WRONGTYPE operation against key '{key}'"))
}

/// In-memory store provider.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Entry>>,
    max_keys: usize,
}

impl MemoryStore {
    /// Create a new in-memory store from configuration.
    pub fn new(config: &MemoryStoreConfig) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            max_keys: config.max_keys,
        }
    }

    /// Number of stored keys, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries once the soft key cap is exceeded.
    ///
    /// Must not be called while an entry guard is held.
    fn purge_if_full(&self) {
        if self.entries.len() < self.max_keys {
            return;
        }
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        debug!(
            purged = before.saturating_sub(self.entries.len()),
            "Purged expired store entries"
        );
    }

    /// Run `f` against the live entry for `key` (or a vacant slot) under the
    /// entry lock. Expired entries are presented as vacant.
    fn with_entry<T>(&self, key: &str, f: impl FnOnce(Slot<'_>) -> AppResult<T>) -> AppResult<T> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    f(Slot::Live(occupied.get_mut()))
                } else {
                    let mut slot = None;
                    let result = f(Slot::Vacant(&mut slot));
                    match slot {
                        Some(entry) => {
                            occupied.insert(entry);
                        }
                        None => {
                            occupied.remove();
                        }
                    }
                    result
                }
            }
            MapEntry::Vacant(vacant) => {
                let mut slot = None;
                let result = f(Slot::Vacant(&mut slot));
                if let Some(entry) = slot {
                    vacant.insert(entry);
                }
                result
            }
        }
    }

    fn remove_live(&self, key: &str) -> Option<Entry> {
        let now = Instant::now();
        self.entries
            .remove(key)
            .map(|(_, entry)| entry)
            .filter(|entry| entry.is_live(now))
    }
}

/// View of one key while its shard lock is held.
enum Slot<'a> {
    Live(&'a mut Entry),
    Vacant(&'a mut Option<Entry>),
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.with_entry(key, |slot| match slot {
            Slot::Live(entry) => match &entry.value {
                Value::Str(v) => Ok(Some(v.clone())),
                Value::Set(_) => Err(wrong_type(key)),
            },
            Slot::Vacant(_) => Ok(None),
        })
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.purge_if_full();
        self.entries.insert(
            key.to_string(),
            Entry::new(Value::Str(value.to_string()), ttl),
        );
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        self.purge_if_full();
        self.with_entry(key, |slot| match slot {
            Slot::Live(_) => Ok(false),
            Slot::Vacant(vacant) => {
                *vacant = Some(Entry::new(Value::Str(value.to_string()), ttl));
                Ok(true)
            }
        })
    }

    async fn compare_and_swap(&self, key: &str, expected: &str, new: &str) -> AppResult<bool> {
        self.with_entry(key, |slot| match slot {
            Slot::Live(entry) => match &mut entry.value {
                Value::Str(current) if current.as_str() == expected => {
                    *current = new.to_string();
                    Ok(true)
                }
                Value::Str(_) => Ok(false),
                Value::Set(_) => Err(wrong_type(key)),
            },
            Slot::Vacant(_) => Ok(false),
        })
    }

    async fn replace_existing(&self, key: &str, value: &str) -> AppResult<bool> {
        self.with_entry(key, |slot| match slot {
            Slot::Live(entry) => {
                entry.value = Value::Str(value.to_string());
                Ok(true)
            }
            Slot::Vacant(_) => Ok(false),
        })
    }

    async fn take(&self, key: &str) -> AppResult<Option<String>> {
        match self.remove_live(key) {
            Some(Entry {
                value: Value::Str(v),
                ..
            }) => Ok(Some(v)),
            Some(entry) => {
                self.entries.insert(key.to_string(), entry);
                Err(wrong_type(key))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        Ok(self.remove_live(key).is_some())
    }

    async fn incr_window(&self, key: &str, window: Duration) -> AppResult<u64> {
        self.purge_if_full();
        self.with_entry(key, |slot| match slot {
            Slot::Live(entry) => match &mut entry.value {
                Value::Str(current) => {
                    let count = current
                        .parse::<u64>()
                        .map_err(|_| AppError::cache(format!("Key '{key}' is not a counter")))?
                        + 1;
                    *current = count.to_string();
                    Ok(count)
                }
                Value::Set(_) => Err(wrong_type(key)),
            },
            Slot::Vacant(vacant) => {
                *vacant = Some(Entry::new(Value::Str("1".to_string()), window));
                Ok(1)
            }
        })
    }

    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> AppResult<()> {
        self.purge_if_full();
        self.with_entry(key, |slot| match slot {
            Slot::Live(entry) => match &mut entry.value {
                Value::Set(members) => {
                    members.insert(member.to_string());
                    entry.deadline = Instant::now() + ttl;
                    Ok(())
                }
                Value::Str(_) => Err(wrong_type(key)),
            },
            Slot::Vacant(vacant) => {
                let members = HashSet::from([member.to_string()]);
                *vacant = Some(Entry::new(Value::Set(members), ttl));
                Ok(())
            }
        })
    }

    async fn set_remove(&self, key: &str, member: &str) -> AppResult<bool> {
        let (removed, now_empty) = self.with_entry(key, |slot| match slot {
            Slot::Live(entry) => match &mut entry.value {
                Value::Set(members) => Ok((members.remove(member), members.is_empty())),
                Value::Str(_) => Err(wrong_type(key)),
            },
            Slot::Vacant(_) => Ok((false, false)),
        })?;
        if now_empty {
            self.entries
                .remove_if(key, |_, entry| matches!(&entry.value, Value::Set(m) if m.is_empty()));
        }
        Ok(removed)
    }

    async fn set_members(&self, key: &str) -> AppResult<Vec<String>> {
        self.with_entry(key, |slot| match slot {
            Slot::Live(entry) => match &entry.value {
                Value::Set(members) => Ok(members.iter().cloned().collect()),
                Value::Str(_) => Err(wrong_type(key)),
            },
            Slot::Vacant(_) => Ok(Vec::new()),
        })
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> MemoryStore {
        MemoryStore::new(&MemoryStoreConfig { max_keys: 1000 })
    }

    #[tokio::test]
    async fn test_set_get() {
        let store = make_store();
        store
            .set("key1", "value1", Duration::from_secs(60))
            .await
            .unwrap();
        let val = store.get("key1").await.unwrap();
        assert_eq!(val, Some("value1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = make_store();
        store.set("k", "v", Duration::from_secs(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_nx() {
        let store = make_store();
        assert!(store.set_nx("nx", "a", Duration::from_secs(60)).await.unwrap());
        assert!(!store.set_nx("nx", "b", Duration::from_secs(60)).await.unwrap());
        assert_eq!(store.get("nx").await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_compare_and_swap_keeps_ttl() {
        let store = make_store();
        store.set("t", "valid", Duration::from_secs(30)).await.unwrap();
        assert!(store.compare_and_swap("t", "valid", "revoked").await.unwrap());
        assert!(!store.compare_and_swap("t", "valid", "revoked").await.unwrap());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(store.get("t").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_compare_and_swap_has_one_winner() {
        let store = make_store();
        store.set("t", "valid", Duration::from_secs(30)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.compare_and_swap("t", "valid", "revoked").await.unwrap()
            }));
        }
        let mut wins = 0;
        for h in handles {
            if h.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn test_replace_existing_requires_key() {
        let store = make_store();
        assert!(!store.replace_existing("missing", "revoked").await.unwrap());
        assert_eq!(store.get("missing").await.unwrap(), None);

        store.set("present", "valid", Duration::from_secs(5)).await.unwrap();
        assert!(store.replace_existing("present", "revoked").await.unwrap());
        assert_eq!(store.get("present").await.unwrap().as_deref(), Some("revoked"));
    }

    #[tokio::test]
    async fn test_take_is_destructive() {
        let store = make_store();
        store.set("s", "payload", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.take("s").await.unwrap().as_deref(), Some("payload"));
        assert_eq!(store.take("s").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_incr_window_sets_expiry_once() {
        let store = make_store();
        let window = Duration::from_secs(60);
        assert_eq!(store.incr_window("c", window).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(40)).await;
        assert_eq!(store.incr_window("c", window).await.unwrap(), 2);
        // The window is not extended by the second increment.
        tokio::time::advance(Duration::from_secs(21)).await;
        assert_eq!(store.incr_window("c", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sets() {
        let store = make_store();
        let ttl = Duration::from_secs(60);
        store.set_add("set", "a", ttl).await.unwrap();
        store.set_add("set", "b", ttl).await.unwrap();
        let mut members = store.set_members("set").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["a".to_string(), "b".to_string()]);

        assert!(store.set_remove("set", "a").await.unwrap());
        assert!(!store.set_remove("set", "a").await.unwrap());
        assert!(store.set_remove("set", "b").await.unwrap());
        assert!(store.set_members("set").await.unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_type_is_an_error() {
        let store = make_store();
        store.set_add("set", "a", Duration::from_secs(60)).await.unwrap();
        assert!(store.get("set").await.is_err());
        assert!(store.take("set").await.is_err());
        assert_eq!(store.set_members("set").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_health_check() {
        assert!(make_store().health_check().await.unwrap());
    }
}
