//! Memoised aggregator results, dropped whenever the ledger changes.

use crate::events::LedgerEvent;
use crate::models::LeagueError;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::{self, error::TryRecvError};

type Entry = Arc<dyn Any + Send + Sync>;

/// Distinct keys kept between two ledger changes. Reaching it starts over.
pub const MAX_ENTRIES: usize = 256;

pub struct StatsCache {
    entries: Mutex<HashMap<String, Entry>>,
    events: Mutex<broadcast::Receiver<LedgerEvent>>,
    generation: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StatsCache {
    pub fn new(events: broadcast::Receiver<LedgerEvent>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            events: Mutex::new(events),
            generation: AtomicU64::new(0),
        }
    }

    /// Cached value for `key`, or the result of `compute` (stored on success).
    ///
    /// `compute` runs without any lock held. Its result is only stored if no
    /// ledger event arrived meanwhile.
    pub fn get_or_compute<T>(
        &self,
        key: &str,
        compute: impl FnOnce() -> Result<T, LeagueError>,
    ) -> Result<Arc<T>, LeagueError>
    where
        T: Any + Send + Sync,
    {
        self.sync();
        let generation = self.generation.load(Ordering::SeqCst);
        if let Some(hit) = lock(&self.entries).get(key).cloned() {
            if let Ok(value) = hit.downcast::<T>() {
                return Ok(value);
            }
        }

        let value = Arc::new(compute()?);
        self.sync();
        let mut entries = lock(&self.entries);
        if self.generation.load(Ordering::SeqCst) == generation {
            if entries.len() >= MAX_ENTRIES && !entries.contains_key(key) {
                log::debug!("stats cache full, dropping {} entries", entries.len());
                entries.clear();
            }
            entries.insert(key.to_string(), value.clone() as Entry);
        }
        Ok(value)
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        lock(&self.entries).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain pending events; any of them makes every entry stale.
    fn sync(&self) {
        let mut events = lock(&self.events);
        let mut stale = false;
        loop {
            match events.try_recv() {
                Ok(event) => {
                    log::debug!("stats cache dropped on {:?}", event);
                    stale = true;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    log::debug!("stats cache lagged by {} events", skipped);
                    stale = true;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        drop(events);
        if stale {
            self.invalidate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use uuid::Uuid;

    #[test]
    fn computes_once_until_an_event_arrives() {
        let tx = crate::events::channel();
        let cache = StatsCache::new(tx.subscribe());
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok::<_, LeagueError>(vec![1u32, 2, 3])
        };

        assert_eq!(*cache.get_or_compute("k", compute).unwrap(), vec![1, 2, 3]);
        cache.get_or_compute("k", compute).unwrap();
        assert_eq!(calls.get(), 1);

        tx.send(LedgerEvent::PlayerChanged {
            player_id: Uuid::new_v4(),
        })
        .unwrap();
        cache.get_or_compute("k", compute).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let tx = crate::events::channel();
        let cache = StatsCache::new(tx.subscribe());
        let failed: Result<Arc<u32>, _> =
            cache.get_or_compute("k", || Err(LeagueError::Storage("down".into())));
        assert!(failed.is_err());
        assert!(cache.is_empty());
        assert_eq!(*cache.get_or_compute("k", || Ok(7u32)).unwrap(), 7);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_keys_do_not_grow_past_the_cap() {
        let tx = crate::events::channel();
        let cache = StatsCache::new(tx.subscribe());
        for page in 0..MAX_ENTRIES * 3 {
            let key = format!("match_history:None:{}:20", page);
            cache.get_or_compute(&key, || Ok(page)).unwrap();
            assert!(cache.len() <= MAX_ENTRIES);
        }

        let calls = Cell::new(0);
        let last = format!("match_history:None:{}:20", MAX_ENTRIES * 3 - 1);
        let value = cache
            .get_or_compute(&last, || {
                calls.set(calls.get() + 1);
                Ok(0usize)
            })
            .unwrap();
        assert_eq!((*value, calls.get()), (MAX_ENTRIES * 3 - 1, 0));
    }
}
