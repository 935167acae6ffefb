//! Command result cache
//!
//! Handles:
//! - TTL-bounded storage of command outputs keyed by (device, command)
//! - Oldest-entry eviction once the cache is full
//! - Background reclamation of expired entries on a reaper thread
//! - Hit/miss/eviction accounting
//!
//! Staleness is evaluated lazily on `get`; the reaper only reclaims memory.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crate::models::CommandResult;

/// Smallest reaper period, so a tiny TTL cannot turn the reaper into a busy loop
const MIN_REAP_INTERVAL: Duration = Duration::from_millis(1);

/// Cache key: device identity plus command template
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub device: String,
    pub template: String,
}

impl CacheKey {
    pub fn new(device: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            template: template.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.device, self.template)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: CommandResult,
    timestamp: Instant,
    /// Insertion order, breaks timestamp ties during eviction
    sequence: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    next_sequence: u64,
    // Bumped under the shared lock by `get`
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: u64,
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
}

struct Reaper {
    stop: Sender<()>,
    handle: thread::JoinHandle<()>,
}

/// TTL cache for device command results
pub struct CommandCache {
    state: Arc<RwLock<CacheState>>,
    ttl: Duration,
    max_size: usize,
    reaper: Mutex<Option<Reaper>>,
}

impl CommandCache {
    /// Create a cache and start its reaper thread.
    ///
    /// `max_size` is raised to 1 and a zero `ttl` to one millisecond.
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        let ttl = ttl.max(MIN_REAP_INTERVAL);
        let state = Arc::new(RwLock::new(CacheState::default()));
        let reaper = spawn_reaper(Arc::downgrade(&state), ttl);

        Self {
            state,
            ttl,
            max_size: max_size.max(1),
            reaper: Mutex::new(reaper),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Return the cached result if present and not older than the TTL
    pub fn get(&self, key: &CacheKey) -> Option<CommandResult> {
        let state = read_state(&self.state);
        match state.entries.get(key) {
            Some(entry) if entry.timestamp.elapsed() <= self.ttl => {
                state.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.result.clone())
            }
            _ => {
                state.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a result, evicting the oldest entry first when a new key
    /// would push the cache past `max_size`
    pub fn set(&self, key: CacheKey, result: CommandResult) {
        let mut state = write_state(&self.state);

        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_size {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| (entry.timestamp, entry.sequence))
                .map(|(key, _)| key.clone());

            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
                state.evictions += 1;
                log::trace!("Evicted cached command {}", oldest);
            }
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.entries.insert(
            key,
            CacheEntry {
                result,
                timestamp: Instant::now(),
                sequence,
            },
        );
    }

    /// Drop all entries and reset every counter
    pub fn clear(&self) {
        let mut state = write_state(&self.state);
        state.entries.clear();
        *state.hits.get_mut() = 0;
        *state.misses.get_mut() = 0;
        state.evictions = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let state = read_state(&self.state);
        CacheStats {
            hits: state.hits.load(Ordering::Relaxed),
            misses: state.misses.load(Ordering::Relaxed),
            evictions: state.evictions,
            size: state.entries.len(),
        }
    }

    /// Run one reclamation pass now, returning the number of removed entries
    pub fn purge_expired(&self) -> usize {
        purge(&self.state, self.ttl)
    }

    /// Stop the reaper thread. Idempotent; the cache stays usable.
    pub fn close(&self) {
        let reaper = self
            .reaper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(reaper) = reaper {
            let _ = reaper.stop.send(());
            if reaper.handle.join().is_err() {
                log::warn!("Command cache reaper thread panicked");
            }
        }
    }

    /// Whether the background reaper is still attached
    pub fn is_reaping(&self) -> bool {
        self.reaper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for CommandCache {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for CommandCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandCache")
            .field("ttl", &self.ttl)
            .field("max_size", &self.max_size)
            .field("stats", &self.stats())
            .finish()
    }
}

fn spawn_reaper(state: Weak<RwLock<CacheState>>, ttl: Duration) -> Option<Reaper> {
    let interval = (ttl / 2).max(MIN_REAP_INTERVAL);
    let (stop, stop_rx) = mpsc::channel::<()>();

    let spawned = thread::Builder::new()
        .name("netverify-cache-reaper".to_string())
        .spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let Some(state) = state.upgrade() else { break };
                    let removed = purge(&state, ttl);
                    if removed > 0 {
                        log::debug!("Reclaimed {} expired command cache entries", removed);
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

    match spawned {
        Ok(handle) => Some(Reaper { stop, handle }),
        Err(e) => {
            // Expiry is still enforced on read, only reclamation is lost
            log::warn!("Failed to start command cache reaper: {}", e);
            None
        }
    }
}

fn purge(state: &RwLock<CacheState>, ttl: Duration) -> usize {
    let mut state = write_state(state);
    let before = state.entries.len();
    state.entries.retain(|_, entry| entry.timestamp.elapsed() <= ttl);
    before - state.entries.len()
}

fn read_state(state: &RwLock<CacheState>) -> RwLockReadGuard<'_, CacheState> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_state(state: &RwLock<CacheState>) -> RwLockWriteGuard<'_, CacheState> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CommandFormat;
    use serde_json::json;

    fn result(value: &str) -> CommandResult {
        CommandResult {
            command: "show version".to_string(),
            format: CommandFormat::Json,
            output: json!({ "version": value }),
        }
    }

    #[test]
    fn test_set_then_get_is_a_hit() {
        let cache = CommandCache::new(Duration::from_secs(60), 10);
        let key = CacheKey::new("leaf1", "show version");

        cache.set(key.clone(), result("4.31.1F"));
        let cached = cache.get(&key).expect("entry should be fresh");

        assert_eq!(cached.output["version"], "4.31.1F");
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_unknown_key_is_a_miss() {
        let cache = CommandCache::new(Duration::from_secs(60), 10);

        assert!(cache.get(&CacheKey::new("leaf1", "show clock")).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_keys_are_scoped_per_device() {
        let cache = CommandCache::new(Duration::from_secs(60), 10);
        cache.set(CacheKey::new("leaf1", "show version"), result("a"));

        assert!(cache.get(&CacheKey::new("leaf2", "show version")).is_none());
    }

    #[test]
    fn test_expired_entry_is_a_miss_before_cleanup() {
        let cache = CommandCache::new(Duration::from_millis(40), 10);
        cache.close();
        let key = CacheKey::new("leaf1", "show version");

        cache.set(key.clone(), result("4.31.1F"));
        thread::sleep(Duration::from_millis(80));

        assert!(cache.get(&key).is_none());
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        // Reaper is stopped, so the stale entry is still resident
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_eviction_removes_oldest_entry() {
        let cache = CommandCache::new(Duration::from_millis(100), 2);
        let a = CacheKey::new("leaf1", "a");
        let b = CacheKey::new("leaf1", "b");
        let c = CacheKey::new("leaf1", "c");

        cache.set(a.clone(), result("1"));
        cache.set(b.clone(), result("2"));
        cache.set(c.clone(), result("3"));

        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.evictions, 1);
        assert!(cache.get(&a).is_none());
        assert!(cache.get(&b).is_some());
        assert!(cache.get(&c).is_some());
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = CommandCache::new(Duration::from_secs(60), 2);
        let a = CacheKey::new("leaf1", "a");
        cache.set(a.clone(), result("1"));
        cache.set(CacheKey::new("leaf1", "b"), result("2"));
        cache.set(a.clone(), result("updated"));

        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.evictions, 0);
        assert_eq!(cache.get(&a).unwrap().output["version"], "updated");
    }

    #[test]
    fn test_size_never_exceeds_max() {
        let cache = CommandCache::new(Duration::from_secs(60), 3);
        for i in 0..20 {
            cache.set(CacheKey::new("leaf1", format!("cmd-{}", i)), result("x"));
            assert!(cache.stats().size <= 3);
        }
        assert_eq!(cache.stats().evictions, 17);
    }

    #[test]
    fn test_clear_resets_entries_and_counters() {
        let cache = CommandCache::new(Duration::from_secs(60), 1);
        let key = CacheKey::new("leaf1", "a");
        cache.set(key.clone(), result("1"));
        cache.set(CacheKey::new("leaf1", "b"), result("2"));
        cache.get(&key);

        cache.clear();

        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_purge_expired_removes_only_stale_entries() {
        let cache = CommandCache::new(Duration::from_millis(50), 10);
        cache.close();
        cache.set(CacheKey::new("leaf1", "old"), result("1"));
        thread::sleep(Duration::from_millis(80));
        cache.set(CacheKey::new("leaf1", "new"), result("2"));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.stats().size, 1);
    }

    #[test]
    fn test_reaper_reclaims_expired_entries() {
        let cache = CommandCache::new(Duration::from_millis(20), 10);
        cache.set(CacheKey::new("leaf1", "a"), result("1"));

        thread::sleep(Duration::from_millis(150));

        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn test_close_stops_reaper_and_is_idempotent() {
        let cache = CommandCache::new(Duration::from_millis(20), 10);
        assert!(cache.is_reaping());

        cache.close();
        cache.close();

        assert!(!cache.is_reaping());
        cache.set(CacheKey::new("leaf1", "a"), result("1"));
        assert!(cache.get(&CacheKey::new("leaf1", "a")).is_some());
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(CommandCache::new(Duration::from_secs(60), 64));
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..50 {
                        let key = CacheKey::new(format!("leaf{}", worker), format!("cmd-{}", i % 5));
                        if cache.get(&key).is_none() {
                            cache.set(key, result("x"));
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 400);
        assert_eq!(stats.size, 40);
        assert_eq!(stats.misses, 40);
    }
}
