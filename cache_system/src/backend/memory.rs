//! In-process backend
//!
//! Follows Redis semantics for the commands the manager uses (glob
//! matching, TTL reporting, cursor scans) so the manager can run without a
//! server in development and tests. An availability switch simulates an
//! outage: while unavailable every command fails with a connection error
//! and `open` is refused.

use super::CacheBackend;
use crate::errors::{BackendError, BackendResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires| now >= expires)
    }
}

/// Redis-like store held in process memory
#[derive(Debug)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, StoredValue>>,
    available: AtomicBool,
    open: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            open: AtomicBool::new(false),
        }
    }

    /// Toggle reachability. Going unavailable also drops the open connection,
    /// so callers must re-`open` after the store comes back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        if !available {
            self.open.store(false, Ordering::SeqCst);
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Number of live entries, bypassing the connection state
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a raw value directly, bypassing the connection state
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().insert(
            key.into(),
            StoredValue {
                value: value.into(),
                expires_at: None,
            },
        );
    }

    /// Whether a live key exists, bypassing the connection state
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.lock()
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StoredValue>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_open(&self) -> BackendResult<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(BackendError::Connection("connection refused".to_string()));
        }
        if !self.open.load(Ordering::SeqCst) {
            return Err(BackendError::Connection("connection is not open".to_string()));
        }
        Ok(())
    }

    /// Lock the map with expired entries purged
    fn live_entries(&self) -> MutexGuard<'_, HashMap<String, StoredValue>> {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, entry| !entry.is_expired(now));
        entries
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn open(&self) -> BackendResult<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(BackendError::Connection("connection refused".to_string()));
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        self.ensure_open()?;
        Ok(self.live_entries().get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> BackendResult<()> {
        self.ensure_open()?;
        let expires_at = ttl_seconds.map(|ttl| Instant::now() + Duration::from_secs(ttl));
        self.lock().insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> BackendResult<u64> {
        self.ensure_open()?;
        let mut entries = self.live_entries();
        let removed = keys
            .iter()
            .filter(|key| entries.remove(key.as_str()).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn exists(&self, key: &str) -> BackendResult<bool> {
        self.ensure_open()?;
        Ok(self.live_entries().contains_key(key))
    }

    async fn ttl(&self, key: &str) -> BackendResult<i64> {
        self.ensure_open()?;
        let now = Instant::now();
        let entries = self.live_entries();
        let ttl = match entries.get(key) {
            None => -2,
            Some(StoredValue {
                expires_at: None, ..
            }) => -1,
            // Rounded to the nearest second, like Redis
            Some(StoredValue {
                expires_at: Some(expires),
                ..
            }) => ((expires.saturating_duration_since(now).as_millis() + 500) / 1000) as i64,
        };
        Ok(ttl)
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> BackendResult<bool> {
        self.ensure_open()?;
        let mut entries = self.live_entries();
        match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_seconds));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn keys(&self, pattern: &str) -> BackendResult<Vec<String>> {
        self.ensure_open()?;
        let mut keys: Vec<String> = self
            .live_entries()
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> BackendResult<(u64, Vec<String>)> {
        self.ensure_open()?;
        let mut all: Vec<String> = self.live_entries().keys().cloned().collect();
        all.sort();

        // The cursor is an offset into the sorted keyspace; COUNT bounds the
        // keys examined per page, not the matches returned
        let start = usize::try_from(cursor).unwrap_or(usize::MAX).min(all.len());
        let end = start.saturating_add(count.max(1)).min(all.len());
        let page = all[start..end]
            .iter()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        let next = if end >= all.len() { 0 } else { end as u64 };
        Ok((next, page))
    }

    async fn flushdb(&self) -> BackendResult<()> {
        self.ensure_open()?;
        self.lock().clear();
        Ok(())
    }

    async fn ping(&self) -> BackendResult<String> {
        self.ensure_open()?;
        Ok("PONG".to_string())
    }
}

/// Redis-style glob match: `*`, `?`, `[abc]`, `[^a-z]` and `\` escapes
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    match_from(&pattern, &text)
}

fn match_from(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Backtrack point for the most recent `*`
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                '*' => {
                    star = Some((p, t));
                    p += 1;
                    continue;
                }
                '?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                '[' => {
                    if let Some((matched, next)) = match_class(pattern, p, text[t]) {
                        if matched {
                            p = next;
                            t += 1;
                            continue;
                        }
                    }
                }
                '\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                }
                c => {
                    if c == text[t] {
                        p += 1;
                        t += 1;
                        continue;
                    }
                }
            }
        }

        match star {
            Some((star_p, star_t)) => {
                p = star_p + 1;
                t = star_t + 1;
                star = Some((star_p, star_t + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Match `c` against the class opening at `pattern[open]`.
/// Returns whether it matched and the index after the closing `]`.
fn match_class(pattern: &[char], open: usize, c: char) -> Option<(bool, usize)> {
    let mut i = open + 1;
    let negate = pattern.get(i) == Some(&'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    let mut first = true;
    while i < pattern.len() {
        let current = pattern[i];
        if current == ']' && !first {
            return Some((matched != negate, i + 1));
        }
        first = false;

        if current == '\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == c;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == '-' && pattern[i + 2] != ']' {
            let (low, high) = if current <= pattern[i + 2] {
                (current, pattern[i + 2])
            } else {
                (pattern[i + 2], current)
            };
            matched |= low <= c && c <= high;
            i += 3;
        } else {
            matched |= current == c;
            i += 1;
        }
    }
    // Unterminated class never matches
    None
}
