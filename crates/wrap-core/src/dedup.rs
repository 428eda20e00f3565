//! Two deduplication maps: wrap-event-id and inner-request-id, each with
//! its own compaction schedule, per §4.5.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const WRAP_RETENTION: Duration = Duration::from_secs(48 * 3600);
const REQUEST_WINDOW: Duration = Duration::from_secs(60);

fn now_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock is after the epoch").as_secs() as i64
}

/// `wrap-event-id -> created_at`. Suppresses redundant decrypt work for a
/// wrap event already seen; compacted to entries newer than `now - 48h`.
#[derive(Default)]
pub struct WrapDedup {
    seen: HashMap<String, i64>,
}

impl WrapDedup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, wrap_id: &str) -> bool {
        self.seen.contains_key(wrap_id)
    }

    pub fn insert(&mut self, wrap_id: String, created_at: i64) {
        self.seen.insert(wrap_id, created_at);
    }

    /// Drop entries older than `now - 48h`. Call roughly hourly.
    pub fn compact(&mut self) {
        let cutoff = now_secs() - WRAP_RETENTION.as_secs() as i64;
        self.seen.retain(|_, created_at| *created_at >= cutoff);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// `inner-request-id -> created_at`, plus the advancing `oldestTime` cursor
/// that bounds which inner events are admissible at all.
pub struct RequestDedup {
    seen: HashMap<String, i64>,
    oldest_time: i64,
}

impl RequestDedup {
    pub fn new(oldest_time: i64) -> Self {
        RequestDedup { seen: HashMap::new(), oldest_time }
    }

    pub fn oldest_time(&self) -> i64 {
        self.oldest_time
    }

    pub fn contains(&self, inner_id: &str) -> bool {
        self.seen.contains_key(inner_id)
    }

    pub fn insert(&mut self, inner_id: String, created_at: i64) {
        self.seen.insert(inner_id, created_at);
    }

    /// Advance the cursor to `now - 60s` and drop entries no longer within
    /// the window. Call roughly every 10 minutes.
    pub fn compact(&mut self) {
        self.oldest_time = now_secs() - REQUEST_WINDOW.as_secs() as i64;
        let cutoff = self.oldest_time;
        self.seen.retain(|_, created_at| *created_at >= cutoff);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_dedup_detects_repeat() {
        let mut d = WrapDedup::new();
        assert!(!d.contains("w1"));
        d.insert("w1".to_owned(), 100);
        assert!(d.contains("w1"));
    }

    #[test]
    fn wrap_dedup_compacts_old_entries() {
        let mut d = WrapDedup::new();
        d.insert("old".to_owned(), now_secs() - 49 * 3600);
        d.insert("fresh".to_owned(), now_secs());
        d.compact();
        assert!(!d.contains("old"));
        assert!(d.contains("fresh"));
    }

    #[test]
    fn request_dedup_cursor_rejects_stale_inserts_on_lookup() {
        let d = RequestDedup::new(now_secs() - 60);
        assert!(now_secs() - 3600 < d.oldest_time());
    }

    #[test]
    fn request_dedup_compact_advances_cursor_and_prunes() {
        let mut d = RequestDedup::new(0);
        d.insert("old".to_owned(), now_secs() - 3600);
        d.insert("fresh".to_owned(), now_secs());
        d.compact();
        assert!(!d.contains("old"));
        assert!(d.contains("fresh"));
        assert!(d.oldest_time() > 0);
    }
}
