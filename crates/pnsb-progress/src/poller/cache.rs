use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::survey::DataSnapshot;

/// Last fetched snapshot with a time-to-live. Stale entries are never
/// served as fresh but stay available as a fallback when a fetch fails.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    ttl: Duration,
    last: Option<Arc<DataSnapshot>>,
    stored_at: Option<Instant>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            last: None,
            stored_at: None,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn fresh(&self, now: Instant) -> Option<Arc<DataSnapshot>> {
        let stored_at = self.stored_at?;
        if now.saturating_duration_since(stored_at) >= self.ttl {
            return None;
        }
        self.last.as_ref().map(Arc::clone)
    }

    pub fn last(&self) -> Option<Arc<DataSnapshot>> {
        self.last.as_ref().map(Arc::clone)
    }

    pub fn store(&mut self, snapshot: Arc<DataSnapshot>, now: Instant) {
        self.last = Some(snapshot);
        self.stored_at = Some(now);
    }

    /// Expire the current entry. The snapshot itself is kept as the
    /// fallback for failed fetches.
    pub fn clear(&mut self) {
        self.stored_at = None;
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_none()
    }
}
