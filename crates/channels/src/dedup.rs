//! Time-windowed suppression of redelivered NEW events.
//!
//! Transports may replay the same update after a reconnect. Remembering when
//! each source message was last accepted is enough to avoid reposting it,
//! without any persistent state.

use std::{collections::HashMap, time::Duration};

use tokio::time::Instant;

use crate::event::{EventKind, MappingKey, MessageEvent};

/// Default span during which a repeated NEW event is dropped.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(60);

/// Last-accepted timestamps per source message.
#[derive(Debug)]
pub struct Deduplicator {
    window: Duration,
    seen: HashMap<MappingKey, Instant>,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_WINDOW)
    }
}

impl Deduplicator {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
        }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Decide whether `event` should be relayed, recording it if so.
    ///
    /// Only NEW events are subject to deduplication; edits and deletions
    /// always pass.
    pub fn should_process(&mut self, event: &MessageEvent) -> bool {
        self.should_process_at(event, Instant::now())
    }

    /// [`Self::should_process`] against an explicit clock reading.
    pub fn should_process_at(&mut self, event: &MessageEvent, now: Instant) -> bool {
        if event.kind() != EventKind::New {
            return true;
        }

        let key = event.key();
        let duplicate = self
            .seen
            .get(&key)
            .is_some_and(|last_seen| now.saturating_duration_since(*last_seen) < self.window);
        if duplicate {
            // A duplicate does not extend the window.
            return false;
        }

        self.seen.insert(key, now);
        self.sweep(now);
        true
    }

    /// When `key` was last accepted, if it is still remembered.
    #[must_use]
    pub fn last_seen(&self, key: &MappingKey) -> Option<Instant> {
        self.seen.get(key).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn sweep(&mut self, now: Instant) {
        let window = self.window;
        self.seen
            .retain(|_, last_seen| now.saturating_duration_since(*last_seen) < window);
    }
}
