//! Bounded store from source messages to their mirrored copies.
//!
//! Eviction is FIFO by first insertion: updating an existing entry (a new
//! destination, or a replaced message id after a repost) does not renew its
//! position.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, info};

#[cfg(feature = "metrics")]
use chanmirror_metrics::{counter, gauge, relay as relay_metrics};

use crate::event::{ChannelId, MappingKey, MessageId};

/// Default number of source messages remembered.
pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// Destination copies of one source message, in the order they were first
/// recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingEntry {
    copies: Vec<(ChannelId, MessageId)>,
}

impl MappingEntry {
    #[must_use]
    pub fn get(&self, destination: ChannelId) -> Option<MessageId> {
        self.copies
            .iter()
            .find(|(channel, _)| *channel == destination)
            .map(|(_, id)| *id)
    }

    /// Record `id` for `destination`, returning the id it replaced.
    pub fn set(&mut self, destination: ChannelId, id: MessageId) -> Option<MessageId> {
        match self
            .copies
            .iter_mut()
            .find(|(channel, _)| *channel == destination)
        {
            Some((_, existing)) => Some(std::mem::replace(existing, id)),
            None => {
                self.copies.push((destination, id));
                None
            },
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, MessageId)> + '_ {
        self.copies.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.copies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }
}

impl<const N: usize> From<[(ChannelId, MessageId); N]> for MappingEntry {
    fn from(copies: [(ChannelId, MessageId); N]) -> Self {
        let mut entry = Self::default();
        for (destination, id) in copies {
            entry.set(destination, id);
        }
        entry
    }
}

/// Capacity-bounded mapping store.
///
/// Insertion order lives in its own queue so the oldest key is found
/// without scanning the map.
#[derive(Debug)]
pub struct MappingStore {
    capacity: usize,
    entries: HashMap<MappingKey, MappingEntry>,
    order: VecDeque<MappingKey>,
}

impl Default for MappingStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl MappingStore {
    /// Create a store holding at most `capacity` keys (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity + 1),
            order: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Record that `key` was mirrored to `destination` as `id`.
    ///
    /// A new key is appended to the insertion order; when that pushes the
    /// store over capacity the oldest key is evicted and returned.
    pub fn put(
        &mut self,
        key: MappingKey,
        destination: ChannelId,
        id: MessageId,
    ) -> Option<(MappingKey, MappingEntry)> {
        let mut evicted = None;
        if !self.entries.contains_key(&key) {
            self.entries.insert(key, MappingEntry::default());
            self.order.push_back(key);
            debug!(source = %key, "mapping created");
            if self.order.len() > self.capacity {
                evicted = self.evict_oldest();
            }
        }

        if let Some(entry) = self.entries.get_mut(&key) {
            if let Some(previous) = entry.set(destination, id) {
                debug!(
                    source = %key,
                    %destination,
                    previous = %previous,
                    current = %id,
                    "mapping updated"
                );
            }
        }

        #[cfg(feature = "metrics")]
        gauge!(relay_metrics::MAPPING_ENTRIES).set(self.entries.len() as f64);

        evicted
    }

    #[must_use]
    pub fn get(&self, key: &MappingKey) -> Option<&MappingEntry> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &MappingKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Forget `key`. No-op when absent.
    pub fn remove(&mut self, key: &MappingKey) -> Option<MappingEntry> {
        let removed = self.entries.remove(key)?;
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }

        #[cfg(feature = "metrics")]
        gauge!(relay_metrics::MAPPING_ENTRIES).set(self.entries.len() as f64);

        Some(removed)
    }

    /// Keys from oldest to newest.
    pub fn keys(&self) -> impl Iterator<Item = &MappingKey> {
        self.order.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn evict_oldest(&mut self) -> Option<(MappingKey, MappingEntry)> {
        let oldest = self.order.pop_front()?;
        let entry = self.entries.remove(&oldest)?;
        info!(
            source = %oldest,
            copies = entry.len(),
            capacity = self.capacity,
            "mapping store full, evicted oldest mapping"
        );

        #[cfg(feature = "metrics")]
        counter!(relay_metrics::MAPPING_EVICTIONS_TOTAL).increment(1);

        Some((oldest, entry))
    }
}
