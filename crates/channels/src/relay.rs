//! Relay engine: dispatches each normalized event by kind and reconciles
//! destination copies through the [`Delivery`] adapter.
//!
//! Every destination is handled independently and at most once per event. A
//! transport failure is logged and reported for that destination only; there
//! is no retry.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use {
    chanmirror_config::MirrorSettings,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use chanmirror_metrics::{counter, labels, relay as relay_metrics};

use crate::{
    Error, Result,
    dedup::Deduplicator,
    delivery::Delivery,
    event::{ChannelId, EventKind, MappingKey, MessageContent, MessageEvent, MessageId},
    mapping::{MappingEntry, MappingStore},
};

const OP_SEND_MESSAGE: &str = "send_message";
const OP_SEND_MEDIA: &str = "send_media";
const OP_EDIT_TEXT: &str = "edit_message_text";
const OP_EDIT_CAPTION: &str = "edit_message_caption";
const OP_DELETE: &str = "delete_message";

/// Why an event produced no destination work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The origin channel is not a configured source.
    NotSource,
    /// Reposting is paused; new posts are not mirrored.
    Paused,
    /// The same post was already accepted inside the dedup window.
    Duplicate,
    /// Edit or delete of a message that was never mirrored (or was evicted).
    Unmapped,
    /// Deletion sync is turned off.
    SyncDisabled,
}

/// Result of one destination's handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationOutcome {
    Sent(MessageId),
    Edited,
    /// The copy could not be edited in place and was posted again.
    Reposted {
        previous: MessageId,
        current: MessageId,
    },
    Deleted,
    Failed {
        operation: &'static str,
        error: String,
    },
}

/// Per-event summary returned by [`RelayEngine::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReport {
    pub kind: EventKind,
    pub key: MappingKey,
    pub skipped: Option<SkipReason>,
    pub destinations: Vec<(ChannelId, DestinationOutcome)>,
}

impl RelayReport {
    fn new(event: &MessageEvent) -> Self {
        Self {
            kind: event.kind(),
            key: event.key(),
            skipped: None,
            destinations: Vec::new(),
        }
    }

    fn skip(mut self, reason: SkipReason) -> Self {
        self.skipped = Some(reason);
        self
    }

    fn push(&mut self, destination: ChannelId, outcome: DestinationOutcome) {
        self.destinations.push((destination, outcome));
    }

    #[must_use]
    pub fn outcome(&self, destination: ChannelId) -> Option<&DestinationOutcome> {
        self.destinations
            .iter()
            .find(|(channel, _)| *channel == destination)
            .map(|(_, outcome)| outcome)
    }

    /// Destinations whose copy was sent, edited, reposted or deleted.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.destinations.len() - self.failed()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.destinations
            .iter()
            .filter(|(_, outcome)| matches!(outcome, DestinationOutcome::Failed { .. }))
            .count()
    }
}

/// Shared mutable state. Guarded by one mutex that is never held across an
/// `.await`.
#[derive(Debug)]
struct RelayState {
    dedup: Deduplicator,
    mappings: MappingStore,
}

/// Reactive dispatcher from [`MessageEvent`]s to destination copies.
pub struct RelayEngine {
    sources: Vec<ChannelId>,
    destinations: Vec<ChannelId>,
    sync_deletions: bool,
    reposting_active: bool,
    delivery: Arc<dyn Delivery>,
    state: Mutex<RelayState>,
}

impl RelayEngine {
    #[must_use]
    pub fn new(settings: &MirrorSettings, delivery: Arc<dyn Delivery>) -> Self {
        Self {
            sources: settings
                .source_channels
                .iter()
                .copied()
                .map(ChannelId)
                .collect(),
            destinations: settings
                .destination_channels
                .iter()
                .copied()
                .map(ChannelId)
                .collect(),
            sync_deletions: settings.sync_deletions,
            reposting_active: settings.reposting_active,
            delivery,
            state: Mutex::new(RelayState {
                dedup: Deduplicator::new(Duration::from_secs(settings.dedup_window_seconds)),
                mappings: MappingStore::new(settings.max_mapping_entries),
            }),
        }
    }

    #[must_use]
    pub fn sources(&self) -> &[ChannelId] {
        &self.sources
    }

    #[must_use]
    pub fn destinations(&self) -> &[ChannelId] {
        &self.destinations
    }

    #[must_use]
    pub fn is_source(&self, channel: ChannelId) -> bool {
        self.sources.contains(&channel)
    }

    /// Snapshot of the destination copies recorded for `key`.
    #[must_use]
    pub fn mapping(&self, key: &MappingKey) -> Option<MappingEntry> {
        self.state().mappings.get(key).cloned()
    }

    #[must_use]
    pub fn mapping_len(&self) -> usize {
        self.state().mappings.len()
    }

    /// Handle one event to completion.
    pub async fn handle(&self, event: MessageEvent) -> RelayReport {
        let key = event.key();

        #[cfg(feature = "metrics")]
        counter!(relay_metrics::EVENTS_TOTAL, labels::KIND => event.kind().as_str()).increment(1);

        if !self.is_source(key.channel) {
            debug!(source = %key, "event from a non-source channel, ignoring");
            return RelayReport::new(&event).skip(SkipReason::NotSource);
        }

        match event.kind() {
            EventKind::New => self.relay_post(&event).await,
            EventKind::Edited => self.relay_edit(&event).await,
            EventKind::Deleted => self.relay_delete(&event).await,
        }
    }

    async fn relay_post(&self, event: &MessageEvent) -> RelayReport {
        let key = event.key();
        let mut report = RelayReport::new(event);
        let Some(content) = event.content() else {
            return report;
        };

        if !self.reposting_active {
            info!(source = %key, "reposting paused, not mirroring post");
            return report.skip(SkipReason::Paused);
        }

        let accepted = self.state().dedup.should_process(event);
        if !accepted {
            info!(source = %key, "duplicate post inside dedup window, dropping");
            #[cfg(feature = "metrics")]
            counter!(relay_metrics::DUPLICATES_TOTAL).increment(1);
            return report.skip(SkipReason::Duplicate);
        }

        for destination in self.targets(key.channel) {
            let outcome = match self.deliver(destination, content).await {
                Ok(copy) => {
                    self.record_copy(key, destination, copy);
                    count_delivery(send_operation(content));
                    info!(
                        source = %key,
                        %destination,
                        %copy,
                        has_media = content.has_media(),
                        "mirrored post"
                    );
                    DestinationOutcome::Sent(copy)
                },
                Err(e) => failed(key, destination, send_operation(content), &e),
            };
            report.push(destination, outcome);
        }
        report
    }

    async fn relay_edit(&self, event: &MessageEvent) -> RelayReport {
        let key = event.key();
        let mut report = RelayReport::new(event);
        let Some(content) = event.content() else {
            return report;
        };

        let Some(entry) = self.mapping(&key) else {
            info!(source = %key, "edit of a message that was never mirrored, nothing to update");
            return report.skip(SkipReason::Unmapped);
        };

        for (destination, copy) in entry.iter() {
            let outcome = if content.has_media() {
                self.edit_media_copy(key, destination, copy, content).await
            } else {
                match self
                    .delivery
                    .edit_message_text(
                        destination,
                        copy,
                        &content.text,
                        &content.entities,
                        content.link_preview,
                    )
                    .await
                {
                    Ok(()) => {
                        count_delivery(OP_EDIT_TEXT);
                        info!(source = %key, %destination, %copy, "edited mirrored message");
                        DestinationOutcome::Edited
                    },
                    Err(e) => failed(key, destination, OP_EDIT_TEXT, &e),
                }
            };
            report.push(destination, outcome);
        }
        report
    }

    /// Try a caption edit, falling back to delete-then-repost.
    async fn edit_media_copy(
        &self,
        key: MappingKey,
        destination: ChannelId,
        copy: MessageId,
        content: &MessageContent,
    ) -> DestinationOutcome {
        match self
            .delivery
            .edit_message_caption(destination, copy, &content.text, &content.entities)
            .await
        {
            Ok(()) => {
                count_delivery(OP_EDIT_CAPTION);
                info!(source = %key, %destination, %copy, "edited mirrored caption");
                return DestinationOutcome::Edited;
            },
            Err(e) => {
                warn!(
                    source = %key,
                    %destination,
                    %copy,
                    error = %e,
                    "caption edit rejected, reposting media"
                );
                count_failure(OP_EDIT_CAPTION);
            },
        }

        // A stale duplicate beats losing the copy, so a failed delete does
        // not stop the repost.
        if let Err(e) = self.delivery.delete_message(destination, copy).await {
            warn!(
                source = %key,
                %destination,
                %copy,
                error = %e,
                "could not delete outdated copy, reposting anyway"
            );
            count_failure(OP_DELETE);
        }

        match self.deliver(destination, content).await {
            Ok(current) => {
                self.record_copy(key, destination, current);
                count_delivery(send_operation(content));
                info!(
                    source = %key,
                    %destination,
                    previous = %copy,
                    %current,
                    "reposted edited media"
                );
                DestinationOutcome::Reposted {
                    previous: copy,
                    current,
                }
            },
            Err(e) => failed(key, destination, send_operation(content), &e),
        }
    }

    async fn relay_delete(&self, event: &MessageEvent) -> RelayReport {
        let key = event.key();
        let mut report = RelayReport::new(event);

        if !self.sync_deletions {
            debug!(source = %key, "deletion sync disabled, ignoring delete");
            return report.skip(SkipReason::SyncDisabled);
        }

        let Some(entry) = self.mapping(&key) else {
            info!(source = %key, "delete of a message that was never mirrored, nothing to do");
            return report.skip(SkipReason::Unmapped);
        };

        for (destination, copy) in entry.iter() {
            let outcome = match self.delivery.delete_message(destination, copy).await {
                Ok(()) => {
                    count_delivery(OP_DELETE);
                    info!(source = %key, %destination, %copy, "deleted mirrored copy");
                    DestinationOutcome::Deleted
                },
                Err(e) => failed(key, destination, OP_DELETE, &e),
            };
            report.push(destination, outcome);
        }

        // Forgotten even after partial failure: deletes are not retried.
        self.state().mappings.remove(&key);
        debug!(
            source = %key,
            failed = report.failed(),
            "mapping removed after delete"
        );
        report
    }

    async fn deliver(&self, destination: ChannelId, content: &MessageContent) -> Result<MessageId> {
        match &content.media {
            Some(media) => {
                self.delivery
                    .send_media(destination, media, &content.text, &content.entities)
                    .await
            },
            None => {
                self.delivery
                    .send_message(
                        destination,
                        &content.text,
                        &content.entities,
                        content.link_preview,
                    )
                    .await
            },
        }
    }

    fn record_copy(&self, key: MappingKey, destination: ChannelId, copy: MessageId) {
        self.state().mappings.put(key, destination, copy);
    }

    /// Configured destinations minus the origin itself.
    fn targets(&self, source: ChannelId) -> Vec<ChannelId> {
        self.destinations
            .iter()
            .copied()
            .filter(|destination| *destination != source)
            .collect()
    }

    fn state(&self) -> MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn send_operation(content: &MessageContent) -> &'static str {
    if content.has_media() {
        OP_SEND_MEDIA
    } else {
        OP_SEND_MESSAGE
    }
}

fn failed(
    key: MappingKey,
    destination: ChannelId,
    operation: &'static str,
    error: &Error,
) -> DestinationOutcome {
    warn!(
        source = %key,
        %destination,
        operation,
        error = %error,
        "mirror operation failed"
    );
    count_failure(operation);
    DestinationOutcome::Failed {
        operation,
        error: error.to_string(),
    }
}

#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
fn count_delivery(operation: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(relay_metrics::DELIVERIES_TOTAL, labels::OPERATION => operation).increment(1);
}

#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
fn count_failure(operation: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(relay_metrics::FAILURES_TOTAL, labels::OPERATION => operation).increment(1);
}
