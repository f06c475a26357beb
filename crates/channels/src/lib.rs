//! Cross-channel message mirroring core.
//!
//! Normalized [`MessageEvent`]s flow through the [`Deduplicator`] into the
//! [`RelayEngine`], which consults the [`MappingStore`] and talks to the
//! transport only through a [`Delivery`] implementation.

pub mod dedup;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod mapping;
pub mod relay;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod testing;

pub use {
    dedup::Deduplicator,
    delivery::Delivery,
    dispatch::Dispatcher,
    error::{Error, Result},
    event::{
        ChannelId, EventKind, MappingKey, MediaKind, MediaRef, MessageContent, MessageEvent,
        MessageId, TextEntity,
    },
    mapping::{MappingEntry, MappingStore},
    relay::{DestinationOutcome, RelayEngine, RelayReport, SkipReason},
};
