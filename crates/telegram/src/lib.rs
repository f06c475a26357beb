//! Telegram transport for chanmirror.
//!
//! Long-polls the Bot API, normalizes channel posts and edits into relay
//! events, and implements [`chanmirror_channels::Delivery`] on top of
//! teloxide.

pub mod bot;
mod entities;
pub mod error;
pub mod normalize;
pub mod outbound;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod mock_api;

pub use {
    bot::{Polling, build_bot, connect, start_polling},
    error::{Error, Result},
    normalize::{InboundEvent, normalize},
    outbound::TelegramDelivery,
};
