use async_trait::async_trait;

use crate::{
    Result,
    event::{ChannelId, MediaRef, MessageId, TextEntity},
};

/// The only seam between the mirroring core and the chat transport.
///
/// Every call may fail with [`crate::Error::Transport`]; the relay engine
/// treats such failures as local to one destination.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Post a text message, returning the id the transport assigned.
    async fn send_message(
        &self,
        destination: ChannelId,
        text: &str,
        entities: &[TextEntity],
        link_preview: bool,
    ) -> Result<MessageId>;

    /// Post media with a caption, returning the id the transport assigned.
    async fn send_media(
        &self,
        destination: ChannelId,
        media: &MediaRef,
        caption: &str,
        entities: &[TextEntity],
    ) -> Result<MessageId>;

    /// Replace the text of a previously posted text message.
    async fn edit_message_text(
        &self,
        destination: ChannelId,
        message: MessageId,
        text: &str,
        entities: &[TextEntity],
        link_preview: bool,
    ) -> Result<()>;

    /// Replace the caption of a previously posted media message. The media
    /// itself is left untouched.
    async fn edit_message_caption(
        &self,
        destination: ChannelId,
        message: MessageId,
        caption: &str,
        entities: &[TextEntity],
    ) -> Result<()>;

    async fn delete_message(&self, destination: ChannelId, message: MessageId) -> Result<()>;
}
