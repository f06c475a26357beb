use std::future::IntoFuture;

use {
    async_trait::async_trait,
    chanmirror_channels::{
        ChannelId, Delivery, Error, MediaKind, MediaRef, MessageId, Result, TextEntity,
    },
    teloxide::{
        ApiError, RequestError,
        payloads::{
            CopyMessageSetters, EditMessageCaptionSetters, EditMessageTextSetters,
            SendDocumentSetters, SendMessageSetters, SendPhotoSetters, SendVideoSetters,
        },
        prelude::*,
        types::{ChatId, InputFile, LinkPreviewOptions, MessageId as TgMessageId},
    },
    tracing::debug,
};

#[cfg(feature = "metrics")]
use chanmirror_metrics::{histogram, labels, telegram as telegram_metrics};

use crate::entities;

/// [`Delivery`] over the Telegram Bot API.
///
/// Each call is a single request. Failures, rate limits included, are
/// returned to the relay engine as [`Error::Transport`].
#[derive(Clone)]
pub struct TelegramDelivery {
    bot: Bot,
}

impl TelegramDelivery {
    #[must_use]
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn chat(destination: ChannelId) -> ChatId {
    ChatId(destination.0)
}

fn link_preview_options(enabled: bool) -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: !enabled,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

/// The copy already shows the requested content.
fn is_message_not_modified_error(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::MessageNotModified))
}

#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
async fn timed<R, T>(method: &'static str, req: R) -> std::result::Result<T, RequestError>
where
    R: IntoFuture<Output = std::result::Result<T, RequestError>>,
{
    #[cfg(feature = "metrics")]
    let started = std::time::Instant::now();

    let result = req.into_future().await;

    #[cfg(feature = "metrics")]
    histogram!(telegram_metrics::REQUEST_DURATION_SECONDS, labels::METHOD => method)
        .record(started.elapsed().as_secs_f64());

    result
}

async fn request<R, T>(method: &'static str, destination: ChannelId, req: R) -> Result<T>
where
    R: IntoFuture<Output = std::result::Result<T, RequestError>>,
{
    timed(method, req)
        .await
        .map_err(|e| Error::transport(method, destination, e))
}

/// Same as [`request`], but a "message is not modified" answer is success.
async fn edit_request<R, T>(method: &'static str, destination: ChannelId, req: R) -> Result<()>
where
    R: IntoFuture<Output = std::result::Result<T, RequestError>>,
{
    match timed(method, req).await {
        Ok(_) => Ok(()),
        Err(e) if is_message_not_modified_error(&e) => {
            debug!(%destination, method, "copy already up to date");
            Ok(())
        },
        Err(e) => Err(Error::transport(method, destination, e)),
    }
}

#[async_trait]
impl Delivery for TelegramDelivery {
    async fn send_message(
        &self,
        destination: ChannelId,
        text: &str,
        entities: &[TextEntity],
        link_preview: bool,
    ) -> Result<MessageId> {
        let mut req = self
            .bot
            .send_message(chat(destination), text)
            .link_preview_options(link_preview_options(link_preview));
        let entities = entities::to_telegram(entities)?;
        if !entities.is_empty() {
            req = req.entities(entities);
        }
        let sent = request("sendMessage", destination, req).await?;
        Ok(MessageId(sent.id.0))
    }

    async fn send_media(
        &self,
        destination: ChannelId,
        media: &MediaRef,
        caption: &str,
        entities: &[TextEntity],
    ) -> Result<MessageId> {
        let to = chat(destination);
        let entities = entities::to_telegram(entities)?;
        let file = || InputFile::file_id(media.file_id.clone());

        let sent = match media.kind {
            MediaKind::Photo => {
                let mut req = self.bot.send_photo(to, file());
                if !caption.is_empty() {
                    req = req.caption(caption).caption_entities(entities);
                }
                request("sendPhoto", destination, req).await?.id
            },
            MediaKind::Document => {
                let mut req = self.bot.send_document(to, file());
                if !caption.is_empty() {
                    req = req.caption(caption).caption_entities(entities);
                }
                request("sendDocument", destination, req).await?.id
            },
            MediaKind::Video => {
                let mut req = self.bot.send_video(to, file());
                if !caption.is_empty() {
                    req = req.caption(caption).caption_entities(entities);
                }
                request("sendVideo", destination, req).await?.id
            },
            // Voice, audio, stickers and the rest: let the server copy the
            // original, overriding its caption with the current one.
            MediaKind::Other => {
                let req = self
                    .bot
                    .copy_message(
                        to,
                        chat(media.origin.channel),
                        TgMessageId(media.origin.message.0),
                    )
                    .caption(caption)
                    .caption_entities(entities);
                request("copyMessage", destination, req).await?
            },
        };
        Ok(MessageId(sent.0))
    }

    async fn edit_message_text(
        &self,
        destination: ChannelId,
        message: MessageId,
        text: &str,
        entities: &[TextEntity],
        link_preview: bool,
    ) -> Result<()> {
        let req = self
            .bot
            .edit_message_text(chat(destination), TgMessageId(message.0), text)
            .entities(entities::to_telegram(entities)?)
            .link_preview_options(link_preview_options(link_preview));
        edit_request("editMessageText", destination, req).await
    }

    async fn edit_message_caption(
        &self,
        destination: ChannelId,
        message: MessageId,
        caption: &str,
        entities: &[TextEntity],
    ) -> Result<()> {
        let req = self
            .bot
            .edit_message_caption(chat(destination), TgMessageId(message.0))
            .caption(caption)
            .caption_entities(entities::to_telegram(entities)?);
        edit_request("editMessageCaption", destination, req).await
    }

    async fn delete_message(&self, destination: ChannelId, message: MessageId) -> Result<()> {
        let req = self
            .bot
            .delete_message(chat(destination), TgMessageId(message.0));
        request("deleteMessage", destination, req).await?;
        Ok(())
    }
}
