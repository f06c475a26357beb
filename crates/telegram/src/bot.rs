use std::time::Duration;

use {
    chanmirror_channels::{Dispatcher, Error as ChannelError},
    chanmirror_config::TelegramSettings,
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, Me, Update},
    },
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use chanmirror_metrics::{counter, telegram as telegram_metrics};

use crate::{
    Error, Result,
    normalize::{InboundEvent, normalize},
};

/// Pause after a failed `getUpdates` before polling again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Build a bot whose HTTP client outlives the long-polling timeout, so the
/// client does not abort `getUpdates` before Telegram answers.
pub fn build_bot(settings: &TelegramSettings) -> Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(settings.poll_timeout_secs) + 15))
        .build()?;
    let bot = Bot::with_client(settings.token.expose_secret(), client);

    match &settings.api_url {
        Some(url) => {
            let url = reqwest::Url::parse(url).map_err(|e| Error::ApiUrl(format!("{url}: {e}")))?;
            Ok(bot.set_api_url(url))
        },
        None => Ok(bot),
    }
}

/// Verify credentials and clear any webhook so long polling works.
pub async fn connect(bot: &Bot) -> Result<Me> {
    let me = bot.get_me().await?;
    bot.delete_webhook().send().await?;
    info!(username = ?me.username, "telegram bot connected (webhook cleared)");
    Ok(me)
}

/// A running polling loop.
pub struct Polling {
    cancel: CancellationToken,
    task: JoinHandle<Dispatcher>,
}

impl Polling {
    /// Resolves when polling stops on its own or is asked to stop.
    pub async fn stopped(&self) {
        self.cancel.cancelled().await;
    }

    /// Stop polling, then let every queued event finish relaying.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        let dispatcher = self
            .task
            .await
            .map_err(|e| Error::external("telegram polling task failed", e))?;
        dispatcher.shutdown().await;
        Ok(())
    }
}

/// Spawn the `getUpdates` loop feeding `dispatcher`.
pub fn start_polling(bot: Bot, poll_timeout_secs: u32, dispatcher: Dispatcher) -> Polling {
    let cancel = CancellationToken::new();
    let task = tokio::spawn(poll(bot, poll_timeout_secs, dispatcher, cancel.clone()));
    Polling { cancel, task }
}

async fn poll(
    bot: Bot,
    poll_timeout_secs: u32,
    mut dispatcher: Dispatcher,
    cancel: CancellationToken,
) -> Dispatcher {
    info!("starting telegram polling loop");
    let mut offset: i32 = 0;

    loop {
        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(poll_timeout_secs)
            .allowed_updates(vec![
                AllowedUpdate::ChannelPost,
                AllowedUpdate::EditedChannelPost,
                AllowedUpdate::Message,
                AllowedUpdate::EditedMessage,
            ])
            .send();

        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = request => result,
        };

        match result {
            Ok(updates) => {
                debug!(count = updates.len(), "got telegram updates");
                for update in updates {
                    offset = update.id.as_offset();
                    if let Err(e) = route(update, &mut dispatcher) {
                        warn!(error = %e, "could not queue telegram update");
                    }
                }
            },
            Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                warn!("telegram polling stopped: another instance is already running with this token");
                cancel.cancel();
                break;
            },
            Err(e) => {
                #[cfg(feature = "metrics")]
                counter!(telegram_metrics::POLLING_ERRORS_TOTAL).increment(1);
                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(POLL_ERROR_BACKOFF) => {},
                }
            },
        }
    }

    info!("telegram polling stopped");
    dispatcher
}

fn route(update: Update, dispatcher: &mut Dispatcher) -> Result<()> {
    #[cfg(feature = "metrics")]
    counter!(telegram_metrics::UPDATES_RECEIVED_TOTAL).increment(1);

    let event = match InboundEvent::try_from(update.kind).and_then(|raw| normalize(&raw)) {
        Ok(event) => event,
        Err(ChannelError::Unrecognized { reason }) => {
            #[cfg(feature = "metrics")]
            counter!(telegram_metrics::UPDATES_IGNORED_TOTAL).increment(1);
            debug!(reason, "ignoring telegram update");
            return Ok(());
        },
        Err(e) => return Err(e.into()),
    };

    debug!(source = %event.key(), kind = %event.kind(), "received telegram update");
    dispatcher.dispatch(event)?;
    Ok(())
}
