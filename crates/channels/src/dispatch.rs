//! Per-source-channel queues in front of the relay engine.
//!
//! Each source channel gets one queue drained by one task, so a channel's
//! events are relayed one at a time in arrival order while different
//! channels proceed concurrently.

use std::{collections::HashMap, sync::Arc};

use {
    tokio::{sync::mpsc, task::JoinSet},
    tracing::{debug, info, warn},
};

use crate::{
    Error, Result,
    event::{ChannelId, MessageEvent},
    relay::RelayEngine,
};

pub struct Dispatcher {
    engine: Arc<RelayEngine>,
    queues: HashMap<ChannelId, mpsc::UnboundedSender<MessageEvent>>,
    workers: JoinSet<()>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(engine: Arc<RelayEngine>) -> Self {
        Self {
            engine,
            queues: HashMap::new(),
            workers: JoinSet::new(),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<RelayEngine> {
        &self.engine
    }

    /// Queue `event` behind earlier events from the same channel.
    ///
    /// Events from channels that are not mirror sources are dropped here.
    pub fn dispatch(&mut self, event: MessageEvent) -> Result<()> {
        let channel = event.source_channel();
        if !self.engine.is_source(channel) {
            debug!(source = %event.key(), "not a mirror source, dropping event");
            return Ok(());
        }

        let engine = &self.engine;
        let workers = &mut self.workers;
        let queue = self.queues.entry(channel).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            workers.spawn(drain(Arc::clone(engine), channel, rx));
            tx
        });

        queue
            .send(event)
            .map_err(|e| Error::external(format!("relay worker for {channel} stopped"), e))
    }

    /// Close every queue and wait for queued events to finish relaying.
    ///
    /// In-flight delivery calls are never interrupted.
    pub async fn shutdown(mut self) {
        let channels = self.queues.len();
        self.queues.clear();
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "relay worker ended abnormally");
            }
        }
        info!(channels, "relay workers drained");
    }
}

async fn drain(
    engine: Arc<RelayEngine>,
    channel: ChannelId,
    mut queue: mpsc::UnboundedReceiver<MessageEvent>,
) {
    debug!(%channel, "relay worker started");
    while let Some(event) = queue.recv().await {
        let report = engine.handle(event).await;
        debug!(
            source = %report.key,
            kind = %report.kind,
            skipped = ?report.skipped,
            delivered = report.delivered(),
            failed = report.failed(),
            "event relayed"
        );
    }
    debug!(%channel, "relay worker stopped");
}
