//! Recording [`Delivery`] fake shared by the crate's tests.

use std::{
    collections::HashSet,
    sync::{
        Mutex,
        atomic::{AtomicI32, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    Error, Result,
    delivery::Delivery,
    event::{ChannelId, MediaRef, MessageId, TextEntity},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    SendMessage,
    SendMedia,
    EditText,
    EditCaption,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SendMessage {
        destination: ChannelId,
        text: String,
    },
    SendMedia {
        destination: ChannelId,
        file_id: String,
        caption: String,
    },
    EditText {
        destination: ChannelId,
        message: MessageId,
        text: String,
    },
    EditCaption {
        destination: ChannelId,
        message: MessageId,
        caption: String,
    },
    Delete {
        destination: ChannelId,
        message: MessageId,
    },
}

/// Captures every call; ids are handed out from 1000 upwards in send order.
pub struct RecordingDelivery {
    calls: Mutex<Vec<Call>>,
    sent: Mutex<Vec<MessageId>>,
    last_payload: Mutex<(Vec<TextEntity>, bool)>,
    failing: Mutex<HashSet<(Op, ChannelId)>>,
    next_id: AtomicI32,
}

impl Default for RecordingDelivery {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            last_payload: Mutex::new((Vec::new(), true)),
            failing: Mutex::new(HashSet::new()),
            next_id: AtomicI32::new(1000),
        }
    }
}

impl RecordingDelivery {
    /// Make every `op` against `destination` fail from now on.
    pub fn fail(&self, op: Op, destination: ChannelId) {
        self.failing.lock().unwrap().insert((op, destination));
    }

    /// Drain the recorded calls.
    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    /// Id returned by the `n`-th successful send.
    pub fn sent_id(&self, n: usize) -> MessageId {
        self.sent.lock().unwrap()[n]
    }

    /// Entities and link-preview flag of the most recent send or edit.
    pub fn last_payload(&self) -> (Vec<TextEntity>, bool) {
        self.last_payload.lock().unwrap().clone()
    }

    fn record(&self, op: Op, destination: ChannelId, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(&(op, destination)) {
            return Err(Error::transport(
                "test",
                destination,
                format!("{op:?} rejected by test transport"),
            ));
        }
        Ok(())
    }

    fn assign_id(&self) -> MessageId {
        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sent.lock().unwrap().push(id);
        id
    }
}

#[async_trait]
impl Delivery for RecordingDelivery {
    async fn send_message(
        &self,
        destination: ChannelId,
        text: &str,
        entities: &[TextEntity],
        link_preview: bool,
    ) -> Result<MessageId> {
        *self.last_payload.lock().unwrap() = (entities.to_vec(), link_preview);
        self.record(Op::SendMessage, destination, Call::SendMessage {
            destination,
            text: text.to_string(),
        })?;
        Ok(self.assign_id())
    }

    async fn send_media(
        &self,
        destination: ChannelId,
        media: &MediaRef,
        caption: &str,
        _entities: &[TextEntity],
    ) -> Result<MessageId> {
        self.record(Op::SendMedia, destination, Call::SendMedia {
            destination,
            file_id: media.file_id.clone(),
            caption: caption.to_string(),
        })?;
        Ok(self.assign_id())
    }

    async fn edit_message_text(
        &self,
        destination: ChannelId,
        message: MessageId,
        text: &str,
        entities: &[TextEntity],
        link_preview: bool,
    ) -> Result<()> {
        *self.last_payload.lock().unwrap() = (entities.to_vec(), link_preview);
        self.record(Op::EditText, destination, Call::EditText {
            destination,
            message,
            text: text.to_string(),
        })
    }

    async fn edit_message_caption(
        &self,
        destination: ChannelId,
        message: MessageId,
        caption: &str,
        _entities: &[TextEntity],
    ) -> Result<()> {
        self.record(Op::EditCaption, destination, Call::EditCaption {
            destination,
            message,
            caption: caption.to_string(),
        })
    }

    async fn delete_message(&self, destination: ChannelId, message: MessageId) -> Result<()> {
        self.record(Op::Delete, destination, Call::Delete {
            destination,
            message,
        })
    }
}
