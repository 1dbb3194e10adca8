//! # Incoming Envelope
//!
//! One inbound message from the platform, enriched with routing metadata
//! and a handle to the bot's outbound queue so handlers can reply in
//! place. Envelopes are cheaply cloneable; the finish flag and captured
//! regex groups are shared across clones, which is what makes the one-shot
//! finalize guarantee hold no matter how many copies a handler keeps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Deserialize;

use crate::bot::outbound::OutboundQueue;
use crate::core::error::Result;
use crate::message::{IntoMessages, Message, MessageKind};

/// The kind of chat an inbound message arrived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Direct,
    Private,
    Public,
    #[serde(other)]
    Other,
}

/// Wire form of one element in a webhook `messages` batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingWire {
    #[serde(flatten)]
    pub kind: MessageKind,
    pub from: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub mention: Option<String>,
    #[serde(default)]
    pub participants: Option<Vec<String>>,
    #[serde(default)]
    pub chat_type: Option<ChatType>,
    #[serde(default)]
    pub read_receipt_requested: Option<bool>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

struct IncomingInner {
    wire: IncomingWire,
    finished: AtomicBool,
    matches: Mutex<Vec<String>>,
    outbound: OutboundQueue,
}

/// An inbound message travelling through the handler chain.
#[derive(Clone)]
pub struct Incoming {
    inner: Arc<IncomingInner>,
}

impl Incoming {
    pub(crate) fn new(wire: IncomingWire, outbound: OutboundQueue) -> Self {
        Incoming {
            inner: Arc::new(IncomingInner {
                wire,
                finished: AtomicBool::new(false),
                matches: Mutex::new(Vec::new()),
                outbound,
            }),
        }
    }

    pub fn kind(&self) -> &MessageKind {
        &self.inner.wire.kind
    }

    pub fn from(&self) -> &str {
        &self.inner.wire.from
    }

    pub fn id(&self) -> Option<&str> {
        self.inner.wire.id.as_deref()
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.inner.wire.chat_id.as_deref()
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.inner.wire.timestamp
    }

    pub fn mention(&self) -> Option<&str> {
        self.inner.wire.mention.as_deref()
    }

    pub fn participants(&self) -> &[String] {
        self.inner.wire.participants.as_deref().unwrap_or(&[])
    }

    pub fn chat_type(&self) -> Option<ChatType> {
        self.inner.wire.chat_type
    }

    pub fn read_receipt_requested(&self) -> bool {
        self.inner.wire.read_receipt_requested.unwrap_or(false)
    }

    pub fn metadata(&self) -> Option<&serde_json::Value> {
        self.inner.wire.metadata.as_ref()
    }

    /// The text body, when this is a text message.
    pub fn body(&self) -> Option<&str> {
        match self.kind() {
            MessageKind::Text { body } => Some(body),
            _ => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self.kind() {
            MessageKind::Link { url, .. } => Some(url),
            _ => None,
        }
    }

    pub fn pic_url(&self) -> Option<&str> {
        match self.kind() {
            MessageKind::Picture { pic_url, .. } => Some(pic_url),
            MessageKind::Link {
                pic_url: Some(pic_url),
                ..
            } => Some(pic_url),
            _ => None,
        }
    }

    pub fn video_url(&self) -> Option<&str> {
        match self.kind() {
            MessageKind::Video { video_url, .. } => Some(video_url),
            _ => None,
        }
    }

    pub fn scan_data(&self) -> Option<&str> {
        match self.kind() {
            MessageKind::ScanData { data } => Some(data),
            _ => None,
        }
    }

    pub fn sticker_pack_id(&self) -> Option<&str> {
        match self.kind() {
            MessageKind::Sticker {
                sticker_pack_id, ..
            } => sticker_pack_id.as_deref(),
            _ => None,
        }
    }

    pub fn sticker_url(&self) -> Option<&str> {
        match self.kind() {
            MessageKind::Sticker { sticker_url, .. } => sticker_url.as_deref(),
            _ => None,
        }
    }

    pub fn picked(&self) -> Option<&[String]> {
        match self.kind() {
            MessageKind::FriendPicker { picked } => picked.as_deref(),
            _ => None,
        }
    }

    pub fn message_ids(&self) -> Option<&[String]> {
        match self.kind() {
            MessageKind::ReadReceipt { message_ids }
            | MessageKind::DeliveryReceipt { message_ids } => Some(message_ids),
            _ => None,
        }
    }

    pub fn is_text_message(&self) -> bool {
        matches!(self.kind(), MessageKind::Text { .. })
    }

    pub fn is_link_message(&self) -> bool {
        matches!(self.kind(), MessageKind::Link { .. })
    }

    pub fn is_picture_message(&self) -> bool {
        matches!(self.kind(), MessageKind::Picture { .. })
    }

    pub fn is_video_message(&self) -> bool {
        matches!(self.kind(), MessageKind::Video { .. })
    }

    pub fn is_start_chatting_message(&self) -> bool {
        matches!(self.kind(), MessageKind::StartChatting)
    }

    pub fn is_scan_data_message(&self) -> bool {
        matches!(self.kind(), MessageKind::ScanData { .. })
    }

    pub fn is_sticker_message(&self) -> bool {
        matches!(self.kind(), MessageKind::Sticker { .. })
    }

    pub fn is_is_typing_message(&self) -> bool {
        matches!(self.kind(), MessageKind::IsTyping { .. })
    }

    pub fn is_delivery_receipt_message(&self) -> bool {
        matches!(self.kind(), MessageKind::DeliveryReceipt { .. })
    }

    pub fn is_read_receipt_message(&self) -> bool {
        matches!(self.kind(), MessageKind::ReadReceipt { .. })
    }

    pub fn is_friend_picker_message(&self) -> bool {
        matches!(self.kind(), MessageKind::FriendPicker { .. })
    }

    pub fn is_mention(&self) -> bool {
        self.inner.wire.mention.is_some()
    }

    pub fn is_in_direct_chat(&self) -> bool {
        self.chat_type() == Some(ChatType::Direct)
    }

    pub fn is_in_private_chat(&self) -> bool {
        self.chat_type() == Some(ChatType::Private)
    }

    pub fn is_in_public_chat(&self) -> bool {
        self.chat_type() == Some(ChatType::Public)
    }

    /// Groups captured by a pattern-matching text filter, group 0 first.
    ///
    /// Groups that did not participate in the match come back empty.
    pub fn matches(&self) -> Vec<String> {
        self.inner.matches.lock().expect("match storage").clone()
    }

    pub(crate) fn set_matches(&self, matches: Vec<String>) {
        *self.inner.matches.lock().expect("match storage") = matches;
    }

    /// Mark the envelope finalized. Returns true only the first time.
    pub(crate) fn finish(&self) -> bool {
        !self.inner.finished.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::SeqCst)
    }

    /// Reply to the sender in the chat this message arrived from.
    ///
    /// Finalizes the envelope (once) and enqueues the reply on the bot's
    /// outbound queue; the returned future resolves with the flush that
    /// carries the reply.
    pub async fn reply(&self, messages: impl IntoMessages) -> Result<()> {
        self.finish();
        self.inner
            .outbound
            .send(messages.into_messages(), self.from(), self.chat_id())
            .await
    }

    /// Send a read receipt for this message.
    ///
    /// An envelope without an id has nothing to acknowledge; the call
    /// finalizes but makes no network request.
    pub async fn mark_read(&self) -> Result<()> {
        let Some(id) = self.id() else {
            self.finish();
            return Ok(());
        };
        self.reply(Message::read_receipt(vec![id.to_string()])).await
    }

    pub async fn start_typing(&self) -> Result<()> {
        self.reply(Message::is_typing(true)).await
    }

    pub async fn stop_typing(&self) -> Result<()> {
        self.reply(Message::is_typing(false)).await
    }

    /// Finalize the envelope without responding.
    pub fn ignore(&self) {
        self.finish();
    }
}

impl std::fmt::Debug for Incoming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Incoming")
            .field("type", &self.kind().name())
            .field("from", &self.from())
            .field("chat_id", &self.chat_id())
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_parses_text_with_routing() {
        let wire: IncomingWire = serde_json::from_value(json!({
            "type": "text",
            "body": "hi",
            "from": "alice",
            "id": "0115efde-e54b-43d5-873a-5fef7adc69fd",
            "chatId": "chat-1",
            "timestamp": 1439576628405u64,
            "chatType": "direct",
            "participants": ["alice"],
        }))
        .unwrap();

        assert_eq!(wire.from, "alice");
        assert_eq!(wire.chat_id.as_deref(), Some("chat-1"));
        assert_eq!(wire.chat_type, Some(ChatType::Direct));
        assert!(matches!(wire.kind, MessageKind::Text { ref body } if body == "hi"));
    }

    #[test]
    fn test_wire_tolerates_unknown_chat_type() {
        let wire: IncomingWire = serde_json::from_value(json!({
            "type": "text",
            "body": "hi",
            "from": "alice",
            "chatType": "group-of-the-future",
        }))
        .unwrap();
        assert_eq!(wire.chat_type, Some(ChatType::Other));
    }

    #[test]
    fn test_wire_requires_sender() {
        let result: std::result::Result<IncomingWire, _> =
            serde_json::from_value(json!({ "type": "text", "body": "hi" }));
        assert!(result.is_err());
    }
}
