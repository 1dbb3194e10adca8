//! # Message DTOs
//!
//! Typed representations of the platform's wire messages. Each message is
//! a tagged variant carrying only its own fields, plus a small set of
//! common optional fields (delay, type time, mention, keyboards) shared by
//! every type. Serialization is camelCase and omits absent fields, so the
//! wire form of a minimal text message is exactly
//! `{"type":"text","body":"..."}`.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

pub mod incoming;
pub mod keyboard;

use serde::{Deserialize, Serialize};

use keyboard::{Keyboard, KeyboardResponse};

/// Content attribution shown under link, picture and video messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribution {
    pub name: String,
    pub icon_url: String,
}

/// The tagged content of a message, one variant per wire type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessageKind {
    Text {
        body: String,
    },
    #[serde(rename_all = "camelCase")]
    Link {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pic_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attribution: Option<Attribution>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        no_forward: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        no_save: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kik_js_data: Option<serde_json::Value>,
    },
    #[serde(rename_all = "camelCase")]
    Picture {
        pic_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attribution: Option<Attribution>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        no_forward: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        no_save: Option<bool>,
    },
    #[serde(rename_all = "camelCase")]
    Video {
        video_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attribution: Option<Attribution>,
        #[serde(rename = "loop", default, skip_serializing_if = "Option::is_none")]
        looping: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        muted: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        autoplay: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        no_forward: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        no_save: Option<bool>,
    },
    #[serde(rename_all = "camelCase")]
    IsTyping {
        is_typing: bool,
    },
    #[serde(rename_all = "camelCase")]
    ReadReceipt {
        message_ids: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    DeliveryReceipt {
        message_ids: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Sticker {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sticker_pack_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sticker_url: Option<String>,
    },
    StartChatting,
    ScanData {
        data: String,
    },
    FriendPicker {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        picked: Option<Vec<String>>,
    },
    /// A message type this crate does not know about; carried so one new
    /// platform type never poisons a whole webhook batch.
    #[serde(other)]
    Unknown,
}

impl MessageKind {
    /// The wire name of this message type.
    pub fn name(&self) -> &'static str {
        match self {
            MessageKind::Text { .. } => "text",
            MessageKind::Link { .. } => "link",
            MessageKind::Picture { .. } => "picture",
            MessageKind::Video { .. } => "video",
            MessageKind::IsTyping { .. } => "is-typing",
            MessageKind::ReadReceipt { .. } => "read-receipt",
            MessageKind::DeliveryReceipt { .. } => "delivery-receipt",
            MessageKind::Sticker { .. } => "sticker",
            MessageKind::StartChatting => "start-chatting",
            MessageKind::ScanData { .. } => "scan-data",
            MessageKind::FriendPicker { .. } => "friend-picker",
            MessageKind::Unknown => "unknown",
        }
    }
}

/// Optional fields valid on every outbound message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mention: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyboards: Vec<Keyboard>,
}

/// One outbound-constructible message: tagged content plus common fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(flatten)]
    pub kind: MessageKind,
    #[serde(flatten)]
    pub common: CommonFields,
}

impl Message {
    fn of(kind: MessageKind) -> Self {
        Message {
            kind,
            common: CommonFields::default(),
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Message::of(MessageKind::Text { body: body.into() })
    }

    pub fn link(url: impl Into<String>) -> Self {
        Message::of(MessageKind::Link {
            url: url.into(),
            title: None,
            text: None,
            pic_url: None,
            attribution: None,
            no_forward: None,
            no_save: None,
            kik_js_data: None,
        })
    }

    pub fn picture(pic_url: impl Into<String>) -> Self {
        Message::of(MessageKind::Picture {
            pic_url: pic_url.into(),
            attribution: None,
            no_forward: None,
            no_save: None,
        })
    }

    pub fn video(video_url: impl Into<String>) -> Self {
        Message::of(MessageKind::Video {
            video_url: video_url.into(),
            attribution: None,
            looping: None,
            muted: None,
            autoplay: None,
            no_forward: None,
            no_save: None,
        })
    }

    pub fn is_typing(typing: bool) -> Self {
        Message::of(MessageKind::IsTyping { is_typing: typing })
    }

    pub fn read_receipt(message_ids: Vec<String>) -> Self {
        Message::of(MessageKind::ReadReceipt { message_ids })
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn with_delay(mut self, millis: u64) -> Self {
        self.common.delay = Some(millis);
        self
    }

    pub fn with_type_time(mut self, millis: u64) -> Self {
        self.common.type_time = Some(millis);
        self
    }

    pub fn with_mention(mut self, username: impl Into<String>) -> Self {
        self.common.mention = Some(username.into());
        self
    }

    /// Set the title; applies to link messages only.
    pub fn with_title(mut self, value: impl Into<String>) -> Self {
        if let MessageKind::Link { title, .. } = &mut self.kind {
            *title = Some(value.into());
        }
        self
    }

    /// Set the preview text; applies to link messages only.
    pub fn with_text(mut self, value: impl Into<String>) -> Self {
        if let MessageKind::Link { text, .. } = &mut self.kind {
            *text = Some(value.into());
        }
        self
    }

    /// Set the preview picture; applies to link messages only.
    pub fn with_pic_url(mut self, value: impl Into<String>) -> Self {
        if let MessageKind::Link { pic_url, .. } = &mut self.kind {
            *pic_url = Some(value.into());
        }
        self
    }

    pub fn with_no_forward(mut self, value: bool) -> Self {
        match &mut self.kind {
            MessageKind::Link { no_forward, .. }
            | MessageKind::Picture { no_forward, .. }
            | MessageKind::Video { no_forward, .. } => *no_forward = Some(value),
            _ => {}
        }
        self
    }

    pub fn with_no_save(mut self, value: bool) -> Self {
        match &mut self.kind {
            MessageKind::Link { no_save, .. }
            | MessageKind::Picture { no_save, .. }
            | MessageKind::Video { no_save, .. } => *no_save = Some(value),
            _ => {}
        }
        self
    }

    pub fn with_kik_js_data(mut self, value: serde_json::Value) -> Self {
        if let MessageKind::Link { kik_js_data, .. } = &mut self.kind {
            *kik_js_data = Some(value);
        }
        self
    }

    pub fn with_attribution(mut self, name: impl Into<String>, icon_url: impl Into<String>) -> Self {
        let value = Attribution {
            name: name.into(),
            icon_url: icon_url.into(),
        };
        match &mut self.kind {
            MessageKind::Link { attribution, .. }
            | MessageKind::Picture { attribution, .. }
            | MessageKind::Video { attribution, .. } => *attribution = Some(value),
            _ => {}
        }
        self
    }

    /// Loop playback; applies to video messages only.
    pub fn with_loop(mut self, value: bool) -> Self {
        if let MessageKind::Video { looping, .. } = &mut self.kind {
            *looping = Some(value);
        }
        self
    }

    pub fn with_muted(mut self, value: bool) -> Self {
        if let MessageKind::Video { muted, .. } = &mut self.kind {
            *muted = Some(value);
        }
        self
    }

    pub fn with_autoplay(mut self, value: bool) -> Self {
        if let MessageKind::Video { autoplay, .. } = &mut self.kind {
            *autoplay = Some(value);
        }
        self
    }

    /// Add text responses to the message's global keyboard.
    ///
    /// All text responses added this way share the single keyboard that has
    /// no recipient restriction; one is created on first use.
    pub fn add_text_responses<I, S>(mut self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let global = self
            .common
            .keyboards
            .iter_mut()
            .find(|keyboard| keyboard.to.is_none());

        match global {
            Some(keyboard) => {
                for response in responses {
                    keyboard.add_response(KeyboardResponse::text(response));
                }
            }
            None => {
                let responses: Vec<KeyboardResponse> = responses
                    .into_iter()
                    .map(KeyboardResponse::text)
                    .collect();
                self.common.keyboards.push(Keyboard::suggested(responses));
            }
        }
        self
    }

    /// Attach a suggested-response keyboard.
    ///
    /// Responses merge into an existing keyboard with the same recipient
    /// and visibility, otherwise a new keyboard is appended.
    pub fn add_response_keyboard(mut self, keyboard: Keyboard) -> Self {
        let existing = self.common.keyboards.iter_mut().find(|candidate| {
            candidate.to == keyboard.to && candidate.hidden == keyboard.hidden
        });

        match existing {
            Some(target) => target.responses.extend(keyboard.responses),
            None => self.common.keyboards.push(keyboard),
        }
        self
    }
}

impl From<&str> for Message {
    fn from(body: &str) -> Self {
        Message::text(body)
    }
}

impl From<String> for Message {
    fn from(body: String) -> Self {
        Message::text(body)
    }
}

/// A wire-ready message stamped with its routing information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    #[serde(flatten)]
    pub message: Message,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

impl OutgoingMessage {
    /// Stamp a copy of `message` with its recipient and optional chat.
    ///
    /// The caller's message is never mutated; routing is added to a copy.
    pub fn prepare(message: &Message, to: &str, chat_id: Option<&str>) -> Self {
        OutgoingMessage {
            message: message.clone(),
            to: to.to_string(),
            chat_id: chat_id.map(str::to_string),
        }
    }
}

/// Anything `send`/`broadcast`/`reply` accept: one message, a batch, or
/// plain text.
pub trait IntoMessages {
    fn into_messages(self) -> Vec<Message>;
}

impl IntoMessages for Message {
    fn into_messages(self) -> Vec<Message> {
        vec![self]
    }
}

impl IntoMessages for Vec<Message> {
    fn into_messages(self) -> Vec<Message> {
        self
    }
}

impl IntoMessages for &str {
    fn into_messages(self) -> Vec<Message> {
        vec![Message::text(self)]
    }
}

impl IntoMessages for String {
    fn into_messages(self) -> Vec<Message> {
        vec![Message::text(self)]
    }
}
