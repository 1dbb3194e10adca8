//! # Suggested Response Keyboards
//!
//! Keyboards ride along on outbound messages and offer the recipient a row
//! of tappable responses. A message carries an ordered list of keyboards;
//! at most one of them is "global" (no recipient restriction), and helpers
//! on `Message` merge repeated additions into it.

use serde::{Deserialize, Serialize};

use crate::core::config::is_valid_username;
use crate::core::error::{Error, Result};

/// One entry on a suggested-response keyboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum KeyboardResponse {
    Text { body: String },
    #[serde(rename_all = "camelCase")]
    FriendPicker {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preselected: Option<Vec<String>>,
    },
    #[serde(rename_all = "camelCase")]
    Picture {
        pic_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
}

impl KeyboardResponse {
    pub fn text(body: impl Into<String>) -> Self {
        KeyboardResponse::Text { body: body.into() }
    }

    pub fn friend_picker(
        body: Option<String>,
        min: Option<u32>,
        max: Option<u32>,
        preselected: Option<Vec<String>>,
    ) -> Self {
        KeyboardResponse::FriendPicker {
            body,
            min,
            max,
            preselected,
        }
    }

    pub fn picture(pic_url: impl Into<String>, metadata: Option<serde_json::Value>) -> Self {
        KeyboardResponse::Picture {
            pic_url: pic_url.into(),
            metadata,
        }
    }
}

impl From<&str> for KeyboardResponse {
    fn from(body: &str) -> Self {
        KeyboardResponse::text(body)
    }
}

impl From<String> for KeyboardResponse {
    fn from(body: String) -> Self {
        KeyboardResponse::text(body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum KeyboardKind {
    Suggested,
}

/// A suggested-response keyboard, optionally scoped to one recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyboard {
    #[serde(rename = "type")]
    kind: KeyboardKind,
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub responses: Vec<KeyboardResponse>,
}

impl Keyboard {
    /// A visible keyboard shown to every participant.
    pub fn suggested<I, R>(responses: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<KeyboardResponse>,
    {
        Keyboard {
            kind: KeyboardKind::Suggested,
            hidden: false,
            to: None,
            responses: responses.into_iter().map(Into::into).collect(),
        }
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Restrict the keyboard to a single recipient.
    pub fn for_user(mut self, to: impl Into<String>) -> Result<Self> {
        let to = to.into();
        if !is_valid_username(&to) {
            return Err(Error::InvalidRecipient(to));
        }
        self.to = Some(to);
        Ok(self)
    }

    pub fn add_response(&mut self, response: impl Into<KeyboardResponse>) -> &mut Self {
        self.responses.push(response.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keyboard_wire_shape() {
        let keyboard = Keyboard::suggested(["Yes", "No"]);
        let value = serde_json::to_value(&keyboard).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "suggested",
                "hidden": false,
                "responses": [
                    { "type": "text", "body": "Yes" },
                    { "type": "text", "body": "No" },
                ],
            })
        );
    }

    #[test]
    fn test_keyboard_for_user_serializes_to() {
        let keyboard = Keyboard::suggested(["Hi"]).for_user("alice").unwrap();
        let value = serde_json::to_value(&keyboard).unwrap();
        assert_eq!(value["to"], json!("alice"));
    }

    #[test]
    fn test_keyboard_rejects_bad_recipient() {
        let result = Keyboard::suggested(["Hi"]).for_user("no spaces allowed");
        assert!(matches!(result, Err(Error::InvalidRecipient(_))));
    }

    #[test]
    fn test_friend_picker_response_skips_absent_fields() {
        let response = KeyboardResponse::friend_picker(None, Some(1), Some(5), None);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({ "type": "friend-picker", "min": 1, "max": 5 })
        );
    }
}
