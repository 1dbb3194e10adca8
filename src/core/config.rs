//! # Bot Configuration
//!
//! Identity, network location, feature flags and batching limits for one
//! bot instance. Configuration is validated once at construction and is
//! immutable afterwards; the wire-facing subset can be pushed to or pulled
//! from the platform through the config endpoint.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};
use crate::message::keyboard::Keyboard;

/// Default REST API origin.
pub const DEFAULT_API_DOMAIN: &str = "https://api.kik.com";
/// Default webhook route for inbound message batches.
pub const DEFAULT_INCOMING_PATH: &str = "/incoming";
/// Default route serving the bot's scan code image.
pub const DEFAULT_SCAN_CODE_PATH: &str = "/kik-code.png";
/// Most messages the send endpoint accepts per call.
pub const DEFAULT_MAX_MESSAGE_PER_BATCH: usize = 25;
/// Most messages the broadcast endpoint accepts per call.
pub const DEFAULT_MAX_MESSAGE_PER_BROADCAST: usize = 100;

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.]{2,32}$").expect("pattern compiles"))
}

/// Check a username against the platform's username rules.
pub fn is_valid_username(username: &str) -> bool {
    username_pattern().is_match(username)
}

/// Check an API key: keys are version-4 UUIDs.
pub fn is_valid_api_key(api_key: &str) -> bool {
    matches!(
        uuid::Uuid::parse_str(api_key),
        Ok(id) if id.get_version_num() == 4
    )
}

/// Static configuration for one bot instance.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// The bot's own username.
    pub username: String,
    /// API key issued for the bot.
    pub api_key: String,
    /// REST API origin.
    pub api_domain: String,
    /// Public base URL the webhook is reachable under.
    pub base_url: Option<String>,
    /// Route that receives inbound message batches.
    pub incoming_path: String,
    /// Route that serves the bot's scan code image.
    pub scan_code_path: String,
    /// Upper bound on messages per send call.
    pub max_message_per_batch: usize,
    /// Upper bound on messages per broadcast call.
    pub max_message_per_broadcast: usize,
    pub manually_send_read_receipts: bool,
    pub receive_read_receipts: bool,
    pub receive_delivery_receipts: bool,
    pub receive_is_typing: bool,
    /// Disable webhook signature verification (local testing only).
    pub skip_signature_check: bool,
    /// Keyboard shown to users who have not yet messaged the bot.
    pub static_keyboard: Option<Keyboard>,
}

impl BotConfig {
    /// Configuration with platform defaults for everything but identity.
    pub fn new(username: impl Into<String>, api_key: impl Into<String>) -> Self {
        BotConfig {
            username: username.into(),
            api_key: api_key.into(),
            api_domain: DEFAULT_API_DOMAIN.to_string(),
            base_url: None,
            incoming_path: DEFAULT_INCOMING_PATH.to_string(),
            scan_code_path: DEFAULT_SCAN_CODE_PATH.to_string(),
            max_message_per_batch: DEFAULT_MAX_MESSAGE_PER_BATCH,
            max_message_per_broadcast: DEFAULT_MAX_MESSAGE_PER_BROADCAST,
            manually_send_read_receipts: false,
            receive_read_receipts: false,
            receive_delivery_receipts: false,
            receive_is_typing: false,
            skip_signature_check: false,
            static_keyboard: None,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn api_domain(mut self, api_domain: impl Into<String>) -> Self {
        self.api_domain = api_domain.into();
        self
    }

    pub fn incoming_path(mut self, path: impl Into<String>) -> Self {
        self.incoming_path = path.into();
        self
    }

    pub fn scan_code_path(mut self, path: impl Into<String>) -> Self {
        self.scan_code_path = path.into();
        self
    }

    pub fn max_message_per_batch(mut self, limit: usize) -> Self {
        self.max_message_per_batch = limit;
        self
    }

    pub fn max_message_per_broadcast(mut self, limit: usize) -> Self {
        self.max_message_per_broadcast = limit;
        self
    }

    pub fn manually_send_read_receipts(mut self, enabled: bool) -> Self {
        self.manually_send_read_receipts = enabled;
        self
    }

    pub fn receive_read_receipts(mut self, enabled: bool) -> Self {
        self.receive_read_receipts = enabled;
        self
    }

    pub fn receive_delivery_receipts(mut self, enabled: bool) -> Self {
        self.receive_delivery_receipts = enabled;
        self
    }

    pub fn receive_is_typing(mut self, enabled: bool) -> Self {
        self.receive_is_typing = enabled;
        self
    }

    pub fn skip_signature_check(mut self, skip: bool) -> Self {
        self.skip_signature_check = skip;
        self
    }

    pub fn static_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.static_keyboard = Some(keyboard);
        self
    }

    /// Validate the configuration, reporting every violation at once.
    ///
    /// A bot refuses to construct on any violation; there is no partially
    /// usable state.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if !is_valid_username(&self.username) {
            errors.push("option \"username\" must be a valid bot username");
        }

        if !is_valid_api_key(&self.api_key) {
            errors.push("option \"api_key\" must be an API key (a v4 UUID)");
        }

        if self.incoming_path.is_empty() || !self.incoming_path.starts_with('/') {
            errors.push("option \"incoming_path\" must be a non-empty path starting with '/'");
        }

        if self.scan_code_path.is_empty() || !self.scan_code_path.starts_with('/') {
            errors.push("option \"scan_code_path\" must be a non-empty path starting with '/'");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(errors.join(", ")))
        }
    }

    /// The wire configuration derived from this config.
    ///
    /// Fails when no base URL was configured, since the webhook address
    /// cannot be formed without one.
    pub fn configuration(&self) -> Result<BotConfiguration> {
        let base = self.base_url.as_deref().ok_or(Error::MissingBaseUrl)?;
        let webhook = reqwest::Url::parse(base)
            .and_then(|base| base.join(&self.incoming_path))
            .map_err(|_| Error::Config(format!("option \"base_url\" is not a valid URL: {base}")))?;

        Ok(BotConfiguration {
            webhook: webhook.to_string(),
            features: BotFeatures {
                manually_send_read_receipts: self.manually_send_read_receipts,
                receive_read_receipts: self.receive_read_receipts,
                receive_delivery_receipts: self.receive_delivery_receipts,
                receive_is_typing: self.receive_is_typing,
            },
            static_keyboard: self.static_keyboard.clone(),
        })
    }
}

/// The configuration object exchanged with the platform's config endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotConfiguration {
    pub webhook: String,
    pub features: BotFeatures,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_keyboard: Option<Keyboard>,
}

/// Feature flags the platform honors when delivering to the webhook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotFeatures {
    pub manually_send_read_receipts: bool,
    pub receive_read_receipts: bool,
    pub receive_delivery_receipts: bool,
    pub receive_is_typing: bool,
}
