//! # Remote API Client
//!
//! The REST boundary toward the platform: message send/broadcast, bot
//! configuration push/pull, user profiles and remote scan code
//! registration. The `KikApi` trait is the seam the bot runtime talks
//! through; `HttpApi` is the reqwest-backed production implementation, and
//! tests substitute recording fakes.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::core::config::BotConfig;
use crate::core::error::{Error, Result};
use crate::message::OutgoingMessage;
use crate::profile::ProfileData;

const MESSAGE_PATH: &str = "/v1/message";
const BROADCAST_PATH: &str = "/v1/broadcast";
const CONFIG_PATH: &str = "/v1/config";
const USER_PATH: &str = "/v1/user/";
const CODE_PATH: &str = "/v1/code";

/// Response from registering a data scan code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCode {
    pub id: String,
}

#[derive(Serialize)]
struct MessagesPayload<'a> {
    messages: &'a [OutgoingMessage],
}

#[derive(Serialize)]
struct CodePayload<'a> {
    data: &'a str,
}

/// Asynchronous calls the bot runtime makes against the platform.
///
/// Failures carry no retry policy; they propagate to whoever awaited the
/// operation.
#[async_trait]
pub trait KikApi: Send + Sync {
    /// POST one batch to the send endpoint.
    async fn send_messages(&self, messages: Vec<OutgoingMessage>) -> Result<()>;

    /// POST one batch to the broadcast endpoint.
    async fn broadcast_messages(&self, messages: Vec<OutgoingMessage>) -> Result<()>;

    /// Pull the configuration currently registered for the bot.
    async fn get_configuration(&self) -> Result<crate::core::BotConfiguration>;

    /// Push a configuration to the platform.
    async fn update_configuration(&self, configuration: &crate::core::BotConfiguration)
        -> Result<()>;

    /// Fetch a user's profile data.
    async fn user_info(&self, username: &str) -> Result<ProfileData>;

    /// Register a data scan code and get its id back.
    async fn create_data_code(&self, data: &str) -> Result<RemoteCode>;
}

/// reqwest-backed [`KikApi`] using basic auth (bot username / API key).
pub struct HttpApi {
    client: reqwest::Client,
    domain: String,
    username: String,
    api_key: String,
}

impl HttpApi {
    pub fn new(config: &BotConfig) -> Self {
        HttpApi {
            client: reqwest::Client::new(),
            domain: config.api_domain.clone(),
            username: config.username.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.domain, path)
    }

    fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(Error::Api {
                status: status.as_u16(),
            })
        }
    }

    async fn post_messages(&self, path: &str, messages: &[OutgoingMessage]) -> Result<()> {
        debug!("posting {} message(s) to {path}", messages.len());
        let response = self
            .client
            .post(self.url(path))
            .basic_auth(&self.username, Some(&self.api_key))
            .json(&MessagesPayload { messages })
            .send()
            .await?;
        Self::check(response)?;
        Ok(())
    }
}

#[async_trait]
impl KikApi for HttpApi {
    async fn send_messages(&self, messages: Vec<OutgoingMessage>) -> Result<()> {
        self.post_messages(MESSAGE_PATH, &messages).await
    }

    async fn broadcast_messages(&self, messages: Vec<OutgoingMessage>) -> Result<()> {
        self.post_messages(BROADCAST_PATH, &messages).await
    }

    async fn get_configuration(&self) -> Result<crate::core::BotConfiguration> {
        let response = self
            .client
            .get(self.url(CONFIG_PATH))
            .basic_auth(&self.username, Some(&self.api_key))
            .send()
            .await?;
        Ok(Self::check(response)?.json().await?)
    }

    async fn update_configuration(
        &self,
        configuration: &crate::core::BotConfiguration,
    ) -> Result<()> {
        let response = self
            .client
            .post(self.url(CONFIG_PATH))
            .basic_auth(&self.username, Some(&self.api_key))
            .json(configuration)
            .send()
            .await?;
        Self::check(response)?;
        Ok(())
    }

    async fn user_info(&self, username: &str) -> Result<ProfileData> {
        let response = self
            .client
            .get(format!("{}{}{username}", self.domain, USER_PATH))
            .basic_auth(&self.username, Some(&self.api_key))
            .send()
            .await?;
        Ok(Self::check(response)?.json().await?)
    }

    async fn create_data_code(&self, data: &str) -> Result<RemoteCode> {
        let response = self
            .client
            .post(self.url(CODE_PATH))
            .basic_auth(&self.username, Some(&self.api_key))
            .json(&CodePayload { data })
            .send()
            .await?;
        Ok(Self::check(response)?.json().await?)
    }
}
