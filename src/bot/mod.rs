//! # Bot Runtime
//!
//! One configured bot: the inbound handler chain, the outbound queue, and
//! the REST client, wired together behind a small registration API.
//! Register handlers while the bot is still exclusively owned, then wrap
//! it in an `Arc` and mount [`Bot::router`] in an axum application.
//!
//! ```no_run
//! use std::sync::Arc;
//! use kik_bot::{Bot, BotConfig, Flow, TextMatch};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut bot = Bot::new(
//!     BotConfig::new("echo.bot", "b225d75a-355b-4e6e-b8de-60cd869bfbbf")
//!         .base_url("https://echo.example.org"),
//! )?;
//!
//! bot.on_text_message(TextMatch::Any, |incoming: kik_bot::Incoming| async move {
//!     let body = incoming.body().unwrap_or_default().to_string();
//!     let _ = incoming.reply(body.as_str()).await;
//!     Flow::Handled
//! });
//!
//! let bot = Arc::new(bot);
//! bot.update_bot_configuration().await?;
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, bot.router()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

pub mod dispatch;
pub mod http;
pub mod outbound;

use std::sync::Arc;

use futures::future::try_join_all;
use log::info;

use crate::api::{HttpApi, KikApi};
use crate::core::config::BotConfig;
use crate::core::error::Result;
use crate::core::BotConfiguration;
use crate::message::incoming::{Incoming, IncomingWire};
use crate::message::IntoMessages;
use crate::profile::UserProfile;
use crate::scan_code::{remote_code_url, username_code_url, ScanCodeOptions};
use dispatch::{DispatchStack, FilterHandler, MessageHandler, TextHandler, TextMatch};
use outbound::{OutboundQueue, OutgoingHook};

/// A configured bot instance.
pub struct Bot {
    config: BotConfig,
    api: Arc<dyn KikApi>,
    stack: DispatchStack,
    outbound: OutboundQueue,
}

impl Bot {
    /// Build a bot talking to the real REST API.
    ///
    /// Fails fast on any configuration violation.
    pub fn new(config: BotConfig) -> Result<Self> {
        config.validate()?;
        let api: Arc<dyn KikApi> = Arc::new(HttpApi::new(&config));
        Self::with_api(config, api)
    }

    /// Build a bot over a custom [`KikApi`] implementation.
    ///
    /// The seam tests and simulators plug into; production code normally
    /// goes through [`Bot::new`].
    pub fn with_api(config: BotConfig, api: Arc<dyn KikApi>) -> Result<Self> {
        config.validate()?;
        let outbound = OutboundQueue::new(
            api.clone(),
            config.max_message_per_batch,
            config.max_message_per_broadcast,
        );
        Ok(Bot {
            config,
            api,
            stack: DispatchStack::default(),
            outbound,
        })
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn username(&self) -> &str {
        &self.config.username
    }

    /// Append a raw handler to the inbound chain.
    pub fn register(&mut self, handler: impl MessageHandler + 'static) -> &mut Self {
        self.stack.push(Arc::new(handler));
        self
    }

    /// Handle text messages, optionally filtered by body.
    ///
    /// `TextMatch::Any` fires for every text message; a string requires
    /// exact equality; a `Regex` requires a match and stores the captured
    /// groups on the envelope.
    pub fn on_text_message(
        &mut self,
        matcher: impl Into<TextMatch>,
        handler: impl MessageHandler + 'static,
    ) -> &mut Self {
        self.register(TextHandler::new(matcher.into(), handler))
    }

    pub fn on_link_message(&mut self, handler: impl MessageHandler + 'static) -> &mut Self {
        self.register(FilterHandler::new(Incoming::is_link_message, handler))
    }

    pub fn on_picture_message(&mut self, handler: impl MessageHandler + 'static) -> &mut Self {
        self.register(FilterHandler::new(Incoming::is_picture_message, handler))
    }

    pub fn on_video_message(&mut self, handler: impl MessageHandler + 'static) -> &mut Self {
        self.register(FilterHandler::new(Incoming::is_video_message, handler))
    }

    pub fn on_start_chatting_message(
        &mut self,
        handler: impl MessageHandler + 'static,
    ) -> &mut Self {
        self.register(FilterHandler::new(
            Incoming::is_start_chatting_message,
            handler,
        ))
    }

    pub fn on_scan_data_message(&mut self, handler: impl MessageHandler + 'static) -> &mut Self {
        self.register(FilterHandler::new(Incoming::is_scan_data_message, handler))
    }

    pub fn on_sticker_message(&mut self, handler: impl MessageHandler + 'static) -> &mut Self {
        self.register(FilterHandler::new(Incoming::is_sticker_message, handler))
    }

    pub fn on_is_typing_message(&mut self, handler: impl MessageHandler + 'static) -> &mut Self {
        self.register(FilterHandler::new(Incoming::is_is_typing_message, handler))
    }

    pub fn on_delivery_receipt_message(
        &mut self,
        handler: impl MessageHandler + 'static,
    ) -> &mut Self {
        self.register(FilterHandler::new(
            Incoming::is_delivery_receipt_message,
            handler,
        ))
    }

    pub fn on_read_receipt_message(
        &mut self,
        handler: impl MessageHandler + 'static,
    ) -> &mut Self {
        self.register(FilterHandler::new(
            Incoming::is_read_receipt_message,
            handler,
        ))
    }

    pub fn on_friend_picker_message(
        &mut self,
        handler: impl MessageHandler + 'static,
    ) -> &mut Self {
        self.register(FilterHandler::new(
            Incoming::is_friend_picker_message,
            handler,
        ))
    }

    /// Append a hook run on every outbound message at flush time.
    pub fn outgoing(&self, hook: impl OutgoingHook + 'static) -> &Self {
        self.outbound.add_hook(Arc::new(hook));
        self
    }

    /// Run one envelope through the handler chain.
    pub async fn dispatch(&self, incoming: Incoming) {
        self.stack.dispatch(incoming).await;
    }

    pub(crate) fn make_incoming(&self, wire: IncomingWire) -> Incoming {
        Incoming::new(wire, self.outbound.clone())
    }

    /// Queue messages for one recipient and await the coalesced flush.
    pub async fn send(
        &self,
        messages: impl IntoMessages,
        recipient: &str,
        chat_id: Option<&str>,
    ) -> Result<()> {
        self.outbound
            .send(messages.into_messages(), recipient, chat_id)
            .await
    }

    /// Send messages to many recipients through the broadcast endpoint.
    pub async fn broadcast<S: AsRef<str>>(
        &self,
        messages: impl IntoMessages,
        recipients: &[S],
    ) -> Result<()> {
        let recipients: Vec<String> = recipients
            .iter()
            .map(|recipient| recipient.as_ref().to_string())
            .collect();
        self.outbound
            .broadcast(messages.into_messages(), &recipients)
            .await
    }

    /// Await the next coalesced flush cycle.
    pub async fn flush(&self) -> Result<()> {
        self.outbound.flush().await
    }

    /// Flush the pending queue immediately.
    pub async fn flush_now(&self) -> Result<()> {
        self.outbound.flush_now().await
    }

    /// The wire configuration derived from this bot's settings.
    pub fn configuration(&self) -> Result<BotConfiguration> {
        self.config.configuration()
    }

    /// Push the local configuration to the platform.
    pub async fn update_bot_configuration(&self) -> Result<()> {
        let configuration = self.configuration()?;
        info!("pushing bot configuration, webhook {}", configuration.webhook);
        self.api.update_configuration(&configuration).await
    }

    /// Pull the configuration currently registered on the platform.
    pub async fn get_bot_configuration(&self) -> Result<BotConfiguration> {
        self.api.get_configuration().await
    }

    /// Fetch one user's profile.
    pub async fn get_user_profile(&self, username: &str) -> Result<UserProfile> {
        let data = self.api.user_info(username).await?;
        Ok(UserProfile::new(username, data))
    }

    /// Fetch several profiles concurrently.
    pub async fn get_user_profiles<S: AsRef<str>>(
        &self,
        usernames: &[S],
    ) -> Result<Vec<UserProfile>> {
        try_join_all(
            usernames
                .iter()
                .map(|username| self.get_user_profile(username.as_ref())),
        )
        .await
    }

    /// Resolve the image URL for this bot's scan code.
    ///
    /// With `data` set, the payload is registered through the API first
    /// and the URL points at the stored remote code; otherwise the
    /// username code URL is produced without any network traffic.
    pub async fn get_kik_code_url(&self, options: &ScanCodeOptions) -> Result<String> {
        match &options.data {
            Some(data) => {
                let code = self.api.create_data_code(data).await?;
                Ok(remote_code_url(&code.id, options))
            }
            None => Ok(username_code_url(&self.config.username, options)),
        }
    }

    /// The axum router serving this bot's incoming and scan-code routes.
    pub fn router(self: Arc<Self>) -> axum::Router {
        http::router(self)
    }
}
