// Core layer - configuration and error types
pub mod core;

// Data model - outbound messages, keyboards, inbound envelopes
pub mod message;

// REST client against the platform API
pub mod api;

// Scan code URL construction
pub mod scan_code;

// User profile lookups
pub mod profile;

// Application layer - dispatch, outbound queue, webhook routes
pub mod bot;

// Re-export the types most applications touch
pub use crate::core::{BotConfig, BotConfiguration, BotFeatures, Error, Result};

pub use crate::message::{
    // Inbound
    incoming::{ChatType, Incoming, IncomingWire},
    // Keyboards
    keyboard::{Keyboard, KeyboardResponse},
    // Outbound
    Attribution, IntoMessages, Message, MessageKind, OutgoingMessage,
};

pub use crate::api::{HttpApi, KikApi, RemoteCode};

pub use crate::bot::{
    dispatch::{Flow, MessageHandler, TextMatch},
    outbound::OutgoingHook,
    Bot,
};

pub use crate::profile::{ProfileData, UserProfile};

pub use crate::scan_code::{KikCodeColor, ScanCodeOptions};
