//! Library error taxonomy
//!
//! Three families: validation errors raised before any network traffic,
//! transport errors from the remote API, and non-2xx API responses.
//! The enum is `Clone` so a coalesced flush can hand the same outcome to
//! every caller that was absorbed into it.

use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// One or more configuration options failed validation at construction.
    #[error("invalid bot configuration: {0}")]
    Config(String),

    /// A recipient did not match the username pattern.
    #[error("\"{0}\" is not a valid username")]
    InvalidRecipient(String),

    /// A message was sent without any recipient.
    #[error("you must specify a recipient to send a message")]
    MissingRecipient,

    /// The bot has no base URL, so no webhook address can be derived.
    #[error("a base URL is required to build the webhook configuration")]
    MissingBaseUrl,

    /// The remote API call could not be completed.
    #[error("transport failure: {0}")]
    Transport(#[source] Arc<reqwest::Error>),

    /// The remote API answered with a non-success status.
    #[error("API responded with status {status}")]
    Api { status: u16 },

    /// A spawned batch task died before reporting an outcome.
    #[error("message batch task failed: {0}")]
    Batch(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
