//! # HTTP Boundary
//!
//! The axum surface of one bot: a POST route receiving webhook batches and
//! a GET route redirecting to the bot's scan code image. The returned
//! router owns only those two paths; merge it into a larger application to
//! serve anything else.
//!
//! Inbound requests are verified against an HMAC-SHA1 signature of the raw
//! body before parsing. Every message in an accepted batch is dispatched
//! on its own task; the HTTP response never waits for handlers.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use hmac::{Hmac, Mac};
use log::{debug, error, warn};
use serde::Deserialize;
use sha1::Sha1;

use crate::bot::Bot;
use crate::message::incoming::IncomingWire;
use crate::scan_code::ScanCodeOptions;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "x-kik-signature";

/// Fallback edge length for scan codes requested over HTTP.
const HTTP_SCAN_CODE_SIZE: u32 = 512;

type HmacSha1 = Hmac<Sha1>;

/// Lowercase hex HMAC-SHA1 of `body` under the bot's API key.
pub(crate) fn message_signature(api_key: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha1::new_from_slice(api_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Case-insensitive, constant-time signature check.
pub(crate) fn is_signature_valid(api_key: &str, body: &[u8], signature: Option<&str>) -> bool {
    let Some(signature) = signature else {
        return false;
    };
    let expected = message_signature(api_key, body);
    let given = signature.to_ascii_lowercase();

    expected.len() == given.len()
        && expected
            .bytes()
            .zip(given.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[derive(Deserialize)]
struct WebhookPayload {
    messages: Vec<serde_json::Value>,
}

pub(crate) fn router(bot: Arc<Bot>) -> Router {
    let incoming_path = bot.config().incoming_path.clone();
    let scan_code_path = bot.config().scan_code_path.clone();
    Router::new()
        .route(&incoming_path, any(incoming))
        .route(&scan_code_path, any(scan_code))
        .with_state(bot)
}

async fn incoming(
    State(bot): State<Arc<Bot>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let config = bot.config();

    if method != Method::POST {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            format!("{} only accepts POST", config.incoming_path),
        )
            .into_response();
    }

    if !config.skip_signature_check {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());
        if !is_signature_valid(&config.api_key, &body, signature) {
            warn!("rejecting webhook request with a bad signature");
            return (StatusCode::FORBIDDEN, "Invalid signature").into_response();
        }
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            warn!("rejecting unparseable webhook body: {err}");
            return (StatusCode::BAD_REQUEST, "Invalid body").into_response();
        }
    };

    debug!("webhook batch of {} message(s)", payload.messages.len());

    for value in payload.messages {
        let wire: IncomingWire = match serde_json::from_value(value) {
            Ok(wire) => wire,
            Err(err) => {
                warn!("skipping malformed message in webhook batch: {err}");
                continue;
            }
        };

        // handlers run detached; the platform gets its 200 immediately
        let bot = bot.clone();
        tokio::spawn(async move {
            bot.dispatch(bot.make_incoming(wire)).await;
        });
    }

    (StatusCode::OK, "OK").into_response()
}

async fn scan_code(State(bot): State<Arc<Bot>>, method: Method, uri: Uri) -> Response {
    let config = bot.config();

    // method check comes first; the query is only looked at on the GET path
    if method != Method::GET {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            format!("{} only accepts GET", config.scan_code_path),
        )
            .into_response();
    }

    let Query(mut options) = match Query::<ScanCodeOptions>::try_from_uri(&uri) {
        Ok(query) => query,
        Err(err) => {
            warn!("rejecting scan code request with a bad query: {err}");
            return (StatusCode::BAD_REQUEST, "Invalid query").into_response();
        }
    };

    options.width.get_or_insert(HTTP_SCAN_CODE_SIZE);
    options.height.get_or_insert(HTTP_SCAN_CODE_SIZE);

    match bot.get_kik_code_url(&options).await {
        Ok(url) => (
            StatusCode::MOVED_PERMANENTLY,
            [(header::LOCATION, url)],
        )
            .into_response(),
        Err(err) => {
            error!("scan code resolution failed: {err}");
            (StatusCode::BAD_GATEWAY, "Scan code unavailable").into_response()
        }
    }
}
