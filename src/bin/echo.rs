use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use log::info;

use kik_bot::{Bot, BotConfig, Flow, TextMatch};

/// Minimal echo bot. Reads its identity from the environment, repeats
/// every text message back to the sender, and serves the webhook on the
/// configured port.
///
/// Required environment:
/// - `KIK_BOT_USERNAME`
/// - `KIK_BOT_API_KEY`
/// - `KIK_BASE_URL` (public URL the platform can reach)
///
/// Optional:
/// - `PORT` (default 8080)
#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let username = std::env::var("KIK_BOT_USERNAME").context("KIK_BOT_USERNAME is not set")?;
    let api_key = std::env::var("KIK_BOT_API_KEY").context("KIK_BOT_API_KEY is not set")?;
    let base_url = std::env::var("KIK_BASE_URL").context("KIK_BASE_URL is not set")?;
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .context("PORT is not a valid port number")?;

    let mut bot = Bot::new(BotConfig::new(username, api_key).base_url(base_url))?;

    bot.on_text_message(TextMatch::Any, |incoming: kik_bot::Incoming| async move {
        let body = incoming.body().unwrap_or_default().to_string();
        info!("echoing {} chars back to {}", body.len(), incoming.from());
        if let Err(err) = incoming.reply(body.as_str()).await {
            log::error!("reply failed: {err}");
        }
        Flow::Handled
    });

    let bot = Arc::new(bot);
    bot.update_bot_configuration()
        .await
        .context("failed to register the webhook configuration")?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    info!("listening on port {port}");
    axum::serve(listener, bot.router()).await?;
    Ok(())
}
