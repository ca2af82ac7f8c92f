//! Send one message over the realtime channel and print replies.

use albumsync_client::{ChannelManager, HandlerError, Transport};
use albumsync_types::{ClientId, SessionId};
use anyhow::{Context, Result};
use serde_json::Value;
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;

/// Run the chat command.
///
/// Replies are printed until `wait` elapses, then the channel is closed.
pub async fn run<T: Transport>(
    channel: &ChannelManager<T>,
    client_id: ClientId,
    session_id: Option<SessionId>,
    message: &str,
    wait: Duration,
    out: &mut impl Write,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    let handler = channel.on_message(move |value| {
        tx.send(value.clone())
            .map_err(|_| HandlerError::new("chat output closed"))
    });

    channel
        .connect(client_id, session_id.clone())
        .await
        .context("Failed to open the realtime channel")?;
    channel
        .send(message, session_id)
        .await
        .context("Failed to send message")?;
    writeln!(out, "sent: {message}")?;

    let deadline = tokio::time::sleep(wait);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            received = rx.recv() => match received {
                Some(value) => writeln!(out, "received: {}", render(&value))?,
                None => break,
            },
        }
    }

    channel.remove_handler(handler);
    channel.disconnect();
    Ok(())
}

/// The `content` field when present, the raw JSON otherwise.
fn render(value: &Value) -> String {
    value
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}
