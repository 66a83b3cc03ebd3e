//! # Poll Client
//!
//! Thin WebSocket client speaking the poll event protocol. Used by the `client`
//! binary and by the integration tests.

use anyhow::{anyhow, Result};
use futures::{SinkExt, StreamExt};
use log::debug;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::common::messages::{ClientMessage, ServerMessage};

/// Build the `/ws` URL with the optional `role` and `token` query parameters.
/// Values are percent-encoded.
///
/// # Example
/// ```ignore
/// let url = endpoint_url("ws://127.0.0.1:3000/ws", Some("admin"), Some("s3cret"));
/// assert_eq!(url, "ws://127.0.0.1:3000/ws?role=admin&token=s3cret");
/// ```
pub fn endpoint_url(base: &str, role: Option<&str>, token: Option<&str>) -> String {
    let params: Vec<String> = [("role", role), ("token", token)]
        .into_iter()
        .filter_map(|(key, value)| {
            value.map(|v| format!("{}={}", key, urlencoding::encode(v)))
        })
        .collect();

    if params.is_empty() {
        base.to_string()
    } else {
        let separator = if base.contains('?') { '&' } else { '?' };
        format!("{}{}{}", base, separator, params.join("&"))
    }
}

pub struct PollClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl PollClient {
    /// Open a connection to the poll server.
    ///
    /// Fails when the server refuses the handshake (e.g. HTTP 401 for an admin
    /// claim without a valid token).
    pub async fn connect(base_url: &str, role: Option<&str>, token: Option<&str>) -> Result<Self> {
        let url = endpoint_url(base_url, role, token);
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| anyhow!("failed to connect to {}: {}", base_url, e))?;
        Ok(Self { stream })
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<()> {
        self.stream.send(Message::Text(message.to_text()?)).await?;
        Ok(())
    }

    pub async fn vote(&mut self, choice: &str) -> Result<()> {
        self.send(&ClientMessage::Vote(choice.to_string())).await
    }

    /// Wait for the next server event.
    ///
    /// # Returns
    /// - `Ok(Some(event))`: a decoded server event
    /// - `Ok(None)`: the server closed the connection
    /// - `Err`: transport error
    pub async fn next_event(&mut self) -> Result<Option<ServerMessage>> {
        while let Some(frame) = self.stream.next().await {
            match frame? {
                Message::Text(text) => match ServerMessage::from_text(&text) {
                    Ok(event) => return Ok(Some(event)),
                    Err(e) => debug!("Skipping undecodable event: {}", e),
                },
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }

    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}
