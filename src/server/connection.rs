//! Per-socket task: registers the connection with the dispatcher, forwards
//! decoded client events, and drains the outbound queue into the socket.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::common::messages::{ClientMessage, ServerMessage};
use crate::server::access::Role;
use crate::server::dispatcher::DispatcherHandle;

pub async fn handle_socket(socket: WebSocket, role: Role, dispatcher: DispatcherHandle) {
    let id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    if let Err(e) = dispatcher.connect(id, role, tx).await {
        error!("❌ Could not register connection {}: {}", id, e);
        return;
    }
    info!("User connected [{}]: {}", role.as_str(), id);

    let mut writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match event.to_text() {
                Ok(text) => text,
                Err(e) => {
                    error!("❌ Failed to encode event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let inbound = dispatcher.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(frame)) = receiver.next().await {
            match frame {
                Message::Text(text) => match ClientMessage::from_text(&text) {
                    Ok(message) => {
                        if inbound.submit(id, message).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!("Ignoring malformed frame from {}: {}", id, e),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Whichever half finishes first ends the connection
    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    if let Err(e) = dispatcher.disconnect(id).await {
        debug!("Disconnect of {} not delivered: {}", id, e);
    }
    info!("User disconnected [{}]: {}", role.as_str(), id);
}
