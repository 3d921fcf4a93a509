//! WebSocket bridge between a browser tab and its chat session

use crate::runtime::{SessionConnection, SessionManager};
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;

/// Pump frames both ways until either side goes away, then tear the
/// session down.
pub async fn handle_socket(socket: WebSocket, sessions: Arc<SessionManager>) {
    let SessionConnection {
        id,
        mut outbound_rx,
    } = sessions.open_session().await;
    tracing::info!(session_id = %id, "Chat connection opened");

    let (mut sender, mut receiver) = socket.split();

    // Markup is written in the order the session produced it
    let writer = tokio::spawn(async move {
        while let Some(markup) = outbound_rx.recv().await {
            if sender.send(Message::Text(markup)).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if let Err(e) = sessions.submit(&id, text).await {
                    tracing::warn!(session_id = %id, error = %e, "Dropping frame");
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_)) => {
                tracing::debug!(session_id = %id, "Ignoring binary frame");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                tracing::debug!(session_id = %id, error = %e, "Socket read failed");
                break;
            }
        }
    }

    sessions.close_session(&id).await;
    let _ = writer.await;
    tracing::info!(session_id = %id, "Chat connection closed");
}
