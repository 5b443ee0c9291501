use crate::game::room::Room;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Per-connection delivery limits.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub send_timeout: Duration,
    pub outbound_buffer: usize,
}

pub async fn handle_socket(
    socket: WebSocket,
    room: Arc<Room>,
    player_id: String,
    settings: ConnectionSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(settings.outbound_buffer.max(1));
    let connection_id = room.connect(&player_id, outbound_tx);
    tracing::info!(player_id = %player_id, %connection_id, "player connected");

    let writer_id = player_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = outbound_rx.recv().await {
            match tokio::time::timeout(settings.send_timeout, sender.send(Message::Text(payload))).await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::debug!(player_id = %writer_id, %error, "socket write failed");
                    break;
                }
                Err(_) => {
                    tracing::warn!(player_id = %writer_id, "socket write timed out");
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            frame = receiver.next() => {
                let Some(Ok(message)) = frame else { break };
                match message {
                    Message::Text(text) => room.handle_text_message(&player_id, &text),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            _ = &mut send_task => break,
            _ = stopped(&mut shutdown) => break,
        }
    }

    room.disconnect(&player_id, connection_id);
    send_task.abort();
    tracing::info!(player_id = %player_id, %connection_id, "player disconnected");
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stopping| *stopping).await;
}
