// src/socket.rs
//! WebSocket side of the real-time channel.
//!
//! Inbound frames are `join_poll_room` / `leave_poll_room` events; the
//! only outbound event is `vote_update`. Each connection gets a writer task
//! draining its room queue, so a stalled socket only stalls itself.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::rooms::{ConnectionId, RoomBroadcaster};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ClientEvent {
    JoinPollRoom {
        #[serde(rename = "pollId", default)]
        poll_id: serde_json::Value,
    },
    LeavePollRoom {
        #[serde(rename = "pollId", default)]
        poll_id: serde_json::Value,
    },
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.rooms.clone()))
}

async fn handle_socket(socket: WebSocket, rooms: Arc<RoomBroadcaster>) {
    let (connection_id, mut updates) = rooms.connect();
    info!(connection_id = %connection_id, "Client connected");

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(frame) = updates.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => handle_text(&rooms, connection_id, text.as_str()),
            Ok(Message::Close(_)) => {
                debug!(connection_id = %connection_id, "Close frame received");
                break;
            }
            // Ping replies are handled by axum; binary frames carry nothing for us
            Ok(_) => {}
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "Socket error");
                break;
            }
        }
    }

    rooms.disconnect(connection_id);
    writer.abort();
    info!(connection_id = %connection_id, "Client disconnected");
}

fn handle_text(rooms: &RoomBroadcaster, connection_id: ConnectionId, text: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            debug!(connection_id = %connection_id, error = %e, "Ignoring unrecognised frame");
            return;
        }
    };

    match event {
        ClientEvent::JoinPollRoom { poll_id } => {
            if let Some(poll_id) = poll_id.as_str() {
                rooms.join(connection_id, poll_id);
            }
        }
        ClientEvent::LeavePollRoom { poll_id } => {
            if let Some(poll_id) = poll_id.as_str() {
                rooms.leave(connection_id, poll_id);
            }
        }
    }
}
