// src/rooms.rs
//! Poll rooms for live tally updates.
//!
//! A connection sits in at most one room at a time; the room key is the poll
//! id. Every outbound payload is a full [`PollAggregate`] snapshot, so a
//! dropped or reordered delivery is corrected by the next one. A snapshot is
//! encoded once per broadcast and every member gets the same frame.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::Utf8Bytes;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::PollAggregate;

/// Outbound queue depth per connection.
pub const CONNECTION_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    VoteUpdate(PollAggregate),
}

impl ServerEvent {
    /// Encode as the JSON text frame sent to viewers.
    pub fn encode(&self) -> Result<Utf8Bytes, serde_json::Error> {
        serde_json::to_string(self).map(Utf8Bytes::from)
    }
}

struct Member {
    sender: mpsc::Sender<Utf8Bytes>,
    room: Option<String>,
}

/// Normalise a client-supplied poll id into a room key.
///
/// Blank ids are rejected. UUIDs are rewritten to their canonical form so
/// `ABC...` and `abc...` land in the same room.
pub fn room_key(poll_id: &str) -> Option<String> {
    let poll_id = poll_id.trim();
    if poll_id.is_empty() {
        return None;
    }

    Some(match Uuid::parse_str(poll_id) {
        Ok(id) => id.to_string(),
        Err(_) => poll_id.to_string(),
    })
}

pub struct RoomBroadcaster {
    connections: DashMap<ConnectionId, Member>,
    rooms: DashMap<String, HashSet<ConnectionId>>,
    id_counter: AtomicU64,
}

impl Default for RoomBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomBroadcaster {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
            id_counter: AtomicU64::new(1),
        }
    }

    /// Register a live connection. Updates for it arrive on the receiver.
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<Utf8Bytes>) {
        let id = ConnectionId(self.id_counter.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(CONNECTION_BUFFER);

        self.connections.insert(id, Member { sender, room: None });
        debug!(connection_id = %id, "Connection registered");

        (id, receiver)
    }

    /// Put a connection in a poll's room, moving it out of any other room.
    /// Returns false when the id is blank or the connection is unknown.
    pub fn join(&self, connection_id: ConnectionId, poll_id: &str) -> bool {
        let Some(room) = room_key(poll_id) else {
            return false;
        };

        let previous = match self.connections.get_mut(&connection_id) {
            Some(mut member) => member.room.replace(room.clone()),
            None => return false,
        };

        if let Some(previous) = previous.filter(|previous| *previous != room) {
            self.remove_member(&previous, connection_id);
        }
        self.rooms.entry(room.clone()).or_default().insert(connection_id);

        debug!(connection_id = %connection_id, room = %room, "Joined poll room");
        true
    }

    /// Take a connection out of a poll's room. Leaving a room the
    /// connection is not in is a no-op.
    pub fn leave(&self, connection_id: ConnectionId, poll_id: &str) -> bool {
        let Some(room) = room_key(poll_id) else {
            return false;
        };

        let was_member = match self.connections.get_mut(&connection_id) {
            Some(mut member) if member.room.as_deref() == Some(room.as_str()) => {
                member.room = None;
                true
            }
            _ => false,
        };

        if was_member {
            self.remove_member(&room, connection_id);
            debug!(connection_id = %connection_id, room = %room, "Left poll room");
        }
        was_member
    }

    /// Forget a connection and every room it was in.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        if let Some((_, member)) = self.connections.remove(&connection_id) {
            if let Some(room) = member.room {
                self.remove_member(&room, connection_id);
            }
            debug!(connection_id = %connection_id, "Connection removed");
        }
    }

    /// Send a snapshot to every connection currently in the poll's room,
    /// the voter's own included. Never waits on a slow receiver.
    /// Returns how many connections were handed the update.
    pub fn broadcast(&self, poll_id: Uuid, aggregate: PollAggregate) -> usize {
        let room = poll_id.to_string();

        // Copy the member list first so no room lock is held while sending
        let members: Vec<ConnectionId> = match self.rooms.get(&room) {
            Some(members) => members.iter().copied().collect(),
            None => return 0,
        };

        let frame = match ServerEvent::VoteUpdate(aggregate).encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(room = %room, error = %e, "Failed to encode vote update");
                return 0;
            }
        };
        let mut delivered = 0;

        for connection_id in members {
            let Some(sender) = self
                .connections
                .get(&connection_id)
                .map(|member| member.sender.clone())
            else {
                continue;
            };

            match sender.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(connection_id = %connection_id, room = %room, "Outbound queue full, dropping update");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(connection_id = %connection_id, "Receiver gone, skipping");
                }
            }
        }

        debug!(room = %room, delivered, "Broadcast vote update");
        delivered
    }

    pub fn room_size(&self, poll_id: &str) -> usize {
        room_key(poll_id)
            .and_then(|room| self.rooms.get(&room).map(|members| members.len()))
            .unwrap_or(0)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn remove_member(&self, room: &str, connection_id: ConnectionId) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(&connection_id);
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OptionTally;

    fn decode(frame: &Utf8Bytes) -> serde_json::Value {
        serde_json::from_str(frame.as_str()).unwrap()
    }

    fn snapshot(poll_id: Uuid, counts: &[(&str, i64)]) -> PollAggregate {
        let options: Vec<OptionTally> = counts
            .iter()
            .map(|(text, vote_count)| OptionTally {
                id: Uuid::new_v4(),
                text: text.to_string(),
                vote_count: *vote_count,
            })
            .collect();
        PollAggregate {
            id: poll_id,
            question: "Pick one".to_string(),
            total_votes: options.iter().map(|o| o.vote_count).sum(),
            options,
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_only_the_polls_room() {
        let rooms = RoomBroadcaster::new();
        let (poll_a, poll_b) = (Uuid::new_v4(), Uuid::new_v4());

        let (viewer, mut viewer_rx) = rooms.connect();
        let (voter, mut voter_rx) = rooms.connect();
        let (elsewhere, mut elsewhere_rx) = rooms.connect();
        assert!(rooms.join(viewer, &poll_a.to_string()));
        assert!(rooms.join(voter, &poll_a.to_string()));
        assert!(rooms.join(elsewhere, &poll_b.to_string()));

        let update = snapshot(poll_a, &[("A", 1), ("B", 0)]);
        assert_eq!(rooms.broadcast(poll_a, update.clone()), 2);

        let expected = serde_json::to_value(ServerEvent::VoteUpdate(update)).unwrap();
        let viewer_frame = viewer_rx.recv().await.unwrap();
        let voter_frame = voter_rx.recv().await.unwrap();

        // one encoding, shared by every member
        assert_eq!(viewer_frame, voter_frame);
        let received = decode(&viewer_frame);
        assert_eq!(received, expected);
        let sum: i64 = received["data"]["options"]
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["voteCount"].as_i64().unwrap())
            .sum();
        assert_eq!(received["data"]["totalVotes"], sum);
        assert!(elsewhere_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_is_idempotent_and_leave_stops_updates() {
        let rooms = RoomBroadcaster::new();
        let poll_id = Uuid::new_v4();
        let (conn, mut rx) = rooms.connect();

        assert!(rooms.join(conn, &poll_id.to_string()));
        assert!(rooms.join(conn, &poll_id.to_string()));
        assert_eq!(rooms.room_size(&poll_id.to_string()), 1);

        assert!(rooms.leave(conn, &poll_id.to_string()));
        assert!(!rooms.leave(conn, &poll_id.to_string()));
        assert_eq!(rooms.broadcast(poll_id, snapshot(poll_id, &[("A", 1)])), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn blank_room_ids_are_ignored() {
        let rooms = RoomBroadcaster::new();
        let (conn, _rx) = rooms.connect();

        assert!(!rooms.join(conn, ""));
        assert!(!rooms.join(conn, "   "));
        assert!(!rooms.leave(conn, ""));
        assert!(rooms.rooms.is_empty());
    }

    #[test]
    fn uuid_room_ids_are_case_insensitive() {
        let rooms = RoomBroadcaster::new();
        let poll_id = Uuid::new_v4();
        let (conn, _rx) = rooms.connect();

        assert!(rooms.join(conn, &poll_id.to_string().to_uppercase()));
        assert_eq!(rooms.room_size(&poll_id.to_string()), 1);
    }

    #[test]
    fn joining_another_poll_moves_the_connection() {
        let rooms = RoomBroadcaster::new();
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        let (conn, _rx) = rooms.connect();

        rooms.join(conn, &first.to_string());
        rooms.join(conn, &second.to_string());

        assert_eq!(rooms.room_size(&first.to_string()), 0);
        assert_eq!(rooms.room_size(&second.to_string()), 1);
    }

    #[test]
    fn disconnect_leaves_implicitly() {
        let rooms = RoomBroadcaster::new();
        let poll_id = Uuid::new_v4();
        let (conn, _rx) = rooms.connect();
        rooms.join(conn, &poll_id.to_string());

        rooms.disconnect(conn);

        assert_eq!(rooms.room_size(&poll_id.to_string()), 0);
        assert_eq!(rooms.connection_count(), 0);
        assert!(!rooms.join(conn, &poll_id.to_string()));
    }

    #[tokio::test]
    async fn dead_or_full_receivers_do_not_block_the_rest() {
        let rooms = RoomBroadcaster::new();
        let poll_id = Uuid::new_v4();
        let room = poll_id.to_string();

        let (gone, gone_rx) = rooms.connect();
        let (slow, _slow_rx) = rooms.connect();
        let (healthy, mut healthy_rx) = rooms.connect();
        for conn in [gone, slow, healthy] {
            rooms.join(conn, &room);
        }
        drop(gone_rx);

        for votes in 0..CONNECTION_BUFFER as i64 {
            rooms.broadcast(poll_id, snapshot(poll_id, &[("A", votes)]));
            healthy_rx.recv().await.unwrap();
        }

        // slow's queue is full now; healthy still gets the next one
        assert_eq!(rooms.broadcast(poll_id, snapshot(poll_id, &[("A", 99)])), 1);
        let latest = decode(&healthy_rx.recv().await.unwrap());
        assert_eq!(latest["data"]["totalVotes"], 99);
    }

    #[test]
    fn vote_update_wire_format() {
        let poll_id = Uuid::new_v4();
        let event = ServerEvent::VoteUpdate(snapshot(poll_id, &[("A", 2), ("B", 1)]));

        let json: serde_json::Value = serde_json::from_str(event.encode().unwrap().as_str()).unwrap();

        assert_eq!(json["event"], "vote_update");
        assert_eq!(json["data"]["id"], poll_id.to_string());
        assert_eq!(json["data"]["totalVotes"], 3);
    }
}
