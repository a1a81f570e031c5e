// src/state.rs
use std::sync::Arc;

use crate::config::Config;
use crate::rooms::RoomBroadcaster;
use crate::store::PollStore;

/// Shared handles passed to every handler. Built once in `start_server`
/// (or a test) and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn PollStore>,
    pub rooms: Arc<RoomBroadcaster>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn PollStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            rooms: Arc::new(RoomBroadcaster::new()),
        }
    }
}
