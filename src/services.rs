// src/services.rs
use tracing::{error, warn};

use crate::error::VoteError;
use crate::ledger;
use crate::models::{Ballot, PollAggregate};
use crate::poll;
use crate::state::AppState;

/// Record a vote, then push the fresh tally to everyone in the poll's room.
///
/// Once the ledger has committed, the vote stands. A failure to re-read
/// the tally afterwards is logged and only skips the broadcast; the next
/// successful vote on the poll sends a full snapshot anyway.
pub async fn cast_vote(state: &AppState, ballot: &Ballot) -> Result<Option<PollAggregate>, VoteError> {
    let vote = ledger::submit_vote(state.store.as_ref(), ballot).await?;

    match poll::get_poll(state.store.as_ref(), vote.poll_id).await {
        Ok(Some(aggregate)) => {
            state.rooms.broadcast(vote.poll_id, aggregate.clone());
            Ok(Some(aggregate))
        }
        Ok(None) => {
            warn!(poll_id = %vote.poll_id, "Poll vanished after vote, skipping broadcast");
            Ok(None)
        }
        Err(e) => {
            error!(poll_id = %vote.poll_id, error = %e, "Failed to read tally after vote");
            Ok(None)
        }
    }
}
