// src/ledger.rs
//! # Vote ledger
//!
//! Records at most one vote per `(poll, voter token)` and keeps each option
//! counter equal to the number of vote rows pointing at it.
//!
//! Preconditions are checked in a fixed order before anything is written:
//!
//! 1. the poll exists
//! 2. the option exists
//! 3. the option belongs to the poll
//! 4. the voter has not voted on the poll yet
//!
//! Step 4 is only a fast path. Two requests carrying the same token can
//! both pass it before either commits, so the store's unique key on
//! `(poll_id, voter_token)` is what actually decides. A violation of that
//! key at write time comes back as [`VoteError::AlreadyVoted`], the same
//! error the fast path returns.
//!
//! Nothing here retries. A storage failure propagates as
//! [`VoteError::Store`].

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::VoteError;
use crate::models::{Ballot, NewVote, Vote};
use crate::store::PollStore;

pub async fn submit_vote(store: &dyn PollStore, ballot: &Ballot) -> Result<Vote, VoteError> {
    if !store.poll_exists(ballot.poll_id).await? {
        return Err(VoteError::PollNotFound);
    }

    let option = store
        .find_option(ballot.option_id)
        .await?
        .ok_or(VoteError::OptionNotFound)?;

    if option.poll_id != ballot.poll_id {
        return Err(VoteError::OptionMismatch);
    }

    if store.has_voted(ballot.poll_id, &ballot.voter_token).await? {
        debug!(poll_id = %ballot.poll_id, "Duplicate vote caught before write");
        return Err(VoteError::AlreadyVoted);
    }

    let vote = store
        .record_vote(NewVote {
            poll_id: ballot.poll_id,
            option_id: ballot.option_id,
            voter_token: &ballot.voter_token,
            ip_address: ballot.ip_address.as_deref(),
        })
        .await
        .map_err(|err| {
            let err = VoteError::from(err);
            if matches!(err, VoteError::AlreadyVoted) {
                debug!(poll_id = %ballot.poll_id, "Duplicate vote caught by unique key");
            }
            err
        })?;

    info!(poll_id = %vote.poll_id, option_id = %vote.option_id, "Vote recorded");
    Ok(vote)
}

/// Whether this voter already has a vote on the poll.
pub async fn check_vote_status(
    store: &dyn PollStore,
    poll_id: Uuid,
    voter_token: &str,
) -> Result<bool, VoteError> {
    Ok(store.has_voted(poll_id, voter_token).await?)
}
