// src/store/mod.rs
//! Persistent store seam.
//!
//! The vote ledger and the aggregate reader only talk to storage through
//! [`PollStore`]. Both implementations enforce the two uniqueness keys:
//! `(poll_id, text)` on options and `(poll_id, voter_token)` on votes.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{NewVote, PollOption, PollWithOptions, Vote};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait PollStore: Send + Sync {
    /// Insert a poll and all of its options as one unit.
    async fn insert_poll(
        &self,
        question: &str,
        options: &[String],
    ) -> Result<PollWithOptions, StoreError>;

    async fn find_poll(&self, poll_id: Uuid) -> Result<Option<PollWithOptions>, StoreError>;

    async fn poll_exists(&self, poll_id: Uuid) -> Result<bool, StoreError>;

    async fn find_option(&self, option_id: Uuid) -> Result<Option<PollOption>, StoreError>;

    async fn has_voted(&self, poll_id: Uuid, voter_token: &str) -> Result<bool, StoreError>;

    /// Insert the vote row and bump the option counter as one unit.
    ///
    /// A second vote for the same `(poll_id, voter_token)` fails with
    /// [`StoreError::UniqueViolation`] and leaves nothing behind.
    async fn record_vote(&self, vote: NewVote<'_>) -> Result<Vote, StoreError>;
}
