// src/store/memory.rs
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::PollStore;
use crate::error::StoreError;
use crate::models::{NewVote, Poll, PollOption, PollWithOptions, Vote};

const OPTION_TEXT_KEY: &str = "poll_options_poll_text_key";
const VOTER_KEY: &str = "votes_poll_voter_key";

#[derive(Default)]
struct Tables {
    polls: HashMap<Uuid, Poll>,
    options: HashMap<Uuid, PollOption>,
    votes: Vec<Vote>,
    voters: HashSet<(Uuid, String)>,
}

/// In-process store with the same constraints and atomicity as Postgres.
///
/// Every write runs under the one write lock and validates before it
/// mutates, so a rejected write changes nothing.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn vote_count(&self, poll_id: Uuid) -> usize {
        let tables = self.tables.read().await;
        tables.votes.iter().filter(|v| v.poll_id == poll_id).count()
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn insert_poll(
        &self,
        question: &str,
        options: &[String],
    ) -> Result<PollWithOptions, StoreError> {
        let mut seen = HashSet::with_capacity(options.len());
        if !options.iter().all(|text| seen.insert(text.as_str())) {
            return Err(StoreError::UniqueViolation {
                constraint: OPTION_TEXT_KEY.to_string(),
            });
        }

        let poll = Poll {
            id: Uuid::new_v4(),
            question: question.to_string(),
            created_at: Utc::now(),
        };
        let created: Vec<PollOption> = options
            .iter()
            .map(|text| PollOption {
                id: Uuid::new_v4(),
                poll_id: poll.id,
                text: text.clone(),
                vote_count: 0,
            })
            .collect();

        let mut tables = self.tables.write().await;
        tables.polls.insert(poll.id, poll.clone());
        for option in &created {
            tables.options.insert(option.id, option.clone());
        }

        Ok(PollWithOptions {
            poll,
            options: created,
        })
    }

    async fn find_poll(&self, poll_id: Uuid) -> Result<Option<PollWithOptions>, StoreError> {
        let tables = self.tables.read().await;
        let Some(poll) = tables.polls.get(&poll_id).cloned() else {
            return Ok(None);
        };

        let mut options: Vec<PollOption> = tables
            .options
            .values()
            .filter(|option| option.poll_id == poll_id)
            .cloned()
            .collect();
        options.sort_by(|a, b| a.text.cmp(&b.text).then(a.id.cmp(&b.id)));

        Ok(Some(PollWithOptions { poll, options }))
    }

    async fn poll_exists(&self, poll_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.tables.read().await.polls.contains_key(&poll_id))
    }

    async fn find_option(&self, option_id: Uuid) -> Result<Option<PollOption>, StoreError> {
        Ok(self.tables.read().await.options.get(&option_id).cloned())
    }

    async fn has_voted(&self, poll_id: Uuid, voter_token: &str) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.voters.contains(&(poll_id, voter_token.to_string())))
    }

    async fn record_vote(&self, vote: NewVote<'_>) -> Result<Vote, StoreError> {
        let mut tables = self.tables.write().await;

        let key = (vote.poll_id, vote.voter_token.to_string());
        if tables.voters.contains(&key) {
            return Err(StoreError::UniqueViolation {
                constraint: VOTER_KEY.to_string(),
            });
        }

        let Some(option) = tables
            .options
            .get_mut(&vote.option_id)
            .filter(|option| option.poll_id == vote.poll_id)
        else {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        };
        option.vote_count += 1;

        let recorded = Vote {
            id: Uuid::new_v4(),
            poll_id: vote.poll_id,
            option_id: vote.option_id,
            voter_token: vote.voter_token.to_string(),
            ip_address: vote.ip_address.map(str::to_string),
            created_at: Utc::now(),
        };
        tables.voters.insert(key);
        tables.votes.push(recorded.clone());

        Ok(recorded)
    }
}
