// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Poll {
    pub id: Uuid,
    pub question: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PollOption {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub text: String,
    pub vote_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub option_id: Uuid,
    pub voter_token: String,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A poll row together with every option it owns.
#[derive(Debug, Clone)]
pub struct PollWithOptions {
    pub poll: Poll,
    pub options: Vec<PollOption>,
}

/// Input to the vote write. Preconditions have already been checked.
#[derive(Debug, Clone, Copy)]
pub struct NewVote<'a> {
    pub poll_id: Uuid,
    pub option_id: Uuid,
    pub voter_token: &'a str,
    pub ip_address: Option<&'a str>,
}

/// One vote attempt as it arrives from the API surface.
#[derive(Debug, Clone)]
pub struct Ballot {
    pub poll_id: Uuid,
    pub option_id: Uuid,
    pub voter_token: String,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionTally {
    pub id: Uuid,
    pub text: String,
    pub vote_count: i64,
}

/// Current tally of a poll. Always built from a single read of the
/// option counters, so `total_votes` equals the sum of `options`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollAggregate {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<OptionTally>,
    pub total_votes: i64,
}

impl PollAggregate {
    pub fn from_poll(mut record: PollWithOptions) -> Self {
        record
            .options
            .sort_by(|a, b| a.text.cmp(&b.text).then(a.id.cmp(&b.id)));

        let options: Vec<OptionTally> = record
            .options
            .into_iter()
            .map(|option| OptionTally {
                id: option.id,
                text: option.text,
                vote_count: option.vote_count,
            })
            .collect();
        let total_votes = options.iter().map(|option| option.vote_count).sum();

        Self {
            id: record.poll.id,
            question: record.poll.question,
            options,
            total_votes,
        }
    }

    pub fn count_for(&self, text: &str) -> Option<i64> {
        self.options
            .iter()
            .find(|option| option.text == text)
            .map(|option| option.vote_count)
    }
}

#[derive(Deserialize)]
pub struct CreatePollRequest {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollResponse {
    pub poll_id: Uuid,
    pub share_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub poll_id: Uuid,
    pub option_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub voted: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatusResponse {
    pub has_voted: bool,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
