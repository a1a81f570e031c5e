// src/store/postgres.rs
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::PollStore;
use crate::error::StoreError;
use crate::models::{NewVote, Poll, PollOption, PollWithOptions, Vote};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PollStore for PgStore {
    async fn insert_poll(
        &self,
        question: &str,
        options: &[String],
    ) -> Result<PollWithOptions, StoreError> {
        // Rolled back on drop if any statement below fails
        let mut tx = self.pool.begin().await?;

        let poll = sqlx::query_as::<_, Poll>(
            "INSERT INTO polls (id, question) VALUES ($1, $2) RETURNING id, question, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(question)
        .fetch_one(&mut *tx)
        .await?;

        let mut created = Vec::with_capacity(options.len());
        for text in options {
            let option = sqlx::query_as::<_, PollOption>(
                r#"
                INSERT INTO poll_options (id, poll_id, text)
                VALUES ($1, $2, $3)
                RETURNING id, poll_id, text, vote_count
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(poll.id)
            .bind(text)
            .fetch_one(&mut *tx)
            .await?;
            created.push(option);
        }

        tx.commit().await?;

        debug!(poll_id = %poll.id, options = created.len(), "Inserted poll");
        Ok(PollWithOptions {
            poll,
            options: created,
        })
    }

    async fn find_poll(&self, poll_id: Uuid) -> Result<Option<PollWithOptions>, StoreError> {
        let Some(poll) = sqlx::query_as::<_, Poll>(
            "SELECT id, question, created_at FROM polls WHERE id = $1",
        )
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        // Single statement, so every counter comes from the same snapshot
        let options = sqlx::query_as::<_, PollOption>(
            r#"
            SELECT id, poll_id, text, vote_count
            FROM poll_options
            WHERE poll_id = $1
            ORDER BY text, id
            "#,
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(PollWithOptions { poll, options }))
    }

    async fn poll_exists(&self, poll_id: Uuid) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM polls WHERE id = $1)")
            .bind(poll_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn find_option(&self, option_id: Uuid) -> Result<Option<PollOption>, StoreError> {
        let option = sqlx::query_as::<_, PollOption>(
            "SELECT id, poll_id, text, vote_count FROM poll_options WHERE id = $1",
        )
        .bind(option_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(option)
    }

    async fn has_voted(&self, poll_id: Uuid, voter_token: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM votes WHERE poll_id = $1 AND voter_token = $2)",
        )
        .bind(poll_id)
        .bind(voter_token)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn record_vote(&self, vote: NewVote<'_>) -> Result<Vote, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Fails with a unique violation if this voter already has a row
        let recorded = sqlx::query_as::<_, Vote>(
            r#"
            INSERT INTO votes (id, poll_id, option_id, voter_token, ip_address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, poll_id, option_id, voter_token, ip_address, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(vote.poll_id)
        .bind(vote.option_id)
        .bind(vote.voter_token)
        .bind(vote.ip_address)
        .fetch_one(&mut *tx)
        .await?;

        let bumped = sqlx::query(
            "UPDATE poll_options SET vote_count = vote_count + 1 WHERE id = $1 AND poll_id = $2",
        )
        .bind(vote.option_id)
        .bind(vote.poll_id)
        .execute(&mut *tx)
        .await?;

        if bumped.rows_affected() != 1 {
            // Dropping tx rolls the vote row back
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }

        tx.commit().await?;
        Ok(recorded)
    }
}
