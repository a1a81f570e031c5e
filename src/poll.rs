// src/poll.rs
use std::collections::HashSet;

use tracing::info;
use uuid::Uuid;

use crate::error::{CreatePollError, StoreError};
use crate::models::{PollAggregate, PollWithOptions};
use crate::store::PollStore;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;

/// Create a poll and all of its options in one write.
///
/// Texts are trimmed first; duplicates are judged on the trimmed text. The
/// store constraint catches anything the pre-check misses and surfaces as
/// the same [`CreatePollError::DuplicateOptionText`].
pub async fn create_poll(
    store: &dyn PollStore,
    question: &str,
    options: &[String],
) -> Result<PollWithOptions, CreatePollError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(CreatePollError::EmptyQuestion);
    }

    if options.len() < MIN_OPTIONS {
        return Err(CreatePollError::TooFewOptions { min: MIN_OPTIONS });
    }
    if options.len() > MAX_OPTIONS {
        return Err(CreatePollError::TooManyOptions { max: MAX_OPTIONS });
    }

    let options: Vec<String> = options.iter().map(|text| text.trim().to_string()).collect();
    if options.iter().any(String::is_empty) {
        return Err(CreatePollError::EmptyOption);
    }

    let mut seen = HashSet::with_capacity(options.len());
    if !options.iter().all(|text| seen.insert(text.as_str())) {
        return Err(CreatePollError::DuplicateOptionText);
    }

    let poll = store.insert_poll(question, &options).await?;
    info!(poll_id = %poll.poll.id, options = poll.options.len(), "Poll created");

    Ok(poll)
}

/// Read the current tally of a poll. Nothing is cached; every call hits
/// the store.
pub async fn get_poll(
    store: &dyn PollStore,
    poll_id: Uuid,
) -> Result<Option<PollAggregate>, StoreError> {
    let poll = store.find_poll(poll_id).await?;
    Ok(poll.map(PollAggregate::from_poll))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn new_poll_reads_back_with_zero_counts() {
        let store = MemoryStore::new();
        let created = create_poll(&store, "Pick one", &texts(&["B", "A", "C"]))
            .await
            .unwrap();

        let aggregate = get_poll(&store, created.poll.id).await.unwrap().unwrap();

        assert_eq!(aggregate.question, "Pick one");
        assert_eq!(aggregate.total_votes, 0);
        assert_eq!(aggregate.options.len(), 3);
        assert!(aggregate.options.iter().all(|o| o.vote_count == 0));
    }

    #[tokio::test]
    async fn option_order_is_stable_across_reads() {
        let store = MemoryStore::new();
        let created = create_poll(&store, "Pick one", &texts(&["Zeta", "Alpha", "Mu"]))
            .await
            .unwrap();

        let first = get_poll(&store, created.poll.id).await.unwrap().unwrap();
        let second = get_poll(&store, created.poll.id).await.unwrap().unwrap();

        let order: Vec<&str> = first.options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(order, ["Alpha", "Mu", "Zeta"]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn option_count_limits() {
        let store = MemoryStore::new();

        let err = create_poll(&store, "Pick one", &texts(&["only"]))
            .await
            .unwrap_err();
        assert!(matches!(err, CreatePollError::TooFewOptions { min: 2 }));

        let eleven: Vec<String> = (0..11).map(|i| format!("option {i}")).collect();
        let err = create_poll(&store, "Pick one", &eleven).await.unwrap_err();
        assert!(matches!(err, CreatePollError::TooManyOptions { max: 10 }));

        let ten: Vec<String> = (0..10).map(|i| format!("option {i}")).collect();
        assert!(create_poll(&store, "Pick one", &ten).await.is_ok());
    }

    #[tokio::test]
    async fn duplicates_are_detected_after_trimming() {
        let store = MemoryStore::new();

        let err = create_poll(&store, "Pick one", &texts(&["Yes", " Yes ", "No"]))
            .await
            .unwrap_err();

        assert!(matches!(err, CreatePollError::DuplicateOptionText));
    }

    #[tokio::test]
    async fn blank_question_or_option_is_rejected() {
        let store = MemoryStore::new();

        let err = create_poll(&store, "   ", &texts(&["A", "B"]))
            .await
            .unwrap_err();
        assert!(matches!(err, CreatePollError::EmptyQuestion));

        let err = create_poll(&store, "Pick one", &texts(&["A", "  "]))
            .await
            .unwrap_err();
        assert!(matches!(err, CreatePollError::EmptyOption));
    }

    #[tokio::test]
    async fn unknown_poll_reads_as_none() {
        let store = MemoryStore::new();
        assert!(get_poll(&store, Uuid::new_v4()).await.unwrap().is_none());
    }
}
