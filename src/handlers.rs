// src/handlers.rs
use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::ledger;
use crate::models::{
    ApiResponse, Ballot, CreatePollRequest, CreatePollResponse, VoteRequest, VoteResponse,
    VoteStatusResponse,
};
use crate::poll;
use crate::services;
use crate::state::AppState;
use crate::voter::{ClientAddr, VoterToken};

const QUESTION_LEN: std::ops::RangeInclusive<usize> = 5..=500;
const OPTION_LEN: std::ops::RangeInclusive<usize> = 1..=200;

fn validate_create(request: &CreatePollRequest) -> Result<(), AppError> {
    let question_len = request.question.trim().chars().count();
    if !QUESTION_LEN.contains(&question_len) {
        return Err(AppError::Validation(format!(
            "Question must be between {} and {} characters",
            QUESTION_LEN.start(),
            QUESTION_LEN.end()
        )));
    }

    for option in &request.options {
        let len = option.trim().chars().count();
        if !OPTION_LEN.contains(&len) {
            return Err(AppError::Validation(format!(
                "Each option must be between {} and {} characters",
                OPTION_LEN.start(),
                OPTION_LEN.end()
            )));
        }
    }

    Ok(())
}

fn poll_id_from(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, AppError> {
    path.map(|Path(id)| id)
        .map_err(|_| AppError::Validation("Invalid poll ID".to_string()))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Create a poll and hand back its share link
pub async fn create_poll(
    State(state): State<AppState>,
    body: Result<Json<CreatePollRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(body)?;
    validate_create(&request)?;

    let created = poll::create_poll(state.store.as_ref(), &request.question, &request.options).await?;

    let response = CreatePollResponse {
        poll_id: created.poll.id,
        share_url: state.config.share_url(created.poll.id),
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(response))))
}

/// Current tally for one poll
pub async fn get_poll(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let poll_id = poll_id_from(path)?;

    let aggregate = poll::get_poll(state.store.as_ref(), poll_id)
        .await?
        .ok_or_else(AppError::poll_not_found)?;

    Ok(Json(ApiResponse::ok(aggregate)))
}

pub async fn vote_status(
    State(state): State<AppState>,
    Extension(token): Extension<VoterToken>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let poll_id = poll_id_from(path)?;

    let has_voted = ledger::check_vote_status(state.store.as_ref(), poll_id, token.as_str()).await?;

    Ok(Json(ApiResponse::ok(VoteStatusResponse { has_voted })))
}

/// Vote for an option
pub async fn vote(
    State(state): State<AppState>,
    Extension(token): Extension<VoterToken>,
    ClientAddr(ip_address): ClientAddr,
    body: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(body)?;

    let ballot = Ballot {
        poll_id: request.poll_id,
        option_id: request.option_id,
        voter_token: token.0,
        ip_address,
    };
    services::cast_vote(&state, &ballot).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(VoteResponse { voted: true }))))
}

pub async fn not_found() -> AppError {
    AppError::NotFound {
        code: "NOT_FOUND",
        message: "Resource not found".to_string(),
    }
}
