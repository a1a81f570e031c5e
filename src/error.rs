// src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failure at the storage boundary.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unique constraint `{constraint}` violated")]
    UniqueViolation { constraint: String },

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let constraint = err
            .as_database_error()
            .filter(|db| db.is_unique_violation())
            .map(|db| db.constraint().unwrap_or("unknown").to_string());

        match constraint {
            Some(constraint) => StoreError::UniqueViolation { constraint },
            None => StoreError::Database(err),
        }
    }
}

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("Poll not found")]
    PollNotFound,

    #[error("Option not found")]
    OptionNotFound,

    #[error("Option does not belong to this poll")]
    OptionMismatch,

    #[error("You have already voted in this poll")]
    AlreadyVoted,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for VoteError {
    fn from(err: StoreError) -> Self {
        match err {
            // the only unique key a vote write can trip is (poll_id, voter_token)
            StoreError::UniqueViolation { .. } => VoteError::AlreadyVoted,
            other => VoteError::Store(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum CreatePollError {
    #[error("Poll must have at least {min} options")]
    TooFewOptions { min: usize },

    #[error("Poll cannot have more than {max} options")]
    TooManyOptions { max: usize },

    #[error("All poll options must be unique")]
    DuplicateOptionText,

    #[error("Question cannot be empty")]
    EmptyQuestion,

    #[error("Option cannot be empty")]
    EmptyOption,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CreatePollError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { .. } => CreatePollError::DuplicateOptionText,
            other => CreatePollError::Store(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to connect to the database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to run migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned to HTTP callers.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    #[error("Internal server error")]
    Internal(#[from] StoreError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_FAILED",
            AppError::NotFound { code, .. } | AppError::Conflict { code, .. } => *code,
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn poll_not_found() -> Self {
        AppError::NotFound {
            code: "POLL_NOT_FOUND",
            message: VoteError::PollNotFound.to_string(),
        }
    }
}

impl From<VoteError> for AppError {
    fn from(err: VoteError) -> Self {
        let message = err.to_string();
        match err {
            VoteError::PollNotFound => AppError::poll_not_found(),
            VoteError::OptionNotFound => AppError::NotFound {
                code: "OPTION_NOT_FOUND",
                message,
            },
            VoteError::OptionMismatch => AppError::NotFound {
                code: "OPTION_MISMATCH",
                message,
            },
            VoteError::AlreadyVoted => AppError::Conflict {
                code: "ALREADY_VOTED",
                message,
            },
            VoteError::Store(err) => AppError::Internal(err),
        }
    }
}

impl From<CreatePollError> for AppError {
    fn from(err: CreatePollError) -> Self {
        match err {
            CreatePollError::DuplicateOptionText => AppError::Conflict {
                code: "DUPLICATE_OPTION",
                message: err.to_string(),
            },
            CreatePollError::Store(err) => AppError::Internal(err),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(ref err) = self {
            error!(error = %err, "Request failed");
        }

        let body = json!({
            "success": false,
            "error": self.to_string(),
            "code": self.code(),
        });

        (self.status(), Json(body)).into_response()
    }
}
