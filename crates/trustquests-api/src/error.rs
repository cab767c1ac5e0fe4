use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use trustquests_chain::ChainError;
use trustquests_db::StoreError;
use trustquests_types::AddressError;
use trustquests_types::api::ErrorBody;

/// Handler error, rendered as `{ "error": message }` with a matching status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("blockchain is not configured")]
    ChainUnavailable,

    #[error("{0}")]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<StoreError>() {
            Ok(store) => ApiError::Store(store),
            Err(other) => ApiError::Internal(other),
        }
    }
}

impl From<AddressError> for ApiError {
    fn from(e: AddressError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Store(e) => match e {
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::IncompleteDraft(_) => StatusCode::BAD_REQUEST,
                StoreError::UsernameTaken(_)
                | StoreError::QuestNotActive
                | StoreError::QuestFull
                | StoreError::NotStarted => StatusCode::CONFLICT,
            },
            ApiError::Chain(e) => match e {
                ChainError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
                ChainError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            },
            ApiError::ChainUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal(e) => error!("Internal error: {:#}", e),
            ApiError::Chain(e) if status == StatusCode::BAD_GATEWAY => warn!("Chain call failed: {}", e),
            _ => {}
        }

        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
