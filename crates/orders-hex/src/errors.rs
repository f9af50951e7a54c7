use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orders_types::domain::order::{OrderStatus, Transition, TransitionError};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Order not found: {0}")]
    NotFound(String),

    /// The transition is not legal against the current record, either by the
    /// status read up front or because a competing transition committed first.
    /// `status` is the latest status observed in both cases.
    #[error("cannot {transition} order {id}: status is {status}")]
    InvalidTransition {
        id: Uuid,
        transition: Transition,
        status: OrderStatus,
    },

    #[error("Storage failure")]
    StorageFailure(#[from] anyhow::Error),
}

impl From<TransitionError> for AppError {
    fn from(e: TransitionError) -> Self {
        AppError::InvalidTransition {
            id: e.id,
            transition: e.transition,
            status: e.status,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, msg) = match &self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            AppError::InvalidTransition { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::StorageFailure(e) => {
                tracing::error!(error = ?e, "storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
            }
        };

        let body = serde_json::to_string(&ErrorBody { error: msg })
            .unwrap_or_else(|_| "{\"error\":\"internal serialization\"}".into());
        (code, [("content-type", "application/json")], body).into_response()
    }
}
