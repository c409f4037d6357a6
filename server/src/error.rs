use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use aid::{TransitionError, model::Status};

use crate::store::StoreError;

/// Everything a handler can fail with. Each variant carries the caller-facing
/// message; [`IntoResponse`] maps it to a status code and a `{"detail": ...}`
/// body.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("cannot transition a {from} request to {to}")]
    InvalidTransition { from: Status, to: Status },

    #[error("assigning a request requires a target food bank")]
    MissingAssignment,

    #[error("quantity must not be negative")]
    NegativeQuantity,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition { from, to } => {
                AppError::InvalidTransition { from, to }
            }
            TransitionError::MissingAssignment => AppError::MissingAssignment,
            TransitionError::Forbidden(reason) => AppError::Forbidden(reason),
            TransitionError::NoOp { status } => {
                AppError::Validation(format!("request is already {status}"))
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict => {
                AppError::Conflict("request was modified concurrently, reload and retry".into())
            }
            StoreError::Duplicate(what) => AppError::Conflict(format!("{what} already exists")),
            StoreError::Backend(message) => AppError::Internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) | AppError::MissingAssignment | AppError::NegativeQuantity => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition { .. } | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aid::model::Status;

    #[test]
    fn transition_errors_keep_their_status_codes() {
        let conflict = AppError::from(TransitionError::InvalidTransition {
            from: Status::Cancelled,
            to: Status::Assigned,
        });
        assert!(matches!(conflict, AppError::InvalidTransition { .. }));

        let missing = AppError::from(TransitionError::MissingAssignment);
        assert!(matches!(missing, AppError::MissingAssignment));

        let noop = AppError::from(TransitionError::NoOp {
            status: Status::Pending,
        });
        match noop {
            AppError::Validation(detail) => assert!(detail.contains("Pending")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn store_conflicts_surface_as_conflicts() {
        assert!(matches!(
            AppError::from(StoreError::VersionConflict),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            AppError::from(StoreError::Duplicate("district")),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            AppError::from(StoreError::Backend("boom".into())),
            AppError::Internal(_)
        ));
    }
}
