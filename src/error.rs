// src/error.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use serde_json::json;

/// Typed failure taxonomy for the core operations. Handlers return these and
/// actix maps them onto the `{success: false, message}` envelope.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Referenced mission, volunteer, user or association does not exist.
    #[error("{0}")]
    NotFound(String),
    /// Operation attempted against a mission whose status forbids it.
    #[error("{0}")]
    InvalidState(String),
    /// Duplicate application or conflicting re-decision.
    #[error("{0}")]
    Conflict(String),
    /// Caller is not the owning association.
    #[error("{0}")]
    Forbidden(String),
    #[error("Unauthorized")]
    Unauthorized,
    /// Storage-layer failure carrying the driver error, so transaction
    /// retry labels stay readable.
    #[error("Database error")]
    Database(#[from] mongodb::error::Error),
    /// Any other server-side failure.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// True when the server aborted a transaction that is safe to rerun,
    /// e.g. a write conflict between two overlapping transactions.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::Database(err) if err.contains_label(mongodb::error::TRANSIENT_TRANSACTION_ERROR)
        )
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidState(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::Database(err) = self {
            error!("Database error: {}", err);
        }
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "message": self.to_string(),
        }))
    }
}

impl From<mongodb::bson::ser::Error> for ApiError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        error!("BSON serialization error: {}", err);
        ApiError::Internal("Serialization error".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_contract_status_codes() {
        assert_eq!(
            ApiError::NotFound("Mission not found".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::InvalidState("Mission is not open for applications".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Conflict("Already applied to this mission".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Forbidden("Not authorized".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::Internal("Error signing token".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Database(mongodb::error::Error::custom("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn only_labelled_database_errors_are_transient() {
        // Business errors must surface to the caller, never trigger a rerun.
        assert!(!ApiError::Conflict("Already applied to this mission".into()).is_transient());
        assert!(!ApiError::InvalidState("Mission is already closed".into()).is_transient());
        assert!(!ApiError::NotFound("Applicant not found".into()).is_transient());
        // An unlabelled driver error is a real failure, not a retry signal.
        assert!(!ApiError::Database(mongodb::error::Error::custom("boom")).is_transient());
    }
}
