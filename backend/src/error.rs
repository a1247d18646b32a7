//! Error handling for the stock ledger
//!
//! Every failure is raised as an [`AppError`] at the point of violation, inside
//! the open transaction. Returning it drops the transaction, which rolls back.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Error kinds surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    InsufficientStock,
    Conflict,
    InvalidStateTransition,
    Internal,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::InsufficientStock => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::InvalidStateTransition => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Caller identity, checked before any ledger call
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("{0}")]
    Conflict(String),

    /// Serialization failure or deadlock; the whole operation may be retried
    #[error("Concurrent update conflict: {0}")]
    ConcurrentUpdate(String),

    #[error("{0}")]
    InvalidStateTransition(String),

    /// Pool acquire timeout or cancelled statement
    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Unauthorized(_) | AppError::Forbidden(_) | AppError::InvalidArgument(_) => {
                ErrorKind::InvalidArgument
            }
            AppError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            AppError::Conflict(_) | AppError::ConcurrentUpdate(_) => ErrorKind::Conflict,
            AppError::InvalidStateTransition(_) => ErrorKind::InvalidStateTransition,
            AppError::Timeout(_) | AppError::DatabaseError(_) | AppError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConcurrentUpdate(_) | AppError::Timeout(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            _ if self.kind() == ErrorKind::Internal && self.is_retryable() => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => self.kind().status_code(),
        }
    }

    pub fn not_found(resource: &str) -> Self {
        AppError::NotFound(resource.to_string())
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::InsufficientStock { available, requested } => Some(serde_json::json!({
                "available": available,
                "requested": requested,
            })),
            _ => None,
        }
    }

    /// Message shown to the caller. Internal failures never leak detail.
    fn public_message(&self) -> String {
        match self {
            AppError::Timeout(_) => "The operation timed out, please retry".to_string(),
            AppError::DatabaseError(_) | AppError::Internal(_) => {
                "An internal server error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Map a Postgres SQLSTATE to the ledger error it stands for
fn classify_database_error(code: &str, message: &str, constraint: Option<&str>) -> Option<AppError> {
    match code {
        "23505" => Some(AppError::Conflict(match constraint {
            Some(constraint) => format!("Duplicate entry violates '{}'", constraint),
            None => "Duplicate entry".to_string(),
        })),
        // The referenced row was deleted by a concurrent transaction
        "23503" => Some(AppError::NotFound("Referenced record".to_string())),
        "22003" => Some(AppError::InvalidArgument("Stock quantity out of range".to_string())),
        "40001" | "40P01" => Some(AppError::ConcurrentUpdate(message.to_string())),
        "57014" => Some(AppError::Timeout("statement timeout".to_string())),
        _ => None,
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(code) = db_err.code() {
                if let Some(mapped) =
                    classify_database_error(&code, db_err.message(), db_err.constraint())
                {
                    return mapped;
                }
            }
        }

        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record".to_string()),
            sqlx::Error::PoolTimedOut => AppError::Timeout("connection pool exhausted".to_string()),
            other => AppError::DatabaseError(other),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let reason = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| errs.first().map(|e| e.code.to_string()).unwrap_or_default());
                format!("{}: {}", field, reason)
            })
            .collect();
        AppError::InvalidArgument(format!("Invalid input ({})", fields.join(", ")))
    }
}

impl From<shared::TransitionError> for AppError {
    fn from(err: shared::TransitionError) -> Self {
        AppError::InvalidStateTransition(err.to_string())
    }
}

impl From<shared::PurchaseOrderTransitionError> for AppError {
    fn from(err: shared::PurchaseOrderTransitionError) -> Self {
        AppError::InvalidStateTransition(err.to_string())
    }
}

impl From<shared::ParseEnumError> for AppError {
    fn from(err: shared::ParseEnumError) -> Self {
        AppError::Internal(format!("corrupt stored value: {}", err))
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub retryable: bool,
}

impl From<&AppError> for ErrorDetail {
    fn from(err: &AppError) -> Self {
        ErrorDetail {
            kind: err.kind(),
            message: err.public_message(),
            details: err.details(),
            retryable: err.is_retryable(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = self.status_code();

        if kind == ErrorKind::Internal {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::warn!(error = %self, kind = ?kind, "request rejected");
        }

        (status, Json(ErrorResponse { error: ErrorDetail::from(&self) })).into_response()
    }
}

/// Result type alias for handlers and services
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_carries_available() {
        let err = AppError::InsufficientStock { available: 12, requested: 20 };
        let detail = ErrorDetail::from(&err);
        assert_eq!(detail.kind, ErrorKind::InsufficientStock);
        assert_eq!(detail.details, Some(serde_json::json!({ "available": 12, "requested": 20 })));
        assert!(!detail.retryable);
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err = AppError::Internal("connection reset by peer at 10.0.0.3".to_string());
        assert_eq!(ErrorDetail::from(&err).message, "An internal server error occurred");
    }

    #[test]
    fn test_timeout_is_retryable_internal() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.is_retryable());
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::not_found("Product").into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::InvalidArgument("bad".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Conflict("dup".into()).into_response().status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::InvalidStateTransition("no".into()).into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_foreign_key_violation_is_not_found() {
        let err = classify_database_error("23503", "insert or update violates foreign key", None)
            .expect("23503 is classified");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_database_codes() {
        let dup = classify_database_error("23505", "duplicate", Some("uq_warehouses_owner_name"))
            .expect("23505 is classified");
        assert_eq!(dup.to_string(), "Duplicate entry violates 'uq_warehouses_owner_name'");

        let overflow = classify_database_error("22003", "bigint out of range", None)
            .expect("22003 is classified");
        assert_eq!(overflow.kind(), ErrorKind::InvalidArgument);

        for code in ["40001", "40P01", "57014"] {
            let err = classify_database_error(code, "retry", None).expect("classified");
            assert!(err.is_retryable(), "{} should be retryable", code);
        }

        assert!(classify_database_error("42P01", "undefined table", None).is_none());
    }

    #[test]
    fn test_transition_error_maps_to_state_kind() {
        let err: AppError = shared::ShipmentStatus::Delivered
            .transition(shared::ShipmentStatus::Pending)
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    }
}
