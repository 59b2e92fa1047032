//! # Error Handling
//!
//! Unified error handling for the registry API, rendering every failure as a
//! problem+json response with trace ID propagation.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::telemetry;

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<serde_json::Value>>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<S: Into<String>>(status: StatusCode, code: S, message: S) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            details: None,
            trace_id: telemetry::current_trace_id().map(String::into_boxed_str),
        }
    }

    /// Add details to the error
    pub fn with_details<V: Into<serde_json::Value>>(mut self, details: V) -> Self {
        self.details = Some(Box::new(details.into()));
        self
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(code = %self.code, message = %self.message, "internal server error");
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        let body = serde_json::to_string(&self).unwrap_or_else(|_| {
            json!({ "code": "INTERNAL_SERVER_ERROR", "message": "error serialization failed" })
                .to_string()
        });

        (self.status, headers, body).into_response()
    }
}

/// Malformed input, failed name or semver validation → 400
pub fn validation_error<S: Into<String>>(message: S, details: serde_json::Value) -> ApiError {
    ApiError::new(
        StatusCode::BAD_REQUEST,
        "VALIDATION_FAILED".to_string(),
        message.into(),
    )
    .with_details(details)
}

/// No valid identity presented → 401
pub fn unauthenticated(message: Option<&str>) -> ApiError {
    ApiError::new(
        StatusCode::UNAUTHORIZED,
        "UNAUTHENTICATED",
        message.unwrap_or("Authentication required"),
    )
}

/// Identity resolved but authorization denied → 403
pub fn forbidden(message: Option<&str>) -> ApiError {
    ApiError::new(
        StatusCode::FORBIDDEN,
        "FORBIDDEN",
        message.unwrap_or("Permission denied"),
    )
}

/// Target absent after redirect resolution → 404
pub fn not_found<S: Into<String>>(message: S) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND".to_string(), message.into())
}

/// Uniqueness or state-machine violation → 409
pub fn conflict<S: Into<String>>(message: S) -> ApiError {
    ApiError::new(StatusCode::CONFLICT, "CONFLICT".to_string(), message.into())
}

/// IdP or object store unreachable → 502
pub fn upstream_failure<S: Into<String>>(message: S) -> ApiError {
    ApiError::new(
        StatusCode::BAD_GATEWAY,
        "UPSTREAM_FAILURE".to_string(),
        message.into(),
    )
}

/// Anything else → 500
pub fn internal_error<S: Into<String>>(message: S) -> ApiError {
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_SERVER_ERROR".to_string(),
        message.into(),
    )
}

fn is_unique_violation(error: &sea_orm::DbErr) -> bool {
    use sea_orm::RuntimeErr;

    const PG_UNIQUE: &str = "23505";
    const SQLITE_DUPLICATE_CODES: &[&str] = &["1555", "2067"];

    let runtime_err = match error {
        sea_orm::DbErr::Query(RuntimeErr::SqlxError(sqlx_err))
        | sea_orm::DbErr::Exec(RuntimeErr::SqlxError(sqlx_err)) => sqlx_err,
        _ => return false,
    };

    let Some(db_error) = runtime_err.as_database_error() else {
        return false;
    };

    if db_error.is_unique_violation() {
        return true;
    }

    if let Some(code) = db_error.code() {
        let code_str = code.as_ref();
        if code_str == PG_UNIQUE || SQLITE_DUPLICATE_CODES.contains(&code_str) {
            return true;
        }
    }

    false
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(err: sea_orm::DbErr) -> Self {
        if is_unique_violation(&err) {
            return conflict("resource already exists");
        }
        if matches!(err, sea_orm::DbErr::RecordNotFound(_)) {
            return not_found("resource not found");
        }
        tracing::error!(error = %err, "database error");
        internal_error("database error")
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // Preserve typed errors that bubbled through anyhow plumbing.
        match err.downcast::<ApiError>() {
            Ok(api_err) => api_err,
            Err(err) => match err.downcast::<sea_orm::DbErr>() {
                Ok(db_err) => db_err.into(),
                Err(err) => {
                    tracing::error!(error = %err, "unhandled internal error");
                    internal_error("internal server error")
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_constructors_map_status_codes() {
        assert_eq!(
            validation_error("bad", json!({})).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(unauthenticated(None).status, StatusCode::UNAUTHORIZED);
        assert_eq!(forbidden(None).status, StatusCode::FORBIDDEN);
        assert_eq!(not_found("x").status, StatusCode::NOT_FOUND);
        assert_eq!(conflict("x").status, StatusCode::CONFLICT);
        assert_eq!(upstream_failure("x").status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            internal_error("x").status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn anyhow_round_trip_preserves_api_error() {
        let source = conflict("version already exists");
        let err: anyhow::Error = source.into();
        let restored: ApiError = err.into();
        assert_eq!(restored.status, StatusCode::CONFLICT);
    }

    #[test]
    fn status_is_not_serialized() {
        let err = not_found("missing");
        let json = serde_json::to_value(&err).unwrap();
        assert!(json.get("status").is_none());
        assert_eq!(json.get("code").unwrap(), "NOT_FOUND");
    }
}
