//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// API error response body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Field-level validation errors, when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<HashMap<String, Vec<String>>>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            errors: None,
        }
    }

    pub fn validation(errors: HashMap<String, Vec<String>>) -> Self {
        Self {
            code: "VALIDATION_ERROR".to_string(),
            message: "One or more validation errors occurred".to_string(),
            errors: Some(errors),
        }
    }
}

/// Application error type
///
/// The taxonomy mirrors how request handling can fail:
/// - `Unauthorized` is terminal for the request; no retry will help.
/// - `Validation` is user-correctable field-level feedback.
/// - `CouldNotVerify` is the recoverable confirmation failure, deliberately
///   distinct from `Unauthorized`.
/// - `Provider` covers transient identity-provider or delivery failures and
///   is safe to retry.
/// - `Persistence` is a store write failure surfaced as a generic error.
#[derive(Debug)]
pub enum AppError {
    Unauthorized(String),
    Validation(HashMap<String, Vec<String>>),
    BadRequest(String),
    CouldNotVerify,
    Provider(String),
    Persistence(String),
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(message.into())
    }

    /// Single-field validation failure
    pub fn field_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.into(), vec![message.into()]);
        AppError::Validation(errors)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, ApiError::new("UNAUTHORIZED", msg)),
            AppError::Validation(errors) => (StatusCode::BAD_REQUEST, ApiError::validation(errors)),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg)),
            AppError::CouldNotVerify => (
                StatusCode::BAD_REQUEST,
                ApiError::new("COULD_NOT_VERIFY", "Could not verify email address"),
            ),
            AppError::Provider(msg) => (StatusCode::BAD_GATEWAY, ApiError::new("PROVIDER_ERROR", msg)),
            AppError::Persistence(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("PERSISTENCE_ERROR", msg),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("INTERNAL_ERROR", msg),
            ),
        };

        (status, Json(error)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mapped = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        AppError::Validation(mapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_shape() {
        let err = AppError::field_error("email", "Email taken");
        match err {
            AppError::Validation(errors) => {
                assert_eq!(errors["email"], vec!["Email taken".to_string()]);
            }
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn test_api_error_serialization() {
        let error = ApiError::new("UNAUTHORIZED", "Invalid password");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("UNAUTHORIZED"));
        assert!(!json.contains("errors"));
    }
}
