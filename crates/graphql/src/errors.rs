use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use thiserror::Error;

use fieldperm_auth::{AccessError, LoaderError, PathResolutionError};

/// The only authorization failure a client ever sees.
///
/// It names the protected field and nothing else; the required permissions
/// and the user's actual permissions stay in server-side logs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("No access for user on field '{field}'")]
pub struct AuthorizationError {
    field: String,
}

impl AuthorizationError {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

/// Error returned by guarded (and guarding) resolvers.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error(transparent)]
    Unauthorized(#[from] AuthorizationError),

    /// Detailed denial from an inline [`check_field_access`](crate::check_field_access).
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Permissions could not be loaded (configuration, resolution or source failure).
    #[error(transparent)]
    Permissions(#[from] LoaderError),

    /// The guard's scope path does not match the resolved object.
    #[error(transparent)]
    ScopePath(#[from] PathResolutionError),

    /// The wrapped resolver itself failed.
    #[error(transparent)]
    Resolver(#[from] anyhow::Error),
}

impl FieldError {
    /// Denial-class errors: the routine "no" path, not a system fault.
    pub fn is_denial(&self) -> bool {
        matches!(self, FieldError::Unauthorized(_) | FieldError::Access(_))
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            FieldError::Unauthorized(_) | FieldError::Access(_) => "unauthorized",
            FieldError::Permissions(_) => "permission_source_error",
            FieldError::ScopePath(_) => "scope_path_error",
            FieldError::Resolver(_) => "resolver_error",
        }
    }

    /// Message safe to show to a client.
    pub fn public_message(&self) -> String {
        match self {
            FieldError::Unauthorized(err) => err.to_string(),
            FieldError::Access(_) => "unauthorized".to_string(),
            FieldError::Permissions(_) => "failed to load permissions".to_string(),
            FieldError::ScopePath(_) => "failed to resolve field".to_string(),
            FieldError::Resolver(_) => "failed to resolve field".to_string(),
        }
    }
}

impl IntoResponse for FieldError {
    fn into_response(self) -> axum::response::Response {
        let status = if self.is_denial() {
            StatusCode::FORBIDDEN
        } else {
            tracing::error!(error = %self, "field resolution failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        json_error(status, self.code(), self.public_message())
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
