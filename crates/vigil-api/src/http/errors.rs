//! RFC9457-style API error wrapper and domain error mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;
use vigil_config::ConfigError;

use crate::http::constants::{
    PROBLEM_BAD_REQUEST, PROBLEM_CONFIG_INVALID, PROBLEM_CONFLICT, PROBLEM_INTERNAL,
    PROBLEM_NOT_FOUND,
};
use crate::models::{ProblemDetails, ProblemInvalidParam};

/// Structured API error with optional RFC9457 fields.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
    pub(crate) invalid_params: Option<Vec<ProblemInvalidParam>>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
            invalid_params: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn with_invalid_params(mut self, params: Vec<ProblemInvalidParam>) -> Self {
        self.invalid_params = Some(params);
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            PROBLEM_NOT_FOUND,
            "resource not found",
        )
        .with_detail(detail)
    }

    pub(crate) fn conflict(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, PROBLEM_CONFLICT, "conflict").with_detail(detail)
    }

    pub(crate) fn config_invalid(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            PROBLEM_CONFIG_INVALID,
            "configuration invalid",
        )
        .with_detail(detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
            invalid_params: self.invalid_params,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Project a domain error onto the wire contract. Persistence and corruption
/// failures are logged here and surfaced as opaque internals.
pub(crate) fn map_config_error(err: ConfigError, context: &'static str) -> ApiError {
    match &err {
        ConfigError::Validation {
            section,
            parameter,
            reason,
        } => ApiError::config_invalid(err.to_string()).with_invalid_params(vec![
            ProblemInvalidParam {
                pointer: format!("/{section}/{parameter}"),
                message: reason.clone(),
            },
        ]),
        ConfigError::InvalidProfile { .. } => ApiError::config_invalid(err.to_string()),
        ConfigError::DeviceNotFound { .. }
        | ConfigError::ProfileNotFound { .. }
        | ConfigError::HistoryNotFound { .. } => ApiError::not_found(err.to_string()),
        ConfigError::DeviceExists { .. }
        | ConfigError::RollbackRejected { .. }
        | ConfigError::NothingPending { .. }
        | ConfigError::DeviceTypeMismatch { .. } => ApiError::conflict(err.to_string()),
        ConfigError::CorruptConfig { .. }
        | ConfigError::InvalidChangeKind { .. }
        | ConfigError::Persistence { .. } => {
            error!(error = %err, context, "configuration backend failure");
            ApiError::internal(context)
        }
    }
}
