//! Research error taxonomy.
//!
//! Every failure that can end a research run is classified here so callers
//! can tell which stage failed (and for which URL or country) without parsing
//! message text.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Pipeline stage an error or timing belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Inbound request validation.
    Validation,
    /// Product store lookup.
    Lookup,
    /// Search provider call.
    Search,
    /// Page renderer call.
    Render,
    /// Language model completion.
    LanguageModel,
    /// Pricing extraction from model output.
    Pricing,
    /// Product store write.
    Persistence,
}

impl Stage {
    /// Stable lowercase name used in logs and error bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Lookup => "lookup",
            Self::Search => "search",
            Self::Render => "render",
            Self::LanguageModel => "language_model",
            Self::Pricing => "pricing",
            Self::Persistence => "persistence",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified research failure.
#[derive(Error, Debug)]
pub enum ResearchError {
    /// Malformed inbound request.
    #[error("Invalid request: {field} {reason}")]
    Validation { field: &'static str, reason: String },

    /// Search, render or language model transport failure or non-success status.
    #[error(
        "{stage} unavailable for {target}{}: {message}",
        .country.as_deref().map(|c| format!(" (country {c})")).unwrap_or_default()
    )]
    UpstreamUnavailable {
        stage: Stage,
        target: String,
        country: Option<String>,
        status: Option<u16>,
        message: String,
    },

    /// Pricing block extraction failed or was partial.
    #[error("Failed to parse pricing analysis: {reason}")]
    Parse { reason: String, raw: String },

    /// Update requested for a (user, url) pair with no stored record.
    #[error("No product stored for user '{user_id}' and url '{url}'")]
    NotFound { user_id: String, url: String },

    /// Lookup by store-assigned id found nothing.
    #[error("Product {id} not found")]
    ProductNotFound { id: i64 },

    /// Product store read or write failed.
    #[error("Product store {operation} failed: {message}")]
    Persistence {
        operation: &'static str,
        message: String,
    },

    /// The run's cancellation token fired or its deadline passed.
    #[error("Research cancelled during {stage}: {reason}")]
    Cancelled { stage: Stage, reason: String },
}

/// Result type alias for research operations.
pub type ResearchResult<T> = Result<T, ResearchError>;

impl ResearchError {
    /// Create a validation error.
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Create an upstream error without an HTTP status (transport failure or bad payload).
    pub fn upstream(stage: Stage, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            stage,
            target: target.into(),
            country: None,
            status: None,
            message: message.into(),
        }
    }

    /// Create an upstream error for a non-success HTTP status.
    pub fn upstream_status(
        stage: Stage,
        target: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::UpstreamUnavailable {
            stage,
            target: target.into(),
            country: None,
            status: Some(status),
            message: message.into(),
        }
    }

    /// The page renderer answered with a non-success status.
    pub fn rendering_failed(url: impl Into<String>, status: u16) -> Self {
        Self::upstream_status(
            Stage::Render,
            url,
            status,
            format!("rendering failed with upstream status {status}"),
        )
    }

    /// Classify a `reqwest` transport error for the given stage.
    pub fn from_transport(stage: Stage, target: impl Into<String>, err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else {
            err.to_string()
        };
        Self::UpstreamUnavailable {
            stage,
            target: target.into(),
            country: None,
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }

    /// Create a persistence error.
    pub fn persistence(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Persistence {
            operation,
            message: err.to_string(),
        }
    }

    /// Attach the country being researched to an upstream failure.
    #[must_use]
    pub fn in_country(self, country: &str) -> Self {
        match self {
            Self::UpstreamUnavailable {
                stage,
                target,
                country: None,
                status,
                message,
            } => Self::UpstreamUnavailable {
                stage,
                target,
                country: Some(country.to_string()),
                status,
                message,
            },
            other => other,
        }
    }

    /// Report an upstream failure against `target` (usually the page URL being
    /// summarized) instead of the model name. The model name moves into the message.
    #[must_use]
    pub fn retarget(self, target: &str) -> Self {
        match self {
            Self::UpstreamUnavailable {
                stage,
                target: previous,
                country,
                status,
                message,
            } if previous != target => Self::UpstreamUnavailable {
                stage,
                target: target.to_string(),
                country,
                status,
                message: format!("{previous}: {message}"),
            },
            other => other,
        }
    }

    /// Whether an idempotent read that failed this way is worth retrying.
    ///
    /// Transport failures, 429 and 5xx are transient; other statuses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UpstreamUnavailable { status: None, .. } => true,
            Self::UpstreamUnavailable {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            _ => false,
        }
    }

    /// Stage the failure belongs to, when known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Validation { .. } => Some(Stage::Validation),
            Self::UpstreamUnavailable { stage, .. } | Self::Cancelled { stage, .. } => Some(*stage),
            Self::Parse { .. } => Some(Stage::Pricing),
            Self::NotFound { .. } | Self::Persistence { .. } => Some(Stage::Persistence),
            Self::ProductNotFound { .. } => Some(Stage::Lookup),
        }
    }

    /// Short machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::Parse { .. } => "parse_error",
            Self::NotFound { .. } | Self::ProductNotFound { .. } => "not_found",
            Self::Persistence { .. } => "persistence_error",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// HTTP status used when this error reaches the API boundary.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound { .. } | Self::ProductNotFound { .. } => StatusCode::NOT_FOUND,
            Self::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            Self::Cancelled { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Parse { .. } | Self::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Structured error object returned by the HTTP API.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    pub detail: String,
}

impl From<&ResearchError> for ErrorBody {
    fn from(err: &ResearchError) -> Self {
        let (country, upstream_status) = match err {
            ResearchError::UpstreamUnavailable {
                country, status, ..
            } => (country.clone(), *status),
            _ => (None, None),
        };
        Self {
            status: "error",
            kind: err.kind(),
            stage: err.stage(),
            country,
            upstream_status,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ResearchError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "Request failed");
        }
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_display_includes_country() {
        let err = ResearchError::rendering_failed("https://shop.example/a", 503).in_country("MX");
        let msg = err.to_string();
        assert!(msg.contains("render unavailable"));
        assert!(msg.contains("https://shop.example/a"));
        assert!(msg.contains("(country MX)"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn test_in_country_keeps_first_country() {
        let err = ResearchError::upstream(Stage::Search, "query", "boom")
            .in_country("US")
            .in_country("MX");
        match err {
            ResearchError::UpstreamUnavailable { country, .. } => {
                assert_eq!(country.as_deref(), Some("US"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_retarget_moves_model_into_message() {
        let err = ResearchError::upstream(Stage::LanguageModel, "gpt-4o", "timeout")
            .retarget("https://shop.example/tie");
        match err {
            ResearchError::UpstreamUnavailable { target, message, .. } => {
                assert_eq!(target, "https://shop.example/tie");
                assert_eq!(message, "gpt-4o: timeout");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ResearchError::upstream(Stage::Search, "q", "reset").is_retryable());
        assert!(ResearchError::upstream_status(Stage::Search, "q", 429, "slow down").is_retryable());
        assert!(ResearchError::upstream_status(Stage::Render, "u", 502, "bad gateway").is_retryable());
        assert!(!ResearchError::rendering_failed("u", 404).is_retryable());
        assert!(!ResearchError::validation("countries", "must not be empty").is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ResearchError::validation("user_id", "must not be empty").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ResearchError::upstream(Stage::LanguageModel, "gpt-4o", "timeout").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ResearchError::ProductNotFound { id: 7 }.status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_error_body_fields() {
        let err = ResearchError::rendering_failed("https://x.example", 500).in_country("JP");
        let body = ErrorBody::from(&err);
        assert_eq!(body.kind, "upstream_unavailable");
        assert_eq!(body.stage, Some(Stage::Render));
        assert_eq!(body.country.as_deref(), Some("JP"));
        assert_eq!(body.upstream_status, Some(500));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["stage"], "render");
    }
}
