//! Error types for the inbox
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// User-input kinds (`UnknownSite`, `InvalidActivity`,
/// `UnsupportedActivityType`) map to 4xx responses; everything else is an
/// internal failure. Nothing in the inbox retries on any of these.
#[derive(Debug, Error)]
pub enum AppError {
    /// The site id is not registered (404)
    #[error("Unknown site: {0}")]
    UnknownSite(String),

    /// The activity is malformed, e.g. has no type (400)
    #[error("Invalid activity: {0}")]
    InvalidActivity(String),

    /// The activity type is well-formed but not handled by this inbox (422)
    #[error("The following activity type is not supported by this inbox: {0}")]
    UnsupportedActivityType(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// One or more configuration values failed validation (500)
    #[error(transparent)]
    InvalidConfig(#[from] ValidationErrors),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the error was caused by the caller's input rather than by
    /// the inbox itself.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AppError::UnknownSite(_)
                | AppError::InvalidActivity(_)
                | AppError::UnsupportedActivityType(_)
        )
    }

    /// HTTP status the error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::UnknownSite(_) => StatusCode::NOT_FOUND,
            AppError::InvalidActivity(_) => StatusCode::BAD_REQUEST,
            AppError::UnsupportedActivityType(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Database(_)
            | AppError::Config(_)
            | AppError::InvalidConfig(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::UnknownSite(_) => "unknown_site",
            AppError::InvalidActivity(_) => "invalid_activity",
            AppError::UnsupportedActivityType(_) => "unsupported_activity_type",
            AppError::Database(_) => "database",
            AppError::Config(_) | AppError::InvalidConfig(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Every problem found while validating a piece of configuration.
///
/// Validation never stops at the first failure so an operator can fix
/// everything from a single report.
#[derive(Debug, Error)]
#[error("{context}: {}", .errors.join("; "))]
pub struct ValidationErrors {
    pub context: String,
    pub errors: Vec<String>,
}

impl ValidationErrors {
    /// `Ok(())` when `errors` is empty, otherwise the collected report.
    pub fn check(context: impl Into<String>, errors: Vec<String>) -> Result<(), Self> {
        if errors.is_empty() {
            return Ok(());
        }

        Err(Self {
            context: context.into(),
            errors,
        })
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to an HTTP status code and a JSON error body.
    /// Internal details are logged, never sent to the remote server.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status_code();

        let error_message = if self.is_user_error() {
            self.to_string()
        } else {
            tracing::error!(error = %self, "Request failed");
            "Internal server error".to_string()
        };

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[self.kind()])
            .inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_map_to_client_statuses() {
        let cases = [
            (AppError::UnknownSite("ghost".into()), StatusCode::NOT_FOUND),
            (
                AppError::InvalidActivity("missing type field".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::UnsupportedActivityType("Offer".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];

        for (error, expected) in cases {
            assert!(error.is_user_error());
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn store_failures_are_internal() {
        let error = AppError::Database(sqlx::Error::RowNotFound);
        assert!(!error.is_user_error());
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unsupported_type_message_names_the_type() {
        let error = AppError::UnsupportedActivityType("Offer".into());
        assert!(error.to_string().ends_with(": Offer"));
    }

    #[test]
    fn validation_errors_report_everything() {
        assert!(ValidationErrors::check("sites", Vec::new()).is_ok());

        let report = ValidationErrors::check(
            "sites",
            vec!["a.pem does not exist".into(), "b.pem does not exist".into()],
        )
        .expect_err("two problems must fail");
        assert_eq!(report.errors.len(), 2);
        assert_eq!(
            report.to_string(),
            "sites: a.pem does not exist; b.pem does not exist"
        );
    }
}
