use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::eligibility::{AnalysisError, EligibilityServiceError, ValidationError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Eligibility(EligibilityServiceError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Eligibility(EligibilityServiceError::MalformedPostcode(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Eligibility(EligibilityServiceError::Analysis(err)) => match err {
                AnalysisError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                AnalysisError::SnapshotUnavailable(_) | AnalysisError::Cancelled => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                AnalysisError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
                AnalysisError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to clinic staff. Internal details stay in the logs.
    pub fn user_message(&self) -> String {
        let AppError::Eligibility(err) = self else {
            return "Something went wrong on our side. Please try again later.".to_string();
        };

        match err {
            EligibilityServiceError::MalformedPostcode(err) => {
                format!("{err}. Postcodes must be 3 or 4 digits.")
            }
            EligibilityServiceError::Analysis(AnalysisError::Validation(err)) => match err {
                ValidationError::Empty => {
                    "No postcodes were supplied. Add at least one patient postcode and try again."
                        .to_string()
                }
                ValidationError::TooMany { submitted, max } => format!(
                    "Too many postcodes: {submitted} were supplied but your plan allows {max}. \
                     Split the population into smaller batches."
                ),
            },
            EligibilityServiceError::Analysis(AnalysisError::SnapshotUnavailable(_)) => {
                "Eligibility data is temporarily unavailable. Please try again shortly."
                    .to_string()
            }
            EligibilityServiceError::Analysis(AnalysisError::Cancelled) => {
                "The analysis was cancelled before it finished. Please try again.".to_string()
            }
            EligibilityServiceError::Analysis(AnalysisError::TimedOut(_)) => {
                "The analysis took too long to complete. Please try again with fewer postcodes."
                    .to_string()
            }
            EligibilityServiceError::Analysis(AnalysisError::Worker(_)) => {
                "Something went wrong on our side. Please try again later.".to_string()
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Eligibility(err) => write!(f, "eligibility error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Eligibility(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "request failed");
        }

        let body = Json(json!({ "error": self.user_message() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<EligibilityServiceError> for AppError {
    fn from(value: EligibilityServiceError) -> Self {
        Self::Eligibility(value)
    }
}

impl From<AnalysisError> for AppError {
    fn from(value: AnalysisError) -> Self {
        Self::Eligibility(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn validation_failures_are_unprocessable() {
        let err = AppError::from(AnalysisError::Validation(ValidationError::TooMany {
            submitted: 10_001,
            max: 10_000,
        }));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.user_message().contains("10001"));
    }

    #[test]
    fn timeouts_and_outages_use_gateway_statuses() {
        let timeout = AppError::from(AnalysisError::TimedOut(Duration::from_secs(30)));
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);

        let cancelled = AppError::from(AnalysisError::Cancelled);
        assert_eq!(cancelled.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn internal_errors_hide_details_from_users() {
        let err = AppError::from(AnalysisError::Worker("panic in chunk 3".to_string()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.user_message().contains("chunk"));
        assert!(err.to_string().contains("chunk 3"));
    }
}
