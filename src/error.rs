use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invoice is not payable: {0}")]
    InvoiceNotPayable(String),

    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("External API error: {0}")]
    ExternalAPI(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::InvoiceNotPayable(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVOICE_NOT_PAYABLE")
            }
            AppError::NotConfigured(_) => (StatusCode::SERVICE_UNAVAILABLE, "NOT_CONFIGURED"),
            AppError::ExternalAPI(_) | AppError::Http(_) => {
                (StatusCode::BAD_GATEWAY, "EXTERNAL_API_ERROR")
            }
            AppError::Serialization(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }

    /// Message shown to API callers. Upstream failures are collapsed into a
    /// generic text; the detail only goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            AppError::ExternalAPI(_) | AppError::Http(_) => {
                "Upstream provider request failed".to_string()
            }
            AppError::Serialization(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
        } else {
            tracing::debug!(code, error = %self, "request rejected");
        }

        let body = Json(ErrorResponse {
            success: false,
            error: self.public_message(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_client_errors() {
        let (status, code) = AppError::BadRequest("planId is required".into()).status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "BAD_REQUEST");

        let (status, _) = AppError::InvoiceNotPayable("already paid".into()).status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn upstream_errors_hide_vendor_detail() {
        let err = AppError::ExternalAPI("Strike 500: secret stack trace".into());
        assert_eq!(err.status_and_code().0, StatusCode::BAD_GATEWAY);
        assert_eq!(err.public_message(), "Upstream provider request failed");
    }

    #[test]
    fn business_rule_errors_keep_reason() {
        let err = AppError::InvoiceNotPayable("invoice already paid".into());
        assert_eq!(err.public_message(), "Invoice is not payable: invoice already paid");
    }
}
