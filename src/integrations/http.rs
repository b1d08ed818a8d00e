use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::{
    constants::HTTP_CONNECT_TIMEOUT_SECS,
    error::{AppError, Result},
    utils::excerpt,
};

pub fn build_client(vendor: &str, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal(format!("{} HTTP client init failed: {}", vendor, e)))
}

pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Turns a non-2xx vendor response into an `AppError`, otherwise decodes JSON.
pub async fn read_json<T: DeserializeOwned>(
    vendor: &str,
    action: &str,
    response: Response,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(vendor, action, status, &body));
    }

    response.json::<T>().await.map_err(|e| {
        AppError::ExternalAPI(format!("{} {} response parse failed: {}", vendor, action, e))
    })
}

pub fn status_error(vendor: &str, action: &str, status: StatusCode, body: &str) -> AppError {
    tracing::warn!(
        vendor,
        action,
        status = status.as_u16(),
        body = %excerpt(body),
        "vendor request failed"
    );
    match status {
        StatusCode::NOT_FOUND => AppError::NotFound(format!("{} {}: resource not found", vendor, action)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::ExternalAPI(format!(
            "{} {} rejected credentials ({})",
            vendor, action, status
        )),
        _ => AppError::ExternalAPI(format!(
            "{} {} failed with {}: {}",
            vendor,
            action,
            status,
            excerpt(body)
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("https://api.strike.me/v1/", "/invoices"), "https://api.strike.me/v1/invoices");
        assert_eq!(join_url("http://x", "a/b"), "http://x/a/b");
    }

    #[test]
    fn status_error_maps_not_found() {
        let err = status_error("Strike", "invoice status", StatusCode::NOT_FOUND, "");
        assert!(matches!(err, AppError::NotFound(_)));

        let err = status_error("Strike", "invoice status", StatusCode::BAD_GATEWAY, "boom");
        assert!(matches!(err, AppError::ExternalAPI(msg) if msg.contains("boom")));
    }
}
