use axum::{extract::State, Json};
use serde::Serialize;

use super::AppState;
use crate::integrations::llm::ProviderKind;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub invoice_gateway: String,
    pub active_watches: usize,
    pub ai_providers: Vec<ProviderKind>,
    pub stripe: bool,
    pub coinbase: bool,
    pub moralis: bool,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        invoice_gateway: state.subscriptions.gateway_name().to_string(),
        active_watches: state.subscriptions.active_watch_count().await,
        ai_providers: state.chat.configured(),
        stripe: state.stripe.is_some(),
        coinbase: state.coinbase.is_some(),
        moralis: state.moralis.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_state;

    #[tokio::test]
    async fn reports_sandbox_gateway_without_credentials() {
        let Json(health) = health_check(State(test_state())).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.invoice_gateway, "sandbox");
        assert!(health.ai_providers.is_empty());
        assert!(!health.stripe);
    }
}
