use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::Value;

use super::AppState;
use crate::{
    error::Result,
    models::ApiResponse,
    services::agent_service::{
        AgentAction, AgentActionKind, AgentOverview, PaymasterConfig, PaymasterUpdate,
        SuperPayRequest, SuperPayTransaction,
    },
};

#[derive(Debug, Deserialize)]
pub struct ExecuteActionRequest {
    #[serde(alias = "type")]
    pub action: String,
    #[serde(default)]
    pub params: Value,
}

pub async fn overview(State(state): State<AppState>) -> Json<ApiResponse<AgentOverview>> {
    Json(ApiResponse::success(state.agent.overview().await))
}

/// POST /api/agentkit
///
/// Vendor failures are reported inside the returned action (`status: failed`);
/// only an unknown action type is rejected outright.
pub async fn execute_action(
    State(state): State<AppState>,
    Json(req): Json<ExecuteActionRequest>,
) -> Result<Json<ApiResponse<AgentAction>>> {
    let kind: AgentActionKind = req.action.parse()?;
    let action = state.agent.execute_action(kind, req.params).await?;
    Ok(Json(ApiResponse::success(action)))
}

pub async fn superpay(
    State(state): State<AppState>,
    Json(req): Json<SuperPayRequest>,
) -> Result<Json<ApiResponse<SuperPayTransaction>>> {
    let transaction = state.agent.create_superpay_transaction(req).await?;
    Ok(Json(ApiResponse::success(transaction)))
}

pub async fn update_paymaster(
    State(state): State<AppState>,
    Json(req): Json<PaymasterUpdate>,
) -> Result<Json<ApiResponse<PaymasterConfig>>> {
    let paymaster = state.agent.update_paymaster(req).await?;
    Ok(Json(ApiResponse::success(paymaster)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::test_state, error::AppError, services::agent_service::ActionStatus};
    use serde_json::json;

    #[tokio::test]
    async fn accepts_type_alias_and_records_action() {
        let state = test_state();
        let req: ExecuteActionRequest = serde_json::from_value(json!({
            "type": "trade",
            "params": {"fromAsset": "ETH", "toAsset": "USDC", "amount": "1"}
        }))
        .unwrap();

        let Json(reply) = execute_action(State(state.clone()), Json(req)).await.unwrap();
        assert_eq!(reply.data.status, ActionStatus::Completed);

        let Json(overview) = overview(State(state)).await;
        assert_eq!(overview.data.recent_actions.len(), 1);
        assert_eq!(overview.data.recent_actions[0].id, reply.data.id);
    }

    #[tokio::test]
    async fn unknown_action_is_bad_request() {
        let req = ExecuteActionRequest {
            action: "mint".into(),
            params: Value::Null,
        };
        let err = execute_action(State(test_state()), Json(req)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn superpay_body_uses_camel_case() {
        let req: SuperPayRequest = serde_json::from_value(json!({
            "to": "0xabc",
            "amount": 250.0,
            "currency": "usdc",
            "gasless": true
        }))
        .unwrap();
        let Json(reply) = superpay(State(test_state()), Json(req)).await.unwrap();
        assert!(reply.data.gasless);
        assert!(reply.data.id.starts_with("spay_"));
    }
}
