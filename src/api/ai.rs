use axum::{extract::State, Json};
use serde::Deserialize;

use super::AppState;
use crate::{
    error::Result,
    integrations::llm::{ChatCompletion, ChatRequest, ProviderKind},
    models::ApiResponse,
    services::ai_service::{
        Analysis, ContractAnalysis, ContractAnalysisInput, GamingStrategy, GamingStrategyInput,
        InvestmentAnalysis, InvestmentAnalysisInput, MarketInsights, MarketInsightsInput,
    },
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub message: String,
    pub system: Option<String>,
    pub max_tokens: Option<u32>,
}

/// POST /api/ai/chat
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatBody>,
) -> Result<Json<ApiResponse<ChatCompletion>>> {
    let provider = req
        .provider
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::parse::<ProviderKind>)
        .transpose()?;

    let mut request = ChatRequest::user(req.message).with_model(req.model);
    if let Some(system) = req.system.filter(|s| !s.trim().is_empty()) {
        request = request.with_system(system);
    }
    if let Some(max_tokens) = req.max_tokens {
        request = request.with_max_tokens(max_tokens);
    }

    let completion = state.chat.complete(provider, &request).await?;
    Ok(Json(ApiResponse::success(completion)))
}

pub async fn contract_analysis(
    State(state): State<AppState>,
    Json(req): Json<ContractAnalysisInput>,
) -> Result<Json<ApiResponse<Analysis<ContractAnalysis>>>> {
    let analysis = state.ai.analyze_smart_contract(&req).await?;
    Ok(Json(ApiResponse::success(analysis)))
}

pub async fn market_insights(
    State(state): State<AppState>,
    Json(req): Json<MarketInsightsInput>,
) -> Result<Json<ApiResponse<Analysis<MarketInsights>>>> {
    let analysis = state.ai.market_insights(&req).await?;
    Ok(Json(ApiResponse::success(analysis)))
}

pub async fn gaming_strategy(
    State(state): State<AppState>,
    Json(req): Json<GamingStrategyInput>,
) -> Result<Json<ApiResponse<Analysis<GamingStrategy>>>> {
    let analysis = state.ai.gaming_strategy(&req).await?;
    Ok(Json(ApiResponse::success(analysis)))
}

pub async fn investment_analysis(
    State(state): State<AppState>,
    Json(req): Json<InvestmentAnalysisInput>,
) -> Result<Json<ApiResponse<Analysis<InvestmentAnalysis>>>> {
    let analysis = state.ai.investment_analysis(&req).await?;
    Ok(Json(ApiResponse::success(analysis)))
}
