use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use super::AppState;
use crate::{
    error::Result,
    integrations::stripe::{StripePaymentIntent, StripeSubscription},
    models::{ApiResponse, OrderItem},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeSubscriptionRequest {
    pub plan_id: String,
    pub user_email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    pub items: Vec<OrderItem>,
    pub user_email: String,
}

pub async fn create_subscription(
    State(state): State<AppState>,
    Json(req): Json<StripeSubscriptionRequest>,
) -> Result<Json<ApiResponse<StripeSubscription>>> {
    let subscription = state
        .stripe()?
        .create_subscription(&req.plan_id, &req.user_email)
        .await?;
    Ok(Json(ApiResponse::success(subscription)))
}

pub async fn subscription_status(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> Result<Json<ApiResponse<StripeSubscription>>> {
    let subscription = state.stripe()?.subscription_status(&subscription_id).await?;
    Ok(Json(ApiResponse::success(subscription)))
}

pub async fn create_payment_intent(
    State(state): State<AppState>,
    Json(req): Json<PaymentIntentRequest>,
) -> Result<Json<ApiResponse<StripePaymentIntent>>> {
    let intent = state
        .stripe()?
        .create_payment_intent(&req.items, &req.user_email)
        .await?;
    Ok(Json(ApiResponse::success(intent)))
}

pub async fn payment_intent_status(
    State(state): State<AppState>,
    Path(payment_intent_id): Path<String>,
) -> Result<Json<ApiResponse<StripePaymentIntent>>> {
    let intent = state.stripe()?.payment_intent_status(&payment_intent_id).await?;
    Ok(Json(ApiResponse::success(intent)))
}
