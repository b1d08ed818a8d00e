use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::{
    error::Result,
    models::{ApiResponse, Invoice, InvoiceState, MerchItem, OrderItem, Quote, SubscriptionPlan},
    services::subscription_service::{MerchQuote, WatchStatus, WatchTicket},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub plan_id: String,
    pub user_email: String,
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub watch: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionResponse {
    pub invoice: Invoice,
    pub watch: Option<WatchTicket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchQuoteRequest {
    pub items: Vec<OrderItem>,
    pub user_email: String,
}

#[derive(Debug, Deserialize)]
pub struct SandboxStateRequest {
    pub state: InvoiceState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchCancelled {
    pub invoice_id: String,
    pub cancelled: bool,
}

pub async fn get_plans(State(state): State<AppState>) -> Json<ApiResponse<Vec<SubscriptionPlan>>> {
    Json(ApiResponse::success(state.subscriptions.plans()))
}

pub async fn get_merch(State(state): State<AppState>) -> Json<ApiResponse<Vec<MerchItem>>> {
    Json(ApiResponse::success(state.subscriptions.merch_catalog()))
}

/// POST /api/strike/subscription/create
pub async fn create_subscription(
    State(state): State<AppState>,
    Json(req): Json<CreateSubscriptionRequest>,
) -> Result<Json<ApiResponse<CreateSubscriptionResponse>>> {
    let invoice = state
        .subscriptions
        .create_subscription_invoice(&req.plan_id, &req.user_email, req.correlation_id)
        .await?;

    // the invoice already exists, so a failed watch must not hide its id
    let watch = if req.watch {
        match state.subscriptions.watch_invoice(&invoice.invoice_id).await {
            Ok(ticket) => Some(ticket),
            Err(err) => {
                tracing::warn!(
                    invoice_id = %invoice.invoice_id,
                    error = %err,
                    "invoice created but watch could not start"
                );
                None
            }
        }
    } else {
        None
    };

    Ok(Json(ApiResponse::success(CreateSubscriptionResponse { invoice, watch })))
}

pub async fn invoice_status(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<ApiResponse<Invoice>>> {
    let invoice = state.subscriptions.invoice_status(&invoice_id).await?;
    Ok(Json(ApiResponse::success(invoice)))
}

pub async fn quote_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<ApiResponse<Quote>>> {
    let quote = state.subscriptions.quote_invoice(&invoice_id).await?;
    Ok(Json(ApiResponse::success(quote)))
}

pub async fn start_watch(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<ApiResponse<WatchTicket>>> {
    let ticket = state.subscriptions.watch_invoice(&invoice_id).await?;
    Ok(Json(ApiResponse::success(ticket)))
}

pub async fn watch_status(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<ApiResponse<WatchStatus>>> {
    let status = state.subscriptions.watch_status(&invoice_id).await?;
    Ok(Json(ApiResponse::success(status)))
}

pub async fn cancel_watch(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<Json<ApiResponse<WatchCancelled>>> {
    state.subscriptions.cancel_watch(&invoice_id).await?;
    Ok(Json(ApiResponse::success(WatchCancelled {
        invoice_id,
        cancelled: true,
    })))
}

/// POST /api/strike/merch/quote
pub async fn merch_quote(
    State(state): State<AppState>,
    Json(req): Json<MerchQuoteRequest>,
) -> Result<Json<ApiResponse<MerchQuote>>> {
    let quote = state
        .subscriptions
        .create_merch_quote(&req.items, &req.user_email)
        .await?;
    Ok(Json(ApiResponse::success(quote)))
}

/// Development helper: lets a tester play the payer against the sandbox.
pub async fn set_sandbox_state(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    Json(req): Json<SandboxStateRequest>,
) -> Result<Json<ApiResponse<Invoice>>> {
    let invoice = state
        .subscriptions
        .set_sandbox_state(&invoice_id, req.state)
        .await?;
    Ok(Json(ApiResponse::success(invoice)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::test_state,
        error::AppError,
        integrations::{
            lightning::{InvoiceGateway, InvoiceIssuer, InvoiceRequest, InvoiceStatusSource},
            SandboxGateway,
        },
        services::{PollConfig, SubscriptionService},
    };
    use async_trait::async_trait;
    use std::sync::Arc;

    fn subscription_request(watch: bool) -> CreateSubscriptionRequest {
        serde_json::from_value(serde_json::json!({
            "planId": "premium",
            "userEmail": "player@example.com",
            "watch": watch
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn subscription_invoice_can_be_paid_in_sandbox() {
        let state = test_state();
        let Json(created) = create_subscription(State(state.clone()), Json(subscription_request(false)))
            .await
            .unwrap();
        assert!(created.data.watch.is_none());
        let invoice_id = created.data.invoice.invoice_id.clone();

        let Json(quote) = quote_invoice(State(state.clone()), Path(invoice_id.clone()))
            .await
            .unwrap();
        assert!(quote.success);

        set_sandbox_state(
            State(state.clone()),
            Path(invoice_id.clone()),
            Json(SandboxStateRequest {
                state: InvoiceState::Paid,
            }),
        )
        .await
        .unwrap();

        let Json(status) = invoice_status(State(state.clone()), Path(invoice_id.clone()))
            .await
            .unwrap();
        assert_eq!(status.data.state, InvoiceState::Paid);

        let err = quote_invoice(State(state), Path(invoice_id)).await.unwrap_err();
        assert!(matches!(err, AppError::InvoiceNotPayable(_)));
    }

    #[tokio::test]
    async fn create_with_watch_starts_and_cancels_poll() {
        let state = test_state();
        let Json(created) = create_subscription(State(state.clone()), Json(subscription_request(true)))
            .await
            .unwrap();
        let ticket = created.data.watch.expect("watch started");
        assert_eq!(ticket.max_attempts, 60);

        let err = start_watch(State(state.clone()), Path(ticket.invoice_id.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let Json(cancelled) = cancel_watch(State(state.clone()), Path(ticket.invoice_id.clone()))
            .await
            .unwrap();
        assert!(cancelled.data.cancelled);
        state.subscriptions.shutdown().await;
    }

    /// Issues invoices through the sandbox but never finds them again.
    struct ForgetfulGateway(SandboxGateway);

    #[async_trait]
    impl InvoiceIssuer for ForgetfulGateway {
        async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice> {
            self.0.create_invoice(request).await
        }

        async fn quote_invoice(&self, invoice_id: &str) -> Result<Quote> {
            self.0.quote_invoice(invoice_id).await
        }
    }

    #[async_trait]
    impl InvoiceStatusSource for ForgetfulGateway {
        async fn fetch_status(&self, invoice_id: &str) -> Result<Invoice> {
            Err(AppError::NotFound(format!("Invoice {} not found", invoice_id)))
        }
    }

    impl InvoiceGateway for ForgetfulGateway {
        fn name(&self) -> &'static str {
            "forgetful"
        }
    }

    #[tokio::test]
    async fn created_invoice_is_returned_when_watch_fails() {
        let gateway = Arc::new(ForgetfulGateway(SandboxGateway::new()));
        let state = AppState {
            subscriptions: Arc::new(SubscriptionService::new(gateway, PollConfig::default())),
            ..test_state()
        };

        let Json(created) = create_subscription(State(state.clone()), Json(subscription_request(true)))
            .await
            .unwrap();

        assert!(!created.data.invoice.invoice_id.is_empty());
        assert!(created.data.watch.is_none());
        assert_eq!(state.subscriptions.active_watch_count().await, 0);
    }

    #[tokio::test]
    async fn plans_and_merch_are_listed() {
        let state = test_state();
        let Json(plans) = get_plans(State(state.clone())).await;
        assert!(plans.data.iter().any(|p| p.id == "premium"));
        let Json(merch) = get_merch(State(state)).await;
        assert!(!merch.data.is_empty());
    }
}
