use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::http::{build_client, join_url, read_json};
use crate::{
    constants::HTTP_REQUEST_TIMEOUT_SECS,
    error::{AppError, Result},
    models::{
        catalog::{order_total, to_cents},
        OrderItem, SubscriptionPlan,
    },
    utils::{validate_email, validate_path_id},
};

const VENDOR: &str = "Stripe";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StripeSubscription {
    pub subscription_id: String,
    pub customer_id: String,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
    pub plan_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StripePaymentIntent {
    pub payment_intent_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub client_secret: Option<String>,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct CustomerList {
    data: Vec<CustomerObject>,
}

#[derive(Debug, Deserialize)]
struct CustomerObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    customer: serde_json::Value,
    status: String,
    current_period_end: Option<i64>,
    #[serde(default)]
    metadata: HashMap<String, String>,
    latest_invoice: Option<serde_json::Value>,
}

impl SubscriptionObject {
    fn customer_id(&self) -> String {
        // `customer` is an id unless the request expanded it
        match &self.customer {
            serde_json::Value::String(id) => id.clone(),
            other => other
                .get("id")
                .and_then(|id| id.as_str())
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn client_secret(&self) -> Option<String> {
        self.latest_invoice
            .as_ref()?
            .pointer("/payment_intent/client_secret")?
            .as_str()
            .map(str::to_string)
    }

    fn into_subscription(self, plan_id: Option<&str>) -> StripeSubscription {
        let customer_id = self.customer_id();
        let client_secret = self.client_secret();
        let plan_id = plan_id
            .map(str::to_string)
            .or_else(|| self.metadata.get("planId").cloned())
            .unwrap_or_else(|| "unknown".to_string());
        StripeSubscription {
            subscription_id: self.id,
            customer_id,
            status: self.status,
            current_period_end: self
                .current_period_end
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            plan_id,
            client_secret,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PaymentIntentObject {
    id: String,
    amount: i64,
    currency: String,
    status: String,
    client_secret: Option<String>,
    description: Option<String>,
}

impl From<PaymentIntentObject> for StripePaymentIntent {
    fn from(intent: PaymentIntentObject) -> Self {
        StripePaymentIntent {
            payment_intent_id: intent.id,
            amount: Decimal::new(intent.amount, 2),
            currency: intent.currency,
            status: intent.status,
            client_secret: intent.client_secret,
            description: intent.description.unwrap_or_default(),
        }
    }
}

/// Stripe REST client. Requests are form-encoded, authenticated with the
/// secret key.
#[derive(Debug, Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_url: String,
}

impl StripeClient {
    pub fn new(secret_key: String, api_url: String) -> Result<Self> {
        let http = build_client(VENDOR, Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))?;
        Ok(Self {
            http,
            secret_key,
            api_url,
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.api_url, path)
    }

    pub async fn create_subscription(
        &self,
        plan_id: &str,
        user_email: &str,
    ) -> Result<StripeSubscription> {
        let plan = SubscriptionPlan::find(plan_id)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid subscription plan: {}", plan_id)))?;
        let user_email = validate_email(user_email)?;

        let customer_id = self.find_or_create_customer(user_email).await?;

        let params: Vec<(&str, String)> = vec![
            ("customer", customer_id.clone()),
            ("items[0][price_data][currency]", plan.currency.to_string()),
            ("items[0][price_data][product_data][name]", plan.name.to_string()),
            (
                "items[0][price_data][product_data][description]",
                plan.description.to_string(),
            ),
            (
                "items[0][price_data][unit_amount]",
                plan.unit_amount_cents().to_string(),
            ),
            (
                "items[0][price_data][recurring][interval]",
                plan.interval.stripe_interval().to_string(),
            ),
            ("payment_behavior", "default_incomplete".to_string()),
            ("expand[]", "latest_invoice.payment_intent".to_string()),
            ("metadata[planId]", plan.id.to_string()),
        ];

        let response = self
            .http
            .post(self.url("/subscriptions"))
            .bearer_auth(self.secret_key.trim())
            .form(&params)
            .send()
            .await?;
        let subscription: SubscriptionObject =
            read_json(VENDOR, "create subscription", response).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            customer_id = %customer_id,
            plan_id = plan.id,
            "Stripe subscription created"
        );
        Ok(subscription.into_subscription(Some(plan.id)))
    }

    async fn find_or_create_customer(&self, email: &str) -> Result<String> {
        let response = self
            .http
            .get(self.url("/customers"))
            .bearer_auth(self.secret_key.trim())
            .query(&[("email", email), ("limit", "1")])
            .send()
            .await?;
        let existing: CustomerList = read_json(VENDOR, "list customers", response).await?;
        if let Some(customer) = existing.data.into_iter().next() {
            return Ok(customer.id);
        }

        let name = email.split('@').next().unwrap_or(email);
        let response = self
            .http
            .post(self.url("/customers"))
            .bearer_auth(self.secret_key.trim())
            .form(&[("email", email), ("name", name)])
            .send()
            .await?;
        let customer: CustomerObject = read_json(VENDOR, "create customer", response).await?;
        tracing::debug!(customer_id = %customer.id, "Stripe customer created");
        Ok(customer.id)
    }

    pub async fn create_payment_intent(
        &self,
        items: &[OrderItem],
        user_email: &str,
    ) -> Result<StripePaymentIntent> {
        let user_email = validate_email(user_email)?;
        let total = order_total(items)?;
        let items_json = serde_json::to_string(items)?;
        let description = format!("CryptoQuest Merchandise Order - {} items", items.len());

        let params: Vec<(&str, String)> = vec![
            ("amount", to_cents(total).to_string()),
            ("currency", "usd".to_string()),
            ("description", description),
            ("metadata[userEmail]", user_email.to_string()),
            ("metadata[items]", items_json),
        ];

        let response = self
            .http
            .post(self.url("/payment_intents"))
            .bearer_auth(self.secret_key.trim())
            .form(&params)
            .send()
            .await?;
        let intent: PaymentIntentObject =
            read_json(VENDOR, "create payment intent", response).await?;

        tracing::info!(payment_intent_id = %intent.id, amount = intent.amount, "Stripe payment intent created");
        Ok(intent.into())
    }

    pub async fn subscription_status(&self, subscription_id: &str) -> Result<StripeSubscription> {
        let subscription_id = validate_path_id(subscription_id, "subscriptionId")?;
        let response = self
            .http
            .get(self.url(&format!("/subscriptions/{}", subscription_id)))
            .bearer_auth(self.secret_key.trim())
            .send()
            .await?;
        let subscription: SubscriptionObject =
            read_json(VENDOR, "subscription status", response).await?;
        Ok(subscription.into_subscription(None))
    }

    pub async fn payment_intent_status(&self, payment_intent_id: &str) -> Result<StripePaymentIntent> {
        let payment_intent_id = validate_path_id(payment_intent_id, "paymentIntentId")?;
        let response = self
            .http
            .get(self.url(&format!("/payment_intents/{}", payment_intent_id)))
            .bearer_auth(self.secret_key.trim())
            .send()
            .await?;
        let intent: PaymentIntentObject =
            read_json(VENDOR, "payment intent status", response).await?;
        Ok(intent.into())
    }
}
