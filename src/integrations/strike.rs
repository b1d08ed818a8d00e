use async_trait::async_trait;
use std::time::Duration;

use super::{
    http::{build_client, join_url, read_json},
    lightning::{InvoiceGateway, InvoiceIssuer, InvoiceRequest, InvoiceStatusSource},
};
use crate::{
    constants::HTTP_REQUEST_TIMEOUT_SECS,
    error::Result,
    models::{Invoice, Quote},
    utils::validate_path_id,
};

const VENDOR: &str = "Strike";

/// Strike REST client (`/v1/invoices`).
#[derive(Debug, Clone)]
pub struct StrikeClient {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
}

impl StrikeClient {
    pub fn new(api_key: String, api_url: String) -> Result<Self> {
        let http = build_client(VENDOR, Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))?;
        Ok(Self {
            http,
            api_key,
            api_url,
        })
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.api_url, path)
    }
}

#[async_trait]
impl InvoiceIssuer for StrikeClient {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice> {
        tracing::debug!(
            correlation_id = %request.correlation_id,
            amount = %request.amount,
            "creating Strike invoice"
        );
        let response = self
            .http
            .post(self.url("/invoices"))
            .bearer_auth(self.api_key.trim())
            .json(request)
            .send()
            .await?;
        let invoice: Invoice = read_json(VENDOR, "create invoice", response).await?;
        tracing::info!(invoice_id = %invoice.invoice_id, state = %invoice.state, "Strike invoice created");
        Ok(invoice)
    }

    async fn quote_invoice(&self, invoice_id: &str) -> Result<Quote> {
        let invoice_id = validate_path_id(invoice_id, "invoiceId")?;
        let response = self
            .http
            .post(self.url(&format!("/invoices/{}/quote", invoice_id)))
            .bearer_auth(self.api_key.trim())
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await?;
        read_json(VENDOR, "quote invoice", response).await
    }
}

#[async_trait]
impl InvoiceStatusSource for StrikeClient {
    async fn fetch_status(&self, invoice_id: &str) -> Result<Invoice> {
        let invoice_id = validate_path_id(invoice_id, "invoiceId")?;
        let response = self
            .http
            .get(self.url(&format!("/invoices/{}", invoice_id)))
            .bearer_auth(self.api_key.trim())
            .send()
            .await?;
        read_json(VENDOR, "invoice status", response).await
    }
}

impl InvoiceGateway for StrikeClient {
    fn name(&self) -> &'static str {
        "strike"
    }
}
