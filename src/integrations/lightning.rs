use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    models::{Invoice, Money, Quote},
};

/// Body of an invoice creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRequest {
    pub correlation_id: String,
    pub description: String,
    pub amount: Money,
}

/// Creates invoices and Lightning quotes for them.
#[async_trait]
pub trait InvoiceIssuer: Send + Sync {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice>;
    async fn quote_invoice(&self, invoice_id: &str) -> Result<Quote>;
}

/// Reports the current settlement state of an invoice.
#[async_trait]
pub trait InvoiceStatusSource: Send + Sync {
    async fn fetch_status(&self, invoice_id: &str) -> Result<Invoice>;
}

pub trait InvoiceGateway: InvoiceIssuer + InvoiceStatusSource {
    fn name(&self) -> &'static str;

    fn as_sandbox(&self) -> Option<&super::sandbox::SandboxGateway> {
        None
    }
}
