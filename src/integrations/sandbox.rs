use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::lightning::{InvoiceGateway, InvoiceIssuer, InvoiceRequest, InvoiceStatusSource};
use crate::{
    error::{AppError, Result},
    models::{ConversionRate, Invoice, InvoiceState, Quote},
    utils::random_hex,
};

/// In-memory invoice issuer used when no Strike credentials are configured.
///
/// Invoices start `UNPAID` and only move forward; the development routes call
/// [`SandboxGateway::set_state`] to simulate a payer.
#[derive(Default)]
pub struct SandboxGateway {
    invoices: RwLock<HashMap<String, Invoice>>,
}

impl SandboxGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_state(&self, invoice_id: &str, next: InvoiceState) -> Result<Invoice> {
        let mut invoices = self.invoices.write().await;
        let invoice = invoices
            .get_mut(invoice_id)
            .ok_or_else(|| AppError::NotFound(format!("Invoice {} not found", invoice_id)))?;

        if !invoice.state.can_transition_to(&next) {
            return Err(AppError::Conflict(format!(
                "Invoice {} cannot move from {} to {}",
                invoice_id, invoice.state, next
            )));
        }

        tracing::info!(invoice_id, from = %invoice.state, to = %next, "sandbox invoice state changed");
        invoice.state = next;
        Ok(invoice.clone())
    }
}

#[async_trait]
impl InvoiceIssuer for SandboxGateway {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice> {
        let invoice = Invoice {
            invoice_id: format!("sandbox_inv_{}", random_hex(8)),
            amount: request.amount.clone(),
            state: InvoiceState::Unpaid,
            description: request.description.clone(),
            issuer_id: Some("sandbox_issuer".to_string()),
            receiver_id: Some("sandbox_receiver".to_string()),
            created_at: Utc::now(),
            correlation_id: Some(request.correlation_id.clone()),
        };

        self.invoices
            .write()
            .await
            .insert(invoice.invoice_id.clone(), invoice.clone());
        tracing::debug!(invoice_id = %invoice.invoice_id, "sandbox invoice created");
        Ok(invoice)
    }

    async fn quote_invoice(&self, invoice_id: &str) -> Result<Quote> {
        let invoice = self.fetch_status(invoice_id).await?;
        let expires_in = 15 * 60;
        Ok(Quote {
            quote_id: format!("sandbox_quote_{}", random_hex(8)),
            description: invoice.description.clone(),
            ln_invoice: format!("lnbcrt{}", random_hex(32)),
            onchain_address: None,
            expiration: Utc::now() + ChronoDuration::seconds(expires_in),
            expiration_in_sec: Some(expires_in as u64),
            source_amount: invoice.amount.clone(),
            target_amount: invoice.amount,
            conversion_rate: ConversionRate {
                amount: "1.0".to_string(),
                source_currency: "USD".to_string(),
                target_currency: "BTC".to_string(),
            },
        })
    }
}

#[async_trait]
impl InvoiceStatusSource for SandboxGateway {
    async fn fetch_status(&self, invoice_id: &str) -> Result<Invoice> {
        self.invoices
            .read()
            .await
            .get(invoice_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Invoice {} not found", invoice_id)))
    }
}

impl InvoiceGateway for SandboxGateway {
    fn name(&self) -> &'static str {
        "sandbox"
    }

    fn as_sandbox(&self) -> Option<&SandboxGateway> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Money;
    use rust_decimal::Decimal;

    fn request() -> InvoiceRequest {
        InvoiceRequest {
            correlation_id: "sub_1".to_string(),
            description: "CryptoQuest Basic Hero Subscription".to_string(),
            amount: Money::new(Decimal::new(999, 2), "USD"),
        }
    }

    #[tokio::test]
    async fn created_invoice_starts_unpaid() {
        let gateway = SandboxGateway::new();
        let invoice = gateway.create_invoice(&request()).await.unwrap();
        assert!(invoice.invoice_id.starts_with("sandbox_inv_"));

        let fetched = gateway.fetch_status(&invoice.invoice_id).await.unwrap();
        assert_eq!(fetched.state, InvoiceState::Unpaid);
        assert_eq!(fetched.amount, invoice.amount);
    }

    #[tokio::test]
    async fn terminal_state_cannot_change() {
        let gateway = SandboxGateway::new();
        let invoice = gateway.create_invoice(&request()).await.unwrap();

        gateway
            .set_state(&invoice.invoice_id, InvoiceState::Paid)
            .await
            .unwrap();
        let err = gateway
            .set_state(&invoice.invoice_id, InvoiceState::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn unknown_invoice_is_not_found() {
        let gateway = SandboxGateway::new();
        let err = gateway.fetch_status("inv_missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
