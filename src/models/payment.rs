use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Settlement state of a Lightning invoice.
///
/// Values outside the four documented states are kept verbatim in `Other` so
/// that they can be logged; they are never terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InvoiceState {
    Unpaid,
    Pending,
    Paid,
    Cancelled,
    Other(String),
}

impl InvoiceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceState::Paid | InvoiceState::Cancelled)
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, InvoiceState::Other(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            InvoiceState::Unpaid => "UNPAID",
            InvoiceState::Pending => "PENDING",
            InvoiceState::Paid => "PAID",
            InvoiceState::Cancelled => "CANCELLED",
            InvoiceState::Other(raw) => raw.as_str(),
        }
    }

    /// Whether an invoice in `self` may move to `next`.
    pub fn can_transition_to(&self, next: &InvoiceState) -> bool {
        if self == next {
            return true;
        }
        match self {
            InvoiceState::Paid | InvoiceState::Cancelled => false,
            InvoiceState::Unpaid => true,
            InvoiceState::Pending => !matches!(next, InvoiceState::Unpaid),
            InvoiceState::Other(_) => true,
        }
    }
}

impl From<String> for InvoiceState {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "UNPAID" => InvoiceState::Unpaid,
            "PENDING" => InvoiceState::Pending,
            "PAID" => InvoiceState::Paid,
            "CANCELLED" | "CANCELED" => InvoiceState::Cancelled,
            _ => InvoiceState::Other(raw),
        }
    }
}

impl From<InvoiceState> for String {
    fn from(state: InvoiceState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for InvoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self {
        Self {
            amount,
            currency: currency.to_ascii_uppercase(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// Strike invoice as returned by `GET /invoices/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub invoice_id: String,
    pub amount: Money,
    pub state: InvoiceState,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub issuer_id: Option<String>,
    #[serde(default)]
    pub receiver_id: Option<String>,
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRate {
    pub amount: String,
    pub source_currency: String,
    pub target_currency: String,
}

/// Lightning quote issued for an unpaid invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub quote_id: String,
    #[serde(default)]
    pub description: String,
    pub ln_invoice: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onchain_address: Option<String>,
    pub expiration: DateTime<Utc>,
    #[serde(default)]
    pub expiration_in_sec: Option<u64>,
    pub source_amount: Money,
    pub target_amount: Money,
    pub conversion_rate: ConversionRate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn invoice_parses_strike_payload() {
        let raw = serde_json::json!({
            "invoiceId": "inv_abc123",
            "amount": {"amount": "9.99", "currency": "USD"},
            "state": "PENDING",
            "description": "CryptoQuest Basic Hero Subscription",
            "issuerId": "issuer",
            "receiverId": "receiver",
            "created": "2024-01-01T00:00:00Z",
            "correlationId": "sub_1"
        });
        let invoice: Invoice = serde_json::from_value(raw).expect("invoice");
        assert_eq!(invoice.invoice_id, "inv_abc123");
        assert_eq!(invoice.amount.amount, Decimal::from_str("9.99").unwrap());
        assert_eq!(invoice.state, InvoiceState::Pending);
        assert_eq!(invoice.correlation_id.as_deref(), Some("sub_1"));
    }

    #[test]
    fn unknown_state_is_preserved_and_transient() {
        let state = InvoiceState::from("EXPIRED_SOON".to_string());
        assert_eq!(state, InvoiceState::Other("EXPIRED_SOON".to_string()));
        assert!(!state.is_terminal());
        assert!(!state.is_recognized());
        assert_eq!(String::from(state), "EXPIRED_SOON");
    }

    #[test]
    fn terminal_states_are_immutable() {
        assert!(InvoiceState::Unpaid.can_transition_to(&InvoiceState::Paid));
        assert!(InvoiceState::Pending.can_transition_to(&InvoiceState::Cancelled));
        assert!(!InvoiceState::Pending.can_transition_to(&InvoiceState::Unpaid));
        assert!(!InvoiceState::Paid.can_transition_to(&InvoiceState::Cancelled));
        assert!(!InvoiceState::Cancelled.can_transition_to(&InvoiceState::Pending));
    }

    #[test]
    fn money_serializes_amount_as_string() {
        let money = Money::new(Decimal::from_str("19.99").unwrap(), "usd");
        let json = serde_json::to_value(&money).expect("money");
        assert_eq!(json, serde_json::json!({"amount": "19.99", "currency": "USD"}));
    }
}
