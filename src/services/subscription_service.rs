use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::invoice_poller::{AttemptResult, InvoicePoller, PollConfig, PollObserver, PollOutcome};
use crate::{
    constants::{FINISHED_WATCH_RETENTION_SECS, MAX_FINISHED_WATCHES, POLL_EVENT_CHANNEL_CAPACITY},
    error::{AppError, Result},
    integrations::lightning::{InvoiceGateway, InvoiceRequest},
    models::{
        catalog::order_total, Invoice, InvoiceState, MerchItem, Money, OrderItem, Quote,
        SubscriptionPlan,
    },
    utils::{validate_email, validate_path_id},
};

/// Progress of invoice watches, fanned out to WebSocket subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PaymentEvent {
    WatchStarted {
        invoice_id: String,
        max_attempts: u32,
        interval_secs: u64,
    },
    Attempt {
        invoice_id: String,
        attempt: u32,
        max_attempts: u32,
        state: Option<InvoiceState>,
        error: Option<String>,
    },
    Finished {
        invoice_id: String,
        success: bool,
        reason: Option<String>,
        outcome: PollOutcome,
    },
}

impl PaymentEvent {
    pub fn invoice_id(&self) -> &str {
        match self {
            PaymentEvent::WatchStarted { invoice_id, .. }
            | PaymentEvent::Attempt { invoice_id, .. }
            | PaymentEvent::Finished { invoice_id, .. } => invoice_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchTicket {
    pub invoice_id: String,
    pub max_attempts: u32,
    pub interval_secs: u64,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum WatchStatus {
    Active {
        invoice_id: String,
        started_at: DateTime<Utc>,
    },
    Finished {
        invoice_id: String,
        finished_at: DateTime<Utc>,
        outcome: PollOutcome,
    },
    Unknown {
        invoice_id: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchQuote {
    pub invoice: Invoice,
    pub quote: Quote,
    pub total: Money,
}

enum WatchEntry {
    Active {
        cancel: CancellationToken,
        started_at: DateTime<Utc>,
        task: Option<JoinHandle<()>>,
    },
    Finished {
        outcome: PollOutcome,
        finished_at: DateTime<Utc>,
    },
}

/// Keeps finished outcomes for lookup without letting the registry grow:
/// entries past `retention` go first, then the oldest beyond `max_finished`.
#[derive(Debug, Clone, Copy)]
struct FinishedRetention {
    retention: chrono::Duration,
    max_finished: usize,
}

impl Default for FinishedRetention {
    fn default() -> Self {
        Self {
            retention: chrono::Duration::seconds(FINISHED_WATCH_RETENTION_SECS),
            max_finished: MAX_FINISHED_WATCHES,
        }
    }
}

impl FinishedRetention {
    fn prune(&self, watches: &mut HashMap<String, WatchEntry>, now: DateTime<Utc>) {
        let cutoff = now - self.retention;
        watches.retain(|_, entry| {
            !matches!(entry, WatchEntry::Finished { finished_at, .. } if *finished_at < cutoff)
        });

        let mut finished: Vec<(DateTime<Utc>, String)> = watches
            .iter()
            .filter_map(|(id, entry)| match entry {
                WatchEntry::Finished { finished_at, .. } => Some((*finished_at, id.clone())),
                WatchEntry::Active { .. } => None,
            })
            .collect();
        if finished.len() <= self.max_finished {
            return;
        }
        finished.sort();
        let excess = finished.len() - self.max_finished;
        for (_, id) in finished.into_iter().take(excess) {
            watches.remove(&id);
        }
    }
}

struct EventObserver {
    events: broadcast::Sender<PaymentEvent>,
    max_attempts: u32,
}

impl PollObserver for EventObserver {
    fn on_attempt(&self, invoice_id: &str, attempt: u32, result: AttemptResult<'_>) {
        let (state, error) = match result {
            AttemptResult::Observed(invoice) => (Some(invoice.state.clone()), None),
            AttemptResult::Failed(err) => (None, Some(err.public_message())),
        };
        let _ = self.events.send(PaymentEvent::Attempt {
            invoice_id: invoice_id.to_string(),
            attempt,
            max_attempts: self.max_attempts,
            state,
            error,
        });
    }

    fn on_outcome(&self, outcome: &PollOutcome) {
        let _ = self.events.send(PaymentEvent::Finished {
            invoice_id: outcome.invoice_id().to_string(),
            success: outcome.is_success(),
            reason: outcome.failure_reason().map(str::to_string),
            outcome: outcome.clone(),
        });
    }
}

/// Lightning subscription and merch checkout.
///
/// Issues invoices through the configured gateway and watches them until they
/// settle. At most one watch runs per invoice id.
pub struct SubscriptionService {
    gateway: Arc<dyn InvoiceGateway>,
    poller: InvoicePoller<dyn InvoiceGateway>,
    events: broadcast::Sender<PaymentEvent>,
    watches: Arc<RwLock<HashMap<String, WatchEntry>>>,
    retention: FinishedRetention,
}

impl SubscriptionService {
    pub fn new(gateway: Arc<dyn InvoiceGateway>, poll_config: PollConfig) -> Self {
        let (events, _) = broadcast::channel(POLL_EVENT_CHANNEL_CAPACITY);
        Self {
            poller: InvoicePoller::new(gateway.clone(), poll_config),
            gateway,
            events,
            watches: Arc::new(RwLock::new(HashMap::new())),
            retention: FinishedRetention::default(),
        }
    }

    /// Overrides how long and how many finished watch outcomes are kept.
    pub fn with_finished_retention(mut self, retention: chrono::Duration, max_finished: usize) -> Self {
        self.retention = FinishedRetention {
            retention,
            max_finished,
        };
        self
    }

    pub fn gateway_name(&self) -> &'static str {
        self.gateway.name()
    }

    pub fn is_sandbox(&self) -> bool {
        self.gateway.as_sandbox().is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PaymentEvent> {
        self.events.subscribe()
    }

    pub fn plans(&self) -> Vec<SubscriptionPlan> {
        SubscriptionPlan::all()
    }

    pub fn plan(&self, plan_id: &str) -> Result<SubscriptionPlan> {
        SubscriptionPlan::find(plan_id)
            .ok_or_else(|| AppError::NotFound(format!("Subscription plan {} not found", plan_id)))
    }

    pub fn merch_catalog(&self) -> Vec<MerchItem> {
        MerchItem::catalog()
    }

    pub fn merch_item(&self, item_id: &str) -> Result<MerchItem> {
        MerchItem::find(item_id)
            .ok_or_else(|| AppError::NotFound(format!("Merch item {} not found", item_id)))
    }

    pub async fn create_subscription_invoice(
        &self,
        plan_id: &str,
        user_email: &str,
        correlation_id: Option<String>,
    ) -> Result<Invoice> {
        let plan = SubscriptionPlan::find(plan_id).ok_or_else(|| {
            AppError::BadRequest(format!("Invalid subscription plan: {}", plan_id.trim()))
        })?;
        let user_email = validate_email(user_email)?;

        let correlation_id = correlation_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("sub_{}", Utc::now().timestamp_millis()));

        let request = InvoiceRequest {
            correlation_id,
            description: format!("CryptoQuest {} Subscription", plan.name),
            amount: Money::new(plan.price, plan.currency),
        };
        let invoice = self.gateway.create_invoice(&request).await?;

        tracing::info!(
            invoice_id = %invoice.invoice_id,
            plan_id = plan.id,
            user_email,
            gateway = self.gateway.name(),
            "subscription invoice created"
        );
        Ok(invoice)
    }

    pub async fn invoice_status(&self, invoice_id: &str) -> Result<Invoice> {
        let invoice_id = validate_path_id(invoice_id, "invoiceId")?;
        self.gateway.fetch_status(invoice_id).await
    }

    pub async fn quote_invoice(&self, invoice_id: &str) -> Result<Quote> {
        let invoice = self.invoice_status(invoice_id).await?;
        if invoice.state.is_terminal() {
            return Err(AppError::InvoiceNotPayable(format!(
                "already {}",
                invoice.state.as_str().to_ascii_lowercase()
            )));
        }
        self.gateway.quote_invoice(&invoice.invoice_id).await
    }

    pub async fn create_merch_quote(&self, items: &[OrderItem], user_email: &str) -> Result<MerchQuote> {
        let user_email = validate_email(user_email)?;
        let total: Decimal = order_total(items)?;
        let amount = Money::new(total, "USD");

        let request = InvoiceRequest {
            correlation_id: format!("merch_{}", Utc::now().timestamp_millis()),
            description: format!("CryptoQuest Merchandise Order - {} items", items.len()),
            amount: amount.clone(),
        };
        let invoice = self.gateway.create_invoice(&request).await?;
        let quote = self.gateway.quote_invoice(&invoice.invoice_id).await?;

        tracing::info!(
            invoice_id = %invoice.invoice_id,
            total = %amount,
            user_email,
            "merch quote created"
        );
        Ok(MerchQuote {
            invoice,
            quote,
            total: amount,
        })
    }

    /// Moves a sandbox invoice to `state`. Only available without Strike.
    pub async fn set_sandbox_state(&self, invoice_id: &str, state: InvoiceState) -> Result<Invoice> {
        let sandbox = self
            .gateway
            .as_sandbox()
            .ok_or_else(|| AppError::NotFound("Sandbox gateway is not active".to_string()))?;
        if !state.is_recognized() {
            return Err(AppError::BadRequest(format!("Unknown invoice state: {}", state)));
        }
        let invoice_id = validate_path_id(invoice_id, "invoiceId")?;
        sandbox.set_state(invoice_id, state).await
    }

    /// Starts a background poll for `invoice_id`.
    pub async fn watch_invoice(&self, invoice_id: &str) -> Result<WatchTicket> {
        let invoice_id = validate_path_id(invoice_id, "invoiceId")?.to_string();

        match self.gateway.fetch_status(&invoice_id).await {
            Ok(_) => {}
            Err(AppError::NotFound(msg)) => return Err(AppError::NotFound(msg)),
            Err(err) => {
                tracing::warn!(invoice_id = %invoice_id, error = %err, "pre-watch status check failed, watching anyway");
            }
        }

        let config = *self.poller.config();
        let started_at = Utc::now();
        let cancel = CancellationToken::new();

        let mut watches = self.watches.write().await;
        self.retention.prune(&mut watches, started_at);
        if matches!(watches.get(&invoice_id), Some(WatchEntry::Active { .. })) {
            return Err(AppError::Conflict(format!(
                "Invoice {} is already being watched",
                invoice_id
            )));
        }

        let _ = self.events.send(PaymentEvent::WatchStarted {
            invoice_id: invoice_id.clone(),
            max_attempts: config.max_attempts,
            interval_secs: config.interval.as_secs(),
        });

        let poller = self.poller.clone();
        let registry = self.watches.clone();
        let retention = self.retention;
        let observer = EventObserver {
            events: self.events.clone(),
            max_attempts: config.max_attempts,
        };
        let task_invoice_id = invoice_id.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let outcome = match poller.poll(&task_invoice_id, &observer, &task_cancel).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(invoice_id = %task_invoice_id, error = %err, "invoice watch rejected");
                    let outcome = PollOutcome::Aborted {
                        invoice_id: task_invoice_id.clone(),
                        attempts: 0,
                    };
                    observer.on_outcome(&outcome);
                    outcome
                }
            };
            let finished_at = Utc::now();
            let mut watches = registry.write().await;
            watches.insert(
                task_invoice_id,
                WatchEntry::Finished {
                    outcome,
                    finished_at,
                },
            );
            retention.prune(&mut watches, finished_at);
        });

        watches.insert(
            invoice_id.clone(),
            WatchEntry::Active {
                cancel,
                started_at,
                task: Some(task),
            },
        );
        drop(watches);

        tracing::info!(
            invoice_id = %invoice_id,
            max_attempts = config.max_attempts,
            interval_secs = config.interval.as_secs(),
            "invoice watch started"
        );
        Ok(WatchTicket {
            invoice_id,
            max_attempts: config.max_attempts,
            interval_secs: config.interval.as_secs(),
            started_at,
        })
    }

    pub async fn watch_status(&self, invoice_id: &str) -> Result<WatchStatus> {
        let invoice_id = validate_path_id(invoice_id, "invoiceId")?;
        let watches = self.watches.read().await;
        Ok(match watches.get(invoice_id) {
            Some(WatchEntry::Active { started_at, .. }) => WatchStatus::Active {
                invoice_id: invoice_id.to_string(),
                started_at: *started_at,
            },
            Some(WatchEntry::Finished {
                outcome,
                finished_at,
            }) => WatchStatus::Finished {
                invoice_id: invoice_id.to_string(),
                finished_at: *finished_at,
                outcome: outcome.clone(),
            },
            None => WatchStatus::Unknown {
                invoice_id: invoice_id.to_string(),
            },
        })
    }

    pub async fn cancel_watch(&self, invoice_id: &str) -> Result<()> {
        let invoice_id = validate_path_id(invoice_id, "invoiceId")?;
        let watches = self.watches.read().await;
        match watches.get(invoice_id) {
            Some(WatchEntry::Active { cancel, .. }) => {
                cancel.cancel();
                tracing::info!(invoice_id, "invoice watch cancelled");
                Ok(())
            }
            _ => Err(AppError::NotFound(format!(
                "No active watch for invoice {}",
                invoice_id
            ))),
        }
    }

    pub async fn active_watch_count(&self) -> usize {
        self.watches
            .read()
            .await
            .values()
            .filter(|entry| matches!(entry, WatchEntry::Active { .. }))
            .count()
    }

    /// Cancels every active watch and waits for the poll tasks to record
    /// their outcome.
    pub async fn shutdown(&self) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut watches = self.watches.write().await;
            watches
                .values_mut()
                .filter_map(|entry| match entry {
                    WatchEntry::Active { cancel, task, .. } => {
                        cancel.cancel();
                        task.take()
                    }
                    WatchEntry::Finished { .. } => None,
                })
                .collect()
        };

        if !tasks.is_empty() {
            tracing::info!(count = tasks.len(), "cancelling invoice watches");
        }
        for task in tasks {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "invoice watch task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::sandbox::SandboxGateway;
    use std::time::Duration;

    fn service() -> SubscriptionService {
        SubscriptionService::new(Arc::new(SandboxGateway::new()), PollConfig::default())
    }

    async fn invoice(service: &SubscriptionService) -> Invoice {
        service
            .create_subscription_invoice("basic", "player@cryptoquest.com", None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn subscription_invoice_uses_plan_price_and_description() {
        let service = service();
        let invoice = invoice(&service).await;

        assert_eq!(invoice.amount, Money::new(Decimal::new(999, 2), "USD"));
        assert_eq!(invoice.description, "CryptoQuest Basic Hero Subscription");
        assert!(invoice
            .correlation_id
            .as_deref()
            .is_some_and(|id| id.starts_with("sub_")));
        assert_eq!(invoice.state, InvoiceState::Unpaid);
    }

    #[tokio::test]
    async fn subscription_invoice_validates_input() {
        let service = service();
        let err = service
            .create_subscription_invoice("platinum", "player@cryptoquest.com", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = service
            .create_subscription_invoice("basic", "not-an-email", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn paid_invoice_is_not_payable() {
        let service = service();
        let invoice = invoice(&service).await;
        assert!(service.quote_invoice(&invoice.invoice_id).await.is_ok());

        service
            .set_sandbox_state(&invoice.invoice_id, InvoiceState::Paid)
            .await
            .unwrap();
        let err = service.quote_invoice(&invoice.invoice_id).await.unwrap_err();
        assert!(matches!(err, AppError::InvoiceNotPayable(msg) if msg == "already paid"));

        let err = service.quote_invoice("inv_missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    fn finished_entry(outcome_id: &str, finished_at: DateTime<Utc>) -> WatchEntry {
        WatchEntry::Finished {
            outcome: PollOutcome::Aborted {
                invoice_id: outcome_id.to_string(),
                attempts: 0,
            },
            finished_at,
        }
    }

    #[tokio::test]
    async fn finished_watches_are_capped() {
        let service = service().with_finished_retention(chrono::Duration::hours(1), 5);

        for _ in 0..20 {
            let invoice = invoice(&service).await;
            service.watch_invoice(&invoice.invoice_id).await.unwrap();
            service.cancel_watch(&invoice.invoice_id).await.unwrap();
        }
        service.shutdown().await;

        let watches = service.watches.read().await;
        assert!(watches.len() <= 5, "registry kept {} entries", watches.len());
        assert!(watches
            .values()
            .all(|entry| matches!(entry, WatchEntry::Finished { .. })));
    }

    #[test]
    fn expired_outcomes_are_evicted_but_active_watches_stay() {
        let now = Utc::now();
        let retention = FinishedRetention {
            retention: chrono::Duration::minutes(10),
            max_finished: 100,
        };
        let mut watches = HashMap::new();
        watches.insert("old".to_string(), finished_entry("old", now - chrono::Duration::minutes(30)));
        watches.insert("recent".to_string(), finished_entry("recent", now - chrono::Duration::minutes(1)));
        watches.insert(
            "running".to_string(),
            WatchEntry::Active {
                cancel: CancellationToken::new(),
                started_at: now - chrono::Duration::hours(2),
                task: None,
            },
        );

        retention.prune(&mut watches, now);

        assert!(!watches.contains_key("old"));
        assert!(watches.contains_key("recent"));
        assert!(watches.contains_key("running"));
    }

    #[tokio::test]
    async fn merch_quote_totals_order() {
        let service = service();
        let items = vec![
            OrderItem {
                item_id: "hoodie_guild".into(),
                quantity: 2,
                variant: None,
            },
            OrderItem {
                item_id: "poster_map".into(),
                quantity: 1,
                variant: None,
            },
        ];
        let quote = service
            .create_merch_quote(&items, "player@cryptoquest.com")
            .await
            .unwrap();
        assert_eq!(quote.total.amount, Decimal::new(11997, 2));
        assert_eq!(quote.invoice.amount, quote.total);
        assert!(quote.quote.ln_invoice.starts_with("lnbcrt"));
    }

    #[tokio::test(start_paused = true)]
    async fn watch_reports_payment_through_events_and_status() {
        let service = service();
        let mut events = service.subscribe();
        let invoice = invoice(&service).await;

        let ticket = service.watch_invoice(&invoice.invoice_id).await.unwrap();
        assert_eq!(ticket.max_attempts, 60);

        // attempts at t=0 and t=5 see UNPAID, t=10 sees PAID
        tokio::time::sleep(Duration::from_secs(7)).await;
        service
            .set_sandbox_state(&invoice.invoice_id, InvoiceState::Paid)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        match service.watch_status(&invoice.invoice_id).await.unwrap() {
            WatchStatus::Finished { outcome, .. } => {
                assert!(outcome.is_success());
                assert_eq!(outcome.attempts(), 3);
            }
            other => panic!("unexpected watch status: {:?}", other),
        }

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert!(matches!(received.first(), Some(PaymentEvent::WatchStarted { .. })));
        let finished: Vec<_> = received
            .iter()
            .filter(|e| matches!(e, PaymentEvent::Finished { .. }))
            .collect();
        assert_eq!(finished.len(), 1);
        assert!(matches!(finished[0], PaymentEvent::Finished { success: true, .. }));
        assert_eq!(
            received
                .iter()
                .filter(|e| matches!(e, PaymentEvent::Attempt { .. }))
                .count(),
            3
        );
    }

    #[tokio::test(start_paused = true)]
    async fn second_watch_for_same_invoice_is_rejected() {
        let service = service();
        let invoice = invoice(&service).await;

        service.watch_invoice(&invoice.invoice_id).await.unwrap();
        let err = service.watch_invoice(&invoice.invoice_id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(service.active_watch_count().await, 1);

        service.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_watch_records_abort() {
        let service = service();
        let invoice = invoice(&service).await;

        service.watch_invoice(&invoice.invoice_id).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        service.cancel_watch(&invoice.invoice_id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        match service.watch_status(&invoice.invoice_id).await.unwrap() {
            WatchStatus::Finished { outcome, .. } => {
                assert_eq!(outcome.failure_reason(), Some("poll aborted"));
            }
            other => panic!("unexpected watch status: {:?}", other),
        }

        let err = service.cancel_watch(&invoice.invoice_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn watching_unknown_invoice_is_not_found() {
        let service = service();
        let err = service.watch_invoice("inv_missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(matches!(
            service.watch_status("inv_missing").await.unwrap(),
            WatchStatus::Unknown { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_every_watch() {
        let service = service();
        let first = invoice(&service).await;
        let second = invoice(&service).await;
        service.watch_invoice(&first.invoice_id).await.unwrap();
        service.watch_invoice(&second.invoice_id).await.unwrap();
        assert_eq!(service.active_watch_count().await, 2);

        service.shutdown().await;

        assert_eq!(service.active_watch_count().await, 0);
        for id in [&first.invoice_id, &second.invoice_id] {
            assert!(matches!(
                service.watch_status(id).await.unwrap(),
                WatchStatus::Finished { .. }
            ));
        }
    }
}
