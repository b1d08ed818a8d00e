//! Invoice confirmation poll.
//!
//! Watches a single invoice through an [`InvoiceStatusSource`] until it is
//! paid, cancelled, the attempt budget runs out, or the caller cancels.
//! Attempts never overlap: the next query is only scheduled once the previous
//! one has returned.
//!
//! A failed status query is not terminal. It counts as one attempt and the
//! next attempt follows after `error_backoff` instead of the regular interval.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    constants::{DEFAULT_POLL_ERROR_BACKOFF_SECS, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_MAX_ATTEMPTS},
    error::{AppError, Result},
    integrations::lightning::InvoiceStatusSource,
    models::{Invoice, InvoiceState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
    pub error_backoff: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            error_backoff: Duration::from_secs(DEFAULT_POLL_ERROR_BACKOFF_SECS),
        }
    }
}

impl PollConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.payment_poll_max_attempts.max(1),
            error_backoff: config.poll_error_backoff(),
        }
    }

    /// Wall-clock budget of a poll that sees no fetch errors.
    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Result of one status query, handed to [`PollObserver::on_attempt`].
#[derive(Debug)]
pub enum AttemptResult<'a> {
    Observed(&'a Invoice),
    Failed(&'a AppError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PollOutcome {
    Paid {
        invoice: Invoice,
        attempts: u32,
    },
    Cancelled {
        invoice: Invoice,
        attempts: u32,
    },
    TimedOut {
        invoice_id: String,
        attempts: u32,
        last_state: Option<InvoiceState>,
    },
    Aborted {
        invoice_id: String,
        attempts: u32,
    },
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Paid { .. })
    }

    pub fn failure_reason(&self) -> Option<&'static str> {
        match self {
            PollOutcome::Paid { .. } => None,
            PollOutcome::Cancelled { .. } => Some("payment cancelled"),
            PollOutcome::TimedOut { .. } => Some("timeout"),
            PollOutcome::Aborted { .. } => Some("poll aborted"),
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Paid { attempts, .. }
            | PollOutcome::Cancelled { attempts, .. }
            | PollOutcome::TimedOut { attempts, .. }
            | PollOutcome::Aborted { attempts, .. } => *attempts,
        }
    }

    pub fn invoice_id(&self) -> &str {
        match self {
            PollOutcome::Paid { invoice, .. } | PollOutcome::Cancelled { invoice, .. } => {
                &invoice.invoice_id
            }
            PollOutcome::TimedOut { invoice_id, .. } | PollOutcome::Aborted { invoice_id, .. } => {
                invoice_id
            }
        }
    }
}

/// Receives poll progress. `on_outcome` is called exactly once per poll.
pub trait PollObserver: Send + Sync {
    fn on_attempt(&self, _invoice_id: &str, _attempt: u32, _result: AttemptResult<'_>) {}

    fn on_outcome(&self, outcome: &PollOutcome);
}

pub struct InvoicePoller<S: ?Sized> {
    source: Arc<S>,
    config: PollConfig,
}

impl<S: ?Sized> Clone for InvoicePoller<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            config: self.config,
        }
    }
}

impl<S> InvoicePoller<S>
where
    S: InvoiceStatusSource + ?Sized + 'static,
{
    pub fn new(source: Arc<S>, config: PollConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Polls `invoice_id` to completion on the current task.
    pub async fn poll(
        &self,
        invoice_id: &str,
        observer: &dyn PollObserver,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome> {
        let invoice_id = invoice_id.trim();
        if invoice_id.is_empty() {
            return Err(AppError::BadRequest("invoiceId is required".to_string()));
        }

        let outcome = self.run(invoice_id, observer, cancel).await;
        match outcome.failure_reason() {
            None => tracing::info!(invoice_id, attempts = outcome.attempts(), "invoice paid"),
            Some(reason) => tracing::info!(
                invoice_id,
                attempts = outcome.attempts(),
                reason,
                "invoice poll finished without payment"
            ),
        }
        observer.on_outcome(&outcome);
        Ok(outcome)
    }

    /// Runs [`InvoicePoller::poll`] on a background task.
    pub fn spawn(&self, invoice_id: String, observer: Arc<dyn PollObserver>) -> Result<PollHandle> {
        if invoice_id.trim().is_empty() {
            return Err(AppError::BadRequest("invoiceId is required".to_string()));
        }

        let cancel = CancellationToken::new();
        let poller = self.clone();
        let task_cancel = cancel.clone();
        let task_invoice_id = invoice_id.clone();
        let task = tokio::spawn(async move {
            match poller
                .poll(&task_invoice_id, observer.as_ref(), &task_cancel)
                .await
            {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(invoice_id = %task_invoice_id, error = %err, "invoice poll rejected");
                    PollOutcome::Aborted {
                        invoice_id: task_invoice_id,
                        attempts: 0,
                    }
                }
            }
        });

        Ok(PollHandle {
            invoice_id,
            cancel,
            task,
        })
    }

    async fn run(
        &self,
        invoice_id: &str,
        observer: &dyn PollObserver,
        cancel: &CancellationToken,
    ) -> PollOutcome {
        let aborted = |attempts: u32| PollOutcome::Aborted {
            invoice_id: invoice_id.to_string(),
            attempts,
        };
        let mut last_state = None;

        for attempt in 1..=self.config.max_attempts {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return aborted(attempt - 1),
                result = self.source.fetch_status(invoice_id) => result,
            };

            let delay = match fetched {
                Ok(invoice) => {
                    observer.on_attempt(invoice_id, attempt, AttemptResult::Observed(&invoice));
                    match &invoice.state {
                        InvoiceState::Paid => {
                            return PollOutcome::Paid {
                                invoice,
                                attempts: attempt,
                            }
                        }
                        InvoiceState::Cancelled => {
                            return PollOutcome::Cancelled {
                                invoice,
                                attempts: attempt,
                            }
                        }
                        InvoiceState::Unpaid | InvoiceState::Pending => {
                            tracing::debug!(invoice_id, attempt, state = %invoice.state, "invoice not settled yet");
                        }
                        InvoiceState::Other(raw) => {
                            tracing::warn!(invoice_id, attempt, state = %raw, "unrecognized invoice state, continuing");
                        }
                    }
                    last_state = Some(invoice.state);
                    self.config.interval
                }
                Err(err) => {
                    tracing::warn!(invoice_id, attempt, error = %err, "invoice status query failed");
                    observer.on_attempt(invoice_id, attempt, AttemptResult::Failed(&err));
                    self.config.error_backoff
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return aborted(attempt),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        PollOutcome::TimedOut {
            invoice_id: invoice_id.to_string(),
            attempts: self.config.max_attempts,
            last_state,
        }
    }
}

/// Handle to a background poll.
pub struct PollHandle {
    invoice_id: String,
    cancel: CancellationToken,
    task: JoinHandle<PollOutcome>,
}

impl PollHandle {
    pub fn invoice_id(&self) -> &str {
        &self.invoice_id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> PollOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(invoice_id = %self.invoice_id, error = %err, "invoice poll task failed");
                PollOutcome::Aborted {
                    invoice_id: self.invoice_id,
                    attempts: 0,
                }
            }
        }
    }
}
