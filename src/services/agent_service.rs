use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

use crate::{
    config::Config,
    constants::{
        AGENT_HISTORY_LIMIT, PAYMASTER_DEFAULT_GAS_ESTIMATE, SUPERPAY_FEE_BPS, SUPERPAY_GAS_ESTIMATE,
    },
    error::{AppError, Result},
    integrations::coinbase::{CoinbaseClient, DeployParams, StakeParams, TransferParams},
    utils::{random_hex, require_non_empty},
};

const RECENT_ITEMS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentActionKind {
    Transfer,
    Deploy,
    Stake,
    Trade,
    Faucet,
}

impl FromStr for AgentActionKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "transfer" => Ok(AgentActionKind::Transfer),
            "deploy" => Ok(AgentActionKind::Deploy),
            "stake" => Ok(AgentActionKind::Stake),
            "trade" => Ok(AgentActionKind::Trade),
            "faucet" => Ok(AgentActionKind::Faucet),
            other => Err(AppError::BadRequest(format!("Unknown action type: {}", other))),
        }
    }
}

impl fmt::Display for AgentActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentActionKind::Transfer => "transfer",
            AgentActionKind::Deploy => "deploy",
            AgentActionKind::Stake => "stake",
            AgentActionKind::Trade => "trade",
            AgentActionKind::Faucet => "faucet",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AgentActionKind,
    pub status: ActionStatus,
    pub params: Value,
    pub result: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymasterConfig {
    pub enabled: bool,
    pub sponsor_address: String,
    pub max_gas_per_transaction: u64,
    pub daily_limit: u64,
    pub used_today: u64,
    #[serde(skip)]
    usage_day: NaiveDate,
}

impl PaymasterConfig {
    fn from_config(config: &Config) -> Self {
        Self {
            enabled: true,
            sponsor_address: config.paymaster_sponsor_address.clone(),
            max_gas_per_transaction: config.paymaster_max_gas_per_tx,
            daily_limit: config.paymaster_daily_limit,
            used_today: 0,
            usage_day: Utc::now().date_naive(),
        }
    }

    fn roll_day(&mut self, today: NaiveDate) {
        if today != self.usage_day {
            self.usage_day = today;
            self.used_today = 0;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymasterUpdate {
    pub enabled: Option<bool>,
    pub sponsor_address: Option<String>,
    pub max_gas_per_transaction: Option<u64>,
    pub daily_limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sponsorship {
    pub success: bool,
    pub tx_hash: Option<String>,
    pub gas: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperPayRequest {
    pub to: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub gasless: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperPayTransaction {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub status: ActionStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub fees: Decimal,
    pub gasless: bool,
    pub sponsorship: Option<Sponsorship>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetrics {
    pub total_actions: usize,
    pub failed_actions: usize,
    pub active_transactions: usize,
    pub total_transactions: usize,
    pub gas_sponsored: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentOverview {
    pub initialized: bool,
    pub network: Option<String>,
    pub admin_wallet: Option<String>,
    pub balances: Option<Value>,
    pub paymaster: PaymasterConfig,
    pub metrics: AgentMetrics,
    pub recent_actions: Vec<AgentAction>,
    pub recent_transactions: Vec<SuperPayTransaction>,
}

struct AgentState {
    actions: VecDeque<AgentAction>,
    transactions: VecDeque<SuperPayTransaction>,
    paymaster: PaymasterConfig,
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T) {
    if queue.len() >= AGENT_HISTORY_LIMIT {
        queue.pop_front();
    }
    queue.push_back(item);
}

fn parse_params<T: serde::de::DeserializeOwned>(params: &Value, kind: AgentActionKind) -> Result<T> {
    serde_json::from_value(params.clone())
        .map_err(|e| AppError::BadRequest(format!("Invalid {} params: {}", kind, e)))
}

/// Autonomous wallet actions, gas sponsorship and SuperPay transfers.
///
/// History and paymaster usage are kept in memory and are lost on restart.
pub struct AgentService {
    coinbase: Option<Arc<CoinbaseClient>>,
    admin_wallet: OnceCell<String>,
    state: RwLock<AgentState>,
}

impl AgentService {
    pub fn new(coinbase: Option<Arc<CoinbaseClient>>, config: &Config) -> Self {
        Self {
            coinbase,
            admin_wallet: OnceCell::new(),
            state: RwLock::new(AgentState {
                actions: VecDeque::new(),
                transactions: VecDeque::new(),
                paymaster: PaymasterConfig::from_config(config),
            }),
        }
    }

    fn coinbase(&self) -> Result<&CoinbaseClient> {
        self.coinbase
            .as_deref()
            .ok_or_else(|| AppError::NotConfigured("Coinbase CDP".to_string()))
    }

    /// First wallet of the account, created on first use when none exists.
    async fn admin_wallet(&self) -> Result<&str> {
        let client = self.coinbase()?;
        let wallet_id = self
            .admin_wallet
            .get_or_try_init(|| async {
                let wallets = client.list_wallets().await?;
                if let Some(id) = wallets.pointer("/data/0/id").and_then(Value::as_str) {
                    return Ok::<String, AppError>(id.to_string());
                }
                let created = client.create_wallet(Some("Admin Wallet")).await?;
                created
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| AppError::ExternalAPI("CDP wallet response has no id".to_string()))
            })
            .await?;
        Ok(wallet_id.as_str())
    }

    pub async fn execute_action(&self, kind: AgentActionKind, params: Value) -> Result<AgentAction> {
        let mut action = AgentAction {
            id: format!("action_{}_{}", Utc::now().timestamp_millis(), random_hex(3)),
            kind,
            status: ActionStatus::Pending,
            params,
            result: None,
            timestamp: Utc::now(),
        };
        tracing::info!(action_id = %action.id, kind = %kind, "agent action started");

        match self.perform(kind, &action.params).await {
            Ok(result) => {
                action.status = ActionStatus::Completed;
                action.result = Some(result);
            }
            Err(err) => {
                tracing::warn!(action_id = %action.id, kind = %kind, error = %err, "agent action failed");
                action.status = ActionStatus::Failed;
                action.result = Some(json!({ "error": err.public_message() }));
            }
        }

        push_bounded(&mut self.state.write().await.actions, action.clone());
        Ok(action)
    }

    async fn perform(&self, kind: AgentActionKind, params: &Value) -> Result<Value> {
        match kind {
            AgentActionKind::Trade => {
                // no exchange integration; the trade is recorded as executed
                let from_asset = params.get("fromAsset").and_then(Value::as_str).unwrap_or_default();
                let to_asset = params.get("toAsset").and_then(Value::as_str).unwrap_or_default();
                require_non_empty(from_asset, "fromAsset")?;
                require_non_empty(to_asset, "toAsset")?;
                Ok(json!({
                    "success": true,
                    "simulated": true,
                    "fromAsset": from_asset,
                    "toAsset": to_asset,
                    "amount": params.get("amount").cloned().unwrap_or(Value::Null),
                    "executedAt": Utc::now(),
                }))
            }
            AgentActionKind::Transfer => {
                let transfer: TransferParams = parse_params(params, kind)?;
                let wallet = self.admin_wallet().await?;
                self.coinbase()?.transfer(wallet, &transfer).await
            }
            AgentActionKind::Deploy => {
                let deploy: DeployParams = parse_params(params, kind)?;
                let wallet = self.admin_wallet().await?;
                self.coinbase()?.deploy_contract(wallet, &deploy).await
            }
            AgentActionKind::Stake => {
                let stake: StakeParams = parse_params(params, kind)?;
                let wallet = self.admin_wallet().await?;
                self.coinbase()?.stake(wallet, &stake).await
            }
            AgentActionKind::Faucet => {
                let asset = params.get("asset").and_then(Value::as_str);
                let wallet = self.admin_wallet().await?;
                self.coinbase()?.request_faucet(wallet, asset).await
            }
        }
    }

    pub async fn sponsor_transaction(&self, gas_estimate: Option<u64>) -> Sponsorship {
        let gas = gas_estimate.unwrap_or(PAYMASTER_DEFAULT_GAS_ESTIMATE);
        let mut state = self.state.write().await;
        let paymaster = &mut state.paymaster;
        paymaster.roll_day(Utc::now().date_naive());

        let rejection = if !paymaster.enabled {
            Some("Paymaster is disabled")
        } else if gas > paymaster.max_gas_per_transaction {
            Some("Transaction exceeds gas limit")
        } else if paymaster.used_today.saturating_add(gas) > paymaster.daily_limit {
            Some("Daily gas limit exceeded")
        } else {
            None
        };

        if let Some(reason) = rejection {
            tracing::warn!(gas, used_today = paymaster.used_today, reason, "sponsorship rejected");
            return Sponsorship {
                success: false,
                tx_hash: None,
                gas,
                error: Some(reason.to_string()),
            };
        }

        paymaster.used_today += gas;
        tracing::debug!(gas, used_today = paymaster.used_today, "transaction sponsored");
        Sponsorship {
            success: true,
            tx_hash: Some(format!("0x{}", random_hex(32))),
            gas,
            error: None,
        }
    }

    pub async fn create_superpay_transaction(&self, request: SuperPayRequest) -> Result<SuperPayTransaction> {
        let to = require_non_empty(&request.to, "to")?.to_string();
        let currency = require_non_empty(&request.currency, "currency")?.to_ascii_uppercase();
        if request.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest("amount must be positive".to_string()));
        }

        let fees = if request.gasless {
            Decimal::ZERO
        } else {
            request
                .amount
                .checked_mul(Decimal::from(SUPERPAY_FEE_BPS))
                .and_then(|scaled| scaled.checked_div(Decimal::from(10_000)))
                .ok_or_else(|| AppError::BadRequest("amount too large".to_string()))?
        };
        let sponsor_address = self.state.read().await.paymaster.sponsor_address.clone();

        let mut transaction = SuperPayTransaction {
            id: format!("spay_{}_{}", Utc::now().timestamp_millis(), random_hex(3)),
            from: sponsor_address,
            to,
            amount: request.amount,
            currency,
            status: ActionStatus::Pending,
            timestamp: Utc::now(),
            fees,
            gasless: request.gasless,
            sponsorship: None,
        };

        if request.gasless {
            let sponsorship = self.sponsor_transaction(Some(SUPERPAY_GAS_ESTIMATE)).await;
            transaction.status = if sponsorship.success {
                ActionStatus::Completed
            } else {
                ActionStatus::Failed
            };
            transaction.sponsorship = Some(sponsorship);
        } else {
            transaction.status = ActionStatus::Completed;
        }

        tracing::info!(
            transaction_id = %transaction.id,
            amount = %transaction.amount,
            fees = %transaction.fees,
            gasless = transaction.gasless,
            status = ?transaction.status,
            "SuperPay transaction recorded"
        );
        push_bounded(&mut self.state.write().await.transactions, transaction.clone());
        Ok(transaction)
    }

    pub async fn update_paymaster(&self, update: PaymasterUpdate) -> Result<PaymasterConfig> {
        let mut state = self.state.write().await;
        let paymaster = &mut state.paymaster;

        if let Some(max_gas) = update.max_gas_per_transaction {
            if max_gas == 0 {
                return Err(AppError::BadRequest("maxGasPerTransaction must be > 0".to_string()));
            }
            paymaster.max_gas_per_transaction = max_gas;
        }
        if let Some(daily_limit) = update.daily_limit {
            paymaster.daily_limit = daily_limit;
        }
        if let Some(address) = update.sponsor_address {
            paymaster.sponsor_address = require_non_empty(&address, "sponsorAddress")?.to_string();
        }
        if let Some(enabled) = update.enabled {
            paymaster.enabled = enabled;
        }

        tracing::info!(
            enabled = paymaster.enabled,
            max_gas = paymaster.max_gas_per_transaction,
            daily_limit = paymaster.daily_limit,
            "paymaster updated"
        );
        Ok(paymaster.clone())
    }

    pub async fn paymaster(&self) -> PaymasterConfig {
        let mut state = self.state.write().await;
        state.paymaster.roll_day(Utc::now().date_naive());
        state.paymaster.clone()
    }

    pub async fn overview(&self) -> AgentOverview {
        let (admin_wallet, balances) = match self.coinbase.as_deref() {
            Some(client) => match self.admin_wallet().await {
                Ok(wallet) => {
                    let balances = client
                        .wallet_balances(wallet)
                        .await
                        .map_err(|err| tracing::warn!(error = %err, "admin wallet balance lookup failed"))
                        .ok();
                    (Some(wallet.to_string()), balances)
                }
                Err(err) => {
                    tracing::warn!(error = %err, "admin wallet unavailable");
                    (None, None)
                }
            },
            None => (None, None),
        };

        let paymaster = self.paymaster().await;
        let state = self.state.read().await;
        let metrics = AgentMetrics {
            total_actions: state.actions.len(),
            failed_actions: state
                .actions
                .iter()
                .filter(|a| a.status == ActionStatus::Failed)
                .count(),
            active_transactions: state
                .transactions
                .iter()
                .filter(|t| t.status == ActionStatus::Pending)
                .count(),
            total_transactions: state.transactions.len(),
            gas_sponsored: paymaster.used_today,
        };

        AgentOverview {
            initialized: self.coinbase.is_some(),
            network: self.coinbase.as_deref().map(|c| c.network().to_string()),
            admin_wallet,
            balances,
            paymaster,
            metrics,
            recent_actions: state.actions.iter().rev().take(RECENT_ITEMS).cloned().collect(),
            recent_transactions: state.transactions.iter().rev().take(RECENT_ITEMS).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn service() -> AgentService {
        AgentService::new(None, &Config::default())
    }

    fn superpay(amount: i64, gasless: bool) -> SuperPayRequest {
        SuperPayRequest {
            to: "0xabc".into(),
            amount: Decimal::from(amount),
            currency: "usdc".into(),
            gasless,
        }
    }

    #[tokio::test]
    async fn trade_action_completes_without_wallet_provider() {
        let service = service();
        let action = service
            .execute_action(
                AgentActionKind::Trade,
                json!({"fromAsset": "ETH", "toAsset": "USDC", "amount": 1.5}),
            )
            .await
            .unwrap();

        assert_eq!(action.status, ActionStatus::Completed);
        assert_eq!(action.result.as_ref().unwrap()["toAsset"], "USDC");
        assert_eq!(service.overview().await.metrics.total_actions, 1);
    }

    #[tokio::test]
    async fn wallet_actions_fail_when_cdp_is_not_configured() {
        let service = service();
        let action = service
            .execute_action(
                AgentActionKind::Transfer,
                json!({"to": "0xdef", "amount": "0.1"}),
            )
            .await
            .unwrap();

        assert_eq!(action.status, ActionStatus::Failed);
        assert_eq!(
            action.result.unwrap()["error"],
            "Coinbase CDP is not configured"
        );
        let overview = service.overview().await;
        assert!(!overview.initialized);
        assert_eq!(overview.metrics.failed_actions, 1);
    }

    #[test]
    fn unknown_action_kind_is_rejected() {
        assert!(matches!(
            AgentActionKind::from_str("bridge"),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(AgentActionKind::from_str(" Stake ").unwrap(), AgentActionKind::Stake);
    }

    #[tokio::test]
    async fn paymaster_enforces_per_transaction_and_daily_limits() {
        let service = service();

        let too_big = service.sponsor_transaction(Some(100_001)).await;
        assert!(!too_big.success);
        assert_eq!(too_big.error.as_deref(), Some("Transaction exceeds gas limit"));

        for _ in 0..10 {
            assert!(service.sponsor_transaction(Some(100_000)).await.success);
        }
        let over_daily = service.sponsor_transaction(Some(1)).await;
        assert_eq!(over_daily.error.as_deref(), Some("Daily gas limit exceeded"));
        assert_eq!(service.paymaster().await.used_today, 1_000_000);
    }

    #[tokio::test]
    async fn superpay_fee_is_waived_when_gasless() {
        let service = service();

        let paid = service.create_superpay_transaction(superpay(1000, false)).await.unwrap();
        assert_eq!(paid.fees, Decimal::ONE);
        assert_eq!(paid.status, ActionStatus::Completed);
        assert_eq!(paid.currency, "USDC");

        let gasless = service.create_superpay_transaction(superpay(1000, true)).await.unwrap();
        assert_eq!(gasless.fees, Decimal::ZERO);
        assert_eq!(gasless.status, ActionStatus::Completed);
        assert_eq!(service.paymaster().await.used_today, SUPERPAY_GAS_ESTIMATE);
    }

    #[tokio::test]
    async fn gasless_payment_fails_when_paymaster_disabled() {
        let service = service();
        service
            .update_paymaster(PaymasterUpdate {
                enabled: Some(false),
                ..PaymasterUpdate::default()
            })
            .await
            .unwrap();

        let tx = service.create_superpay_transaction(superpay(5, true)).await.unwrap();
        assert_eq!(tx.status, ActionStatus::Failed);
        assert_eq!(
            tx.sponsorship.unwrap().error.as_deref(),
            Some("Paymaster is disabled")
        );
    }

    #[tokio::test]
    async fn superpay_rejects_non_positive_amounts() {
        let err = service()
            .create_superpay_transaction(superpay(0, false))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn superpay_rejects_amount_that_overflows_fee() {
        let request: SuperPayRequest = serde_json::from_value(json!({
            "to": "0xabc",
            "amount": 7.0e28,
            "currency": "usdc",
            "gasless": false
        }))
        .unwrap();

        let err = service().create_superpay_transaction(request).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref msg) if msg == "amount too large"));
    }

    #[tokio::test]
    async fn paymaster_update_validates_gas_cap() {
        let service = service();
        let err = service
            .update_paymaster(PaymasterUpdate {
                max_gas_per_transaction: Some(0),
                ..PaymasterUpdate::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let updated = service
            .update_paymaster(PaymasterUpdate {
                daily_limit: Some(42),
                ..PaymasterUpdate::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.daily_limit, 42);
    }

    #[test]
    fn usage_resets_on_new_day() {
        let mut paymaster = PaymasterConfig::from_config(&Config::default());
        paymaster.used_today = 500;
        let tomorrow = paymaster.usage_day.succ_opt().unwrap();
        paymaster.roll_day(tomorrow);
        assert_eq!(paymaster.used_today, 0);
    }
}
