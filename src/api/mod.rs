// src/api/mod.rs
pub mod agentkit;
pub mod ai;
pub mod game;
pub mod health;
pub mod payments;
pub mod stripe;
pub mod wallet;

use std::sync::Arc;

use crate::{
    config::Config,
    error::{AppError, Result},
    integrations::{
        lightning::InvoiceGateway, ChatRouter, CoinbaseClient, MoralisClient, SandboxGateway,
        StrikeClient, StripeClient,
    },
    services::{AIService, AgentService, GameStore, PollConfig, SubscriptionService},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub subscriptions: Arc<SubscriptionService>,
    pub chat: Arc<ChatRouter>,
    pub ai: Arc<AIService>,
    pub agent: Arc<AgentService>,
    pub game: Arc<GameStore>,
    pub stripe: Option<Arc<StripeClient>>,
    pub coinbase: Option<Arc<CoinbaseClient>>,
    pub moralis: Option<Arc<MoralisClient>>,
}

impl AppState {
    /// Builds every service from configuration. Vendors without credentials
    /// are left out and their routes answer `NOT_CONFIGURED`.
    pub fn build(config: Config) -> Result<Self> {
        let gateway: Arc<dyn InvoiceGateway> = match config.strike_api_key.clone() {
            Some(key) => Arc::new(StrikeClient::new(key, config.strike_api_url.clone())?),
            None => Arc::new(SandboxGateway::new()),
        };
        let subscriptions = Arc::new(SubscriptionService::new(
            gateway,
            PollConfig::from_config(&config),
        ));

        let chat = Arc::new(ChatRouter::from_config(&config)?);
        let ai = Arc::new(AIService::new(chat.clone()));

        let stripe = config
            .stripe_secret_key
            .clone()
            .map(|key| StripeClient::new(key, config.stripe_api_url.clone()))
            .transpose()?
            .map(Arc::new);

        let coinbase = match (&config.coinbase_api_key_name, &config.coinbase_api_private_key) {
            (Some(name), Some(pem)) => {
                let client = CoinbaseClient::new(name.clone(), pem, config.coinbase_api_url.clone())?;
                Some(Arc::new(client))
            }
            _ => None,
        };

        let moralis = config
            .moralis_api_key
            .clone()
            .map(|key| {
                MoralisClient::new(key, config.moralis_api_url.clone(), config.default_chain.clone())
            })
            .transpose()?
            .map(Arc::new);

        let agent = Arc::new(AgentService::new(coinbase.clone(), &config));

        Ok(Self {
            config: Arc::new(config),
            subscriptions,
            chat,
            ai,
            agent,
            game: Arc::new(GameStore::new()),
            stripe,
            coinbase,
            moralis,
        })
    }

    pub fn stripe(&self) -> Result<&StripeClient> {
        self.stripe
            .as_deref()
            .ok_or_else(|| AppError::NotConfigured("Stripe".to_string()))
    }

    pub fn coinbase(&self) -> Result<&CoinbaseClient> {
        self.coinbase
            .as_deref()
            .ok_or_else(|| AppError::NotConfigured("Coinbase CDP".to_string()))
    }

    pub fn moralis(&self) -> Result<&MoralisClient> {
        self.moralis
            .as_deref()
            .ok_or_else(|| AppError::NotConfigured("Moralis".to_string()))
    }
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    AppState::build(Config::default()).expect("default config builds")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_sandbox_and_no_vendors() {
        let state = test_state();
        assert!(state.subscriptions.is_sandbox());
        assert!(matches!(state.stripe(), Err(AppError::NotConfigured(_))));
        assert!(matches!(state.coinbase(), Err(AppError::NotConfigured(_))));
        assert!(matches!(state.moralis(), Err(AppError::NotConfigured(_))));
    }
}
