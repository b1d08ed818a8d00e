use serde_json::Value;
use std::time::Duration;

use super::http::{build_client, join_url, read_json};
use crate::{
    constants::HTTP_REQUEST_TIMEOUT_SECS,
    error::{AppError, Result},
    utils::require_non_empty,
};

const VENDOR: &str = "Moralis";

fn validate_evm_address<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let address = require_non_empty(value, field)?;
    let valid = address.len() == 42
        && address.starts_with("0x")
        && address[2..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(AppError::BadRequest(format!("Invalid {}: {}", field, address)));
    }
    Ok(address)
}

/// Moralis Web3 Data API. Responses are handed back as raw JSON.
#[derive(Debug, Clone)]
pub struct MoralisClient {
    http: reqwest::Client,
    api_key: String,
    api_url: String,
    default_chain: String,
}

impl MoralisClient {
    pub fn new(api_key: String, api_url: String, default_chain: String) -> Result<Self> {
        let http = build_client(VENDOR, Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))?;
        Ok(Self {
            http,
            api_key,
            api_url,
            default_chain,
        })
    }

    async fn get(&self, path: &str, chain: Option<&str>, action: &str) -> Result<Value> {
        let chain = chain
            .map(str::trim)
            .filter(|chain| !chain.is_empty())
            .unwrap_or(&self.default_chain);
        tracing::debug!(path, chain, "Moralis request");

        let response = self
            .http
            .get(join_url(&self.api_url, path))
            .header("X-API-Key", self.api_key.trim())
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[("chain", chain)])
            .send()
            .await?;
        read_json(VENDOR, action, response).await
    }

    pub async fn wallet_nfts(&self, wallet: &str, chain: Option<&str>) -> Result<Value> {
        let wallet = validate_evm_address(wallet, "walletAddress")?;
        self.get(&format!("/{}/nft", wallet), chain, "wallet NFTs").await
    }

    pub async fn token_balances(&self, wallet: &str, chain: Option<&str>) -> Result<Value> {
        let wallet = validate_evm_address(wallet, "walletAddress")?;
        self.get(&format!("/{}/erc20", wallet), chain, "token balances").await
    }

    pub async fn token_price(&self, token: &str, chain: Option<&str>) -> Result<Value> {
        let token = validate_evm_address(token, "tokenAddress")?;
        self.get(&format!("/erc20/{}/price", token), chain, "token price").await
    }

    pub async fn wallet_transactions(&self, wallet: &str, chain: Option<&str>) -> Result<Value> {
        let wallet = validate_evm_address(wallet, "walletAddress")?;
        self.get(&format!("/{}", wallet), chain, "wallet transactions").await
    }
}
