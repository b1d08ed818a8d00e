use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use super::AppState;
use crate::{error::Result, models::ApiResponse};

#[derive(Debug, Default, Deserialize)]
pub struct CreateWalletRequest {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChainQuery {
    pub chain: Option<String>,
}

// Custodial wallets (Coinbase CDP)

pub async fn list_wallets(State(state): State<AppState>) -> Result<Json<ApiResponse<Value>>> {
    let wallets = state.coinbase()?.list_wallets().await?;
    Ok(Json(ApiResponse::success(wallets)))
}

pub async fn create_wallet(
    State(state): State<AppState>,
    body: Option<Json<CreateWalletRequest>>,
) -> Result<Json<ApiResponse<Value>>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let name = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let wallet = state.coinbase()?.create_wallet(name).await?;
    Ok(Json(ApiResponse::success(wallet)))
}

pub async fn wallet_balances(
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
) -> Result<Json<ApiResponse<Value>>> {
    let balances = state.coinbase()?.wallet_balances(&wallet_id).await?;
    Ok(Json(ApiResponse::success(balances)))
}

// Chain data (Moralis)

pub async fn wallet_nfts(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<ChainQuery>,
) -> Result<Json<ApiResponse<Value>>> {
    let nfts = state.moralis()?.wallet_nfts(&address, query.chain.as_deref()).await?;
    Ok(Json(ApiResponse::success(nfts)))
}

pub async fn token_balances(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<ChainQuery>,
) -> Result<Json<ApiResponse<Value>>> {
    let tokens = state
        .moralis()?
        .token_balances(&address, query.chain.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(tokens)))
}

pub async fn wallet_transactions(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<ChainQuery>,
) -> Result<Json<ApiResponse<Value>>> {
    let transactions = state
        .moralis()?
        .wallet_transactions(&address, query.chain.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(transactions)))
}

pub async fn token_price(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<ChainQuery>,
) -> Result<Json<ApiResponse<Value>>> {
    let price = state.moralis()?.token_price(&address, query.chain.as_deref()).await?;
    Ok(Json(ApiResponse::success(price)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::test_state,
        error::AppError,
        integrations::MoralisClient,
    };
    use std::sync::Arc;

    const WALLET: &str = "0x1234567890abcdef1234567890abcdef12345678";

    #[tokio::test]
    async fn cdp_routes_need_credentials() {
        let err = list_wallets(State(test_state())).await.unwrap_err();
        assert!(matches!(err, AppError::NotConfigured(ref vendor) if vendor == "Coinbase CDP"));
    }

    #[tokio::test]
    async fn nft_lookup_passes_chain_override() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", format!("/{}/nft", WALLET).as_str())
            .match_query(mockito::Matcher::UrlEncoded("chain".into(), "eth".into()))
            .with_status(200)
            .with_body(r#"{"result":[{"token_id":"7"}]}"#)
            .create_async()
            .await;

        let moralis = MoralisClient::new("key".into(), server.url(), "polygon".into()).unwrap();
        let state = AppState {
            moralis: Some(Arc::new(moralis)),
            ..test_state()
        };

        let Json(reply) = wallet_nfts(
            State(state),
            Path(WALLET.to_string()),
            Query(ChainQuery {
                chain: Some("eth".into()),
            }),
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(reply.data["result"][0]["token_id"], "7");
    }

    #[tokio::test]
    async fn malformed_address_is_rejected_before_calling_moralis() {
        let moralis = MoralisClient::new("key".into(), "http://127.0.0.1:9".into(), "polygon".into()).unwrap();
        let state = AppState {
            moralis: Some(Arc::new(moralis)),
            ..test_state()
        };
        let err = token_price(State(state), Path("0xnope".into()), Query(ChainQuery::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
