use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::AppState;
use crate::{
    error::{AppError, Result},
    models::{
        game::{
            CqtPrice, DaoProposal, DaoVote, Guild, Item, NewDaoProposal, NewDaoVote, NewGuild,
            NewItem, NewPlayer, NewStakingPosition, NewTokenTransaction, NewUser, Player,
            PlayerQuestView, PlayerUpdate, Quest, StakingPosition, TokenTransaction,
            TransactionStatusUpdate, User,
        },
        ApiResponse,
    },
};

type Created<T> = (StatusCode, Json<ApiResponse<T>>);

fn created<T>(data: T) -> Created<T> {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

fn parse_id(raw: &str, field: &str) -> Result<i64> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid {}", field)))
}

// ==================== USERS ====================

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<User>>> {
    let user = state.game.get_user(parse_id(&id, "user id")?).await?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn get_user_by_wallet(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<User>>> {
    let user = state.game.get_user_by_wallet(&address).await?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<NewUser>,
) -> Result<Created<User>> {
    Ok(created(state.game.create_user(req).await?))
}

// ==================== PLAYERS ====================

/// GET /api/players/{player}, keyed by wallet address
pub async fn get_player(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ApiResponse<Player>>> {
    let player = state.game.get_player(&address).await?;
    Ok(Json(ApiResponse::success(player)))
}

pub async fn create_player(
    State(state): State<AppState>,
    Json(req): Json<NewPlayer>,
) -> Result<Created<Player>> {
    Ok(created(state.game.create_player(req).await?))
}

/// PATCH /api/players/{player}, keyed by player id
pub async fn update_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PlayerUpdate>,
) -> Result<Json<ApiResponse<Player>>> {
    let player = state
        .game
        .update_player(parse_id(&id, "player id")?, req)
        .await?;
    Ok(Json(ApiResponse::success(player)))
}

pub async fn player_quests(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<PlayerQuestView>>>> {
    let quests = state.game.player_quests(parse_id(&id, "player id")?).await?;
    Ok(Json(ApiResponse::success(quests)))
}

pub async fn complete_quest(
    State(state): State<AppState>,
    Path((player_id, quest_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<PlayerQuestView>>> {
    let completed = state
        .game
        .complete_quest(
            parse_id(&player_id, "player id")?,
            parse_id(&quest_id, "quest id")?,
        )
        .await?;
    Ok(Json(ApiResponse::success(completed)))
}

// ==================== GUILDS, QUESTS, ITEMS ====================

pub async fn list_guilds(State(state): State<AppState>) -> Json<ApiResponse<Vec<Guild>>> {
    Json(ApiResponse::success(state.game.list_guilds().await))
}

pub async fn create_guild(
    State(state): State<AppState>,
    Json(req): Json<NewGuild>,
) -> Result<Created<Guild>> {
    Ok(created(state.game.create_guild(req).await?))
}

pub async fn active_quests(State(state): State<AppState>) -> Json<ApiResponse<Vec<Quest>>> {
    Json(ApiResponse::success(state.game.active_quests().await))
}

pub async fn list_items(State(state): State<AppState>) -> Json<ApiResponse<Vec<Item>>> {
    Json(ApiResponse::success(state.game.list_items().await))
}

pub async fn create_item(
    State(state): State<AppState>,
    Json(req): Json<NewItem>,
) -> Result<Created<Item>> {
    Ok(created(state.game.create_item(req).await?))
}

// ==================== CHAIN RECORDS ====================

pub async fn create_transaction(
    State(state): State<AppState>,
    Json(req): Json<NewTokenTransaction>,
) -> Result<Created<TokenTransaction>> {
    Ok(created(state.game.create_token_transaction(req).await?))
}

pub async fn wallet_transactions(
    State(state): State<AppState>,
    Path(wallet_address): Path<String>,
) -> Json<ApiResponse<Vec<TokenTransaction>>> {
    Json(ApiResponse::success(
        state.game.token_transactions(&wallet_address).await,
    ))
}

pub async fn update_transaction_status(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
    Json(req): Json<TransactionStatusUpdate>,
) -> Result<Json<ApiResponse<TokenTransaction>>> {
    let transaction = state.game.update_transaction_status(&tx_hash, req).await?;
    Ok(Json(ApiResponse::success(transaction)))
}

pub async fn create_staking_position(
    State(state): State<AppState>,
    Json(req): Json<NewStakingPosition>,
) -> Result<Created<StakingPosition>> {
    Ok(created(state.game.create_staking_position(req).await?))
}

pub async fn staking_positions(
    State(state): State<AppState>,
    Path(wallet_address): Path<String>,
) -> Json<ApiResponse<Vec<StakingPosition>>> {
    Json(ApiResponse::success(
        state.game.staking_positions(&wallet_address).await,
    ))
}

// ==================== DAO ====================

pub async fn list_proposals(State(state): State<AppState>) -> Json<ApiResponse<Vec<DaoProposal>>> {
    Json(ApiResponse::success(state.game.dao_proposals().await))
}

pub async fn create_proposal(
    State(state): State<AppState>,
    Json(req): Json<NewDaoProposal>,
) -> Result<Created<DaoProposal>> {
    Ok(created(state.game.create_dao_proposal(req).await?))
}

pub async fn cast_vote(
    State(state): State<AppState>,
    Json(req): Json<NewDaoVote>,
) -> Result<Created<DaoVote>> {
    Ok(created(state.game.cast_vote(req).await?))
}

pub async fn proposal_votes(
    State(state): State<AppState>,
    Path(proposal_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<DaoVote>>>> {
    let votes = state
        .game
        .dao_votes(parse_id(&proposal_id, "proposal id")?)
        .await?;
    Ok(Json(ApiResponse::success(votes)))
}

pub async fn cqt_price(State(state): State<AppState>) -> Json<ApiResponse<CqtPrice>> {
    Json(ApiResponse::success(state.game.cqt_price()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::test_state, models::game::TransactionStatus};
    use serde_json::json;

    #[tokio::test]
    async fn player_lifecycle_through_handlers() {
        let state = test_state();
        let (status, Json(player)) = create_player(
            State(state.clone()),
            Json(serde_json::from_value(json!({ "walletAddress": "0xhero" })).unwrap()),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        let id = player.data.id.to_string();

        let Json(updated) = update_player(
            State(state.clone()),
            Path(id.clone()),
            Json(serde_json::from_value(json!({ "luck": 9 })).unwrap()),
        )
        .await
        .unwrap();
        assert_eq!(updated.data.luck, 9);

        let Json(quests) = active_quests(State(state.clone())).await;
        let quest_id = quests.data[0].id.to_string();
        complete_quest(State(state.clone()), Path((id.clone(), quest_id)))
            .await
            .unwrap();

        let Json(log) = player_quests(State(state.clone()), Path(id)).await.unwrap();
        assert_eq!(log.data.len(), 1);

        let Json(found) = get_player(State(state), Path("0xhero".to_string()))
            .await
            .unwrap();
        assert_eq!(found.data.experience, quests.data[0].reward_xp);
    }

    #[tokio::test]
    async fn non_numeric_ids_are_bad_requests() {
        let state = test_state();
        let err = get_user(State(state.clone()), Path("abc".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = get_user(State(state), Path("41".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn transaction_is_recorded_then_confirmed() {
        let state = test_state();
        let (_, Json(tx)) = create_transaction(
            State(state.clone()),
            Json(
                serde_json::from_value(json!({
                    "walletAddress": "0xabc",
                    "transactionType": "purchase",
                    "amount": "250",
                    "tokenAddress": "0xcqt",
                    "txHash": "0xfeed"
                }))
                .unwrap(),
            ),
        )
        .await
        .unwrap();
        assert_eq!(tx.data.status, TransactionStatus::Pending);

        let Json(done) = update_transaction_status(
            State(state.clone()),
            Path("0xfeed".to_string()),
            Json(serde_json::from_value(json!({ "status": "confirmed", "blockNumber": 99 })).unwrap()),
        )
        .await
        .unwrap();
        assert_eq!(done.data.status, TransactionStatus::Confirmed);

        let Json(listed) = wallet_transactions(State(state), Path("0xabc".to_string())).await;
        assert_eq!(listed.data.len(), 1);
        assert_eq!(listed.data[0].block_number, Some(99));
    }

    #[tokio::test]
    async fn proposal_votes_are_listed() {
        let state = test_state();
        create_proposal(
            State(state.clone()),
            Json(
                serde_json::from_value(json!({
                    "proposalId": 3,
                    "proposer": "0xdao",
                    "title": "Open the Ember Gate",
                    "description": "Unlock the next region"
                }))
                .unwrap(),
            ),
        )
        .await
        .unwrap();
        cast_vote(
            State(state.clone()),
            Json(
                serde_json::from_value(json!({
                    "proposalId": 3,
                    "voter": "0xa",
                    "support": true,
                    "weight": "12.5"
                }))
                .unwrap(),
            ),
        )
        .await
        .unwrap();

        let Json(votes) = proposal_votes(State(state.clone()), Path("3".to_string()))
            .await
            .unwrap();
        assert_eq!(votes.data.len(), 1);

        let Json(proposals) = list_proposals(State(state)).await;
        let body = serde_json::to_value(&proposals.data[0]).unwrap();
        assert_eq!(body["forVotes"], "12.5");
        assert_eq!(body["status"], "pending");
    }

    #[tokio::test]
    async fn cqt_price_serializes_market_fields() {
        let Json(price) = cqt_price(State(test_state())).await;
        let body = serde_json::to_value(&price.data).unwrap();
        assert!((body["price"].as_f64().unwrap() - 0.0247).abs() < 1e-9);
        assert!(body["volume24h"].is_u64());
        assert!(body["change24h"].is_f64());
    }
}
