use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub wallet_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: i64,
    pub user_id: Option<i64>,
    pub wallet_address: String,
    pub level: i32,
    pub experience: i64,
    pub health: i32,
    pub mana: i32,
    pub attack_damage: i32,
    pub defense: i32,
    pub agility: i32,
    pub luck: i32,
    pub inventory: Vec<i64>,
    pub skills: Vec<i64>,
    pub guild_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_level() -> i32 {
    1
}

fn default_pool() -> i32 {
    100
}

fn default_attack() -> i32 {
    10
}

fn default_stat() -> i32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlayer {
    pub wallet_address: String,
    pub user_id: Option<i64>,
    #[serde(default = "default_level")]
    pub level: i32,
    #[serde(default)]
    pub experience: i64,
    #[serde(default = "default_pool")]
    pub health: i32,
    #[serde(default = "default_pool")]
    pub mana: i32,
    #[serde(default = "default_attack")]
    pub attack_damage: i32,
    #[serde(default = "default_stat")]
    pub defense: i32,
    #[serde(default = "default_stat")]
    pub agility: i32,
    #[serde(default = "default_stat")]
    pub luck: i32,
    #[serde(default)]
    pub inventory: Vec<i64>,
    #[serde(default)]
    pub skills: Vec<i64>,
    pub guild_id: Option<i64>,
}

/// Partial player update; absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    pub level: Option<i32>,
    pub experience: Option<i64>,
    pub health: Option<i32>,
    pub mana: Option<i32>,
    pub attack_damage: Option<i32>,
    pub defense: Option<i32>,
    pub agility: Option<i32>,
    pub luck: Option<i32>,
    pub inventory: Option<Vec<i64>>,
    pub skills: Option<Vec<i64>>,
    pub guild_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Guild {
    pub id: i64,
    pub name: String,
    pub leader_id: Option<i64>,
    pub description: Option<String>,
    pub member_count: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGuild {
    pub name: String,
    pub leader_id: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[serde(rename = "rewardXP")]
    pub reward_xp: i64,
    #[serde(with = "rust_decimal::serde::str")]
    pub reward_tokens: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerQuest {
    pub id: i64,
    pub player_id: i64,
    pub quest_id: i64,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerQuestView {
    pub player_quest: PlayerQuest,
    pub quest: Quest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    #[default]
    Common,
    Rare,
    Epic,
    Legendary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub attack_bonus: i32,
    pub defense_bonus: i32,
    pub mana_bonus: i32,
    pub health_bonus: i32,
    pub rarity: Rarity,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub attack_bonus: i32,
    #[serde(default)]
    pub defense_bonus: i32,
    #[serde(default)]
    pub mana_bonus: i32,
    #[serde(default)]
    pub health_bonus: i32,
    #[serde(default)]
    pub rarity: Rarity,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Purchase,
    Stake,
    Swap,
    Farming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransaction {
    pub id: i64,
    pub user_id: Option<i64>,
    pub wallet_address: String,
    pub transaction_type: TransactionType,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub token_address: String,
    pub tx_hash: String,
    pub block_number: Option<u64>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTokenTransaction {
    pub user_id: Option<i64>,
    pub wallet_address: String,
    pub transaction_type: TransactionType,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub token_address: String,
    pub tx_hash: String,
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatusUpdate {
    pub status: TransactionStatus,
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingPosition {
    pub id: i64,
    pub user_id: Option<i64>,
    pub wallet_address: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub staked_amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub rewards_earned: Decimal,
    pub pool_id: i64,
    pub start_time: DateTime<Utc>,
    pub last_claim_time: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStakingPosition {
    pub user_id: Option<i64>,
    pub wallet_address: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub staked_amount: Decimal,
    #[serde(default)]
    pub pool_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Active,
    Defeated,
    Succeeded,
    Executed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaoProposal {
    pub id: i64,
    pub proposal_id: i64,
    pub proposer: String,
    pub title: String,
    pub description: String,
    pub targets: Vec<String>,
    pub values: Vec<String>,
    pub calldatas: Vec<String>,
    pub vote_start: Option<DateTime<Utc>>,
    pub vote_end: Option<DateTime<Utc>>,
    #[serde(with = "rust_decimal::serde::str")]
    pub for_votes: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub against_votes: Decimal,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDaoProposal {
    pub proposal_id: i64,
    pub proposer: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub calldatas: Vec<String>,
    pub vote_start: Option<DateTime<Utc>>,
    pub vote_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaoVote {
    pub id: i64,
    pub proposal_id: i64,
    pub voter: String,
    pub support: bool,
    #[serde(with = "rust_decimal::serde::str")]
    pub weight: Decimal,
    pub reason: Option<String>,
    pub voted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDaoVote {
    pub proposal_id: i64,
    pub voter: String,
    pub support: bool,
    #[serde(with = "rust_decimal::serde::str")]
    pub weight: Decimal,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangePrice {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub volume: u64,
}

/// CQT market snapshot served by `/api/cqt-price`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CqtPrice {
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(rename = "change24h", with = "rust_decimal::serde::float")]
    pub change_24h: Decimal,
    #[serde(rename = "volume24h")]
    pub volume_24h: u64,
    pub market_cap: u64,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub exchanges: Vec<ExchangePrice>,
}
