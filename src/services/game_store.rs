// Player-facing game records (users, players, guilds, quests, items, token
// transactions, staking and DAO votes), kept in process memory.

use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::{
    constants::{
        CQT_REFERENCE_CHANGE_24H, CQT_REFERENCE_MARKET_CAP, CQT_REFERENCE_PRICE,
        CQT_REFERENCE_VOLUME_24H,
    },
    error::{AppError, Result},
    models::game::{
        CqtPrice, DaoProposal, DaoVote, ExchangePrice, Guild, Item, NewDaoProposal, NewDaoVote,
        NewGuild, NewItem, NewPlayer, NewStakingPosition, NewTokenTransaction, NewUser, Player,
        PlayerQuest, PlayerQuestView, PlayerUpdate, ProposalStatus, Quest, Rarity,
        StakingPosition, TokenTransaction, TransactionStatus, TransactionStatusUpdate, User,
    },
    utils::require_non_empty,
};

#[derive(Default)]
struct GameTables {
    users: BTreeMap<i64, User>,
    players: BTreeMap<i64, Player>,
    guilds: BTreeMap<i64, Guild>,
    quests: BTreeMap<i64, Quest>,
    items: BTreeMap<i64, Item>,
    // append-only, so insertion order is creation order
    player_quests: Vec<PlayerQuest>,
    transactions: Vec<TokenTransaction>,
    staking: Vec<StakingPosition>,
    proposals: Vec<DaoProposal>,
    votes: Vec<DaoVote>,
}

fn next_key<V>(table: &BTreeMap<i64, V>) -> i64 {
    table.keys().next_back().map_or(1, |last| last + 1)
}

fn next_row<V>(table: &[V]) -> i64 {
    table.len() as i64 + 1
}

fn require_positive(value: Decimal, field: &str) -> Result<Decimal> {
    if value <= Decimal::ZERO {
        return Err(AppError::BadRequest(format!("{} must be positive", field)));
    }
    Ok(value)
}

impl GameTables {
    fn seeded() -> Self {
        let mut tables = Self::default();
        let now = Utc::now();

        let quests: [(&str, &str, i64, i64); 4] = [
            ("First Steps", "Connect a wallet and create your hero.", 100, 10),
            ("Guild Recruit", "Join or found a guild.", 250, 25),
            ("Stake Your Claim", "Open your first CQT staking position.", 500, 50),
            ("Voice of the Realm", "Vote on a DAO proposal.", 300, 30),
        ];
        for (title, description, reward_xp, reward_tokens) in quests {
            let id = next_key(&tables.quests);
            tables.quests.insert(
                id,
                Quest {
                    id,
                    title: title.to_string(),
                    description: description.to_string(),
                    reward_xp,
                    reward_tokens: Decimal::from(reward_tokens),
                    is_active: true,
                    created_at: now,
                },
            );
        }

        let items = [
            ("Iron Sword", "weapon", 5, 0, 0, 0, Rarity::Common),
            ("Oak Shield", "armor", 0, 4, 0, 0, Rarity::Common),
            ("Mana Draught", "consumable", 0, 0, 25, 0, Rarity::Rare),
            ("Phoenix Plate", "armor", 0, 12, 0, 40, Rarity::Epic),
            ("Satoshi's Edge", "weapon", 25, 0, 10, 0, Rarity::Legendary),
        ];
        for (name, item_type, attack, defense, mana, health, rarity) in items {
            let id = next_key(&tables.items);
            tables.items.insert(
                id,
                Item {
                    id,
                    name: name.to_string(),
                    item_type: item_type.to_string(),
                    attack_bonus: attack,
                    defense_bonus: defense,
                    mana_bonus: mana,
                    health_bonus: health,
                    rarity,
                    description: None,
                    created_at: now,
                },
            );
        }

        tables
    }

    fn with_member_count(&self, guild: &Guild) -> Guild {
        let members = self
            .players
            .values()
            .filter(|p| p.guild_id == Some(guild.id))
            .count();
        Guild {
            member_count: members as u32,
            ..guild.clone()
        }
    }

    fn ensure_guild(&self, guild_id: Option<i64>) -> Result<()> {
        match guild_id {
            Some(id) if !self.guilds.contains_key(&id) => {
                Err(AppError::NotFound(format!("Guild {} not found", id)))
            }
            _ => Ok(()),
        }
    }
}

/// In-memory repository for game data. Records do not survive a restart.
pub struct GameStore {
    tables: RwLock<GameTables>,
}

impl Default for GameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GameStore {
    /// Starts with the starter quests and items.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(GameTables::seeded()),
        }
    }

    // ==================== USERS ====================

    pub async fn create_user(&self, new: NewUser) -> Result<User> {
        let username = require_non_empty(&new.username, "username")?.to_string();
        let wallet_address = match new.wallet_address.as_deref() {
            Some(address) => Some(require_non_empty(address, "walletAddress")?.to_string()),
            None => None,
        };

        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == username) {
            return Err(AppError::Conflict(format!("Username {} is taken", username)));
        }
        if wallet_address.is_some()
            && tables
                .users
                .values()
                .any(|u| u.wallet_address == wallet_address)
        {
            return Err(AppError::Conflict(
                "Wallet address already belongs to a user".to_string(),
            ));
        }

        let id = next_key(&tables.users);
        let user = User {
            id,
            username,
            wallet_address,
            created_at: Utc::now(),
        };
        tables.users.insert(id, user.clone());
        tracing::info!(user_id = id, "user created");
        Ok(user)
    }

    pub async fn get_user(&self, id: i64) -> Result<User> {
        self.tables
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn get_user_by_wallet(&self, address: &str) -> Result<User> {
        self.tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.wallet_address.as_deref() == Some(address))
            .cloned()
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    // ==================== PLAYERS ====================

    pub async fn create_player(&self, new: NewPlayer) -> Result<Player> {
        let wallet_address = require_non_empty(&new.wallet_address, "walletAddress")?.to_string();

        let mut tables = self.tables.write().await;
        if tables
            .players
            .values()
            .any(|p| p.wallet_address == wallet_address)
        {
            return Err(AppError::Conflict(format!(
                "Player for {} already exists",
                wallet_address
            )));
        }
        if let Some(user_id) = new.user_id {
            if !tables.users.contains_key(&user_id) {
                return Err(AppError::NotFound(format!("User {} not found", user_id)));
            }
        }
        tables.ensure_guild(new.guild_id)?;

        let id = next_key(&tables.players);
        let now = Utc::now();
        let player = Player {
            id,
            user_id: new.user_id,
            wallet_address,
            level: new.level,
            experience: new.experience,
            health: new.health,
            mana: new.mana,
            attack_damage: new.attack_damage,
            defense: new.defense,
            agility: new.agility,
            luck: new.luck,
            inventory: new.inventory,
            skills: new.skills,
            guild_id: new.guild_id,
            created_at: now,
            updated_at: now,
        };
        tables.players.insert(id, player.clone());
        tracing::info!(player_id = id, wallet = %player.wallet_address, "player created");
        Ok(player)
    }

    pub async fn get_player(&self, wallet_address: &str) -> Result<Player> {
        self.tables
            .read()
            .await
            .players
            .values()
            .find(|p| p.wallet_address == wallet_address)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Player not found".to_string()))
    }

    pub async fn update_player(&self, id: i64, update: PlayerUpdate) -> Result<Player> {
        let mut tables = self.tables.write().await;
        tables.ensure_guild(update.guild_id)?;
        let player = tables
            .players
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Player not found".to_string()))?;

        if let Some(level) = update.level {
            player.level = level;
        }
        if let Some(experience) = update.experience {
            player.experience = experience;
        }
        if let Some(health) = update.health {
            player.health = health;
        }
        if let Some(mana) = update.mana {
            player.mana = mana;
        }
        if let Some(attack_damage) = update.attack_damage {
            player.attack_damage = attack_damage;
        }
        if let Some(defense) = update.defense {
            player.defense = defense;
        }
        if let Some(agility) = update.agility {
            player.agility = agility;
        }
        if let Some(luck) = update.luck {
            player.luck = luck;
        }
        if let Some(inventory) = update.inventory {
            player.inventory = inventory;
        }
        if let Some(skills) = update.skills {
            player.skills = skills;
        }
        if update.guild_id.is_some() {
            player.guild_id = update.guild_id;
        }
        player.updated_at = Utc::now();

        Ok(player.clone())
    }

    // ==================== GUILDS ====================

    pub async fn list_guilds(&self) -> Vec<Guild> {
        let tables = self.tables.read().await;
        tables
            .guilds
            .values()
            .map(|g| tables.with_member_count(g))
            .collect()
    }

    /// The leader, when given, joins the new guild.
    pub async fn create_guild(&self, new: NewGuild) -> Result<Guild> {
        let name = require_non_empty(&new.name, "name")?.to_string();

        let mut tables = self.tables.write().await;
        if tables.guilds.values().any(|g| g.name == name) {
            return Err(AppError::Conflict(format!("Guild {} already exists", name)));
        }
        if let Some(leader_id) = new.leader_id {
            if !tables.players.contains_key(&leader_id) {
                return Err(AppError::NotFound(format!("Player {} not found", leader_id)));
            }
        }

        let id = next_key(&tables.guilds);
        let guild = Guild {
            id,
            name,
            leader_id: new.leader_id,
            description: new.description,
            member_count: 0,
            created_at: Utc::now(),
        };
        tables.guilds.insert(id, guild.clone());
        if let Some(leader) = new.leader_id.and_then(|lid| tables.players.get_mut(&lid)) {
            leader.guild_id = Some(id);
            leader.updated_at = Utc::now();
        }
        tracing::info!(guild_id = id, name = %guild.name, "guild created");
        Ok(tables.with_member_count(&guild))
    }

    // ==================== QUESTS ====================

    pub async fn active_quests(&self) -> Vec<Quest> {
        self.tables
            .read()
            .await
            .quests
            .values()
            .filter(|q| q.is_active)
            .cloned()
            .collect()
    }

    pub async fn player_quests(&self, player_id: i64) -> Result<Vec<PlayerQuestView>> {
        let tables = self.tables.read().await;
        if !tables.players.contains_key(&player_id) {
            return Err(AppError::NotFound("Player not found".to_string()));
        }
        Ok(tables
            .player_quests
            .iter()
            .filter(|pq| pq.player_id == player_id)
            .filter_map(|pq| {
                tables.quests.get(&pq.quest_id).map(|quest| PlayerQuestView {
                    player_quest: pq.clone(),
                    quest: quest.clone(),
                })
            })
            .collect())
    }

    /// Marks the quest completed and credits its XP to the player.
    pub async fn complete_quest(&self, player_id: i64, quest_id: i64) -> Result<PlayerQuestView> {
        let mut tables = self.tables.write().await;
        let quest = tables
            .quests
            .get(&quest_id)
            .filter(|q| q.is_active)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Quest {} not found", quest_id)))?;
        if !tables.players.contains_key(&player_id) {
            return Err(AppError::NotFound("Player not found".to_string()));
        }

        let now = Utc::now();
        let row = match tables
            .player_quests
            .iter()
            .position(|pq| pq.player_id == player_id && pq.quest_id == quest_id)
        {
            Some(index) => index,
            None => {
                let id = next_row(&tables.player_quests);
                tables.player_quests.push(PlayerQuest {
                    id,
                    player_id,
                    quest_id,
                    completed: false,
                    completed_at: None,
                });
                tables.player_quests.len() - 1
            }
        };

        let player_quest = &mut tables.player_quests[row];
        if player_quest.completed {
            return Err(AppError::Conflict(format!(
                "Quest {} already completed",
                quest_id
            )));
        }
        player_quest.completed = true;
        player_quest.completed_at = Some(now);
        let player_quest = player_quest.clone();

        if let Some(player) = tables.players.get_mut(&player_id) {
            player.experience = player.experience.saturating_add(quest.reward_xp);
            player.updated_at = now;
        }
        tracing::info!(player_id, quest_id, reward_xp = quest.reward_xp, "quest completed");

        Ok(PlayerQuestView {
            player_quest,
            quest,
        })
    }

    // ==================== ITEMS ====================

    pub async fn list_items(&self) -> Vec<Item> {
        self.tables.read().await.items.values().cloned().collect()
    }

    pub async fn create_item(&self, new: NewItem) -> Result<Item> {
        let name = require_non_empty(&new.name, "name")?.to_string();
        let item_type = require_non_empty(&new.item_type, "type")?.to_ascii_lowercase();

        let mut tables = self.tables.write().await;
        let id = next_key(&tables.items);
        let item = Item {
            id,
            name,
            item_type,
            attack_bonus: new.attack_bonus,
            defense_bonus: new.defense_bonus,
            mana_bonus: new.mana_bonus,
            health_bonus: new.health_bonus,
            rarity: new.rarity,
            description: new.description,
            created_at: Utc::now(),
        };
        tables.items.insert(id, item.clone());
        Ok(item)
    }

    // ==================== TOKEN TRANSACTIONS ====================

    pub async fn create_token_transaction(
        &self,
        new: NewTokenTransaction,
    ) -> Result<TokenTransaction> {
        let wallet_address = require_non_empty(&new.wallet_address, "walletAddress")?.to_string();
        let token_address = require_non_empty(&new.token_address, "tokenAddress")?.to_string();
        let tx_hash = require_non_empty(&new.tx_hash, "txHash")?.to_string();
        let amount = require_positive(new.amount, "amount")?;

        let mut tables = self.tables.write().await;
        if tables.transactions.iter().any(|t| t.tx_hash == tx_hash) {
            return Err(AppError::Conflict(format!(
                "Transaction {} already recorded",
                tx_hash
            )));
        }

        let transaction = TokenTransaction {
            id: next_row(&tables.transactions),
            user_id: new.user_id,
            wallet_address,
            transaction_type: new.transaction_type,
            amount,
            token_address,
            tx_hash,
            block_number: new.block_number,
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
        };
        tables.transactions.push(transaction.clone());
        tracing::info!(tx_hash = %transaction.tx_hash, kind = ?transaction.transaction_type, "token transaction recorded");
        Ok(transaction)
    }

    /// Newest first.
    pub async fn token_transactions(&self, wallet_address: &str) -> Vec<TokenTransaction> {
        self.tables
            .read()
            .await
            .transactions
            .iter()
            .rev()
            .filter(|t| t.wallet_address == wallet_address)
            .cloned()
            .collect()
    }

    /// Settles a pending transaction. Settled transactions are final.
    pub async fn update_transaction_status(
        &self,
        tx_hash: &str,
        update: TransactionStatusUpdate,
    ) -> Result<TokenTransaction> {
        if update.status == TransactionStatus::Pending {
            return Err(AppError::BadRequest(
                "status must be confirmed or failed".to_string(),
            ));
        }

        let mut tables = self.tables.write().await;
        let transaction = tables
            .transactions
            .iter_mut()
            .find(|t| t.tx_hash == tx_hash)
            .ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", tx_hash)))?;
        if transaction.status != TransactionStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Transaction {} is already settled",
                tx_hash
            )));
        }

        transaction.status = update.status;
        if update.block_number.is_some() {
            transaction.block_number = update.block_number;
        }
        tracing::info!(tx_hash, status = ?transaction.status, "token transaction settled");
        Ok(transaction.clone())
    }

    // ==================== STAKING ====================

    pub async fn create_staking_position(
        &self,
        new: NewStakingPosition,
    ) -> Result<StakingPosition> {
        let wallet_address = require_non_empty(&new.wallet_address, "walletAddress")?.to_string();
        let staked_amount = require_positive(new.staked_amount, "stakedAmount")?;

        let mut tables = self.tables.write().await;
        let position = StakingPosition {
            id: next_row(&tables.staking),
            user_id: new.user_id,
            wallet_address,
            staked_amount,
            rewards_earned: Decimal::ZERO,
            pool_id: new.pool_id,
            start_time: Utc::now(),
            last_claim_time: None,
            is_active: true,
        };
        tables.staking.push(position.clone());
        Ok(position)
    }

    pub async fn staking_positions(&self, wallet_address: &str) -> Vec<StakingPosition> {
        self.tables
            .read()
            .await
            .staking
            .iter()
            .filter(|p| p.wallet_address == wallet_address && p.is_active)
            .cloned()
            .collect()
    }

    // ==================== DAO ====================

    pub async fn create_dao_proposal(&self, new: NewDaoProposal) -> Result<DaoProposal> {
        let proposer = require_non_empty(&new.proposer, "proposer")?.to_string();
        let title = require_non_empty(&new.title, "title")?.to_string();
        let description = require_non_empty(&new.description, "description")?.to_string();
        if let (Some(start), Some(end)) = (new.vote_start, new.vote_end) {
            if end <= start {
                return Err(AppError::BadRequest(
                    "voteEnd must be after voteStart".to_string(),
                ));
            }
        }

        let mut tables = self.tables.write().await;
        if tables
            .proposals
            .iter()
            .any(|p| p.proposal_id == new.proposal_id)
        {
            return Err(AppError::Conflict(format!(
                "Proposal {} already exists",
                new.proposal_id
            )));
        }

        let proposal = DaoProposal {
            id: next_row(&tables.proposals),
            proposal_id: new.proposal_id,
            proposer,
            title,
            description,
            targets: new.targets,
            values: new.values,
            calldatas: new.calldatas,
            vote_start: new.vote_start,
            vote_end: new.vote_end,
            for_votes: Decimal::ZERO,
            against_votes: Decimal::ZERO,
            status: ProposalStatus::Pending,
            created_at: Utc::now(),
        };
        tables.proposals.push(proposal.clone());
        tracing::info!(proposal_id = proposal.proposal_id, "DAO proposal created");
        Ok(proposal)
    }

    /// Newest first.
    pub async fn dao_proposals(&self) -> Vec<DaoProposal> {
        self.tables
            .read()
            .await
            .proposals
            .iter()
            .rev()
            .cloned()
            .collect()
    }

    /// One vote per voter; the weight is added to the proposal tally.
    pub async fn cast_vote(&self, new: NewDaoVote) -> Result<DaoVote> {
        let voter = require_non_empty(&new.voter, "voter")?.to_string();
        let weight = require_positive(new.weight, "weight")?;

        let mut tables = self.tables.write().await;
        if tables
            .votes
            .iter()
            .any(|v| v.proposal_id == new.proposal_id && v.voter == voter)
        {
            return Err(AppError::Conflict(format!(
                "{} already voted on proposal {}",
                voter, new.proposal_id
            )));
        }
        let proposal = tables
            .proposals
            .iter_mut()
            .find(|p| p.proposal_id == new.proposal_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("Proposal {} not found", new.proposal_id))
            })?;

        let tally = if new.support {
            &mut proposal.for_votes
        } else {
            &mut proposal.against_votes
        };
        *tally = tally
            .checked_add(weight)
            .ok_or_else(|| AppError::BadRequest("vote weight too large".to_string()))?;

        let vote = DaoVote {
            id: next_row(&tables.votes),
            proposal_id: new.proposal_id,
            voter,
            support: new.support,
            weight,
            reason: new.reason,
            voted_at: Utc::now(),
        };
        tables.votes.push(vote.clone());
        tracing::info!(proposal_id = vote.proposal_id, support = vote.support, "DAO vote cast");
        Ok(vote)
    }

    /// Newest first.
    pub async fn dao_votes(&self, proposal_id: i64) -> Result<Vec<DaoVote>> {
        let tables = self.tables.read().await;
        if !tables.proposals.iter().any(|p| p.proposal_id == proposal_id) {
            return Err(AppError::NotFound(format!(
                "Proposal {} not found",
                proposal_id
            )));
        }
        Ok(tables
            .votes
            .iter()
            .rev()
            .filter(|v| v.proposal_id == proposal_id)
            .cloned()
            .collect())
    }

    // ==================== MARKET ====================

    /// Reference CQT market snapshot. There is no live feed behind it.
    pub fn cqt_price(&self) -> CqtPrice {
        let exchanges = [
            ("Uniswap V3", 247, 456_789),
            ("PancakeSwap", 246, 234_567),
            ("SushiSwap", 248, 123_456),
        ]
        .into_iter()
        .map(|(name, price, volume)| ExchangePrice {
            name: name.to_string(),
            price: Decimal::new(price, 4),
            volume,
        })
        .collect();

        CqtPrice {
            price: CQT_REFERENCE_PRICE,
            change_24h: CQT_REFERENCE_CHANGE_24H,
            volume_24h: CQT_REFERENCE_VOLUME_24H,
            market_cap: CQT_REFERENCE_MARKET_CAP,
            timestamp: Utc::now(),
            source: "reference".to_string(),
            exchanges,
        }
    }
}
