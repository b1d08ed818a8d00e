//! AI analysis for contracts, markets, players and investments.
//!
//! Every operation asks the chat vendor for a JSON object. Replies that are
//! not valid JSON are mined with regular expressions, and anything still
//! missing takes a fixed default. When the vendor call itself fails the whole
//! default analysis is returned with `source: "fallback"`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::{
    error::{AppError, Result},
    integrations::llm::{ChatRequest, ChatRouter, ProviderKind},
    utils::require_non_empty,
};

static JSON_FENCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*\n?(\{.*?\})\s*\n?```").expect("JSON fence regex pattern should be valid")
});

static BULLET_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[-*•]|\d+[.)])\s+(.+)$").expect("bullet regex pattern should be valid")
});

static RECOMMENDATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)recommendation\W{0,5}(strong buy|strong sell|buy|hold|sell)")
        .expect("recommendation regex pattern should be valid")
});

static SENTIMENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(bullish|neutral|bearish)\b").expect("sentiment regex pattern should be valid")
});

static RISK_LEVEL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)risk(?:\s+level)?\W{0,5}(low|moderate|medium|high)\b")
        .expect("risk level regex pattern should be valid")
});

static PRICE_TARGET_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)price\s+target\W{0,5}(\$?\d+(?:\.\d+)?)").expect("price target regex pattern should be valid")
});

const CONTRACT_SYSTEM_PROMPT: &str = "You are a smart contract security expert. Analyze the provided contract for \
security vulnerabilities (reentrancy, overflow, access control), gas optimization opportunities and code quality. \
Reply with a JSON object with the keys securityScore, gasEfficiency, codeQuality, trustScore (integers 0-100), \
vulnerabilities and recommendations (arrays of short strings).";

const MARKET_SYSTEM_PROMPT: &str = "You are a crypto market analyst specializing in gaming tokens. Assess price \
movement, volume trends, market sentiment and gaming sector positioning. Reply with a JSON object with the keys \
sentiment (Bullish, Neutral or Bearish), priceTarget, riskLevel (Low, Moderate or High), recommendation \
(Strong Buy, Buy, Hold or Sell), keyFactors (array of strings) and timeframe.";

const GAMING_SYSTEM_PROMPT: &str = "You are a gaming strategy AI specializing in blockchain MMORPGs. Recommend \
character optimization, resource allocation, guild participation, token earning and risk management. Reply with a \
JSON object with the keys priorityActions, resourceAllocation, riskManagement (arrays of strings), expectedROI \
(integer percent 0-100) and timeframe.";

const INVESTMENT_SYSTEM_PROMPT: &str = "You are a Web3 investment analyst focusing on gaming projects. Evaluate \
technology, market positioning, team credibility, token economics and risk factors. Reply with a JSON object with \
the keys overallScore, upside, confidence (integers 0-100), recommendation (Buy, Hold or Sell) and riskFactors \
(array of strings).";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    /// Vendor replied with usable JSON.
    AiJson,
    /// Vendor replied with prose; fields were extracted from text.
    AiText,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis<T> {
    #[serde(flatten)]
    pub result: T,
    pub source: AnalysisSource,
    pub provider: Option<ProviderKind>,
}

pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

fn score<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u8, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let raw = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    raw.map(clamp_score)
        .ok_or_else(|| serde::de::Error::custom("score must be numeric"))
}

/// Accepts `["a", "b"]`, `"a"` or a list of objects with a text field.
fn string_list<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    fn item_text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(map) => ["description", "title", "name", "issue", "text"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .map(|s| s.trim().to_string()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    let value = Value::deserialize(deserializer)?;
    let items: Vec<String> = match &value {
        Value::Array(items) => items.iter().filter_map(item_text).collect(),
        other => item_text(other).into_iter().collect(),
    };
    Ok(items.into_iter().filter(|s| !s.is_empty()).collect())
}

fn text_field<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(serde::de::Error::custom("expected text")),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContractAnalysis {
    #[serde(deserialize_with = "score")]
    pub security_score: u8,
    #[serde(deserialize_with = "score")]
    pub gas_efficiency: u8,
    #[serde(deserialize_with = "score")]
    pub code_quality: u8,
    #[serde(deserialize_with = "string_list")]
    pub vulnerabilities: Vec<String>,
    #[serde(deserialize_with = "string_list")]
    pub recommendations: Vec<String>,
    #[serde(deserialize_with = "score")]
    pub trust_score: u8,
}

impl Default for ContractAnalysis {
    fn default() -> Self {
        Self {
            security_score: 85,
            gas_efficiency: 78,
            code_quality: 82,
            vulnerabilities: vec!["Minor access control improvements needed".to_string()],
            recommendations: vec![
                "Add ReentrancyGuard".to_string(),
                "Optimize gas usage".to_string(),
            ],
            trust_score: 85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketInsights {
    #[serde(deserialize_with = "text_field")]
    pub sentiment: String,
    #[serde(deserialize_with = "text_field")]
    pub price_target: String,
    #[serde(deserialize_with = "text_field")]
    pub risk_level: String,
    #[serde(deserialize_with = "text_field")]
    pub recommendation: String,
    #[serde(deserialize_with = "string_list")]
    pub key_factors: Vec<String>,
    #[serde(deserialize_with = "text_field")]
    pub timeframe: String,
}

impl Default for MarketInsights {
    fn default() -> Self {
        Self {
            sentiment: "Neutral".to_string(),
            price_target: "n/a".to_string(),
            risk_level: "Moderate".to_string(),
            recommendation: "Hold".to_string(),
            key_factors: vec![
                "Gaming sector growth".to_string(),
                "Strong fundamentals".to_string(),
            ],
            timeframe: "30 days".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GamingStrategy {
    #[serde(deserialize_with = "string_list")]
    pub priority_actions: Vec<String>,
    #[serde(deserialize_with = "string_list")]
    pub resource_allocation: Vec<String>,
    #[serde(deserialize_with = "string_list")]
    pub risk_management: Vec<String>,
    #[serde(rename = "expectedROI", alias = "expectedRoi", deserialize_with = "score")]
    pub expected_roi: u8,
    #[serde(deserialize_with = "text_field")]
    pub timeframe: String,
}

impl Default for GamingStrategy {
    fn default() -> Self {
        Self {
            priority_actions: vec![
                "Focus on character development".to_string(),
                "Join competitive guild".to_string(),
            ],
            resource_allocation: vec![
                "60% equipment".to_string(),
                "30% guild".to_string(),
                "10% trading".to_string(),
            ],
            risk_management: vec![
                "Diversify holdings".to_string(),
                "Set stop losses".to_string(),
            ],
            expected_roi: 15,
            timeframe: "1 week".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvestmentAnalysis {
    #[serde(deserialize_with = "score")]
    pub overall_score: u8,
    #[serde(deserialize_with = "text_field")]
    pub recommendation: String,
    #[serde(deserialize_with = "string_list")]
    pub risk_factors: Vec<String>,
    #[serde(deserialize_with = "score")]
    pub upside: u8,
    #[serde(deserialize_with = "score")]
    pub confidence: u8,
}

impl Default for InvestmentAnalysis {
    fn default() -> Self {
        Self {
            overall_score: 75,
            recommendation: "Hold".to_string(),
            risk_factors: vec![
                "Market volatility".to_string(),
                "Regulatory changes".to_string(),
            ],
            upside: 25,
            confidence: 70,
        }
    }
}

/// Field extraction from a free-text reply.
trait FromReplyText: Default {
    fn from_reply_text(text: &str) -> Self;
}

impl FromReplyText for ContractAnalysis {
    fn from_reply_text(text: &str) -> Self {
        let defaults = Self::default();
        Self {
            security_score: score_in(text, "security").unwrap_or(defaults.security_score),
            gas_efficiency: score_in(text, "gas").unwrap_or(defaults.gas_efficiency),
            code_quality: score_in(text, "quality").unwrap_or(defaults.code_quality),
            vulnerabilities: non_empty_or(section_items(text, "vulnerab"), defaults.vulnerabilities),
            recommendations: non_empty_or(section_items(text, "recommend"), defaults.recommendations),
            trust_score: score_in(text, "trust").unwrap_or(defaults.trust_score),
        }
    }
}

impl FromReplyText for MarketInsights {
    fn from_reply_text(text: &str) -> Self {
        let defaults = Self::default();
        Self {
            sentiment: capture(&SENTIMENT_REGEX, text)
                .map(|s| title_case(&s))
                .unwrap_or(defaults.sentiment),
            price_target: capture(&PRICE_TARGET_REGEX, text)
                .map(|p| if p.starts_with('$') { p } else { format!("${}", p) })
                .unwrap_or(defaults.price_target),
            risk_level: capture(&RISK_LEVEL_REGEX, text)
                .map(|r| title_case(&r))
                .unwrap_or(defaults.risk_level),
            recommendation: capture(&RECOMMENDATION_REGEX, text)
                .map(|r| title_case(&r))
                .unwrap_or(defaults.recommendation),
            key_factors: non_empty_or(section_items(text, "factor"), defaults.key_factors),
            timeframe: defaults.timeframe,
        }
    }
}

impl FromReplyText for GamingStrategy {
    fn from_reply_text(text: &str) -> Self {
        let defaults = Self::default();
        Self {
            priority_actions: non_empty_or(section_items(text, "priorit"), defaults.priority_actions),
            resource_allocation: non_empty_or(section_items(text, "resource"), defaults.resource_allocation),
            risk_management: non_empty_or(section_items(text, "risk"), defaults.risk_management),
            expected_roi: score_in(text, "roi").unwrap_or(defaults.expected_roi),
            timeframe: defaults.timeframe,
        }
    }
}

impl FromReplyText for InvestmentAnalysis {
    fn from_reply_text(text: &str) -> Self {
        let defaults = Self::default();
        Self {
            overall_score: score_in(text, "overall").unwrap_or(defaults.overall_score),
            recommendation: capture(&RECOMMENDATION_REGEX, text)
                .map(|r| title_case(&r))
                .unwrap_or(defaults.recommendation),
            risk_factors: non_empty_or(section_items(text, "risk"), defaults.risk_factors),
            upside: score_in(text, "upside").unwrap_or(defaults.upside),
            confidence: score_in(text, "confidence").unwrap_or(defaults.confidence),
        }
    }
}

fn non_empty_or(items: Vec<String>, default: Vec<String>) -> Vec<String> {
    if items.is_empty() {
        default
    } else {
        items
    }
}

fn capture(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn title_case(value: &str) -> String {
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Finds `label ... 92` style scores, e.g. "Security: 92" or "trust score 80".
fn score_in(text: &str, label: &str) -> Option<u8> {
    let pattern = format!(
        r"(?i)\b{}\w*(?:\s+[a-z]+){{0,2}}?\s*[:=\-]?\s*(\d{{1,3}}(?:\.\d+)?)",
        regex::escape(label)
    );
    let regex = Regex::new(&pattern).ok()?;
    let raw = regex.captures(text)?.get(1)?.as_str().parse::<f64>().ok()?;
    Some(clamp_score(raw))
}

/// Bullet items listed under the first line mentioning `heading`.
fn section_items(text: &str, heading: &str) -> Vec<String> {
    let heading = heading.to_ascii_lowercase();
    let mut items = Vec::new();
    let mut in_section = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(caps) = BULLET_REGEX.captures(trimmed) {
            if in_section {
                let item = caps[1].trim_matches(|c: char| c == '*' || c == ' ').to_string();
                if !item.is_empty() {
                    items.push(item);
                }
            }
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }
        if !items.is_empty() {
            break;
        }
        in_section = trimmed.to_ascii_lowercase().contains(&heading);
    }

    items
}

/// Pulls a JSON object out of a reply: the whole text, a fenced block, or the
/// outermost braces.
fn extract_json_object(reply: &str) -> Option<Value> {
    let trimmed = reply.trim();
    let candidates = [
        Some(trimmed.to_string()),
        JSON_FENCE_REGEX
            .captures(trimmed)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string()),
        match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if start < end => Some(trimmed[start..=end].to_string()),
            _ => None,
        },
    ];

    candidates
        .into_iter()
        .flatten()
        .filter_map(|candidate| serde_json::from_str::<Value>(&candidate).ok())
        .find(Value::is_object)
}

fn parse_reply<T: FromReplyText + DeserializeOwned>(reply: &str) -> (T, AnalysisSource) {
    if let Some(value) = extract_json_object(reply) {
        match serde_json::from_value::<T>(value) {
            Ok(parsed) => return (parsed, AnalysisSource::AiJson),
            Err(err) => tracing::debug!(error = %err, "AI reply JSON did not match, using text extraction"),
        }
    }
    (T::from_reply_text(reply), AnalysisSource::AiText)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAnalysisInput {
    pub contract_code: String,
    #[serde(default)]
    pub contract_address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenSnapshot {
    pub name: String,
    pub symbol: String,
    pub price: f64,
    #[serde(alias = "volume24h")]
    pub volume_24h: f64,
    pub market_cap: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketInsightsInput {
    pub token_data: TokenSnapshot,
    #[serde(default)]
    pub price_history: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerProfile {
    pub level: u32,
    pub experience: u64,
    pub inventory: Value,
    pub guild_status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameMetrics {
    pub avg_session: f64,
    pub win_rate: f64,
    pub token_balance: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamingStrategyInput {
    pub player_data: PlayerProfile,
    #[serde(default)]
    pub game_metrics: GameMetrics,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectProfile {
    pub name: String,
    pub token: String,
    pub market_cap: f64,
    pub tvl: f64,
    pub active_users: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketContext {
    pub sector_growth: f64,
    pub competition: String,
    pub regulatory: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentAnalysisInput {
    pub project_data: ProjectProfile,
    #[serde(default)]
    pub market_context: MarketContext,
}

pub struct AIService {
    router: Arc<ChatRouter>,
}

impl AIService {
    pub fn new(router: Arc<ChatRouter>) -> Self {
        Self { router }
    }

    async fn analyze<T>(
        &self,
        operation: &'static str,
        system: &str,
        prompt: String,
        max_tokens: u32,
    ) -> Result<Analysis<T>>
    where
        T: FromReplyText + DeserializeOwned,
    {
        let request = ChatRequest::user(prompt)
            .with_system(system)
            .with_max_tokens(max_tokens)
            .json();

        match self.router.complete(None, &request).await {
            Ok(completion) => {
                let (result, source) = parse_reply::<T>(&completion.content);
                tracing::info!(operation, provider = %completion.provider, ?source, "AI analysis completed");
                Ok(Analysis {
                    result,
                    source,
                    provider: Some(completion.provider),
                })
            }
            Err(err @ AppError::BadRequest(_)) => Err(err),
            Err(err) => {
                tracing::warn!(operation, error = %err, "AI analysis failed, returning default result");
                Ok(Analysis {
                    result: T::default(),
                    source: AnalysisSource::Fallback,
                    provider: None,
                })
            }
        }
    }

    pub async fn analyze_smart_contract(
        &self,
        input: &ContractAnalysisInput,
    ) -> Result<Analysis<ContractAnalysis>> {
        let code = require_non_empty(&input.contract_code, "contractCode")?;
        let prompt = format!(
            "Analyze this smart contract:\nAddress: {}\nCode:\n{}\n\nFocus on security, gas efficiency, and overall quality. Provide actionable recommendations.",
            input.contract_address.trim(),
            code
        );
        self.analyze("contract_analysis", CONTRACT_SYSTEM_PROMPT, prompt, 1500).await
    }

    pub async fn market_insights(&self, input: &MarketInsightsInput) -> Result<Analysis<MarketInsights>> {
        let token = &input.token_data;
        require_non_empty(&token.symbol, "tokenData.symbol")?;
        // last week only
        let recent: Vec<&Value> = input
            .price_history
            .iter()
            .skip(input.price_history.len().saturating_sub(7))
            .collect();
        let prompt = format!(
            "Analyze this gaming token:\nToken: {} ({})\nCurrent Price: ${}\n24h Volume: ${}\nMarket Cap: ${}\n\nPrice History: {}\n\nProvide comprehensive market analysis for gaming industry context.",
            token.name,
            token.symbol,
            token.price,
            token.volume_24h,
            token.market_cap,
            serde_json::to_string(&recent)?
        );
        self.analyze("market_insights", MARKET_SYSTEM_PROMPT, prompt, 2000).await
    }

    pub async fn gaming_strategy(&self, input: &GamingStrategyInput) -> Result<Analysis<GamingStrategy>> {
        let player = &input.player_data;
        let metrics = &input.game_metrics;
        let prompt = format!(
            "Optimize strategy for this player:\nLevel: {}\nExperience: {}\nResources: {}\nGuild Status: {}\n\nGame Metrics:\nAverage Session: {} minutes\nWin Rate: {}%\nToken Balance: {}\n\nProvide comprehensive optimization strategy.",
            player.level,
            player.experience,
            player.inventory,
            player.guild_status,
            metrics.avg_session,
            metrics.win_rate,
            metrics.token_balance
        );
        self.analyze("gaming_strategy", GAMING_SYSTEM_PROMPT, prompt, 1000).await
    }

    pub async fn investment_analysis(
        &self,
        input: &InvestmentAnalysisInput,
    ) -> Result<Analysis<InvestmentAnalysis>> {
        let project = &input.project_data;
        require_non_empty(&project.name, "projectData.name")?;
        let market = &input.market_context;
        let prompt = format!(
            "Evaluate this gaming investment:\nProject: {}\nToken: {}\nMarket Cap: ${}\nTVL: ${}\nActive Users: {}\n\nMarket Context:\nGaming Sector Growth: {}%\nCompetition Level: {}\nRegulatory Environment: {}\n\nProvide comprehensive investment analysis.",
            project.name,
            project.token,
            project.market_cap,
            project.tvl,
            project.active_users,
            market.sector_growth,
            market.competition,
            market.regulatory
        );
        self.analyze("investment_analysis", INVESTMENT_SYSTEM_PROMPT, prompt, 1500).await
    }
}
