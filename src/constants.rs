use rust_decimal::Decimal;

/// Application constants

// API version
pub const API_VERSION: &str = "v1";

// Invoice polling
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 60; // 5 minutes at 5s
pub const DEFAULT_POLL_ERROR_BACKOFF_SECS: u64 = 2;
pub const POLL_EVENT_CHANNEL_CAPACITY: usize = 256;
pub const FINISHED_WATCH_RETENTION_SECS: i64 = 3600;
pub const MAX_FINISHED_WATCHES: usize = 1000;

// Vendor endpoints
pub const STRIKE_API_URL: &str = "https://api.strike.me/v1";
pub const STRIPE_API_URL: &str = "https://api.stripe.com/v1";
pub const COINBASE_API_URL: &str = "https://api.cdp.coinbase.com/platform";
pub const MORALIS_API_URL: &str = "https://deep-index.moralis.io/api/v2.2";
pub const DEEPSEEK_API_URL: &str = "https://api.deepseek.com";
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";
pub const XAI_API_URL: &str = "https://api.x.ai/v1";
pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

// Default chat models
pub const MODEL_DEEPSEEK: &str = "deepseek-chat";
pub const MODEL_OPENAI: &str = "gpt-4o";
pub const MODEL_GROK: &str = "grok-2-1212";
pub const MODEL_CLAUDE: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const MAX_CHAT_MESSAGE_CHARS: usize = 16_000;

// HTTP clients
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 4;
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const ERROR_BODY_EXCERPT_CHARS: usize = 240;

// Coinbase CDP request signing
pub const CDP_JWT_ISSUER: &str = "cdp";
pub const CDP_JWT_TTL_SECS: i64 = 120;
pub const DEFAULT_CHAIN: &str = "polygon";
pub const DEFAULT_NETWORK: &str = "base-sepolia";

// Paymaster (AgentKit)
pub const PAYMASTER_SPONSOR_ADDRESS: &str = "0xCc380FD8bfbdF0c020de64075b86C84c2BB0AE79";
pub const PAYMASTER_MAX_GAS_PER_TX: u64 = 100_000;
pub const PAYMASTER_DAILY_LIMIT: u64 = 1_000_000;
pub const PAYMASTER_DEFAULT_GAS_ESTIMATE: u64 = 50_000;
pub const SUPERPAY_GAS_ESTIMATE: u64 = 21_000;
pub const SUPERPAY_FEE_BPS: u32 = 10; // 0.1%
pub const AGENT_HISTORY_LIMIT: usize = 500;

// WebSocket configuration
pub const WS_HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub const WS_CLIENT_TIMEOUT_SECS: u64 = 60;

// Game data
pub const CQT_REFERENCE_PRICE: Decimal = Decimal::from_parts(247, 0, 0, false, 4); // 0.0247
pub const CQT_REFERENCE_CHANGE_24H: Decimal = Decimal::from_parts(523, 0, 0, false, 2); // 5.23
pub const CQT_REFERENCE_VOLUME_24H: u64 = 1_247_856;
pub const CQT_REFERENCE_MARKET_CAP: u64 = 24_789_456;
