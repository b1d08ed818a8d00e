//! Chat-completion vendors behind one trait.

pub mod anthropic;
pub mod openai_compatible;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::{
    config::Config,
    constants::{
        DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, MAX_CHAT_MESSAGE_CHARS, MODEL_CLAUDE,
        MODEL_DEEPSEEK, MODEL_GROK, MODEL_OPENAI,
    },
    error::{AppError, Result},
};

pub use anthropic::AnthropicClient;
pub use openai_compatible::OpenAiCompatibleClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "claude", alias = "anthropic")]
    Claude,
    #[serde(rename = "grok", alias = "xai")]
    Grok,
}

impl ProviderKind {
    /// Preference order when the caller does not pick a vendor.
    pub const DEFAULT_ORDER: [ProviderKind; 4] = [
        ProviderKind::DeepSeek,
        ProviderKind::OpenAi,
        ProviderKind::Claude,
        ProviderKind::Grok,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Claude => "claude",
            ProviderKind::Grok => "grok",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::DeepSeek => MODEL_DEEPSEEK,
            ProviderKind::OpenAi => MODEL_OPENAI,
            ProviderKind::Claude => MODEL_CLAUDE,
            ProviderKind::Grok => MODEL_GROK,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "deepseek" => Ok(ProviderKind::DeepSeek),
            "openai" | "gpt" => Ok(ProviderKind::OpenAi),
            "claude" | "anthropic" => Ok(ProviderKind::Claude),
            "grok" | "xai" => Ok(ProviderKind::Grok),
            other => Err(AppError::BadRequest(format!("Unknown AI provider: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Ask the vendor for a single JSON object as the reply.
    pub json_mode: bool,
}

impl ChatRequest {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            system: None,
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: message.into(),
            }],
            model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            json_mode: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model.filter(|m| !m.trim().is_empty());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.messages.is_empty() || self.messages.iter().all(|m| m.content.trim().is_empty()) {
            return Err(AppError::BadRequest("message is required".to_string()));
        }
        let total: usize = self.messages.iter().map(|m| m.content.chars().count()).sum();
        if total > MAX_CHAT_MESSAGE_CHARS {
            return Err(AppError::BadRequest(format!(
                "message exceeds {} characters",
                MAX_CHAT_MESSAGE_CHARS
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCompletion {
    pub provider: ProviderKind,
    pub model: String,
    pub content: String,
    pub usage: Option<TokenUsage>,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion>;
}

/// Configured chat vendors, kept in preference order.
#[derive(Clone, Default)]
pub struct ChatRouter {
    providers: Vec<Arc<dyn ChatProvider>>,
}

impl ChatRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = config.ai_request_timeout();
        let mut router = Self::new();

        for kind in ProviderKind::DEFAULT_ORDER {
            let provider: Option<Arc<dyn ChatProvider>> = match kind {
                ProviderKind::DeepSeek => config
                    .deepseek_api_key
                    .clone()
                    .map(|key| {
                        OpenAiCompatibleClient::new(kind, key, config.deepseek_api_url.clone(), timeout)
                    })
                    .transpose()?
                    .map(|c| Arc::new(c) as Arc<dyn ChatProvider>),
                ProviderKind::OpenAi => config
                    .openai_api_key
                    .clone()
                    .map(|key| {
                        OpenAiCompatibleClient::new(kind, key, config.openai_api_url.clone(), timeout)
                    })
                    .transpose()?
                    .map(|c| Arc::new(c) as Arc<dyn ChatProvider>),
                ProviderKind::Claude => config
                    .anthropic_api_key
                    .clone()
                    .map(|key| AnthropicClient::new(key, config.anthropic_api_url.clone(), timeout))
                    .transpose()?
                    .map(|c| Arc::new(c) as Arc<dyn ChatProvider>),
                ProviderKind::Grok => config
                    .xai_api_key
                    .clone()
                    .map(|key| {
                        OpenAiCompatibleClient::new(kind, key, config.xai_api_url.clone(), timeout)
                    })
                    .transpose()?
                    .map(|c| Arc::new(c) as Arc<dyn ChatProvider>),
            };

            if let Some(provider) = provider {
                tracing::info!(provider = %kind, "chat provider registered");
                router.register(provider);
            }
        }

        Ok(router)
    }

    pub fn register(&mut self, provider: Arc<dyn ChatProvider>) {
        let kind = provider.kind();
        self.providers.retain(|p| p.kind() != kind);
        self.providers.push(provider);
    }

    pub fn configured(&self) -> Vec<ProviderKind> {
        self.providers.iter().map(|p| p.kind()).collect()
    }

    pub fn default_kind(&self) -> Option<ProviderKind> {
        self.providers.first().map(|p| p.kind())
    }

    pub fn provider(&self, kind: ProviderKind) -> Result<Arc<dyn ChatProvider>> {
        self.providers
            .iter()
            .find(|p| p.kind() == kind)
            .cloned()
            .ok_or_else(|| AppError::NotConfigured(format!("AI provider {}", kind)))
    }

    pub async fn complete(
        &self,
        kind: Option<ProviderKind>,
        request: &ChatRequest,
    ) -> Result<ChatCompletion> {
        request.validate()?;
        let kind = match kind.or_else(|| self.default_kind()) {
            Some(kind) => kind,
            None => return Err(AppError::NotConfigured("AI provider".to_string())),
        };
        let provider = self.provider(kind)?;

        tracing::debug!(provider = %kind, json_mode = request.json_mode, "chat completion request");
        let completion = provider.complete(request).await?;
        tracing::debug!(
            provider = %kind,
            model = %completion.model,
            chars = completion.content.len(),
            "chat completion received"
        );
        Ok(completion)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Provider returning canned replies, recording every request it sees.
    pub struct CannedProvider {
        pub kind: ProviderKind,
        pub reply: Result<String>,
        pub requests: Mutex<Vec<ChatRequest>>,
    }

    impl CannedProvider {
        pub fn replying(kind: ProviderKind, reply: &str) -> Arc<Self> {
            Arc::new(Self {
                kind,
                reply: Ok(reply.to_string()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn failing(kind: ProviderKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                reply: Err(AppError::ExternalAPI("vendor down".to_string())),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatProvider for CannedProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
            self.requests.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(content) => Ok(ChatCompletion {
                    provider: self.kind,
                    model: self.kind.default_model().to_string(),
                    content: content.clone(),
                    usage: None,
                }),
                Err(_) => Err(AppError::ExternalAPI("vendor down".to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::CannedProvider;
    use super::*;

    #[tokio::test]
    async fn default_vendor_is_first_registered() {
        let mut router = ChatRouter::new();
        router.register(CannedProvider::replying(ProviderKind::Claude, "from claude"));
        router.register(CannedProvider::replying(ProviderKind::Grok, "from grok"));

        let completion = router
            .complete(None, &ChatRequest::user("hello"))
            .await
            .unwrap();
        assert_eq!(completion.provider, ProviderKind::Claude);
        assert_eq!(completion.content, "from claude");
    }

    #[tokio::test]
    async fn unconfigured_vendor_is_reported() {
        let mut router = ChatRouter::new();
        router.register(CannedProvider::replying(ProviderKind::DeepSeek, "ok"));

        let err = router
            .complete(Some(ProviderKind::OpenAi), &ChatRequest::user("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotConfigured(_)));

        let err = ChatRouter::new()
            .complete(None, &ChatRequest::user("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let mut router = ChatRouter::new();
        router.register(CannedProvider::replying(ProviderKind::DeepSeek, "ok"));
        let err = router
            .complete(None, &ChatRequest::user("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn router_from_config_follows_preference_order() {
        let config = Config {
            xai_api_key: Some("x".into()),
            openai_api_key: Some("o".into()),
            ..Config::default()
        };
        let router = ChatRouter::from_config(&config).unwrap();
        assert_eq!(router.configured(), vec![ProviderKind::OpenAi, ProviderKind::Grok]);
        assert_eq!(router.default_kind(), Some(ProviderKind::OpenAi));
    }

    #[test]
    fn provider_names_parse_with_aliases() {
        assert_eq!("Anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Claude);
        assert_eq!("xai".parse::<ProviderKind>().unwrap(), ProviderKind::Grok);
        assert!("gemini".parse::<ProviderKind>().is_err());
    }
}
