use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ChatCompletion, ChatMessage, ChatProvider, ChatRequest, ProviderKind, TokenUsage};
use crate::{
    constants::ANTHROPIC_VERSION,
    error::{AppError, Result},
    integrations::http::{build_client, join_url, read_json},
};

const JSON_ONLY_INSTRUCTION: &str =
    "Respond with a single valid JSON object and nothing else.";

#[derive(Debug, Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: Option<String>,
    content: Vec<ContentBlock>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Anthropic Messages API client.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        let http = build_client("anthropic", timeout)?;
        Ok(Self {
            http,
            api_key,
            base_url,
        })
    }
}

#[async_trait]
impl ChatProvider for AnthropicClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        let model = request
            .model
            .as_deref()
            .unwrap_or(ProviderKind::Claude.default_model());

        // Messages API has no JSON response format; ask for it in the system prompt
        let system = match (request.system.as_deref(), request.json_mode) {
            (Some(system), true) => Some(format!("{}\n\n{}", system, JSON_ONLY_INSTRUCTION)),
            (None, true) => Some(JSON_ONLY_INSTRUCTION.to_string()),
            (system, false) => system.map(str::to_string),
        };

        let body = MessagesBody {
            model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system,
            messages: &request.messages,
        };

        let response = self
            .http
            .post(join_url(&self.base_url, "/v1/messages"))
            .header("x-api-key", self.api_key.trim())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;
        let parsed: MessagesResponse = read_json("anthropic", "messages", response).await?;

        let content = parsed
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");
        if content.trim().is_empty() {
            return Err(AppError::ExternalAPI("claude returned an empty message".to_string()));
        }

        Ok(ChatCompletion {
            provider: ProviderKind::Claude,
            model: parsed.model.unwrap_or_else(|| model.to_string()),
            content,
            usage: parsed.usage.map(|u| TokenUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn sends_version_header_and_joins_text_blocks() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-ant")
            .match_header("anthropic-version", "2023-06-01")
            .match_body(Matcher::PartialJson(json!({
                "model": "claude-sonnet-4-20250514",
                "messages": [{"role": "user", "content": "audit this"}]
            })))
            .with_status(200)
            .with_body(
                json!({
                    "model": "claude-sonnet-4-20250514",
                    "content": [
                        {"type": "text", "text": "{\"securityScore\":"},
                        {"type": "text", "text": " 90}"}
                    ],
                    "usage": {"input_tokens": 10, "output_tokens": 4}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = AnthropicClient::new("sk-ant".into(), server.url(), Duration::from_secs(5)).unwrap();
        let completion = client
            .complete(&ChatRequest::user("audit this").json())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(completion.content, "{\"securityScore\": 90}");
        assert_eq!(completion.provider, ProviderKind::Claude);
    }

    #[tokio::test]
    async fn json_mode_extends_system_prompt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_body(Matcher::Regex("valid JSON object".into()))
            .with_status(200)
            .with_body(r#"{"content":[{"type":"text","text":"{}"}]}"#)
            .create_async()
            .await;

        let client = AnthropicClient::new("k".into(), server.url(), Duration::from_secs(5)).unwrap();
        client
            .complete(&ChatRequest::user("x").with_system("You are an auditor.").json())
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
