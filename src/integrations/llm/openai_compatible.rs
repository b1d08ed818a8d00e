use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ChatCompletion, ChatMessage, ChatProvider, ChatRequest, ChatRole, ProviderKind, TokenUsage};
use crate::{
    error::{AppError, Result},
    integrations::http::{build_client, join_url, read_json},
};

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

fn role_name(role: ChatRole) -> &'static str {
    match role {
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    }
}

/// `/chat/completions` client shared by OpenAI, DeepSeek and xAI.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    kind: ProviderKind,
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatibleClient {
    pub fn new(kind: ProviderKind, api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        let http = build_client(kind.as_str(), timeout)?;
        Ok(Self {
            kind,
            http,
            api_key,
            base_url,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleClient {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        let model = request
            .model
            .as_deref()
            .unwrap_or_else(|| self.kind.default_model());

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system.as_deref() {
            messages.push(WireMessage {
                role: "system",
                content: system,
            });
        }
        messages.extend(request.messages.iter().map(|m: &ChatMessage| WireMessage {
            role: role_name(m.role),
            content: &m.content,
        }));

        let body = CompletionBody {
            model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request.json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let response = self
            .http
            .post(join_url(&self.base_url, "/chat/completions"))
            .bearer_auth(self.api_key.trim())
            .json(&body)
            .send()
            .await?;
        let parsed: CompletionResponse = read_json(self.kind.as_str(), "chat completion", response).await?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                AppError::ExternalAPI(format!("{} returned an empty completion", self.kind))
            })?;

        Ok(ChatCompletion {
            provider: self.kind,
            model: parsed.model.unwrap_or_else(|| model.to_string()),
            content,
            usage: parsed.usage.map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
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
    async fn json_mode_sets_response_format() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer ds-key")
            .match_body(Matcher::PartialJson(json!({
                "model": "deepseek-chat",
                "response_format": {"type": "json_object"},
                "messages": [
                    {"role": "system", "content": "be terse"},
                    {"role": "user", "content": "rate this"}
                ]
            })))
            .with_status(200)
            .with_body(
                json!({
                    "model": "deepseek-chat",
                    "choices": [{"message": {"role": "assistant", "content": "{\"score\": 80}"}}],
                    "usage": {"prompt_tokens": 12, "completion_tokens": 5}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = OpenAiCompatibleClient::new(
            ProviderKind::DeepSeek,
            "ds-key".into(),
            server.url(),
            Duration::from_secs(5),
        )
        .unwrap();
        let completion = client
            .complete(&ChatRequest::user("rate this").with_system("be terse").json())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(completion.content, "{\"score\": 80}");
        assert_eq!(completion.usage.unwrap().output_tokens, 5);
    }

    #[tokio::test]
    async fn empty_choices_are_an_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let client = OpenAiCompatibleClient::new(
            ProviderKind::OpenAi,
            "key".into(),
            server.url(),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = client.complete(&ChatRequest::user("hi")).await.unwrap_err();
        assert!(matches!(err, AppError::ExternalAPI(_)));
    }
}
