//! OpenAI-compatible chat completions client (Groq by default).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatResponse, LlmClient, LlmError, ToolCall, ToolSchema};
use crate::config::LlmConfig;

/// Request body for `POST /chat/completions`.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolSchema]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

/// Client for any endpoint speaking the OpenAI chat completions dialect.
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: api_key.into(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn request_body<'a>(
        &self,
        model: &'a str,
        messages: &'a [ChatMessage],
        tools: Option<&'a [ToolSchema]>,
    ) -> ChatCompletionRequest<'a> {
        let tools = tools.filter(|t| !t.is_empty());
        ChatCompletionRequest {
            model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools,
            tool_choice: tools.map(|_| "auto"),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolSchema]>,
    ) -> Result<ChatResponse, LlmError> {
        let body = self.request_body(model, messages, tools);

        tracing::debug!(
            model = %model,
            messages = messages.len(),
            tools = body.tools.map(|t| t.len()).unwrap_or(0),
            "Sending chat completion request"
        );

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        parse_response(&text)
    }
}

fn parse_response(text: &str) -> Result<ChatResponse, LlmError> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(text).map_err(|e| LlmError::Decode(e.to_string()))?;

    let message = parsed
        .choices
        .into_iter()
        .next()
        .ok_or(LlmError::EmptyChoices)?
        .message;

    Ok(ChatResponse {
        content: message.content,
        tool_calls: message.tool_calls.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> OpenAiCompatibleClient {
        OpenAiCompatibleClient::new(&LlmConfig::default(), "test-key").unwrap()
    }

    #[test]
    fn request_without_tools_omits_tool_choice() {
        let client = client();
        let messages = vec![ChatMessage::user("hi")];
        let body = serde_json::to_value(client.request_body("m", &messages, None)).unwrap();
        assert_eq!(body["model"], "m");
        assert_eq!(body["max_tokens"], 2000);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn request_with_tools_sets_auto_choice() {
        let client = client();
        let messages = vec![ChatMessage::user("hi")];
        let tools = vec![ToolSchema::function("browser_snapshot", "snap", json!({"type": "object"}))];
        let body =
            serde_json::to_value(client.request_body("m", &messages, Some(&tools))).unwrap();
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["function"]["name"], "browser_snapshot");
    }

    #[test]
    fn parses_tool_call_response() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "browser_navigate",
                            "arguments": "{\"url\":\"http://localhost:5500\"}"
                        }
                    }]
                }
            }]
        })
        .to_string();

        let response = parse_response(&raw).unwrap();
        assert!(response.content.is_none());
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id, "call_1");
        assert_eq!(response.tool_calls[0].function.name, "browser_navigate");
    }

    #[test]
    fn parses_text_response() {
        let raw = json!({"choices": [{"message": {"content": "Alice has 3 items."}}]}).to_string();
        let response = parse_response(&raw).unwrap();
        assert_eq!(response.content.as_deref(), Some("Alice has 3 items."));
        assert!(!response.has_tool_calls());
    }

    #[test]
    fn empty_choices_is_an_error() {
        let err = parse_response(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, LlmError::EmptyChoices));
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let err = parse_response("not json").unwrap_err();
        assert!(matches!(err, LlmError::Decode(_)));
    }
}
