//! OpenAI-compatible chat completions client over `reqwest`.
//!
//! Used for OpenAI itself, for gateways that speak the same protocol, and for
//! Ollama through its `/v1` endpoint.

use crate::llm::client::{ContentStream, GenerationParams, LLMClient, LLMResponse, TokenUsage};
use crate::llm::coordinator::{ConversationMessage, MessageRole};
use crate::types::{AppError, Result, ToolCall, ToolDefinition};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub struct OpenAIClient {
    http: reqwest::Client,
    api_key: Option<String>,
    api_base: String,
    model: String,
    params: GenerationParams,
}

impl OpenAIClient {
    pub fn new(api_key: Option<String>, api_base: String, model: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::LLM(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: api_key.filter(|key| !key.is_empty()),
            api_base: api_base.trim_end_matches('/').to_string(),
            model,
            params: GenerationParams::default(),
        })
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    fn request_body(&self, messages: &[ConversationMessage]) -> Value {
        json!({
            "model": self.model,
            "messages": messages.iter().map(message_to_json).collect::<Vec<_>>(),
            "temperature": self.params.temperature,
            "max_tokens": self.params.max_tokens,
        })
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.api_base);
        let mut request = self.http.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::LLM(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::LLM(format!(
                "Chat completion request failed ({}): {}",
                status, text
            )));
        }

        Ok(response)
    }

    async fn complete(&self, body: Value) -> Result<LLMResponse> {
        debug!(model = %self.model, "Sending chat completion request");
        let response: Value = self
            .send(&body)
            .await?
            .json()
            .await
            .map_err(|e| AppError::LLM(format!("Failed to parse response: {}", e)))?;
        parse_completion(&response)
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_history(&[ConversationMessage::user(prompt)])
            .await
    }

    async fn generate_with_history(&self, messages: &[ConversationMessage]) -> Result<String> {
        Ok(self.complete(self.request_body(messages)).await?.content)
    }

    async fn generate_with_tools(
        &self,
        messages: &[ConversationMessage],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        let mut body = self.request_body(messages);
        if !tools.is_empty() {
            body["tools"] = Value::Array(
                tools
                    .iter()
                    .map(|t| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": t.name,
                                "description": t.description,
                                "parameters": t.parameters
                            }
                        })
                    })
                    .collect(),
            );
        }
        self.complete(body).await
    }

    async fn generate_json(&self, messages: &[ConversationMessage]) -> Result<Value> {
        let mut body = self.request_body(messages);
        body["response_format"] = json!({"type": "json_object"});
        let response = self.complete(body).await?;
        serde_json::from_str(&response.content)
            .map_err(|e| AppError::LLM(format!("Model did not return valid JSON: {}", e)))
    }

    async fn stream_with_history(&self, messages: &[ConversationMessage]) -> Result<ContentStream> {
        let mut body = self.request_body(messages);
        body["stream"] = Value::Bool(true);

        let response = self.send(&body).await?;
        let mut bytes = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer = String::new();
            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(AppError::LLM(format!("Stream error: {}", e)));
                        break;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline_pos) = buffer.find('\n') {
                    let line = buffer[..newline_pos].trim().to_string();
                    buffer.drain(..=newline_pos);

                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data == "[DONE]" {
                        break 'outer;
                    }
                    if let Some(content) = parse_stream_delta(data) {
                        yield Ok(content);
                    }
                }
            }
        };

        Ok(Box::new(Box::pin(stream)))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn message_to_json(message: &ConversationMessage) -> Value {
    let mut value = json!({
        "role": message.role.as_str(),
        "content": message.content,
    });

    // Node attribution is only meaningful to the API for user/assistant turns.
    if let Some(name) = &message.name {
        if matches!(message.role, MessageRole::User | MessageRole::Assistant) {
            value["name"] = Value::String(sanitize_name(name));
        }
    }

    if !message.tool_calls.is_empty() {
        value["tool_calls"] = Value::Array(
            message
                .tool_calls
                .iter()
                .map(|tc| {
                    json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": tc.arguments.to_string()
                        }
                    })
                })
                .collect(),
        );
    }

    if let Some(id) = &message.tool_call_id {
        value["tool_call_id"] = Value::String(id.clone());
    }

    value
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

fn parse_completion(response: &Value) -> Result<LLMResponse> {
    let choice = response
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| AppError::LLM("No choices in response".to_string()))?;
    let message = choice
        .get("message")
        .ok_or_else(|| AppError::LLM("No message in response".to_string()))?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let tool_calls: Vec<ToolCall> = message
        .get("tool_calls")
        .and_then(|v| v.as_array())
        .map(|calls| calls.iter().filter_map(parse_tool_call).collect())
        .unwrap_or_default();

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|v| v.as_str())
        .map(String::from)
        .unwrap_or_else(|| {
            if tool_calls.is_empty() {
                "stop".to_string()
            } else {
                "tool_calls".to_string()
            }
        });

    let usage = response.get("usage").map(|u| {
        let field = |name: &str| u.get(name).and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        TokenUsage::new(field("prompt_tokens"), field("completion_tokens"))
    });

    Ok(LLMResponse {
        content,
        tool_calls,
        finish_reason,
        usage,
    })
}

/// Arguments arrive as a JSON-encoded string. Undecodable arguments are kept
/// as the raw string so callers can decide how to handle them.
fn parse_tool_call(call: &Value) -> Option<ToolCall> {
    let function = call.get("function")?;
    let name = function.get("name")?.as_str()?.to_string();
    let arguments = match function.get("arguments") {
        Some(Value::String(raw)) => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
        }
        Some(other) => other.clone(),
        None => Value::Null,
    };
    let id = call
        .get("id")
        .and_then(|v| v.as_str())
        .map(String::from)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    Some(ToolCall {
        id,
        name,
        arguments,
    })
}

fn parse_stream_delta(data: &str) -> Option<String> {
    let value: Value = serde_json::from_str(data).ok()?;
    let content = value
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()?;
    if content.is_empty() {
        None
    } else {
        Some(content.to_string())
    }
}
