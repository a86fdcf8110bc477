// src/provider/anthropic.rs — Anthropic Messages API provider

use async_trait::async_trait;

use super::{
    ChatRequest, ChatResponse, Message, ModelInfo, ModelProvider, Role, StopReason, TokenUsage,
    ToolCall,
};
use crate::infra::errors::ReelScoutError;

pub struct AnthropicProvider {
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self) -> &str {
        "https://api.anthropic.com/v1/messages"
    }

    /// Render a conversation message as an Anthropic content block list.
    ///
    /// Tool results become `tool_result` blocks on a user turn; assistant
    /// turns that requested tools carry `tool_use` blocks so follow-up
    /// results can be correlated by id.
    fn render_message(m: &Message) -> serde_json::Value {
        match m.role {
            Role::Tool => serde_json::json!({
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": m.tool_call_id.as_deref().unwrap_or(""),
                    "content": m.content,
                }],
            }),
            Role::Assistant if !m.tool_calls.is_empty() => {
                let mut blocks = Vec::new();
                if !m.content.is_empty() {
                    blocks.push(serde_json::json!({"type": "text", "text": m.content}));
                }
                for tc in &m.tool_calls {
                    blocks.push(serde_json::json!({
                        "type": "tool_use",
                        "id": tc.id,
                        "name": tc.name,
                        "input": tc.arguments,
                    }));
                }
                serde_json::json!({"role": "assistant", "content": blocks})
            }
            Role::Assistant => serde_json::json!({"role": "assistant", "content": m.content}),
            Role::User => serde_json::json!({"role": "user", "content": m.content}),
        }
    }

    fn build_request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> =
            request.messages.iter().map(Self::render_message).collect();

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(4096),
        });

        if let Some(system) = &request.system {
            body["system"] = serde_json::json!([{
                "type": "text",
                "text": system,
                "cache_control": { "type": "ephemeral" }
            }]);
        }

        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        if !request.tools.is_empty() {
            let tools: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    })
                })
                .collect();
            body["tools"] = serde_json::json!(tools);
        }

        body
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn id(&self) -> &str {
        "anthropic"
    }

    fn name(&self) -> &str {
        "Anthropic"
    }

    fn models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                id: "claude-sonnet-4-20250514".into(),
                name: "Claude Sonnet 4".into(),
                context_window: 200_000,
                max_output_tokens: 16_384,
                supports_tools: true,
            },
            ModelInfo {
                id: "claude-opus-4-20250514".into(),
                name: "Claude Opus 4".into(),
                context_window: 200_000,
                max_output_tokens: 32_768,
                supports_tools: true,
            },
            ModelInfo {
                id: "claude-haiku-3-5-20241022".into(),
                name: "Claude 3.5 Haiku".into(),
                context_window: 200_000,
                max_output_tokens: 8_192,
                supports_tools: true,
            },
        ]
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ReelScoutError> {
        let body = self.build_request_body(&request);

        let response = self
            .client
            .post(self.api_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ReelScoutError::Provider {
                provider: "anthropic".into(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ReelScoutError::Provider {
                provider: "anthropic".into(),
                message: format!("HTTP {}: {}", status, error_body),
                retriable: status.is_server_error()
                    || status == reqwest::StatusCode::TOO_MANY_REQUESTS,
            });
        }

        let resp: serde_json::Value =
            response.json().await.map_err(|e| ReelScoutError::Provider {
                provider: "anthropic".into(),
                message: format!("Failed to parse response: {}", e),
                retriable: false,
            })?;

        let content = resp["content"]
            .as_array()
            .unwrap_or(&vec![])
            .iter()
            .filter(|c| c["type"] == "text")
            .map(|c| c["text"].as_str().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("");

        let tool_calls = resp["content"]
            .as_array()
            .unwrap_or(&vec![])
            .iter()
            .filter(|c| c["type"] == "tool_use")
            .map(|c| ToolCall {
                id: c["id"].as_str().unwrap_or("").to_string(),
                name: c["name"].as_str().unwrap_or("").to_string(),
                arguments: c["input"].clone(),
            })
            .collect();

        let usage = TokenUsage {
            input_tokens: resp["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: resp["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
        };

        let stop_reason = match resp["stop_reason"].as_str() {
            Some("end_turn") => StopReason::EndTurn,
            Some("max_tokens") => StopReason::MaxTokens,
            Some("tool_use") => StopReason::ToolUse,
            Some("stop_sequence") => StopReason::StopSequence,
            _ => StopReason::Unknown,
        };

        Ok(ChatResponse {
            content,
            tool_calls,
            usage,
            stop_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_tool_result_message() {
        let m = Message::tool_result("toolu_1", "{\"ok\":true}");
        let v = AnthropicProvider::render_message(&m);
        assert_eq!(v["role"], "user");
        assert_eq!(v["content"][0]["type"], "tool_result");
        assert_eq!(v["content"][0]["tool_use_id"], "toolu_1");
    }

    #[test]
    fn test_render_assistant_with_tool_use() {
        let m = Message::assistant_with_tool_calls(
            "Let me search.",
            vec![ToolCall {
                id: "toolu_2".into(),
                name: "search_reels".into(),
                arguments: serde_json::json!({"queries": ["x"]}),
            }],
        );
        let v = AnthropicProvider::render_message(&m);
        assert_eq!(v["role"], "assistant");
        assert_eq!(v["content"][0]["type"], "text");
        assert_eq!(v["content"][1]["type"], "tool_use");
        assert_eq!(v["content"][1]["name"], "search_reels");
    }

    #[test]
    fn test_build_request_includes_tools_and_system() {
        let p = AnthropicProvider::new("k".into());
        let req = ChatRequest {
            model: "claude-sonnet-4-20250514".into(),
            messages: vec![Message::user("go")],
            tools: vec![super::super::ToolDef {
                name: "search_reels".into(),
                description: "Search".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
            max_tokens: Some(1024),
            temperature: Some(0.2),
            system: Some("strategy".into()),
        };
        let body = p.build_request_body(&req);
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["tools"][0]["name"], "search_reels");
        assert_eq!(body["system"][0]["text"], "strategy");
    }
}
