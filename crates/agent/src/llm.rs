//! Model-serving boundary.
//!
//! [`LlmClient`] is the seam the rest of the crate talks to. The shipped
//! implementation speaks the OpenAI-compatible Chat Completions protocol, which
//! both OpenAI and Ollama expose.

use std::time::Duration;

use async_trait::async_trait;
use courtside_core::config::LlmConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::AgentError;

/// Declared shape of an agent's final message.
#[derive(Clone, Debug, PartialEq)]
pub enum OutputShape {
    Text,
    Structured { name: &'static str, schema: Value },
}

impl OutputShape {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Structured { name, .. } => name,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// JSON-encoded argument object, exactly as the model produced it.
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChatMessage {
    User { content: String },
    Assistant { content: Option<String>, tool_calls: Vec<ToolCall> },
    Tool { call_id: String, content: String },
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User { content: content.into() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub agent: &'static str,
    pub model: String,
    pub instructions: String,
    pub messages: Vec<ChatMessage>,
    pub output: OutputShape,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CompletionResponse {
    Message(String),
    ToolCalls(Vec<ToolCall>),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest)
        -> Result<CompletionResponse, AgentError>;
}

pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    timeout_secs: u64,
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, reqwest::Error> {
        let http =
            reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        let endpoint =
            format!("{}/chat/completions", config.effective_base_url().trim_end_matches('/'));

        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, AgentError> {
        let agent = request.agent;
        let mut builder = self.http.post(&self.endpoint).json(&request_body(request));
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|error| transport_error(agent, self.timeout_secs, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Provider {
                agent,
                status: status.as_u16(),
                body: truncate(&body, 512),
            });
        }

        let payload: ChatCompletionResponse =
            response.json().await.map_err(|error| AgentError::MalformedOutput {
                agent,
                message: format!("could not decode completion payload: {error}"),
            })?;

        parse_completion(agent, payload)
    }
}

fn transport_error(agent: &'static str, timeout_secs: u64, error: reqwest::Error) -> AgentError {
    if error.is_timeout() {
        return AgentError::Timeout { agent, secs: timeout_secs };
    }
    AgentError::Transport { agent, message: error.to_string() }
}

pub(crate) fn request_body(request: &CompletionRequest) -> Value {
    let mut messages = vec![json!({ "role": "system", "content": request.instructions })];
    messages.extend(request.messages.iter().map(message_to_wire));

    let mut body = json!({ "model": request.model, "messages": messages });

    if let OutputShape::Structured { name, schema } = &request.output {
        body["response_format"] = json!({
            "type": "json_schema",
            "json_schema": { "name": name, "schema": schema, "strict": true }
        });
    }

    if !request.tools.is_empty() {
        body["tools"] = Value::Array(
            request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                })
                .collect(),
        );
    }

    body
}

fn message_to_wire(message: &ChatMessage) -> Value {
    match message {
        ChatMessage::User { content } => json!({ "role": "user", "content": content }),
        ChatMessage::Assistant { content, tool_calls } => {
            let calls = tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": { "name": call.name, "arguments": call.arguments }
                    })
                })
                .collect::<Vec<_>>();
            json!({ "role": "assistant", "content": content, "tool_calls": calls })
        }
        ChatMessage::Tool { call_id, content } => {
            json!({ "role": "tool", "tool_call_id": call_id, "content": content })
        }
    }
}

pub(crate) fn parse_completion(
    agent: &'static str,
    payload: ChatCompletionResponse,
) -> Result<CompletionResponse, AgentError> {
    let Some(choice) = payload.choices.into_iter().next() else {
        return Err(AgentError::MalformedOutput {
            agent,
            message: "completion contained no choices".to_string(),
        });
    };

    let tool_calls = choice.message.tool_calls.unwrap_or_default();
    if !tool_calls.is_empty() {
        return Ok(CompletionResponse::ToolCalls(
            tool_calls
                .into_iter()
                .map(|call| ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments: call.function.arguments,
                })
                .collect(),
        ));
    }

    match choice.message.content {
        Some(content) => Ok(CompletionResponse::Message(content)),
        None => Err(AgentError::MalformedOutput {
            agent,
            message: choice
                .message
                .refusal
                .map(|refusal| format!("model refused: {refusal}"))
                .unwrap_or_else(|| "completion message had no content".to_string()),
        }),
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated = value.chars().take(max_chars).collect::<String>();
    truncated.push('…');
    truncated
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
    refusal: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        parse_completion, request_body, ChatCompletionResponse, ChatMessage, CompletionRequest,
        CompletionResponse, OutputShape, ToolCall, ToolDefinition,
    };
    use crate::error::AgentError;

    fn request(output: OutputShape, tools: Vec<ToolDefinition>) -> CompletionRequest {
        CompletionRequest {
            agent: "Intent Judge",
            model: "gpt-4o-mini".to_string(),
            instructions: "classify".to_string(),
            messages: vec![ChatMessage::user("When is practice?")],
            output,
            tools,
        }
    }

    #[test]
    fn structured_request_carries_strict_json_schema() {
        let body = request_body(&request(
            OutputShape::Structured {
                name: "IntentChecker",
                schema: json!({ "type": "object" }),
            },
            Vec::new(),
        ));

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0], json!({ "role": "system", "content": "classify" }));
        assert_eq!(body["messages"][1], json!({ "role": "user", "content": "When is practice?" }));
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "IntentChecker");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn text_request_with_tools_lists_functions() {
        let mut request = request(
            OutputShape::Text,
            vec![ToolDefinition {
                name: "run_sql",
                description: "runs sql",
                parameters: json!({ "type": "object" }),
            }],
        );
        request.messages.push(ChatMessage::Assistant {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "run_sql".to_string(),
                arguments: "{\"sql_query\":\"SELECT 1\"}".to_string(),
            }],
        });
        request.messages.push(ChatMessage::Tool {
            call_id: "call_1".to_string(),
            content: "{\"rows\":[]}".to_string(),
        });

        let body = request_body(&request);

        assert!(body.get("response_format").is_none());
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "run_sql");
        assert_eq!(body["messages"][2]["tool_calls"][0]["function"]["name"], "run_sql");
        assert_eq!(body["messages"][3]["role"], "tool");
        assert_eq!(body["messages"][3]["tool_call_id"], "call_1");
    }

    #[test]
    fn parses_message_and_tool_call_completions() {
        let message: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"sql_query\":\"SELECT 1\"}" } }]
        }))
        .expect("payload should decode");
        assert_eq!(
            parse_completion("SQL Agent", message).expect("message completion"),
            CompletionResponse::Message("{\"sql_query\":\"SELECT 1\"}".to_string())
        );

        let tool_calls: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{ "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_9",
                    "type": "function",
                    "function": { "name": "run_sql", "arguments": "{\"sql_query\":\"SELECT 1\"}" }
                }]
            } }]
        }))
        .expect("payload should decode");
        let parsed = parse_completion("Agents Response Moderator", tool_calls)
            .expect("tool call completion");
        assert!(matches!(parsed, CompletionResponse::ToolCalls(ref calls) if calls[0].id == "call_9"));
    }

    #[test]
    fn empty_or_refused_completion_is_malformed() {
        let empty: ChatCompletionResponse =
            serde_json::from_value(json!({ "choices": [] })).expect("payload should decode");
        assert!(matches!(
            parse_completion("Intent Judge", empty),
            Err(AgentError::MalformedOutput { .. })
        ));

        let refused: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "content": null, "refusal": "cannot help" } }]
        }))
        .expect("payload should decode");
        let error = parse_completion("Intent Judge", refused).expect_err("refusal should fail");
        assert!(error.to_string().contains("cannot help"));
    }
}
