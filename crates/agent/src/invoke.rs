//! Agent invocation adapter.
//!
//! One call to [`AgentInvoker::invoke`] is one agent turn: the role's
//! instructions and declared output shape are sent to the model, any tool calls
//! the model issues are executed and fed back, and the final message is decoded
//! into the caller's output type. Failures propagate; nothing here retries.

use std::sync::Arc;
use std::time::Duration;

use courtside_core::config::LlmConfig;
use courtside_core::domain::schemas::{
    FrontDeskReply, IntentDecision, KnowledgeAnswer, ModeratedText, SqlResult,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info_span, Instrument};

use crate::error::AgentError;
use crate::llm::{ChatMessage, CompletionRequest, CompletionResponse, LlmClient, OutputShape};
use crate::registry::{AgentRegistry, AgentRole, AgentSpec};
use crate::tools::ToolRegistry;

/// What the caller hands an agent. The caller picks the variant.
#[derive(Clone, Debug, PartialEq)]
pub enum AgentInput {
    RawText(String),
    Structured(Value),
}

impl AgentInput {
    pub fn text(value: impl Into<String>) -> Self {
        Self::RawText(value.into())
    }

    fn into_message(self) -> ChatMessage {
        match self {
            Self::RawText(text) => ChatMessage::user(text),
            Self::Structured(value) => ChatMessage::user(value.to_string()),
        }
    }
}

/// A type an agent can be asked to produce.
pub trait AgentOutput: Sized {
    fn output_shape() -> OutputShape;

    fn decode(raw: &str) -> Result<Self, String>;

    fn shape_name() -> &'static str {
        Self::output_shape().name()
    }
}

impl AgentOutput for IntentDecision {
    fn output_shape() -> OutputShape {
        OutputShape::Structured {
            name: "IntentChecker",
            schema: json!({
                "type": "object",
                "properties": {
                    "SQL_agent": { "type": "boolean" },
                    "knowledge_agent": { "type": "boolean" }
                },
                "required": ["SQL_agent", "knowledge_agent"],
                "additionalProperties": false
            }),
        }
    }

    fn decode(raw: &str) -> Result<Self, String> {
        decode_json(raw)
    }
}

impl AgentOutput for SqlResult {
    fn output_shape() -> OutputShape {
        OutputShape::Structured {
            name: "NLP2SQLOutput",
            schema: json!({
                "type": "object",
                "properties": { "sql_query": { "type": "string" } },
                "required": ["sql_query"],
                "additionalProperties": false
            }),
        }
    }

    fn decode(raw: &str) -> Result<Self, String> {
        decode_json(raw)
    }
}

impl AgentOutput for KnowledgeAnswer {
    fn output_shape() -> OutputShape {
        OutputShape::Structured {
            name: "KnowledgeAgentOutput",
            schema: json!({
                "type": "object",
                "properties": { "response_to_frontdesk_agent": { "type": "string" } },
                "required": ["response_to_frontdesk_agent"],
                "additionalProperties": false
            }),
        }
    }

    fn decode(raw: &str) -> Result<Self, String> {
        decode_json(raw)
    }
}

impl AgentOutput for FrontDeskReply {
    fn output_shape() -> OutputShape {
        let reply_value = json!({ "anyOf": [{ "type": "string" }, { "type": "boolean" }] });
        OutputShape::Structured {
            name: "FrontDeskOutput",
            schema: json!({
                "type": "object",
                "properties": {
                    "respond_to_user": reply_value,
                    "ask_the_agent": reply_value
                },
                "required": ["respond_to_user", "ask_the_agent"],
                "additionalProperties": false
            }),
        }
    }

    fn decode(raw: &str) -> Result<Self, String> {
        decode_json(raw)
    }
}

impl AgentOutput for ModeratedText {
    fn output_shape() -> OutputShape {
        OutputShape::Text
    }

    fn decode(raw: &str) -> Result<Self, String> {
        let text = raw.trim();
        if text.is_empty() {
            return Err("moderator returned an empty message".to_string());
        }
        Ok(Self(text.to_string()))
    }
}

fn decode_json<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    serde_json::from_str(strip_code_fence(raw)).map_err(|error| error.to_string())
}

/// Some OpenAI-compatible servers wrap JSON in a markdown fence.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.strip_prefix("json").unwrap_or(rest);
    body.strip_suffix("```").unwrap_or(body).trim()
}

pub struct AgentInvoker {
    registry: Arc<AgentRegistry>,
    client: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    call_timeout: Duration,
    max_tool_rounds: u32,
}

impl AgentInvoker {
    pub fn new(
        registry: Arc<AgentRegistry>,
        client: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        config: &LlmConfig,
    ) -> Self {
        Self {
            registry,
            client,
            tools,
            call_timeout: Duration::from_secs(config.timeout_secs),
            max_tool_rounds: config.max_tool_rounds,
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub async fn invoke<T: AgentOutput>(
        &self,
        role: AgentRole,
        input: AgentInput,
        correlation_id: &str,
    ) -> Result<T, AgentError> {
        let span = info_span!("agent_call", agent = role.name(), correlation_id);
        self.invoke_inner::<T>(self.registry.get(role), input).instrument(span).await
    }

    async fn invoke_inner<T: AgentOutput>(
        &self,
        spec: &AgentSpec,
        input: AgentInput,
    ) -> Result<T, AgentError> {
        let agent = spec.role.name();
        if spec.output.name() != T::shape_name() {
            return Err(AgentError::ShapeMismatch {
                agent,
                declared: spec.output.name(),
                requested: T::shape_name(),
            });
        }

        let mut request = CompletionRequest {
            agent,
            model: spec.model.clone(),
            instructions: spec.instructions.to_string(),
            messages: vec![input.into_message()],
            output: spec.output.clone(),
            tools: self.tools.definitions(agent, &spec.tools)?,
        };

        let mut rounds = 0;
        loop {
            match self.complete(&request).await? {
                CompletionResponse::Message(raw) => {
                    debug!(event_name = "agent.call.completed", agent, tool_rounds = rounds);
                    return T::decode(&raw)
                        .map_err(|message| AgentError::MalformedOutput { agent, message });
                }
                CompletionResponse::ToolCalls(calls) => {
                    if rounds >= self.max_tool_rounds {
                        return Err(AgentError::ToolRoundsExceeded { agent, rounds });
                    }
                    rounds += 1;

                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        debug!(event_name = "agent.tool.called", agent, tool = %call.name);
                        let output = self.tools.execute(agent, &spec.tools, call).await?;
                        results.push(ChatMessage::Tool {
                            call_id: call.id.clone(),
                            content: output.to_string(),
                        });
                    }

                    request
                        .messages
                        .push(ChatMessage::Assistant { content: None, tool_calls: calls });
                    request.messages.extend(results);
                }
            }
        }
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, AgentError> {
        tokio::time::timeout(self.call_timeout, self.client.complete(request))
            .await
            .map_err(|_| AgentError::Timeout {
                agent: request.agent,
                secs: self.call_timeout.as_secs(),
            })?
    }
}
