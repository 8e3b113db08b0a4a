use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use courtside_db::sql_tool::{SqlExecutor, SqlOutcome};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::AgentError;
use crate::guardrails::{GuardrailDecision, SqlStatementPolicy};
use crate::llm::{ToolCall, ToolDefinition};

pub const RUN_SQL_TOOL: &str = "run_sql";

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn definition(&self) -> ToolDefinition;
    async fn execute(&self, input: Value) -> Value;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name(), Arc::new(tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions for the named tools; every name must be registered.
    pub fn definitions(
        &self,
        agent: &'static str,
        names: &[&'static str],
    ) -> Result<Vec<ToolDefinition>, AgentError> {
        names
            .iter()
            .map(|name| {
                self.tools
                    .get(name)
                    .map(|tool| tool.definition())
                    .ok_or_else(|| AgentError::UnknownTool { agent, tool: (*name).to_string() })
            })
            .collect()
    }

    /// Runs one model-issued call, restricted to the tools the agent was given.
    pub async fn execute(
        &self,
        agent: &'static str,
        allowed: &[&'static str],
        call: &ToolCall,
    ) -> Result<Value, AgentError> {
        let tool = allowed
            .iter()
            .find(|name| **name == call.name)
            .and_then(|name| self.tools.get(name))
            .ok_or_else(|| AgentError::UnknownTool { agent, tool: call.name.clone() })?;

        let arguments = match serde_json::from_str::<Value>(&call.arguments) {
            Ok(arguments) => arguments,
            Err(error) => {
                warn!(
                    event_name = "agent.tool.bad_arguments",
                    agent,
                    tool = %call.name,
                    error = %error,
                    "tool arguments were not valid JSON"
                );
                return Ok(json!({ "error": format!("arguments were not valid JSON: {error}") }));
            }
        };

        Ok(tool.execute(arguments).await)
    }
}

/// Exposes the SQL executor to the moderator, screened by the statement policy.
pub struct SqlQueryTool {
    executor: Arc<dyn SqlExecutor>,
    policy: SqlStatementPolicy,
}

impl SqlQueryTool {
    pub fn new(executor: Arc<dyn SqlExecutor>, policy: SqlStatementPolicy) -> Self {
        Self { executor, policy }
    }

    pub async fn run(&self, sql_query: &str) -> SqlOutcome {
        match self.policy.evaluate(sql_query) {
            GuardrailDecision::Allow { kind } => {
                info!(event_name = "agent.tool.sql_allowed", kind = ?kind, "running sql statement");
                self.executor.run_sql(sql_query).await
            }
            GuardrailDecision::Deny { reason_code, user_message } => {
                warn!(
                    event_name = "agent.tool.sql_denied",
                    reason_code,
                    "sql statement rejected by policy"
                );
                SqlOutcome::failed(user_message)
            }
        }
    }
}

#[async_trait]
impl Tool for SqlQueryTool {
    fn name(&self) -> &'static str {
        RUN_SQL_TOOL
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: RUN_SQL_TOOL,
            description: "Executes a SQL query against the athlete schedule database \
                          and returns the matching rows.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "sql_query": { "type": "string", "description": "The SQL statement to run." }
                },
                "required": ["sql_query"],
                "additionalProperties": false
            }),
        }
    }

    async fn execute(&self, input: Value) -> Value {
        let Some(sql_query) = input.get("sql_query").and_then(Value::as_str) else {
            return SqlOutcome::failed("missing string argument `sql_query`").to_tool_output();
        };
        self.run(sql_query).await.to_tool_output()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use courtside_db::sql_tool::{Record, SqlExecutor, SqlOutcome};
    use serde_json::{json, Value};

    use super::{SqlQueryTool, Tool, ToolRegistry, RUN_SQL_TOOL};
    use crate::error::AgentError;
    use crate::guardrails::SqlStatementPolicy;
    use crate::llm::ToolCall;

    #[derive(Default)]
    struct RecordingExecutor {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SqlExecutor for RecordingExecutor {
        async fn run_sql(&self, query: &str) -> SqlOutcome {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(query.to_string());
            }
            let mut record = Record::new();
            record.insert("batch_name".to_string(), Value::String("Morning Sprint".to_string()));
            SqlOutcome::Rows(vec![record])
        }
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[tokio::test]
    async fn allowed_statement_reaches_executor() {
        let executor = Arc::new(RecordingExecutor::default());
        let tool = SqlQueryTool::new(executor.clone(), SqlStatementPolicy::default());

        let output =
            tool.execute(json!({ "sql_query": "SELECT batch_name FROM athlete_batches" })).await;

        assert_eq!(output, json!({ "rows": [{ "batch_name": "Morning Sprint" }] }));
        let seen = executor.seen.lock().map(|seen| seen.clone()).unwrap_or_default();
        assert_eq!(seen, vec!["SELECT batch_name FROM athlete_batches".to_string()]);
    }

    #[tokio::test]
    async fn denied_statement_never_reaches_executor() {
        let executor = Arc::new(RecordingExecutor::default());
        let tool = SqlQueryTool::new(executor.clone(), SqlStatementPolicy::default());

        let outcome = tool.run("DROP TABLE athlete_batches").await;

        assert!(outcome.is_failure());
        assert!(outcome.rows().is_empty());
        let seen = executor.seen.lock().map(|seen| seen.len()).unwrap_or_default();
        assert_eq!(seen, 0);
    }

    #[tokio::test]
    async fn registry_rejects_tools_outside_the_allow_list() {
        let mut registry = ToolRegistry::default();
        registry.register(SqlQueryTool::new(
            Arc::new(RecordingExecutor::default()),
            SqlStatementPolicy::default(),
        ));
        assert_eq!(registry.len(), 1);

        let result = registry
            .execute("Front Desk Agent", &[], &call(RUN_SQL_TOOL, "{\"sql_query\":\"SELECT 1\"}"))
            .await;
        assert!(matches!(result, Err(AgentError::UnknownTool { .. })));

        let definitions = registry.definitions("Intent Judge", &["lookup_weather"]);
        assert!(matches!(definitions, Err(AgentError::UnknownTool { .. })));
    }

    #[tokio::test]
    async fn malformed_arguments_are_reported_to_the_model() {
        let mut registry = ToolRegistry::default();
        registry.register(SqlQueryTool::new(
            Arc::new(RecordingExecutor::default()),
            SqlStatementPolicy::default(),
        ));

        let output = registry
            .execute("Agents Response Moderator", &[RUN_SQL_TOOL], &call(RUN_SQL_TOOL, "not json"))
            .await
            .expect("bad arguments should not fail the call");
        assert!(output["error"].as_str().is_some());

        let missing = registry
            .execute("Agents Response Moderator", &[RUN_SQL_TOOL], &call(RUN_SQL_TOOL, "{}"))
            .await
            .expect("missing argument should not fail the call");
        assert_eq!(missing["rows"], json!([]));
        assert!(missing["error"].as_str().is_some());
    }
}
