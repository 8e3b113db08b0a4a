use std::fs;
use std::path::Path;
use std::sync::Arc;

use courtside_agent::{ConversationOrchestrator, OpenAiCompatibleClient};
use courtside_core::config::{AppConfig, LoadOptions};
use courtside_core::domain::transcript::TranscriptEntry;
use courtside_db::PgSqlExecutor;
use serde::Serialize;
use serde_json::Value;

use crate::commands::{serialize_payload, CommandResult};

#[derive(Debug, Serialize)]
struct AskOutput {
    command: &'static str,
    status: &'static str,
    correlation_id: Option<String>,
    transcript: Vec<TranscriptEntry>,
    state: Vec<Value>,
}

/// Runs one conversation turn end to end, threading prior state from `state_path`.
pub fn run(message: &str, state_path: Option<&Path>) -> CommandResult {
    if message.trim().is_empty() {
        return CommandResult::failure("ask", "invalid_input", "message must not be empty", 3);
    }

    let history = match state_path.map(read_state).transpose() {
        Ok(history) => history.unwrap_or_default(),
        Err(message) => return CommandResult::failure("ask", "invalid_state", message, 3),
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("ask", "config_validation", error.to_string(), 2);
        }
    };

    let client = match OpenAiCompatibleClient::from_config(&config.llm) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure("ask", "llm_client", error.to_string(), 5);
        }
    };
    let orchestrator = ConversationOrchestrator::from_config(
        &config,
        Arc::new(client),
        Arc::new(PgSqlExecutor::new(&config.database)),
    );

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure("ask", "runtime", error.to_string(), 5);
        }
    };

    let outcome = runtime.block_on(orchestrator.handle_conversation(message, history));

    let payload = AskOutput {
        command: "ask",
        status: if outcome.context.is_some() { "ok" } else { "degraded" },
        correlation_id: outcome.context.map(|context| context.correlation_id),
        transcript: outcome.transcript,
        state: outcome.state,
    };
    CommandResult { exit_code: 0, output: serialize_payload(&payload) }
}

fn read_state(path: &Path) -> Result<Vec<Value>, String> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("could not read state file `{}`: {error}", path.display()))?;
    serde_json::from_str::<Vec<Value>>(&raw)
        .map_err(|error| format!("state file `{}` is not a JSON array: {error}", path.display()))
}
