//! Per-turn conversation pipeline.
//!
//! A turn classifies the user's message, runs the SQL branch and then the
//! knowledge branch as the intent flags ask, and closes each branch with the
//! front desk. When both branches run, the knowledge branch's reply is the one
//! kept. The transcript is owned by the caller and threaded through each call.

use std::sync::Arc;

use courtside_core::config::AppConfig;
use courtside_core::domain::schemas::{
    FinalResponse, FrontDeskReply, IntentDecision, KnowledgeAnswer, ModeratedText, SqlResult,
    TurnContext, APOLOGY_TEXT,
};
use courtside_core::domain::transcript::{sanitize, TranscriptEntry};
use courtside_core::errors::{ApplicationError, DomainError};
use courtside_db::sql_tool::SqlExecutor;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::guardrails::SqlStatementPolicy;
use crate::invoke::{AgentInput, AgentInvoker};
use crate::llm::LlmClient;
use crate::registry::{AgentRegistry, AgentRole};
use crate::tools::{SqlQueryTool, ToolRegistry};

/// What a turn hands back to the presentation layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnOutcome {
    /// Well-formed entries only, ready for display.
    pub transcript: Vec<TranscriptEntry>,
    /// The raw history to pass into the next turn.
    pub state: Vec<Value>,
    pub context: Option<TurnContext>,
}

pub struct ConversationOrchestrator {
    invoker: AgentInvoker,
}

impl ConversationOrchestrator {
    pub fn new(invoker: AgentInvoker) -> Self {
        Self { invoker }
    }

    /// Wires the standard role table and the SQL tool from configuration.
    pub fn from_config(
        config: &AppConfig,
        client: Arc<dyn LlmClient>,
        executor: Arc<dyn SqlExecutor>,
    ) -> Self {
        let mut tools = ToolRegistry::default();
        tools.register(SqlQueryTool::new(
            executor,
            SqlStatementPolicy::new(config.database.allow_writes),
        ));

        let invoker = AgentInvoker::new(
            Arc::new(AgentRegistry::standard(&config.llm.model)),
            client,
            Arc::new(tools),
            &config.llm,
        );
        Self::new(invoker)
    }

    /// Runs one turn and appends the exchange to `history`. Errors propagate and
    /// the history is dropped with them.
    pub async fn run_turn(
        &self,
        user_input: &str,
        mut history: Vec<Value>,
    ) -> Result<TurnOutcome, ApplicationError> {
        let correlation_id = Uuid::new_v4().to_string();
        let context = self.respond(user_input, &correlation_id).await?;
        append_exchange(&mut history, user_input, &context.last_response.display_text());
        Ok(finish(history, Some(context)))
    }

    /// Failure-safe entry point: any error becomes an apology in the transcript.
    pub async fn handle_conversation(
        &self,
        user_input: &str,
        mut history: Vec<Value>,
    ) -> TurnOutcome {
        let correlation_id = Uuid::new_v4().to_string();
        match self.respond(user_input, &correlation_id).await {
            Ok(context) => {
                append_exchange(&mut history, user_input, &context.last_response.display_text());
                finish(history, Some(context))
            }
            Err(err) => {
                error!(
                    event_name = "conversation.turn.failed",
                    correlation_id = %correlation_id,
                    error = %err,
                    "turn failed; replying with apology"
                );
                append_exchange(&mut history, user_input, APOLOGY_TEXT);
                finish(history, None)
            }
        }
    }

    async fn respond(
        &self,
        user_input: &str,
        correlation_id: &str,
    ) -> Result<TurnContext, ApplicationError> {
        if user_input.trim().is_empty() {
            return Err(DomainError::EmptyUserMessage.into());
        }

        info!(event_name = "conversation.turn.started", correlation_id, "turn started");

        let intent: IntentDecision = self
            .invoker
            .invoke(AgentRole::IntentJudge, AgentInput::text(user_input), correlation_id)
            .await?;
        info!(
            event_name = "conversation.intent.classified",
            correlation_id,
            needs_sql = intent.needs_sql,
            needs_knowledge = intent.needs_knowledge,
            "intent classified"
        );

        let mut last_response = FinalResponse::fallback();

        if intent.needs_sql {
            let sql: SqlResult = self
                .invoker
                .invoke(AgentRole::SqlAgent, AgentInput::text(user_input), correlation_id)
                .await?;
            debug!(
                event_name = "conversation.sql.generated",
                correlation_id,
                sql = %sql.sql_query
            );

            let moderated: ModeratedText = self
                .invoker
                .invoke(AgentRole::Moderator, AgentInput::RawText(sql.sql_query), correlation_id)
                .await?;

            last_response = self.front_desk(moderated.to_string(), correlation_id).await?;
        }

        if intent.needs_knowledge {
            let answer: KnowledgeAnswer = self
                .invoker
                .invoke(AgentRole::KnowledgeAgent, AgentInput::text(user_input), correlation_id)
                .await?;

            last_response = self.front_desk(answer.to_string(), correlation_id).await?;
        }

        if intent.is_unhandled() {
            info!(event_name = "conversation.turn.unhandled", correlation_id, "no agent matched");
        }

        Ok(TurnContext {
            correlation_id: correlation_id.to_string(),
            last_intent: intent,
            last_response,
        })
    }

    async fn front_desk(
        &self,
        message: String,
        correlation_id: &str,
    ) -> Result<FinalResponse, ApplicationError> {
        let reply: FrontDeskReply = self
            .invoker
            .invoke(AgentRole::FrontDesk, AgentInput::RawText(message), correlation_id)
            .await?;
        Ok(FinalResponse::FrontDesk(reply))
    }
}

fn append_exchange(history: &mut Vec<Value>, user_input: &str, reply: &str) {
    history.push(TranscriptEntry::user(user_input).to_value());
    history.push(TranscriptEntry::assistant(reply).to_value());
}

fn finish(state: Vec<Value>, context: Option<TurnContext>) -> TurnOutcome {
    let transcript = sanitize(&state);
    debug!(
        event_name = "conversation.transcript",
        entries = transcript.len(),
        transcript = ?transcript,
        "returning transcript"
    );
    TurnOutcome { transcript, state, context }
}
