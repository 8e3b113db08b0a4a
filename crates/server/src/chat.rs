//! Chat page and the submit endpoint behind it.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use courtside_agent::ConversationOrchestrator;
use courtside_core::domain::transcript::TranscriptEntry;
use courtside_core::errors::{ApplicationError, DomainError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tera::{Context, Tera};
use tracing::{error, info, warn};
use uuid::Uuid;

const CHAT_TEMPLATE: &str = include_str!("../templates/chat.html");

#[derive(Clone)]
pub struct ChatState {
    orchestrator: Arc<ConversationOrchestrator>,
    templates: Arc<Tera>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Raw history returned by the previous call; absent on the first turn.
    #[serde(default)]
    pub state: Option<Vec<Value>>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub transcript: Vec<TranscriptEntry>,
    pub state: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct ChatError {
    pub error: String,
    pub correlation_id: String,
}

fn init_templates() -> Result<Arc<Tera>, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_template("chat.html", CHAT_TEMPLATE)?;
    Ok(Arc::new(tera))
}

pub fn router(orchestrator: Arc<ConversationOrchestrator>) -> Result<Router, tera::Error> {
    let state = ChatState { orchestrator, templates: init_templates()? };

    Ok(Router::new()
        .route("/", get(chat_page))
        .route("/api/chat", post(submit))
        .with_state(state))
}

pub async fn chat_page(State(state): State<ChatState>) -> Result<Html<String>, StatusCode> {
    let mut context = Context::new();
    context.insert("title", "Athlete Assistant");
    context.insert(
        "subtitle",
        "Ask about your training schedule, or about sports rules and strategy.",
    );
    context.insert("placeholder", "What time is tomorrow's training?");

    state.templates.render("chat.html", &context).map(Html).map_err(|err| {
        error!(event_name = "server.chat.template_error", error = ?err, "chat page render failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// The `on_user_submit` entry point: one message plus prior state in, the
/// displayable transcript plus new state out.
pub async fn submit(
    State(state): State<ChatState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ChatError>)> {
    if request.message.trim().is_empty() {
        let correlation_id = Uuid::new_v4().to_string();
        let interface =
            ApplicationError::from(DomainError::EmptyUserMessage).into_interface(&correlation_id);
        warn!(
            event_name = "server.chat.rejected",
            correlation_id = %correlation_id,
            error = %interface,
            "blank chat message rejected"
        );
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ChatError { error: interface.user_message().to_string(), correlation_id }),
        ));
    }

    let history = request.state.unwrap_or_default();
    info!(event_name = "server.chat.submitted", history_len = history.len(), "chat turn received");

    let outcome = state.orchestrator.handle_conversation(&request.message, history).await;

    Ok(Json(ChatResponse { transcript: outcome.transcript, state: outcome.state }))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use courtside_agent::llm::{CompletionRequest, CompletionResponse, LlmClient};
    use courtside_agent::{AgentError, ConversationOrchestrator};
    use courtside_core::config::AppConfig;
    use courtside_core::domain::schemas::{APOLOGY_TEXT, FALLBACK_TEXT};
    use courtside_db::{SqlExecutor, SqlOutcome};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::router;

    struct QueuedClient {
        replies: Mutex<VecDeque<CompletionResponse>>,
    }

    #[async_trait]
    impl LlmClient for QueuedClient {
        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, AgentError> {
            let reply = self.replies.lock().expect("replies").pop_front();
            reply.ok_or(AgentError::Transport {
                agent: request.agent,
                message: "model offline".to_string(),
            })
        }
    }

    struct NoRows;

    #[async_trait]
    impl SqlExecutor for NoRows {
        async fn run_sql(&self, _query: &str) -> SqlOutcome {
            SqlOutcome::Rows(Vec::new())
        }
    }

    fn app(replies: Vec<CompletionResponse>) -> Router {
        let client = QueuedClient { replies: Mutex::new(replies.into()) };
        let orchestrator = ConversationOrchestrator::from_config(
            &AppConfig::default(),
            Arc::new(client),
            Arc::new(NoRows),
        );
        router(Arc::new(orchestrator)).expect("chat template should compile")
    }

    fn unhandled_intent() -> CompletionResponse {
        CompletionResponse::Message(
            json!({ "SQL_agent": false, "knowledge_agent": false }).to_string(),
        )
    }

    async fn post_chat(app: Router, body: Value) -> (StatusCode, Value) {
        let request = Request::post("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request should build");
        let response = app.oneshot(request).await.expect("router should respond");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
        (status, serde_json::from_slice(&bytes).expect("body should be json"))
    }

    #[tokio::test]
    async fn chat_page_renders_the_assistant_shell() {
        let request = Request::get("/").body(Body::empty()).expect("request should build");
        let response = app(Vec::new()).oneshot(request).await.expect("router should respond");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
        let html = String::from_utf8(bytes.to_vec()).expect("page should be utf-8");
        assert!(html.contains("<title>Athlete Assistant</title>"));
        assert!(html.contains("fetch(\"api/chat\""));
        assert!(html.contains("What time is tomorrow&#x27;s training?"));
    }

    #[tokio::test]
    async fn first_turn_returns_transcript_and_state() {
        let (status, body) =
            post_chat(app(vec![unhandled_intent()]), json!({ "message": "Hello there" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["transcript"],
            json!([
                { "role": "user", "content": "Hello there" },
                { "role": "assistant", "content": FALLBACK_TEXT }
            ])
        );
        assert_eq!(body["state"], body["transcript"]);
    }

    #[tokio::test]
    async fn prior_state_is_threaded_through() {
        let prior = json!([
            { "role": "user", "content": "Hi" },
            { "role": "assistant", "content": "Hello!" },
            { "role": "system", "content": "ignored on display" }
        ]);

        let (status, body) = post_chat(
            app(vec![unhandled_intent()]),
            json!({ "message": "Anything new?", "state": prior }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"].as_array().map(Vec::len), Some(5));
        assert_eq!(body["transcript"].as_array().map(Vec::len), Some(4));
        assert_eq!(body["transcript"][2]["content"], "Anything new?");
    }

    #[tokio::test]
    async fn blank_message_is_a_bad_request() {
        let (status, body) = post_chat(app(Vec::new()), json!({ "message": "   " })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please type a message before sending.");
        assert!(body["correlation_id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn model_outage_is_answered_with_an_apology() {
        let (status, body) =
            post_chat(app(Vec::new()), json!({ "message": "When is training?" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transcript"][1]["content"], APOLOGY_TEXT);
    }
}
