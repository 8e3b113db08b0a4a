//! Typed result shapes produced by each pipeline stage.
//!
//! Field names on the wire follow what the model is asked to emit; the Rust
//! names describe what the field means to the orchestrator.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const ACKNOWLEDGEMENT_TEXT: &str = "Okay.";
pub const NO_ACTION_TEXT: &str = "No further action.";
pub const FALLBACK_TEXT: &str = "I'm not sure how to help with that yet, but I'll note it down.";
pub const APOLOGY_TEXT: &str =
    "Sorry, something went wrong while handling your request. Please try again.";

/// Routing verdict for one user turn. Both flags may be set at once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentDecision {
    #[serde(rename = "SQL_agent")]
    pub needs_sql: bool,
    #[serde(rename = "knowledge_agent")]
    pub needs_knowledge: bool,
}

impl IntentDecision {
    pub fn new(needs_sql: bool, needs_knowledge: bool) -> Self {
        Self { needs_sql, needs_knowledge }
    }

    pub fn is_unhandled(&self) -> bool {
        !self.needs_sql && !self.needs_knowledge
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlResult {
    pub sql_query: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeAnswer {
    #[serde(rename = "response_to_frontdesk_agent")]
    pub answer: String,
}

impl fmt::Display for KnowledgeAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.answer)
    }
}

/// Free-text rewrite produced by the moderator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModeratedText(pub String);

impl fmt::Display for ModeratedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Either free text or a boolean sentinel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyValue {
    Flag(bool),
    Text(String),
}

impl ReplyValue {
    /// Collapses the sentinel forms to their canned phrases.
    pub fn display_text(&self) -> String {
        match self {
            Self::Flag(true) => ACKNOWLEDGEMENT_TEXT.to_string(),
            Self::Flag(false) => NO_ACTION_TEXT.to_string(),
            Self::Text(text) if text.trim().is_empty() => NO_ACTION_TEXT.to_string(),
            Self::Text(text) => text.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontDeskReply {
    pub respond_to_user: ReplyValue,
    pub ask_the_agent: ReplyValue,
}

/// What the turn settled on before it is rendered for the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FinalResponse {
    Fallback(String),
    FrontDesk(FrontDeskReply),
}

impl FinalResponse {
    pub fn fallback() -> Self {
        Self::Fallback(FALLBACK_TEXT.to_string())
    }

    pub fn display_text(&self) -> String {
        match self {
            Self::Fallback(text) => text.clone(),
            Self::FrontDesk(reply) => reply.respond_to_user.display_text(),
        }
    }
}

/// Per-turn scratch state. Returned for inspection, never read back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TurnContext {
    pub correlation_id: String,
    pub last_intent: IntentDecision,
    pub last_response: FinalResponse,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        FinalResponse, FrontDeskReply, IntentDecision, KnowledgeAnswer, ReplyValue,
        ACKNOWLEDGEMENT_TEXT, FALLBACK_TEXT, NO_ACTION_TEXT,
    };

    #[test]
    fn intent_decision_reads_model_field_names() {
        let decision: IntentDecision =
            serde_json::from_value(json!({ "SQL_agent": true, "knowledge_agent": false }))
                .expect("intent decision should decode");
        assert_eq!(decision, IntentDecision::new(true, false));
        assert!(!decision.is_unhandled());
        assert!(IntentDecision::default().is_unhandled());
    }

    #[test]
    fn knowledge_answer_reads_model_field_name() {
        let answer: KnowledgeAnswer = serde_json::from_value(
            json!({ "response_to_frontdesk_agent": "A try is worth five points." }),
        )
        .expect("knowledge answer should decode");
        assert_eq!(answer.to_string(), "A try is worth five points.");
    }

    #[test]
    fn reply_value_accepts_text_or_flag() {
        let reply: FrontDeskReply = serde_json::from_value(
            json!({ "respond_to_user": true, "ask_the_agent": "check the roster" }),
        )
        .expect("front desk reply should decode");
        assert_eq!(reply.respond_to_user, ReplyValue::Flag(true));
        assert_eq!(reply.ask_the_agent, ReplyValue::Text("check the roster".to_string()));
    }

    #[test]
    fn sentinel_replies_collapse_to_canned_text() {
        assert_eq!(ReplyValue::Flag(true).display_text(), ACKNOWLEDGEMENT_TEXT);
        assert_eq!(ReplyValue::Flag(false).display_text(), NO_ACTION_TEXT);
        assert_eq!(ReplyValue::Text("See you at 6pm".to_string()).display_text(), "See you at 6pm");
        assert_eq!(ReplyValue::Text("   ".to_string()).display_text(), NO_ACTION_TEXT);
    }

    #[test]
    fn final_response_renders_fallback_verbatim() {
        assert_eq!(FinalResponse::fallback().display_text(), FALLBACK_TEXT);

        let front_desk = FinalResponse::FrontDesk(FrontDeskReply {
            respond_to_user: ReplyValue::Text("Training starts at 7am.".to_string()),
            ask_the_agent: ReplyValue::Flag(false),
        });
        assert_eq!(front_desk.display_text(), "Training starts at 7am.");
    }
}
