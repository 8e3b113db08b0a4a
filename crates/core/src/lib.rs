//! Shared configuration, error taxonomy, and conversation data model.

pub mod config;
pub mod domain;
pub mod errors;

pub use domain::schemas::{
    FinalResponse, FrontDeskReply, IntentDecision, KnowledgeAnswer, ModeratedText, ReplyValue,
    SqlResult, TurnContext,
};
pub use domain::transcript::{sanitize, Role, TranscriptEntry};
pub use errors::{ApplicationError, DomainError, InterfaceError};
