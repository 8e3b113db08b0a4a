//! Agent runtime for the athlete assistant.
//!
//! Each user turn flows through a fixed set of model-backed roles:
//! - **Intent Judge** decides whether the message needs a schedule lookup,
//!   a sports-knowledge answer, both, or neither.
//! - **SQL Agent** drafts one PostgreSQL statement; the **Moderator** runs it
//!   through the `run_sql` tool and rewrites the rows as prose.
//! - **Knowledge Agent** answers rules and strategy questions.
//! - **Front Desk Agent** turns any branch result into the user-facing reply.
//!
//! # Key Types
//!
//! - [`orchestrator::ConversationOrchestrator`] - per-turn pipeline
//! - [`invoke::AgentInvoker`] - one typed model call per role, with tool rounds
//! - [`registry::AgentRegistry`] - immutable role table built at startup
//! - [`llm::LlmClient`] - model-serving seam (OpenAI-compatible by default)
//! - [`guardrails::SqlStatementPolicy`] - admission check for generated SQL
//!
//! # Safety Principle
//!
//! Model-written SQL never reaches the database unscreened: the statement
//! policy admits a single read (or, when configured, an insert/update) and the
//! executor opens the transaction read-only unless writes are enabled.

pub mod error;
pub mod guardrails;
pub mod invoke;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod registry;
pub mod tools;

pub use error::AgentError;
pub use invoke::{AgentInput, AgentInvoker, AgentOutput};
pub use llm::{LlmClient, OpenAiCompatibleClient};
pub use orchestrator::{ConversationOrchestrator, TurnOutcome};
pub use registry::{AgentRegistry, AgentRole};
