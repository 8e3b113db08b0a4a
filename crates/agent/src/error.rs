use courtside_core::errors::ApplicationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{agent} request failed: {message}")]
    Transport { agent: &'static str, message: String },
    #[error("{agent} call timed out after {secs}s")]
    Timeout { agent: &'static str, secs: u64 },
    #[error("{agent} provider returned status {status}: {body}")]
    Provider { agent: &'static str, status: u16, body: String },
    #[error("{agent} returned malformed output: {message}")]
    MalformedOutput { agent: &'static str, message: String },
    #[error("{agent} is declared with output `{declared}` but was invoked for `{requested}`")]
    ShapeMismatch { agent: &'static str, declared: &'static str, requested: &'static str },
    #[error("{agent} still requested tools after {rounds} rounds")]
    ToolRoundsExceeded { agent: &'static str, rounds: u32 },
    #[error("{agent} requested tool `{tool}` which is not available to it")]
    UnknownTool { agent: &'static str, tool: String },
}

impl AgentError {
    pub fn agent(&self) -> &'static str {
        match self {
            Self::Transport { agent, .. }
            | Self::Timeout { agent, .. }
            | Self::Provider { agent, .. }
            | Self::MalformedOutput { agent, .. }
            | Self::ShapeMismatch { agent, .. }
            | Self::ToolRoundsExceeded { agent, .. }
            | Self::UnknownTool { agent, .. } => agent,
        }
    }
}

impl From<AgentError> for ApplicationError {
    fn from(value: AgentError) -> Self {
        match value {
            AgentError::ShapeMismatch { .. } => Self::Configuration(value.to_string()),
            other => Self::Agent(other.to_string()),
        }
    }
}
