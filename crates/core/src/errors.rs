use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("user message must not be empty")]
    EmptyUserMessage,
}

/// Failure of one conversation turn, before it is shown to a caller.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("agent call failed: {0}")]
    Agent(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "Please type a message before sending.",
            Self::ServiceUnavailable { .. } => {
                "The assistant is temporarily unavailable. Please try again shortly."
            }
            Self::Internal { .. } => "The assistant is misconfigured. Please contact the staff.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::Domain(error) => {
                InterfaceError::BadRequest { message: error.to_string(), correlation_id }
            }
            Self::Agent(message) => InterfaceError::ServiceUnavailable { message, correlation_id },
            Self::Configuration(message) => InterfaceError::Internal { message, correlation_id },
        }
    }
}
