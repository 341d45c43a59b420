use thiserror::Error;

use crate::{access::AccessError, flows::FlowTransitionError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("store unavailable: {0}")]
    Persistence(String),
    #[error("record already exists: {0}")]
    Conflict(String),
}

/// What the chat edge is allowed to show. Internal detail stays in `detail`
/// and only reaches logs.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("forbidden: {detail}")]
    Forbidden { detail: String, correlation_id: String },
    #[error("conflict: {detail}")]
    Conflict { detail: String, correlation_id: String },
    #[error("store unavailable: {detail}")]
    Unavailable { detail: String, correlation_id: String },
    #[error("dialogue fault: {detail}")]
    DialogueFault { detail: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Forbidden { .. } => "Only administrators can do that.",
            Self::Conflict { .. } => "That record already exists.",
            Self::Unavailable { .. } => {
                "The grade records are unavailable right now. Send the same message again shortly."
            }
            Self::DialogueFault { .. } => {
                "Something went wrong and the dialogue was closed. Please start again."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Forbidden { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::Unavailable { correlation_id, .. }
            | Self::DialogueFault { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::Domain(DomainError::Access(error)) => {
                InterfaceError::Forbidden { detail: error.to_string(), correlation_id }
            }
            Self::Domain(DomainError::FlowTransition(error)) => {
                InterfaceError::DialogueFault { detail: error.to_string(), correlation_id }
            }
            Self::Conflict(detail) => InterfaceError::Conflict { detail, correlation_id },
            Self::Persistence(detail) => InterfaceError::Unavailable { detail, correlation_id },
        }
    }
}
