use serde::{Deserialize, Serialize};

/// Events that move a run between states
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RunEvent {
    /// Partition prefix was listed
    List,
    /// Missing-input alert was delivered
    Notify,
    /// Batch steps were rendered
    Trigger,
    /// Cluster accepted the steps
    Submit,
    /// Polling of the first step started
    Wait,
    /// Warehouse load succeeded
    Load,
    /// Run aborted with the given reason
    Fail(String),
}

impl RunEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Notify => "notify",
            Self::Trigger => "trigger",
            Self::Submit => "submit",
            Self::Wait => "wait",
            Self::Load => "load",
            Self::Fail(_) => "fail",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}
