use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one run for one partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Run created, nothing listed yet
    #[default]
    Pending,
    /// Partition prefix listed, gate not yet applied
    Listed,
    /// No input found and the alert was sent
    Notified,
    /// Batch steps rendered for the partition
    Triggered,
    /// Steps accepted by the cluster
    Submitted,
    /// Polling the first submitted step (and loading once it succeeds)
    Waiting,
    /// Warehouse load finished
    Loaded,
    /// Run aborted; requires a manual re-run
    Failed,
}

impl RunState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Notified | Self::Loaded | Self::Failed)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Notified | Self::Loaded)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Listed => write!(f, "listed"),
            Self::Notified => write!(f, "notified"),
            Self::Triggered => write!(f, "triggered"),
            Self::Submitted => write!(f, "submitted"),
            Self::Waiting => write!(f, "waiting"),
            Self::Loaded => write!(f, "loaded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "listed" => Ok(Self::Listed),
            "notified" => Ok(Self::Notified),
            "triggered" => Ok(Self::Triggered),
            "submitted" => Ok(Self::Submitted),
            "waiting" => Ok(Self::Waiting),
            "loaded" => Ok(Self::Loaded),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid run state: {s}")),
        }
    }
}
