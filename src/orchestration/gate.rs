//! # Existence Gate
//!
//! Chooses the one downstream branch of a run from the partition listing.
//! Only a listing that is present and has at least one key goes to
//! processing; empty, absent and unreadable listings all go to notification.

use crate::orchestration::handoff::{Handoff, RunMessages};
use crate::orchestration::types::ListingResult;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    /// Input exists: trigger, submit, wait and load
    Process,
    /// No input: alert and stop
    Notify,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::Notify => "notify",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ExistenceGate;

impl ExistenceGate {
    pub fn decide(listing: Option<&ListingResult>) -> Branch {
        match listing {
            Some(listing) if !listing.is_empty() => Branch::Process,
            _ => Branch::Notify,
        }
    }

    /// Decide from the listing published in the run's handoff channel
    pub fn decide_from(messages: &RunMessages) -> Branch {
        let listing = ListingResult::from_handoff(messages.pull(Handoff::Listing));
        Self::decide(listing.as_ref())
    }
}
