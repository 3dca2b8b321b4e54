//! Per-run handoff channel between stages.
//!
//! Stages publish values as JSON under a typed key and downstream stages pull
//! them back. The store is dropped with the run; nothing here is persisted.

use crate::constants::stages;
use crate::error::{PipelineError, PipelineResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handoff {
    /// Keys listed for the partition
    Listing,
    /// Step ids returned by the submitter, in submission order
    SubmittedSteps,
}

impl Handoff {
    /// Stage that publishes this value
    pub fn producer(&self) -> &'static str {
        match self {
            Self::Listing => stages::LIST_OBJECTS,
            Self::SubmittedSteps => stages::ADD_STEPS,
        }
    }
}

impl fmt::Display for Handoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.producer())
    }
}

#[derive(Debug, Default)]
pub struct RunMessages {
    values: HashMap<Handoff, Value>,
}

impl RunMessages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a value, replacing any earlier one under the same key
    pub fn push<T: Serialize>(&mut self, key: Handoff, value: &T) -> PipelineResult<()> {
        let encoded = serde_json::to_value(value).map_err(|e| PipelineError::Handoff {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.values.insert(key, encoded);
        Ok(())
    }

    pub fn pull(&self, key: Handoff) -> Option<&Value> {
        self.values.get(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_push_and_pull() {
        let mut messages = RunMessages::new();
        assert!(messages.pull(Handoff::Listing).is_none());

        messages
            .push(Handoff::Listing, &vec!["raw/a.csv".to_string()])
            .unwrap();
        assert_eq!(messages.pull(Handoff::Listing), Some(&json!(["raw/a.csv"])));
        assert!(messages.pull(Handoff::SubmittedSteps).is_none());

        messages.push(Handoff::Listing, &Vec::<String>::new()).unwrap();
        assert_eq!(messages.pull(Handoff::Listing), Some(&json!([])));
    }

    #[test]
    fn test_keys_name_their_producer() {
        assert_eq!(Handoff::Listing.to_string(), "list_objects");
        assert_eq!(Handoff::SubmittedSteps.producer(), "add_steps");
    }
}
