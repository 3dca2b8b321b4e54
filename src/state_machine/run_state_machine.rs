use super::{
    errors::{StateMachineError, StateMachineResult},
    events::RunEvent,
    states::RunState,
};
use crate::partition::PartitionKey;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

/// One recorded state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunTransition {
    pub from: RunState,
    pub to: RunState,
    pub event: String,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// In-memory state machine for a single run.
///
/// Lives exactly as long as the run; the history is handed to the run report.
#[derive(Debug)]
pub struct RunStateMachine {
    partition: PartitionKey,
    current: RunState,
    history: Vec<RunTransition>,
}

impl RunStateMachine {
    pub fn new(partition: PartitionKey) -> Self {
        Self {
            partition,
            current: RunState::default(),
            history: Vec::new(),
        }
    }

    pub fn current_state(&self) -> RunState {
        self.current
    }

    pub fn partition(&self) -> PartitionKey {
        self.partition
    }

    pub fn history(&self) -> &[RunTransition] {
        &self.history
    }

    pub fn into_history(self) -> Vec<RunTransition> {
        self.history
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    /// Attempt to transition the run state
    pub fn transition(&mut self, event: RunEvent) -> StateMachineResult<RunState> {
        let from = self.current;
        let to = match Self::determine_target_state(from, &event) {
            Ok(to) => to,
            Err(err) => {
                warn!(
                    partition = %self.partition,
                    state = %from,
                    event = event.event_type(),
                    "Rejected run transition"
                );
                return Err(err);
            }
        };

        debug!(
            partition = %self.partition,
            from = %from,
            to = %to,
            event = event.event_type(),
            "Run transition"
        );

        self.history.push(RunTransition {
            from,
            to,
            event: event.event_type().to_string(),
            reason: event.error_message().map(str::to_owned),
            at: Utc::now(),
        });
        self.current = to;
        Ok(to)
    }

    /// Determine the target state based on current state and event
    fn determine_target_state(current: RunState, event: &RunEvent) -> StateMachineResult<RunState> {
        let target = match (current, event) {
            (RunState::Pending, RunEvent::List) => RunState::Listed,

            // The gate only ever leaves from Listed
            (RunState::Listed, RunEvent::Notify) => RunState::Notified,
            (RunState::Listed, RunEvent::Trigger) => RunState::Triggered,

            (RunState::Triggered, RunEvent::Submit) => RunState::Submitted,
            (RunState::Submitted, RunEvent::Wait) => RunState::Waiting,
            (RunState::Waiting, RunEvent::Load) => RunState::Loaded,

            (from, RunEvent::Fail(_)) if !from.is_terminal() => RunState::Failed,

            (from, _) => {
                return Err(StateMachineError::InvalidTransition {
                    from,
                    event: event.event_type().to_string(),
                })
            }
        };

        Ok(target)
    }
}
