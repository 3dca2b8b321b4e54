// Run state machine for one partition.
//
// PENDING -> LISTED -> { NOTIFIED | TRIGGERED -> SUBMITTED -> WAITING -> { LOADED | FAILED } }
// FAILED is reachable from every non-terminal state.

pub mod errors;
pub mod events;
pub mod run_state_machine;
pub mod states;

pub use errors::{StateMachineError, StateMachineResult};
pub use events::RunEvent;
pub use run_state_machine::{RunStateMachine, RunTransition};
pub use states::RunState;
