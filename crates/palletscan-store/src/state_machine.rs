//! Task state machine enforcement.
//!
//! Validates transitions per the task lifecycle:
//!
//! ```text
//! Pending -> Processing
//! Processing -> Completed | Failed
//! Completed/Failed -> ERROR (terminal, no further transitions)
//! ```
//!
//! `Pending -> Completed` and `Pending -> Failed` are not permitted; a task
//! that never dequeues remains `Pending`.

use crate::error::StoreError;
use crate::types::TaskStatus;

/// Validate a task status transition.
///
/// Returns `Ok(())` if the transition is valid, or `Err(StoreError)` if not.
pub fn validate_transition(from: TaskStatus, to: TaskStatus) -> Result<(), StoreError> {
    match from {
        TaskStatus::Pending => match to {
            TaskStatus::Processing => Ok(()),
            _ => Err(StoreError::InvalidTransition {
                current: from,
                requested: to,
            }),
        },
        TaskStatus::Processing => match to {
            TaskStatus::Completed | TaskStatus::Failed => Ok(()),
            _ => Err(StoreError::InvalidTransition {
                current: from,
                requested: to,
            }),
        },
        TaskStatus::Completed | TaskStatus::Failed => Err(StoreError::TerminalState(from)),
    }
}

/// Returns `true` if the status is a terminal state.
pub fn is_terminal(status: TaskStatus) -> bool {
    matches!(status, TaskStatus::Completed | TaskStatus::Failed)
}
