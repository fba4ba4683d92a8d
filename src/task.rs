//! Waiting on remote asynchronous tasks.
//!
//! esxcloud answers every mutating call with a task handle. The waiter polls
//! `GET /tasks/{id}` until the task is COMPLETED or ERROR, or until the
//! overall deadline passes. It never reports success without having observed
//! COMPLETED.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::client::{CloudClient, Task, TaskState};
use crate::error::{CpiError, Result};

/// Polling cadence and overall bound for a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Delay between two polls.
    pub poll_interval: Duration,

    /// Give up once this much time has passed since the first poll.
    pub timeout: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Poll `task_id` until it reaches a terminal state.
///
/// - COMPLETED: returns the final task record.
/// - ERROR: [`CpiError::TaskFailed`], not retryable.
/// - poll failure: [`CpiError::TaskPoll`], retryable.
/// - deadline: [`CpiError::TaskTimeout`].
#[instrument(skip(client, policy), fields(interval = ?policy.poll_interval))]
pub async fn wait_for_task(
    client: &dyn CloudClient,
    task_id: &str,
    policy: &WaitPolicy,
) -> Result<Task> {
    let started = Instant::now();
    // `None`: the bound lies beyond what the clock can represent.
    let deadline = started.checked_add(policy.timeout);

    loop {
        let task = client
            .get_task(task_id)
            .await
            .map_err(|source| CpiError::TaskPoll {
                task_id: task_id.to_string(),
                source,
            })?;

        debug!(state = task.state.as_str(), "Polled task");

        match task.state {
            TaskState::Completed => return Ok(task),
            TaskState::Error => {
                let messages = task.failure_messages();
                let message = if messages.is_empty() {
                    format!("task {task_id} ended in state ERROR")
                } else {
                    messages.join("; ")
                };
                warn!(operation = %task.operation, error = %message, "Task failed");
                return Err(CpiError::TaskFailed {
                    task_id: task_id.to_string(),
                    message,
                });
            }
            TaskState::Queued | TaskState::Started | TaskState::Unknown => {}
        }

        let now = Instant::now();
        let expired = match (deadline, now.checked_add(policy.poll_interval)) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(deadline), Some(next_poll)) => next_poll > deadline,
        };
        if expired {
            return Err(CpiError::TaskTimeout {
                task_id: task_id.to_string(),
                waited_secs: now.duration_since(started).as_secs(),
                last_state: task.state.as_str().to_string(),
            });
        }

        tokio::time::sleep(policy.poll_interval).await;
    }
}
