//! Error taxonomy reported back to the orchestrator.
//!
//! Every failure a handler can produce is a [`CpiError`]. The dispatcher only
//! ever asks it two questions: which category ([`ErrorKind`]) it belongs to and
//! whether the orchestrator may retry the call. Both answers end up verbatim in
//! the `error` field of the response.

use std::fmt;

use thiserror::Error;

use crate::agent_env::store::StoreError;
use crate::client::ApiError;

/// Result type alias for action handlers.
pub type Result<T> = std::result::Result<T, CpiError>;

/// Error categories understood by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Method unknown to this CPI. Never retryable.
    NotImplemented,
    /// Generic remote or runtime failure.
    CloudError,
    /// The VM named in the call does not exist.
    VmNotFound,
    /// The disk named in the call does not exist.
    DiskNotFound,
    /// The disk is not attached to the VM named in the call.
    DiskNotAttached,
}

impl ErrorKind {
    /// Name written to the `type` field of the response.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotImplemented => "NotImplemented",
            Self::CloudError => "CloudError",
            Self::VmNotFound => "VMNotFound",
            Self::DiskNotFound => "DiskNotFound",
            Self::DiskNotAttached => "DiskNotAttached",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while serving a single orchestrator call.
#[derive(Debug, Error)]
pub enum CpiError {
    /// No handler is registered for the requested method.
    #[error("Method {0} not implemented in esxcloud CPI.")]
    NotImplemented(String),

    /// An argument is missing or has the wrong JSON type.
    #[error("invalid argument '{name}' at position {position}: {reason}")]
    InvalidArgument {
        /// Zero-based position in the `arguments` array.
        position: usize,
        /// Name of the parameter in the method signature.
        name: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The initial remote call was rejected or could not be sent.
    #[error("{operation} failed: {source}")]
    Remote {
        /// Human readable name of the remote call.
        operation: &'static str,
        #[source]
        source: ApiError,
    },

    /// The remote system moved the task to its ERROR state.
    #[error("task {task_id} failed: {message}")]
    TaskFailed { task_id: String, message: String },

    /// Polling the task failed; its real state is unknown.
    #[error("polling task {task_id} failed: {source}")]
    TaskPoll {
        task_id: String,
        #[source]
        source: ApiError,
    },

    /// The task did not reach a terminal state in time.
    #[error("task {task_id} did not complete within {waited_secs}s (last state: {last_state})")]
    TaskTimeout {
        task_id: String,
        waited_secs: u64,
        last_state: String,
    },

    #[error("VM not found: {0}")]
    VmNotFound(String),

    #[error("disk not found: {0}")]
    DiskNotFound(String),

    #[error("disk {disk_id} is not attached to VM {vm_id}")]
    DiskNotAttached { vm_id: String, disk_id: String },

    /// Reading or writing the agent environment failed.
    #[error("agent environment for VM {vm_id}: {source}")]
    AgentEnv {
        vm_id: String,
        #[source]
        source: StoreError,
    },

    /// The image mastering tool could not produce the environment ISO.
    #[error("{0}")]
    EnvIso(String),

    /// A cloud error explicitly marked retryable or not.
    #[error("{message}")]
    Cloud { message: String, retryable: bool },

    /// Anything else. Reported as a non-retryable `CloudError`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CpiError {
    /// Build a `CloudError` with an explicit retry flag.
    pub fn cloud(retryable: bool, message: impl Into<String>) -> Self {
        Self::Cloud {
            message: message.into(),
            retryable,
        }
    }

    /// Build an argument error for the given position.
    pub fn invalid_argument(position: usize, name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            position,
            name,
            reason: reason.into(),
        }
    }

    /// Category reported in the response `type` field.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotImplemented(_) => ErrorKind::NotImplemented,
            Self::VmNotFound(_) => ErrorKind::VmNotFound,
            Self::DiskNotFound(_) => ErrorKind::DiskNotFound,
            Self::DiskNotAttached { .. } => ErrorKind::DiskNotAttached,
            Self::InvalidArgument { .. }
            | Self::Remote { .. }
            | Self::TaskFailed { .. }
            | Self::TaskPoll { .. }
            | Self::TaskTimeout { .. }
            | Self::AgentEnv { .. }
            | Self::EnvIso(_)
            | Self::Cloud { .. }
            | Self::Other(_) => ErrorKind::CloudError,
        }
    }

    /// Whether the orchestrator may retry the call.
    ///
    /// Only failures that leave the remote state unknown are retryable.
    pub fn can_retry(&self) -> bool {
        match self {
            Self::TaskPoll { .. } | Self::TaskTimeout { .. } => true,
            Self::Cloud { retryable, .. } => *retryable,
            _ => false,
        }
    }
}
