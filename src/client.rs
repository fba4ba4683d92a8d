//! Remote esxcloud API interface.
//!
//! Action handlers only talk to the cloud through [`CloudClient`]. Every
//! mutating call returns a [`Task`] that must be awaited with
//! [`crate::task::wait_for_task`]; lookups return the entity itself.

mod http;

pub use http::HttpClient;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by a [`CloudClient`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// The API answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never produced a response.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not what the API documents.
    #[error("invalid response payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured endpoint is not a usable base URL.
    #[error("invalid esxcloud target {0}")]
    InvalidTarget(String),

    /// A local file could not be read for upload.
    #[error("reading upload failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the API reported the entity as missing.
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404))
    }
}

/// State of a remote task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Queued,
    Started,
    Completed,
    Error,
    /// States this client does not know about. Treated as still running.
    #[serde(other)]
    Unknown,
}

impl TaskState {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Started => "STARTED",
            Self::Completed => "COMPLETED",
            Self::Error => "ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Entity a task operates on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(default)]
    pub kind: String,
}

/// A remote asynchronous operation, observed by polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub state: TaskState,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub entity: Entity,
    #[serde(default)]
    pub steps: Option<Vec<Step>>,
}

/// One step of a task. Failed steps carry the remote error details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub state: Option<TaskState>,
    #[serde(default)]
    pub errors: Option<Vec<StepError>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl Task {
    /// Error messages reported by the task's steps, in order.
    pub fn failure_messages(&self) -> Vec<&str> {
        self.steps
            .iter()
            .flatten()
            .flat_map(|step| step.errors.iter().flatten())
            .map(|err| err.message.as_str())
            .filter(|msg| !msg.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vm {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentDisk {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
}

/// Disk attached to a VM at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDiskSpec {
    pub name: String,
    pub flavor: String,
    pub kind: String,
    pub boot_disk: bool,
}

/// Body of a VM creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmCreateSpec {
    pub name: String,
    pub flavor: String,
    pub source_image_id: String,
    pub attached_disks: Vec<AttachedDiskSpec>,
}

/// Body of a persistent disk creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskCreateSpec {
    pub name: String,
    pub flavor: String,
    pub kind: String,
    pub capacity_gb: u64,
}

/// Operations the CPI needs from the esxcloud API.
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// Upload a stemcell image file.
    async fn create_image(&self, image_path: &Path) -> Result<Task, ApiError>;

    async fn delete_image(&self, image_id: &str) -> Result<Task, ApiError>;

    async fn create_disk(&self, project_id: &str, spec: &DiskCreateSpec)
        -> Result<Task, ApiError>;

    async fn delete_disk(&self, disk_id: &str) -> Result<Task, ApiError>;

    async fn get_disk(&self, disk_id: &str) -> Result<PersistentDisk, ApiError>;

    async fn attach_disk(&self, vm_id: &str, disk_id: &str) -> Result<Task, ApiError>;

    async fn detach_disk(&self, vm_id: &str, disk_id: &str) -> Result<Task, ApiError>;

    async fn create_vm(&self, project_id: &str, spec: &VmCreateSpec) -> Result<Task, ApiError>;

    /// Delete a VM, forcing removal of attached resources.
    async fn delete_vm(&self, vm_id: &str) -> Result<Task, ApiError>;

    async fn get_vm(&self, vm_id: &str) -> Result<Vm, ApiError>;

    /// Upload an ISO image and attach it to the VM's CD-ROM drive.
    async fn attach_iso(&self, vm_id: &str, iso_path: &Path) -> Result<Task, ApiError>;

    async fn start_vm(&self, vm_id: &str) -> Result<Task, ApiError>;

    async fn get_task(&self, task_id: &str) -> Result<Task, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_deserializes_with_null_steps() {
        let json = r#"{
            "id": "fake-task-id",
            "state": "QUEUED",
            "operation": "CREATE_VM",
            "entity": {"id": "fake-vm-id", "kind": "vm"},
            "steps": null
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.state, TaskState::Queued);
        assert_eq!(task.entity.id, "fake-vm-id");
        assert!(task.failure_messages().is_empty());
    }

    #[test]
    fn unknown_state_is_not_terminal() {
        let task: Task = serde_json::from_str(r#"{"id": "t", "state": "PAUSED"}"#).unwrap();
        assert_eq!(task.state, TaskState::Unknown);
        assert!(!task.state.is_terminal());
    }

    #[test]
    fn failure_messages_collects_step_errors() {
        let json = r#"{
            "id": "t",
            "state": "ERROR",
            "steps": [
                {"operation": "RESERVE_RESOURCE", "errors": [{"code": "NotEnoughCpu", "message": "no cpu"}]},
                {"operation": "CREATE_VM", "errors": null},
                {"operation": "ATTACH_DISK", "errors": [{"code": "X", "message": ""}]}
            ]
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert!(task.state.is_terminal());
        assert_eq!(task.failure_messages(), vec!["no cpu"]);
    }

    #[test]
    fn not_found_detection() {
        let err = ApiError::Status {
            status: 404,
            body: String::new(),
        };
        assert!(err.is_not_found());
        let err = ApiError::Status {
            status: 500,
            body: String::new(),
        };
        assert!(!err.is_not_found());
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn vm_spec_is_camel_case() {
        let spec = VmCreateSpec {
            name: "vm-1".into(),
            flavor: "core-100".into(),
            source_image_id: "img".into(),
            attached_disks: vec![],
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["sourceImageId"], "img");
        assert!(value.get("attachedDisks").is_some());
    }
}
