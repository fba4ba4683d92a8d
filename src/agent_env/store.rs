//! Agent environment metadata store.
//!
//! [`MetadataStore`] is a tiny key-value interface keyed by VM id. The only
//! implementation, [`FileStore`], keeps one JSON file per VM in a local
//! directory. It has no multi-host visibility and entries are not removed
//! when their VM is deleted.

use std::io::Write;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use super::AgentEnv;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no agent environment stored for VM {0}")]
    NotFound(String),

    #[error("invalid VM id for metadata key: {0:?}")]
    InvalidKey(String),

    #[error("metadata I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata document is invalid: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value persistence for agent environments.
pub trait MetadataStore: Send + Sync {
    /// Store `env` under `vm_id`, replacing any previous document.
    fn put(&self, vm_id: &str, env: &AgentEnv) -> Result<(), StoreError>;

    /// Fetch the document stored under `vm_id`.
    fn get(&self, vm_id: &str) -> Result<AgentEnv, StoreError>;
}

/// Store backed by one file per VM in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, vm_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !vm_id.is_empty()
            && vm_id != "."
            && vm_id != ".."
            && !vm_id.contains(['/', '\\', '\0']);
        if !valid {
            return Err(StoreError::InvalidKey(vm_id.to_string()));
        }
        Ok(self.dir.join(vm_id))
    }
}

impl MetadataStore for FileStore {
    fn put(&self, vm_id: &str, env: &AgentEnv) -> Result<(), StoreError> {
        let path = self.path_for(vm_id)?;
        let json = serde_json::to_vec(env)?;

        std::fs::create_dir_all(&self.dir)?;
        // Write next to the target and rename so readers never see a partial document.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(vm_id, path = %path.display(), "Stored agent environment");
        Ok(())
    }

    fn get(&self, vm_id: &str) -> Result<AgentEnv, StoreError> {
        let path = self.path_for(vm_id)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(vm_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}
