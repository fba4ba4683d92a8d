//! Guest agent environment.
//!
//! The agent running inside a new VM reads an [`AgentEnv`] document to find
//! its identity, networks, message bus and blobstore. The CPI builds it on
//! VM creation, keeps a copy in the metadata [`store`] and can master it into
//! an ISO image with [`iso`].

pub mod iso;
pub mod store;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{AgentConfig, BlobstoreConfig};

/// Disk map key for persistent disks.
const PERSISTENT: &str = "persistent";

/// First device slot handed to persistent disks. 0 is the system disk and
/// 1 the ephemeral disk.
const FIRST_PERSISTENT_SLOT: u64 = 2;

/// Identity of the VM the agent runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmSpec {
    pub id: String,
    pub name: String,
}

/// Bootstrap document consumed by the in-guest agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEnv {
    pub agent_id: String,
    pub vm: VmSpec,
    pub networks: Map<String, Value>,
    pub env: Map<String, Value>,
    pub mbus: String,
    pub ntp: Vec<String>,
    pub disks: Map<String, Value>,
    pub blobstore: BlobstoreConfig,
}

impl AgentEnv {
    /// Assemble a fresh environment for a newly created VM.
    ///
    /// Static settings come from `agent`; networks and env come from the
    /// caller. The disk map starts with the ephemeral disk only.
    pub fn build(
        agent: &AgentConfig,
        agent_id: &str,
        vm_id: &str,
        vm_name: &str,
        networks: Map<String, Value>,
        env: Map<String, Value>,
    ) -> Self {
        let mut disks = Map::new();
        disks.insert("ephemeral".to_string(), Value::String("1".to_string()));

        Self {
            agent_id: agent_id.to_string(),
            vm: VmSpec {
                id: vm_id.to_string(),
                name: vm_name.to_string(),
            },
            networks,
            env,
            mbus: agent.mbus.clone(),
            ntp: agent.ntp.clone(),
            disks,
            blobstore: agent.blobstore.clone(),
        }
    }

    /// Record a persistent disk, returning its device slot.
    ///
    /// Re-attaching a disk that is already recorded keeps its slot.
    pub fn add_persistent_disk(&mut self, disk_id: &str) -> String {
        let mut persistent = match self.disks.remove(PERSISTENT) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let slot = if let Some(Value::String(slot)) = persistent.get(disk_id) {
            slot.clone()
        } else {
            let used: Vec<u64> = persistent
                .values()
                .filter_map(|v| v.as_str().and_then(|s| s.parse().ok()))
                .collect();
            let slot = (FIRST_PERSISTENT_SLOT..)
                .find(|n| !used.contains(n))
                .unwrap_or(FIRST_PERSISTENT_SLOT)
                .to_string();
            persistent.insert(disk_id.to_string(), Value::String(slot.clone()));
            slot
        };

        self.disks
            .insert(PERSISTENT.to_string(), Value::Object(persistent));
        slot
    }

    /// Forget a persistent disk. Returns whether it was recorded.
    pub fn remove_persistent_disk(&mut self, disk_id: &str) -> bool {
        self.disks
            .get_mut(PERSISTENT)
            .and_then(Value::as_object_mut)
            .is_some_and(|persistent| persistent.remove(disk_id).is_some())
    }

    pub fn persistent_disks(&self) -> Vec<&str> {
        self.disks
            .get(PERSISTENT)
            .and_then(Value::as_object)
            .map(|p| p.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}
