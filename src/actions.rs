//! Orchestrator methods and their registry.
//!
//! Each method is an [`Action`]. Most of them follow the same shape: check
//! the arguments, issue one remote call, wait for the returned task and pull
//! the interesting field out of it.

mod disk;
mod stemcell;
mod vm;

pub use disk::{AttachDisk, CreateDisk, DeleteDisk, DetachDisk, HasDisk};
pub use stemcell::{CreateStemcell, DeleteStemcell};
pub use vm::{CreateVm, DeleteVm, HasVm};

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::agent_env::store::StoreError;
use crate::agent_env::AgentEnv;
use crate::args::Args;
use crate::client::{ApiError, Task};
use crate::context::Context;
use crate::error::{CpiError, Result};
use crate::task::wait_for_task;

/// A single orchestrator method.
#[async_trait]
pub trait Action: Send + Sync {
    /// Run the method. `Ok` becomes the response `result`.
    async fn run(&self, ctx: &Context, args: Args<'_>) -> Result<Value>;
}

/// Method name to action lookup. Names are matched case-insensitively.
pub struct Registry {
    actions: HashMap<String, Box<dyn Action>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Register `action` under `method`, replacing any previous entry.
    #[must_use]
    pub fn with(mut self, method: &str, action: impl Action + 'static) -> Self {
        self.actions
            .insert(method.to_lowercase(), Box::new(action));
        self
    }

    pub fn get(&self, method: &str) -> Option<&dyn Action> {
        self.actions
            .get(&method.to_lowercase())
            .map(|action| &**action)
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<_> = self.actions.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }
}

impl Default for Registry {
    /// Every method this CPI implements.
    fn default() -> Self {
        Self::new()
            .with("create_stemcell", CreateStemcell)
            .with("delete_stemcell", DeleteStemcell)
            .with("create_disk", CreateDisk)
            .with("delete_disk", DeleteDisk)
            .with("has_disk", HasDisk)
            .with("attach_disk", AttachDisk)
            .with("detach_disk", DetachDisk)
            .with("create_vm", CreateVm)
            .with("delete_vm", DeleteVm)
            .with("has_vm", HasVm)
    }
}

/// Generic mapping for a rejected remote call.
pub(crate) fn remote_error(operation: &'static str, source: ApiError) -> CpiError {
    CpiError::Remote { operation, source }
}

/// Wait for the task handed back by a mutating call.
pub(crate) async fn await_task(ctx: &Context, submitted: Result<Task>) -> Result<Task> {
    let task = submitted?;
    wait_for_task(ctx.client.as_ref(), &task.id, &ctx.wait_policy()).await
}

/// Apply `amend` to the stored agent environment of `vm_id`.
///
/// A missing document is skipped with a warning: the store is host-local and
/// may not hold every VM.
pub(crate) fn amend_agent_env(
    ctx: &Context,
    vm_id: &str,
    amend: impl FnOnce(&mut AgentEnv),
) -> Result<()> {
    let store_error = |source: StoreError| CpiError::AgentEnv {
        vm_id: vm_id.to_string(),
        source,
    };

    let mut env = match ctx.store.get(vm_id) {
        Ok(env) => env,
        Err(StoreError::NotFound(_)) => {
            warn!(vm_id, "No agent environment stored, skipping update");
            return Ok(());
        }
        Err(e) => return Err(store_error(e)),
    };
    amend(&mut env);
    ctx.store.put(vm_id, &env).map_err(store_error)
}
