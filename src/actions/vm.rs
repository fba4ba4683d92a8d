//! VM actions.
//!
//! `create_vm` is the only action touching the agent environment on the way
//! in: after the VM exists its bootstrap document is stored under the new VM
//! id and, when configured, mastered into an ISO that is attached before the
//! VM is powered on.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::{await_task, remote_error, Action};
use crate::agent_env::AgentEnv;
use crate::args::{optional_property_string, property_string, Args};
use crate::client::{AttachedDiskSpec, VmCreateSpec};
use crate::context::Context;
use crate::error::{CpiError, Result};

/// `create_vm(agent_id, stemcell_cid, cloud_properties, networks, disk_cids, env)`.
pub struct CreateVm;

#[async_trait]
impl Action for CreateVm {
    #[instrument(name = "create_vm", skip_all)]
    async fn run(&self, ctx: &Context, args: Args<'_>) -> Result<Value> {
        let agent_id = args.string(0, "agent_id")?;
        let stemcell_id = args.string(1, "stemcell_cid")?;
        let props = args.object(2, "cloud_properties")?;
        if props.is_empty() {
            return Err(CpiError::invalid_argument(
                2,
                "cloud_properties",
                "must not be empty",
            ));
        }
        let flavor = property_string(props, 2, "cloud_properties", "flavor")?;
        let disk_flavor = optional_property_string(props, 2, "cloud_properties", "disk_flavor")?;
        let networks = args.optional_object(3, "networks")?.cloned().unwrap_or_default();
        // Persistent disk placement hints are not used by esxcloud.
        args.optional_array(4, "disk_cids")?;
        let env = args.optional_object(5, "env")?.cloned().unwrap_or_default();

        let vm_name = format!("vm-{agent_id}");
        let spec = VmCreateSpec {
            name: vm_name.clone(),
            flavor: flavor.to_string(),
            source_image_id: stemcell_id.to_string(),
            attached_disks: disk_flavor
                .map(|disk_flavor| AttachedDiskSpec {
                    name: "boot-disk".to_string(),
                    flavor: disk_flavor.to_string(),
                    kind: "ephemeral-disk".to_string(),
                    boot_disk: true,
                })
                .into_iter()
                .collect(),
        };

        let submitted = ctx
            .client
            .create_vm(ctx.project_id(), &spec)
            .await
            .map_err(|e| remote_error("create VM", e));
        let task = await_task(ctx, submitted).await?;
        let vm_id = task.entity.id;
        info!(vm_id = %vm_id, agent_id, "Created VM");

        let agent_env = AgentEnv::build(&ctx.config.agent, agent_id, &vm_id, &vm_name, networks, env);
        ctx.store
            .put(&vm_id, &agent_env)
            .map_err(|source| CpiError::AgentEnv {
                vm_id: vm_id.clone(),
                source,
            })?;

        if ctx.config.agent.env_iso {
            boot_with_env_iso(ctx, &vm_id, &agent_env).await?;
        }

        Ok(Value::String(vm_id))
    }
}

/// Attach the agent environment ISO and power the VM on.
async fn boot_with_env_iso(ctx: &Context, vm_id: &str, agent_env: &AgentEnv) -> Result<()> {
    let iso_path = ctx.iso.render(agent_env).await?;

    let submitted = ctx
        .client
        .attach_iso(vm_id, &iso_path)
        .await
        .map_err(|e| remote_error("attach ISO", e));
    let attached = await_task(ctx, submitted).await;

    // The image has been uploaded (or failed to); the local copy is no longer needed.
    if let Err(e) = tokio::fs::remove_file(&iso_path).await {
        warn!(path = %iso_path.display(), error = %e, "Failed to remove agent environment ISO");
    }
    attached?;
    debug!(vm_id, "Attached agent environment ISO");

    let submitted = ctx
        .client
        .start_vm(vm_id)
        .await
        .map_err(|e| remote_error("start VM", e));
    await_task(ctx, submitted).await?;

    info!(vm_id, "Started VM");
    Ok(())
}

/// `delete_vm(vm_cid)`.
///
/// The VM's agent environment document is left in the store.
pub struct DeleteVm;

#[async_trait]
impl Action for DeleteVm {
    #[instrument(name = "delete_vm", skip_all)]
    async fn run(&self, ctx: &Context, args: Args<'_>) -> Result<Value> {
        let vm_id = args.string(0, "vm_cid")?;

        let submitted = ctx.client.delete_vm(vm_id).await.map_err(|e| {
            if e.is_not_found() {
                CpiError::VmNotFound(vm_id.to_string())
            } else {
                remote_error("delete VM", e)
            }
        });
        await_task(ctx, submitted).await?;

        info!(vm_id, "Deleted VM");
        Ok(Value::Null)
    }
}

/// `has_vm(vm_cid)`: a 404 means `false`, not an error.
pub struct HasVm;

#[async_trait]
impl Action for HasVm {
    #[instrument(name = "has_vm", skip_all)]
    async fn run(&self, ctx: &Context, args: Args<'_>) -> Result<Value> {
        let vm_id = args.string(0, "vm_cid")?;

        match ctx.client.get_vm(vm_id).await {
            Ok(_) => Ok(Value::Bool(true)),
            Err(e) if e.is_not_found() => Ok(Value::Bool(false)),
            Err(e) => Err(remote_error("get VM", e)),
        }
    }
}
