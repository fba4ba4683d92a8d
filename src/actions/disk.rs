//! Persistent disk actions.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{amend_agent_env, await_task, remote_error, Action};
use crate::args::{property_string, Args};
use crate::client::DiskCreateSpec;
use crate::context::Context;
use crate::error::{CpiError, Result};

const MB_PER_GB: u64 = 1024;

/// `create_disk(size_mb, cloud_properties, vm_locality)`.
pub struct CreateDisk;

#[async_trait]
impl Action for CreateDisk {
    #[instrument(name = "create_disk", skip_all)]
    async fn run(&self, ctx: &Context, args: Args<'_>) -> Result<Value> {
        let size_mb = args.unsigned(0, "size")?;
        if size_mb == 0 {
            return Err(CpiError::invalid_argument(0, "size", "must be greater than zero"));
        }
        let props = args.object(1, "cloud_properties")?;
        let flavor = property_string(props, 1, "cloud_properties", "flavor")?;
        // vm_locality (position 2) is accepted but esxcloud places disks itself.

        let spec = DiskCreateSpec {
            name: format!("disk-{}", Uuid::new_v4()),
            flavor: flavor.to_string(),
            kind: "persistent-disk".to_string(),
            capacity_gb: size_mb.div_ceil(MB_PER_GB),
        };
        debug!(name = %spec.name, capacity_gb = spec.capacity_gb, "Creating disk");

        let submitted = ctx
            .client
            .create_disk(ctx.project_id(), &spec)
            .await
            .map_err(|e| remote_error("create disk", e));
        let task = await_task(ctx, submitted).await?;

        info!(disk_id = %task.entity.id, "Created disk");
        Ok(Value::String(task.entity.id))
    }
}

/// `delete_disk(disk_cid)`.
pub struct DeleteDisk;

#[async_trait]
impl Action for DeleteDisk {
    #[instrument(name = "delete_disk", skip_all)]
    async fn run(&self, ctx: &Context, args: Args<'_>) -> Result<Value> {
        let disk_id = args.string(0, "disk_cid")?;

        let submitted = ctx.client.delete_disk(disk_id).await.map_err(|e| {
            if e.is_not_found() {
                CpiError::DiskNotFound(disk_id.to_string())
            } else {
                remote_error("delete disk", e)
            }
        });
        await_task(ctx, submitted).await?;

        info!(disk_id, "Deleted disk");
        Ok(Value::Null)
    }
}

/// `has_disk(disk_cid)`: a 404 means `false`, not an error.
pub struct HasDisk;

#[async_trait]
impl Action for HasDisk {
    #[instrument(name = "has_disk", skip_all)]
    async fn run(&self, ctx: &Context, args: Args<'_>) -> Result<Value> {
        let disk_id = args.string(0, "disk_cid")?;

        match ctx.client.get_disk(disk_id).await {
            Ok(_) => Ok(Value::Bool(true)),
            Err(e) if e.is_not_found() => Ok(Value::Bool(false)),
            Err(e) => Err(remote_error("get disk", e)),
        }
    }
}

/// `attach_disk(vm_cid, disk_cid)`.
pub struct AttachDisk;

#[async_trait]
impl Action for AttachDisk {
    #[instrument(name = "attach_disk", skip_all)]
    async fn run(&self, ctx: &Context, args: Args<'_>) -> Result<Value> {
        let vm_id = args.string(0, "vm_cid")?;
        let disk_id = args.string(1, "disk_cid")?;

        let submitted = ctx
            .client
            .attach_disk(vm_id, disk_id)
            .await
            .map_err(|e| remote_error("attach disk", e));
        await_task(ctx, submitted).await?;

        amend_agent_env(ctx, vm_id, |env| {
            let slot = env.add_persistent_disk(disk_id);
            debug!(disk_id, slot = %slot, "Recorded persistent disk");
        })?;

        info!(vm_id, disk_id, "Attached disk");
        Ok(Value::Null)
    }
}

/// `detach_disk(vm_cid, disk_cid)`.
pub struct DetachDisk;

#[async_trait]
impl Action for DetachDisk {
    #[instrument(name = "detach_disk", skip_all)]
    async fn run(&self, ctx: &Context, args: Args<'_>) -> Result<Value> {
        let vm_id = args.string(0, "vm_cid")?;
        let disk_id = args.string(1, "disk_cid")?;

        let submitted = ctx.client.detach_disk(vm_id, disk_id).await.map_err(|e| {
            if e.is_not_found() {
                CpiError::DiskNotAttached {
                    vm_id: vm_id.to_string(),
                    disk_id: disk_id.to_string(),
                }
            } else {
                remote_error("detach disk", e)
            }
        });
        await_task(ctx, submitted).await?;

        amend_agent_env(ctx, vm_id, |env| {
            if !env.remove_persistent_disk(disk_id) {
                debug!(disk_id, "Disk was not recorded in agent environment");
            }
        })?;

        info!(vm_id, disk_id, "Detached disk");
        Ok(Value::Null)
    }
}
