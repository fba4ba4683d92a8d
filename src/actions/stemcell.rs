//! Stemcell (image) actions.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, instrument};

use super::{await_task, remote_error, Action};
use crate::args::Args;
use crate::context::Context;
use crate::error::Result;

/// `create_stemcell(image_path, cloud_properties)`: upload an image.
pub struct CreateStemcell;

#[async_trait]
impl Action for CreateStemcell {
    #[instrument(name = "create_stemcell", skip_all)]
    async fn run(&self, ctx: &Context, args: Args<'_>) -> Result<Value> {
        let image_path = args.string(0, "image_path")?;
        // Stemcell cloud properties carry nothing esxcloud needs.
        args.optional_object(1, "cloud_properties")?;

        let submitted = ctx
            .client
            .create_image(Path::new(image_path))
            .await
            .map_err(|e| remote_error("create image", e));
        let task = await_task(ctx, submitted).await?;

        info!(image_id = %task.entity.id, "Created stemcell");
        Ok(Value::String(task.entity.id))
    }
}

/// `delete_stemcell(stemcell_cid)`.
pub struct DeleteStemcell;

#[async_trait]
impl Action for DeleteStemcell {
    #[instrument(name = "delete_stemcell", skip_all)]
    async fn run(&self, ctx: &Context, args: Args<'_>) -> Result<Value> {
        let stemcell_id = args.string(0, "stemcell_cid")?;

        let submitted = ctx
            .client
            .delete_image(stemcell_id)
            .await
            .map_err(|e| remote_error("delete image", e));
        await_task(ctx, submitted).await?;

        info!(stemcell_id, "Deleted stemcell");
        Ok(Value::Null)
    }
}
