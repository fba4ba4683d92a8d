//! Request dispatch.
//!
//! Resolves the method through the [`Registry`], runs the action and turns
//! its outcome into a [`Response`]. Action failures are ordinary values here;
//! a panic inside an action is not caught and takes the process down without
//! a response.

use serde_json::Value;
use tracing::{info, warn};

use crate::actions::Registry;
use crate::args::Args;
use crate::context::Context;
use crate::error::CpiError;
use crate::protocol::Response;

/// Run `method` with `arguments` and build the response for the orchestrator.
pub async fn dispatch(
    ctx: &Context,
    registry: &Registry,
    method: &str,
    arguments: &[Value],
) -> Response {
    let method = method.to_lowercase();

    let Some(action) = registry.get(&method) else {
        warn!(method = %method, "Unknown method");
        return Response::failure(&CpiError::NotImplemented(method));
    };

    info!(method = %method, args = arguments.len(), "Dispatching");

    match action.run(ctx, Args::new(arguments)).await {
        Ok(result) => {
            info!(method = %method, "Completed");
            Response::success(result)
        }
        Err(err) => {
            warn!(
                method = %method,
                kind = %err.kind(),
                can_retry = err.can_retry(),
                error = %err,
                "Failed"
            );
            Response::failure(&err)
        }
    }
}
