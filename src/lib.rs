//! esxcloud cloud provider interface
//!
//! This crate translates orchestrator lifecycle calls into esxcloud REST
//! operations:
//! - JSON request/response protocol over stdin/stdout
//! - Method registry and dispatch
//! - esxcloud HTTP client and task polling
//! - Agent environment building, storage and ISO mastering

pub mod actions;
pub mod agent_env;
pub mod args;
pub mod client;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod task;
