//! Per-invocation context shared by every action.

use anyhow::{Context as _, Result};

use crate::agent_env::iso::{IsoGenerator, ProcessRunner};
use crate::agent_env::store::{FileStore, MetadataStore};
use crate::client::{CloudClient, HttpClient};
use crate::config::Config;
use crate::task::WaitPolicy;

/// Everything an action needs: the remote client, static configuration,
/// the agent environment store and the ISO generator.
///
/// Built once in `main` and only ever borrowed afterwards.
pub struct Context {
    pub client: Box<dyn CloudClient>,
    pub config: Config,
    pub store: Box<dyn MetadataStore>,
    pub iso: IsoGenerator,
}

impl Context {
    /// Wire up the production collaborators described by `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let client = HttpClient::new(&config.esxcloud.target, config.request_timeout())
            .context("Failed to build esxcloud HTTP client")?
            .with_upload_timeout(config.upload_timeout());
        let store = FileStore::new(config.store_dir());
        let iso = IsoGenerator::new(config.agent.iso_tool.clone(), Box::new(ProcessRunner));

        Ok(Self {
            client: Box::new(client),
            store: Box::new(store),
            iso,
            config,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.config.esxcloud.project_id
    }

    pub const fn wait_policy(&self) -> WaitPolicy {
        self.config.wait_policy()
    }
}
