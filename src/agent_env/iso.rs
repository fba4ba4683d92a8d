//! Environment ISO mastering.
//!
//! Writes the agent environment to a file named `env` (valid under ISO 9660
//! 8.3 naming) in a scratch directory and runs the mastering tool on it. The
//! scratch directory is removed on every path; the ISO is kept only on
//! success.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::AgentEnv;
use crate::error::{CpiError, Result};

/// File name of the environment document inside the image.
const ENV_FILE_NAME: &str = "env";

/// Captured result of an external command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    /// Human readable exit status, e.g. `exit status: 1`.
    pub status: String,
    /// stdout followed by stderr.
    pub output: String,
}

/// Runs external programs. Swapped out in tests.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&OsStr]) -> anyhow::Result<CommandOutput>;
}

/// Runner spawning real processes with tokio.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[&OsStr]) -> anyhow::Result<CommandOutput> {
        let out = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to spawn {program}"))?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        Ok(CommandOutput {
            success: out.status.success(),
            status: out.status.to_string(),
            output,
        })
    }
}

/// Renders agent environments into ISO images.
pub struct IsoGenerator {
    tool: String,
    runner: Box<dyn CommandRunner>,
}

impl IsoGenerator {
    pub fn new(tool: impl Into<String>, runner: Box<dyn CommandRunner>) -> Self {
        Self {
            tool: tool.into(),
            runner,
        }
    }

    /// Master `env` into an ISO and return its path. The caller owns the file.
    #[instrument(skip(self, env), fields(vm_id = %env.vm.id, tool = %self.tool))]
    pub async fn render(&self, env: &AgentEnv) -> Result<PathBuf> {
        let json = serde_json::to_vec(env).context("Failed to serialize agent environment")?;

        let work_dir = tempfile::Builder::new()
            .prefix("agent-iso-dir")
            .tempdir()
            .context("Failed to create ISO working directory")?;
        let env_path = work_dir.path().join(ENV_FILE_NAME);
        tokio::fs::write(&env_path, &json)
            .await
            .context("Failed to write agent environment file")?;

        let iso = tempfile::Builder::new()
            .prefix("agent-env-iso")
            .suffix(".iso")
            .tempfile()
            .context("Failed to create ISO output file")?;

        let out_flag = OsString::from("-o");
        let args = [
            out_flag.as_os_str(),
            iso.path().as_os_str(),
            env_path.as_os_str(),
        ];
        let result = self.runner.run(&self.tool, &args).await;

        // Dropping `work_dir` removes it; dropping `iso` removes the partial image.
        let output = result.map_err(|e| {
            CpiError::EnvIso(format!("Failed to generate ISO for agent settings: {e:#}"))
        })?;
        if !output.success {
            return Err(CpiError::EnvIso(format!(
                "Failed to generate ISO for agent settings: {}\n{}",
                output.status, output.output
            )));
        }

        let (_, path) = iso
            .keep()
            .context("Failed to keep generated ISO")?;
        debug!(path = %path.display(), "Generated agent environment ISO");
        Ok(path)
    }
}
