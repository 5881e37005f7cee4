// SPDX-License-Identifier: MIT

//! Container backend (C8): a container runtime plus an injected agent
//! daemon reachable on a local port via host networking.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::backend::{EnvironmentBackend, EnvironmentError};
use crate::confine::{confine, confine_for_write};
use crate::spec::{CommandHandle, EnvironmentContext, EnvironmentState, StatusReport};

const AGENT_PORT: u16 = 7422;

/// Path to the `cook-agentd` binary to inject into new containers.
pub struct ContainerRuntimeConfig {
    pub runtime_bin: String,
    pub image: String,
    pub agentd_binary_path: PathBuf,
    pub credentials_path: Option<PathBuf>,
}

impl Default for ContainerRuntimeConfig {
    fn default() -> Self {
        Self {
            runtime_bin: "docker".to_string(),
            image: "cook/workbench:latest".to_string(),
            agentd_binary_path: PathBuf::from("/usr/local/bin/cook-agentd"),
            credentials_path: None,
        }
    }
}

pub struct ContainerBackend {
    config: ContainerRuntimeConfig,
    container_id: Option<String>,
    working_path: PathBuf,
}

impl ContainerBackend {
    pub fn new(working_path: impl Into<PathBuf>, config: ContainerRuntimeConfig) -> Self {
        Self { config, container_id: None, working_path: working_path.into() }
    }

    /// Reattach to an already-running container by id.
    pub fn from_handle(container_id: String, working_path: impl Into<PathBuf>, config: ContainerRuntimeConfig) -> Self {
        Self { config, container_id: Some(container_id), working_path: working_path.into() }
    }

    fn id(&self) -> Result<&str, EnvironmentError> {
        self.container_id.as_deref().ok_or_else(|| EnvironmentError::Exec("container not provisioned".to_string()))
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output, EnvironmentError> {
        Command::new(&self.config.runtime_bin)
            .args(args)
            .output()
            .await
            .map_err(|e| EnvironmentError::Exec(format!("{} {args:?}: {e}", self.config.runtime_bin)))
    }

    async fn exec_as(&self, user: Option<&str>, command: &str) -> Result<std::process::Output, EnvironmentError> {
        let id = self.id()?;
        let mut args = vec!["exec".to_string()];
        if let Some(user) = user {
            args.push("-u".to_string());
            args.push(user.to_string());
        }
        args.push(id.to_string());
        args.push("/bin/sh".to_string());
        args.push("-c".to_string());
        args.push(command.to_string());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs).await
    }

    /// chmod/chown injected credentials as root — the one operation that
    /// needs to run as a different user than the agent's.
    async fn exec_as_root(&self, command: &str) -> Result<std::process::Output, EnvironmentError> {
        self.exec_as(Some("root"), command).await
    }
}

#[async_trait]
impl EnvironmentBackend for ContainerBackend {
    async fn setup(&mut self, ctx: &EnvironmentContext) -> Result<(), EnvironmentError> {
        if self.container_id.is_none() {
            let name = format!("cook-{}-{}", ctx.repo_name, ctx.branch);
            let mount = format!("{}:{}", self.working_path.display(), self.working_path.display());
            let workdir = self.working_path.to_string_lossy().into_owned();
            let output = self
                .run(&[
                    "run",
                    "-d",
                    "--network",
                    "host",
                    "--name",
                    &name,
                    "-v",
                    &mount,
                    "-w",
                    &workdir,
                    &self.config.image,
                    "sleep",
                    "infinity",
                ])
                .await?;
            if !output.status.success() {
                return Err(EnvironmentError::Setup(format!(
                    "container run failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                )));
            }
            self.container_id = Some(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }

        std::fs::create_dir_all(&self.working_path).map_err(|e| EnvironmentError::Setup(e.to_string()))?;
        let clone = self
            .exec_as(None, &format!("git clone '{}' '{}'", ctx.bare_repo_path, self.working_path.display()))
            .await?;
        if !clone.status.success() {
            return Err(EnvironmentError::Setup(format!("git clone in container: {}", String::from_utf8_lossy(&clone.stderr))));
        }

        let agentd_src = self.config.agentd_binary_path.to_string_lossy().into_owned();
        let agentd_dst = format!("{}:/usr/local/bin/cook-agentd", self.id()?);
        let copy_status = self.run(&["cp", &agentd_src, &agentd_dst]).await?;
        if !copy_status.status.success() {
            return Err(EnvironmentError::Setup("docker cp cook-agentd failed".to_string()));
        }
        self.exec_as_root("chmod +x /usr/local/bin/cook-agentd").await?;
        self.exec_as(
            None,
            &format!("nohup /usr/local/bin/cook-agentd --port {AGENT_PORT} > /tmp/agentd.log 2>&1 &"),
        )
        .await?;

        if let Some(creds) = &self.config.credentials_path {
            let creds_src = creds.to_string_lossy().into_owned();
            let creds_dst = format!("{}:/root/.agent-credentials", self.id()?);
            let copy_status = self.run(&["cp", &creds_src, &creds_dst]).await?;
            if copy_status.status.success() {
                self.exec_as_root("chmod 600 /root/.agent-credentials && chown root:root /root/.agent-credentials")
                    .await?;
            }
        }

        if let Some(url) = ctx.dotfiles_url.as_deref() {
            self.exec_as(None, &format!("git clone --depth 1 '{url}' /root/.dotfiles")).await?;
        }

        info!(container = %self.id()?, "container environment ready");
        Ok(())
    }

    async fn exec(&self, command: &str) -> Result<Vec<u8>, EnvironmentError> {
        let output = self.exec_as(None, command).await?;
        let mut bytes = output.stdout;
        bytes.extend_from_slice(&output.stderr);
        if output.status.success() {
            Ok(bytes)
        } else {
            Err(EnvironmentError::NonZeroExit { bytes, exit_code: output.status.code() })
        }
    }

    fn command(&self, _argv: &[String]) -> CommandHandle {
        CommandHandle::Unsupported
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, EnvironmentError> {
        let resolved = confine(&self.working_path, path)?;
        std::fs::read(&resolved).map_err(|e| EnvironmentError::Io(e.to_string()))
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), EnvironmentError> {
        let resolved = confine_for_write(&self.working_path, path)?;
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EnvironmentError::Io(e.to_string()))?;
        }
        std::fs::write(&resolved, data).map_err(|e| EnvironmentError::Io(e.to_string()))
    }

    async fn list_files(&self, dir: &str) -> Result<Vec<String>, EnvironmentError> {
        let resolved = confine(&self.working_path, dir)?;
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&resolved).map_err(|e| EnvironmentError::Io(e.to_string()))? {
            let entry = entry.map_err(|e| EnvironmentError::Io(e.to_string()))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn work_dir(&self) -> &str {
        self.working_path.to_str().unwrap_or_default()
    }

    async fn status(&self) -> StatusReport {
        let Some(id) = &self.container_id else {
            return StatusReport { state: EnvironmentState::Stopped, id: None, message: None };
        };
        match self.run(&["inspect", "-f", "{{.State.Running}}", id]).await {
            Ok(output) if output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true" => {
                StatusReport { state: EnvironmentState::Running, id: Some(id.clone()), message: None }
            }
            Ok(output) => StatusReport {
                state: EnvironmentState::Stopped,
                id: Some(id.clone()),
                message: Some(String::from_utf8_lossy(&output.stderr).into_owned()),
            },
            Err(e) => StatusReport { state: EnvironmentState::Error, id: Some(id.clone()), message: Some(e.to_string()) },
        }
    }

    async fn teardown(&mut self) -> Result<(), EnvironmentError> {
        if let Some(id) = self.container_id.take() {
            self.run(&["rm", "-f", &id]).await.map_err(|e| EnvironmentError::Teardown(e.to_string()))?;
        }
        if self.working_path.exists() {
            std::fs::remove_dir_all(&self.working_path).map_err(|e| EnvironmentError::Teardown(e.to_string()))?;
        }
        Ok(())
    }

    fn agent_addr(&self) -> Option<String> {
        self.container_id.as_ref().map(|_| format!("localhost:{AGENT_PORT}"))
    }
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
