// SPDX-License-Identifier: MIT

//! Local backend (C7): working path on the host filesystem, isolated HOME,
//! host environment inherited with `HOME`/`TERM` replaced.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::backend::{EnvironmentBackend, EnvironmentError};
use crate::confine::{confine, confine_for_write};
use crate::spec::{CommandHandle, EnvironmentContext, EnvironmentState, StatusReport};

/// Dotfile entries never symlinked into the isolated home.
const DOTFILES_EXCLUDE: &[&str] = &[".git", "Cargo.lock", "README.md", "LICENSE"];

pub struct LocalBackend {
    working_path: PathBuf,
}

impl LocalBackend {
    pub fn new(working_path: impl Into<PathBuf>) -> Self {
        Self { working_path: working_path.into() }
    }

    /// Reattach to an already-provisioned local working tree. Local
    /// environments carry no other reattachment handle.
    pub fn from_handle(working_path: impl Into<PathBuf>) -> Self {
        Self::new(working_path)
    }

    fn home_dir(&self) -> PathBuf {
        self.working_path.join(".home")
    }

    fn dotfiles_dir(&self) -> PathBuf {
        self.working_path.join(".dotfiles")
    }

    fn base_env(&self) -> Vec<(String, String)> {
        vec![
            ("HOME".to_string(), self.home_dir().to_string_lossy().into_owned()),
            ("TERM".to_string(), "xterm-256color".to_string()),
        ]
    }

    async fn clone_and_symlink_dotfiles(&self, url: &str) -> Result<(), EnvironmentError> {
        let dotfiles = self.dotfiles_dir();
        if !dotfiles.exists() {
            let dotfiles_str = dotfiles.to_string_lossy().into_owned();
            let status = Command::new("git")
                .args(["clone", "--depth", "1", url, &dotfiles_str])
                .status()
                .await
                .map_err(|e| EnvironmentError::Setup(format!("git clone dotfiles: {e}")))?;
            if !status.success() {
                return Err(EnvironmentError::Setup(format!("git clone dotfiles exited with {status}")));
            }
        }

        let home = self.home_dir();
        std::fs::create_dir_all(&home).map_err(|e| EnvironmentError::Setup(format!("create home: {e}")))?;

        let entries = std::fs::read_dir(&dotfiles).map_err(|e| EnvironmentError::Setup(format!("read dotfiles: {e}")))?;
        for entry in entries {
            let entry = entry.map_err(|e| EnvironmentError::Setup(format!("read dotfiles entry: {e}")))?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if DOTFILES_EXCLUDE.contains(&name_str.as_ref()) {
                continue;
            }
            let link = home.join(&name);
            if link.exists() || link.symlink_metadata().is_ok() {
                continue;
            }
            #[cfg(unix)]
            std::os::unix::fs::symlink(entry.path(), &link)
                .map_err(|e| EnvironmentError::Setup(format!("symlink {}: {e}", link.display())))?;
        }
        Ok(())
    }
}

#[async_trait]
impl EnvironmentBackend for LocalBackend {
    async fn setup(&mut self, ctx: &EnvironmentContext) -> Result<(), EnvironmentError> {
        if !self.working_path.exists() {
            std::fs::create_dir_all(&self.working_path)
                .map_err(|e| EnvironmentError::Setup(format!("create working path: {e}")))?;
            let working_path_str = self.working_path.to_string_lossy().into_owned();
            let status = Command::new("git")
                .args(["clone", &ctx.bare_repo_path, &working_path_str])
                .status()
                .await
                .map_err(|e| EnvironmentError::Setup(format!("git clone: {e}")))?;
            if !status.success() {
                return Err(EnvironmentError::Setup(format!("git clone exited with {status}")));
            }
            let status = Command::new("git")
                .args(["checkout", "-B", &ctx.branch])
                .current_dir(&self.working_path)
                .status()
                .await
                .map_err(|e| EnvironmentError::Setup(format!("git checkout -B: {e}")))?;
            if !status.success() {
                return Err(EnvironmentError::Setup(format!("git checkout -B exited with {status}")));
            }
        }

        std::fs::create_dir_all(self.home_dir()).map_err(|e| EnvironmentError::Setup(format!("create home: {e}")))?;

        if let Some(url) = ctx.dotfiles_url.as_deref() {
            self.clone_and_symlink_dotfiles(url).await?;
        }

        info!(path = %self.working_path.display(), "local environment ready");
        Ok(())
    }

    async fn exec(&self, command: &str) -> Result<Vec<u8>, EnvironmentError> {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(command).current_dir(&self.working_path);
        for (key, value) in self.base_env() {
            cmd.env(key, value);
        }
        let output = cmd.output().await.map_err(|e| EnvironmentError::Exec(e.to_string()))?;

        let mut bytes = output.stdout;
        bytes.extend_from_slice(&output.stderr);

        if output.status.success() {
            Ok(bytes)
        } else {
            Err(EnvironmentError::NonZeroExit { bytes, exit_code: output.status.code() })
        }
    }

    fn command(&self, argv: &[String]) -> CommandHandle {
        CommandHandle::Local { argv: argv.to_vec(), env: self.base_env() }
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
        if self.working_path.join(".git").exists() {
            StatusReport { state: EnvironmentState::Running, id: None, message: None }
        } else {
            StatusReport { state: EnvironmentState::Stopped, id: None, message: None }
        }
    }

    async fn teardown(&mut self) -> Result<(), EnvironmentError> {
        if self.working_path.exists() {
            debug!(path = %self.working_path.display(), "removing local working tree");
            std::fs::remove_dir_all(&self.working_path).map_err(|e| EnvironmentError::Teardown(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
