// SPDX-License-Identifier: MIT

//! The environment backend contract (spec component C6): a uniform
//! interface over local-filesystem, container, and remote-sandbox
//! execution environments, expressed as an object-safe async trait so
//! callers hold `Box<dyn EnvironmentBackend>`.

use async_trait::async_trait;

use crate::spec::{CommandHandle, EnvironmentContext, StatusReport};

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("environment setup failed: {0}")]
    Setup(String),
    #[error("command execution failed: {0}")]
    Exec(String),
    /// A command ran to completion but exited non-zero. The captured
    /// stdout+stderr bytes ride along so callers (e.g. gate runs) can
    /// still record what the command printed.
    #[error("command exited with status {exit_code:?}")]
    NonZeroExit { bytes: Vec<u8>, exit_code: Option<i32> },
    #[error("path escapes working directory: {0:?}")]
    PathEscape(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("operation unsupported by this backend: {0}")]
    Unsupported(&'static str),
    #[error("teardown failed: {0}")]
    Teardown(String),
}

/// Uniform contract over {local, container, remote} environments.
#[async_trait]
pub trait EnvironmentBackend: Send + Sync {
    /// Idempotent provisioning: clone the repo, create the working tree,
    /// install/start the agent daemon (container/remote), apply dotfiles.
    async fn setup(&mut self, ctx: &EnvironmentContext) -> Result<(), EnvironmentError>;

    /// Run `command` non-interactively in the working directory, returning
    /// combined stdout+stderr. A non-zero exit is still an `Err`, but the
    /// captured bytes are attached so callers can surface gate output.
    async fn exec(&self, command: &str) -> Result<Vec<u8>, EnvironmentError>;

    /// A platform process handle usable as the target of a local-side
    /// pseudo-terminal attach. Only the local backend supports this;
    /// container/remote backends return `Unsupported` and callers must go
    /// through the in-environment agent protocol instead.
    fn command(&self, argv: &[String]) -> CommandHandle;

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, EnvironmentError>;
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), EnvironmentError>;
    async fn list_files(&self, dir: &str) -> Result<Vec<String>, EnvironmentError>;

    fn work_dir(&self) -> &str;
    async fn status(&self) -> StatusReport;
    async fn teardown(&mut self) -> Result<(), EnvironmentError>;

    /// Host-visible address of the in-environment agent daemon. `None` for
    /// the local backend, which never runs one.
    fn agent_addr(&self) -> Option<String> {
        None
    }
}
