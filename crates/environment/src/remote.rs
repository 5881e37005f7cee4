// SPDX-License-Identifier: MIT

//! Remote sandbox backend (C9): a cloud sandbox reached through an
//! encrypted tunnel, with the agent daemon uploaded in argv-bounded
//! base64 chunks and file I/O proxied through `exec`.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use tracing::{info, warn};

use crate::backend::{EnvironmentBackend, EnvironmentError};
use crate::spec::{CommandHandle, EnvironmentContext, EnvironmentState, StatusReport};

const AGENT_PORT: u16 = 7422;
/// `exec` is bounded in argument size; the agent binary is uploaded in
/// chunks this large before being decoded in place.
const BINARY_CHUNK_BYTES: usize = 50 * 1024;
/// Larger chunk size for ordinary file writes via `write_file`.
const FILE_CHUNK_BYTES: usize = 512 * 1024;
const PORT_PROBE_ATTEMPTS: usize = 20;
const PORT_PROBE_INTERVAL: Duration = Duration::from_millis(500);

/// Thin client over a remote sandbox provider's control-plane API. Real
/// deployments point `base_url` at the provider; tests point it at a
/// local stub server.
#[derive(Clone)]
pub struct SandboxClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SandboxClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base_url: base_url.into(), api_key: api_key.into() }
    }

    pub async fn create_sandbox(&self, image: &str) -> Result<String, EnvironmentError> {
        let resp = self
            .http
            .post(format!("{}/sandboxes", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({"image": image, "lifetime_seconds": 3600, "expose_ports": [AGENT_PORT]}))
            .send()
            .await
            .map_err(|e| EnvironmentError::Setup(format!("create sandbox: {e}")))?;
        let body: serde_json::Value =
            resp.json().await.map_err(|e| EnvironmentError::Setup(format!("create sandbox response: {e}")))?;
        body.get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| EnvironmentError::Setup("create sandbox: missing id in response".to_string()))
    }

    pub async fn tunnel_url(&self, sandbox_id: &str, port: u16) -> Result<String, EnvironmentError> {
        let resp = self
            .http
            .get(format!("{}/sandboxes/{sandbox_id}/tunnels/{port}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| EnvironmentError::Setup(format!("tunnel lookup: {e}")))?;
        let body: serde_json::Value =
            resp.json().await.map_err(|e| EnvironmentError::Setup(format!("tunnel lookup response: {e}")))?;
        body.get("url")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| EnvironmentError::Setup("tunnel lookup: missing url in response".to_string()))
    }

    pub async fn exec(&self, sandbox_id: &str, command: &str) -> Result<(bool, Vec<u8>), EnvironmentError> {
        let resp = self
            .http
            .post(format!("{}/sandboxes/{sandbox_id}/exec", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({"command": command}))
            .send()
            .await
            .map_err(|e| EnvironmentError::Exec(e.to_string()))?;
        let body: serde_json::Value = resp.json().await.map_err(|e| EnvironmentError::Exec(e.to_string()))?;
        let ok = body.get("exit_code").and_then(|v| v.as_i64()).map(|c| c == 0).unwrap_or(false);
        let output = body.get("output").and_then(|v| v.as_str()).unwrap_or_default();
        Ok((ok, output.as_bytes().to_vec()))
    }
}

pub struct RemoteBackend {
    client: SandboxClient,
    image: String,
    /// Agent daemon binary to upload if the image doesn't already bake
    /// one in. `None` means the image is assumed to carry it.
    agentd_binary: Option<Vec<u8>>,
    working_path: String,
    sandbox_id: Option<String>,
    agent_addr: Option<String>,
}

impl RemoteBackend {
    pub fn new(client: SandboxClient, image: impl Into<String>, agentd_binary: Option<Vec<u8>>) -> Self {
        Self {
            client,
            image: image.into(),
            agentd_binary,
            working_path: "/workspace".to_string(),
            sandbox_id: None,
            agent_addr: None,
        }
    }

    /// Reattach to a sandbox by id without re-provisioning, restoring
    /// `agent_addr` from its current tunnel map.
    pub async fn from_handle(client: SandboxClient, sandbox_id: String) -> Result<Self, EnvironmentError> {
        let agent_addr = client.tunnel_url(&sandbox_id, AGENT_PORT).await?;
        Ok(Self {
            client,
            image: String::new(),
            agentd_binary: None,
            working_path: "/workspace".to_string(),
            sandbox_id: Some(sandbox_id),
            agent_addr: Some(agent_addr),
        })
    }

    fn id(&self) -> Result<&str, EnvironmentError> {
        self.sandbox_id.as_deref().ok_or_else(|| EnvironmentError::Exec("sandbox not provisioned".to_string()))
    }

    async fn exec_checked(&self, command: &str) -> Result<Vec<u8>, EnvironmentError> {
        let (ok, bytes) = self.client.exec(self.id()?, command).await?;
        if ok {
            Ok(bytes)
        } else {
            Err(EnvironmentError::NonZeroExit { bytes, exit_code: None })
        }
    }

    async fn upload_agentd(&self, binary: &[u8]) -> Result<(), EnvironmentError> {
        let id = self.id()?;
        self.client.exec(id, "rm -f /tmp/cook-agentd.b64").await?;
        for chunk in binary.chunks(BINARY_CHUNK_BYTES) {
            let encoded = base64::engine::general_purpose::STANDARD.encode(chunk);
            let (ok, _) = self.client.exec(id, &format!("printf '%s' '{encoded}' >> /tmp/cook-agentd.b64")).await?;
            if !ok {
                return Err(EnvironmentError::Setup("agent binary chunk upload failed".to_string()));
            }
        }
        let (ok, _) = self
            .client
            .exec(id, "base64 -d /tmp/cook-agentd.b64 > /usr/local/bin/cook-agentd && chmod +x /usr/local/bin/cook-agentd")
            .await?;
        if !ok {
            return Err(EnvironmentError::Setup("agent binary decode failed".to_string()));
        }
        let (ok, _) = self
            .client
            .exec(id, &format!("nohup /usr/local/bin/cook-agentd --port {AGENT_PORT} > /tmp/agent.log 2>&1 &"))
            .await?;
        if !ok {
            return Err(EnvironmentError::Setup("agent daemon failed to start".to_string()));
        }
        Ok(())
    }

    async fn wait_for_agent_port(&self) -> Result<(), EnvironmentError> {
        let id = self.id()?;
        for attempt in 0..PORT_PROBE_ATTEMPTS {
            let (ok, _) = self.client.exec(id, &format!("nc -z localhost {AGENT_PORT}")).await?;
            if ok {
                return Ok(());
            }
            tokio::time::sleep(PORT_PROBE_INTERVAL).await;
            warn!(attempt, "agent daemon not yet listening");
        }
        let (_, log) = self.client.exec(id, "tail -c 4096 /tmp/agent.log").await?;
        Err(EnvironmentError::Setup(format!(
            "agent daemon never opened port {AGENT_PORT}; log tail: {}",
            String::from_utf8_lossy(&log)
        )))
    }
}

#[async_trait]
impl EnvironmentBackend for RemoteBackend {
    async fn setup(&mut self, ctx: &EnvironmentContext) -> Result<(), EnvironmentError> {
        if self.sandbox_id.is_none() {
            let id = self.client.create_sandbox(&self.image).await?;
            self.sandbox_id = Some(id);
        }
        let id = self.id()?.to_string();

        self.client.exec(&id, &format!("mkdir -p {}", self.working_path)).await?;
        let (ok, out) = self
            .client
            .exec(&id, &format!("git clone '{}' '{}' && cd '{}' && git checkout '{}'", ctx.bare_repo_path, self.working_path, self.working_path, ctx.branch))
            .await?;
        if !ok {
            return Err(EnvironmentError::Setup(format!("clone/checkout in sandbox: {}", String::from_utf8_lossy(&out))));
        }

        if let Some(binary) = self.agentd_binary.clone() {
            self.upload_agentd(&binary).await?;
            self.wait_for_agent_port().await?;
        }
        self.agent_addr = Some(self.client.tunnel_url(&id, AGENT_PORT).await?);

        if let Some(url) = ctx.dotfiles_url.as_deref() {
            self.client.exec(&id, &format!("git clone --depth 1 '{url}' ~/.dotfiles")).await?;
        }

        info!(sandbox = %id, "remote sandbox ready");
        Ok(())
    }

    async fn exec(&self, command: &str) -> Result<Vec<u8>, EnvironmentError> {
        self.exec_checked(command).await
    }

    fn command(&self, _argv: &[String]) -> CommandHandle {
        CommandHandle::Unsupported
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, EnvironmentError> {
        let quoted = path.replace('\'', "'\\''");
        let out = self.exec_checked(&format!("cat '{}/{}' | base64", self.working_path, quoted)).await?;
        base64::engine::general_purpose::STANDARD
            .decode(out.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect::<Vec<u8>>())
            .map_err(|e| EnvironmentError::Io(format!("decode remote file: {e}")))
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), EnvironmentError> {
        let id = self.id()?;
        let quoted = path.replace('\'', "'\\''");
        let remote_path = format!("{}/{}", self.working_path, quoted);
        let tmp = format!("{remote_path}.b64upload");
        self.client.exec(id, &format!("rm -f '{tmp}'")).await?;
        for chunk in data.chunks(FILE_CHUNK_BYTES) {
            let encoded = base64::engine::general_purpose::STANDARD.encode(chunk);
            let (ok, _) = self.client.exec(id, &format!("printf '%s' '{encoded}' >> '{tmp}'")).await?;
            if !ok {
                return Err(EnvironmentError::Io(format!("chunk upload failed for {path}")));
            }
        }
        let (ok, _) = self.client.exec(id, &format!("mkdir -p \"$(dirname '{remote_path}')\" && base64 -d '{tmp}' > '{remote_path}' && rm -f '{tmp}'")).await?;
        if !ok {
            return Err(EnvironmentError::Io(format!("decode failed for {path}")));
        }
        Ok(())
    }

    async fn list_files(&self, dir: &str) -> Result<Vec<String>, EnvironmentError> {
        let quoted = dir.replace('\'', "'\\''");
        let out = self.exec_checked(&format!("ls -1a '{}/{}'", self.working_path, quoted)).await?;
        Ok(String::from_utf8_lossy(&out)
            .lines()
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
            .map(str::to_string)
            .collect())
    }

    fn work_dir(&self) -> &str {
        &self.working_path
    }

    async fn status(&self) -> StatusReport {
        match &self.sandbox_id {
            None => StatusReport { state: EnvironmentState::Stopped, id: None, message: None },
            Some(id) => match self.client.exec(id, "true").await {
                Ok((true, _)) => StatusReport { state: EnvironmentState::Running, id: Some(id.clone()), message: None },
                Ok((false, _)) | Err(_) => {
                    StatusReport { state: EnvironmentState::Error, id: Some(id.clone()), message: None }
                }
            },
        }
    }

    async fn teardown(&mut self) -> Result<(), EnvironmentError> {
        if let Some(id) = self.sandbox_id.take() {
            self.client
                .http
                .delete(format!("{}/sandboxes/{id}", self.client.base_url))
                .bearer_auth(&self.client.api_key)
                .send()
                .await
                .map_err(|e| EnvironmentError::Teardown(e.to_string()))?;
        }
        Ok(())
    }

    fn agent_addr(&self) -> Option<String> {
        self.agent_addr.clone()
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
