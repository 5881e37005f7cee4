// SPDX-License-Identifier: MIT

//! End-to-end harness: runs the real `cook-server` router in-process
//! against an ephemeral loopback port and a tempdir-backed data directory,
//! so scenario tests drive it with a plain HTTP client and assert
//! directly against the bare git repos it produces.

use std::path::PathBuf;
use std::sync::Arc;

use cook_server::config::Config;
use cook_server::state::Store;
use tokio::task::JoinHandle;

pub struct TestServer {
    pub state: Arc<Store>,
    pub data_dir: tempfile::TempDir,
    base_url: String,
    serve_task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let config = Config {
            port: 0,
            host: "127.0.0.1".to_string(),
            database_url: "sqlite::memory:".to_string(),
            data_dir: data_dir.path().to_str().unwrap().to_string(),
            log_format: "text".to_string(),
            log_level: "warn".to_string(),
            request_timeout_secs: 60,
            container_runtime: "docker".to_string(),
            container_image: "cook/workbench:latest".to_string(),
            agentd_binary_path: "/usr/local/bin/cook-agentd".to_string(),
            remote_base_url: None,
            remote_api_key: None,
        };

        let pool = cook_storage::connect(&config.database_url).await?;
        let state = Store::new(pool, &config);
        let router = cook_server::run::build_router(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let serve_task = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self { state, data_dir, base_url: format!("http://127.0.0.1:{port}"), serve_task })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Working tree path for a branch, matching `Store::working_path`'s
    /// deterministic layout.
    pub fn working_path(&self, owner: &str, name: &str, branch: &str) -> PathBuf {
        self.state.working_path(owner, name, branch)
    }

    pub fn bare_repo_path(&self, owner: &str, name: &str) -> PathBuf {
        self.state.bare_repo_path(owner, name)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.serve_task.abort();
    }
}

/// Stage and commit every pending change in `working_path` on its current
/// branch, returning the new commit's hex oid.
pub fn commit_all(working_path: &std::path::Path, message: &str) -> anyhow::Result<String> {
    let repo = git2::Repository::open(working_path)?;
    let mut index = repo.index()?;
    index.add_all(["*"], git2::IndexAddOption::DEFAULT, None)?;
    index.write()?;
    let tree_oid = index.write_tree()?;
    let tree = repo.find_tree(tree_oid)?;
    let signature = git2::Signature::now("cook-specs", "cook-specs@example.invalid")?;
    let head = repo.head()?.peel_to_commit()?;
    let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &[&head])?;
    Ok(oid.to_string())
}

/// The bare repo's `master` tip.
pub fn bare_master_rev(bare_repo_path: &std::path::Path) -> anyhow::Result<String> {
    let repo = git2::Repository::open_bare(bare_repo_path)?;
    let reference = repo.find_branch("master", git2::BranchType::Local)?;
    Ok(reference.get().target().ok_or_else(|| anyhow::anyhow!("master has no target"))?.to_string())
}
