// SPDX-License-Identifier: MIT

//! Terminal Manager: a concurrent keyed registry of [`TerminalSession`]s
//! with get-or-create semantics.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::session::{SessionError, TerminalSession};

/// Stable string identifying a terminal session: `repo/branch` for the
/// primary agent session, `repo/branch/tab-id` for additional user shells.
pub type SessionKey = String;

/// A factory that builds the argv + environment for a new session. Called
/// under the manager's lock so creation is single-flight per key.
pub trait CommandFactory: Send {
    fn build(&self) -> (Vec<String>, Vec<(String, String)>);
}

impl<F> CommandFactory for F
where
    F: Fn() -> (Vec<String>, Vec<(String, String)>) + Send,
{
    fn build(&self) -> (Vec<String>, Vec<(String, String)>) {
        (self)()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("session already exists for key {0:?}")]
    AlreadyExists(SessionKey),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Default ring-buffer capacity for new sessions (8 MiB, per spec §3).
pub const DEFAULT_RING_CAPACITY: usize = 8 * 1024 * 1024;

/// Keyed registry of live terminal sessions.
#[derive(Default)]
pub struct TerminalManager {
    sessions: Mutex<HashMap<SessionKey, Arc<TerminalSession>>>,
}

impl TerminalManager {
    pub fn new() -> Self {
        Self { sessions: Mutex::new(HashMap::new()) }
    }

    /// Create a new session for `key`. Fails if one already exists.
    pub async fn create(
        &self,
        key: impl Into<SessionKey>,
        factory: impl CommandFactory,
        cols: u16,
        rows: u16,
    ) -> Result<Arc<TerminalSession>, ManagerError> {
        let key = key.into();
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&key) {
            return Err(ManagerError::AlreadyExists(key));
        }
        let (cols, rows) = if cols == 0 || rows == 0 { (80, 24) } else { (cols, rows) };
        let (command, env) = factory.build();
        let session = TerminalSession::spawn(key.clone(), &command, &env, cols, rows, DEFAULT_RING_CAPACITY)?;
        sessions.insert(key, Arc::clone(&session));
        Ok(session)
    }

    /// Return the existing session for `key`, or create and register one.
    ///
    /// The factory runs under the manager lock so concurrent callers for
    /// the same key observe exactly one creation (single-flight). The
    /// initial size is applied only to a freshly created session — an
    /// existing session's size is left untouched.
    pub async fn get_or_create(
        &self,
        key: impl Into<SessionKey>,
        factory: impl CommandFactory,
        initial_cols: u16,
        initial_rows: u16,
    ) -> Result<(Arc<TerminalSession>, bool), ManagerError> {
        let key = key.into();
        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.get(&key) {
            return Ok((Arc::clone(existing), false));
        }

        let (cols, rows) = if initial_cols == 0 || initial_rows == 0 { (80, 24) } else { (initial_cols, initial_rows) };
        let (command, env) = factory.build();
        let session = TerminalSession::spawn(key.clone(), &command, &env, cols, rows, DEFAULT_RING_CAPACITY)?;
        sessions.insert(key, Arc::clone(&session));
        Ok((session, true))
    }

    pub async fn get(&self, key: &str) -> Option<Arc<TerminalSession>> {
        self.sessions.lock().await.get(key).cloned()
    }

    pub async fn list(&self) -> Vec<SessionKey> {
        self.sessions.lock().await.keys().cloned().collect()
    }

    /// Close and forget the session for `key`, if any.
    pub async fn remove(&self, key: &str) {
        if let Some(session) = self.sessions.lock().await.remove(key) {
            session.close();
        }
    }

    pub async fn close_all(&self) {
        let mut sessions = self.sessions.lock().await;
        for session in sessions.values() {
            session.close();
        }
        sessions.clear();
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
