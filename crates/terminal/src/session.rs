// SPDX-License-Identifier: MIT

//! Terminal Session: owns one pseudo-terminal and fans out its output to
//! zero or more concurrent subscribers, surviving client disconnects until
//! the underlying process exits.

use std::sync::Mutex;
use std::time::SystemTime;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::pty::{ExitStatus, NativePty};
use cook_ring::RingBuffer;

/// Bound on the per-subscriber output queue. A subscriber that can't keep
/// up loses chunks, never blocks the pump (spec §5).
const SUBSCRIBER_QUEUE: usize = 256;

/// Why a session finalized.
#[derive(Debug, Clone)]
pub enum CloseCause {
    /// The child process exited.
    Exited(ExitStatus),
    /// The pseudo-terminal read loop hit an unexpected I/O error.
    ReadError(String),
    /// `close()` was called explicitly.
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session is closed")]
    Closed,
    #[error(transparent)]
    Spawn(#[from] anyhow::Error),
}

struct Inner {
    ring: RingBuffer,
    subscribers: std::collections::HashMap<u64, mpsc::Sender<Bytes>>,
    next_subscriber_id: u64,
    closed: bool,
    closed_at: Option<SystemTime>,
    close_cause: Option<CloseCause>,
}

/// A live pseudo-terminal session, keyed by [`crate::manager::SessionKey`].
pub struct TerminalSession {
    key: String,
    started_at: SystemTime,
    child_pid: u32,
    pty: std::sync::Arc<NativePty>,
    pty_input: mpsc::Sender<Bytes>,
    resize: Box<dyn Fn(u16, u16) -> anyhow::Result<()> + Send + Sync>,
    inner: Mutex<Inner>,
}

impl TerminalSession {
    /// Spawn a new session running `command` on a PTY of the given size,
    /// writing output into a ring buffer of `ring_capacity` bytes.
    pub fn spawn(
        key: impl Into<String>,
        command: &[String],
        env: &[(String, String)],
        cols: u16,
        rows: u16,
        ring_capacity: usize,
    ) -> Result<std::sync::Arc<Self>, SessionError> {
        let pty = NativePty::spawn(command, cols, rows, env)?;
        let child_pid = pty.child_pid();
        let pty = std::sync::Arc::new(pty);

        let (input_tx, mut input_rx) = mpsc::channel::<Bytes>(SUBSCRIBER_QUEUE);

        let session = std::sync::Arc::new(Self {
            key: key.into(),
            started_at: SystemTime::now(),
            child_pid,
            pty: std::sync::Arc::clone(&pty),
            pty_input: input_tx,
            resize: {
                let pty = std::sync::Arc::clone(&pty);
                Box::new(move |cols, rows| pty.resize(cols, rows))
            },
            inner: Mutex::new(Inner {
                ring: RingBuffer::new(ring_capacity),
                subscribers: std::collections::HashMap::new(),
                next_subscriber_id: 0,
                closed: false,
                closed_at: None,
                close_cause: None,
            }),
        });

        // Writer: drains input_rx into the PTY's stdin.
        {
            let pty = std::sync::Arc::clone(&pty);
            tokio::spawn(async move {
                while let Some(data) = input_rx.recv().await {
                    if pty.write(&data).await.is_err() {
                        break;
                    }
                }
            });
        }

        // Output pump: reads from the PTY and fans out to ring + subscribers.
        {
            let session = std::sync::Arc::clone(&session);
            let pty = std::sync::Arc::clone(&pty);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 32 * 1024];
                loop {
                    match pty.read(&mut buf).await {
                        Ok(0) => {
                            session.finalize(CloseCause::Exited(ExitStatus { code: None, signal: None }));
                            break;
                        }
                        Ok(n) => session.dispatch_output(Bytes::copy_from_slice(&buf[..n])),
                        Err(e) if e.raw_os_error() == Some(nix::libc::EIO) => {
                            session.finalize(CloseCause::Exited(ExitStatus { code: None, signal: None }));
                            break;
                        }
                        Err(e) => {
                            session.finalize(CloseCause::ReadError(e.to_string()));
                            break;
                        }
                    }
                }
            });
        }

        // Process waiter: blocks on child exit, then unsticks the pump.
        {
            let session = std::sync::Arc::clone(&session);
            let pty = std::sync::Arc::clone(&pty);
            tokio::spawn(async move {
                let result = tokio::task::spawn_blocking(move || pty.wait_and_unstick()).await;
                match result {
                    Ok(Ok(status)) => session.finalize(CloseCause::Exited(status)),
                    Ok(Err(e)) => warn!(session = %session.key, error = %e, "process waiter failed"),
                    Err(e) => warn!(session = %session.key, error = %e, "process waiter task panicked"),
                }
            });
        }

        Ok(session)
    }

    fn dispatch_output(&self, chunk: Bytes) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.ring.append(&chunk);
        inner.subscribers.retain(|id, tx| match tx.try_send(chunk.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(session = %self.key, subscriber = id, "dropped output chunk: subscriber queue full");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Idempotent: only the first call records `closed_at`/`close_cause`
    /// and closes subscriber streams.
    fn finalize(&self, cause: CloseCause) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.closed {
            return;
        }
        inner.closed = true;
        inner.closed_at = Some(SystemTime::now());
        inner.close_cause = Some(cause);
        inner.subscribers.clear();
    }

    /// Atomically return the current replay snapshot and a new output
    /// stream. If already closed, the stream is returned already ended.
    pub fn subscribe(&self) -> (u64, Vec<u8>, mpsc::Receiver<Bytes>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let snapshot = inner.ring.snapshot();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE);
        let id = inner.next_subscriber_id;
        inner.next_subscriber_id += 1;
        if !inner.closed {
            inner.subscribers.insert(id, tx);
        }
        // else: drop `tx`, leaving `rx` immediately closed once polled.
        (id, snapshot, rx)
    }

    /// Remove a subscriber. Idempotent.
    pub fn unsubscribe(&self, id: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.subscribers.remove(&id);
    }

    /// Write bytes to the child's stdin. Fails if closed.
    pub fn write(&self, data: Bytes) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        self.pty_input.try_send(data).map_err(|_| SessionError::Closed)
    }

    /// Adjust the pseudo-terminal window size. Fails if closed.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        (self.resize)(cols, rows).map_err(SessionError::Spawn)
    }

    /// Signal process-group termination and close the terminal handle.
    /// SIGHUP is sent immediately; SIGKILL follows after a short grace
    /// period so a child that ignores SIGHUP doesn't linger forever. The
    /// pump/waiter/writer tasks observe the exit and drop their own
    /// `Arc<NativePty>` clones, after which the master fd closes in `Drop`.
    pub fn close(&self) {
        self.pty.signal_hangup();
        let pty = std::sync::Arc::clone(&self.pty);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            pty.signal_kill();
        });
        self.finalize(CloseCause::Closed);
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn pid(&self) -> u32 {
        self.child_pid
    }

    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).closed
    }

    pub fn closed_at(&self) -> Option<SystemTime> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).closed_at
    }

    /// The recorded reason for the first finalization, if closed.
    pub fn close_cause(&self) -> Option<CloseCause> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).close_cause.clone()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
