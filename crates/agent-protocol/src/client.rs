// SPDX-License-Identifier: MIT

//! Client-side connection to an in-environment agent daemon (C5), used by
//! the server to pipe a live terminal view through a container or remote
//! sandbox backend.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::wire::{ClientMessage, ServerMessage};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connect to agent daemon failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed message from agent daemon: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("connection closed")]
    Closed,
    #[error("protocol violation: {0}")]
    Protocol(String),
}

/// A single bidirectional connection to an in-environment agent daemon.
///
/// One connection is attached to at most one session at a time but may
/// switch via `detach` + `attach` (spec §4.4).
pub struct AgentClient {
    socket: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl AgentClient {
    /// Connect to an agent daemon reachable at `addr`, e.g. `localhost:7422`
    /// or a tunnel URL. A bare `host:port` is treated as `ws://host:port/ws`.
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let url = if addr.starts_with("ws://") || addr.starts_with("wss://") {
            addr.to_string()
        } else {
            format!("ws://{addr}/ws")
        };
        let (socket, _response) = tokio_tungstenite::connect_async(url).await?;
        Ok(Self { socket })
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<(), ClientError> {
        let text = serde_json::to_string(message)?;
        self.socket.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Request attach-or-create for `session_id`: try `attach` first, and
    /// if the agent replies `error` fall back to `create`.
    pub async fn attach_or_create(
        &mut self,
        session_id: &str,
        command: &str,
        workdir: &str,
        rows: u16,
        cols: u16,
    ) -> Result<(), ClientError> {
        self.send(&ClientMessage::Attach { session_id: session_id.to_string() }).await?;
        match self.recv().await? {
            ServerMessage::Ok { .. } => Ok(()),
            ServerMessage::Error { .. } => {
                self.send(&ClientMessage::Create {
                    session_id: session_id.to_string(),
                    command: command.to_string(),
                    workdir: workdir.to_string(),
                    rows,
                    cols,
                })
                .await?;
                match self.recv().await? {
                    ServerMessage::Ok { .. } => Ok(()),
                    other => Err(ClientError::Protocol(format!("unexpected reply to create: {other:?}"))),
                }
            }
            other => Err(ClientError::Protocol(format!("unexpected reply to attach: {other:?}"))),
        }
    }

    /// Read the next message from the agent daemon.
    pub async fn recv(&mut self) -> Result<ServerMessage, ClientError> {
        loop {
            match self.socket.next().await {
                Some(Ok(Message::Text(text))) => return Ok(serde_json::from_str(&text)?),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Err(ClientError::Closed),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(ClientError::Connect(e)),
            }
        }
    }
}
