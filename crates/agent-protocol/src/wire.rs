// SPDX-License-Identifier: MIT

//! Wire types for the in-environment agent protocol (spec §4.4): one JSON
//! object per WebSocket text frame, field schema exactly as tabulated in
//! the spec.

use serde::{Deserialize, Serialize};

/// Raw bytes serialized as base64 for JSON transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct B64Bytes(pub Vec<u8>);

impl Serialize for B64Bytes {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(&self.0).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for B64Bytes {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use base64::Engine;
        let s = String::deserialize(deserializer)?;
        let bytes = base64::engine::general_purpose::STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)?;
        Ok(B64Bytes(bytes))
    }
}

impl From<Vec<u8>> for B64Bytes {
    fn from(value: Vec<u8>) -> Self {
        B64Bytes(value)
    }
}

/// A message sent from the outside client into the in-environment agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Spawn a new pseudo-terminal running `command`; fails if `session_id` exists.
    Create { session_id: String, command: String, workdir: String, rows: u16, cols: u16 },
    /// Join an existing session; fails if missing.
    Attach { session_id: String },
    /// Stop receiving output on this connection; does not destroy the session.
    Detach,
    /// Write bytes to a session's stdin.
    Input { session_id: String, data: B64Bytes },
    /// Adjust a session's window size.
    Resize { session_id: String, rows: u16, cols: u16 },
    /// Request the list of live session ids.
    List,
}

/// A message sent from the in-environment agent back to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Output chunk from the process.
    Output { session_id: String, data: B64Bytes },
    /// Acknowledgement of a create/attach/detach.
    Ok { session_id: Option<String> },
    /// Failure of the last client request.
    Error { error: String },
    /// Reply to `ClientMessage::List`.
    List { sessions: Vec<String> },
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
