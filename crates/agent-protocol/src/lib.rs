// SPDX-License-Identifier: MIT

//! Wire protocol and client for the in-environment agent daemon (spec
//! component C4): JSON-over-WebSocket messages and a connection helper
//! used by the server to attach a live terminal through a container or
//! remote sandbox backend.

pub mod client;
pub mod wire;

pub use client::{AgentClient, ClientError};
pub use wire::{B64Bytes, ClientMessage, ServerMessage};
