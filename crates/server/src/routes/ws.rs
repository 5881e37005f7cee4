// SPDX-License-Identifier: MIT

//! Live terminal attach (spec §4.11): resolves local vs container/remote
//! per the branch's Environment Spec and pipes bytes both ways, translating
//! resize control frames.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use bytes::Bytes;
use cook_agent_protocol::{AgentClient, ClientMessage as AgentClientMessage, ServerMessage as AgentServerMessage};
use cook_environment::{CommandHandle, EnvironmentSpec};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::debug;

use crate::state::Store;

/// Host-visible address of the in-environment agent daemon, if this
/// branch's backend runs one (spec §4.4/§4.11). `None` for the local
/// backend, which is attached in-process instead.
const CONTAINER_AGENT_PORT: u16 = 7422;

fn resolve_agent_addr(spec: &EnvironmentSpec) -> Option<String> {
    match spec {
        EnvironmentSpec::Local { .. } => None,
        EnvironmentSpec::Container { container_id, .. } => container_id.as_ref().map(|_| format!("localhost:{CONTAINER_AGENT_PORT}")),
        EnvironmentSpec::Remote { agent_addr, .. } => agent_addr.clone(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ControlFrame {
    Resize { cols: u16, rows: u16 },
}

pub async fn attach_terminal(
    State(state): State<Arc<Store>>,
    Path((owner, name, branch_name)): Path<(String, String, String)>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_attach(state, owner, name, branch_name, socket))
}

async fn handle_attach(state: Arc<Store>, owner: String, name: String, branch_name: String, socket: WebSocket) {
    let Ok(Some(branch)) = cook_storage::branches::get(&state.pool, &owner, &name, &branch_name).await else {
        close_with_error(socket, "branch not found").await;
        return;
    };

    match &branch.environment {
        EnvironmentSpec::Local { .. } => attach_local(&state, &branch, socket).await,
        EnvironmentSpec::Container { .. } | EnvironmentSpec::Remote { .. } => attach_remote(&state, &branch, socket).await,
    }
}

async fn close_with_error(mut socket: WebSocket, message: &str) {
    let _ = socket.send(Message::Text(message.to_string().into())).await;
    let _ = socket.close().await;
}

/// Local attach: the shell runs as a direct child of this process, managed
/// through the in-process `TerminalManager` (same pattern as `cook-agentd`).
async fn attach_local(state: &Arc<Store>, branch: &cook_core::Branch, socket: WebSocket) {
    let session_key = branch.session_key();
    let backends = state.backends.lock().await;
    let Some(backend) = backends.get(&session_key) else {
        drop(backends);
        close_with_error(socket, "branch has no live local environment").await;
        return;
    };
    let CommandHandle::Local { argv, env } = backend.command(&["/bin/sh".to_string(), "-l".to_string()]) else {
        drop(backends);
        close_with_error(socket, "local backend did not return a local command handle").await;
        return;
    };
    drop(backends);

    let manager = Arc::clone(&state.manager);
    let (session, _created) = match manager.get_or_create(session_key.clone(), move || (argv.clone(), env.clone()), 80, 24).await {
        Ok(pair) => pair,
        Err(e) => {
            close_with_error(socket, &e.to_string()).await;
            return;
        }
    };

    let (sub_id, snapshot, mut output_rx) = session.subscribe();
    let (mut ws_tx, mut ws_rx) = socket.split();

    if !snapshot.is_empty() && ws_tx.send(Message::Binary(snapshot.into())).await.is_err() {
        session.unsubscribe(sub_id);
        return;
    }

    loop {
        tokio::select! {
            chunk = output_rx.recv() => {
                match chunk {
                    Some(data) => {
                        if ws_tx.send(Message::Binary(data.to_vec().into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Binary(data))) => {
                        let _ = session.write(Bytes::from(data.to_vec()));
                    }
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(ControlFrame::Resize { cols, rows }) = serde_json::from_str(&text) {
                            let _ = session.resize(cols, rows);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(error = %e, "terminal websocket read error");
                        break;
                    }
                }
            }
        }
    }

    session.unsubscribe(sub_id);
}

/// Container/remote attach: proxies bytes through an `AgentClient`
/// connection to the in-environment agent daemon (C4/C5).
async fn attach_remote(state: &Arc<Store>, branch: &cook_core::Branch, socket: WebSocket) {
    let Some(addr) = resolve_agent_addr(&branch.environment) else {
        close_with_error(socket, "environment has no reachable agent address").await;
        return;
    };

    let mut agent = match AgentClient::connect(&addr).await {
        Ok(client) => client,
        Err(e) => {
            close_with_error(socket, &format!("connect to in-environment agent: {e}")).await;
            return;
        }
    };

    let session_key = branch.session_key();
    let working_path = branch.environment.working_path().to_string();
    if agent.attach_or_create(&session_key, "/bin/sh -l", &working_path, 24, 80).await.is_err() {
        close_with_error(socket, "attach/create failed on in-environment agent").await;
        return;
    }

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            msg = agent.recv() => {
                match msg {
                    Ok(AgentServerMessage::Output { data, .. }) => {
                        if ws_tx.send(Message::Binary(data.0.into())).await.is_err() {
                            break;
                        }
                    }
                    Ok(AgentServerMessage::Error { error }) => {
                        if ws_tx.send(Message::Text(error.into())).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Binary(data))) => {
                        let input = AgentClientMessage::Input { session_id: session_key.clone(), data: data.to_vec().into() };
                        if agent.send(&input).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(ControlFrame::Resize { cols, rows }) = serde_json::from_str(&text) {
                            let resize = AgentClientMessage::Resize { session_id: session_key.clone(), rows, cols };
                            let _ = agent.send(&resize).await;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(error = %e, "terminal websocket read error");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
