// SPDX-License-Identifier: MIT

//! WebSocket handler speaking the in-environment agent protocol (C4) over
//! a single connection at `/ws`.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use bytes::Bytes;
use cook_agent_protocol::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::state::Store;

pub async fn ws_handler(State(state): State<Arc<Store>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(state, socket))
}

/// Build the argv + environment for a `create` request: run the shell
/// string under `/bin/sh -c` after `cd`-ing into `workdir`, with
/// `TERM=xterm-256color` layered over the inherited environment.
fn shell_command(command: &str, workdir: &str) -> (Vec<String>, Vec<(String, String)>) {
    let quoted_workdir = workdir.replace('\'', "'\\''");
    let script = format!("cd '{quoted_workdir}' && exec {command}");
    (vec!["/bin/sh".to_string(), "-c".to_string(), script], vec![("TERM".to_string(), "xterm-256color".to_string())])
}

/// Wait on an optional receiver, never resolving when there is none so it
/// can sit in a `tokio::select!` branch alongside the inbound frame stream.
async fn recv_output(rx: &mut Option<mpsc::Receiver<Bytes>>) -> Option<Bytes> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Per-connection event loop: one connection is attached to at most one
/// session at a time, switching via `detach` + `attach`.
async fn handle_connection(state: Arc<Store>, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut current_key: Option<String> = None;
    let mut current_sub_id: Option<u64> = None;
    let mut output_rx: Option<mpsc::Receiver<Bytes>> = None;

    loop {
        tokio::select! {
            chunk = recv_output(&mut output_rx) => {
                match chunk {
                    Some(data) => {
                        let Some(session_id) = current_key.clone() else { continue };
                        let msg = ServerMessage::Output { session_id, data: data.to_vec().into() };
                        if send_json(&mut ws_tx, &msg).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        // Subscriber stream ended (session closed); stop forwarding.
                        output_rx = None;
                    }
                }
            }
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_client_message(
                            &state,
                            &text,
                            &mut current_key,
                            &mut current_sub_id,
                            &mut output_rx,
                        ).await;
                        if let Some(reply) = reply {
                            if send_json(&mut ws_tx, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(error = %e, "agentd websocket read error");
                        break;
                    }
                }
            }
        }
    }

    if let (Some(key), Some(id)) = (current_key, current_sub_id) {
        if let Some(session) = state.manager.get(&key).await {
            session.unsubscribe(id);
        }
    }
}

async fn handle_client_message(
    state: &Arc<Store>,
    text: &str,
    current_key: &mut Option<String>,
    current_sub_id: &mut Option<u64>,
    output_rx: &mut Option<mpsc::Receiver<Bytes>>,
) -> Option<ServerMessage> {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => return Some(ServerMessage::Error { error: format!("malformed message: {e}") }),
    };

    match msg {
        ClientMessage::Create { session_id, command, workdir, rows, cols } => {
            let (argv, env) = shell_command(&command, &workdir);
            match state.manager.create(session_id.clone(), move || (argv.clone(), env.clone()), cols, rows).await {
                Ok(session) => {
                    let (id, _snapshot, rx) = session.subscribe();
                    *current_key = Some(session_id.clone());
                    *current_sub_id = Some(id);
                    *output_rx = Some(rx);
                    Some(ServerMessage::Ok { session_id: Some(session_id) })
                }
                Err(e) => Some(ServerMessage::Error { error: e.to_string() }),
            }
        }
        ClientMessage::Attach { session_id } => match state.manager.get(&session_id).await {
            Some(session) => {
                let (id, _snapshot, rx) = session.subscribe();
                *current_key = Some(session_id.clone());
                *current_sub_id = Some(id);
                *output_rx = Some(rx);
                Some(ServerMessage::Ok { session_id: Some(session_id) })
            }
            None => Some(ServerMessage::Error { error: format!("no session for {session_id:?}") }),
        },
        ClientMessage::Detach => {
            if let (Some(key), Some(id)) = (current_key.take(), current_sub_id.take()) {
                if let Some(session) = state.manager.get(&key).await {
                    session.unsubscribe(id);
                }
            }
            *output_rx = None;
            Some(ServerMessage::Ok { session_id: None })
        }
        ClientMessage::Input { session_id, data } => match state.manager.get(&session_id).await {
            Some(session) => match session.write(Bytes::from(data.0)) {
                Ok(()) => None,
                Err(_) => Some(ServerMessage::Error { error: format!("session {session_id:?} is closed") }),
            },
            None => None,
        },
        ClientMessage::Resize { session_id, rows, cols } => match state.manager.get(&session_id).await {
            Some(session) => match session.resize(cols, rows) {
                Ok(()) => None,
                Err(_) => Some(ServerMessage::Error { error: format!("session {session_id:?} is closed") }),
            },
            None => None,
        },
        ClientMessage::List => Some(ServerMessage::List { sessions: state.manager.list().await }),
    }
}

async fn send_json(
    ws_tx: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(msg).unwrap_or_else(|_| "{\"type\":\"error\",\"error\":\"encode failure\"}".to_string());
    ws_tx.send(Message::Text(text.into())).await
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
