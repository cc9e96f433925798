//! WebSocket handler for live session output.
//!
//! Clients submit commands with `{"type":"run","command":...}`. The
//! server drains the output queue on a short interval and pushes records
//! as they arrive, followed by a `completed` message once a command
//! submitted on this socket has retired.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tracing::debug;

use super::handlers::AppState;
use super::types::WsMessage;
use crate::session::CommandHandle;

/// How often pending output is pushed to the client.
const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send(sink: &mut SplitSink<WebSocket, Message>, msg: &WsMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sink.send(Message::Text(json.into())).await.is_ok(),
        Err(_) => true,
    }
}

/// Handle WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let mut pending: Vec<CommandHandle> = Vec::new();
    let mut ticker = tokio::time::interval(DRAIN_INTERVAL);

    loop {
        tokio::select! {
            msg = stream.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text.to_string(),
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                        continue;
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => continue,
                };

                let ws_msg: WsMessage = match serde_json::from_str(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        let err = WsMessage::Error {
                            code: "PARSE_ERROR".to_string(),
                            message: e.to_string(),
                        };
                        if !send(&mut sink, &err).await {
                            break;
                        }
                        continue;
                    }
                };

                let reply = match ws_msg {
                    WsMessage::Run { command } => {
                        match state.blocking(move |s| s.run(&command)).await {
                            Ok(handle) => {
                                pending.push(handle.clone());
                                WsMessage::Accepted { handle }
                            }
                            Err((_, body)) => WsMessage::Error {
                                code: body.0.code,
                                message: body.0.message,
                            },
                        }
                    }
                    WsMessage::Ping => WsMessage::Pong,
                    // Server-to-client messages are ignored
                    _ => continue,
                };
                if !send(&mut sink, &reply).await {
                    break;
                }
            }
            _ = ticker.tick() => {
                // Retirement happens after a command's output is queued, so
                // draining afterwards delivers output before `completed`.
                let (done, still_busy): (Vec<_>, Vec<_>) = pending
                    .drain(..)
                    .partition(|h| !state.session.is_command_busy(h));
                pending = still_busy;

                let records = state.session.drain_output();
                if !records.is_empty() && !send(&mut sink, &WsMessage::Output { records }).await {
                    break;
                }
                for handle in done {
                    if !send(&mut sink, &WsMessage::Completed { handle }).await {
                        return;
                    }
                }
            }
        }
    }
    debug!(pending = pending.len(), "WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_serialization() {
        let handle: CommandHandle = "__PIPE_SHELL_DONE_ab12_2a__".parse().unwrap();
        let json = serde_json::to_value(WsMessage::Completed { handle }).unwrap();
        assert_eq!(json["type"], "completed");
        assert_eq!(json["handle"], "__PIPE_SHELL_DONE_ab12_2a__");
    }
}
