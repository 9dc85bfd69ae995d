//! WebSocket Connection Handler
//!
//! Hello -> Identify(token) -> READY, then Subscribe / Unsubscribe frames
//! and heartbeats until the socket closes, the heartbeat lapses, or the
//! capability token expires.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{stream::SplitStream, SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use uuid::Uuid;

use super::gateway::{canonical_channel, ConnectedSession, Gateway};
use super::messages::{
    dispatch, GatewayReceive, GatewaySend, IdentifyPayload, OpCode, ReadyPayload,
    SubscribePayload,
};
use super::session::SessionState;
use crate::application::services::{RealtimeClaims, RealtimeService};
use crate::presentation::http::services::realtime_service;
use crate::startup::AppState;

/// Grace period on top of the advertised heartbeat interval
const HEARTBEAT_GRACE_MS: u64 = 10_000;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let limits = &state.settings.websocket;
    ws.max_message_size(limits.max_message_size)
        .max_frame_size(limits.max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let gateway = state.gateway.clone();
    gateway.connection_opened();
    run_connection(socket, &state).await;
    gateway.connection_closed();
}

async fn run_connection(socket: WebSocket, state: &AppState) {
    let session_id = Uuid::new_v4().to_string();
    let mut session_state = SessionState::new(session_id.clone());
    let gateway = &state.gateway;

    tracing::debug!(session_id = %session_id, "New WebSocket connection");

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<GatewaySend>();

    let sender_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize gateway frame");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    let _ = tx.send(GatewaySend::hello(gateway.heartbeat_interval()));

    let identify_window = Duration::from_secs(state.settings.websocket.identify_timeout_secs);
    let token = match timeout(identify_window, wait_for_identify(&mut receiver)).await {
        Ok(Some(identify)) => identify.token,
        Ok(None) => {
            tracing::debug!(session_id = %session_id, "Connection closed before Identify");
            sender_task.abort();
            return;
        }
        Err(_) => {
            tracing::debug!(session_id = %session_id, "Identify timeout");
            reject(tx, sender_task, "identify_timeout").await;
            return;
        }
    };

    let realtime = realtime_service(state);
    let claims = match realtime.verify_token(&token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(session_id = %session_id, error = %e, "Identify rejected");
            reject(tx, sender_task, "invalid_token").await;
            return;
        }
    };
    let Some(user_id) = claims.user_id() else {
        reject(tx, sender_task, "invalid_token").await;
        return;
    };

    let ready = ReadyPayload {
        session_id: session_id.clone(),
        user_id: user_id.to_string(),
        channels: claims.channels.clone(),
        expires_at: claims.exp,
    };
    session_state.identify(claims);

    let session = gateway.register_session(session_id.clone(), user_id, tx.clone());
    let ready = serde_json::to_value(ready).unwrap_or_default();
    if !session.send_dispatch(dispatch::READY, ready) {
        gateway.unregister_session(&session_id);
        sender_task.abort();
        return;
    }

    tracing::info!(user_id, session_id = %session_id, "Gateway session identified");

    let timeout_ms = gateway.heartbeat_interval() + HEARTBEAT_GRACE_MS;
    let mut liveness = interval(Duration::from_millis(timeout_ms));
    liveness.tick().await;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let Ok(frame) = serde_json::from_str::<GatewayReceive>(&text) else {
                            tracing::debug!(session_id = %session_id, "Ignoring malformed frame");
                            continue;
                        };
                        handle_frame(frame, &mut session_state, &session, gateway, &realtime, &tx).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(session_id = %session_id, "Connection closed");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(session_id = %session_id, error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }

            _ = liveness.tick() => {
                if !session_state.is_alive(timeout_ms) {
                    tracing::info!(session_id = %session_id, "Heartbeat timeout, closing connection");
                    break;
                }
                if session_state.is_expired() {
                    tracing::info!(session_id = %session_id, "Capability token expired, closing connection");
                    let _ = tx.send(GatewaySend::invalid_session("token_expired"));
                    break;
                }
            }
        }
    }

    gateway.unregister_session(&session_id);
    drop(tx);
    // Let queued frames flush before the writer is torn down.
    let _ = timeout(Duration::from_millis(100), sender_task).await;

    tracing::info!(user_id, session_id = %session_id, "Gateway session closed");
}

async fn wait_for_identify(receiver: &mut SplitStream<WebSocket>) -> Option<IdentifyPayload> {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let Ok(frame) = serde_json::from_str::<GatewayReceive>(&text) else {
                    continue;
                };
                if frame.opcode() == Some(OpCode::Identify) {
                    if let Some(identify) = frame.payload::<IdentifyPayload>() {
                        return Some(identify);
                    }
                }
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            _ => continue,
        }
    }
    None
}

async fn reject(
    tx: mpsc::UnboundedSender<GatewaySend>,
    sender_task: tokio::task::JoinHandle<()>,
    reason: &str,
) {
    let _ = tx.send(GatewaySend::invalid_session(reason));
    drop(tx);
    if timeout(Duration::from_millis(100), sender_task).await.is_err() {
        tracing::debug!(reason, "Writer did not drain before close");
    }
}

async fn handle_frame<R: RealtimeService>(
    frame: GatewayReceive,
    session_state: &mut SessionState,
    session: &Arc<ConnectedSession>,
    gateway: &Gateway,
    realtime: &R,
    tx: &mpsc::UnboundedSender<GatewaySend>,
) {
    match frame.opcode() {
        Some(OpCode::Heartbeat) => {
            session_state.heartbeat();
            let _ = tx.send(GatewaySend::heartbeat_ack());
        }
        Some(OpCode::Subscribe) => {
            let Some(SubscribePayload { channel }) = frame.payload() else {
                session.send_dispatch(
                    dispatch::SUBSCRIBE_FAILED,
                    json!({ "channel": null, "reason": "missing channel" }),
                );
                return;
            };
            let Some(claims) = session_state.claims.as_ref() else {
                return;
            };
            subscribe(claims, &channel, session, gateway, realtime).await;
        }
        Some(OpCode::Unsubscribe) => {
            if let Some(SubscribePayload { channel }) = frame.payload() {
                let channel = canonical_channel(&channel);
                gateway.unsubscribe(&session.session_id, &channel);
                session.send_dispatch(dispatch::UNSUBSCRIBED, json!({ "channel": channel }));
            }
        }
        _ => {
            tracing::debug!(
                session_id = %session_state.session_id,
                op = frame.op,
                "Unexpected opcode"
            );
        }
    }
}

async fn subscribe<R: RealtimeService>(
    claims: &RealtimeClaims,
    channel: &str,
    session: &Arc<ConnectedSession>,
    gateway: &Gateway,
    realtime: &R,
) {
    match realtime.authorize(claims, channel).await {
        Ok(scope) => {
            let name = scope.name();
            gateway.subscribe(&session.session_id, &name);
            session.send_dispatch(dispatch::SUBSCRIBED, json!({ "channel": name }));
        }
        Err(e) => {
            tracing::debug!(
                session_id = %session.session_id,
                channel,
                error = %e,
                "Subscription refused"
            );
            session.send_dispatch(
                dispatch::SUBSCRIBE_FAILED,
                json!({ "channel": channel, "reason": e.to_string() }),
            );
        }
    }
}
