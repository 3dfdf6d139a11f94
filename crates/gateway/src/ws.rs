//! WebSocket endpoint for voice calls.
//!
//! Flow: transport connects to `/v1/voice/{agent_id}/ws`, the connection
//! registry admits it, a [`CallSupervisor`] is started against the agent's
//! configured providers, and three tasks run for the connection's lifetime:
//! a reader that decodes inbound frames through the transport adapter and
//! feeds audio/control into the supervisor, a writer that forwards encoded
//! frames (pipeline output and heartbeat pings alike) to the socket, and a
//! pinger that dispatches a ping every heartbeat interval and forces the
//! connection closed after three consecutive unanswered ones.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};

use voice_domain::stream::PipelineEvent;
use voice_transport::{PstnJsonAdapter, TransportAdapter, TransportEvent, WebRtcSignalingAdapter};

use crate::connection::ConnectionState;
use crate::state::AppState;
use crate::supervisor::CallSupervisor;

/// Consecutive unanswered pings before a connection is force-disconnected.
const MAX_MISSED_PINGS: u32 = 3;

pub async fn voice_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> impl IntoResponse {
    let Some(agent) = state.config.agents.get(&agent_id).cloned() else {
        return (axum::http::StatusCode::NOT_FOUND, "unknown agent_id").into_response();
    };
    if let Err(e) = state.rate_limits.check_or_raise("connection", &agent_id) {
        tracing::warn!(%agent_id, error = %e, "rejecting connection: rate limited");
        return (axum::http::StatusCode::TOO_MANY_REQUESTS, "rate limited").into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state, agent_id, agent)).into_response()
}

fn adapter_for(transport_kind: &str) -> Arc<dyn TransportAdapter> {
    match transport_kind {
        "webrtc" => Arc::new(WebRtcSignalingAdapter::new()),
        _ => Arc::new(PstnJsonAdapter::new()),
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, agent_id: String, agent: voice_domain::config::AgentConfig) {
    let connection_id = uuid::Uuid::new_v4().to_string();
    let session_id = uuid::Uuid::new_v4().to_string();
    let transport_kind = "pstn_json";
    let adapter = adapter_for(transport_kind);

    if state
        .connections
        .register(connection_id.clone(), Some(agent_id.clone()), Some(session_id.clone()), None)
        .is_err()
    {
        tracing::warn!(%connection_id, "rejecting connection: server at capacity");
        return;
    }
    state.connections.set_state(&connection_id, ConnectionState::Connected);

    let (supervisor, mut out_rx) = match CallSupervisor::start(
        &state,
        session_id.clone(),
        "default".to_string(),
        None,
        agent_id.clone(),
        &agent,
        transport_kind,
    )
    .await
    {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!(%session_id, error = %e, "failed to start call supervisor");
            state.connections.disconnect(&connection_id, "supervisor_start_failed");
            return;
        }
    };
    state.connections.set_state(&connection_id, ConnectionState::Active);

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (frame_tx, mut frame_rx) = mpsc::channel::<Message>(64);

    let writer = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            if ws_sink.send(frame).await.is_err() {
                break;
            }
        }
    });

    let events_adapter = adapter.clone();
    let events_frame_tx = frame_tx.clone();
    let events_task = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let frame = match &event {
                PipelineEvent::Audio { data, .. } => {
                    let pcm16: Vec<i16> = data
                        .chunks_exact(2)
                        .map(|b| i16::from_le_bytes([b[0], b[1]]))
                        .collect();
                    events_adapter.encode_audio(&pcm16).ok().map(Message::Binary)
                }
                other => serde_json::to_string(other).ok().map(Message::Text),
            };
            let Some(frame) = frame else { continue };
            if events_frame_tx.send(frame).await.is_err() {
                break;
            }
        }
        if let Ok(Some(bytes)) = events_adapter.encode_close("server_shutdown") {
            let _ = events_frame_tx.send(Message::Binary(bytes)).await;
        }
    });

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let ping_connections = state.connections.clone();
    let ping_connection_id = connection_id.clone();
    let ping_frame_tx = frame_tx.clone();
    let pinger = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_connections.heartbeat_interval().max(Duration::from_millis(1)));
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            if ping_frame_tx.send(Message::Ping(Vec::new())).await.is_err() {
                return;
            }
            let missed = ping_connections.record_ping_sent(&ping_connection_id);
            if missed >= MAX_MISSED_PINGS {
                tracing::warn!(connection_id = %ping_connection_id, missed, "connection missed too many pongs, disconnecting");
                let _ = stop_tx.send(true);
                return;
            }
        }
    });

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            msg = ws_stream.next() => {
                let Some(Ok(msg)) = msg else { break };
                state.connections.touch(&connection_id);
                let raw = match msg {
                    Message::Binary(b) => b,
                    Message::Text(t) => t.into_bytes(),
                    Message::Close(_) => break,
                    Message::Ping(_) | Message::Pong(_) => continue,
                };

                let events = match adapter.decode(&raw) {
                    Ok(events) => events,
                    Err(e) => {
                        tracing::debug!(%session_id, error = %e, "dropping unparseable transport frame");
                        continue;
                    }
                };
                let mut stopped = false;
                for event in events {
                    match event {
                        TransportEvent::Audio(pcm16) => {
                            if supervisor.send_audio(pcm16).await.is_err() {
                                stopped = true;
                                break;
                            }
                        }
                        TransportEvent::Stopped => {
                            stopped = true;
                            break;
                        }
                        TransportEvent::Started { .. } | TransportEvent::Control(_) => {}
                    }
                }
                if stopped {
                    break;
                }
            }
        }
    }

    pinger.abort();
    events_task.abort();
    writer.abort();
    let usage = supervisor.finish(&state);
    state.connections.disconnect(&connection_id, "closed");
    if let Some(usage) = usage {
        tracing::info!(
            session_id = %session_id,
            stt_seconds = usage.stt_seconds,
            llm_input_tokens = usage.llm_input_tokens,
            llm_output_tokens = usage.llm_output_tokens,
            tts_chars = usage.tts_chars,
            "call ended"
        );
    }
}
