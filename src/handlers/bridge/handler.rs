//! Bridge session handler.
//!
//! One session per accepted WebSocket upgrade. The session owns the client
//! socket, at most one upstream provider connection, and the turn
//! aggregator, and it runs the reconnection policy:
//!
//! - upstream connect is attempted as soon as the session starts; failure
//!   is reported as an `error` event and the session stays alive
//! - while disconnected, the next `user_text` triggers exactly one
//!   reconnection attempt before forwarding
//! - an upstream close never closes the client socket; it only finalizes
//!   the in-progress turn and drops the upstream reference
//! - a client close or socket error ends the session: timers cancelled,
//!   upstream closed, buffers released

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::core::turn::TurnAggregator;
use crate::core::upstream::{UpstreamConfig, UpstreamConnection, UpstreamEvent};
use crate::state::AppState;

use super::messages::{ClientMessage, OutboundFrame, ServerMessage};

/// Buffer size of the per-session outbound channel.
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Run one bridge session to completion.
pub async fn handle_bridge_session(socket: WebSocketStream<TcpStream>, state: Arc<AppState>) {
    let session_id = Uuid::new_v4();
    run_session(socket, state)
        .instrument(info_span!("bridge_session", %session_id))
        .await;
}

async fn run_session(socket: WebSocketStream<TcpStream>, state: Arc<AppState>) {
    info!("bridge session established");

    let (mut ws_sink, mut ws_source) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<OutboundFrame>(CHANNEL_BUFFER_SIZE);

    // Sender task: sole writer to the client socket. Everything outbound
    // funnels through one channel, so the client sees frames in enqueue
    // order (WAV before turn_end before ai_text).
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let should_close = matches!(frame, OutboundFrame::Close);

            let result = match frame {
                OutboundFrame::Json(message) => match serde_json::to_string(&message) {
                    Ok(json) => ws_sink.send(Message::Text(json.into())).await,
                    Err(e) => {
                        error!("failed to serialize outgoing message: {e}");
                        continue;
                    }
                },
                OutboundFrame::Wav(wav) => ws_sink.send(Message::Binary(wav)).await,
                OutboundFrame::Close => ws_sink.send(Message::Close(None)).await,
            };

            if let Err(e) = result {
                debug!("client socket write failed: {e}");
                break;
            }

            if should_close {
                break;
            }
        }
    });

    // Without provider credentials there is nothing to bridge: tell the
    // client and close.
    let Some(upstream_config) = state.config.upstream_config() else {
        warn!("bridge session refused: upstream credentials not configured");
        let _ = out_tx
            .send(OutboundFrame::Json(ServerMessage::Error {
                error: "upstream credentials not configured".to_string(),
            }))
            .await;
        let _ = out_tx.send(OutboundFrame::Close).await;
        let _ = sender_task.await;
        return;
    };

    let aggregator = TurnAggregator::new(out_tx.clone(), state.stt_client());

    let mut upstream: Option<UpstreamConnection> = None;
    let mut upstream_events: Option<mpsc::Receiver<UpstreamEvent>> = None;

    // Eager first attempt. Failure keeps the session alive; the next
    // user_text retries.
    if let Err(e) =
        connect_upstream(&upstream_config, &state, &mut upstream, &mut upstream_events).await
    {
        warn!("initial upstream connect failed: {e}");
        let _ = out_tx
            .send(OutboundFrame::Json(ServerMessage::Error {
                error: e.to_string(),
            }))
            .await;
    }

    loop {
        tokio::select! {
            msg = ws_source.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let message = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(message) => message,
                            Err(_) => {
                                debug!("dropping unrecognized client frame");
                                continue;
                            }
                        };
                        match message {
                            ClientMessage::UserText { text } => {
                                forward_user_text(
                                    &text,
                                    &upstream_config,
                                    &state,
                                    &mut upstream,
                                    &mut upstream_events,
                                    &out_tx,
                                )
                                .await;
                            }
                            ClientMessage::Close => {
                                info!("client requested close");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("client closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary and control frames from the client carry
                        // no meaning here.
                    }
                    Some(Err(e)) => {
                        warn!("client socket error: {e}");
                        break;
                    }
                    None => {
                        info!("client connection ended");
                        break;
                    }
                }
            }

            event = recv_upstream(&mut upstream_events) => {
                match event {
                    Some(UpstreamEvent::Metadata(meta)) => {
                        let _ = out_tx
                            .send(OutboundFrame::Json(ServerMessage::Meta { meta }))
                            .await;
                    }
                    Some(UpstreamEvent::AudioChunk(chunk)) => {
                        aggregator.on_audio_chunk(chunk).await;
                    }
                    Some(UpstreamEvent::Interruption) => {
                        aggregator.on_interruption().await;
                    }
                    Some(UpstreamEvent::Closed) | None => {
                        info!("upstream connection ended, session stays open");
                        aggregator.on_upstream_closed().await;
                        upstream = None;
                        upstream_events = None;
                    }
                }
            }
        }
    }

    // Session teardown: client-side exit never emits a turn.
    aggregator.shutdown().await;
    if let Some(upstream) = upstream.take() {
        upstream.close();
    }
    let _ = out_tx.send(OutboundFrame::Close).await;
    let _ = sender_task.await;

    info!("bridge session terminated");
}

/// Receive the next upstream event, or park forever while disconnected.
async fn recv_upstream(
    events: &mut Option<mpsc::Receiver<UpstreamEvent>>,
) -> Option<UpstreamEvent> {
    match events.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Open a fresh upstream connection, replacing any stale handle.
async fn connect_upstream(
    config: &UpstreamConfig,
    state: &Arc<AppState>,
    upstream: &mut Option<UpstreamConnection>,
    upstream_events: &mut Option<mpsc::Receiver<UpstreamEvent>>,
) -> Result<(), crate::core::upstream::UpstreamError> {
    if let Some(stale) = upstream.take() {
        stale.close();
    }
    let (connection, events) = UpstreamConnection::connect(config, &state.http).await?;
    *upstream = Some(connection);
    *upstream_events = Some(events);
    Ok(())
}

/// Forward one user_text upstream, reconnecting at most once first if the
/// connection is absent or no longer open.
async fn forward_user_text(
    text: &str,
    config: &UpstreamConfig,
    state: &Arc<AppState>,
    upstream: &mut Option<UpstreamConnection>,
    upstream_events: &mut Option<mpsc::Receiver<UpstreamEvent>>,
    out_tx: &mpsc::Sender<OutboundFrame>,
) {
    let connected = upstream.as_ref().is_some_and(UpstreamConnection::is_open);
    if !connected {
        info!("upstream disconnected, attempting reconnect before forwarding");
        if let Err(e) = connect_upstream(config, state, upstream, upstream_events).await {
            warn!("upstream reconnect failed: {e}");
            let _ = out_tx
                .send(OutboundFrame::Json(ServerMessage::Error {
                    error: e.to_string(),
                }))
                .await;
            return;
        }
    }

    // The reconnect above either succeeded or returned, so a send failure
    // here means the socket died in between. Report it; the next
    // user_text will retry.
    if let Some(connection) = upstream.as_ref()
        && let Err(e) = connection.send_user_text(text).await
    {
        warn!("failed to forward user text: {e}");
        let _ = out_tx
            .send(OutboundFrame::Json(ServerMessage::Error {
                error: e.to_string(),
            }))
            .await;
    }
}
