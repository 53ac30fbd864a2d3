//! Connection gatekeeper.
//!
//! The bridge listens on a raw TCP socket and serves exactly one path. The
//! request line is peeked (not consumed) before any handshake work: a
//! request for any other path gets the socket destroyed with no response
//! written, so strays and scanners cannot accumulate half-open upgrades.
//! A matching request proceeds through the WebSocket handshake and spawns
//! one bridge session.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::handlers::bridge::handle_bridge_session;
use crate::state::AppState;

/// The only path this listener serves.
pub const BRIDGE_PATH: &str = "/api/agent-ws";

/// How long a fresh connection may take to produce its request line.
const REQUEST_LINE_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between peeks while waiting for the rest of a request line.
const PEEK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Bind the listener and accept bridge connections until the process ends.
pub async fn run(state: Arc<AppState>) -> anyhow::Result<()> {
    let address = state.config.address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    info!(%address, path = BRIDGE_PATH, "voice-agent bridge listening");
    serve(listener, state).await
}

/// Accept bridge connections on an already-bound listener.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await.context("accept failed")?;
        let state = state.clone();
        tokio::spawn(async move {
            handle_connection(stream, peer, state).await;
        });
    }
}

/// Gate one inbound connection.
async fn handle_connection(stream: TcpStream, peer: SocketAddr, state: Arc<AppState>) {
    let mut buf = [0u8; 1024];
    let peeked = match tokio::time::timeout(
        REQUEST_LINE_TIMEOUT,
        peek_request_line(&stream, &mut buf),
    )
    .await
    {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            debug!(%peer, "failed to peek request line: {e}");
            return;
        }
        Err(_) => {
            debug!(%peer, "connection produced no request line in time");
            return;
        }
    };

    match request_path(&buf[..peeked]) {
        Some(path) if path == BRIDGE_PATH => {}
        other => {
            // Dropping the stream destroys the socket with zero bytes
            // written. No HTTP error response on purpose.
            debug!(%peer, path = ?other, "destroying connection to unknown path");
            return;
        }
    }

    let socket = match tokio_tungstenite::accept_async(stream).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!(%peer, "WebSocket handshake failed: {e}");
            return;
        }
    };

    debug!(%peer, "bridge upgrade accepted");
    handle_bridge_session(socket, state).await;
}

/// Peek until the buffer holds a complete request line.
///
/// A slow client or an intermediary may deliver the line across several
/// TCP segments; keep peeking (without consuming) until a line terminator
/// arrives, the buffer fills, or the peer goes away. The caller bounds the
/// wait with `REQUEST_LINE_TIMEOUT`.
async fn peek_request_line(stream: &TcpStream, buf: &mut [u8; 1024]) -> std::io::Result<usize> {
    loop {
        let n = stream.peek(buf).await?;
        if n == buf.len() || buf[..n].contains(&b'\r') || buf[..n].contains(&b'\n') {
            return Ok(n);
        }
        if n == 0 {
            // EOF before a full request line.
            return Ok(0);
        }
        tokio::time::sleep(PEEK_RETRY_INTERVAL).await;
    }
}

/// Extract the request-target from an HTTP request line, ignoring any
/// query string. Returns `None` when the bytes do not look like one.
fn request_path(buf: &[u8]) -> Option<&str> {
    let line_end = buf.iter().position(|&b| b == b'\r' || b == b'\n')?;
    let line = std::str::from_utf8(&buf[..line_end]).ok()?;

    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    if method != "GET" {
        return None;
    }

    Some(target.split('?').next().unwrap_or(target))
}
