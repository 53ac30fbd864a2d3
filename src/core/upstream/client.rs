//! Upstream provider connection.
//!
//! Connecting is a two-step dance: a REST call exchanges the long-lived
//! API key for a short-lived signed WebSocket URL, then the WebSocket is
//! opened against that URL. Once connected, a spawned reader task owns the
//! socket exclusively and translates every inbound provider frame into a
//! normalized [`UpstreamEvent`] on an mpsc channel; the bridge session
//! consumes that channel and never touches the socket itself.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::config::{API_KEY_HEADER, UpstreamConfig};
use super::messages::{ProviderFrame, UpstreamClientFrame, UpstreamEvent, normalize_frame};

/// Capacity of the normalized-event channel and the outbound frame channel.
const CHANNEL_CAPACITY: usize = 256;

/// Errors from the upstream adapter.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Signed-URL fetch or WebSocket handshake failed. Recoverable: the
    /// session reports it to the client and retries lazily.
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    /// The connection is absent or already closed.
    #[error("Not connected to upstream")]
    NotConnected,
}

/// Response body of the signed-URL endpoint.
#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    signed_url: Option<String>,
}

/// Commands for the reader task, which is the only owner of the socket.
enum OutboundCommand {
    /// Serialize and send one frame to the provider.
    Frame(UpstreamClientFrame),
    /// Send a WebSocket Close frame and end the task.
    Close,
}

/// Handle to one live upstream connection.
///
/// Dropping the handle does not tear the socket down; the bridge session
/// calls [`UpstreamConnection::close`] explicitly when the client goes
/// away. If the provider closes first, the reader task emits
/// [`UpstreamEvent::Closed`] and marks the handle not-open.
pub struct UpstreamConnection {
    outbound: mpsc::Sender<OutboundCommand>,
    open: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl UpstreamConnection {
    /// Fetch a signed URL and open the provider WebSocket.
    ///
    /// On success the returned receiver yields normalized events until the
    /// socket closes; the final event is always [`UpstreamEvent::Closed`].
    pub async fn connect(
        config: &UpstreamConfig,
        http: &reqwest::Client,
    ) -> Result<(Self, mpsc::Receiver<UpstreamEvent>), UpstreamError> {
        let signed_url = fetch_signed_url(config, http).await?;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(&signed_url)
            .await
            .map_err(|e| UpstreamError::Unavailable(format!("WebSocket handshake failed: {e}")))?;

        info!(agent_id = %config.agent_id, "connected to upstream voice provider");

        let (mut ws_sink, mut ws_source) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundCommand>(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<UpstreamEvent>(CHANNEL_CAPACITY);

        let open = Arc::new(AtomicBool::new(true));
        let task_open = open.clone();

        let reader = tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(command) = outbound_rx.recv() => {
                        match command {
                            OutboundCommand::Frame(frame) => {
                                let json = match serde_json::to_string(&frame) {
                                    Ok(json) => json,
                                    Err(e) => {
                                        warn!("failed to serialize upstream frame: {e}");
                                        continue;
                                    }
                                };
                                if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                                    warn!("failed to send upstream frame: {e}");
                                    break;
                                }
                            }
                            OutboundCommand::Close => {
                                // Polite teardown: tell the provider before
                                // dropping the socket.
                                let _ = ws_sink.send(Message::Close(None)).await;
                                break;
                            }
                        }
                    }

                    msg = ws_source.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                // Keepalives are answered here and never surfaced.
                                if let Ok(ProviderFrame::Ping { ping_event }) =
                                    serde_json::from_str::<ProviderFrame>(&text)
                                {
                                    let pong = UpstreamClientFrame::Pong {
                                        event_id: ping_event.and_then(|p| p.event_id),
                                    };
                                    if let Ok(json) = serde_json::to_string(&pong)
                                        && let Err(e) = ws_sink.send(Message::Text(json.into())).await
                                    {
                                        warn!("failed to answer provider ping: {e}");
                                        break;
                                    }
                                    continue;
                                }

                                if let Some(event) = normalize_frame(&text)
                                    && event_tx.send(event).await.is_err()
                                {
                                    // Session dropped the receiver; nothing left to do.
                                    break;
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    warn!("failed to send pong: {e}");
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) => {
                                info!("upstream closed the connection");
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("upstream WebSocket error: {e}");
                                break;
                            }
                            None => break,
                            _ => {}
                        }
                    }
                }
            }

            task_open.store(false, Ordering::SeqCst);
            let _ = event_tx.send(UpstreamEvent::Closed).await;
            debug!("upstream reader task ended");
        });

        Ok((
            Self {
                outbound: outbound_tx,
                open,
                reader,
            },
            event_rx,
        ))
    }

    /// Whether the socket is still believed open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Relay the browser user's text into the conversation.
    pub async fn send_user_text(&self, text: &str) -> Result<(), UpstreamError> {
        if !self.is_open() {
            return Err(UpstreamError::NotConnected);
        }
        self.outbound
            .send(OutboundCommand::Frame(UpstreamClientFrame::UserMessage {
                text: text.to_string(),
            }))
            .await
            .map_err(|_| UpstreamError::NotConnected)
    }

    /// Tear the connection down, sending a Close frame first. Idempotent.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            // The reader sends the Close frame and exits on its own; abort
            // only if the command cannot be delivered.
            if self.outbound.try_send(OutboundCommand::Close).is_err() {
                self.reader.abort();
            }
            info!("upstream connection closed");
        }
    }
}

/// Exchange the API key for a short-lived signed WebSocket URL.
async fn fetch_signed_url(
    config: &UpstreamConfig,
    http: &reqwest::Client,
) -> Result<String, UpstreamError> {
    let response = http
        .get(config.signed_url_endpoint())
        .header(API_KEY_HEADER, &config.api_key)
        .send()
        .await
        .map_err(|e| UpstreamError::Unavailable(format!("signed-URL request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(UpstreamError::Unavailable(format!(
            "signed-URL request returned {status}"
        )));
    }

    let body: SignedUrlResponse = response
        .json()
        .await
        .map_err(|e| UpstreamError::Unavailable(format!("signed-URL response unreadable: {e}")))?;

    body.signed_url
        .ok_or_else(|| UpstreamError::Unavailable("signed-URL response missing signed_url".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> UpstreamConfig {
        let mut config = UpstreamConfig::new("agent_1", "secret-key");
        config.base_url = base_url.to_string();
        config
    }

    #[tokio::test]
    async fn test_fetch_signed_url_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/convai/conversation/get_signed_url"))
            .and(query_param("agent_id", "agent_1"))
            .and(header("xi-api-key", "secret-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"signed_url": "wss://example/ws"})),
            )
            .mount(&server)
            .await;

        let url = fetch_signed_url(&test_config(&server.uri()), &reqwest::Client::new())
            .await
            .unwrap();
        assert_eq!(url, "wss://example/ws");
    }

    #[tokio::test]
    async fn test_fetch_signed_url_missing_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = fetch_signed_url(&test_config(&server.uri()), &reqwest::Client::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_fetch_signed_url_non_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = fetch_signed_url(&test_config(&server.uri()), &reqwest::Client::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_close_sends_close_frame_to_provider() {
        use std::time::Duration;
        use tokio::net::TcpListener;
        use tokio::sync::oneshot;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let provider_addr = listener.local_addr().unwrap();
        let (closed_tx, closed_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let mut closed_tx = Some(closed_tx);
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Close(_) = msg {
                    if let Some(tx) = closed_tx.take() {
                        let _ = tx.send(());
                    }
                    break;
                }
            }
        });

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"signed_url": format!("ws://{provider_addr}/conversation")}),
            ))
            .mount(&server)
            .await;

        let (connection, _events) =
            UpstreamConnection::connect(&test_config(&server.uri()), &reqwest::Client::new())
                .await
                .unwrap();

        connection.close();
        assert!(!connection.is_open());

        // The provider must observe a Close frame, not an abrupt drop.
        tokio::time::timeout(Duration::from_secs(3), closed_rx)
            .await
            .expect("provider never saw a close frame")
            .expect("provider task ended early");
    }

    #[tokio::test]
    async fn test_connect_fails_when_handshake_fails() {
        // Signed URL points at a port nothing listens on.
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"signed_url": "ws://127.0.0.1:1/conversation"}),
            ))
            .mount(&server)
            .await;

        let result =
            UpstreamConnection::connect(&test_config(&server.uri()), &reqwest::Client::new())
                .await;
        assert!(matches!(result, Err(UpstreamError::Unavailable(_))));
    }
}
