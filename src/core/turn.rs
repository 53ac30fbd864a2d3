//! Turn aggregation.
//!
//! The upstream provider streams one continuous sequence of PCM chunks;
//! the bridge segments it into discrete "turns" (one spoken reply each).
//! A turn starts at its first audio chunk and ends when one of these fires
//! first:
//!
//! - the **silence timer**: no further chunk within 900 ms of the last one
//! - the **hard-limit timer**: 20 s after the first chunk, bounding
//!   worst-case latency and buffering if the provider never goes quiet
//! - an explicit **interruption** event from the provider
//! - the **upstream socket closing**
//!
//! Whichever path wins, finalization runs exactly once per turn: the two
//! timers are owned, cancellable handles, and a per-turn atomic guard is
//! checked-and-set in a single `swap` so concurrent triggers cannot
//! double-finalize. A turn that captured zero audio is finalized silently:
//! no WAV frame and no `turn_end` reach the client.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::core::audio::{
    DEFAULT_BYTES_PER_SAMPLE, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE, encode_wav,
};
use crate::core::outbound::{OutboundFrame, ServerMessage};
use crate::core::stt::{FALLBACK_TRANSCRIPT, SttClient};

/// Inactivity window after the last chunk before a turn completes.
pub const SILENCE_WINDOW: Duration = Duration::from_millis(900);

/// Maximum duration a turn may collect audio regardless of silence.
pub const HARD_LIMIT: Duration = Duration::from_millis(20_000);

/// What triggered a finalize. Logged, never sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeReason {
    Silence,
    HardLimit,
    Interruption,
    UpstreamClosed,
}

/// Mutable per-turn state. Timer handles and the chunk buffer belong
/// exclusively to one turn; finalize or shutdown always takes them down
/// together.
struct TurnState {
    collecting: bool,
    chunks: Vec<Bytes>,
    /// Per-turn finalize guard. Replaced with a fresh flag when a new
    /// turn starts, so a late timer from a finished turn can never touch
    /// the next one.
    guard: Arc<AtomicBool>,
    silence_timer: Option<JoinHandle<()>>,
    hard_timer: Option<JoinHandle<()>>,
}

impl TurnState {
    fn cancel_timers(&mut self) {
        if let Some(timer) = self.silence_timer.take() {
            timer.abort();
        }
        if let Some(timer) = self.hard_timer.take() {
            timer.abort();
        }
    }
}

struct Inner {
    state: Mutex<TurnState>,
    sink: mpsc::Sender<OutboundFrame>,
    stt: SttClient,
}

/// Segments the upstream audio stream into turns and emits each finished
/// turn to the client as a WAV frame followed by `turn_end`, with a
/// detached transcription dispatched afterward.
///
/// Cheap to clone; clones share the same turn state.
#[derive(Clone)]
pub struct TurnAggregator {
    inner: Arc<Inner>,
}

impl TurnAggregator {
    pub fn new(sink: mpsc::Sender<OutboundFrame>, stt: SttClient) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(TurnState {
                    collecting: false,
                    chunks: Vec::new(),
                    // Starts spent: there is no turn to finalize yet.
                    guard: Arc::new(AtomicBool::new(true)),
                    silence_timer: None,
                    hard_timer: None,
                }),
                sink,
                stt,
            }),
        }
    }

    /// Feed one decoded PCM chunk.
    ///
    /// The first chunk of a turn arms the hard-limit timer; every chunk
    /// (including the first) appends to the buffer and re-arms the silence
    /// timer.
    pub async fn on_audio_chunk(&self, chunk: Bytes) {
        let mut state = self.inner.state.lock().await;

        if !state.collecting {
            state.collecting = true;
            state.chunks.clear();
            state.guard = Arc::new(AtomicBool::new(false));

            let agg = self.clone();
            let guard = state.guard.clone();
            state.hard_timer = Some(tokio::spawn(async move {
                tokio::time::sleep(HARD_LIMIT).await;
                // Detach so an abort racing the deadline can only cancel a
                // finalize that has not yet begun.
                tokio::spawn(async move {
                    agg.finalize(guard, FinalizeReason::HardLimit).await;
                });
            }));
        }

        state.chunks.push(chunk);

        if let Some(timer) = state.silence_timer.take() {
            timer.abort();
        }
        let agg = self.clone();
        let guard = state.guard.clone();
        state.silence_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(SILENCE_WINDOW).await;
            tokio::spawn(async move {
                agg.finalize(guard, FinalizeReason::Silence).await;
            });
        }));
    }

    /// The provider cut the agent off; end the current turn immediately.
    pub async fn on_interruption(&self) {
        let guard = self.current_guard().await;
        self.finalize(guard, FinalizeReason::Interruption).await;
    }

    /// The upstream socket went away; end the current turn immediately.
    pub async fn on_upstream_closed(&self) {
        let guard = self.current_guard().await;
        self.finalize(guard, FinalizeReason::UpstreamClosed).await;
    }

    /// Session teardown: cancel timers and release buffers without
    /// emitting anything. Used when the client itself is gone.
    pub async fn shutdown(&self) {
        let mut state = self.inner.state.lock().await;
        state.guard.store(true, Ordering::SeqCst);
        state.cancel_timers();
        state.collecting = false;
        state.chunks.clear();
    }

    async fn current_guard(&self) -> Arc<AtomicBool> {
        self.inner.state.lock().await.guard.clone()
    }

    /// Finalize the turn owning `guard`. At most one caller wins the
    /// atomic swap; the rest are no-ops.
    async fn finalize(&self, guard: Arc<AtomicBool>, reason: FinalizeReason) {
        if guard.swap(true, Ordering::SeqCst) {
            debug!(?reason, "finalize skipped: turn already finalizing");
            return;
        }

        let snapshot = {
            let mut state = self.inner.state.lock().await;
            state.cancel_timers();
            state.collecting = false;
            std::mem::take(&mut state.chunks)
        };

        if snapshot.is_empty() {
            debug!(?reason, "finalize with no captured audio, nothing to emit");
            return;
        }

        info!(?reason, chunks = snapshot.len(), "finalizing turn");

        let wav = Bytes::from(encode_wav(
            &snapshot,
            DEFAULT_SAMPLE_RATE,
            DEFAULT_CHANNELS,
            DEFAULT_BYTES_PER_SAMPLE,
        ));

        // WAV frame strictly before turn_end; both strictly before the
        // transcription result, which is dispatched detached so finalize
        // never blocks on the transcription call.
        let sink = &self.inner.sink;
        if sink.send(OutboundFrame::Wav(wav.clone())).await.is_err() {
            return;
        }
        let _ = sink.send(OutboundFrame::Json(ServerMessage::TurnEnd)).await;

        let stt = self.inner.stt.clone();
        let sink = sink.clone();
        tokio::spawn(async move {
            let text = stt
                .transcribe(wav)
                .await
                .unwrap_or_else(|| FALLBACK_TRANSCRIPT.to_string());
            let _ = sink
                .send(OutboundFrame::Json(ServerMessage::AiText { text }))
                .await;
        });
    }
}
