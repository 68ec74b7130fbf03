//! Per-subscriber push loop.
//!
//! Each subscriber runs its own loop: read the latest sample, push it, sleep
//! one cadence, repeat. Nothing is pushed before the first sample exists.
//! The loop ends, for that subscriber only, when a push fails or exceeds the
//! push timeout. Over a WebSocket the read half is watched at the same time,
//! so a Close frame from the peer also ends it.

use crate::feed::SampleReader;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, Stream, StreamExt};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// The peer went away or the transport failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

/// Somewhere to push serialized sample frames.
pub trait SampleSink: Send {
    /// Delivers one frame.
    fn push(&mut self, frame: String) -> impl Future<Output = Result<(), SinkClosed>> + Send;
}

/// Why a subscriber loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberExit {
    /// The sink reported the peer gone.
    Disconnected,
    /// A push did not complete within the timeout.
    TimedOut,
}

/// Timing of a subscriber loop.
#[derive(Debug, Clone, Copy)]
pub struct StreamSettings {
    /// Pause between pushes.
    pub cadence: Duration,
    /// Longest a single push may take.
    pub push_timeout: Duration,
}

/// Runs one subscriber until it disconnects or stalls.
pub async fn run_subscriber<S: SampleSink>(
    reader: SampleReader,
    sink: &mut S,
    settings: StreamSettings,
) -> SubscriberExit {
    loop {
        if let Some(sample) = reader.latest() {
            let frame = match serde_json::to_string(&*sample) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "skipping unencodable sample");
                    tokio::time::sleep(settings.cadence).await;
                    continue;
                }
            };

            match tokio::time::timeout(settings.push_timeout, sink.push(frame)).await {
                Ok(Ok(())) => {}
                Ok(Err(SinkClosed)) => return SubscriberExit::Disconnected,
                Err(_) => return SubscriberExit::TimedOut,
            }
        }
        tokio::time::sleep(settings.cadence).await;
    }
}

impl SampleSink for SplitSink<WebSocket, Message> {
    fn push(&mut self, frame: String) -> impl Future<Output = Result<(), SinkClosed>> + Send {
        async move { self.send(Message::Text(frame)).await.map_err(|_| SinkClosed) }
    }
}

/// Resolves once the peer sends Close, the stream ends or a read fails.
/// Any other incoming message is ignored.
async fn peer_closed<R, E>(receiver: &mut R)
where
    R: Stream<Item = Result<Message, E>> + Unpin,
{
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Close(_)) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

/// Streams samples over an accepted WebSocket until either side hangs up,
/// then closes it.
pub async fn serve_websocket(socket: WebSocket, reader: SampleReader, settings: StreamSettings) {
    let (mut sender, mut receiver) = socket.split();

    let exit = tokio::select! {
        exit = run_subscriber(reader, &mut sender, settings) => exit,
        () = peer_closed(&mut receiver) => SubscriberExit::Disconnected,
    };
    debug!(?exit, "sample subscriber finished");
    if exit == SubscriberExit::TimedOut {
        warn!("closing stalled sample subscriber");
    }
    let _ = sender.close().await;
}
