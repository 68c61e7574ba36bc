//! WebSocket implementation of the live transport

use super::messages::{ClientMessage, RealtimeInput, ServerMessage};
use super::{LiveTransport, TransportEvent, TransportSink};
use crate::session::config::LiveConfig;
use crate::{LiveError, Result};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

/// Lifecycle flags shared by the transport handle and its tasks
#[derive(Debug, Default)]
struct LinkState {
    /// `close()` was called by the owner
    closed_locally: AtomicBool,
    /// `Error` or `Closed` has been delivered
    finished: AtomicBool,
}

impl LinkState {
    fn is_closed_locally(&self) -> bool {
        self.closed_locally.load(Ordering::SeqCst)
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Deliver the terminal event, at most once and never after a local close
    fn finish(&self, events: &TransportSink, event: TransportEvent) {
        if self.is_closed_locally() || self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        events.emit(event);
    }
}

/// Live channel over a websocket.
///
/// A reader task turns server frames into [`TransportEvent`]s; a writer task
/// drains a bounded queue of outbound frames so `send` never waits on the
/// network. Whichever side notices the connection is gone first reports it.
pub struct GeminiLiveTransport {
    session_id: String,
    outbound: Option<mpsc::Sender<Message>>,
    events: TransportSink,
    link: Arc<LinkState>,
    reader: JoinHandle<()>,
    dropped_frames: u64,
}

impl GeminiLiveTransport {
    /// Connect to `url` and send the setup message for `config`
    pub async fn connect(url: &str, config: &LiveConfig, events: TransportSink) -> Result<Self> {
        let request = url.into_client_request().map_err(|e| {
            LiveError::TransportError(format!("Failed to create client request: {}", e))
        })?;

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| LiveError::TransportError(format!("WebSocket connect error: {}", e)))?;

        let (mut sink, source) = stream.split();

        let setup = serde_json::to_string(&ClientMessage::setup(config))
            .map_err(|e| LiveError::TransportError(format!("Serialize error: {}", e)))?;
        sink.send(Message::Text(setup))
            .await
            .map_err(|e| LiveError::TransportError(format!("Send error: {}", e)))?;

        let session_id = uuid::Uuid::new_v4().to_string();
        info!(session_id = %session_id, model = %config.model, voice = %config.voice, "Live setup sent");

        let (outbound_tx, outbound_rx) = mpsc::channel(config.max_pending_frames.max(1));
        let link = Arc::new(LinkState::default());

        tokio::spawn(write_loop(
            sink,
            outbound_rx,
            events.clone(),
            Arc::clone(&link),
        ));
        let reader = tokio::spawn(read_loop(source, events.clone(), Arc::clone(&link)));

        Ok(Self {
            session_id,
            outbound: Some(outbound_tx),
            events,
            link,
            reader,
            dropped_frames: 0,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl LiveTransport for GeminiLiveTransport {
    fn send(&mut self, input: RealtimeInput) {
        if self.link.is_closed_locally() || self.link.is_finished() {
            return;
        }
        let Some(outbound) = self.outbound.as_ref() else {
            return;
        };

        let text = match serde_json::to_string(&ClientMessage::realtime_input(input)) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to serialize realtime input: {}", e);
                return;
            }
        };

        match outbound.try_send(Message::Text(text)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped_frames += 1;
                if self.dropped_frames == 1 || self.dropped_frames % 50 == 0 {
                    warn!(
                        session_id = %self.session_id,
                        "Send queue full, dropped {} frame(s) so far",
                        self.dropped_frames
                    );
                }
            }
            Err(TrySendError::Closed(_)) => {
                // Writer is gone; make sure the session hears about it
                self.link.finish(
                    &self.events,
                    TransportEvent::Error("live connection writer stopped".into()),
                );
            }
        }
    }

    fn close(&mut self) {
        self.link.closed_locally.store(true, Ordering::SeqCst);

        if let Some(outbound) = self.outbound.take() {
            let _ = outbound.try_send(Message::Close(None));
            self.reader.abort();
            info!(session_id = %self.session_id, "Live transport closed");
        }
    }

    fn is_open(&self) -> bool {
        self.outbound.is_some() && !self.link.is_closed_locally() && !self.link.is_finished()
    }

    fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }
}

impl Drop for GeminiLiveTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for GeminiLiveTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiLiveTransport")
            .field("session_id", &self.session_id)
            .field("open", &self.is_open())
            .finish()
    }
}

async fn write_loop<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<Message>,
    events: TransportSink,
    link: Arc<LinkState>,
) where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(message) = outbound.recv().await {
        let is_close = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            debug!("Live writer stopped: {}", e);
            link.finish(&events, TransportEvent::Error(e.to_string()));
            return;
        }
        if is_close {
            return;
        }
    }
    let _ = sink.close().await;
}

async fn read_loop<S>(mut source: S, events: TransportSink, link: Arc<LinkState>)
where
    S: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    let mut opened = false;

    while let Some(frame) = source.next().await {
        if link.is_closed_locally() || link.is_finished() {
            return;
        }

        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Skipping non UTF-8 binary frame: {}", e);
                    continue;
                }
            },
            Ok(Message::Close(frame)) => {
                info!(?frame, "Live endpoint closed the connection");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                link.finish(&events, TransportEvent::Error(e.to_string()));
                return;
            }
        };

        let message: ServerMessage = match serde_json::from_str(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Skipping unparseable server message: {}", e);
                continue;
            }
        };

        if !opened {
            opened = true;
            if !events.emit(TransportEvent::Open) {
                return;
            }
        }
        if message.is_setup_complete() {
            continue;
        }
        if !events.emit(TransportEvent::Message(message)) {
            return;
        }
    }

    link.finish(&events, TransportEvent::Closed);
}
