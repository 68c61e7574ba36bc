//! Realtime channel to the generative backend
//!
//! A [`LiveConnector`] opens a [`LiveTransport`]; everything the remote side
//! does afterwards arrives as [`TransportEvent`]s pushed through the
//! [`TransportSink`] handed to `connect`.

pub mod client;
pub mod gemini;
pub mod messages;

pub use crate::session::events::TransportSink;
pub use client::GenAiClient;
pub use gemini::GeminiLiveTransport;
pub use messages::{MediaChunk, RealtimeInput, ServerMessage};

use crate::session::config::LiveConfig;
use crate::Result;
use async_trait::async_trait;

/// Inbound side of a live transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Handshake finished. Delivered once, before any message.
    Open,
    /// A server message, in delivery order
    Message(ServerMessage),
    /// Transport failure; the session is over
    Error(String),
    /// Remote side closed the channel
    Closed,
}

/// Outbound side of an open live channel.
///
/// After `close`, or after the transport reported `Error`/`Closed`, `send`
/// silently does nothing.
pub trait LiveTransport: Send {
    fn send(&mut self, input: RealtimeInput);

    /// Close the channel. Idempotent, never fails.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Outbound frames discarded because the send queue was full
    fn dropped_frames(&self) -> u64 {
        0
    }
}

/// Opens live channels for a session configuration
#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn connect(
        &self,
        config: &LiveConfig,
        events: TransportSink,
    ) -> Result<Box<dyn LiveTransport>>;
}
