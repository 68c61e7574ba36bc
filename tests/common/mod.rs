//! Scripted devices and transport for driving a session without hardware
//! or network.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use studio_live::audio::frames::AudioFrame;
use studio_live::audio::pcm::{encode_base64, encode_pcm16};
use studio_live::audio::{CaptureFormat, Microphone, OutputDevice};
use studio_live::playback::{PlaybackChunk, PlaybackId};
use studio_live::session::events::{FrameSink, PlaybackSink, TransportSink};
use studio_live::transport::{
    LiveConnector, LiveTransport, RealtimeInput, ServerMessage, TransportEvent,
};
use studio_live::{LiveAudioSession, LiveConfig, LiveError, Result, SessionHandle};

pub const OUTPUT_RATE: u32 = 24000;

// ---------------------------------------------------------------------------
// Transport

#[derive(Default)]
struct TransportState {
    sink: Option<TransportSink>,
    connects: usize,
    closes: usize,
    closed: bool,
    fail_with: Option<LiveError>,
    sent: Vec<RealtimeInput>,
}

/// Connector whose transport records every send; tests play the server side
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<TransportState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every connect fails with `err`
    pub fn failing(err: LiveError) -> Self {
        let connector = Self::default();
        connector.state.lock().fail_with = Some(err);
        connector
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }

    pub fn sent(&self) -> Vec<RealtimeInput> {
        self.state.lock().sent.clone()
    }

    /// Epoch stamped on events of the most recent connection
    pub fn epoch(&self) -> Option<u64> {
        self.state.lock().sink.as_ref().map(|s| s.epoch())
    }

    /// Sink of the most recent connection, kept by tests to replay stale events
    pub fn sink(&self) -> Option<TransportSink> {
        self.state.lock().sink.clone()
    }

    pub fn emit(&self, event: TransportEvent) -> bool {
        let sink = self.state.lock().sink.clone();
        sink.map(|s| s.emit(event)).unwrap_or(false)
    }

    pub fn open(&self) {
        self.emit(TransportEvent::Open);
    }

    pub fn message(&self, message: ServerMessage) {
        self.emit(TransportEvent::Message(message));
    }
}

struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl LiveTransport for MockTransport {
    fn send(&mut self, input: RealtimeInput) {
        let mut state = self.state.lock();
        if !state.closed {
            state.sent.push(input);
        }
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        if !state.closed {
            state.closed = true;
            state.closes += 1;
        }
    }

    fn is_open(&self) -> bool {
        !self.state.lock().closed
    }
}

#[async_trait]
impl LiveConnector for MockConnector {
    async fn connect(
        &self,
        _config: &LiveConfig,
        events: TransportSink,
    ) -> Result<Box<dyn LiveTransport>> {
        let mut state = self.state.lock();
        state.connects += 1;
        if let Some(err) = state.fail_with.clone() {
            return Err(err);
        }
        state.sink = Some(events);
        state.closed = false;
        Ok(Box::new(MockTransport {
            state: Arc::clone(&self.state),
        }))
    }
}

// ---------------------------------------------------------------------------
// Microphone

#[derive(Default)]
struct MicState {
    deny: bool,
    held: bool,
    acquires: usize,
    releases: usize,
    format: Option<CaptureFormat>,
    sink: Option<FrameSink>,
}

#[derive(Clone, Default)]
pub struct MockMicrophone {
    state: Arc<Mutex<MicState>>,
}

impl MockMicrophone {
    pub fn new() -> Self {
        Self::default()
    }

    /// A microphone whose permission prompt is always declined
    pub fn denied() -> Self {
        let mic = Self::default();
        mic.state.lock().deny = true;
        mic
    }

    pub fn is_held(&self) -> bool {
        self.state.lock().held
    }

    pub fn acquires(&self) -> usize {
        self.state.lock().acquires
    }

    pub fn releases(&self) -> usize {
        self.state.lock().releases
    }

    pub fn format(&self) -> Option<CaptureFormat> {
        self.state.lock().format
    }

    pub fn is_streaming(&self) -> bool {
        self.state.lock().sink.is_some()
    }

    /// Sink of the latest start, kept by tests to replay late frames
    pub fn sink(&self) -> Option<FrameSink> {
        self.state.lock().sink.clone()
    }

    /// Deliver one frame as the capture thread would
    pub fn push_frame(&self, samples: Vec<f32>) -> bool {
        let sink = self.state.lock().sink.clone();
        sink.map(|s| s.push(AudioFrame::new(samples, 16000)))
            .unwrap_or(false)
    }
}

#[async_trait]
impl Microphone for MockMicrophone {
    async fn acquire(&mut self, format: CaptureFormat) -> Result<()> {
        let mut state = self.state.lock();
        state.acquires += 1;
        if state.deny {
            return Err(LiveError::PermissionDenied("declined by user".into()));
        }
        state.held = true;
        state.format = Some(format);
        Ok(())
    }

    fn start(&mut self, sink: FrameSink) -> Result<()> {
        let mut state = self.state.lock();
        if !state.held {
            return Err(LiveError::DeviceUnavailable("not acquired".into()));
        }
        state.sink = Some(sink);
        Ok(())
    }

    fn release(&mut self) {
        let mut state = self.state.lock();
        if state.held {
            state.releases += 1;
        }
        state.held = false;
        state.sink = None;
    }

    fn is_held(&self) -> bool {
        self.state.lock().held
    }
}

// ---------------------------------------------------------------------------
// Output

#[derive(Default)]
struct OutputState {
    now: f64,
    open: bool,
    opens: usize,
    closes: usize,
    scheduled: Vec<PlaybackChunk>,
    stopped: Vec<PlaybackId>,
    sink: Option<PlaybackSink>,
}

/// Output device with a hand-driven clock
#[derive(Clone, Default)]
pub struct ManualOutput {
    state: Arc<Mutex<OutputState>>,
}

impl ManualOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_time(&self, seconds: f64) {
        self.state.lock().now = seconds;
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn opens(&self) -> usize {
        self.state.lock().opens
    }

    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }

    pub fn scheduled(&self) -> Vec<PlaybackChunk> {
        self.state.lock().scheduled.clone()
    }

    pub fn start_times(&self) -> Vec<f64> {
        self.state.lock().scheduled.iter().map(|c| c.start_at).collect()
    }

    pub fn stopped(&self) -> Vec<PlaybackId> {
        self.state.lock().stopped.clone()
    }

    /// Report a unit as finished, as the audio callback would
    pub fn finish(&self, id: PlaybackId) {
        let sink = self.state.lock().sink.clone();
        if let Some(sink) = sink {
            sink.ended(id);
        }
    }
}

#[async_trait]
impl OutputDevice for ManualOutput {
    async fn open(&mut self, sink: PlaybackSink) -> Result<()> {
        let mut state = self.state.lock();
        state.open = true;
        state.opens += 1;
        state.sink = Some(sink);
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.state.lock().now
    }

    fn schedule(&mut self, chunk: PlaybackChunk) -> Result<()> {
        self.state.lock().scheduled.push(chunk);
        Ok(())
    }

    fn stop(&mut self, id: PlaybackId) {
        self.state.lock().stopped.push(id);
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        if state.open {
            state.closes += 1;
        }
        state.open = false;
        state.sink = None;
    }
}

// ---------------------------------------------------------------------------
// Fixtures

pub struct Harness {
    pub session: LiveAudioSession,
    pub handle: SessionHandle,
    pub connector: MockConnector,
    pub mic: MockMicrophone,
    pub output: ManualOutput,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_parts(LiveConfig::default(), MockConnector::new(), MockMicrophone::new())
    }

    pub fn with_parts(config: LiveConfig, connector: MockConnector, mic: MockMicrophone) -> Self {
        let output = ManualOutput::new();
        let (session, handle) = LiveAudioSession::new(
            config,
            Arc::new(connector.clone()),
            Box::new(mic.clone()),
            Box::new(output.clone()),
        );

        Self {
            session,
            handle,
            connector,
            mic,
            output,
        }
    }

    /// Start and let the transport open
    pub async fn start_live(&mut self) {
        self.session.start().await.unwrap();
        self.connector.open();
        self.session.process_pending();
    }

    /// Deliver a server message and let the session react
    pub fn server(&mut self, message: ServerMessage) {
        self.connector.message(message);
        self.session.process_pending();
    }
}

/// Base64 PCM16 of `seconds` of silence at the model output rate
pub fn pcm_payload(seconds: f64) -> String {
    let samples = vec![0.0f32; (seconds * OUTPUT_RATE as f64).round() as usize];
    encode_base64(&encode_pcm16(&samples))
}

fn server_message(value: serde_json::Value) -> ServerMessage {
    serde_json::from_value(value).unwrap()
}

pub fn audio_message(data: &str) -> ServerMessage {
    server_message(json!({
        "serverContent": {
            "modelTurn": {
                "parts": [{ "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": data } }]
            }
        }
    }))
}

pub fn input_transcription(text: &str) -> ServerMessage {
    server_message(json!({ "serverContent": { "inputTranscription": { "text": text } } }))
}

pub fn output_transcription(text: &str) -> ServerMessage {
    server_message(json!({ "serverContent": { "outputTranscription": { "text": text } } }))
}

pub fn turn_complete() -> ServerMessage {
    server_message(json!({ "serverContent": { "turnComplete": true } }))
}

pub fn interrupted() -> ServerMessage {
    server_message(json!({ "serverContent": { "interrupted": true } }))
}
