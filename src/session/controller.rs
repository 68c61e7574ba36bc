//! Live session controller
//!
//! Owns the microphone, the transport and the playback scheduler of one
//! conversation and drives them from a single inbox:
//! microphone -> encode -> transport, transport -> {scheduler, transcript}.

use crate::audio::device::{Microphone, OutputDevice};
use crate::audio::frames::AudioFrame;
use crate::audio::pcm::decode_base64;
use crate::playback::PlaybackScheduler;
use crate::session::config::LiveConfig;
use crate::session::events::{
    Epoch, FrameSink, PlaybackSink, SessionCommand, SessionEvent, SessionUpdate, TransportSink,
};
use crate::session::state::{SessionState, SessionStatus, SharedStatus};
use crate::transcript::{TranscriptAssembler, TranscriptStore};
use crate::transport::{LiveConnector, LiveTransport, RealtimeInput, ServerMessage, TransportEvent};
use crate::{LiveError, Result};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

/// Handle for controlling a session from the UI
pub struct SessionHandle {
    command_tx: UnboundedSender<SessionCommand>,
    update_rx: UnboundedReceiver<SessionUpdate>,
    status: SharedStatus,
    transcript: TranscriptStore,
}

impl SessionHandle {
    /// Send a command to the session loop
    pub fn send_command(&self, cmd: SessionCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .map_err(|e| LiveError::ChannelError(format!("Failed to send command: {}", e)))
    }

    /// Try to receive an update without waiting
    pub fn try_recv_update(&mut self) -> Option<SessionUpdate> {
        self.update_rx.try_recv().ok()
    }

    /// Wait for the next update; `None` once the session is dropped
    pub async fn recv_update(&mut self) -> Option<SessionUpdate> {
        self.update_rx.recv().await
    }

    pub fn status(&self) -> SessionStatus {
        self.status.snapshot()
    }

    /// Finalized turns of the current (or last) conversation
    pub fn transcript(&self) -> &TranscriptStore {
        &self.transcript
    }
}

enum Step {
    Command(Option<SessionCommand>),
    Event(SessionEvent),
}

pub struct LiveAudioSession {
    config: LiveConfig,
    connector: Arc<dyn LiveConnector>,
    microphone: Box<dyn Microphone>,
    scheduler: PlaybackScheduler,
    transcript: TranscriptAssembler,
    transport: Option<Box<dyn LiveTransport>>,
    state: SessionState,
    epoch: Epoch,
    inbox_tx: UnboundedSender<SessionEvent>,
    inbox_rx: UnboundedReceiver<SessionEvent>,
    command_rx: UnboundedReceiver<SessionCommand>,
    update_tx: UnboundedSender<SessionUpdate>,
    status: SharedStatus,
}

impl LiveAudioSession {
    /// Create an idle session and the handle used to control it
    pub fn new(
        config: LiveConfig,
        connector: Arc<dyn LiveConnector>,
        microphone: Box<dyn Microphone>,
        output: Box<dyn OutputDevice>,
    ) -> (Self, SessionHandle) {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        let status = SharedStatus::new();
        let store = TranscriptStore::new();
        let scheduler = PlaybackScheduler::new(output, config.output_sample_rate);

        let handle = SessionHandle {
            command_tx,
            update_rx,
            status: status.clone(),
            transcript: store.clone(),
        };

        let session = Self {
            config,
            connector,
            microphone,
            scheduler,
            transcript: TranscriptAssembler::new(store),
            transport: None,
            state: SessionState::Idle,
            epoch: 0,
            inbox_tx,
            inbox_rx,
            command_rx,
            update_tx,
            status,
        };

        (session, handle)
    }

    /// Start a conversation.
    ///
    /// Acquires the microphone, then the output device, then opens the
    /// transport. The session stays `Starting` until the transport reports
    /// `Open`. Any failure releases whatever was acquired and returns to
    /// `Idle`. Calling this while not idle does nothing.
    pub async fn start(&mut self) -> Result<()> {
        if self.state.is_active() {
            debug!("Start ignored, session is {}", self.state);
            return Ok(());
        }

        if let Err(e) = self.config.validate() {
            self.report_error(&e);
            return Err(e);
        }

        self.epoch += 1;
        self.transcript.clear();
        self.status.update(|s| {
            s.is_loading = true;
            s.error = None;
            s.frames_sent = 0;
            s.chunks_played = 0;
        });
        self.set_state(SessionState::Starting);
        info!(epoch = self.epoch, model = %self.config.model, "Starting live session");

        if let Err(e) = self.acquire_resources().await {
            warn!("Live session failed to start: {}", e);
            self.teardown();
            self.report_error(&e);
            return Err(e);
        }

        Ok(())
    }

    async fn acquire_resources(&mut self) -> Result<()> {
        self.microphone
            .acquire(self.config.capture_format())
            .await?;
        self.scheduler
            .open(PlaybackSink::new(self.inbox_tx.clone()))
            .await?;

        let sink = TransportSink::new(self.epoch, self.inbox_tx.clone());
        let transport = self.connector.connect(&self.config, sink).await?;
        self.transport = Some(transport);
        Ok(())
    }

    /// Stop the conversation. Idempotent.
    pub fn stop(&mut self) {
        self.teardown();
    }

    /// React to one inbox event
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Transport { epoch, event } => {
                if epoch != self.epoch || self.state.is_idle() {
                    debug!(epoch, "Dropping transport event from a finished session");
                    return;
                }
                self.handle_transport(event);
            }
            SessionEvent::Capture { epoch, frame } => {
                if epoch != self.epoch || !self.state.is_live() {
                    return;
                }
                self.send_frame(frame);
            }
            SessionEvent::PlaybackEnded(id) => self.scheduler.on_ended(id),
        }
    }

    /// Handle every event already waiting in the inbox, in order
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.inbox_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Run the session loop until `Shutdown` or until the handle is dropped
    pub async fn run(mut self) {
        info!("Live session loop started");

        loop {
            let step = tokio::select! {
                command = self.command_rx.recv() => Step::Command(command),
                Some(event) = self.inbox_rx.recv() => Step::Event(event),
            };

            match step {
                Step::Command(Some(SessionCommand::Start)) => {
                    // Failures are already reported through the update channel
                    let _ = self.start().await;
                }
                Step::Command(Some(SessionCommand::Stop)) => self.stop(),
                Step::Command(Some(SessionCommand::Shutdown)) | Step::Command(None) => break,
                Step::Event(event) => self.handle_event(event),
            }
        }

        self.stop();
        self.publish(SessionUpdate::Shutdown);
        info!("Live session loop stopped");
    }

    fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Open => {
                if !self.state.is_starting() {
                    warn!("Ignoring duplicate open in state {}", self.state);
                    return;
                }
                let sink = FrameSink::new(self.epoch, self.inbox_tx.clone());
                if let Err(e) = self.microphone.start(sink) {
                    self.fail(e);
                    return;
                }
                self.status.update(|s| s.is_loading = false);
                self.set_state(SessionState::Live);
                info!(epoch = self.epoch, "Live session open");
            }
            TransportEvent::Message(message) => self.handle_server_message(message),
            TransportEvent::Error(reason) => {
                error!("Live session error: {}", reason);
                self.fail(LiveError::TransportError(reason));
            }
            TransportEvent::Closed => {
                info!("Live session closed by remote");
                self.teardown();
            }
        }
    }

    fn handle_server_message(&mut self, message: ServerMessage) {
        if let Some(text) = message.output_text() {
            self.transcript.append_model(text);
        }
        if let Some(text) = message.input_text() {
            self.transcript.append_user(text);
        }

        if message.turn_complete() {
            if let Some(turn) = self.transcript.complete_turn() {
                debug!(user = %turn.user, model = %turn.model, "Turn complete");
                self.publish(SessionUpdate::TurnCompleted(turn));
            }
        }

        if let Some(data) = message.audio_data() {
            match decode_base64(data).and_then(|raw| self.scheduler.enqueue(&raw)) {
                Ok(_) => self.status.update(|s| s.chunks_played += 1),
                Err(e) => warn!("Skipping model audio chunk: {}", e),
            }
        }

        if message.interrupted() {
            self.scheduler.interrupt();
            self.publish(SessionUpdate::Interrupted);
        }
    }

    fn send_frame(&mut self, frame: AudioFrame) {
        if let Some(transport) = self.transport.as_mut() {
            transport.send(RealtimeInput::media(frame.to_media_chunk()));
            self.status.update(|s| s.frames_sent += 1);
        }
    }

    /// Live-phase failure: release everything, then tell the user
    fn fail(&mut self, err: LiveError) {
        self.teardown();
        self.report_error(&err);
    }

    fn teardown(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            let dropped = transport.dropped_frames();
            if dropped > 0 {
                warn!("{} outbound frame(s) were dropped during the session", dropped);
            }
            transport.close();
        }
        self.microphone.release();
        self.scheduler.reset();
        self.transcript.clear_partials();
        self.status.update(|s| s.is_loading = false);

        if self.state.is_active() {
            self.set_state(SessionState::Idle);
            info!(epoch = self.epoch, "Live session stopped");
        }
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state;
        self.status.update(|s| s.state = state);
        self.publish(SessionUpdate::StateChanged(state));
    }

    fn report_error(&mut self, err: &LiveError) {
        let message = err.user_message();
        self.status.update(|s| s.error = Some(message.clone()));
        self.publish(SessionUpdate::Error(message));
    }

    fn publish(&self, update: SessionUpdate) {
        let _ = self.update_tx.send(update);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> SessionStatus {
        self.status.snapshot()
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    pub fn transcript(&self) -> &TranscriptAssembler {
        &self.transcript
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    pub fn microphone_held(&self) -> bool {
        self.microphone.is_held()
    }
}

impl Drop for LiveAudioSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
