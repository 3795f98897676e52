//! Turn orchestrator for the voice conversation loop
//!
//! Sequences listening and speaking: Transcription -> LLM -> Chunker ->
//! Synthesis -> Transcription. The transcription session is always closed
//! before the model is asked for a reply, so nothing said while the
//! assistant talks can be taken as user input.

use crate::integration::config::VoiceLoopConfig;
use crate::integration::state::SessionState;
use crate::llm::{FragmentStream, GenerationPort, SentenceChunker};
use crate::messages::{ConversationHistory, ConversationStore, Turn};
use crate::speech::{
    SessionEvent, SessionEventSink, SessionId, SynthesisPort, TranscriptionEvent,
    TranscriptionPort, TranscriptionSession,
};
use crate::utils::{LatencyWindow, TurnTimer};
use crate::{Result, VoiceLoopError};
use crossbeam_channel::{
    bounded, select, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError,
};
use futures::StreamExt;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Commands that can be sent to a running orchestrator
#[derive(Debug, Clone)]
pub enum OrchestratorCommand {
    /// Stop after the current turn and close the session
    Shutdown,
}

/// Notifications emitted by the orchestrator
///
/// Delivery is best-effort: when nobody drains the queue, new
/// notifications are dropped rather than stalling the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    /// The turn-taking state changed
    StateChanged(SessionState),

    /// Interim transcript text
    Partial(String),

    /// A user turn was persisted
    UserTurn(String),

    /// A chunk is about to be spoken
    Chunk(String),

    /// The assistant reply was persisted
    AssistantTurn(String),

    /// The current turn was abandoned
    TurnAborted(String),

    /// The run loop has stopped
    Shutdown,
}

/// Handle for controlling a running orchestrator
#[derive(Clone)]
pub struct OrchestratorHandle {
    command_tx: Sender<OrchestratorCommand>,
    event_rx: Receiver<OrchestratorEvent>,
    state: Arc<RwLock<SessionState>>,
}

impl OrchestratorHandle {
    /// Send a command to the orchestrator
    pub fn send_command(&self, cmd: OrchestratorCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .map_err(|e| VoiceLoopError::ChannelError(format!("Failed to send command: {}", e)))
    }

    /// Request shutdown
    pub fn shutdown(&self) -> Result<()> {
        self.send_command(OrchestratorCommand::Shutdown)
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<OrchestratorEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive an event, waiting at most `timeout`
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<OrchestratorEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Get the event receiver
    pub fn event_receiver(&self) -> Receiver<OrchestratorEvent> {
        self.event_rx.clone()
    }

    /// Current turn-taking state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }
}

/// The single owner of all conversation state
///
/// Holds the store, the chunk buffer, the session state and the three
/// ports. Nothing here is global; a second orchestrator would be a second,
/// independent conversation.
pub struct TurnOrchestrator {
    config: VoiceLoopConfig,
    store: ConversationStore,
    chunker: SentenceChunker,
    state: Arc<RwLock<SessionState>>,

    transcription: Box<dyn TranscriptionPort>,
    generation: Box<dyn GenerationPort>,
    synthesis: Box<dyn SynthesisPort>,

    session: Option<(SessionId, Box<dyn TranscriptionSession>)>,

    transcript_tx: Sender<SessionEvent>,
    transcript_rx: Receiver<SessionEvent>,
    command_rx: Receiver<OrchestratorCommand>,
    event_tx: Sender<OrchestratorEvent>,

    runtime: Runtime,
    first_audio: LatencyWindow,
}

impl TurnOrchestrator {
    /// Create an orchestrator over an opened store and the three ports
    ///
    /// The orchestrator starts `Idle`; call [`run`](Self::run) or
    /// [`start_listening`](Self::start_listening) to open the first session.
    pub fn new(
        config: VoiceLoopConfig,
        store: ConversationStore,
        transcription: Box<dyn TranscriptionPort>,
        generation: Box<dyn GenerationPort>,
        synthesis: Box<dyn SynthesisPort>,
    ) -> Result<(Self, OrchestratorHandle)> {
        config.validate()?;

        let (command_tx, command_rx) = bounded(config.channel_buffer_size);
        let (event_tx, event_rx) = bounded(config.channel_buffer_size);
        // Unbounded so a session that is being closed never blocks on send.
        let (transcript_tx, transcript_rx) = unbounded();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let state = Arc::new(RwLock::new(SessionState::Idle));

        let handle = OrchestratorHandle {
            command_tx,
            event_rx,
            state: Arc::clone(&state),
        };

        let orchestrator = Self {
            chunker: SentenceChunker::new(config.chunker.clone()),
            config,
            store,
            state,
            transcription,
            generation,
            synthesis,
            session: None,
            transcript_tx,
            transcript_rx,
            command_rx,
            event_tx,
            runtime,
            first_audio: LatencyWindow::new(32),
        };

        Ok((orchestrator, handle))
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn history(&self) -> &ConversationHistory {
        self.store.history()
    }

    /// Id of the open transcription session, if any
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|(id, _)| *id)
    }

    /// Time-to-first-audio statistics over recent turns
    pub fn first_audio_latency(&self) -> &LatencyWindow {
        &self.first_audio
    }

    /// Run until a shutdown command arrives or every handle is dropped
    ///
    /// Turn failures are logged and never end the loop. A session that
    /// cannot be opened is retried after `reopen_backoff_ms`.
    pub fn run(mut self) -> Result<()> {
        info!(
            "Turn orchestrator starting with {} turns of history",
            self.store.len()
        );

        let command_rx = self.command_rx.clone();
        let transcript_rx = self.transcript_rx.clone();
        let backoff = Duration::from_millis(self.config.reopen_backoff_ms);

        loop {
            if self.state().is_idle() {
                if let Err(e) = self.start_listening() {
                    error!("Failed to open transcription session: {}", e);
                    match command_rx.recv_timeout(backoff) {
                        Ok(OrchestratorCommand::Shutdown) => {
                            info!("Shutdown requested");
                            break;
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            warn!("Command channel disconnected");
                            break;
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                    }
                }
            }

            select! {
                recv(command_rx) -> cmd => match cmd {
                    Ok(OrchestratorCommand::Shutdown) => {
                        info!("Shutdown requested");
                        break;
                    }
                    Err(_) => {
                        warn!("Command channel disconnected");
                        break;
                    }
                },
                recv(transcript_rx) -> event => match event {
                    Ok(event) => {
                        if let Err(e) = self.handle_event(event) {
                            warn!("{}", e);
                        }
                    }
                    Err(_) => {
                        error!("Transcript channel disconnected");
                        break;
                    }
                },
            }
        }

        self.close_session();
        self.set_state(SessionState::Idle);
        self.notify(OrchestratorEvent::Shutdown);
        info!("Turn orchestrator stopped");
        Ok(())
    }

    /// Open a new transcription session (`Idle -> Listening`)
    ///
    /// Does nothing when a session is already open. On failure the
    /// orchestrator stays `Idle` and the error is returned for retry.
    pub fn start_listening(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        let session_id = Uuid::new_v4();
        let sink = SessionEventSink::new(session_id, self.transcript_tx.clone());

        match self.transcription.open(&self.config.transcription, sink) {
            Ok(session) => {
                self.session = Some((session_id, session));
                self.set_state(SessionState::Listening);
                debug!("Listening on session {}", session_id);
                Ok(())
            }
            Err(e) => {
                self.set_state(SessionState::Idle);
                Err(match e {
                    VoiceLoopError::TransportError(_) => e,
                    other => VoiceLoopError::TransportError(other.to_string()),
                })
            }
        }
    }

    /// Handle every transcript event already queued, without blocking
    ///
    /// Returns the number of events taken off the queue.
    pub fn process_pending(&mut self) -> Result<usize> {
        let mut handled = 0;
        while let Ok(event) = self.transcript_rx.try_recv() {
            handled += 1;
            self.handle_event(event)?;
        }
        Ok(handled)
    }

    /// Act on one transcript event
    ///
    /// Events from any session other than the open one, or arriving while
    /// not listening, are ignored.
    pub fn handle_event(&mut self, event: SessionEvent) -> Result<()> {
        if self.session_id() != Some(event.session_id) || !self.state().is_listening() {
            debug!(
                "Ignoring {:?} from inactive session {}",
                event.event, event.session_id
            );
            return Ok(());
        }

        match event.event {
            TranscriptionEvent::Opened => {
                debug!("Session {} opened", event.session_id);
                Ok(())
            }
            TranscriptionEvent::Partial(text) => {
                trace!("Partial transcript: {}", text);
                self.notify(OrchestratorEvent::Partial(text));
                Ok(())
            }
            TranscriptionEvent::Error(info) => {
                warn!("Transcription error on session {}: {}", event.session_id, info);
                Ok(())
            }
            TranscriptionEvent::Closed => {
                self.close_session();
                self.set_state(SessionState::Idle);
                Err(VoiceLoopError::TransportError(format!(
                    "session {} closed by the backend",
                    event.session_id
                )))
            }
            TranscriptionEvent::Final(text) => self.on_final_transcript(&text),
        }
    }

    fn on_final_transcript(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            debug!("Ignoring empty final transcript");
            return Ok(());
        }

        self.set_state(SessionState::AwaitingFinal);
        self.close_session();
        self.set_state(SessionState::Generating);

        let mut timer = TurnTimer::start();
        if let Err(e) = self.respond(text, &mut timer) {
            warn!("Turn aborted after {}ms: {}", timer.elapsed_ms(), e);
            self.notify(OrchestratorEvent::TurnAborted(e.user_message()));
        } else {
            info!(
                "Turn complete: {} chunks in {}ms (first audio {:?})",
                timer.chunks(),
                timer.elapsed_ms(),
                timer.first_audio()
            );
        }

        self.set_state(SessionState::Idle);
        self.start_listening()
    }

    /// Persist the user turn, stream and speak the reply, persist the reply
    ///
    /// On failure only the chunks already spoken are kept as the assistant
    /// turn; buffered text that was never voiced is dropped.
    fn respond(&mut self, user_text: &str, timer: &mut TurnTimer) -> Result<()> {
        self.store.append(Turn::user(user_text))?;
        info!("User: {}", user_text);
        self.notify(OrchestratorEvent::UserTurn(user_text.to_string()));

        let mut stream = self
            .generation
            .generate(self.store.history())
            .map_err(into_generation_error)?;

        let mut reply = String::new();
        let streamed = self.stream_reply(&mut stream, &mut reply, timer);
        drop(stream);

        match streamed {
            Ok(()) => {
                self.store.append(Turn::assistant(reply.clone()))?;
                self.notify(OrchestratorEvent::AssistantTurn(reply));
                Ok(())
            }
            Err(e) => {
                self.chunker.reset();
                if !reply.is_empty() {
                    match self.store.append(Turn::assistant(reply.clone())) {
                        Ok(()) => self.notify(OrchestratorEvent::AssistantTurn(reply)),
                        Err(persist) => error!("Failed to persist partial reply: {}", persist),
                    }
                }
                Err(e)
            }
        }
    }

    fn stream_reply(
        &mut self,
        stream: &mut FragmentStream,
        reply: &mut String,
        timer: &mut TurnTimer,
    ) -> Result<()> {
        loop {
            match self.runtime.block_on(stream.next()) {
                Some(Ok(fragment)) => {
                    if let Some(chunk) = self.chunker.feed(&fragment) {
                        self.speak_chunk(&chunk, timer)?;
                        reply.push_str(&chunk);
                    }
                }
                Some(Err(e)) => return Err(into_generation_error(e)),
                None => break,
            }
        }

        if let Some(rest) = self.chunker.flush() {
            self.speak_chunk(&rest, timer)?;
            reply.push_str(&rest);
        }
        Ok(())
    }

    // Blank chunks stay in the reply text but are not voiced.
    fn speak_chunk(&mut self, chunk: &str, timer: &mut TurnTimer) -> Result<()> {
        if chunk.trim().is_empty() {
            return Ok(());
        }

        self.set_state(SessionState::Speaking);
        if let Some(latency) = timer.chunk_started() {
            self.first_audio.record(latency);
            debug!(
                "Time to first audio: {}ms (avg {}ms)",
                latency.as_millis(),
                self.first_audio.average().as_millis()
            );
        }
        self.notify(OrchestratorEvent::Chunk(chunk.to_string()));

        let spoken = self.synthesis.speak(chunk).map_err(|e| match e {
            VoiceLoopError::SynthesisError(_) => e,
            other => VoiceLoopError::SynthesisError(other.to_string()),
        });

        self.set_state(SessionState::Generating);
        spoken
    }

    fn close_session(&mut self) {
        if let Some((session_id, mut session)) = self.session.take() {
            if let Err(e) = session.close() {
                warn!("Failed to close session {}: {}", session_id, e);
            }
            debug!("Closed session {}", session_id);
        }
    }

    fn set_state(&mut self, next: SessionState) {
        let previous = std::mem::replace(&mut *self.state.write(), next);
        if previous != next {
            debug!("State {} -> {}", previous, next);
            self.notify(OrchestratorEvent::StateChanged(next));
        }
    }

    fn notify(&self, event: OrchestratorEvent) {
        if let Err(TrySendError::Full(event)) = self.event_tx.try_send(event) {
            trace!("Event queue full, dropping {:?}", event);
        }
    }
}

fn into_generation_error(e: VoiceLoopError) -> VoiceLoopError {
    match e {
        VoiceLoopError::GenerationError(_) => e,
        other => VoiceLoopError::GenerationError(other.to_string()),
    }
}

/// Builder for creating an orchestrator
pub struct OrchestratorBuilder {
    config: VoiceLoopConfig,
    transcription: Option<Box<dyn TranscriptionPort>>,
    generation: Option<Box<dyn GenerationPort>>,
    synthesis: Option<Box<dyn SynthesisPort>>,
}

impl OrchestratorBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: VoiceLoopConfig::default(),
            transcription: None,
            generation: None,
            synthesis: None,
        }
    }

    /// Set the complete configuration
    pub fn with_config(mut self, config: VoiceLoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the speech-to-text backend
    pub fn with_transcription(mut self, port: impl TranscriptionPort + 'static) -> Self {
        self.transcription = Some(Box::new(port));
        self
    }

    /// Set the language model
    pub fn with_generation(mut self, port: impl GenerationPort + 'static) -> Self {
        self.generation = Some(Box::new(port));
        self
    }

    /// Set the speech output
    pub fn with_synthesis(mut self, port: impl SynthesisPort + 'static) -> Self {
        self.synthesis = Some(Box::new(port));
        self
    }

    /// Open the conversation log and build the orchestrator
    pub fn build(self) -> Result<(TurnOrchestrator, OrchestratorHandle)> {
        let transcription = self
            .transcription
            .ok_or_else(|| VoiceLoopError::ConfigError("transcription port is required".into()))?;
        let generation = self
            .generation
            .ok_or_else(|| VoiceLoopError::ConfigError("generation port is required".into()))?;
        let synthesis = self
            .synthesis
            .ok_or_else(|| VoiceLoopError::ConfigError("synthesis port is required".into()))?;

        self.config.validate()?;
        let store = ConversationStore::open(&self.config.log_path)?;

        TurnOrchestrator::new(self.config, store, transcription, generation, synthesis)
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
