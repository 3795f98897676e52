//! Speech-to-text boundary
//!
//! A transcription session reports its results through a
//! [`SessionEventSink`]. Every event carries the id of the session that
//! produced it and travels over a FIFO channel with a single consumer, so
//! events of one session arrive in order and never concurrently.

use crate::{Result, VoiceLoopError};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use serde::Deserialize;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};
use uuid::Uuid;

/// Identifies one transcription session
pub type SessionId = Uuid;

/// Configuration handed to the transcription backend on every open
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Microphone sample rate
    pub sample_rate: u32,

    /// Silence that ends an utterance, in milliseconds
    pub end_utterance_silence_threshold_ms: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            end_utterance_silence_threshold_ms: 3000,
        }
    }
}

/// What a session can report
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TranscriptionEvent {
    /// The backend accepted the session
    Opened,
    /// Interim text; may still change
    Partial(String),
    /// Stable text of a finished utterance
    Final(String),
    /// Transport-level problem; the session stays open
    Error(String),
    /// The backend closed the session
    Closed,
}

/// A transcription event tagged with its session
#[derive(Clone, Debug)]
pub struct SessionEvent {
    pub session_id: SessionId,
    pub event: TranscriptionEvent,
}

/// Write end of the event channel for one session
#[derive(Clone, Debug)]
pub struct SessionEventSink {
    session_id: SessionId,
    tx: Sender<SessionEvent>,
}

impl SessionEventSink {
    pub fn new(session_id: SessionId, tx: Sender<SessionEvent>) -> Self {
        Self { session_id, tx }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Deliver an event to the orchestrator
    pub fn emit(&self, event: TranscriptionEvent) -> Result<()> {
        self.tx
            .send(SessionEvent {
                session_id: self.session_id,
                event,
            })
            .map_err(|e| VoiceLoopError::ChannelError(format!("Failed to send event: {}", e)))
    }

    pub fn partial(&self, text: impl Into<String>) -> Result<()> {
        self.emit(TranscriptionEvent::Partial(text.into()))
    }

    pub fn final_transcript(&self, text: impl Into<String>) -> Result<()> {
        self.emit(TranscriptionEvent::Final(text.into()))
    }

    pub fn error(&self, info: impl Into<String>) -> Result<()> {
        self.emit(TranscriptionEvent::Error(info.into()))
    }
}

/// An open transcription session
pub trait TranscriptionSession: Send {
    /// Stop listening. Calling this more than once is harmless.
    fn close(&mut self) -> Result<()>;
}

/// Speech-to-text backend
pub trait TranscriptionPort: Send {
    /// Open a new session that reports through `sink`
    fn open(
        &mut self,
        config: &TranscriptionConfig,
        sink: SessionEventSink,
    ) -> Result<Box<dyn TranscriptionSession>>;
}

/// Transcriber fed by lines of console input
///
/// Each line is one final transcript. Lines typed while no session is
/// open are discarded when the next session opens, the same way a closed
/// microphone hears nothing.
pub struct ConsoleTranscriber {
    lines_rx: Receiver<String>,
}

impl ConsoleTranscriber {
    pub fn new(lines_rx: Receiver<String>) -> Self {
        Self { lines_rx }
    }
}

impl TranscriptionPort for ConsoleTranscriber {
    fn open(
        &mut self,
        config: &TranscriptionConfig,
        sink: SessionEventSink,
    ) -> Result<Box<dyn TranscriptionSession>> {
        let discarded = self.lines_rx.try_iter().count();
        if discarded > 0 {
            debug!("Discarded {} lines typed while not listening", discarded);
        }

        debug!(
            "Opening console session {} ({} Hz, {} ms silence)",
            sink.session_id(),
            config.sample_rate,
            config.end_utterance_silence_threshold_ms
        );

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let lines_rx = self.lines_rx.clone();
        let forward_sink = sink.clone();

        let worker = thread::spawn(move || {
            if forward_sink.emit(TranscriptionEvent::Opened).is_err() {
                return;
            }
            loop {
                select! {
                    recv(lines_rx) -> line => match line {
                        Ok(line) => {
                            if forward_sink.final_transcript(line).is_err() {
                                break;
                            }
                        }
                        Err(_) => {
                            let _ = forward_sink.error("console input closed");
                            break;
                        }
                    },
                    recv(stop_rx) -> _ => break,
                }
            }
        });

        Ok(Box::new(ConsoleSession {
            sink,
            stop_tx: Some(stop_tx),
            worker: Some(worker),
        }))
    }
}

struct ConsoleSession {
    sink: SessionEventSink,
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl TranscriptionSession for ConsoleSession {
    fn close(&mut self) -> Result<()> {
        let Some(stop_tx) = self.stop_tx.take() else {
            return Ok(());
        };
        drop(stop_tx);

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Console session worker panicked");
            }
        }

        // The orchestrator may already be gone during shutdown.
        let _ = self.sink.emit(TranscriptionEvent::Closed);
        Ok(())
    }
}

impl Drop for ConsoleSession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    fn next_event(rx: &Receiver<SessionEvent>) -> TranscriptionEvent {
        rx.recv_timeout(Duration::from_secs(2)).unwrap().event
    }

    #[test]
    fn test_sink_tags_events() {
        let (tx, rx) = unbounded();
        let id = Uuid::new_v4();
        let sink = SessionEventSink::new(id, tx);

        sink.partial("hel").unwrap();
        sink.final_transcript("hello").unwrap();

        let first = rx.recv().unwrap();
        assert_eq!(first.session_id, id);
        assert_eq!(first.event, TranscriptionEvent::Partial("hel".into()));
        assert_eq!(
            rx.recv().unwrap().event,
            TranscriptionEvent::Final("hello".into())
        );
    }

    #[test]
    fn test_sink_reports_disconnect() {
        let (tx, rx) = unbounded();
        drop(rx);
        let sink = SessionEventSink::new(Uuid::new_v4(), tx);
        assert!(matches!(
            sink.final_transcript("lost"),
            Err(VoiceLoopError::ChannelError(_))
        ));
    }

    #[test]
    fn test_console_session_lifecycle() {
        let (lines_tx, lines_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let mut transcriber = ConsoleTranscriber::new(lines_rx);

        lines_tx.send("typed ahead".to_string()).unwrap();
        let sink = SessionEventSink::new(Uuid::new_v4(), event_tx);
        let mut session = transcriber
            .open(&TranscriptionConfig::default(), sink)
            .unwrap();

        assert_eq!(next_event(&event_rx), TranscriptionEvent::Opened);
        lines_tx.send("hello there".to_string()).unwrap();
        assert_eq!(
            next_event(&event_rx),
            TranscriptionEvent::Final("hello there".into())
        );

        session.close().unwrap();
        session.close().unwrap();
        assert_eq!(next_event(&event_rx), TranscriptionEvent::Closed);
        assert!(event_rx.try_recv().is_err());
    }
}
