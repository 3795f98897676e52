//! Speech boundaries of the loop
//!
//! This module provides:
//! - Speech-to-text sessions with tagged, ordered events
//! - Blocking text-to-speech playback

pub mod synthesis;
pub mod transcription;

// Re-export commonly used types
pub use synthesis::{playback_estimate, ConsoleSpeaker, SynthesisConfig, SynthesisPort};
pub use transcription::{
    ConsoleTranscriber, SessionEvent, SessionEventSink, SessionId, TranscriptionConfig,
    TranscriptionEvent, TranscriptionPort, TranscriptionSession,
};
