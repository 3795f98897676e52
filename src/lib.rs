//! Voiceloop - a turn-taking voice conversation loop
//!
//! Listens for a finished utterance, asks a language model for a reply,
//! speaks the reply sentence by sentence while it streams in, and keeps a
//! durable log of every turn.

pub mod error;
pub mod integration;
pub mod llm;
pub mod messages;
pub mod speech;
pub mod utils;

pub use error::{Result, VoiceLoopError};
pub use integration::{
    OrchestratorBuilder, OrchestratorEvent, OrchestratorHandle, SessionState, TurnOrchestrator,
    VoiceLoopConfig,
};
pub use messages::{ConversationHistory, ConversationStore, Speaker, Turn};
