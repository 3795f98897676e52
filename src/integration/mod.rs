//! Integration layer: configuration, turn-taking state and the orchestrator

pub mod config;
pub mod orchestrator;
pub mod state;

pub use config::VoiceLoopConfig;
pub use orchestrator::{
    OrchestratorBuilder, OrchestratorCommand, OrchestratorEvent, OrchestratorHandle,
    TurnOrchestrator,
};
pub use state::SessionState;
