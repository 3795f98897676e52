//! Error types for the voice loop
//!
//! Every failure is local to the current turn; none of these variants
//! stops the conversation loop on its own.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum VoiceLoopError {
    /// Opening or maintaining a transcription session failed
    #[error("Transport error: {0}")]
    TransportError(String),

    /// A persisted log line did not match `<timestamp> - <role>: <content>`
    #[error("Malformed log record at line {line}: {reason}")]
    MalformedLogRecord { line: usize, reason: String },

    /// The language model stream failed to start or ended abnormally
    #[error("Generation error: {0}")]
    GenerationError(String),

    /// A chunk could not be rendered to audio
    #[error("Synthesis error: {0}")]
    SynthesisError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl From<std::io::Error> for VoiceLoopError {
    fn from(e: std::io::Error) -> Self {
        VoiceLoopError::IOError(e.to_string())
    }
}

impl VoiceLoopError {
    /// Check if the loop can carry on with the next turn after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Retried by the run loop after a backoff
            VoiceLoopError::TransportError(_) => true,
            // Skipped during replay
            VoiceLoopError::MalformedLogRecord { .. } => true,
            // Abort the current turn only
            VoiceLoopError::GenerationError(_) => true,
            VoiceLoopError::SynthesisError(_) => true,
            // Disk trouble needs an operator
            VoiceLoopError::IOError(_) => false,
            VoiceLoopError::ConfigError(_) => false,
            VoiceLoopError::ChannelError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            VoiceLoopError::TransportError(_) => {
                "Lost the connection to speech recognition. Retrying.".to_string()
            }
            VoiceLoopError::MalformedLogRecord { .. } => {
                "Skipped an unreadable line in the conversation log.".to_string()
            }
            VoiceLoopError::GenerationError(_) => {
                "AI response generation failed. Please try again.".to_string()
            }
            VoiceLoopError::SynthesisError(_) => {
                "Speech playback failed. Please try again.".to_string()
            }
            VoiceLoopError::IOError(_) => "File system error occurred.".to_string(),
            VoiceLoopError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            VoiceLoopError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, VoiceLoopError>;
