//! Configuration for the integration layer
//!
//! Provides centralized configuration for all components. Every field has
//! a default, so a TOML file only needs the values it changes.

use crate::llm::{ChunkerConfig, GenerationConfig};
use crate::speech::{SynthesisConfig, TranscriptionConfig};
use crate::{Result, VoiceLoopError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration for the complete voice loop
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct VoiceLoopConfig {
    /// Conversation log replayed at start and appended per turn
    pub log_path: PathBuf,

    /// Transcription session settings
    pub transcription: TranscriptionConfig,

    /// Language model settings
    pub generation: GenerationConfig,

    /// Speech output settings
    pub synthesis: SynthesisConfig,

    /// Sentence chunking settings
    pub chunker: ChunkerConfig,

    /// Wait before retrying a failed session open
    pub reopen_backoff_ms: u64,

    /// Capacity of the command and notification channels
    pub channel_buffer_size: usize,
}

impl Default for VoiceLoopConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("conversation_log.txt"),
            transcription: TranscriptionConfig::default(),
            generation: GenerationConfig::default(),
            synthesis: SynthesisConfig::default(),
            chunker: ChunkerConfig::default(),
            reopen_backoff_ms: 1000,
            channel_buffer_size: 100,
        }
    }
}

impl VoiceLoopConfig {
    /// Parse a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| VoiceLoopError::ConfigError(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            VoiceLoopError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Set the conversation log path
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    /// Set the chunker configuration
    pub fn with_chunker(mut self, chunker: ChunkerConfig) -> Self {
        self.chunker = chunker;
        self
    }

    /// Set the generation configuration
    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    /// Set the reopen backoff
    pub fn with_reopen_backoff_ms(mut self, backoff: u64) -> Self {
        self.reopen_backoff_ms = backoff;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.log_path.as_os_str().is_empty() {
            return Err(VoiceLoopError::ConfigError("log_path is required".into()));
        }
        if self.chunker.terminal_markers.is_empty() {
            return Err(VoiceLoopError::ConfigError(
                "at least one terminal marker is required".into(),
            ));
        }
        if self.transcription.sample_rate == 0 {
            return Err(VoiceLoopError::ConfigError(
                "transcription sample_rate must be positive".into(),
            ));
        }
        if self.channel_buffer_size == 0 {
            return Err(VoiceLoopError::ConfigError(
                "channel_buffer_size must be positive".into(),
            ));
        }
        Ok(())
    }
}
