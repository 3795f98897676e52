//! Text-to-speech boundary
//!
//! [`SynthesisPort::speak`] blocks until the chunk has finished playing.
//! The orchestrator relies on this to keep at most one chunk of audio in
//! flight and to play chunks strictly in order.

use crate::Result;
use serde::Deserialize;
use std::io::Write;
use std::thread;
use std::time::Duration;

/// Speech synthesis and playback
pub trait SynthesisPort: Send {
    /// Render `text` and return once its playback has completed
    fn speak(&mut self, text: &str) -> Result<()>;
}

/// Configuration for speech output
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Voice model used by the synthesis backend
    pub voice_model: String,

    /// Speaking rate used to estimate playback time
    pub words_per_minute: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            voice_model: "eleven_turbo_v2".to_string(),
            words_per_minute: 180,
        }
    }
}

impl SynthesisConfig {
    /// Set the speaking rate
    pub fn with_words_per_minute(mut self, wpm: u32) -> Self {
        self.words_per_minute = wpm;
        self
    }
}

/// Estimated time needed to say `text` at the configured rate
pub fn playback_estimate(text: &str, words_per_minute: u32) -> Duration {
    if words_per_minute == 0 {
        return Duration::ZERO;
    }
    let words = text.split_whitespace().count() as u64;
    Duration::from_millis(words * 60_000 / words_per_minute as u64)
}

/// Speaker that prints chunks to the console
///
/// Holds the caller for the estimated playback time of each chunk so the
/// loop paces itself like real audio output would.
pub struct ConsoleSpeaker {
    config: SynthesisConfig,
}

impl ConsoleSpeaker {
    pub fn new(config: SynthesisConfig) -> Self {
        Self { config }
    }
}

impl SynthesisPort for ConsoleSpeaker {
    fn speak(&mut self, text: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", text.trim())?;
        stdout.flush()?;
        drop(stdout);

        thread::sleep(playback_estimate(text, self.config.words_per_minute));
        Ok(())
    }
}
