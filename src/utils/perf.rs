//! Turn latency measurement
//!
//! Tracks how long the user waits between finishing an utterance and
//! hearing the first chunk of the reply.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding window of latency samples
#[derive(Debug)]
pub struct LatencyWindow {
    samples: VecDeque<Duration>,
    max_samples: usize,
}

impl LatencyWindow {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
        }
    }

    pub fn record(&mut self, duration: Duration) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(duration);
    }

    pub fn average(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.samples.iter().sum();
        total / self.samples.len() as u32
    }

    pub fn max(&self) -> Duration {
        self.samples.iter().max().copied().unwrap_or(Duration::ZERO)
    }

    /// 95th percentile of the window
    pub fn percentile_95(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let mut sorted: Vec<_> = self.samples.iter().copied().collect();
        sorted.sort();
        let idx = (sorted.len() as f32 * 0.95) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }
}

/// Timing of a single turn, from final transcript to last chunk
#[derive(Debug)]
pub struct TurnTimer {
    start: Instant,
    first_audio: Option<Duration>,
    chunks: usize,
}

impl TurnTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            first_audio: None,
            chunks: 0,
        }
    }

    /// Mark that a chunk is about to be spoken
    ///
    /// Returns the time to first audio when this is the first chunk.
    pub fn chunk_started(&mut self) -> Option<Duration> {
        self.chunks += 1;
        if self.first_audio.is_some() {
            return None;
        }
        let elapsed = self.start.elapsed();
        self.first_audio = Some(elapsed);
        Some(elapsed)
    }

    pub fn first_audio(&self) -> Option<Duration> {
        self.first_audio
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
