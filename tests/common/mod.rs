//! Scripted ports shared by the integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use voiceloop::llm::{FragmentStream, GenerationPort};
use voiceloop::speech::{
    SessionEventSink, SessionId, SynthesisPort, TranscriptionConfig, TranscriptionPort,
    TranscriptionSession,
};
use voiceloop::{ConversationHistory, Result, VoiceLoopError};

/// Ordered record of every port call, shared by all mocks of one test
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

#[derive(Default)]
pub struct TranscriberState {
    pub sinks: Vec<SessionEventSink>,
    pub closed: Vec<SessionId>,
    pub failing_opens: usize,
}

#[derive(Clone)]
pub struct MockTranscriber {
    pub state: Arc<Mutex<TranscriberState>>,
    log: CallLog,
}

impl MockTranscriber {
    pub fn new(log: CallLog) -> Self {
        Self {
            state: Arc::new(Mutex::new(TranscriberState::default())),
            log,
        }
    }

    /// Make the next `count` opens fail
    pub fn fail_next_opens(&self, count: usize) {
        self.state.lock().failing_opens = count;
    }

    pub fn last_sink(&self) -> SessionEventSink {
        self.state
            .lock()
            .sinks
            .last()
            .cloned()
            .expect("no session was opened")
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().sinks.len()
    }

    pub fn closed(&self) -> Vec<SessionId> {
        self.state.lock().closed.clone()
    }
}

impl TranscriptionPort for MockTranscriber {
    fn open(
        &mut self,
        _config: &TranscriptionConfig,
        sink: SessionEventSink,
    ) -> Result<Box<dyn TranscriptionSession>> {
        let mut state = self.state.lock();
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            self.log.lock().push("open failed".to_string());
            return Err(VoiceLoopError::TransportError("connection refused".into()));
        }

        self.log.lock().push("open".to_string());
        let id = sink.session_id();
        state.sinks.push(sink);
        Ok(Box::new(MockSession {
            id,
            closed: false,
            state: Arc::clone(&self.state),
            log: Arc::clone(&self.log),
        }))
    }
}

struct MockSession {
    id: SessionId,
    closed: bool,
    state: Arc<Mutex<TranscriberState>>,
    log: CallLog,
}

impl TranscriptionSession for MockSession {
    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.state.lock().closed.push(self.id);
            self.log.lock().push("close".to_string());
        }
        Ok(())
    }
}

/// One scripted reply: fragments, or a failure to start
pub enum Reply {
    Fragments(Vec<Result<String>>),
    FailToStart,
}

impl Reply {
    pub fn ok(fragments: &[&str]) -> Self {
        Reply::Fragments(fragments.iter().map(|f| Ok(f.to_string())).collect())
    }
}

type GenerateHook = Box<dyn FnMut(&ConversationHistory) + Send>;

pub struct MockGenerator {
    replies: Vec<Reply>,
    pub seen: Arc<Mutex<Vec<Vec<(String, String)>>>>,
    hook: Option<GenerateHook>,
    log: CallLog,
}

impl MockGenerator {
    pub fn new(log: CallLog, replies: Vec<Reply>) -> Self {
        Self {
            replies,
            seen: Arc::new(Mutex::new(Vec::new())),
            hook: None,
            log,
        }
    }

    /// Run `hook` inside every `generate` call
    pub fn with_hook(mut self, hook: impl FnMut(&ConversationHistory) + Send + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }
}

impl GenerationPort for MockGenerator {
    fn generate(&mut self, history: &ConversationHistory) -> Result<FragmentStream> {
        self.log.lock().push("generate".to_string());
        self.seen.lock().push(
            history
                .iter()
                .map(|t| (t.role.to_string(), t.content.clone()))
                .collect(),
        );
        if let Some(hook) = self.hook.as_mut() {
            hook(history);
        }

        if self.replies.is_empty() {
            return Err(VoiceLoopError::GenerationError("script exhausted".into()));
        }
        match self.replies.remove(0) {
            Reply::Fragments(fragments) => Ok(Box::pin(futures::stream::iter(fragments))),
            Reply::FailToStart => Err(VoiceLoopError::GenerationError("model not loaded".into())),
        }
    }
}

pub struct MockSpeaker {
    pub spoken: Arc<Mutex<Vec<String>>>,
    fail_on_call: Option<usize>,
    calls: usize,
    log: CallLog,
}

impl MockSpeaker {
    pub fn new(log: CallLog) -> Self {
        Self {
            spoken: Arc::new(Mutex::new(Vec::new())),
            fail_on_call: None,
            calls: 0,
            log,
        }
    }

    /// Fail the n-th (0-based) call to `speak`
    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }
}

impl SynthesisPort for MockSpeaker {
    fn speak(&mut self, text: &str) -> Result<()> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_on_call == Some(call) {
            self.log.lock().push(format!("speak failed: {}", text));
            return Err(VoiceLoopError::SynthesisError("audio device lost".into()));
        }
        self.log.lock().push(format!("speak: {}", text));
        self.spoken.lock().push(text.to_string());
        Ok(())
    }
}
