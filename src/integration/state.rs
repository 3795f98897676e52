//! Turn-taking state of the orchestrator

/// Where the orchestrator is in the listen / reply cycle
///
/// A transcription session is open exactly when the state is `Listening`
/// or `AwaitingFinal`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No session open; about to listen
    #[default]
    Idle,
    /// Session open, acting on transcript events
    Listening,
    /// Final transcript received; session being closed
    AwaitingFinal,
    /// Consuming the model's reply
    Generating,
    /// Blocked on playback of one chunk
    Speaking,
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    pub fn is_listening(&self) -> bool {
        matches!(self, SessionState::Listening)
    }

    /// Check if a transcription session should be open
    pub fn has_open_session(&self) -> bool {
        matches!(self, SessionState::Listening | SessionState::AwaitingFinal)
    }

    /// Check if an assistant reply is in progress
    pub fn is_replying(&self) -> bool {
        matches!(self, SessionState::Generating | SessionState::Speaking)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Listening => write!(f, "Listening"),
            SessionState::AwaitingFinal => write!(f, "AwaitingFinal"),
            SessionState::Generating => write!(f, "Generating"),
            SessionState::Speaking => write!(f, "Speaking"),
        }
    }
}
