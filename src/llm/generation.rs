//! Language model boundary
//!
//! The orchestrator hands the full conversation history to a
//! [`GenerationPort`] and consumes the reply as a stream of text fragments.

use crate::messages::{ConversationHistory, Speaker};
use crate::{Result, VoiceLoopError};
use async_stream::stream;
use futures::stream::BoxStream;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Lazily produced reply fragments
///
/// The stream is finite, consumed once and cannot be restarted. An `Err`
/// item means the model failed mid-reply.
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// Token-streaming language model
pub trait GenerationPort: Send {
    /// Start a reply to the given history
    fn generate(&mut self, history: &ConversationHistory) -> Result<FragmentStream>;
}

/// Configuration for the language model
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Model identifier passed to the backend
    pub model_id: String,

    /// Instructions placed before the history (never persisted)
    pub system_prompt: Option<String>,

    /// Pause before each fragment of the console echo model
    pub fragment_delay_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_id: "llama2-uncensored".to_string(),
            system_prompt: None,
            fragment_delay_ms: 40,
        }
    }
}

impl GenerationConfig {
    /// Create a new configuration with the specified model
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Default::default()
        }
    }

    /// Set the system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the fragment delay
    pub fn with_fragment_delay_ms(mut self, delay: u64) -> Self {
        self.fragment_delay_ms = delay;
        self
    }
}

/// A chat message in the role/content shape chat backends expect
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// Build the message list sent to a chat backend
pub fn build_messages(
    system_prompt: Option<&str>,
    history: &ConversationHistory,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if let Some(prompt) = system_prompt.filter(|p| !p.trim().is_empty()) {
        messages.push(ChatMessage {
            role: "system",
            content: prompt.to_string(),
        });
    }
    messages.extend(history.iter().map(|turn| ChatMessage {
        role: turn.role.as_str(),
        content: turn.content.clone(),
    }));
    messages
}

/// Offline model that answers by echoing the last user turn
///
/// Fragments are emitted word by word with a leading space, the way
/// chat backends stream tokens.
pub struct EchoGenerator {
    config: GenerationConfig,
}

impl EchoGenerator {
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }
}

impl GenerationPort for EchoGenerator {
    fn generate(&mut self, history: &ConversationHistory) -> Result<FragmentStream> {
        let messages = build_messages(self.config.system_prompt.as_deref(), history);
        let last_user = history
            .last_from(Speaker::User)
            .ok_or_else(|| VoiceLoopError::GenerationError("no user turn to answer".into()))?;

        let said = last_user.content.trim_end_matches(['.', '?', '!']);
        let reply = format!(
            "You said: {}. I have {} messages in context.",
            said,
            messages.len()
        );
        debug!("{} replying with {} chars", self.config.model_id, reply.len());

        let fragments = split_fragments(&reply);
        let delay = Duration::from_millis(self.config.fragment_delay_ms);

        Ok(Box::pin(stream! {
            for fragment in fragments {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                yield Ok::<_, VoiceLoopError>(fragment);
            }
        }))
    }
}

fn split_fragments(text: &str) -> Vec<String> {
    text.split(' ')
        .enumerate()
        .map(|(i, word)| {
            if i == 0 {
                word.to_string()
            } else {
                format!(" {}", word)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Turn;
    use futures::StreamExt;

    fn history_of(turns: Vec<Turn>) -> ConversationHistory {
        let mut history = ConversationHistory::new();
        for turn in turns {
            history.push(turn);
        }
        history
    }

    #[test]
    fn test_build_messages_with_system_prompt() {
        let history = history_of(vec![Turn::user("Hi"), Turn::assistant("Hello.")]);
        let messages = build_messages(Some("Be brief."), &history);

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[2].content, "Hello.");
    }

    #[test]
    fn test_blank_system_prompt_ignored() {
        let history = history_of(vec![Turn::user("Hi")]);
        assert_eq!(build_messages(Some("  "), &history).len(), 1);
        assert_eq!(build_messages(None, &history).len(), 1);
    }

    #[test]
    fn test_split_fragments_reassembles() {
        let fragments = split_fragments("It is ten o'clock.");
        assert_eq!(fragments, vec!["It", " is", " ten", " o'clock."]);
        assert_eq!(fragments.concat(), "It is ten o'clock.");
    }

    #[test]
    fn test_echo_generator_streams_reply() {
        let history = history_of(vec![Turn::user("What time is it?")]);
        let mut generator = EchoGenerator::new(
            GenerationConfig::default()
                .with_system_prompt("You are terse.")
                .with_fragment_delay_ms(0),
        );

        let stream = generator.generate(&history).unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let fragments: Vec<String> = runtime
            .block_on(stream.collect::<Vec<_>>())
            .into_iter()
            .map(|f| f.unwrap())
            .collect();

        assert_eq!(
            fragments.concat(),
            "You said: What time is it. I have 2 messages in context."
        );
    }

    #[test]
    fn test_echo_generator_needs_user_turn() {
        let mut generator = EchoGenerator::new(GenerationConfig::default());
        let result = generator.generate(&ConversationHistory::new());
        assert!(matches!(result, Err(VoiceLoopError::GenerationError(_))));
    }
}
