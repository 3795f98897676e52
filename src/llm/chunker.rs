//! Sentence chunker for streaming LLM output into speech synthesis
//!
//! Fragments are accumulated until the buffer ends with a sentence-terminal
//! marker, at which point the whole buffer is released as one speakable
//! chunk. Detection is a suffix check, so each fragment costs O(1) beyond
//! the append.

use serde::Deserialize;

/// Configuration for sentence chunking
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Characters that end a speakable chunk when they close the buffer
    pub terminal_markers: Vec<char>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            terminal_markers: vec!['.'],
        }
    }
}

impl ChunkerConfig {
    /// Set the terminal markers
    pub fn with_markers(mut self, markers: impl IntoIterator<Item = char>) -> Self {
        self.terminal_markers = markers.into_iter().collect();
        self
    }
}

/// Incremental buffer that turns a token stream into sentence chunks
///
/// The chunker knows nothing about earlier chunks; its only state is the
/// text received since the last emission.
#[derive(Clone, Debug)]
pub struct SentenceChunker {
    config: ChunkerConfig,
    buffer: String,
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

impl SentenceChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self {
            config,
            buffer: String::new(),
        }
    }

    /// Append a fragment and release the buffer if it now ends a sentence
    ///
    /// Several markers inside one fragment do not split it: everything
    /// accumulated since the last chunk is released as one unit.
    pub fn feed(&mut self, fragment: &str) -> Option<String> {
        if fragment.is_empty() {
            return None;
        }

        self.buffer.push_str(fragment);

        if self.ends_with_marker() {
            Some(std::mem::take(&mut self.buffer))
        } else {
            None
        }
    }

    /// Release whatever is left at end of stream, marker or not
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.buffer))
    }

    /// Drop buffered text without emitting it
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Text received since the last chunk
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn ends_with_marker(&self) -> bool {
        self.buffer
            .chars()
            .next_back()
            .is_some_and(|last| self.config.terminal_markers.contains(&last))
    }
}

/// Chunk a complete response (non-streaming)
pub fn chunk_text<'a>(
    fragments: impl IntoIterator<Item = &'a str>,
    config: ChunkerConfig,
) -> Vec<String> {
    let mut chunker = SentenceChunker::new(config);
    let mut chunks: Vec<String> = fragments
        .into_iter()
        .filter_map(|fragment| chunker.feed(fragment))
        .collect();

    if let Some(rest) = chunker.flush() {
        chunks.push(rest);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_sentence_in_one_fragment() {
        let mut chunker = SentenceChunker::default();
        assert_eq!(chunker.feed("Hello there."), Some("Hello there.".to_string()));
        assert!(chunker.is_empty());
    }

    #[test]
    fn test_sentence_across_fragments() {
        let mut chunker = SentenceChunker::default();
        assert_eq!(chunker.feed("Hel"), None);
        assert_eq!(chunker.buffered(), "Hel");
        assert_eq!(chunker.feed("lo."), Some("Hello.".to_string()));
        assert!(chunker.is_empty());
    }

    #[test]
    fn test_empty_fragment_is_noop() {
        let mut chunker = SentenceChunker::default();
        chunker.feed("Wait");
        assert_eq!(chunker.feed(""), None);
        assert_eq!(chunker.buffered(), "Wait");
    }

    #[test]
    fn test_inner_markers_do_not_split() {
        let mut chunker = SentenceChunker::default();
        assert_eq!(
            chunker.feed("One. Two. Three."),
            Some("One. Two. Three.".to_string())
        );
        assert_eq!(chunker.feed("Four. Fi"), None);
        assert_eq!(chunker.feed("ve."), Some("Four. Five.".to_string()));
    }

    #[test]
    fn test_trailing_space_holds_chunk() {
        let mut chunker = SentenceChunker::default();
        assert_eq!(chunker.feed("Done. "), None);
        assert_eq!(chunker.flush(), Some("Done. ".to_string()));
    }

    #[test]
    fn test_flush() {
        let mut chunker = SentenceChunker::default();
        assert_eq!(chunker.flush(), None);
        chunker.feed("no terminal marker");
        assert_eq!(chunker.flush(), Some("no terminal marker".to_string()));
        assert_eq!(chunker.flush(), None);
    }

    #[test]
    fn test_custom_markers() {
        let config = ChunkerConfig::default().with_markers(['.', '?', '!']);
        let chunks = chunk_text(["Really", "?", " Yes", "!", " ok"], config);
        assert_eq!(chunks, vec!["Really?", " Yes!", " ok"]);
    }

    #[test]
    fn test_multibyte_suffix() {
        let config = ChunkerConfig::default().with_markers(['。']);
        let mut chunker = SentenceChunker::new(config);
        assert_eq!(chunker.feed("こんにちは"), None);
        assert_eq!(chunker.feed("。"), Some("こんにちは。".to_string()));
    }

    #[test]
    fn test_chunks_reassemble_input() {
        let fragments = [
            "It", " is", "", " ten", " o'clock.", " The", " sun", " is up.", "..", " bye",
        ];
        let chunks = chunk_text(fragments, ChunkerConfig::default());
        assert_eq!(chunks.concat(), fragments.concat());
        assert_eq!(chunks.last().map(String::as_str), Some(" bye"));
    }

    #[test]
    fn test_reset_discards_buffer() {
        let mut chunker = SentenceChunker::default();
        chunker.feed("half a sent");
        chunker.reset();
        assert!(chunker.is_empty());
        assert_eq!(chunker.flush(), None);
    }
}
