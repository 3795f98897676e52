//! Language model side of the loop
//!
//! - [`generation`]: the model boundary and an offline echo model
//! - [`chunker`]: sentence chunking of the streamed reply

pub mod chunker;
pub mod generation;

pub use chunker::{chunk_text, ChunkerConfig, SentenceChunker};
pub use generation::{
    build_messages, ChatMessage, EchoGenerator, FragmentStream, GenerationConfig, GenerationPort,
};
