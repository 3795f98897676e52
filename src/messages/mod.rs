pub mod record;
pub mod storage;
pub mod types;

pub use record::{format_record, parse_record, TIMESTAMP_FORMAT};
pub use storage::{ConversationStore, LogReplay};
pub use types::{ConversationHistory, Speaker, Turn};
