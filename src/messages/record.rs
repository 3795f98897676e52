//! Line format of the conversation log
//!
//! Each turn is one line: `<timestamp> - <role>: <content>`. The record is
//! split on the first `" - "` and then the first `": "`, so content may carry
//! either sequence. Line breaks and backslashes in content are escaped.

use super::types::{Speaker, Turn};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

/// Timestamp layout of a record
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TIMESTAMP_SEPARATOR: &str = " - ";
const ROLE_SEPARATOR: &str = ": ";

/// Serialize a turn as a single log line, without the trailing newline
pub fn format_record(turn: &Turn) -> String {
    format!(
        "{}{}{}{}{}",
        turn.timestamp.format(TIMESTAMP_FORMAT),
        TIMESTAMP_SEPARATOR,
        turn.role,
        ROLE_SEPARATOR,
        escape_content(&turn.content)
    )
}

/// Parse one log line (line terminator already removed)
///
/// Returns the reason on failure so the loader can report it.
pub fn parse_record(line: &str) -> Result<Turn, String> {
    let (timestamp, rest) = line
        .split_once(TIMESTAMP_SEPARATOR)
        .ok_or_else(|| "missing timestamp separator".to_string())?;
    let (role, content) = rest
        .split_once(ROLE_SEPARATOR)
        .ok_or_else(|| "missing role separator".to_string())?;

    let role: Speaker = role.parse()?;
    let naive = NaiveDateTime::parse_from_str(timestamp.trim(), TIMESTAMP_FORMAT)
        .map_err(|e| format!("bad timestamp '{}': {}", timestamp, e))?;

    Ok(Turn {
        role,
        content: unescape_content(content),
        timestamp: resolve_local(&naive),
    })
}

// A wall-clock time skipped by a DST change has no local instant; read it
// as UTC so the turn itself is kept.
fn resolve_local(naive: &NaiveDateTime) -> DateTime<Local> {
    Local
        .from_local_datetime(naive)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(naive))
}

fn escape_content(content: &str) -> String {
    let mut escaped = String::with_capacity(content.len());
    for c in content.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            other => escaped.push(other),
        }
    }
    escaped
}

// Unknown escapes are kept as written.
fn unescape_content(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
