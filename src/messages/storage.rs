use super::record::{format_record, parse_record};
use super::types::{ConversationHistory, Turn};
use crate::{Result, VoiceLoopError};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of replaying a log file
#[derive(Debug, Default)]
pub struct LogReplay {
    pub history: ConversationHistory,

    /// 1-based numbers of the lines that were skipped as malformed
    pub skipped_lines: Vec<usize>,

    /// The file does not end with a line terminator
    pub unterminated: bool,
}

/// Durable, append-only conversation log
///
/// The log is replayed once when the store is opened and then only grows.
#[derive(Debug)]
pub struct ConversationStore {
    path: PathBuf,
    history: ConversationHistory,
    // Next append must first terminate a dangling last line.
    unterminated: bool,
}

impl ConversationStore {
    /// Open the log at `path`, replaying any turns already persisted
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let replay = Self::replay(&path)?;
        info!(
            "Loaded {} turns from {:?} ({} skipped)",
            replay.history.len(),
            path,
            replay.skipped_lines.len()
        );
        Ok(Self {
            path,
            history: replay.history,
            unterminated: replay.unterminated,
        })
    }

    /// Replay the log from the start
    ///
    /// A missing file is an empty history. Lines that do not parse are
    /// skipped with a warning.
    pub fn load(path: &Path) -> Result<ConversationHistory> {
        Self::replay(path).map(|replay| replay.history)
    }

    /// Replay the log, also reporting skipped lines and a missing final
    /// line terminator
    pub fn replay(path: &Path) -> Result<LogReplay> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Log file {:?} not found. Starting fresh.", path);
                return Ok(LogReplay::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut replay = LogReplay::default();
        let mut raw = Vec::new();
        let mut line_no = 0;

        loop {
            raw.clear();
            if reader.read_until(b'\n', &mut raw)? == 0 {
                break;
            }
            line_no += 1;
            replay.unterminated = raw.last() != Some(&b'\n');

            let line = match std::str::from_utf8(&raw) {
                Ok(line) => line.trim_end_matches(['\n', '\r']),
                Err(e) => {
                    skip_record(&mut replay, line_no, format!("invalid UTF-8: {}", e));
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match parse_record(line) {
                Ok(turn) => replay.history.push(turn),
                Err(reason) => skip_record(&mut replay, line_no, reason),
            }
        }

        Ok(replay)
    }

    /// Persist a turn, then record it in memory
    ///
    /// The write is synced to disk before this returns. A last line left
    /// without a terminator (by a crash or an outside edit) is closed off
    /// first so the new record starts on its own line.
    pub fn append(&mut self, turn: Turn) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut line = String::new();
        if self.unterminated {
            line.push('\n');
        }
        line.push_str(&format_record(&turn));
        line.push('\n');

        // A failed write may leave part of the record behind.
        if let Err(e) = file.write_all(line.as_bytes()).and_then(|_| file.sync_data()) {
            self.unterminated = true;
            return Err(e.into());
        }
        self.unterminated = false;

        debug!("Persisted {} turn ({} chars)", turn.role, turn.content.len());
        self.history.push(turn);
        Ok(())
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

fn skip_record(replay: &mut LogReplay, line: usize, reason: String) {
    let err = VoiceLoopError::MalformedLogRecord { line, reason };
    warn!("Skipping improperly formatted line: {}", err);
    replay.skipped_lines.push(line);
}
