//! Loading a log whose timestamps fall in a daylight-saving gap
//!
//! Kept in its own test binary because it changes the process time zone.

use chrono::NaiveDateTime;
use std::fs;
use voiceloop::messages::TIMESTAMP_FORMAT;
use voiceloop::{ConversationStore, Speaker};

#[test]
fn test_turn_in_skipped_hour_is_kept() {
    // 02:30 on 2024-03-10 never happened in New York.
    std::env::set_var("TZ", "America/New_York");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conversation_log.txt");
    fs::write(
        &path,
        "2024-03-10 01:59:59 - user: before\n\
         2024-03-10 02:30:00 - user: hi\n\
         2024-03-10 03:00:01 - assistant: after\n",
    )
    .unwrap();

    let replay = ConversationStore::replay(&path).unwrap();
    assert!(replay.skipped_lines.is_empty());

    let turns: Vec<_> = replay
        .history
        .iter()
        .map(|t| (t.role, t.content.as_str()))
        .collect();
    assert_eq!(
        turns,
        vec![
            (Speaker::User, "before"),
            (Speaker::User, "hi"),
            (Speaker::Assistant, "after"),
        ]
    );

    let gap = NaiveDateTime::parse_from_str("2024-03-10 02:30:00", TIMESTAMP_FORMAT).unwrap();
    assert_eq!(replay.history.turns()[1].timestamp.naive_utc(), gap);
}
