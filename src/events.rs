//! Event extraction: filters the log stream down to song plays and derives the
//! users and time dimensions from that subset.

use indexmap::IndexSet;
use tracing::debug;

use crate::common::{LogEvent, TimeRow, UserRow, cast_to_int};
use crate::time::StartTime;

/// The `page` value that marks a song-play event.
pub const SONG_PLAY_PAGE: &str = "NextSong";

/// A song-play event with its `start_time` already derived.
///
/// The timestamp is converted exactly once, here, so the time table and the
/// songplays table always agree on the `start_time` of an event.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayEvent {
    pub event: LogEvent,
    pub start_time: Option<StartTime>,
}

impl PlayEvent {
    pub fn new(event: LogEvent) -> Self {
        let start_time = event.ts.and_then(StartTime::from_millis);
        Self { event, start_time }
    }
}

/// Everything derived from the log stream.
#[derive(Debug, Clone, Default)]
pub struct EventTables {
    pub users: Vec<UserRow>,
    pub time: Vec<TimeRow>,
    pub plays: Vec<PlayEvent>,
}

pub fn extract_events(events: Vec<LogEvent>) -> EventTables {
    let total = events.len();
    let plays = filter_song_plays(events);
    let users = extract_users(&plays);
    let time = extract_time(&plays);
    debug!(
        "Events: {} total -> {} plays, {} users, {} time rows",
        total,
        plays.len(),
        users.len(),
        time.len()
    );
    EventTables { users, time, plays }
}

/// Keep only song-play events, attaching `start_time` to each.
pub fn filter_song_plays(events: Vec<LogEvent>) -> Vec<PlayEvent> {
    events
        .into_iter()
        .filter(|e| e.page.as_deref() == Some(SONG_PLAY_PAGE))
        .map(PlayEvent::new)
        .collect()
}

/// Distinct, fully populated user rows. Exact duplicates collapse to one row;
/// rows with any null field (including a `userId` that does not cast to an
/// integer) are dropped. A user seen at two levels yields two rows.
pub fn extract_users(plays: &[PlayEvent]) -> Vec<UserRow> {
    let rows: IndexSet<UserRow> = plays
        .iter()
        .filter_map(|p| {
            let e = &p.event;
            Some(UserRow {
                user_id: e.user_id.as_deref().and_then(cast_to_int)?,
                first_name: e.first_name.clone()?,
                last_name: e.last_name.clone()?,
                gender: e.gender.clone()?,
                level: e.level.clone()?,
            })
        })
        .collect();
    rows.into_iter().collect()
}

/// One time row per distinct `start_time`, in first-seen order.
/// Plays without a timestamp contribute nothing.
pub fn extract_time(plays: &[PlayEvent]) -> Vec<TimeRow> {
    let distinct: IndexSet<&StartTime> = plays
        .iter()
        .filter_map(|p| p.start_time.as_ref())
        .collect();
    distinct.into_iter().map(StartTime::to_time_row).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn play(user_id: &str, level: &str, ts: i64) -> LogEvent {
        LogEvent {
            page: Some(SONG_PLAY_PAGE.to_string()),
            user_id: Some(user_id.to_string()),
            first_name: Some("Kaylee".to_string()),
            last_name: Some("Summers".to_string()),
            gender: Some("F".to_string()),
            level: Some(level.to_string()),
            ts: Some(ts),
            session_id: Some(139),
            artist: Some("Des'ree".to_string()),
            song: Some("You Gotta Be".to_string()),
            length: Some(246.30812),
            ..Default::default()
        }
    }

    #[test]
    fn test_non_play_events_are_excluded_everywhere() {
        let mut login = play("99", "paid", 1_541_106_000_000);
        login.page = Some("Login".to_string());
        let tables = extract_events(vec![login, play("8", "free", 1_541_106_106_796)]);

        assert_eq!(tables.plays.len(), 1);
        assert_eq!(tables.plays[0].event.user_id.as_deref(), Some("8"));
        assert!(tables.users.iter().all(|u| u.user_id != 99));
        assert_eq!(tables.time.len(), 1);
        assert_eq!(tables.time[0].start_time, "2018-11-01 21:01:46.796000");
    }

    #[test]
    fn test_missing_page_is_not_a_play() {
        let mut event = play("8", "free", 0);
        event.page = None;
        assert!(filter_song_plays(vec![event]).is_empty());
    }

    #[test]
    fn test_users_deduplicated_and_null_free() {
        let mut no_gender = play("12", "free", 3);
        no_gender.gender = None;
        let plays = filter_song_plays(vec![
            play("8", "free", 1),
            play("8", "free", 2),
            play("", "free", 2),
            no_gender,
        ]);
        let users = extract_users(&plays);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, 8);
        assert_eq!(users[0].first_name, "Kaylee");

        let distinct: HashSet<_> = users.iter().collect();
        assert_eq!(distinct.len(), users.len());
    }

    #[test]
    fn test_level_change_yields_one_row_per_level() {
        let plays = filter_song_plays(vec![
            play("8", "free", 1),
            play("8", "paid", 2),
            play("8", "free", 3),
        ]);
        let users = extract_users(&plays);
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].level, "free");
        assert_eq!(users[1].level, "paid");
    }

    #[test]
    fn test_time_rows_match_play_start_times() {
        let plays = filter_song_plays(vec![
            play("8", "free", 1_541_106_106_796),
            play("9", "free", 1_541_106_106_796),
            play("9", "free", 1_541_106_000_000),
        ]);
        let time = extract_time(&plays);
        assert_eq!(time.len(), 2);
        for p in &plays {
            let st = p.start_time.as_ref().unwrap();
            assert!(time.iter().any(|t| t.start_time == st.text));
        }
    }

    #[test]
    fn test_null_ts_has_no_time_row() {
        let mut event = play("8", "free", 0);
        event.ts = None;
        let plays = filter_song_plays(vec![event]);
        assert_eq!(plays.len(), 1);
        assert!(plays[0].start_time.is_none());
        assert!(extract_time(&plays).is_empty());
    }
}
