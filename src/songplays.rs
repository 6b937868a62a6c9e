//! Songplay reconciliation: the equi-join between song-play events and the raw
//! catalog that produces the fact table.
//!
//! An event matches a catalog entry when its `(artist, song, length)` equals
//! the entry's `(artist_name, title, duration)`. Strings compare byte for byte
//! and durations compare exactly unless a [`JoinPolicy`] says otherwise. A
//! `null` on either side never matches. Events with several matching entries
//! fan out into several fact rows; events with none are dropped.
//!
//! The join runs over the *raw* catalog, not the deduplicated songs table, so
//! duplicate catalog entries keep their join cardinality.

use std::collections::HashMap;

use rayon::prelude::*;
use tracing::debug;

use crate::common::{CatalogEntry, LogEvent, SongplayFact};
use crate::events::PlayEvent;

/// Number of play events handled by one join partition.
pub const PARTITION_ROWS: usize = 1 << 16;

/// Bits reserved for the per-partition row counter in a `songplay_id`.
pub const ROW_COUNTER_BITS: u32 = 33;

// ============================================================================
// Join policy
// ============================================================================

/// How event `length` is compared against catalog `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum JoinPolicy {
    /// Exact floating-point equality (`-0.0 == 0.0`, NaN never matches).
    #[default]
    Exact,
    /// Match when `|length - duration| <= tolerance`.
    DurationTolerance(f64),
}

impl JoinPolicy {
    pub fn durations_match(self, length: f64, duration: f64) -> bool {
        match self {
            JoinPolicy::Exact => length == duration,
            JoinPolicy::DurationTolerance(tolerance) => (length - duration).abs() <= tolerance,
        }
    }
}

// ============================================================================
// Surrogate keys
// ============================================================================

/// Generates `songplay_id`s for one partition: the partition index occupies
/// the upper bits and a row counter the lower [`ROW_COUNTER_BITS`] bits.
///
/// Ids increase monotonically across partitions taken in order and are unique
/// within a run. They are not dense and not stable across runs.
#[derive(Debug)]
pub struct SurrogateKeys {
    base: u64,
    next: u64,
}

impl SurrogateKeys {
    pub fn new(partition: u64) -> Self {
        Self {
            base: partition << ROW_COUNTER_BITS,
            next: 0,
        }
    }

    pub fn next_id(&mut self) -> i64 {
        debug_assert!(self.next < 1 << ROW_COUNTER_BITS, "partition row counter overflow");
        let id = self.base | self.next;
        self.next += 1;
        id as i64
    }
}

// ============================================================================
// Catalog index
// ============================================================================

/// Catalog entries grouped by artist name and then title. Entries without
/// either field can never match and are left out.
pub struct CatalogIndex<'a> {
    by_artist: HashMap<&'a str, HashMap<&'a str, Vec<&'a CatalogEntry>>>,
    len: usize,
}

impl<'a> CatalogIndex<'a> {
    pub fn build(entries: &'a [CatalogEntry]) -> Self {
        let mut by_artist: HashMap<&'a str, HashMap<&'a str, Vec<&'a CatalogEntry>>> =
            HashMap::new();
        let mut len = 0;
        for entry in entries {
            if let (Some(artist), Some(title)) =
                (entry.artist_name.as_deref(), entry.title.as_deref())
            {
                by_artist
                    .entry(artist)
                    .or_default()
                    .entry(title)
                    .or_default()
                    .push(entry);
                len += 1;
            }
        }
        Self { by_artist, len }
    }

    /// Number of indexed (joinable) entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Catalog entries matching the event's `(artist, song, length)`.
    pub fn matches<'s>(
        &'s self,
        event: &'s LogEvent,
        policy: JoinPolicy,
    ) -> impl Iterator<Item = &'a CatalogEntry> + 's {
        let candidates: &[&'a CatalogEntry] = match (
            event.artist.as_deref(),
            event.song.as_deref(),
            event.length,
        ) {
            (Some(artist), Some(song), Some(_)) => self
                .by_artist
                .get(artist)
                .and_then(|titles| titles.get(song))
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            _ => &[],
        };
        candidates.iter().copied().filter(move |entry| {
            match (event.length, entry.duration) {
                (Some(length), Some(duration)) => policy.durations_match(length, duration),
                _ => false,
            }
        })
    }
}

// ============================================================================
// Reconciliation
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    pub facts: Vec<SongplayFact>,
    /// Play events that matched no catalog entry.
    pub unmatched: usize,
}

pub fn reconcile(
    plays: &[PlayEvent],
    catalog: &[CatalogEntry],
    policy: JoinPolicy,
) -> Reconciled {
    let index = CatalogIndex::build(catalog);

    let partitions: Vec<(Vec<SongplayFact>, usize)> = plays
        .par_chunks(PARTITION_ROWS)
        .enumerate()
        .map(|(partition, chunk)| {
            let mut keys = SurrogateKeys::new(partition as u64);
            let mut facts = Vec::new();
            let mut unmatched = 0usize;
            for play in chunk {
                let before = facts.len();
                for entry in index.matches(&play.event, policy) {
                    facts.push(build_fact(keys.next_id(), play, entry));
                }
                if facts.len() == before {
                    unmatched += 1;
                }
            }
            (facts, unmatched)
        })
        .collect();

    let mut reconciled = Reconciled::default();
    for (facts, unmatched) in partitions {
        reconciled.facts.extend(facts);
        reconciled.unmatched += unmatched;
    }
    debug!(
        "Reconciled {} plays against {} catalog entries: {} facts, {} unmatched",
        plays.len(),
        index.len(),
        reconciled.facts.len(),
        reconciled.unmatched
    );
    reconciled
}

fn build_fact(songplay_id: i64, play: &PlayEvent, entry: &CatalogEntry) -> SongplayFact {
    let event = &play.event;
    SongplayFact {
        songplay_id,
        start_time: play.start_time.as_ref().map(|st| st.text.clone()),
        user_id: event.user_id.clone(),
        level: event.level.clone(),
        song_id: entry.song_id.clone(),
        artist_id: entry.artist_id.clone(),
        session_id: event.session_id.and_then(|id| i32::try_from(id).ok()),
        location: event.location.clone(),
        user_agent: event.user_agent.clone(),
        year: play.start_time.as_ref().map(|st| st.year()),
        month: play.start_time.as_ref().map(|st| st.month()),
    }
}

// ============================================================================
// Tests
// ============================================================================
