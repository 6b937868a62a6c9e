//! Catalog extraction: artists and songs dimension rows from track metadata.

use tracing::debug;

use crate::common::{ArtistRow, CatalogEntry, SongRow, dedup_first_seen};

/// Dimension rows derived from the song catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogTables {
    pub artists: Vec<ArtistRow>,
    pub songs: Vec<SongRow>,
}

pub fn extract_catalog(entries: &[CatalogEntry]) -> CatalogTables {
    let artists = extract_artists(entries);
    let songs = extract_songs(entries);
    debug!(
        "Catalog: {} entries -> {} artists, {} songs",
        entries.len(),
        artists.len(),
        songs.len()
    );
    CatalogTables { artists, songs }
}

/// One row per distinct `artist_id`; the first catalog entry for an artist wins.
pub fn extract_artists(entries: &[CatalogEntry]) -> Vec<ArtistRow> {
    let projected = entries.iter().map(|e| ArtistRow {
        artist_id: e.artist_id.clone(),
        name: e.artist_name.clone(),
        location: e.artist_location.clone(),
        latitude: e.artist_latitude,
        longitude: e.artist_longitude,
    });
    dedup_first_seen(projected, |row| row.artist_id.clone())
}

/// One row per distinct `song_id`; the first catalog entry for a song wins.
pub fn extract_songs(entries: &[CatalogEntry]) -> Vec<SongRow> {
    let projected = entries.iter().map(|e| SongRow {
        song_id: e.song_id.clone(),
        title: e.title.clone(),
        artist_id: e.artist_id.clone(),
        year: e.year,
        duration: e.duration,
    });
    dedup_first_seen(projected, |row| row.song_id.clone())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn entry(artist_id: &str, artist_name: &str, song_id: &str, title: &str) -> CatalogEntry {
        CatalogEntry {
            artist_id: Some(artist_id.to_string()),
            artist_name: Some(artist_name.to_string()),
            artist_location: Some("Portland, OR".to_string()),
            artist_latitude: Some(45.5),
            artist_longitude: None,
            song_id: Some(song_id.to_string()),
            title: Some(title.to_string()),
            year: Some(1998),
            duration: Some(168.5),
        }
    }

    #[test]
    fn test_artist_projection_renames_fields() {
        let artists = extract_artists(&[entry("AR1", "Elliott Smith", "SO1", "Say Yes")]);
        assert_eq!(
            artists,
            vec![ArtistRow {
                artist_id: Some("AR1".to_string()),
                name: Some("Elliott Smith".to_string()),
                location: Some("Portland, OR".to_string()),
                latitude: Some(45.5),
                longitude: None,
            }]
        );
    }

    #[test]
    fn test_same_artist_id_different_names_yields_one_row() {
        let entries = vec![
            entry("AR1", "Elliott Smith", "SO1", "Say Yes"),
            entry("AR1", "E. Smith", "SO2", "Angeles"),
        ];
        let artists = extract_artists(&entries);
        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].name.as_deref(), Some("Elliott Smith"));
    }

    #[test]
    fn test_artist_ids_are_unique() {
        let entries: Vec<CatalogEntry> = (0..50)
            .map(|i| entry(&format!("AR{}", i % 7), "x", &format!("SO{i}"), "t"))
            .collect();
        let artists = extract_artists(&entries);
        let ids: HashSet<_> = artists.iter().map(|a| a.artist_id.clone()).collect();
        assert_eq!(ids.len(), artists.len());
        assert_eq!(artists.len(), 7);
    }

    #[test]
    fn test_song_ids_are_unique() {
        let entries = vec![
            entry("AR1", "a", "SO1", "Say Yes"),
            entry("AR2", "b", "SO1", "Say Yes (live)"),
            entry("AR2", "b", "SO2", "Angeles"),
        ];
        let songs = extract_songs(&entries);
        assert_eq!(songs.len(), 2);
        assert_eq!(songs[0].title.as_deref(), Some("Say Yes"));
        assert_eq!(songs[0].artist_id.as_deref(), Some("AR1"));
        assert_eq!(songs[1].song_id.as_deref(), Some("SO2"));
    }

    #[test]
    fn test_null_ids_collapse_to_one_row() {
        let mut a = entry("AR1", "a", "SO1", "t");
        a.artist_id = None;
        let mut b = entry("AR2", "b", "SO2", "t");
        b.artist_id = None;
        let artists = extract_artists(&[a, b]);
        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].artist_id, None);
    }

    #[test]
    fn test_empty_catalog() {
        let tables = extract_catalog(&[]);
        assert!(tables.artists.is_empty());
        assert!(tables.songs.is_empty());
    }
}
