//! Arrow representations of the five output tables.
//!
//! Each table has a fixed schema; partition columns are part of the schema
//! here and are split out by the writer.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::common::{ArtistRow, SongRow, SongplayFact, TimeRow, UserRow};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Artists,
    Songs,
    Users,
    Time,
    Songplays,
}

impl TableKind {
    pub const ALL: [TableKind; 5] = [
        TableKind::Artists,
        TableKind::Songs,
        TableKind::Users,
        TableKind::Time,
        TableKind::Songplays,
    ];

    /// Directory name under the output root.
    pub fn name(self) -> &'static str {
        match self {
            TableKind::Artists => "artists",
            TableKind::Songs => "songs",
            TableKind::Users => "users",
            TableKind::Time => "time",
            TableKind::Songplays => "songplays",
        }
    }

    /// Partition columns, outermost directory level first.
    pub fn partition_columns(self) -> &'static [&'static str] {
        match self {
            TableKind::Artists | TableKind::Users => &[],
            TableKind::Songs => &["year", "artist_id"],
            TableKind::Time | TableKind::Songplays => &["year", "month"],
        }
    }

    pub fn schema(self) -> SchemaRef {
        let utf8 = |name: &str, nullable: bool| Field::new(name, DataType::Utf8, nullable);
        let int32 = |name: &str, nullable: bool| Field::new(name, DataType::Int32, nullable);
        let fields = match self {
            TableKind::Artists => vec![
                utf8("artist_id", true),
                utf8("name", true),
                utf8("location", true),
                Field::new("latitude", DataType::Float64, true),
                Field::new("longitude", DataType::Float64, true),
            ],
            TableKind::Songs => vec![
                utf8("song_id", true),
                utf8("title", true),
                utf8("artist_id", true),
                Field::new("year", DataType::Int64, true),
                Field::new("duration", DataType::Float64, true),
            ],
            TableKind::Users => vec![
                int32("user_id", false),
                utf8("first_name", false),
                utf8("last_name", false),
                utf8("gender", false),
                utf8("level", false),
            ],
            TableKind::Time => vec![
                utf8("start_time", false),
                int32("hour", false),
                int32("day", false),
                int32("week", false),
                int32("month", false),
                int32("year", false),
                int32("weekday", false),
            ],
            TableKind::Songplays => vec![
                Field::new("songplay_id", DataType::Int64, false),
                utf8("start_time", true),
                utf8("user_id", true),
                utf8("level", true),
                utf8("song_id", true),
                utf8("artist_id", true),
                int32("session_id", true),
                utf8("location", true),
                utf8("user_agent", true),
                int32("year", true),
                int32("month", true),
            ],
        };
        Arc::new(Schema::new(fields))
    }
}

/// A named table ready for the writer.
#[derive(Debug, Clone)]
pub struct Table {
    pub kind: TableKind,
    pub batch: RecordBatch,
}

impl Table {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }
}

// ============================================================================
// Row -> RecordBatch conversion
// ============================================================================

fn strings<'r, T>(rows: &'r [T], f: impl Fn(&'r T) -> Option<&'r str>) -> ArrayRef {
    Arc::new(StringArray::from(rows.iter().map(f).collect::<Vec<_>>()))
}

fn build(kind: TableKind, columns: Vec<ArrayRef>) -> Result<Table> {
    let batch = RecordBatch::try_new(kind.schema(), columns)?;
    Ok(Table { kind, batch })
}

pub fn artists_table(rows: &[ArtistRow]) -> Result<Table> {
    build(
        TableKind::Artists,
        vec![
            strings(rows, |r| r.artist_id.as_deref()),
            strings(rows, |r| r.name.as_deref()),
            strings(rows, |r| r.location.as_deref()),
            Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.latitude))),
            Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.longitude))),
        ],
    )
}

pub fn songs_table(rows: &[SongRow]) -> Result<Table> {
    build(
        TableKind::Songs,
        vec![
            strings(rows, |r| r.song_id.as_deref()),
            strings(rows, |r| r.title.as_deref()),
            strings(rows, |r| r.artist_id.as_deref()),
            Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.year))),
            Arc::new(Float64Array::from_iter(rows.iter().map(|r| r.duration))),
        ],
    )
}

pub fn users_table(rows: &[UserRow]) -> Result<Table> {
    build(
        TableKind::Users,
        vec![
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.user_id))),
            strings(rows, |r| Some(r.first_name.as_str())),
            strings(rows, |r| Some(r.last_name.as_str())),
            strings(rows, |r| Some(r.gender.as_str())),
            strings(rows, |r| Some(r.level.as_str())),
        ],
    )
}

pub fn time_table(rows: &[TimeRow]) -> Result<Table> {
    let ints = |f: fn(&TimeRow) -> i32| -> ArrayRef {
        Arc::new(Int32Array::from_iter_values(rows.iter().map(f)))
    };
    build(
        TableKind::Time,
        vec![
            strings(rows, |r| Some(r.start_time.as_str())),
            ints(|r| r.hour),
            ints(|r| r.day),
            ints(|r| r.week),
            ints(|r| r.month),
            ints(|r| r.year),
            ints(|r| r.weekday),
        ],
    )
}

pub fn songplays_table(rows: &[SongplayFact]) -> Result<Table> {
    build(
        TableKind::Songplays,
        vec![
            Arc::new(Int64Array::from_iter_values(
                rows.iter().map(|r| r.songplay_id),
            )),
            strings(rows, |r| r.start_time.as_deref()),
            strings(rows, |r| r.user_id.as_deref()),
            strings(rows, |r| r.level.as_deref()),
            strings(rows, |r| r.song_id.as_deref()),
            strings(rows, |r| r.artist_id.as_deref()),
            Arc::new(Int32Array::from_iter(rows.iter().map(|r| r.session_id))),
            strings(rows, |r| r.location.as_deref()),
            strings(rows, |r| r.user_agent.as_deref()),
            Arc::new(Int32Array::from_iter(rows.iter().map(|r| r.year))),
            Arc::new(Int32Array::from_iter(rows.iter().map(|r| r.month))),
        ],
    )
}

// ============================================================================
// Tests
// ============================================================================
