//! Reconciliation throughput benchmarks.
//!
//! Two workloads over a synthetic catalog and activity log:
//! - **reconcile**: the play/catalog join alone, across log sizes.
//! - **star_schema**: every extractor plus the join, i.e. the in-memory part
//!   of a full run.
//!
//! About half of the generated plays have a catalog match.
//!
//! # Running
//!
//! ```sh
//! cargo bench --bench reconcile_throughput
//! ```

use criterion::{BenchmarkId, Criterion, Throughput};
use songplay_lake::common::{CatalogEntry, LogEvent};
use songplay_lake::events::{SONG_PLAY_PAGE, filter_song_plays};
use songplay_lake::pipeline::StarSchema;
use songplay_lake::songplays::{JoinPolicy, reconcile};

// ============================================================================
// Test data generators
// ============================================================================

const FIRST_TS_MS: i64 = 1_541_030_400_000;

fn generate_catalog(count: usize) -> Vec<CatalogEntry> {
    (0..count)
        .map(|i| CatalogEntry {
            artist_id: Some(format!("AR{:016}", i / 4)),
            artist_name: Some(format!("Artist {}", i / 4)),
            artist_location: Some("Chicago, IL".to_string()),
            artist_latitude: None,
            artist_longitude: None,
            song_id: Some(format!("SO{i:016}")),
            title: Some(format!("Track {i}")),
            year: Some(1990 + (i % 30) as i64),
            duration: Some(120.0 + (i % 240) as f64 + 0.25),
        })
        .collect()
}

/// Every other event points at a real catalog entry; one in five is not a
/// song play at all.
fn generate_events(count: usize, catalog: &[CatalogEntry]) -> Vec<LogEvent> {
    (0..count)
        .map(|i| {
            let entry = &catalog[(i * 7) % catalog.len()];
            let hit = i % 2 == 0;
            LogEvent {
                page: Some(if i % 5 == 0 { "Home" } else { SONG_PLAY_PAGE }.to_string()),
                user_id: Some(((i % 97) + 1).to_string()),
                first_name: Some("Lily".to_string()),
                last_name: Some("Koch".to_string()),
                gender: Some("F".to_string()),
                level: Some(if i % 3 == 0 { "paid" } else { "free" }.to_string()),
                ts: Some(FIRST_TS_MS + (i as i64) * 37_001),
                session_id: Some((i / 20) as i64),
                location: Some("Chicago-Naperville-Elgin, IL-IN-WI".to_string()),
                user_agent: Some("Mozilla/5.0".to_string()),
                artist: entry.artist_name.clone(),
                song: if hit {
                    entry.title.clone()
                } else {
                    Some(format!("Unlisted {i}"))
                },
                length: entry.duration,
            }
        })
        .collect()
}

fn bench_reconcile(c: &mut Criterion) {
    let catalog = generate_catalog(20_000);

    let mut group = c.benchmark_group("reconcile");
    group.sample_size(20);
    group.noise_threshold(0.05);

    for num_events in [10_000, 100_000, 500_000] {
        let plays = filter_song_plays(generate_events(num_events, &catalog));
        group.throughput(Throughput::Elements(plays.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("exact", num_events),
            &plays,
            |b, plays| {
                b.iter(|| reconcile(plays, &catalog, JoinPolicy::Exact));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("tolerance", num_events),
            &plays,
            |b, plays| {
                b.iter(|| reconcile(plays, &catalog, JoinPolicy::DurationTolerance(0.5)));
            },
        );
    }
    group.finish();
}

fn bench_star_schema(c: &mut Criterion) {
    let catalog = generate_catalog(20_000);
    let num_events = 200_000;
    let events = generate_events(num_events, &catalog);

    let mut group = c.benchmark_group("star_schema");
    group.sample_size(10);
    group.throughput(Throughput::Elements(num_events as u64));
    group.bench_function("build", |b| {
        b.iter(|| StarSchema::build(&catalog, events.clone(), JoinPolicy::Exact));
    });
    group.finish();
}

fn main() {
    let mut criterion = Criterion::default()
        .warm_up_time(std::time::Duration::from_secs(3))
        .measurement_time(std::time::Duration::from_secs(15))
        .configure_from_args();

    bench_reconcile(&mut criterion);
    bench_star_schema(&mut criterion);

    criterion.final_summary();
}
