//! Benchmarks for the scroll engine's hot pure paths
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

use tidegate::query::{QueryRef, QueryTs, TableId};
use tidegate::scroll::{
    advance, derive_session_key, ScrollSession, SliceOutcome, SliceStatus,
    DEFAULT_FAILURE_CEILING,
};
use tidegate::store::MemoryStore;
use tidegate::StorageType;

fn create_test_query(tables: usize) -> QueryTs {
    QueryTs {
        space_uid: "bench_space".to_string(),
        query_list: (0..tables)
            .map(|i| {
                let mut filters = BTreeMap::new();
                filters.insert("level".to_string(), "error".to_string());
                QueryRef {
                    table_id: TableId::new(format!("result_table.bench_{}", i)),
                    field_name: None,
                    filters,
                }
            })
            .collect(),
        start: "1723594000".to_string(),
        end: "1723595000".to_string(),
        limit: 100,
        scroll: "9m".to_string(),
        slice_max: Some(3),
        clear_cache: false,
        timezone: "UTC".to_string(),
    }
}

fn bench_session_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_key");

    for tables in [1, 10, 100] {
        let query = create_test_query(tables);

        group.throughput(Throughput::Elements(tables as u64));
        group.bench_function(format!("derive_{}_tables", tables), |b| {
            b.iter(|| derive_session_key(black_box(&query), black_box("bench_user")).unwrap())
        });
    }

    group.finish();
}

fn bench_retry_policy(c: &mut Criterion) {
    let mut group = c.benchmark_group("retry_policy");

    let pending = SliceStatus::new();
    let outcomes = [
        SliceOutcome::Data {
            cursor: "scroll_cursor_1".to_string(),
        },
        SliceOutcome::Empty,
        SliceOutcome::Failed,
    ];

    group.bench_function("advance", |b| {
        b.iter(|| {
            for outcome in &outcomes {
                black_box(advance(
                    black_box(&pending),
                    black_box(outcome),
                    DEFAULT_FAILURE_CEILING,
                ));
            }
        })
    });

    group.finish();
}

fn bench_slice_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("slice_selection");
    let rt = Runtime::new().unwrap();

    for slice_max in [3, 16, 64] {
        group.throughput(Throughput::Elements(slice_max as u64));
        group.bench_function(format!("make_slices_{}", slice_max), |b| {
            let store = Arc::new(MemoryStore::new());
            let mut session = rt
                .block_on(ScrollSession::load_or_create(
                    store,
                    "scroll:session:bench",
                    slice_max,
                    100,
                    Duration::from_secs(540),
                    DEFAULT_FAILURE_CEILING,
                ))
                .unwrap();
            let table = TableId::new("result_table.bench");

            b.iter(|| {
                rt.block_on(session.make_slices(
                    StorageType::Elasticsearch,
                    black_box("http://127.0.0.1:9200"),
                    &table,
                ))
                .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_session_key,
    bench_retry_policy,
    bench_slice_selection
);
criterion_main!(benches);
