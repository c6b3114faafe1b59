//! Performance benchmarks for match attempts and position lookups

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use parlor_duel::config::{MatchmakingSettings, StorageBackend};
use parlor_duel::metrics::MetricsCollector;
use parlor_duel::service::MatchmakingService;
use parlor_duel::types::JoinRequest;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn create_bench_service(rt: &Runtime, backend: StorageBackend, players: usize) -> MatchmakingService {
    let settings = MatchmakingSettings {
        storage_backend: backend,
        cleanup_on_join: false,
        ..MatchmakingSettings::default()
    };
    let service = MatchmakingService::from_settings(settings, Arc::new(MetricsCollector::default()));

    // Skills 500 apart never fall inside one window, so nobody matches
    rt.block_on(async {
        for i in 0..players {
            let id = format!("player_{:05}", i);
            service
                .join_queue(JoinRequest::new(id.clone(), id, i as i64 * 500))
                .await
                .unwrap();
        }
    });
    service
}

fn bench_searching_attempt(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("searching_attempt");

    for backend in [StorageBackend::Memory, StorageBackend::Sharded] {
        for players in [10, 100, 1000] {
            let service = create_bench_service(&rt, backend, players);
            let probe = format!("player_{:05}", players / 2);

            group.bench_with_input(
                BenchmarkId::new(backend.to_string(), players),
                &probe,
                |b, probe| {
                    b.iter(|| rt.block_on(async { black_box(service.matcher().attempt(probe).await.unwrap()) }))
                },
            );
        }
    }

    group.finish();
}

fn bench_position_lookup(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let service = create_bench_service(&rt, StorageBackend::Memory, 1000);

    c.bench_function("position_lookup_1000", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(service.tracker().position("player_00999").await.unwrap())
            })
        })
    });
}

fn bench_pair_commit(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("pair_commit", |b| {
        b.iter(|| {
            let service = MatchmakingService::from_settings(
                MatchmakingSettings::default(),
                Arc::new(MetricsCollector::default()),
            );
            rt.block_on(async {
                service
                    .join_queue(JoinRequest::new("alice", "Alice", 1000))
                    .await
                    .unwrap();
                service
                    .join_queue(JoinRequest::new("bob", "Bob", 1000))
                    .await
                    .unwrap();
                black_box(service.matcher().attempt("alice").await.unwrap())
            })
        })
    });
}

criterion_group!(
    benches,
    bench_searching_attempt,
    bench_position_lookup,
    bench_pair_commit
);
criterion_main!(benches);
