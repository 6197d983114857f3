// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use tablelock::config::LockOptions;
use tablelock::locking::{CancellationToken, LockController};
use tablelock::store::{Condition, FileLockStore, MemoryLockStore};
use tempfile::TempDir;

fn bench_memory_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_store");
    let controller =
        LockController::new(Arc::new(MemoryLockStore::new()), LockOptions::new("locks")).unwrap();
    let cancel = CancellationToken::new();

    group.bench_function("acquire_release", |b| {
        b.iter(|| {
            let acquired = controller
                .acquire_lock(black_box("orders"), "bench", &cancel)
                .unwrap();
            let released = controller.release_lock("orders", "bench", &cancel).unwrap();
            black_box((acquired, released))
        })
    });

    controller.acquire_lock("held", "owner", &cancel).unwrap();
    group.bench_function("contended_acquire", |b| {
        b.iter(|| {
            controller
                .acquire_lock(black_box("held"), "rival", &cancel)
                .unwrap()
        })
    });

    for resources in [1usize, 64, 1024] {
        group.bench_with_input(
            BenchmarkId::new("acquire_release_spread", resources),
            &resources,
            |b, &resources| {
                let mut next = 0;
                b.iter(|| {
                    let resource = format!("resource-{}", next % resources);
                    next += 1;
                    controller.acquire_lock(&resource, "bench", &cancel).unwrap();
                    controller.release_lock(&resource, "bench", &cancel).unwrap()
                })
            },
        );
    }

    group.finish();
}

fn bench_file_round_trip(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    let controller = LockController::new(
        Arc::new(FileLockStore::new(temp.path())),
        LockOptions::new("locks"),
    )
    .unwrap();
    let cancel = CancellationToken::new();

    c.bench_function("file_store/acquire_release", |b| {
        b.iter(|| {
            controller.acquire_lock("orders", "bench", &cancel).unwrap();
            controller.release_lock("orders", "bench", &cancel).unwrap()
        })
    });
}

fn bench_condition_rendering(c: &mut Criterion) {
    let condition = Condition::attribute_not_exists("pk")
        .and(Condition::attribute_not_exists("sk"))
        .or(Condition::less_than("expiresAt", ":now"));

    c.bench_function("condition/render", |b| {
        b.iter(|| black_box(&condition).to_string())
    });
}

criterion_group!(
    benches,
    bench_memory_round_trip,
    bench_file_round_trip,
    bench_condition_rendering
);
criterion_main!(benches);
