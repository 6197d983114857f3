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

mod common;

use common::{MockStore, instant_retry};
use mockall::Sequence;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tablelock::config::{LockOptions, RetryConfig};
use tablelock::error::LockError;
use tablelock::locking::{CancellationToken, LockController};
use tablelock::store::{StoreError, StoreErrorKind};

fn controller(store: MockStore, retry: RetryConfig) -> LockController {
    LockController::new(Arc::new(store), LockOptions::new("locks").with_retry(retry)).unwrap()
}

fn conflict() -> StoreError {
    StoreError::conditional_check_failed("held by another owner")
}

#[test]
fn conflict_twice_then_success_takes_three_calls() {
    let mut seq = Sequence::new();
    let mut store = MockStore::new();
    store
        .expect_put_item()
        .times(2)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(conflict()));
    store
        .expect_put_item()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));

    let controller = controller(store, instant_retry(3));
    assert!(
        controller
            .acquire_lock("game-1", "B", &CancellationToken::new())
            .unwrap()
    );
}

#[test]
fn every_request_carries_the_acquire_condition() {
    let mut store = MockStore::new();
    store
        .expect_put_item()
        .withf(|request, _| {
            request.condition_expression()
                == "(attribute_not_exists(pk) AND attribute_not_exists(sk)) OR expiresAt < :now"
                && request.table_name == "locks"
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let controller = controller(store, RetryConfig::default());
    assert!(
        controller
            .acquire_lock("game-1", "A", &CancellationToken::new())
            .unwrap()
    );
}

#[test]
fn retryable_kinds_exhaust_after_max_attempts() {
    for kind in [
        StoreErrorKind::Throttled,
        StoreErrorKind::RateLimited,
        StoreErrorKind::TransientServerError,
    ] {
        let mut store = MockStore::new();
        store
            .expect_put_item()
            .times(4)
            .returning(move |_, _| Err(StoreError::new(kind, "busy")));

        let controller = controller(store, instant_retry(4));
        let err = controller
            .acquire_lock("game-1", "A", &CancellationToken::new())
            .unwrap_err();
        assert!(
            matches!(&err, LockError::Store { source, .. } if source.kind() == kind),
            "unexpected error for {kind}: {err:?}"
        );
    }
}

#[test]
fn non_retryable_error_makes_one_call() {
    let mut store = MockStore::new();
    store
        .expect_put_item()
        .times(1)
        .returning(|_, _| Err(StoreError::other("validation failed")));

    let controller = controller(store, instant_retry(10));
    assert!(matches!(
        controller.acquire_lock("game-1", "A", &CancellationToken::new()),
        Err(LockError::Store { .. })
    ));
}

#[test]
fn cancellation_during_backoff_stops_further_calls() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let mut store = MockStore::new();
    store.expect_put_item().returning(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(conflict())
    });

    let controller = controller(
        store,
        RetryConfig {
            enabled: true,
            max_attempts: 5,
            base_delay_ms: 20_000,
            max_delay_ms: 20_000,
            use_jitter: false,
            ..RetryConfig::default()
        },
    );

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    let trigger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        canceller.cancel();
    });

    let started = Instant::now();
    let result = controller.acquire_lock("game-1", "A", &cancel);
    trigger.join().unwrap();

    assert!(matches!(
        result,
        Err(LockError::Cancelled { attempts: 1, .. })
    ));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn backoff_waits_between_attempts() {
    let mut store = MockStore::new();
    store
        .expect_put_item()
        .times(3)
        .returning(|_, _| Err(conflict()));

    let controller = controller(
        store,
        RetryConfig {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 40,
            max_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            use_jitter: false,
            ..RetryConfig::default()
        },
    );

    let started = Instant::now();
    assert!(
        !controller
            .acquire_lock("game-1", "A", &CancellationToken::new())
            .unwrap()
    );
    // 40ms after the first attempt, 80ms after the second.
    assert!(started.elapsed() >= Duration::from_millis(120));
}
