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

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use mockall::mock;
use std::sync::Arc;
use tablelock::clock::ManualClock;
use tablelock::config::{LockOptions, RetryConfig};
use tablelock::locking::{CancellationToken, LockController};
use tablelock::store::{
    DeleteItemRequest, Item, ItemKey, LockStore, MemoryLockStore, PutItemRequest, StoreError,
};

mock! {
    pub Store {}

    impl LockStore for Store {
        fn put_item(
            &self,
            request: &PutItemRequest,
            cancel: &CancellationToken,
        ) -> Result<(), StoreError>;
        fn delete_item(
            &self,
            request: &DeleteItemRequest,
            cancel: &CancellationToken,
        ) -> Result<(), StoreError>;
        fn get_item(&self, table_name: &str, key: &ItemKey) -> Result<Option<Item>, StoreError>;
    }
}

pub const TABLE: &str = "locks";

pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

/// Retry settings that never sleep.
pub fn instant_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        enabled: true,
        max_attempts,
        base_delay_ms: 0,
        max_delay_ms: 0,
        use_jitter: false,
        ..RetryConfig::default()
    }
}

pub struct Harness {
    pub store: Arc<MemoryLockStore>,
    pub clock: Arc<ManualClock>,
    pub controller: LockController,
}

impl Harness {
    pub fn new(options: LockOptions) -> Self {
        let store = Arc::new(MemoryLockStore::new());
        let clock = Arc::new(ManualClock::new(epoch()));
        let controller = LockController::with_clock(
            store.clone() as Arc<dyn LockStore>,
            options,
            clock.clone(),
        )
        .unwrap();
        Self {
            store,
            clock,
            controller,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(LockOptions::new(TABLE))
    }
}
