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

use crate::locking::cancellation::CancellationToken;
use crate::store::{
    DeleteItemRequest, Item, ItemKey, LockStore, PutItemRequest, StoreError,
};
use log::trace;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

type Table = HashMap<(String, String), Item>;

/// In-process table keyed by `(table, partition value, sort value)`.
///
/// Every conditional mutation runs under one map-wide mutex, which makes each
/// request atomic with respect to all others. Suitable for tests and for
/// coordinating threads inside a single process.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    tables: Mutex<HashMap<String, Table>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items currently stored in `table_name`.
    pub fn len(&self, table_name: &str) -> Result<usize, StoreError> {
        let tables = self.tables()?;
        Ok(tables.get(table_name).map_or(0, HashMap::len))
    }

    pub fn is_empty(&self, table_name: &str) -> Result<bool, StoreError> {
        Ok(self.len(table_name)? == 0)
    }

    fn tables(&self) -> Result<MutexGuard<'_, HashMap<String, Table>>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::other("memory table mutex poisoned"))
    }
}

impl LockStore for MemoryLockStore {
    fn put_item(
        &self,
        request: &PutItemRequest,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::cancelled());
        }

        let mut tables = self.tables()?;
        let table = tables.entry(request.table_name.clone()).or_default();
        let slot = request.key.values();
        let current = table.get(&slot);

        if !request
            .condition
            .evaluate(current, &request.expression_values)?
        {
            trace!("Put rejected for {}: {}", request.key, request.condition);
            return Err(StoreError::conditional_check_failed(format!(
                "put on {} did not satisfy {}",
                request.key, request.condition
            )));
        }

        table.insert(slot, request.item.clone());
        Ok(())
    }

    fn delete_item(
        &self,
        request: &DeleteItemRequest,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        if cancel.is_cancelled() {
            return Err(StoreError::cancelled());
        }

        let mut tables = self.tables()?;
        let mut table = tables.get_mut(&request.table_name);
        let slot = request.key.values();
        let current = table.as_ref().and_then(|table| table.get(&slot));

        if !request
            .condition
            .evaluate(current, &request.expression_values)?
        {
            trace!("Delete rejected for {}: {}", request.key, request.condition);
            return Err(StoreError::conditional_check_failed(format!(
                "delete on {} did not satisfy {}",
                request.key, request.condition
            )));
        }

        if let Some(table) = table.as_mut() {
            table.remove(&slot);
        }
        Ok(())
    }

    fn get_item(&self, table_name: &str, key: &ItemKey) -> Result<Option<Item>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .get(table_name)
            .and_then(|table| table.get(&key.values()))
            .cloned())
    }
}
