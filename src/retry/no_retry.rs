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
use crate::retry::{RetryError, RetryPolicy};
use crate::store::StoreError;
use log::debug;

/// Single attempt, no classification. Cancellation is still honoured before
/// the attempt is made.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn execute<T, F, P>(
        &self,
        mut operation: F,
        _should_retry: P,
        cancel: &CancellationToken,
    ) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Result<T, StoreError>,
        P: Fn(&StoreError) -> bool,
    {
        if cancel.is_cancelled() {
            debug!("Cancelled before the only attempt");
            return Err(RetryError::Cancelled { attempts: 0 });
        }
        operation(1).map_err(RetryError::Operation)
    }
}
