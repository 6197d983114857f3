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

//! Retry policies applied to store calls made during lock acquisition.

mod backoff;
mod no_retry;

pub use backoff::ExponentialBackoffRetry;
pub use no_retry::NoRetry;

use crate::config::RetryConfig;
use crate::locking::cancellation::CancellationToken;
use crate::store::StoreError;
use thiserror::Error;

/// Why a retried operation stopped without producing a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    #[error("cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },

    /// The last error returned by the operation, unchanged.
    #[error(transparent)]
    Operation(StoreError),
}

/// Runs a fallible store operation, deciding between attempts whether to try
/// again.
///
/// `operation` receives the 1-based attempt number. `should_retry` classifies
/// each failure; an error it rejects is returned after that single attempt.
pub trait RetryPolicy: Send + Sync {
    fn execute<T, F, P>(
        &self,
        operation: F,
        should_retry: P,
        cancel: &CancellationToken,
    ) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Result<T, StoreError>,
        P: Fn(&StoreError) -> bool;
}

/// Policy selected from [`RetryConfig`] when a controller is built.
#[derive(Debug, Clone)]
pub enum RetryStrategy {
    Disabled(NoRetry),
    ExponentialBackoff(ExponentialBackoffRetry),
}

impl RetryStrategy {
    pub fn from_config(config: &RetryConfig) -> Self {
        if config.enabled {
            RetryStrategy::ExponentialBackoff(ExponentialBackoffRetry::new(config))
        } else {
            RetryStrategy::Disabled(NoRetry)
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, RetryStrategy::ExponentialBackoff(_))
    }
}

impl RetryPolicy for RetryStrategy {
    fn execute<T, F, P>(
        &self,
        operation: F,
        should_retry: P,
        cancel: &CancellationToken,
    ) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Result<T, StoreError>,
        P: Fn(&StoreError) -> bool,
    {
        match self {
            RetryStrategy::Disabled(policy) => policy.execute(operation, should_retry, cancel),
            RetryStrategy::ExponentialBackoff(policy) => {
                policy.execute(operation, should_retry, cancel)
            }
        }
    }
}
