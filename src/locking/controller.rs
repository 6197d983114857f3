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

use crate::clock::{Clock, SystemClock};
use crate::config::LockOptions;
use crate::error::{LockError, Result};
use crate::locking::cancellation::CancellationToken;
use crate::locking::handle::LockHandle;
use crate::locking::record::{LockAcquisition, LockRecord, lock_key};
use crate::locking::request::{acquire_request, release_request};
use crate::retry::{RetryError, RetryPolicy, RetryStrategy};
use crate::store::{LockStore, StoreError, StoreErrorKind};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;

/// Acquires and releases expiring locks through conditional writes on a
/// [`LockStore`].
///
/// The controller keeps no per-lock state; exclusivity comes entirely from the
/// store evaluating each condition atomically. It is `Send + Sync` and may be
/// shared freely between threads.
pub struct LockController {
    store: Arc<dyn LockStore>,
    options: LockOptions,
    retry: RetryStrategy,
    clock: Arc<dyn Clock>,
}

impl LockController {
    pub fn new(store: Arc<dyn LockStore>, options: LockOptions) -> Result<Self> {
        Self::with_clock(store, options, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn LockStore>,
        options: LockOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        options.validate()?;
        let retry = RetryStrategy::from_config(&options.retry);
        debug!(
            "Lock controller for table {} (timeout {}s, retry {})",
            options.table_name,
            options.lock_timeout_seconds,
            if retry.is_enabled() { "enabled" } else { "disabled" }
        );
        Ok(Self {
            store,
            options,
            retry,
            clock,
        })
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    pub fn retry_strategy(&self) -> &RetryStrategy {
        &self.retry
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Attempts to take the lock on `resource_id` for `owner_id`.
    ///
    /// Returns `Ok(false)` when another owner holds an unexpired lock.
    pub fn acquire_lock(
        &self,
        resource_id: &str,
        owner_id: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        Ok(self.try_acquire(resource_id, owner_id, cancel)?.is_acquired())
    }

    /// Like [`LockController::acquire_lock`], but reports the expiry written on
    /// success.
    pub fn try_acquire(
        &self,
        resource_id: &str,
        owner_id: &str,
        cancel: &CancellationToken,
    ) -> Result<LockAcquisition> {
        validate_id("resource_id", resource_id)?;
        validate_id("owner_id", owner_id)?;

        // Without retries a conflict is a plain answer. With retries it has to
        // reach the policy as an error so that it is retried.
        let suppress_conflict = !self.retry.is_enabled();
        let mut attempts = 0;

        let outcome = self.retry.execute(
            |attempt| {
                attempts = attempt;
                let (request, expires_at) =
                    acquire_request(&self.options, resource_id, owner_id, self.clock.now());
                match self.store.put_item(&request, cancel) {
                    Ok(()) => Ok(LockAcquisition::Acquired { expires_at }),
                    Err(err) if suppress_conflict && err.is_conditional_check_failed() => {
                        Ok(LockAcquisition::Contended)
                    }
                    Err(err) => Err(err),
                }
            },
            Self::should_retry_acquisition,
            cancel,
        );

        match outcome {
            Ok(acquisition) => {
                match acquisition {
                    LockAcquisition::Acquired { expires_at } => debug!(
                        "Acquired lock {resource_id} for {owner_id} until {expires_at} after {attempts} attempt(s)"
                    ),
                    LockAcquisition::Contended => {
                        debug!("Lock {resource_id} is held by another owner")
                    }
                }
                Ok(acquisition)
            }
            Err(RetryError::Operation(err)) if err.is_conditional_check_failed() => {
                debug!("Lock {resource_id} still held by another owner after {attempts} attempt(s)");
                Ok(LockAcquisition::Contended)
            }
            Err(RetryError::Operation(err)) if err.kind() == StoreErrorKind::Cancelled => {
                Err(LockError::Cancelled {
                    resource: resource_id.to_string(),
                    attempts,
                })
            }
            Err(RetryError::Operation(err)) => {
                if self.retry.is_enabled() && Self::should_retry_acquisition(&err) {
                    warn!("Giving up on lock {resource_id} after {attempts} attempt(s): {err}");
                }
                Err(LockError::store(resource_id, err))
            }
            Err(RetryError::Cancelled { attempts }) => {
                debug!("Acquisition of {resource_id} cancelled after {attempts} attempt(s)");
                Err(LockError::Cancelled {
                    resource: resource_id.to_string(),
                    attempts,
                })
            }
        }
    }

    /// Deletes the lock on `resource_id` if `owner_id` still holds it.
    ///
    /// Returns `Ok(false)` when the lock is absent or held by someone else,
    /// for example after it expired and was taken over. Never retried.
    pub fn release_lock(
        &self,
        resource_id: &str,
        owner_id: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        validate_id("resource_id", resource_id)?;
        validate_id("owner_id", owner_id)?;

        if cancel.is_cancelled() {
            return Err(LockError::Cancelled {
                resource: resource_id.to_string(),
                attempts: 0,
            });
        }

        let request = release_request(&self.options, resource_id, owner_id);
        match self.store.delete_item(&request, cancel) {
            Ok(()) => {
                debug!("Released lock {resource_id} held by {owner_id}");
                Ok(true)
            }
            Err(err) if err.is_conditional_check_failed() => {
                debug!("Lock {resource_id} is not held by {owner_id}; nothing released");
                Ok(false)
            }
            Err(err) if err.kind() == StoreErrorKind::Cancelled => Err(LockError::Cancelled {
                resource: resource_id.to_string(),
                attempts: 1,
            }),
            Err(err) => Err(LockError::store(resource_id, err)),
        }
    }

    /// Acquires the lock and wraps it in a handle that releases on drop.
    ///
    /// Returns `Ok(None)` when the lock is held by another owner.
    pub fn acquire_lock_handle(
        &self,
        resource_id: &str,
        owner_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<LockHandle<'_>>> {
        match self.try_acquire(resource_id, owner_id, cancel)? {
            LockAcquisition::Acquired { expires_at } => Ok(Some(LockHandle::new(
                self,
                resource_id.to_string(),
                owner_id.to_string(),
                expires_at,
            ))),
            LockAcquisition::Contended => Ok(None),
        }
    }

    /// Reads the stored lock for `resource_id`, expired or not.
    pub fn current_record(&self, resource_id: &str) -> Result<Option<LockRecord>> {
        validate_id("resource_id", resource_id)?;

        let key = lock_key(&self.options, resource_id);
        let item = self
            .store
            .get_item(&self.options.table_name, &key)
            .map_err(|err| LockError::store(resource_id, err))?;

        match item {
            None => Ok(None),
            Some(item) => LockRecord::from_item(&self.options, &item)
                .map(Some)
                .ok_or_else(|| {
                    LockError::store(
                        resource_id,
                        StoreError::other(format!("item {key} is not a lock record")),
                    )
                }),
        }
    }

    /// Failures worth another attempt: contention that may expire and
    /// capacity or service faults that clear with time.
    pub fn should_retry_acquisition(err: &StoreError) -> bool {
        matches!(
            err.kind(),
            StoreErrorKind::ConditionalCheckFailed
                | StoreErrorKind::Throttled
                | StoreErrorKind::RateLimited
                | StoreErrorKind::TransientServerError
        )
    }
}

impl fmt::Debug for LockController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockController")
            .field("options", &self.options)
            .field("retry", &self.retry)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

fn validate_id(label: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LockError::InvalidArgument(format!(
            "{label} must not be empty"
        )));
    }
    Ok(())
}
