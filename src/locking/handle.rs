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

use crate::error::Result;
use crate::locking::cancellation::CancellationToken;
use crate::locking::controller::LockController;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::fmt;

/// Scoped ownership of a lock obtained from [`LockController::acquire_lock_handle`].
///
/// The first call to [`LockHandle::dispose`] (or dropping the handle) releases
/// the lock; every later call does nothing. Release failures during disposal
/// are logged and discarded, since the lock expires on its own.
pub struct LockHandle<'a> {
    controller: &'a LockController,
    resource_id: String,
    owner_id: String,
    expires_at: DateTime<Utc>,
    disposed: bool,
}

impl<'a> LockHandle<'a> {
    pub(crate) fn new(
        controller: &'a LockController,
        resource_id: String,
        owner_id: String,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            controller,
            resource_id,
            owner_id,
            expires_at,
            disposed: false,
        }
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// True while the handle is not disposed and its expiry is still ahead.
    pub fn is_acquired(&self) -> bool {
        !self.disposed && self.controller.now() < self.expires_at
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn dispose(&mut self) {
        if let Err(err) = self.release_once() {
            warn!(
                "Failed to release lock {} for {} during disposal: {err}",
                self.resource_id, self.owner_id
            );
        }
    }

    /// Releases now and reports whether this owner still held the lock.
    ///
    /// Returns `Ok(false)` if the handle was already disposed.
    pub fn release(mut self) -> Result<bool> {
        self.release_once()
    }

    fn release_once(&mut self) -> Result<bool> {
        if self.disposed {
            return Ok(false);
        }
        self.disposed = true;

        let released = self.controller.release_lock(
            &self.resource_id,
            &self.owner_id,
            &CancellationToken::new(),
        )?;
        if !released {
            debug!(
                "Lock {} was no longer held by {} at disposal",
                self.resource_id, self.owner_id
            );
        }
        Ok(released)
    }
}

impl Drop for LockHandle<'_> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for LockHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle")
            .field("resource_id", &self.resource_id)
            .field("owner_id", &self.owner_id)
            .field("expires_at", &self.expires_at)
            .field("disposed", &self.disposed)
            .finish()
    }
}
