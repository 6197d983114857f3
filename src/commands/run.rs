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

use crate::commands::contended;
use crate::error::{LockError, Result};
use crate::locking::{CancellationToken, LockController, generate_owner_id};
use log::{debug, info, warn};
use std::process::Command;

/// Exit status reported when the child was terminated without one.
const NO_EXIT_STATUS: i32 = 1;

pub struct RunCommand<'a> {
    controller: &'a LockController,
    cancel: CancellationToken,
}

impl<'a> RunCommand<'a> {
    pub fn new(controller: &'a LockController, cancel: CancellationToken) -> Result<Self> {
        Ok(Self { controller, cancel })
    }

    /// Runs `command` while holding the lock and returns the child's exit
    /// status. The lock is released when the child exits, whatever its status.
    pub fn execute(
        &self,
        resource_id: &str,
        owner_id: Option<&str>,
        command: &[String],
    ) -> Result<i32> {
        let (program, args) = command.split_first().ok_or_else(|| {
            LockError::InvalidArgument("no command given to run under the lock".to_string())
        })?;
        let owner_id = owner_id.map_or_else(generate_owner_id, str::to_string);

        let Some(handle) =
            self.controller
                .acquire_lock_handle(resource_id, &owner_id, &self.cancel)?
        else {
            return Err(contended(self.controller, resource_id));
        };
        info!(
            "Holding {resource_id} as {owner_id} until {}; running {program}",
            handle.expires_at()
        );

        let status = Command::new(program).args(args).status()?;
        debug!("{program} exited with {status}");

        if !handle.is_acquired() {
            warn!(
                "Lock {resource_id} expired at {} while {program} was running",
                handle.expires_at()
            );
        }
        match handle.release() {
            Ok(true) => debug!("Released {resource_id}"),
            Ok(false) => warn!("Lock {resource_id} was taken over before it could be released"),
            Err(err) => warn!("Failed to release {resource_id}: {err}"),
        }

        Ok(status.code().unwrap_or(NO_EXIT_STATUS))
    }
}
