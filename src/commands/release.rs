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

use crate::error::{LockError, Result};
use crate::locking::{CancellationToken, LockController};
use colored::Colorize;
use log::info;

pub struct ReleaseCommand<'a> {
    controller: &'a LockController,
    cancel: CancellationToken,
}

impl<'a> ReleaseCommand<'a> {
    pub fn new(controller: &'a LockController, cancel: CancellationToken) -> Result<Self> {
        Ok(Self { controller, cancel })
    }

    pub fn execute(&self, resource_id: &str, owner_id: &str) -> Result<()> {
        if !self
            .controller
            .release_lock(resource_id, owner_id, &self.cancel)?
        {
            return Err(LockError::NotOwner {
                resource: resource_id.to_string(),
                owner: owner_id.to_string(),
            });
        }

        info!("Released {resource_id} held by {owner_id}");
        println!("{} {}", "Released".green().bold(), resource_id.bold());
        Ok(())
    }
}
