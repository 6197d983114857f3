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
use crate::error::Result;
use crate::locking::{CancellationToken, LockAcquisition, LockController, generate_owner_id};
use colored::Colorize;
use log::info;

pub struct AcquireCommand<'a> {
    controller: &'a LockController,
    cancel: CancellationToken,
}

impl<'a> AcquireCommand<'a> {
    pub fn new(controller: &'a LockController, cancel: CancellationToken) -> Result<Self> {
        Ok(Self { controller, cancel })
    }

    /// Takes the lock and leaves it held until it expires or is released.
    pub fn execute(&self, resource_id: &str, owner_id: Option<&str>, quiet: bool) -> Result<()> {
        let owner_id = owner_id.map_or_else(generate_owner_id, str::to_string);

        match self
            .controller
            .try_acquire(resource_id, &owner_id, &self.cancel)?
        {
            LockAcquisition::Acquired { expires_at } => {
                info!("Acquired {resource_id} as {owner_id} until {expires_at}");
                if quiet {
                    println!("{owner_id}");
                } else {
                    println!(
                        "{} {} until {}",
                        "Acquired".green().bold(),
                        resource_id.bold(),
                        expires_at.to_rfc3339()
                    );
                    println!("Owner: {owner_id}");
                    println!(
                        "Release with: tablelock release {resource_id} --owner {owner_id}"
                    );
                }
                Ok(())
            }
            LockAcquisition::Contended => Err(contended(self.controller, resource_id)),
        }
    }
}
