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
use crate::locking::{LockController, LockRecord};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq, Eq)]
struct StatusReport {
    resource_id: String,
    state: LockState,
    owner_id: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    remaining_seconds: Option<i64>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum LockState {
    Held,
    Expired,
    Free,
}

impl StatusReport {
    fn new(resource_id: &str, record: Option<LockRecord>, now: DateTime<Utc>) -> Self {
        match record {
            None => Self {
                resource_id: resource_id.to_string(),
                state: LockState::Free,
                owner_id: None,
                expires_at: None,
                remaining_seconds: None,
            },
            Some(record) => {
                let expired = record.is_expired_at(now);
                Self {
                    resource_id: resource_id.to_string(),
                    state: if expired {
                        LockState::Expired
                    } else {
                        LockState::Held
                    },
                    remaining_seconds: (!expired)
                        .then(|| record.expires_at.timestamp() - now.timestamp()),
                    owner_id: Some(record.owner_id),
                    expires_at: Some(record.expires_at),
                }
            }
        }
    }
}

pub struct StatusCommand<'a> {
    controller: &'a LockController,
}

impl<'a> StatusCommand<'a> {
    pub fn new(controller: &'a LockController) -> Result<Self> {
        Ok(Self { controller })
    }

    pub fn execute(&self, resource_id: &str, json: bool) -> Result<()> {
        let record = self.controller.current_record(resource_id)?;
        let report = StatusReport::new(resource_id, record, self.controller.now());

        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        match report.state {
            LockState::Free => {
                println!("{}: {}", report.resource_id.bold(), "free".green());
            }
            LockState::Held => {
                println!(
                    "{}: {} by {}",
                    report.resource_id.bold(),
                    "held".red().bold(),
                    report.owner_id.as_deref().unwrap_or_default()
                );
                if let (Some(expires_at), Some(remaining)) =
                    (report.expires_at, report.remaining_seconds)
                {
                    println!("  expires {} ({remaining}s left)", expires_at.to_rfc3339());
                }
            }
            LockState::Expired => {
                println!(
                    "{}: {} (last held by {})",
                    report.resource_id.bold(),
                    "expired".yellow(),
                    report.owner_id.as_deref().unwrap_or_default()
                );
                if let Some(expires_at) = report.expires_at {
                    println!("  expired {}", expires_at.to_rfc3339());
                }
            }
        }
        Ok(())
    }
}
