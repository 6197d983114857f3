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

//! Layout of the lock item as stored in the table.

use crate::config::LockOptions;
use crate::store::{AttributeValue, Item, ItemKey};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const LOCK_PARTITION_PREFIX: &str = "lock#";
pub const LOCK_SORT_KEY: &str = "metadata#lock";
pub const OWNER_ATTRIBUTE: &str = "ownerId";
pub const EXPIRES_AT_ATTRIBUTE: &str = "expiresAt";
pub const NOW_PLACEHOLDER: &str = ":now";
pub const OWNER_PLACEHOLDER: &str = ":owner";

/// Key addressing the lock item for `resource_id`.
pub fn lock_key(options: &LockOptions, resource_id: &str) -> ItemKey {
    ItemKey::new(
        options.partition_key_attribute.as_str(),
        format!("{LOCK_PARTITION_PREFIX}{resource_id}"),
        options.sort_key_attribute.as_str(),
        LOCK_SORT_KEY,
    )
}

/// Decoded view of a stored lock item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockRecord {
    pub resource_id: String,
    pub owner_id: String,
    pub expires_at: DateTime<Utc>,
}

impl LockRecord {
    /// Decodes `item`, returning `None` when it lacks any lock attribute.
    pub fn from_item(options: &LockOptions, item: &Item) -> Option<Self> {
        let resource_id = item
            .get(&options.partition_key_attribute)
            .and_then(AttributeValue::as_str)
            .and_then(|value| value.strip_prefix(LOCK_PARTITION_PREFIX))?;
        let owner_id = item.get(OWNER_ATTRIBUTE).and_then(AttributeValue::as_str)?;
        let expires_at = item
            .get(EXPIRES_AT_ATTRIBUTE)
            .and_then(AttributeValue::as_number)
            .and_then(|seconds| Utc.timestamp_opt(seconds, 0).single())?;

        Some(Self {
            resource_id: resource_id.to_string(),
            owner_id: owner_id.to_string(),
            expires_at,
        })
    }

    /// Compared in whole seconds, as the store does. A record whose expiry
    /// second equals the second of `now` is still live.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.timestamp() < now.timestamp()
    }
}

/// Outcome of a single acquisition call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAcquisition {
    Acquired { expires_at: DateTime<Utc> },
    Contended,
}

impl LockAcquisition {
    pub fn is_acquired(&self) -> bool {
        matches!(self, LockAcquisition::Acquired { .. })
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            LockAcquisition::Acquired { expires_at } => Some(*expires_at),
            LockAcquisition::Contended => None,
        }
    }
}

/// Owner identifier unique to this process and call.
pub fn generate_owner_id() -> String {
    format!("{}-{}", std::process::id(), Uuid::new_v4())
}
