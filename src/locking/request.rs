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

//! Builders for the conditional requests that make up the lock protocol.

use crate::config::LockOptions;
use crate::locking::record::{
    EXPIRES_AT_ATTRIBUTE, NOW_PLACEHOLDER, OWNER_ATTRIBUTE, OWNER_PLACEHOLDER, lock_key,
};
use crate::store::{AttributeValue, Condition, DeleteItemRequest, ExpressionValues, PutItemRequest};
use chrono::{DateTime, Utc};

/// `(attribute_not_exists(pk) AND attribute_not_exists(sk)) OR expiresAt < :now`
pub fn acquire_condition(options: &LockOptions) -> Condition {
    Condition::attribute_not_exists(options.partition_key_attribute.as_str())
        .and(Condition::attribute_not_exists(
            options.sort_key_attribute.as_str(),
        ))
        .or(Condition::less_than(EXPIRES_AT_ATTRIBUTE, NOW_PLACEHOLDER))
}

/// `ownerId = :owner`
pub fn release_condition() -> Condition {
    Condition::equals(OWNER_ATTRIBUTE, OWNER_PLACEHOLDER)
}

/// Put claiming `resource_id` for `owner_id` until `now + lock_timeout`.
///
/// Returns the request together with the expiry it writes, truncated to the
/// whole second the store keeps. An expiry past the representable range
/// saturates.
pub fn acquire_request(
    options: &LockOptions,
    resource_id: &str,
    owner_id: &str,
    now: DateTime<Utc>,
) -> (PutItemRequest, DateTime<Utc>) {
    let expires_at = options
        .lock_timeout()
        .and_then(|timeout| now.checked_add_signed(timeout))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    let expires_at = DateTime::from_timestamp(expires_at.timestamp(), 0).unwrap_or(expires_at);

    let key = lock_key(options, resource_id);
    let mut item = key.to_item();
    item.insert(OWNER_ATTRIBUTE.to_string(), AttributeValue::string(owner_id));
    item.insert(
        EXPIRES_AT_ATTRIBUTE.to_string(),
        AttributeValue::number(expires_at.timestamp()),
    );

    let mut expression_values = ExpressionValues::new();
    expression_values.insert(
        NOW_PLACEHOLDER.to_string(),
        AttributeValue::number(now.timestamp()),
    );

    let request = PutItemRequest {
        table_name: options.table_name.clone(),
        key,
        item,
        condition: acquire_condition(options),
        expression_values,
    };
    (request, expires_at)
}

/// Delete of the lock item for `resource_id`, allowed only for `owner_id`.
pub fn release_request(
    options: &LockOptions,
    resource_id: &str,
    owner_id: &str,
) -> DeleteItemRequest {
    let mut expression_values = ExpressionValues::new();
    expression_values.insert(
        OWNER_PLACEHOLDER.to_string(),
        AttributeValue::string(owner_id),
    );

    DeleteItemRequest {
        table_name: options.table_name.clone(),
        key: lock_key(options, resource_id),
        condition: release_condition(),
        expression_values,
    }
}
