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

//! Storage boundary for lock records.
//!
//! A [`LockStore`] exposes conditional put and conditional delete on a single
//! item. The condition travels with each request as a typed [`Condition`] tree
//! together with the placeholder values it references, so an adapter can
//! either render the expression for a remote table service or evaluate it
//! locally while holding its own per-item exclusion.

pub mod condition;
pub mod file;
pub mod memory;

pub use condition::Condition;
pub use file::FileLockStore;
pub use memory::MemoryLockStore;

use crate::locking::cancellation::CancellationToken;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// A single typed attribute value, encoded the way table services tag them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    #[serde(rename = "N")]
    N(i64),
}

impl AttributeValue {
    pub fn string(value: impl Into<String>) -> Self {
        AttributeValue::S(value.into())
    }

    pub fn number(value: i64) -> Self {
        AttributeValue::N(value)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::S(value) => Some(value),
            AttributeValue::N(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            AttributeValue::N(value) => Some(*value),
            AttributeValue::S(_) => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::S(value) => write!(f, "\"{value}\""),
            AttributeValue::N(value) => write!(f, "{value}"),
        }
    }
}

/// Attribute name to value map describing a stored item.
pub type Item = BTreeMap<String, AttributeValue>;

/// Placeholder (`:name`) to value map referenced by a condition.
pub type ExpressionValues = BTreeMap<String, AttributeValue>;

/// Composite primary key of an item: partition key plus sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub partition_attribute: String,
    pub partition_value: String,
    pub sort_attribute: String,
    pub sort_value: String,
}

impl ItemKey {
    pub fn new(
        partition_attribute: impl Into<String>,
        partition_value: impl Into<String>,
        sort_attribute: impl Into<String>,
        sort_value: impl Into<String>,
    ) -> Self {
        Self {
            partition_attribute: partition_attribute.into(),
            partition_value: partition_value.into(),
            sort_attribute: sort_attribute.into(),
            sort_value: sort_value.into(),
        }
    }

    /// Key attributes as they appear on the stored item.
    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert(
            self.partition_attribute.clone(),
            AttributeValue::string(&self.partition_value),
        );
        item.insert(
            self.sort_attribute.clone(),
            AttributeValue::string(&self.sort_value),
        );
        item
    }

    pub(crate) fn values(&self) -> (String, String) {
        (self.partition_value.clone(), self.sort_value.clone())
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition_value, self.sort_value)
    }
}

/// Conditional put: replace the whole item if `condition` holds.
#[derive(Debug, Clone, PartialEq)]
pub struct PutItemRequest {
    pub table_name: String,
    pub key: ItemKey,
    pub item: Item,
    pub condition: Condition,
    pub expression_values: ExpressionValues,
}

impl PutItemRequest {
    /// Condition rendered in the table service's expression language.
    pub fn condition_expression(&self) -> String {
        self.condition.to_string()
    }
}

/// Conditional delete: remove the item if `condition` holds.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteItemRequest {
    pub table_name: String,
    pub key: ItemKey,
    pub condition: Condition,
    pub expression_values: ExpressionValues,
}

impl DeleteItemRequest {
    pub fn condition_expression(&self) -> String {
        self.condition.to_string()
    }
}

/// Closed classification of failures reported by a store adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The request's condition evaluated to false.
    ConditionalCheckFailed,
    /// Provisioned throughput exceeded.
    Throttled,
    /// Account-level request rate exceeded.
    RateLimited,
    /// Transient fault on the service side.
    TransientServerError,
    /// The adapter observed cancellation before issuing the mutation.
    Cancelled,
    Other,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StoreErrorKind::ConditionalCheckFailed => "conditional check failed",
            StoreErrorKind::Throttled => "throughput exceeded",
            StoreErrorKind::RateLimited => "request limit exceeded",
            StoreErrorKind::TransientServerError => "transient server error",
            StoreErrorKind::Cancelled => "cancelled",
            StoreErrorKind::Other => "store error",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct StoreError {
    kind: StoreErrorKind,
    message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn conditional_check_failed(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::ConditionalCheckFailed, message)
    }

    pub fn cancelled() -> Self {
        Self::new(
            StoreErrorKind::Cancelled,
            "request abandoned before it was issued",
        )
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Other, message)
    }

    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_conditional_check_failed(&self) -> bool {
        self.kind == StoreErrorKind::ConditionalCheckFailed
    }
}

/// Key-value table offering atomic, per-item conditional mutations.
///
/// Implementations must evaluate the request condition and apply the mutation
/// as one linearizable step for the addressed item. A false condition is
/// reported as [`StoreErrorKind::ConditionalCheckFailed`].
pub trait LockStore: Send + Sync {
    fn put_item(
        &self,
        request: &PutItemRequest,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError>;

    fn delete_item(
        &self,
        request: &DeleteItemRequest,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError>;

    /// Reads the current item, if any. Used for inspection only; the lock
    /// protocol never reads before writing.
    fn get_item(&self, table_name: &str, key: &ItemKey) -> Result<Option<Item>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_values_serialize_with_type_tags() {
        let mut item = Item::new();
        item.insert("ownerId".to_string(), AttributeValue::string("a"));
        item.insert("expiresAt".to_string(), AttributeValue::number(42));

        let json = serde_json::to_string(&item).unwrap();
        assert_eq!(json, r#"{"expiresAt":{"N":42},"ownerId":{"S":"a"}}"#);
    }

    #[test]
    fn key_to_item_carries_both_key_attributes() {
        let key = ItemKey::new("pk", "lock#job", "sk", "metadata#lock");
        let item = key.to_item();
        assert_eq!(item.get("pk"), Some(&AttributeValue::string("lock#job")));
        assert_eq!(
            item.get("sk"),
            Some(&AttributeValue::string("metadata#lock"))
        );
    }

    #[test]
    fn store_error_display_includes_kind() {
        let err = StoreError::new(StoreErrorKind::Throttled, "slow down");
        assert_eq!(err.to_string(), "throughput exceeded: slow down");
        assert!(!err.is_conditional_check_failed());
    }
}
