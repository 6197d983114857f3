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

use crate::store::{AttributeValue, ExpressionValues, Item, StoreError};
use std::cmp::Ordering;
use std::fmt;

/// Condition expression tree attached to a conditional mutation.
///
/// Rendering wraps every compound operand whose operator differs from its
/// parent in parentheses, so the grouping of the tree is always explicit in
/// the expression text and never left to operator precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    AttributeNotExists(String),
    Equals {
        attribute: String,
        placeholder: String,
    },
    LessThan {
        attribute: String,
        placeholder: String,
    },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    pub fn attribute_not_exists(attribute: impl Into<String>) -> Self {
        Condition::AttributeNotExists(attribute.into())
    }

    pub fn equals(attribute: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Condition::Equals {
            attribute: attribute.into(),
            placeholder: placeholder.into(),
        }
    }

    pub fn less_than(attribute: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Condition::LessThan {
            attribute: attribute.into(),
            placeholder: placeholder.into(),
        }
    }

    pub fn and(self, other: Condition) -> Self {
        Condition::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Condition) -> Self {
        Condition::Or(Box::new(self), Box::new(other))
    }

    /// Evaluates the condition against the current item (`None` when absent).
    ///
    /// Comparisons against a missing attribute are false. A placeholder with no
    /// supplied value is a malformed request.
    pub fn evaluate(
        &self,
        item: Option<&Item>,
        values: &ExpressionValues,
    ) -> Result<bool, StoreError> {
        match self {
            Condition::AttributeNotExists(attribute) => {
                Ok(item.is_none_or(|item| !item.contains_key(attribute)))
            }
            Condition::Equals {
                attribute,
                placeholder,
            } => {
                let expected = resolve(values, placeholder)?;
                Ok(stored(item, attribute).is_some_and(|actual| actual == expected))
            }
            Condition::LessThan {
                attribute,
                placeholder,
            } => {
                let bound = resolve(values, placeholder)?;
                Ok(stored(item, attribute)
                    .and_then(|actual| compare(actual, bound))
                    .is_some_and(Ordering::is_lt))
            }
            Condition::And(left, right) => {
                Ok(left.evaluate(item, values)? && right.evaluate(item, values)?)
            }
            Condition::Or(left, right) => {
                Ok(left.evaluate(item, values)? || right.evaluate(item, values)?)
            }
        }
    }

    fn operator(&self) -> Option<&'static str> {
        match self {
            Condition::And(..) => Some("AND"),
            Condition::Or(..) => Some("OR"),
            _ => None,
        }
    }
}

fn resolve<'a>(
    values: &'a ExpressionValues,
    placeholder: &str,
) -> Result<&'a AttributeValue, StoreError> {
    values.get(placeholder).ok_or_else(|| {
        StoreError::other(format!(
            "condition references {placeholder} but no value was supplied"
        ))
    })
}

fn stored<'a>(item: Option<&'a Item>, attribute: &str) -> Option<&'a AttributeValue> {
    item.and_then(|item| item.get(attribute))
}

fn compare(left: &AttributeValue, right: &AttributeValue) -> Option<Ordering> {
    match (left, right) {
        (AttributeValue::N(a), AttributeValue::N(b)) => Some(a.cmp(b)),
        (AttributeValue::S(a), AttributeValue::S(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, parent: &str, operand: &Condition) -> fmt::Result {
    match operand.operator() {
        Some(operator) if operator != parent => write!(f, "({operand})"),
        _ => write!(f, "{operand}"),
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::AttributeNotExists(attribute) => {
                write!(f, "attribute_not_exists({attribute})")
            }
            Condition::Equals {
                attribute,
                placeholder,
            } => write!(f, "{attribute} = {placeholder}"),
            Condition::LessThan {
                attribute,
                placeholder,
            } => write!(f, "{attribute} < {placeholder}"),
            Condition::And(left, right) => {
                write_operand(f, "AND", left)?;
                f.write_str(" AND ")?;
                write_operand(f, "AND", right)
            }
            Condition::Or(left, right) => {
                write_operand(f, "OR", left)?;
                f.write_str(" OR ")?;
                write_operand(f, "OR", right)
            }
        }
    }
}
