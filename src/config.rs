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
use crate::store::file::is_valid_table_name;
use chrono::TimeDelta;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "tablelock.toml";
pub const ENV_PREFIX: &str = "TABLELOCK";
const ENV_SEPARATOR: &str = "__";

const DEFAULT_LOCK_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_PARTITION_KEY_ATTRIBUTE: &str = "pk";
const DEFAULT_SORT_KEY_ATTRIBUTE: &str = "sk";
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 100;
const DEFAULT_MAX_DELAY_MS: u64 = 5_000;
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
const DEFAULT_JITTER_FACTOR: f64 = 0.25;

/// Attributes the lock protocol writes itself; key attributes may not reuse them.
const RESERVED_ATTRIBUTES: [&str; 2] = ["ownerId", "expiresAt"];

/// Settings for a lock table and the protocol run against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockOptions {
    pub table_name: String,

    #[serde(default = "default_lock_timeout_seconds")]
    pub lock_timeout_seconds: u64,

    #[serde(default = "default_partition_key_attribute")]
    pub partition_key_attribute: String,

    #[serde(default = "default_sort_key_attribute")]
    pub sort_key_attribute: String,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// Backoff settings for lock acquisition. Retrying is off unless enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_use_jitter")]
    pub use_jitter: bool,

    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            use_jitter: default_use_jitter(),
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

fn default_lock_timeout_seconds() -> u64 {
    DEFAULT_LOCK_TIMEOUT_SECONDS
}

fn default_partition_key_attribute() -> String {
    DEFAULT_PARTITION_KEY_ATTRIBUTE.to_string()
}

fn default_sort_key_attribute() -> String {
    DEFAULT_SORT_KEY_ATTRIBUTE.to_string()
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

fn default_backoff_multiplier() -> f64 {
    DEFAULT_BACKOFF_MULTIPLIER
}

fn default_use_jitter() -> bool {
    true
}

fn default_jitter_factor() -> f64 {
    DEFAULT_JITTER_FACTOR
}

/// Values that take precedence over both the file and the environment.
#[derive(Debug, Clone, Default)]
pub struct OptionOverrides {
    pub table_name: Option<String>,
    pub lock_timeout_seconds: Option<u64>,
}

impl LockOptions {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            lock_timeout_seconds: DEFAULT_LOCK_TIMEOUT_SECONDS,
            partition_key_attribute: default_partition_key_attribute(),
            sort_key_attribute: default_sort_key_attribute(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_lock_timeout_seconds(mut self, seconds: u64) -> Self {
        self.lock_timeout_seconds = seconds;
        self
    }

    /// Loads options from `path` (or `tablelock.toml` in the working directory
    /// when present), then `TABLELOCK__*` environment variables, then
    /// `overrides`.
    pub fn load(path: Option<&Path>, overrides: &OptionOverrides) -> Result<Self> {
        Self::load_from_sources(path, None, overrides)
    }

    /// Same as [`LockOptions::load`] but reads environment values from `env`
    /// instead of the process environment when given.
    pub fn load_from_sources(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
        overrides: &OptionOverrides,
    ) -> Result<Self> {
        let file = match path {
            Some(path) => {
                log::debug!("Loading lock options from {}", path.display());
                File::from(path).required(true)
            }
            None => File::from(Path::new(CONFIG_FILE_NAME)).required(false),
        };

        let mut builder = Config::builder().add_source(file).add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(env),
        );

        if let Some(table_name) = &overrides.table_name {
            builder = builder.set_override("table_name", table_name.as_str())?;
        }
        if let Some(seconds) = overrides.lock_timeout_seconds {
            builder = builder.set_override("lock_timeout_seconds", seconds)?;
        }

        let options: LockOptions = builder.build()?.try_deserialize()?;
        options.validate()?;
        Ok(options)
    }

    /// Rejects settings the lock protocol cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_table_name(&self.table_name) {
            return Err(LockError::InvalidConfig(format!(
                "table_name '{}' must be 3-255 characters from [A-Za-z0-9_.-]",
                self.table_name
            )));
        }

        for (label, attribute) in [
            ("partition_key_attribute", &self.partition_key_attribute),
            ("sort_key_attribute", &self.sort_key_attribute),
        ] {
            if attribute.trim().is_empty() {
                return Err(LockError::InvalidConfig(format!("{label} must not be empty")));
            }
            if RESERVED_ATTRIBUTES.contains(&attribute.as_str()) {
                return Err(LockError::InvalidConfig(format!(
                    "{label} '{attribute}' collides with a lock record attribute"
                )));
            }
        }

        if self.partition_key_attribute == self.sort_key_attribute {
            return Err(LockError::InvalidConfig(format!(
                "partition_key_attribute and sort_key_attribute must differ (both '{}')",
                self.partition_key_attribute
            )));
        }

        if self.lock_timeout_seconds == 0 {
            return Err(LockError::InvalidConfig(
                "lock_timeout_seconds must be at least 1".to_string(),
            ));
        }
        if self.lock_timeout().is_none() {
            return Err(LockError::InvalidConfig(format!(
                "lock_timeout_seconds {} is out of range",
                self.lock_timeout_seconds
            )));
        }

        self.retry.validate()
    }

    /// Hold time granted by each successful acquisition.
    pub fn lock_timeout(&self) -> Option<TimeDelta> {
        i64::try_from(self.lock_timeout_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(LockError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(LockError::InvalidConfig(format!(
                "retry.backoff_multiplier must be a finite number of at least 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(LockError::InvalidConfig(format!(
                "retry.jitter_factor must be between 0.0 and 1.0, got {}",
                self.jitter_factor
            )));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(LockError::InvalidConfig(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        Ok(())
    }
}
