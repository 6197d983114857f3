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

mod context;
mod exit_codes;
mod format;

pub use context::ErrorContext;
pub use exit_codes::get_exit_code;
pub use format::{format_error_chain, format_error_with_color};

use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Lock store request for '{resource}' failed: {source}")]
    Store {
        resource: String,
        #[source]
        source: StoreError,
    },

    #[error("Lock operation on '{resource}' was cancelled after {attempts} attempt(s)")]
    Cancelled { resource: String, attempts: u32 },

    #[error("Lock '{resource}' is held by another owner")]
    Contended {
        resource: String,
        holder: Option<String>,
    },

    #[error("Owner '{owner}' does not hold lock '{resource}'")]
    NotOwner { resource: String, owner: String },

    #[error("Store directory could not be determined")]
    StoreDirectoryNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::ser::Error),
}

impl LockError {
    pub(crate) fn store(resource: &str, source: StoreError) -> Self {
        LockError::Store {
            resource: resource.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LockError>;
