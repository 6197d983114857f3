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

use crate::error::LockError;
use crate::store::StoreErrorKind;
use std::fmt;

pub struct ErrorContext<'a> {
    pub error: &'a LockError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl<'a> ErrorContext<'a> {
    pub fn new(error: &'a LockError) -> Self {
        let (suggestion, details) = match error {
            LockError::InvalidArgument(_) => {
                let suggestion =
                    Some("Resource and owner identifiers must contain non-whitespace characters."
                        .to_string());
                (suggestion, None)
            }
            LockError::InvalidConfig(msg) => {
                let suggestion = Some(format!(
                    "Check tablelock.toml and any TABLELOCK__* environment variables (e.g. \
                     {}).",
                    env_example()
                ));
                let details = Some(format!("Rejected setting: {msg}"));
                (suggestion, details)
            }
            LockError::Config(err) => {
                let suggestion = Some(
                    "Set table_name in tablelock.toml, pass --table, or export \
                     TABLELOCK__TABLE_NAME."
                        .to_string(),
                );
                let details = Some(format!("Configuration could not be loaded: {err}"));
                (suggestion, details)
            }
            LockError::Store { source, .. } => {
                let suggestion = match source.kind() {
                    StoreErrorKind::Throttled
                    | StoreErrorKind::RateLimited
                    | StoreErrorKind::TransientServerError => Some(
                        "The store reported a transient fault. Enable retries with \
                         retry.enabled = true or try again shortly."
                            .to_string(),
                    ),
                    StoreErrorKind::Cancelled => {
                        Some("The request was cancelled before it reached the store.".to_string())
                    }
                    _ => Some(
                        "Verify the store directory is readable and writable, then retry."
                            .to_string(),
                    ),
                };
                let details = Some(format!("Store error ({}): {}", source.kind(), source.message()));
                (suggestion, details)
            }
            LockError::Cancelled { attempts, .. } => {
                let details = Some(format!(
                    "{attempts} attempt(s) were issued; the outcome of the last one is unknown."
                ));
                (None, details)
            }
            LockError::Contended { resource, holder } => {
                let suggestion = Some(format!(
                    "Wait for the current holder to release it, or run 'tablelock status \
                     {resource}' to see when it expires."
                ));
                let details = holder
                    .as_ref()
                    .map(|holder| format!("Current holder: {holder}"));
                (suggestion, details)
            }
            LockError::NotOwner { resource, .. } => {
                let suggestion = Some(format!(
                    "The lock may have expired and been taken over. Run 'tablelock status \
                     {resource}' to inspect it."
                ));
                (suggestion, None)
            }
            LockError::StoreDirectoryNotFound => {
                let suggestion = Some(
                    "Pass --store-dir to choose where lock tables are kept.".to_string(),
                );
                (suggestion, None)
            }
            LockError::Io(io_err) => {
                let suggestion = match io_err.kind() {
                    std::io::ErrorKind::PermissionDenied => {
                        Some("Check permissions on the store directory.".to_string())
                    }
                    std::io::ErrorKind::NotFound => Some(
                        "Ensure the command or path exists and is spelled correctly.".to_string(),
                    ),
                    _ => None,
                };
                let details = Some(format!("I/O error: {io_err}"));
                (suggestion, details)
            }
            _ => (None, None),
        };

        ErrorContext {
            error,
            suggestion,
            details,
        }
    }

    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestion = Some(suggestion);
        self
    }

    pub fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }
}

fn env_example() -> &'static str {
    if cfg!(windows) {
        "set TABLELOCK__RETRY__ENABLED=true"
    } else {
        "export TABLELOCK__RETRY__ENABLED=true"
    }
}

impl<'a> fmt::Display for ErrorContext<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\n\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}
