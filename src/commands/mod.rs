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

pub mod acquire;
pub mod config;
pub mod release;
pub mod run;
pub mod status;

use crate::error::LockError;
use crate::locking::LockController;

/// Builds the error reported when `resource_id` is held by someone else,
/// naming the holder when the store can still tell us.
pub(crate) fn contended(controller: &LockController, resource_id: &str) -> LockError {
    let holder = controller
        .current_record(resource_id)
        .ok()
        .flatten()
        .map(|record| record.owner_id);
    LockError::Contended {
        resource: resource_id.to_string(),
        holder,
    }
}
