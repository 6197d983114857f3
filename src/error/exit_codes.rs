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

pub fn get_exit_code(error: &LockError) -> i32 {
    match error {
        LockError::InvalidArgument(_) | LockError::InvalidConfig(_) | LockError::Config(_) => 2,

        LockError::Contended { .. } | LockError::NotOwner { .. } => 3,

        LockError::Store { source, .. } if source.kind() == StoreErrorKind::Cancelled => 130,
        LockError::Store { .. } => 20,

        LockError::Cancelled { .. } => 130, // 128 + SIGINT, as shells report Ctrl-C

        _ => 1,
    }
}
