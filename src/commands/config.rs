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

use crate::config::LockOptions;
use crate::error::Result;

pub struct ConfigCommand<'a> {
    options: &'a LockOptions,
}

impl<'a> ConfigCommand<'a> {
    pub fn new(options: &'a LockOptions) -> Result<Self> {
        Ok(Self { options })
    }

    /// Prints the options in effect after file, environment and flag layering.
    pub fn execute(&self) -> Result<()> {
        print!("{}", self.options.to_toml()?);
        Ok(())
    }
}
