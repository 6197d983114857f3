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

use clap::{Parser, Subcommand};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tablelock::commands::acquire::AcquireCommand;
use tablelock::commands::config::ConfigCommand;
use tablelock::commands::release::ReleaseCommand;
use tablelock::commands::run::RunCommand;
use tablelock::commands::status::StatusCommand;
use tablelock::config::{LockOptions, OptionOverrides};
use tablelock::error::{LockError, Result, format_error_with_color, get_exit_code};
use tablelock::locking::{LockController, global_token};
use tablelock::logging;
use tablelock::store::FileLockStore;

#[derive(Parser)]
#[command(name = "tablelock")]
#[command(author, version, about = "Expiring locks over a conditional-write table", long_about = None)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (defaults to ./tablelock.toml when present)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Directory holding the lock tables
    #[arg(long, value_name = "DIR", global = true)]
    store_dir: Option<PathBuf>,

    /// Table name, overriding configuration
    #[arg(long, value_name = "NAME", global = true)]
    table: Option<String>,

    /// Lock hold time in seconds, overriding configuration
    #[arg(long, value_name = "SECONDS", global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire a lock and keep it until it expires or is released
    Acquire {
        /// Resource to lock
        resource: String,

        /// Owner identifier (generated when omitted)
        #[arg(long)]
        owner: Option<String>,

        /// Print only the owner identifier
        #[arg(short, long)]
        quiet: bool,
    },

    /// Release a lock held by the given owner
    Release {
        /// Resource to unlock
        resource: String,

        /// Owner identifier used when acquiring
        #[arg(long)]
        owner: String,
    },

    /// Show who holds a lock and until when
    Status {
        /// Resource to inspect
        resource: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Run a command while holding a lock
    #[command(long_about = "Run a command while holding a lock

The lock is released when the command exits. Exits with status 3 without
running the command when another owner holds the lock.

Example:
  tablelock --table jobs run nightly-report -- ./report.sh --full")]
    Run {
        /// Resource to lock
        resource: String,

        /// Owner identifier (generated when omitted)
        #[arg(long)]
        owner: Option<String>,

        /// Command and arguments to run
        #[arg(last = true, required = true, value_name = "COMMAND")]
        command: Vec<String>,
    },

    /// Print the effective configuration
    Config,
}

fn resolve_store_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(dir) => Ok(dir.to_path_buf()),
        None => dirs::data_dir()
            .map(|dir| dir.join("tablelock"))
            .ok_or(LockError::StoreDirectoryNotFound),
    }
}

fn exit_with_error(error: &LockError) -> ! {
    eprintln!(
        "{}",
        format_error_with_color(error, io::stderr().is_terminal())
    );
    std::process::exit(get_exit_code(error));
}

fn main() {
    let cli = Cli::parse();

    logging::setup_logger(cli.verbose);

    let overrides = OptionOverrides {
        table_name: cli.table.clone(),
        lock_timeout_seconds: cli.timeout,
    };
    let options = match LockOptions::load(cli.config.as_deref(), &overrides) {
        Ok(options) => options,
        Err(e) => exit_with_error(&e),
    };

    let result: Result<i32> = (|| {
        if let Commands::Config = cli.command {
            ConfigCommand::new(&options)?.execute()?;
            return Ok(0);
        }

        let store_dir = resolve_store_dir(cli.store_dir.as_deref())?;
        let controller = LockController::new(Arc::new(FileLockStore::new(store_dir)), options)?;
        let cancel = global_token();

        match cli.command {
            Commands::Acquire {
                resource,
                owner,
                quiet,
            } => {
                let command = AcquireCommand::new(&controller, cancel)?;
                command.execute(&resource, owner.as_deref(), quiet)?;
                Ok(0)
            }
            Commands::Release { resource, owner } => {
                let command = ReleaseCommand::new(&controller, cancel)?;
                command.execute(&resource, &owner)?;
                Ok(0)
            }
            Commands::Status { resource, json } => {
                let command = StatusCommand::new(&controller)?;
                command.execute(&resource, json)?;
                Ok(0)
            }
            Commands::Run {
                resource,
                owner,
                command,
            } => {
                let run = RunCommand::new(&controller, cancel)?;
                run.execute(&resource, owner.as_deref(), &command)
            }
            Commands::Config => Ok(0),
        }
    })();

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => exit_with_error(&e),
    }
}
