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

use log::warn;
use signal_hook::SigId;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::flag;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

#[cfg(windows)]
use signal_hook::consts::signal::SIGBREAK;

/// Upper bound on how long a sleeper goes without re-reading the flag. Signal
/// handlers can only flip the flag, so this bounds how late they are noticed.
const POLL_SLICE: Duration = Duration::from_millis(25);

#[derive(Debug)]
struct Signal {
    flag: Arc<AtomicBool>,
    gate: Mutex<()>,
    wake: Condvar,
}

/// Token used to abandon lock operations between store attempts.
///
/// Clones share state: cancelling any clone cancels all of them and wakes
/// every thread currently inside [`CancellationToken::sleep`].
#[derive(Debug, Clone)]
pub struct CancellationToken {
    signal: Arc<Signal>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::from_shared(Arc::new(AtomicBool::new(false)))
    }

    pub(crate) fn from_shared(flag: Arc<AtomicBool>) -> Self {
        Self {
            signal: Arc::new(Signal {
                flag,
                gate: Mutex::new(()),
                wake: Condvar::new(),
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.flag.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.signal.flag.store(true, Ordering::SeqCst);
        let _gate = self
            .signal
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.signal.wake.notify_all();
    }

    /// Sleeps for `duration` unless cancelled first.
    ///
    /// Returns `true` when the full duration elapsed and `false` as soon as
    /// cancellation is observed.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        let mut gate = self
            .signal
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        loop {
            if self.is_cancelled() {
                return false;
            }

            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return true;
                    }
                    (deadline - now).min(POLL_SLICE)
                }
                None => POLL_SLICE,
            };

            gate = match self.signal.wake.wait_timeout(gate, wait) {
                Ok((gate, _)) => gate,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct CancellationRegistry {
    flag: Arc<AtomicBool>,
    _handles: Vec<SigId>,
}

impl CancellationRegistry {
    fn new() -> Self {
        let flag = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::new();

        for signal in registered_signals() {
            match flag::register(*signal, flag.clone()) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    warn!("Failed to register cancellation handler for signal {signal}: {err}")
                }
            }
        }

        Self {
            flag,
            _handles: handles,
        }
    }

    fn token(&self) -> CancellationToken {
        CancellationToken::from_shared(self.flag.clone())
    }
}

fn registered_signals() -> &'static [i32] {
    #[cfg(windows)]
    {
        static SIGNALS: [i32; 3] = [SIGINT, SIGTERM, SIGBREAK];
        &SIGNALS
    }

    #[cfg(not(windows))]
    {
        static SIGNALS: [i32; 2] = [SIGINT, SIGTERM];
        &SIGNALS
    }
}

static GLOBAL_REGISTRY: OnceLock<CancellationRegistry> = OnceLock::new();

/// Returns a cancellation token backed by global SIGINT/SIGTERM handlers.
pub fn global_token() -> CancellationToken {
    GLOBAL_REGISTRY
        .get_or_init(CancellationRegistry::new)
        .token()
}
