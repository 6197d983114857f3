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

use crate::config::RetryConfig;
use crate::locking::cancellation::CancellationToken;
use crate::retry::{RetryError, RetryPolicy};
use crate::store::StoreError;
use log::debug;
use rand::Rng;
use std::time::Duration;

/// Bounded exponential backoff with optional additive jitter.
///
/// The delay after failed attempt `n` is `min(max_delay, base_delay *
/// multiplier^(n-1))`. Jitter adds a uniform amount in `[0, factor * delay]`
/// on top, so it never shortens a wait.
#[derive(Debug, Clone)]
pub struct ExponentialBackoffRetry {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter_factor: Option<f64>,
}

impl ExponentialBackoffRetry {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            multiplier: config.backoff_multiplier,
            jitter_factor: config.use_jitter.then_some(config.jitter_factor),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after failed attempt `attempt` before jitter is applied.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exponent = f64::from(attempt.saturating_sub(1));
        let nanos = self.base_delay.as_nanos() as f64 * self.multiplier.powf(exponent);
        if !nanos.is_finite() || nanos >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        Duration::from_nanos(nanos.round() as u64).min(self.max_delay)
    }

    /// Delay after failed attempt `attempt`, including jitter when enabled.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for(attempt);
        match self.jitter_factor {
            Some(factor) if factor > 0.0 && !delay.is_zero() => {
                let range = delay.as_secs_f64() * factor;
                let extra = rand::thread_rng().gen_range(0.0..=range);
                delay.saturating_add(Duration::try_from_secs_f64(extra).unwrap_or_default())
            }
            _ => delay,
        }
    }
}

impl RetryPolicy for ExponentialBackoffRetry {
    fn execute<T, F, P>(
        &self,
        mut operation: F,
        should_retry: P,
        cancel: &CancellationToken,
    ) -> Result<T, RetryError>
    where
        F: FnMut(u32) -> Result<T, StoreError>,
        P: Fn(&StoreError) -> bool,
    {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                debug!("Cancelled before attempt {}", attempt + 1);
                return Err(RetryError::Cancelled { attempts: attempt });
            }

            attempt += 1;
            let err = match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !should_retry(&err) {
                debug!("Attempt {attempt} failed with non-retryable error: {err}");
                return Err(RetryError::Operation(err));
            }
            if attempt >= self.max_attempts {
                debug!("Attempt {attempt} failed and no attempts remain: {err}");
                return Err(RetryError::Operation(err));
            }

            let delay = self.delay_for(attempt);
            debug!(
                "Attempt {attempt}/{} failed ({err}); retrying in {delay:?}",
                self.max_attempts
            );
            if !cancel.sleep(delay) {
                debug!("Cancelled while waiting to retry after attempt {attempt}");
                return Err(RetryError::Cancelled { attempts: attempt });
            }
        }
    }
}
