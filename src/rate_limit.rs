/*
 *  Copyright 2025 Aviso Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Outbound call pacing and bounded retries.
//!
//! The rate limiter serializes all callers against a single schedule of
//! send slots: each caller takes the next free slot under a mutex and
//! sleeps until it arrives, so the effective call rate never exceeds the
//! configured ceiling no matter how many logical tasks call concurrently.
//! A failed operation has already advanced the schedule, so it can never
//! stall later callers.
//!
//! `retry_with_backoff` layers error classification on top: rate-limited
//! and transient failures retry with exponential backoff and jitter,
//! fatal failures re-raise immediately.

use rand::Rng;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;

/// Classification of a transport failure for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// HTTP 429 or a provider-specific rate-limit signal
    RateLimited,
    /// 5xx, timeouts, connection resets, DNS failures
    Transient,
    /// Everything else; retrying will not help
    Fatal,
}

/// Implemented by transport error types so the limiter can decide
/// whether a retry is worthwhile.
pub trait Classify {
    fn classify(&self) -> RetryClass;
}

impl Classify for crate::error::EmailSendError {
    fn classify(&self) -> RetryClass {
        use crate::error::EmailSendError;
        match self {
            EmailSendError::RateLimited(_) => RetryClass::RateLimited,
            EmailSendError::Network(_) => RetryClass::Transient,
            EmailSendError::Api { status, .. } if *status == 429 => RetryClass::RateLimited,
            EmailSendError::Api { status, .. } if *status >= 500 => RetryClass::Transient,
            EmailSendError::Api { .. } => RetryClass::Fatal,
        }
    }
}

impl Classify for crate::error::PushTransportError {
    fn classify(&self) -> RetryClass {
        use crate::error::PushTransportError;
        match self {
            PushTransportError::Network(_) => RetryClass::Transient,
            PushTransportError::Api { status, .. } if *status == 429 => RetryClass::RateLimited,
            PushTransportError::Api { status, .. } if *status >= 500 => RetryClass::Transient,
            PushTransportError::Api { .. } => RetryClass::Fatal,
            PushTransportError::NotConfigured => RetryClass::Fatal,
        }
    }
}

/// Serializes outbound provider calls to a fixed rate.
pub struct RateLimiter {
    config: RateLimitConfig,
    /// Next free send slot; `None` until the first call.
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            next_slot: Mutex::new(None),
        }
    }

    /// Suspends the caller until its send slot arrives.
    ///
    /// Safe to call from any number of concurrent tasks; slots are
    /// assigned in lock-acquisition order and spaced by the configured
    /// minimum interval.
    pub async fn throttle(&self) {
        let deadline = {
            let mut slot = self.next_slot.lock().await;
            let now = Instant::now();
            let deadline = match *slot {
                Some(at) if at > now => at,
                _ => now,
            };
            *slot = Some(deadline + self.config.min_interval());
            deadline
        };
        tokio::time::sleep_until(deadline).await;
    }

    /// Calls `op` through the throttle, retrying recoverable failures.
    ///
    /// Rate-limited and transient errors back off exponentially (base
    /// delay doubling per attempt, capped, plus random jitter) until the
    /// configured attempt budget is spent; the last error is then
    /// re-raised. Fatal errors re-raise immediately.
    pub async fn retry_with_backoff<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        E: Classify + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            self.throttle().await;
            attempt += 1;

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let class = e.classify();
                    if class == RetryClass::Fatal || attempt >= max_attempts {
                        return Err(e);
                    }
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after {} error: {}",
                        if class == RetryClass::RateLimited {
                            "rate-limit"
                        } else {
                            "transient"
                        },
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Exponential backoff with jitter for the given (1-based) attempt.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self
            .config
            .backoff_base_ms
            .saturating_mul(1u64 << exp)
            .min(self.config.backoff_cap_ms);
        let jitter = if self.config.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.config.jitter_ms)
        } else {
            0
        };
        debug!(attempt, base_ms = base, jitter_ms = jitter, "Computed backoff delay");
        Duration::from_millis(base + jitter)
    }
}
