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

//! Configuration for the notification pipeline.
//!
//! All limits are injected at construction time rather than read from
//! process-wide state, so tests can simulate "credential present" vs
//! "absent" deterministically. Provider credentials are optional: an
//! absent email credential parks deliveries in the `queued` state instead
//! of failing them.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for the notifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// SQLite location for the ledger (file path, `:memory:`, or URI).
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub push: PushConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

/// Email transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Sender address placed in the `from` header.
    #[serde(default = "default_email_from")]
    pub from: String,

    /// Transactional-mail API endpoint.
    #[serde(default = "default_email_api_url")]
    pub api_url: String,

    /// Provider credential; `None` parks deliveries as `queued`.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Push transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Multicast endpoint of the push service.
    #[serde(default = "default_push_api_url")]
    pub api_url: String,

    /// Server credential for the push service.
    #[serde(default)]
    pub server_key: Option<String>,
}

/// Pacing and retry parameters for outbound provider calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Minimum interval between outbound calls (default ~1.5 req/s).
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Attempts per operation, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay, doubled per attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Backoff ceiling.
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,

    /// Upper bound of the random jitter added to each backoff delay.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

/// Transport batching limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum ids per `IN` query against the ledger.
    #[serde(default = "default_in_query_chunk")]
    pub in_query_chunk: usize,

    /// Maximum device tokens per multicast call.
    #[serde(default = "default_multicast_limit")]
    pub multicast_limit: usize,

    /// Maximum tokens per array-removal mutation.
    #[serde(default = "default_array_mutation_limit")]
    pub array_mutation_limit: usize,
}

fn default_database_url() -> String {
    "aviso.db".to_string()
}

fn default_email_from() -> String {
    "noreply@example.org".to_string()
}

fn default_email_api_url() -> String {
    "https://api.resend.com/emails".to_string()
}

fn default_push_api_url() -> String {
    "https://fcm.googleapis.com/fcm/send".to_string()
}

fn default_min_interval_ms() -> u64 {
    // 1.5 requests per second
    666
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_cap_ms() -> u64 {
    10_000
}

fn default_jitter_ms() -> u64 {
    250
}

fn default_in_query_chunk() -> usize {
    10
}

fn default_multicast_limit() -> usize {
    500
}

fn default_array_mutation_limit() -> usize {
    20
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            email: EmailConfig::default(),
            push: PushConfig::default(),
            rate_limit: RateLimitConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from: default_email_from(),
            api_url: default_email_api_url(),
            api_key: None,
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            api_url: default_push_api_url(),
            server_key: None,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            in_query_chunk: default_in_query_chunk(),
            multicast_limit: default_multicast_limit(),
            array_mutation_limit: default_array_mutation_limit(),
        }
    }
}

impl RateLimitConfig {
    /// Minimum inter-call interval as a `Duration`.
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

impl NotifierConfig {
    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Applies environment overrides for deploy-time values.
    ///
    /// Reads a `.env` file if present, then `AVISO_DATABASE_URL`,
    /// `AVISO_EMAIL_API_KEY` and `AVISO_PUSH_SERVER_KEY`.
    pub fn with_env_overrides(mut self) -> Self {
        dotenvy::dotenv().ok();
        if let Ok(url) = std::env::var("AVISO_DATABASE_URL") {
            self.database_url = url;
        }
        if let Ok(key) = std::env::var("AVISO_EMAIL_API_KEY") {
            self.email.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("AVISO_PUSH_SERVER_KEY") {
            self.push.server_key = Some(key);
        }
        self
    }
}
