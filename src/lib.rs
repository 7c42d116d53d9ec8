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

//! # Aviso
//!
//! Notification fan-out and delivery for a school community app.
//! Families and staff are notified of new institutional content through
//! mobile push and transactional email, with each recipient notified at
//! most once per event even under duplicate delivery, provider rate
//! limits and stale device tokens.
//!
//! ## Architecture
//!
//! - [`resolver::RecipientResolver`] expands a logical audience
//!   (explicit list, global roles, cohort, activity) into a deduplicated
//!   set of user ids, going through child→guardian indirection.
//! - [`lock::LockManager`] acquires a create-only lock per event so
//!   redelivered events produce no duplicate side effects.
//! - [`push::PushDispatcher`] multicasts to device tokens in bounded
//!   batches and removes tokens the transport reports invalid.
//! - [`email::EmailPipeline`] delivers rate-limited email with a
//!   per-recipient status row; `sent` rows are never retried.
//! - [`handlers::Notifier`] composes the stages behind one `handle`
//!   entry point, one handler per domain event.
//!
//! All durable state lives in a SQLite ledger accessed through
//! [`dal::DAL`]; every mutation is an atomic merge, compare-and-set or
//! create-only insert so concurrent handler invocations cannot clobber
//! each other.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use aviso::config::NotifierConfig;
//! use aviso::database::Database;
//! use aviso::handlers::{EventEnvelope, EventKind, Notifier};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = NotifierConfig::default().with_env_overrides();
//! let database = Database::new(&config.database_url);
//! database.run_migrations().await?;
//!
//! let notifier = Notifier::new(database, config);
//! let envelope = EventEnvelope::created(
//!     EventKind::AnnouncementCreated,
//!     "ann-42",
//!     json!({
//!         "title": "Open day on Saturday",
//!         "body": "Doors open at 10.",
//!         "audience": {"kind": "cohort", "key": "room-2"},
//!         "send_by_email": true
//!     }),
//! );
//! notifier.handle(&envelope).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dal;
pub mod database;
pub mod email;
pub mod error;
pub mod handlers;
pub mod lock;
pub mod models;
pub mod payload;
pub mod push;
pub mod rate_limit;
pub mod resolver;

pub use config::NotifierConfig;
pub use database::Database;
pub use error::{HandlerError, LedgerError};
pub use handlers::{EventEnvelope, EventKind, Notifier};
pub use payload::NotificationPayload;

/// Initializes tracing for binaries and examples.
///
/// Honors `RUST_LOG`; defaults to info-level output for this crate.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("aviso=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
