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

//! Error types for the notification pipeline.
//!
//! Failures are contained at the smallest reasonable unit: a single
//! recipient's email failure is recorded in its status row and never
//! surfaces as an error from the pipeline; these types cover the failures
//! that do propagate (ledger access, malformed payloads, transport-level
//! infrastructure errors).

use thiserror::Error;

/// Errors raised by ledger (database) access.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Failed to check out a connection from the pool
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// The pooled interact closure panicked or was aborted
    #[error("Database interaction error: {0}")]
    Interact(String),

    /// Query execution failed
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// A JSON column could not be parsed or serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while parsing an event payload.
///
/// Fatal to the single handler invocation only; no partial state is
/// corrupted because parsing happens before any side effect.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Missing required field '{field}' in {entity} payload")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },
}

/// Errors raised by the lock manager.
///
/// Note that "lock already exists" is not an error: `acquire` returns
/// `Ok(false)` for that case. Anything here means the lock outcome is
/// unknown and the caller should abort rather than proceed unguarded.
#[derive(Error, Debug)]
pub enum LockError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors raised by recipient resolution.
///
/// Individual entity lookups that fail are logged and skipped; this type
/// covers failures of the resolution batch as a whole.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors raised by a push transport call.
#[derive(Error, Debug)]
pub enum PushTransportError {
    #[error("Push transport network error: {0}")]
    Network(String),

    #[error("Push transport rejected the request: status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Push transport credential not configured")]
    NotConfigured,
}

/// Errors raised by the push dispatcher.
///
/// Per-batch transport failures are absorbed into the failure counts of
/// the report; only ledger failures while loading recipients propagate.
#[derive(Error, Debug)]
pub enum PushError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors raised by an email transport call.
#[derive(Error, Debug)]
pub enum EmailSendError {
    #[error("Email provider rate limited the request: {0}")]
    RateLimited(String),

    #[error("Email provider rejected the request: status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Email transport network error: {0}")]
    Network(String),
}

/// Errors raised by the email delivery pipeline as a whole.
///
/// Per-recipient failures are recorded in the status ledger and counted;
/// this type covers infrastructure failures such as being unable to read
/// the recipient list at all.
#[derive(Error, Debug)]
pub enum EmailError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors raised by an event handler invocation.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Push(#[from] PushError),

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
