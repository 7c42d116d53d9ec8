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

//! Event idempotency locks.
//!
//! Every side-effecting event handler acquires a lock derived from the
//! event type and the event's natural key before sending anything.
//! Acquisition is a create-only insert: the first caller creates the row
//! and proceeds, every later caller for the same event sees the existing
//! row and backs off. Locks are never released, which is what makes
//! redelivered events at-most-once.

use tracing::{debug, info};
use uuid::Uuid;

use crate::dal::DAL;
use crate::error::LockError;
use crate::models::lock::NewEventLock;

/// Derives the deterministic lock id for an event.
///
/// Same event type and natural key always produce the same id, across
/// processes and restarts, so concurrent deliveries contend on one row.
pub fn lock_id(event_type: &str, natural_key: &str) -> String {
    let material = format!("{}:{}", event_type, natural_key);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, material.as_bytes()).to_string()
}

/// Acquires create-only idempotency locks against the ledger.
#[derive(Clone)]
pub struct LockManager {
    dal: DAL,
}

impl LockManager {
    pub fn new(dal: DAL) -> Self {
        Self { dal }
    }

    /// Attempts to acquire the lock for an event.
    ///
    /// Returns `Ok(true)` when this caller won and may proceed with side
    /// effects, `Ok(false)` when another delivery already holds the lock.
    /// Only infrastructure failures are errors.
    pub async fn acquire(&self, event_type: &str, natural_key: &str) -> Result<bool, LockError> {
        let id = lock_id(event_type, natural_key);
        let acquired = self
            .dal
            .locks()
            .try_create(NewEventLock::new(&id, event_type, natural_key))
            .await?;

        if acquired {
            debug!(event_type, natural_key, lock_id = %id, "Acquired event lock");
        } else {
            info!(
                event_type,
                natural_key,
                lock_id = %id,
                "Event lock already held, skipping duplicate delivery"
            );
        }
        Ok(acquired)
    }
}
