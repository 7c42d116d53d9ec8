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

//! Idempotency lock records.
//!
//! A lock is a create-only row: the first insert for a given id succeeds,
//! every later insert fails with a unique violation. Locks are never
//! updated or deleted by this subsystem.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// An acquired idempotency lock.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::event_locks)]
pub struct EventLock {
    /// Deterministic id derived from event type and natural key
    pub id: String,
    pub event_type: String,
    pub natural_key: String,
    pub created_at: String,
}

/// A lock to be inserted.
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::event_locks)]
pub struct NewEventLock {
    pub id: String,
    pub event_type: String,
    pub natural_key: String,
    pub created_at: String,
}

impl NewEventLock {
    pub fn new(id: &str, event_type: &str, natural_key: &str) -> Self {
        Self {
            id: id.to_string(),
            event_type: event_type.to_string(),
            natural_key: natural_key.to_string(),
            created_at: super::current_timestamp_string(),
        }
    }
}
