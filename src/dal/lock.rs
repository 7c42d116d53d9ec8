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

//! DAL for idempotency locks.

use super::{interact_err, DAL};
use crate::error::LedgerError;
use crate::models::lock::{EventLock, NewEventLock};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// Data access layer for create-only lock records.
#[derive(Clone)]
pub struct LockDAL<'a> {
    dal: &'a DAL,
}

impl<'a> LockDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Attempts the create-only insert.
    ///
    /// Returns `Ok(true)` if this call created the lock, `Ok(false)` if
    /// the lock already existed (unique violation on the primary key).
    /// Any other database failure propagates.
    pub async fn try_create(&self, new_lock: NewEventLock) -> Result<bool, LedgerError> {
        use crate::database::schema::event_locks;

        let conn = self.dal.conn().await?;
        let result = conn
            .interact(move |conn| {
                diesel::insert_into(event_locks::table)
                    .values(&new_lock)
                    .execute(conn)
            })
            .await
            .map_err(interact_err)?;

        match result {
            Ok(_) => Ok(true),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads a lock record, if present.
    pub async fn get(&self, lock_id: &str) -> Result<Option<EventLock>, LedgerError> {
        use crate::database::schema::event_locks;

        let conn = self.dal.conn().await?;
        let lock_id = lock_id.to_string();
        let record = conn
            .interact(move |conn| {
                event_locks::table
                    .find(lock_id)
                    .select(EventLock::as_select())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(interact_err)??;
        Ok(record)
    }
}
