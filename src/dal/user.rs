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

//! DAL for user records.

use super::{interact_err, DAL};
use crate::error::LedgerError;
use crate::models::current_timestamp_string;
use crate::models::user::{Role, UserRecord};
use diesel::prelude::*;
use std::collections::BTreeSet;

/// Data access layer for user read-model operations.
#[derive(Clone)]
pub struct UserDAL<'a> {
    dal: &'a DAL,
}

impl<'a> UserDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Batch-fetches users by id, chunked to the `IN` query limit.
    ///
    /// Ids with no matching record are silently absent from the result.
    pub async fn get_by_ids(
        &self,
        ids: &[String],
        chunk_size: usize,
    ) -> Result<Vec<UserRecord>, LedgerError> {
        use crate::database::schema::users;

        let conn = self.dal.conn().await?;
        let mut records = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(chunk_size.max(1)) {
            let chunk_owned = chunk.to_vec();
            let batch: Vec<UserRecord> = conn
                .interact(move |conn| {
                    users::table
                        .filter(users::id.eq_any(chunk_owned))
                        .select(UserRecord::as_select())
                        .load(conn)
                })
                .await
                .map_err(interact_err)??;
            records.extend(batch);
        }

        Ok(records)
    }

    /// Fetches one user by id.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<UserRecord>, LedgerError> {
        use crate::database::schema::users;

        let conn = self.dal.conn().await?;
        let id = id.to_string();
        let record = conn
            .interact(move |conn| {
                users::table
                    .find(id)
                    .select(UserRecord::as_select())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(interact_err)??;
        Ok(record)
    }

    /// All enabled users whose role is in the allowed set.
    pub async fn get_active_by_roles(
        &self,
        roles: &[Role],
    ) -> Result<Vec<UserRecord>, LedgerError> {
        use crate::database::schema::users;

        let conn = self.dal.conn().await?;
        let role_strings: Vec<String> = roles.iter().map(|r| r.as_str().to_string()).collect();
        let records = conn
            .interact(move |conn| {
                users::table
                    .filter(users::disabled.eq(0))
                    .filter(users::role.eq_any(role_strings))
                    .select(UserRecord::as_select())
                    .load(conn)
            })
            .await
            .map_err(interact_err)??;
        Ok(records)
    }

    /// Enabled staff assigned to the given cohort.
    pub async fn get_staff_by_cohort(
        &self,
        cohort: &str,
    ) -> Result<Vec<UserRecord>, LedgerError> {
        use crate::database::schema::users;

        let conn = self.dal.conn().await?;
        let cohort = cohort.to_string();
        let records = conn
            .interact(move |conn| {
                users::table
                    .filter(users::disabled.eq(0))
                    .filter(users::role.eq(Role::Staff.as_str()))
                    .filter(users::assigned_cohort.eq(cohort))
                    .select(UserRecord::as_select())
                    .load(conn)
            })
            .await
            .map_err(interact_err)??;
        Ok(records)
    }

    /// Atomically removes the given tokens from a user's token set.
    ///
    /// Read-modify-write inside a transaction; tokens not present are
    /// ignored. Returns the number of tokens actually removed.
    pub async fn remove_tokens(
        &self,
        user_id: &str,
        tokens: &[String],
    ) -> Result<usize, LedgerError> {
        use crate::database::schema::users;

        let conn = self.dal.conn().await?;
        let user_id = user_id.to_string();
        let to_remove: BTreeSet<String> = tokens.iter().cloned().collect();

        let removed = conn
            .interact(move |conn| {
                conn.immediate_transaction(|conn| {
                    let current: Option<String> = users::table
                        .find(&user_id)
                        .select(users::fcm_tokens)
                        .first(conn)
                        .optional()?;

                    let Some(raw) = current else {
                        return Ok::<usize, diesel::result::Error>(0);
                    };

                    let mut set: Vec<String> = serde_json::from_str(&raw).unwrap_or_default();
                    let before = set.len();
                    set.retain(|t| !to_remove.contains(t));
                    let removed = before - set.len();

                    if removed > 0 {
                        let updated =
                            serde_json::to_string(&set).unwrap_or_else(|_| "[]".to_string());
                        diesel::update(users::table.find(&user_id))
                            .set((
                                users::fcm_tokens.eq(updated),
                                users::updated_at.eq(current_timestamp_string()),
                            ))
                            .execute(conn)?;
                    }

                    Ok(removed)
                })
            })
            .await
            .map_err(interact_err)??;

        Ok(removed)
    }
}
