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

//! DAL for notification records.
//!
//! The recipients column is reconciled with a transactional
//! read-merge-write: read the current list, union with the new ids,
//! write back only the union. Two concurrent resolutions of the same
//! content item cannot lose recipients added by either.

use super::{interact_err, DAL};
use crate::error::LedgerError;
use crate::models::current_timestamp_string;
use crate::models::notification::{DeliveryState, NewNotification, NotificationRecord};
use diesel::prelude::*;
use std::collections::BTreeSet;

/// Data access layer for notification records.
#[derive(Clone)]
pub struct NotificationDAL<'a> {
    dal: &'a DAL,
}

impl<'a> NotificationDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Fetches one notification by id.
    pub async fn get(&self, id: &str) -> Result<Option<NotificationRecord>, LedgerError> {
        use crate::database::schema::notifications;

        let conn = self.dal.conn().await?;
        let id = id.to_string();
        let record = conn
            .interact(move |conn| {
                notifications::table
                    .find(id)
                    .select(NotificationRecord::as_select())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(interact_err)??;
        Ok(record)
    }

    /// Inserts the record if no row with its id exists yet.
    ///
    /// Duplicate delivery may race two creations of the same content;
    /// the second insert is a silent no-op so reconciliation can proceed
    /// against whichever row won.
    pub async fn create_if_absent(&self, new: NewNotification) -> Result<(), LedgerError> {
        use crate::database::schema::notifications;

        let conn = self.dal.conn().await?;
        conn.interact(move |conn| {
            diesel::insert_into(notifications::table)
                .values(&new)
                .on_conflict(notifications::id)
                .do_nothing()
                .execute(conn)
        })
        .await
        .map_err(interact_err)??;
        Ok(())
    }

    /// Transactional read-merge-write union of the recipient list.
    ///
    /// Returns the merged list. Errors if the notification row does not
    /// exist.
    pub async fn merge_recipients(
        &self,
        id: &str,
        new_ids: Vec<String>,
    ) -> Result<Vec<String>, LedgerError> {
        use crate::database::schema::notifications;

        let conn = self.dal.conn().await?;
        let id = id.to_string();

        let merged = conn
            .interact(move |conn| {
                conn.immediate_transaction(|conn| {
                    let raw: String = notifications::table
                        .find(&id)
                        .select(notifications::recipients)
                        .first(conn)?;

                    let mut set: BTreeSet<String> =
                        serde_json::from_str::<Vec<String>>(&raw)
                            .unwrap_or_default()
                            .into_iter()
                            .collect();
                    set.extend(new_ids);

                    let merged: Vec<String> = set.into_iter().collect();
                    let updated =
                        serde_json::to_string(&merged).unwrap_or_else(|_| "[]".to_string());
                    diesel::update(notifications::table.find(&id))
                        .set((
                            notifications::recipients.eq(updated),
                            notifications::updated_at.eq(current_timestamp_string()),
                        ))
                        .execute(conn)?;

                    Ok::<Vec<String>, diesel::result::Error>(merged)
                })
            })
            .await
            .map_err(interact_err)??;

        Ok(merged)
    }

    /// Compare-and-set state transition.
    ///
    /// Updates only when the stored state equals `from`; returns whether
    /// the transition happened. Concurrent invocations racing the same
    /// transition see exactly one winner.
    pub async fn transition_state(
        &self,
        id: &str,
        from: DeliveryState,
        to: DeliveryState,
    ) -> Result<bool, LedgerError> {
        use crate::database::schema::notifications;

        let conn = self.dal.conn().await?;
        let id = id.to_string();
        let affected = conn
            .interact(move |conn| {
                diesel::update(
                    notifications::table
                        .find(&id)
                        .filter(notifications::delivery_state.eq(from.as_str())),
                )
                .set((
                    notifications::delivery_state.eq(to.as_str()),
                    notifications::updated_at.eq(current_timestamp_string()),
                ))
                .execute(conn)
            })
            .await
            .map_err(interact_err)??;

        Ok(affected > 0)
    }
}
