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

//! DAL for per-recipient email status records.

use super::{interact_err, DAL};
use crate::error::LedgerError;
use crate::models::current_timestamp_string;
use crate::models::email_status::{EmailStatus, EmailStatusRecord};
use diesel::prelude::*;

/// Longest error message persisted in a status row.
const MAX_ERROR_LEN: usize = 1024;

/// Data access layer for email status records.
#[derive(Clone)]
pub struct EmailStatusDAL<'a> {
    dal: &'a DAL,
}

impl<'a> EmailStatusDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Fetches the status record for one (notification, recipient) pair.
    pub async fn get(
        &self,
        notification_id: &str,
        recipient_id: &str,
    ) -> Result<Option<EmailStatusRecord>, LedgerError> {
        use crate::database::schema::email_statuses;

        let conn = self.dal.conn().await?;
        let nid = notification_id.to_string();
        let rid = recipient_id.to_string();
        let record = conn
            .interact(move |conn| {
                email_statuses::table
                    .find((nid, rid))
                    .select(EmailStatusRecord::as_select())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(interact_err)??;
        Ok(record)
    }

    /// All status records for a notification.
    pub async fn list_for_notification(
        &self,
        notification_id: &str,
    ) -> Result<Vec<EmailStatusRecord>, LedgerError> {
        use crate::database::schema::email_statuses;

        let conn = self.dal.conn().await?;
        let nid = notification_id.to_string();
        let records = conn
            .interact(move |conn| {
                email_statuses::table
                    .filter(email_statuses::notification_id.eq(nid))
                    .select(EmailStatusRecord::as_select())
                    .load(conn)
            })
            .await
            .map_err(interact_err)??;
        Ok(records)
    }

    /// Marks the pair as `pending` before a send attempt.
    ///
    /// Merge upsert: creates the row on first contact, otherwise updates
    /// only status, email and updated_at so attempt counters and error
    /// history survive. A crash mid-send leaves this row as visible
    /// evidence of an attempted-but-unconfirmed send.
    pub async fn upsert_pending(
        &self,
        notification_id: &str,
        recipient_id: &str,
        email: Option<String>,
    ) -> Result<(), LedgerError> {
        use crate::database::schema::email_statuses;

        let conn = self.dal.conn().await?;
        let nid = notification_id.to_string();
        let rid = recipient_id.to_string();

        conn.interact(move |conn| {
            let now = current_timestamp_string();
            diesel::insert_into(email_statuses::table)
                .values((
                    email_statuses::notification_id.eq(&nid),
                    email_statuses::recipient_id.eq(&rid),
                    email_statuses::status.eq(EmailStatus::Pending.as_str()),
                    email_statuses::email.eq(&email),
                    email_statuses::attempts.eq(0),
                    email_statuses::created_at.eq(&now),
                    email_statuses::updated_at.eq(&now),
                ))
                .on_conflict((
                    email_statuses::notification_id,
                    email_statuses::recipient_id,
                ))
                .do_update()
                .set((
                    email_statuses::status.eq(EmailStatus::Pending.as_str()),
                    email_statuses::email.eq(&email),
                    email_statuses::updated_at.eq(&now),
                ))
                .execute(conn)
        })
        .await
        .map_err(interact_err)??;
        Ok(())
    }

    /// Records a provider acknowledgment. Terminal.
    pub async fn mark_sent(
        &self,
        notification_id: &str,
        recipient_id: &str,
        provider_message_id: &str,
    ) -> Result<(), LedgerError> {
        use crate::database::schema::email_statuses;

        let conn = self.dal.conn().await?;
        let nid = notification_id.to_string();
        let rid = recipient_id.to_string();
        let message_id = provider_message_id.to_string();

        conn.interact(move |conn| {
            let now = current_timestamp_string();
            diesel::update(email_statuses::table.find((nid, rid)))
                .set((
                    email_statuses::status.eq(EmailStatus::Sent.as_str()),
                    email_statuses::attempts.eq(email_statuses::attempts + 1),
                    email_statuses::provider_message_id.eq(message_id),
                    email_statuses::last_error.eq(None::<String>),
                    email_statuses::sent_at.eq(&now),
                    email_statuses::updated_at.eq(&now),
                ))
                .execute(conn)
        })
        .await
        .map_err(interact_err)??;
        Ok(())
    }

    /// Records a provider failure after retries. Retryable on a later run.
    pub async fn mark_failed(
        &self,
        notification_id: &str,
        recipient_id: &str,
        error: &str,
    ) -> Result<(), LedgerError> {
        use crate::database::schema::email_statuses;

        let conn = self.dal.conn().await?;
        let nid = notification_id.to_string();
        let rid = recipient_id.to_string();
        let message: String = error.chars().take(MAX_ERROR_LEN).collect();

        conn.interact(move |conn| {
            let now = current_timestamp_string();
            diesel::update(email_statuses::table.find((nid, rid)))
                .set((
                    email_statuses::status.eq(EmailStatus::Failed.as_str()),
                    email_statuses::attempts.eq(email_statuses::attempts + 1),
                    email_statuses::last_error.eq(message),
                    email_statuses::failed_at.eq(&now),
                    email_statuses::updated_at.eq(&now),
                ))
                .execute(conn)
        })
        .await
        .map_err(interact_err)??;
        Ok(())
    }

    /// Parks the pair as `queued` because no provider credential is
    /// configured. No attempt was made, so the counter is untouched.
    pub async fn mark_queued(
        &self,
        notification_id: &str,
        recipient_id: &str,
        reason: &str,
    ) -> Result<(), LedgerError> {
        use crate::database::schema::email_statuses;

        let conn = self.dal.conn().await?;
        let nid = notification_id.to_string();
        let rid = recipient_id.to_string();
        let reason: String = reason.chars().take(MAX_ERROR_LEN).collect();

        conn.interact(move |conn| {
            let now = current_timestamp_string();
            diesel::update(email_statuses::table.find((nid, rid)))
                .set((
                    email_statuses::status.eq(EmailStatus::Queued.as_str()),
                    email_statuses::last_error.eq(reason),
                    email_statuses::updated_at.eq(&now),
                ))
                .execute(conn)
        })
        .await
        .map_err(interact_err)??;
        Ok(())
    }
}
