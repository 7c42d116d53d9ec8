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

//! Per-recipient email delivery status records.
//!
//! One row per (notification, recipient) pair. The state machine is:
//!
//! - `(absent) -> pending` on the first processing attempt
//! - `pending -> sent` on provider acknowledgment (terminal)
//! - `pending -> queued` when the provider credential is absent
//!   (terminal until an operator supplies configuration)
//! - `pending -> failed` on provider error after retries (a later run
//!   attempts it again, since only `sent` is skipped)

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Delivery status of one recipient's email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Pending,
    Sent,
    Queued,
    Failed,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Pending => "pending",
            EmailStatus::Sent => "sent",
            EmailStatus::Queued => "queued",
            EmailStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(EmailStatus::Pending),
            "sent" => Some(EmailStatus::Sent),
            "queued" => Some(EmailStatus::Queued),
            "failed" => Some(EmailStatus::Failed),
            _ => None,
        }
    }
}

/// An email status record in the ledger.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::email_statuses)]
pub struct EmailStatusRecord {
    pub notification_id: String,
    pub recipient_id: String,
    /// Status as TEXT; use [`EmailStatusRecord::status`]
    pub status: String,
    /// Email address used for the attempt, if the recipient had one
    pub email: Option<String>,
    /// Number of provider calls made for this pair
    pub attempts: i32,
    /// Truncated message of the most recent failure, or the reason the
    /// record is queued
    pub last_error: Option<String>,
    /// Provider message id recorded on success
    pub provider_message_id: Option<String>,
    pub sent_at: Option<String>,
    pub failed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl EmailStatusRecord {
    /// Parsed status; a corrupt column reads as `pending` so the record
    /// stays eligible for a future attempt.
    pub fn status(&self) -> EmailStatus {
        EmailStatus::parse(&self.status).unwrap_or(EmailStatus::Pending)
    }
}
