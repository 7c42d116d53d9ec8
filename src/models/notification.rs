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

//! Notification records and the email delivery state machine.
//!
//! A notification row is the durable face of one fan-out: it carries the
//! sanitized payload, the persisted (reconciled) recipient list and an
//! explicit delivery state for the email stage. The state replaces the
//! scattered `sendByEmail` / `hasPendingAttachments` flags of older data
//! shapes with a single tagged value and explicit transitions.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Email-stage delivery state of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    /// The content does not request email delivery
    NotRequested,
    /// Email requested, but attachments are still uploading
    AwaitingAttachments,
    /// Email requested and ready to dispatch
    ReadyToSend,
    /// The email stage has run for this content
    Sent,
}

impl DeliveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::NotRequested => "not_requested",
            DeliveryState::AwaitingAttachments => "awaiting_attachments",
            DeliveryState::ReadyToSend => "ready_to_send",
            DeliveryState::Sent => "sent",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "not_requested" => Some(DeliveryState::NotRequested),
            "awaiting_attachments" => Some(DeliveryState::AwaitingAttachments),
            "ready_to_send" => Some(DeliveryState::ReadyToSend),
            "sent" => Some(DeliveryState::Sent),
            _ => None,
        }
    }

    /// Derives the initial state from the content's flags.
    pub fn from_flags(send_by_email: bool, has_pending_attachments: bool) -> Self {
        if !send_by_email {
            DeliveryState::NotRequested
        } else if has_pending_attachments {
            DeliveryState::AwaitingAttachments
        } else {
            DeliveryState::ReadyToSend
        }
    }

    /// Transition taken when the content's attachments finish uploading.
    ///
    /// Only `AwaitingAttachments` reacts; every other state returns `None`
    /// and the caller must no-op.
    pub fn on_attachments_complete(self) -> Option<Self> {
        match self {
            DeliveryState::AwaitingAttachments => Some(DeliveryState::ReadyToSend),
            _ => None,
        }
    }

    /// Transition taken after the email stage has run.
    pub fn on_email_dispatched(self) -> Option<Self> {
        match self {
            DeliveryState::ReadyToSend => Some(DeliveryState::Sent),
            _ => None,
        }
    }

    /// Whether the email stage should run right now.
    pub fn is_ready(&self) -> bool {
        matches!(self, DeliveryState::ReadyToSend)
    }
}

/// A notification record in the ledger.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::notifications)]
pub struct NotificationRecord {
    /// Same id as the triggering content item
    pub id: String,
    /// Domain kind of the triggering content (announcement, event, ...)
    pub kind: String,
    pub title: String,
    pub body: String,
    pub click_action: String,
    pub send_by_email: i32,
    /// Delivery state as TEXT; use [`NotificationRecord::delivery_state`]
    pub delivery_state: String,
    /// JSON array of recipient user ids, reconciled via read-merge-write
    pub recipients: String,
    pub created_at: String,
    pub updated_at: String,
}

impl NotificationRecord {
    pub fn delivery_state(&self) -> DeliveryState {
        DeliveryState::parse(&self.delivery_state).unwrap_or(DeliveryState::NotRequested)
    }

    pub fn recipient_ids(&self) -> Vec<String> {
        serde_json::from_str(&self.recipients).unwrap_or_default()
    }
}

/// A notification to be inserted.
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::notifications)]
pub struct NewNotification {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub click_action: String,
    pub send_by_email: i32,
    pub delivery_state: String,
    pub recipients: String,
    pub created_at: String,
    pub updated_at: String,
}

impl NewNotification {
    pub fn new(
        id: &str,
        kind: &str,
        payload: &crate::payload::NotificationPayload,
        send_by_email: bool,
        state: DeliveryState,
    ) -> Self {
        let now = super::current_timestamp_string();
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            title: payload.title.clone(),
            body: payload.body.clone(),
            click_action: payload.click_action.clone(),
            send_by_email: send_by_email as i32,
            delivery_state: state.as_str().to_string(),
            recipients: "[]".to_string(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
