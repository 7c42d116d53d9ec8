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

//! Handlers for content-creation events and the attachments-complete
//! follow-up.

use tracing::{debug, info, warn};

use super::payloads::ContentDoc;
use super::{EventEnvelope, Notifier};
use crate::error::HandlerError;
use crate::models::notification::{DeliveryState, NewNotification};
use crate::payload::NotificationPayload;

impl Notifier {
    /// Shared handler for the five content kinds that notify on
    /// creation.
    ///
    /// Ordering is resolve → persist recipients → lock → act. Resolution
    /// before the lock means a duplicate delivery that loses the lock
    /// race still contributes its recipients through the merge, so no
    /// recipient resolved by either delivery is lost.
    pub(super) async fn handle_content_created(
        &self,
        envelope: &EventEnvelope,
    ) -> Result<(), HandlerError> {
        let kind = envelope.kind.as_str();
        let doc = ContentDoc::parse(kind, &envelope.after)?;

        let recipients = self.resolver.resolve(&doc.audience).await?;
        if recipients.is_empty() {
            debug!(kind, entity_id = %envelope.entity_id, "Empty audience, nothing to do");
            return Ok(());
        }

        let payload = NotificationPayload::new(&doc.title, &doc.body, &doc.click_action);
        let state = DeliveryState::from_flags(doc.send_by_email, doc.has_pending_attachments);

        self.dal
            .notifications()
            .create_if_absent(NewNotification::new(
                &envelope.entity_id,
                kind,
                &payload,
                doc.send_by_email,
                state,
            ))
            .await?;
        let merged = self
            .resolver
            .merge_persisted(&envelope.entity_id, &recipients)
            .await?;

        if !self.locks.acquire(kind, &envelope.entity_id).await? {
            return Ok(());
        }

        // Push and email are independent stages: a push failure of any
        // kind is logged and the email stage still runs, otherwise a
        // consumed lock would lose the email permanently.
        match self.push.send(&payload, &merged, doc.staff_excluded).await {
            Ok(push_report) => {
                info!(kind, entity_id = %envelope.entity_id, %push_report, "Push stage done");
            }
            Err(e) => {
                warn!(
                    kind,
                    entity_id = %envelope.entity_id,
                    error = %e,
                    "Push stage failed, continuing to email"
                );
            }
        }

        if state.is_ready() {
            self.run_email_stage(&envelope.entity_id, &payload, &merged)
                .await?;
        }
        Ok(())
    }

    /// Fires when a content item's attachments finish uploading.
    ///
    /// Precondition: the document moved from "attachments pending" to
    /// "attachments complete". Any other transition is a clean no-op.
    /// The compare-and-set from `AwaitingAttachments` to `ReadyToSend`
    /// admits exactly one concurrent delivery to the email stage.
    pub(super) async fn handle_attachments_completed(
        &self,
        envelope: &EventEnvelope,
    ) -> Result<(), HandlerError> {
        let was_pending = envelope
            .before
            .as_ref()
            .and_then(|b| b.get("has_pending_attachments"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let now_pending = envelope
            .after
            .get("has_pending_attachments")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !was_pending || now_pending {
            debug!(entity_id = %envelope.entity_id, "Not an attachments-complete transition");
            return Ok(());
        }

        let Some(notification) = self.dal.notifications().get(&envelope.entity_id).await? else {
            debug!(entity_id = %envelope.entity_id, "No notification record, nothing to do");
            return Ok(());
        };

        let won = self
            .dal
            .notifications()
            .transition_state(
                &notification.id,
                DeliveryState::AwaitingAttachments,
                DeliveryState::ReadyToSend,
            )
            .await?;
        if !won {
            debug!(entity_id = %notification.id, "Delivery state already advanced");
            return Ok(());
        }

        let payload = NotificationPayload::new(
            &notification.title,
            &notification.body,
            &notification.click_action,
        );
        self.run_email_stage(&notification.id, &payload, &notification.recipient_ids())
            .await
    }

    /// Runs the email pipeline and advances the delivery state.
    ///
    /// The state moves to `Sent` even when some recipients failed: their
    /// status rows stay retryable, and re-running delivery for them does
    /// not require replaying the whole content event.
    pub(super) async fn run_email_stage(
        &self,
        notification_id: &str,
        payload: &NotificationPayload,
        recipient_ids: &[String],
    ) -> Result<(), HandlerError> {
        let report = self
            .email
            .deliver(notification_id, payload, recipient_ids, self.renderer.as_ref())
            .await?;
        info!(notification_id, %report, "Email stage done");

        self.dal
            .notifications()
            .transition_state(
                notification_id,
                DeliveryState::ReadyToSend,
                DeliveryState::Sent,
            )
            .await?;
        Ok(())
    }
}
