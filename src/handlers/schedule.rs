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

//! Handlers for schedule events: appointment assignment and snack-duty
//! cancellation. Both are push-only.

use tracing::{debug, info};

use super::payloads::{AppointmentDoc, SnackDutyDoc};
use super::{EventEnvelope, Notifier};
use crate::error::HandlerError;
use crate::payload::NotificationPayload;
use crate::resolver::Audience;

impl Notifier {
    /// Notifies the families an appointment slot was assigned to.
    pub(super) async fn handle_appointment_assigned(
        &self,
        envelope: &EventEnvelope,
    ) -> Result<(), HandlerError> {
        let kind = envelope.kind.as_str();
        let doc = AppointmentDoc::parse(&envelope.after)?;

        let audience = Audience::Explicit {
            ids: doc.assigned_to.clone(),
        };
        let recipients = self.resolver.resolve(&audience).await?;
        if recipients.is_empty() {
            debug!(entity_id = %envelope.entity_id, "No recipients for appointment");
            return Ok(());
        }

        if !self.locks.acquire(kind, &envelope.entity_id).await? {
            return Ok(());
        }

        let body = if doc.date.is_empty() {
            "You have been assigned an appointment".to_string()
        } else {
            format!("You have been assigned an appointment on {}", doc.date)
        };
        let payload = NotificationPayload::new(&doc.title, &body, "/appointments");
        let report = self.push.send(&payload, &recipients.ids(), true).await?;
        info!(kind, entity_id = %envelope.entity_id, %report, "Appointment push done");
        Ok(())
    }

    /// Notifies the families on duty when a snack-duty slot is
    /// cancelled.
    pub(super) async fn handle_snack_duty_cancelled(
        &self,
        envelope: &EventEnvelope,
    ) -> Result<(), HandlerError> {
        let kind = envelope.kind.as_str();
        let doc = SnackDutyDoc::parse(&envelope.after)?;

        if !doc.cancelled {
            debug!(entity_id = %envelope.entity_id, "Snack-duty entry not cancelled, no-op");
            return Ok(());
        }
        if doc.assigned_to.is_empty() {
            debug!(entity_id = %envelope.entity_id, "Snack-duty entry has no assignees");
            return Ok(());
        }

        let audience = Audience::Explicit {
            ids: doc.assigned_to.clone(),
        };
        let recipients = self.resolver.resolve(&audience).await?;
        if recipients.is_empty() {
            return Ok(());
        }

        // Natural key includes the date: re-assigning and re-cancelling
        // the same slot on another day is a distinct event.
        let natural_key = format!("{}:{}", envelope.entity_id, doc.date);
        if !self.locks.acquire(kind, &natural_key).await? {
            return Ok(());
        }

        let body = if doc.date.is_empty() {
            "Your snack duty has been cancelled".to_string()
        } else {
            format!("Your snack duty on {} has been cancelled", doc.date)
        };
        let payload = NotificationPayload::new("Snack duty cancelled", &body, "/snack-calendar");
        let report = self.push.send(&payload, &recipients.ids(), true).await?;
        info!(kind, entity_id = %envelope.entity_id, %report, "Snack-duty push done");
        Ok(())
    }
}
