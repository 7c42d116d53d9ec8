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

//! Per-recipient email delivery.
//!
//! Each (notification, recipient) pair moves through the status ledger:
//! `pending` before the send attempt, `sent` on provider acknowledgment,
//! `queued` when no credential is configured, `failed` after exhausted
//! retries. `sent` is terminal; a re-run skips those pairs, which is
//! what makes redelivered events safe. A failure for one recipient is
//! recorded against that recipient only and never aborts the batch.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{EmailMessage, EmailTransport, RenderEmail};
use crate::config::BatchConfig;
use crate::dal::DAL;
use crate::error::{EmailError, LedgerError};
use crate::models::email_status::EmailStatus;
use crate::models::user::UserRecord;
use crate::payload::NotificationPayload;
use crate::rate_limit::RateLimiter;

/// Aggregate outcome of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailReport {
    pub total_sent: usize,
    pub total_failed: usize,
}

impl fmt::Display for EmailReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "email delivery: {} sent, {} failed",
            self.total_sent, self.total_failed
        )
    }
}

/// Drives rate-limited, idempotent email delivery for a notification.
pub struct EmailPipeline {
    dal: DAL,
    transport: Arc<dyn EmailTransport>,
    limiter: Arc<RateLimiter>,
    from: String,
    batch: BatchConfig,
}

impl EmailPipeline {
    pub fn new(
        dal: DAL,
        transport: Arc<dyn EmailTransport>,
        limiter: Arc<RateLimiter>,
        from: String,
        batch: BatchConfig,
    ) -> Self {
        Self {
            dal,
            transport,
            limiter,
            from,
            batch,
        }
    }

    /// Delivers the notification to every recipient with an email.
    ///
    /// Returns aggregate counts; individual recipient failures are
    /// recorded in their status rows, never raised. Only whole-batch
    /// infrastructure failures (the recipient records could not be read
    /// at all) surface as an error.
    pub async fn deliver(
        &self,
        notification_id: &str,
        payload: &NotificationPayload,
        recipient_ids: &[String],
        renderer: &dyn RenderEmail,
    ) -> Result<EmailReport, EmailError> {
        let users = self
            .dal
            .users()
            .get_by_ids(recipient_ids, self.batch.in_query_chunk)
            .await?;
        let by_id: BTreeMap<&str, &UserRecord> =
            users.iter().map(|u| (u.id.as_str(), u)).collect();

        let mut report = EmailReport::default();
        for recipient_id in recipient_ids {
            let Some(user) = by_id.get(recipient_id.as_str()) else {
                warn!(recipient_id, "Recipient record not found, skipping");
                continue;
            };

            match self
                .deliver_one(notification_id, payload, user, renderer)
                .await
            {
                Ok(Outcome::Sent) => report.total_sent += 1,
                Ok(Outcome::Failed) => report.total_failed += 1,
                Ok(Outcome::Skipped) => {}
                Err(e) => {
                    // Ledger trouble for this pair only; record what we
                    // can and keep going.
                    warn!(recipient_id, error = %e, "Recipient processing failed");
                    report.total_failed += 1;
                    if let Err(e) = self
                        .dal
                        .email_statuses()
                        .mark_failed(notification_id, recipient_id, &e.to_string())
                        .await
                    {
                        warn!(recipient_id, error = %e, "Could not record failure status");
                    }
                }
            }
        }

        metrics::counter!("aviso_email_sent_total").increment(report.total_sent as u64);
        metrics::counter!("aviso_email_failed_total").increment(report.total_failed as u64);
        info!(notification_id, %report, "Email delivery complete");
        Ok(report)
    }

    async fn deliver_one(
        &self,
        notification_id: &str,
        payload: &NotificationPayload,
        user: &UserRecord,
        renderer: &dyn RenderEmail,
    ) -> Result<Outcome, LedgerError> {
        let statuses = self.dal.email_statuses();

        if let Some(existing) = statuses.get(notification_id, &user.id).await? {
            if existing.status() == EmailStatus::Sent {
                debug!(recipient_id = %user.id, "Already sent, skipping");
                return Ok(Outcome::Skipped);
            }
        }

        statuses
            .upsert_pending(notification_id, &user.id, user.email.clone())
            .await?;

        let Some(email) = user.email.as_deref() else {
            debug!(recipient_id = %user.id, "No email address on file");
            return Ok(Outcome::Skipped);
        };

        if !self.transport.is_configured() {
            statuses
                .mark_queued(
                    notification_id,
                    &user.id,
                    "email provider credential not configured",
                )
                .await?;
            return Ok(Outcome::Skipped);
        }

        let (subject, html) = renderer.render(payload, user);
        let message = EmailMessage {
            from: self.from.clone(),
            to: email.to_string(),
            subject,
            html,
        };

        let result = self
            .limiter
            .retry_with_backoff(|| self.transport.send(&message))
            .await;

        match result {
            Ok(message_id) => {
                statuses
                    .mark_sent(notification_id, &user.id, &message_id)
                    .await?;
                Ok(Outcome::Sent)
            }
            Err(e) => {
                warn!(recipient_id = %user.id, error = %e, "Email send failed");
                statuses
                    .mark_failed(notification_id, &user.id, &e.to_string())
                    .await?;
                Ok(Outcome::Failed)
            }
        }
    }
}

enum Outcome {
    Sent,
    Failed,
    Skipped,
}
