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

//! Multicast push dispatch with token lifecycle management.
//!
//! Resolves recipient ids to device tokens, sends bounded multicast
//! batches, and removes tokens the transport reports as permanently
//! invalid. Zero matching tokens is a normal outcome, not an error.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{PushTransport, TokenOutcome};
use crate::config::BatchConfig;
use crate::dal::DAL;
use crate::error::PushError;
use crate::models::user::Role;
use crate::payload::NotificationPayload;

/// Aggregate outcome of one push dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    pub users_loaded: usize,
    pub tokens_targeted: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Tokens removed from user records after terminal delivery errors.
    pub cleaned_count: usize,
}

impl fmt::Display for PushReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "push dispatch: {} users, {} tokens, {} delivered, {} failed, {} cleaned",
            self.users_loaded,
            self.tokens_targeted,
            self.success_count,
            self.failure_count,
            self.cleaned_count
        )
    }
}

/// Sends one payload to the devices of a recipient set.
pub struct PushDispatcher {
    dal: DAL,
    transport: Arc<dyn PushTransport>,
    batch: BatchConfig,
}

impl PushDispatcher {
    pub fn new(dal: DAL, transport: Arc<dyn PushTransport>, batch: BatchConfig) -> Self {
        Self {
            dal,
            transport,
            batch,
        }
    }

    /// Dispatches `payload` to every device of the given recipients.
    ///
    /// Disabled users are skipped; with `staff_excluded` only family
    /// users are targeted. Transport failures for individual batches are
    /// absorbed into the failure count; only ledger failures propagate.
    pub async fn send(
        &self,
        payload: &NotificationPayload,
        recipient_ids: &[String],
        staff_excluded: bool,
    ) -> Result<PushReport, PushError> {
        let unique: Vec<String> = recipient_ids
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if unique.is_empty() {
            return Ok(PushReport::default());
        }

        let users = self
            .dal
            .users()
            .get_by_ids(&unique, self.batch.in_query_chunk)
            .await?;

        // token → owning user ids; a token can appear on more than one
        // record after a device swap.
        let mut owners: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut users_loaded = 0;
        for user in &users {
            if user.is_disabled() {
                continue;
            }
            if staff_excluded && user.role() != Role::Family {
                continue;
            }
            users_loaded += 1;
            for token in user.tokens() {
                owners.entry(token).or_default().insert(user.id.clone());
            }
        }

        let tokens: Vec<String> = owners.keys().cloned().collect();
        let mut report = PushReport {
            users_loaded,
            tokens_targeted: tokens.len(),
            ..PushReport::default()
        };

        if tokens.is_empty() {
            debug!("No device tokens for recipients, nothing to dispatch");
            return Ok(report);
        }
        if !self.transport.is_configured() {
            warn!("Push transport not configured, skipping dispatch");
            report.failure_count = tokens.len();
            return Ok(report);
        }

        let mut invalid_tokens: Vec<String> = Vec::new();
        for chunk in tokens.chunks(self.batch.multicast_limit.max(1)) {
            match self.transport.send_multicast(payload, chunk).await {
                Ok(outcomes) => self.tally_outcomes(&outcomes, &mut report, &mut invalid_tokens),
                Err(e) => {
                    warn!(batch_size = chunk.len(), error = %e, "Multicast batch failed");
                    report.failure_count += chunk.len();
                }
            }
        }
        metrics::counter!("aviso_push_delivered_total").increment(report.success_count as u64);
        metrics::counter!("aviso_push_failed_total").increment(report.failure_count as u64);

        report.cleaned_count = self.cleanup_tokens(&owners, &invalid_tokens).await;

        info!(%report, "Push dispatch complete");
        Ok(report)
    }

    fn tally_outcomes(
        &self,
        outcomes: &[TokenOutcome],
        report: &mut PushReport,
        invalid_tokens: &mut Vec<String>,
    ) {
        for outcome in outcomes {
            match outcome.error {
                None => report.success_count += 1,
                Some(code) => {
                    report.failure_count += 1;
                    if code.is_terminal() {
                        invalid_tokens.push(outcome.token.clone());
                    }
                }
            }
        }
    }

    /// Removes permanently invalid tokens from their owners' records.
    ///
    /// Removals are grouped by user and chunked to the array-mutation
    /// limit; a failure for one user does not block cleanup for others.
    async fn cleanup_tokens(
        &self,
        owners: &BTreeMap<String, BTreeSet<String>>,
        invalid_tokens: &[String],
    ) -> usize {
        if invalid_tokens.is_empty() {
            return 0;
        }

        let mut by_user: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for token in invalid_tokens {
            if let Some(user_ids) = owners.get(token) {
                for user_id in user_ids {
                    by_user
                        .entry(user_id.as_str())
                        .or_default()
                        .push(token.clone());
                }
            }
        }

        let mut cleaned = 0;
        for (user_id, tokens) in by_user {
            for chunk in tokens.chunks(self.batch.array_mutation_limit.max(1)) {
                match self.dal.users().remove_tokens(user_id, chunk).await {
                    Ok(removed) => {
                        cleaned += removed;
                        debug!(user_id, removed, "Removed invalid push tokens");
                    }
                    Err(e) => {
                        warn!(user_id, error = %e, "Token cleanup failed for user");
                    }
                }
            }
        }
        metrics::counter!("aviso_push_tokens_cleaned_total").increment(cleaned as u64);
        cleaned
    }
}
