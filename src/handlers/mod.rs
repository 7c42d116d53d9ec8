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

//! Event handlers: thin orchestration over the pipeline components.
//!
//! The event source delivers each event at least once and may run
//! deliveries concurrently. Every handler follows the same ordering:
//! parse the payload, resolve and persist recipients, acquire the
//! idempotency lock, then act. Push and email are independent stages;
//! a failure in one never blocks the other.

mod content;
mod payloads;
mod schedule;

pub use payloads::{AppointmentDoc, ContentDoc, SnackDutyDoc};

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::NotifierConfig;
use crate::dal::DAL;
use crate::database::Database;
use crate::email::{BasicRenderer, EmailPipeline, EmailTransport, RenderEmail, ResendTransport};
use crate::error::HandlerError;
use crate::lock::LockManager;
use crate::push::{FcmTransport, PushDispatcher, PushTransport};
use crate::rate_limit::RateLimiter;
use crate::resolver::RecipientResolver;

/// Domain events the notifier reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AnnouncementCreated,
    EventCreated,
    DocumentCreated,
    ResourcePostCreated,
    ActivityPostCreated,
    /// A content item's attachments finished uploading.
    AttachmentsCompleted,
    AppointmentAssigned,
    SnackDutyCancelled,
}

impl EventKind {
    /// Stable name used for lock derivation and the notification kind
    /// column.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AnnouncementCreated => "announcement",
            EventKind::EventCreated => "event",
            EventKind::DocumentCreated => "document",
            EventKind::ResourcePostCreated => "resource_post",
            EventKind::ActivityPostCreated => "activity_post",
            EventKind::AttachmentsCompleted => "attachments_completed",
            EventKind::AppointmentAssigned => "appointment",
            EventKind::SnackDutyCancelled => "snack_duty_cancelled",
        }
    }
}

/// One delivered event.
///
/// `before` is present only for update-shaped events; creation events
/// carry just the new document in `after`.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub kind: EventKind,
    pub entity_id: String,
    pub before: Option<Value>,
    pub after: Value,
}

impl EventEnvelope {
    pub fn created(kind: EventKind, entity_id: impl Into<String>, after: Value) -> Self {
        Self {
            kind,
            entity_id: entity_id.into(),
            before: None,
            after,
        }
    }

    pub fn updated(
        kind: EventKind,
        entity_id: impl Into<String>,
        before: Value,
        after: Value,
    ) -> Self {
        Self {
            kind,
            entity_id: entity_id.into(),
            before: Some(before),
            after,
        }
    }
}

/// Composition root: wires the resolver, lock manager, push dispatcher
/// and email pipeline behind a single `handle` entry point.
pub struct Notifier {
    pub(crate) dal: DAL,
    pub(crate) resolver: RecipientResolver,
    pub(crate) locks: LockManager,
    pub(crate) push: PushDispatcher,
    pub(crate) email: EmailPipeline,
    pub(crate) renderer: Box<dyn RenderEmail>,
}

impl Notifier {
    /// Builds a notifier with the default HTTP transports.
    pub fn new(database: Database, config: NotifierConfig) -> Self {
        let push_transport: Arc<dyn PushTransport> =
            Arc::new(FcmTransport::new(config.push.clone()));
        let email_transport: Arc<dyn EmailTransport> =
            Arc::new(ResendTransport::new(config.email.clone()));
        Self::with_transports(
            database,
            config,
            push_transport,
            email_transport,
            Box::new(BasicRenderer),
        )
    }

    /// Builds a notifier with injected transports and renderer.
    pub fn with_transports(
        database: Database,
        config: NotifierConfig,
        push_transport: Arc<dyn PushTransport>,
        email_transport: Arc<dyn EmailTransport>,
        renderer: Box<dyn RenderEmail>,
    ) -> Self {
        let dal = DAL::new(database);
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        Self {
            resolver: RecipientResolver::new(dal.clone()),
            locks: LockManager::new(dal.clone()),
            push: PushDispatcher::new(dal.clone(), push_transport, config.batch.clone()),
            email: EmailPipeline::new(
                dal.clone(),
                email_transport,
                limiter,
                config.email.from.clone(),
                config.batch.clone(),
            ),
            renderer,
            dal,
        }
    }

    /// Routes one delivered event to its handler.
    ///
    /// Validation failures abort this invocation only; duplicate
    /// deliveries return cleanly once the lock check lands.
    pub async fn handle(&self, envelope: &EventEnvelope) -> Result<(), HandlerError> {
        info!(
            kind = envelope.kind.as_str(),
            entity_id = %envelope.entity_id,
            "Handling event"
        );
        let result = match envelope.kind {
            EventKind::AnnouncementCreated
            | EventKind::EventCreated
            | EventKind::DocumentCreated
            | EventKind::ResourcePostCreated
            | EventKind::ActivityPostCreated => self.handle_content_created(envelope).await,
            EventKind::AttachmentsCompleted => self.handle_attachments_completed(envelope).await,
            EventKind::AppointmentAssigned => self.handle_appointment_assigned(envelope).await,
            EventKind::SnackDutyCancelled => self.handle_snack_duty_cancelled(envelope).await,
        };

        if let Err(e) = &result {
            warn!(
                kind = envelope.kind.as_str(),
                entity_id = %envelope.entity_id,
                error = %e,
                "Event handler failed"
            );
        }
        result
    }
}
