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

//! Email delivery: transport contract, renderer seam, and the
//! per-recipient pipeline.

mod pipeline;
mod resend;

pub use pipeline::{EmailPipeline, EmailReport};
pub use resend::ResendTransport;

use async_trait::async_trait;

use crate::error::EmailSendError;
use crate::models::user::UserRecord;
use crate::payload::NotificationPayload;

/// One outbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Contract with the transactional-mail provider.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Whether a credential is available. An unconfigured transport
    /// parks deliveries as `queued` instead of attempting sends.
    fn is_configured(&self) -> bool;

    /// Sends one message, returning the provider's message id.
    async fn send(&self, message: &EmailMessage) -> Result<String, EmailSendError>;
}

/// Renders the subject and HTML body for one recipient.
///
/// Personalization (e.g. naming the child a guardian was notified
/// through) lives behind this seam; the pipeline only cares that each
/// recipient gets a subject and a body.
pub trait RenderEmail: Send + Sync {
    fn render(&self, payload: &NotificationPayload, recipient: &UserRecord) -> (String, String);
}

/// Renderer that wraps the payload in a minimal HTML shell.
pub struct BasicRenderer;

impl RenderEmail for BasicRenderer {
    fn render(&self, payload: &NotificationPayload, recipient: &UserRecord) -> (String, String) {
        let html = format!(
            "<html><body><p>Hello {},</p><p>{}</p></body></html>",
            html_escape(&recipient.display_name),
            html_escape(&payload.body),
        );
        (payload.title.clone(), html)
    }
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
