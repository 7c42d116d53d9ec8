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

//! Push dispatch: transport contract and multicast dispatcher.

mod dispatcher;
mod fcm;

pub use dispatcher::{PushDispatcher, PushReport};
pub use fcm::FcmTransport;

use async_trait::async_trait;

use crate::error::PushTransportError;
use crate::payload::NotificationPayload;

/// Per-token error codes reported by the push transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushErrorCode {
    /// Token is no longer registered with the transport
    Unregistered,
    /// Token is malformed
    InvalidArgument,
    /// Transport-side throttling of this token
    Throttled,
    /// Transport-side transient failure
    Unavailable,
    /// Anything the transport reports that we do not recognize
    Other,
}

impl PushErrorCode {
    /// Whether the code means the token is permanently invalid and must
    /// be removed from its owners' token sets.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PushErrorCode::Unregistered | PushErrorCode::InvalidArgument)
    }
}

/// Outcome of one token within a multicast batch.
#[derive(Debug, Clone)]
pub struct TokenOutcome {
    pub token: String,
    /// `None` means the message was accepted for this token.
    pub error: Option<PushErrorCode>,
}

impl TokenOutcome {
    pub fn ok(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            error: None,
        }
    }

    pub fn failed(token: impl Into<String>, code: PushErrorCode) -> Self {
        Self {
            token: token.into(),
            error: Some(code),
        }
    }
}

/// Contract with the push provider.
///
/// One call carries one payload to a bounded list of tokens and reports
/// a per-token outcome. Implementations must return outcomes in the same
/// order as the input tokens.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Whether a credential is available; an unconfigured transport is
    /// skipped without error.
    fn is_configured(&self) -> bool;

    async fn send_multicast(
        &self,
        payload: &NotificationPayload,
        tokens: &[String],
    ) -> Result<Vec<TokenOutcome>, PushTransportError>;
}
