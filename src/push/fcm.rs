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

//! FCM-style HTTP multicast transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{PushErrorCode, PushTransport, TokenOutcome};
use crate::config::PushConfig;
use crate::error::PushTransportError;
use crate::payload::NotificationPayload;

#[derive(Serialize)]
struct MulticastRequest<'a> {
    registration_ids: &'a [String],
    data: DataPayload<'a>,
}

#[derive(Serialize)]
struct DataPayload<'a> {
    title: &'a str,
    body: &'a str,
    click_action: &'a str,
}

#[derive(Deserialize)]
struct MulticastResponse {
    results: Vec<TokenResult>,
}

#[derive(Deserialize)]
struct TokenResult {
    #[serde(default)]
    error: Option<String>,
}

fn map_error_code(code: &str) -> PushErrorCode {
    match code {
        "NotRegistered" => PushErrorCode::Unregistered,
        "InvalidRegistration" | "MissingRegistration" => PushErrorCode::InvalidArgument,
        "DeviceMessageRateExceeded" => PushErrorCode::Throttled,
        "Unavailable" | "InternalServerError" => PushErrorCode::Unavailable,
        _ => PushErrorCode::Other,
    }
}

/// HTTP client for an FCM-style multicast endpoint.
pub struct FcmTransport {
    client: reqwest::Client,
    config: PushConfig,
}

impl FcmTransport {
    pub fn new(config: PushConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }
}

#[async_trait]
impl PushTransport for FcmTransport {
    fn is_configured(&self) -> bool {
        self.config.server_key.is_some()
    }

    async fn send_multicast(
        &self,
        payload: &NotificationPayload,
        tokens: &[String],
    ) -> Result<Vec<TokenOutcome>, PushTransportError> {
        let Some(key) = self.config.server_key.as_deref() else {
            return Err(PushTransportError::NotConfigured);
        };

        let request = MulticastRequest {
            registration_ids: tokens,
            data: DataPayload {
                title: &payload.title,
                body: &payload.body,
                click_action: &payload.click_action,
            },
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("Authorization", format!("key={}", key))
            .json(&request)
            .send()
            .await
            .map_err(|e| PushTransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushTransportError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MulticastResponse = response
            .json()
            .await
            .map_err(|e| PushTransportError::Network(e.to_string()))?;

        debug!(
            tokens = tokens.len(),
            results = parsed.results.len(),
            "Multicast batch sent"
        );

        Ok(pair_outcomes(tokens, &parsed.results))
    }
}

/// Pairs per-token results with input tokens positionally.
///
/// A short results array carries no verdict for the tail tokens; those
/// count as failed with a non-terminal code so they are neither treated
/// as delivered nor removed from their owners.
fn pair_outcomes(tokens: &[String], results: &[TokenResult]) -> Vec<TokenOutcome> {
    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            let error = match results.get(i) {
                Some(result) => result.error.as_deref().map(map_error_code),
                None => Some(PushErrorCode::Other),
            };
            TokenOutcome {
                token: token.clone(),
                error,
            }
        })
        .collect()
}
