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

//! Resend-style transactional-mail transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EmailMessage, EmailTransport};
use crate::config::EmailConfig;
use crate::error::EmailSendError;

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

/// HTTP client for a Resend-style email API.
pub struct ResendTransport {
    client: reqwest::Client,
    config: EmailConfig,
}

impl ResendTransport {
    pub fn new(config: EmailConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }
}

#[async_trait]
impl EmailTransport for ResendTransport {
    fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn send(&self, message: &EmailMessage) -> Result<String, EmailSendError> {
        let key = self.config.api_key.as_deref().unwrap_or_default();

        let request = SendRequest {
            from: &message.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmailSendError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailSendError::RateLimited(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailSendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SendResponse = response
            .json()
            .await
            .map_err(|e| EmailSendError::Network(e.to_string()))?;
        Ok(parsed.id)
    }
}
