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

use serial_test::serial;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use aviso::config::{BatchConfig, RateLimitConfig};
use aviso::dal::DAL;
use aviso::email::{BasicRenderer, EmailPipeline};
use aviso::models::email_status::EmailStatus;
use aviso::payload::NotificationPayload;
use aviso::rate_limit::RateLimiter;

use crate::fixtures::{MockEmailTransport, TestLedger};

fn fast_limiter() -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(RateLimitConfig {
        min_interval_ms: 0,
        max_attempts: 3,
        backoff_base_ms: 1,
        backoff_cap_ms: 1,
        jitter_ms: 0,
    }))
}

fn pipeline(ledger: &TestLedger, transport: Arc<MockEmailTransport>) -> EmailPipeline {
    EmailPipeline::new(
        DAL::new(ledger.database.clone()),
        transport,
        fast_limiter(),
        "noreply@example.org".to_string(),
        BatchConfig::default(),
    )
}

fn payload() -> NotificationPayload {
    NotificationPayload::new("Open day", "Doors open at 10.", "/news")
}

#[tokio::test]
#[serial]
async fn test_sent_recipients_are_not_resent() {
    let ledger = TestLedger::new().await;
    ledger.seed_user("g1", Some("g1@example.org"), "family", None, &[]).await;

    let transport = MockEmailTransport::new();
    let pipeline = pipeline(&ledger, transport.clone());
    let recipients = vec!["g1".to_string()];

    let first = pipeline
        .deliver("ann-1", &payload(), &recipients, &BasicRenderer)
        .await
        .unwrap();
    assert_eq!(first.total_sent, 1);

    let second = pipeline
        .deliver("ann-1", &payload(), &recipients, &BasicRenderer)
        .await
        .unwrap();
    assert_eq!(second.total_sent, 0);
    assert_eq!(second.total_failed, 0);
    assert_eq!(transport.sends_to("g1@example.org"), 1);
}

#[tokio::test]
#[serial]
async fn test_one_failure_does_not_abort_the_batch() {
    let ledger = TestLedger::new().await;
    ledger.seed_user("g1", Some("g1@example.org"), "family", None, &[]).await;
    ledger.seed_user("g2", Some("g2@example.org"), "family", None, &[]).await;
    ledger.seed_user("g3", Some("g3@example.org"), "family", None, &[]).await;

    let transport = MockEmailTransport::new();
    transport.fail_address("g2@example.org");
    let pipeline = pipeline(&ledger, transport.clone());

    let recipients = vec!["g1".to_string(), "g2".to_string(), "g3".to_string()];
    let report = pipeline
        .deliver("ann-2", &payload(), &recipients, &BasicRenderer)
        .await
        .unwrap();

    assert_eq!(report.total_sent, 2);
    assert_eq!(report.total_failed, 1);

    let dal = DAL::new(ledger.database.clone());
    let failed = dal.email_statuses().get("ann-2", "g2").await.unwrap().unwrap();
    assert_eq!(failed.status(), EmailStatus::Failed);
    assert_eq!(failed.attempts, 1);
    assert!(failed.last_error.is_some());

    let sent = dal.email_statuses().get("ann-2", "g1").await.unwrap().unwrap();
    assert_eq!(sent.status(), EmailStatus::Sent);
    assert!(sent.provider_message_id.is_some());
}

#[tokio::test]
#[serial]
async fn test_recipient_without_email_is_left_pending() {
    let ledger = TestLedger::new().await;
    ledger.seed_user("g1", None, "family", None, &[]).await;

    let transport = MockEmailTransport::new();
    let pipeline = pipeline(&ledger, transport.clone());

    let report = pipeline
        .deliver("ann-3", &payload(), &["g1".to_string()], &BasicRenderer)
        .await
        .unwrap();

    assert_eq!(report.total_sent, 0);
    assert_eq!(report.total_failed, 0);

    let dal = DAL::new(ledger.database.clone());
    let status = dal.email_statuses().get("ann-3", "g1").await.unwrap().unwrap();
    assert_eq!(status.status(), EmailStatus::Pending);
    assert_eq!(status.attempts, 0);
}

#[tokio::test]
#[serial]
async fn test_missing_credential_queues_then_sends_after_configuration() {
    let ledger = TestLedger::new().await;
    ledger.seed_user("g1", Some("g1@example.org"), "family", None, &[]).await;
    ledger.seed_user("g2", Some("g2@example.org"), "family", None, &[]).await;

    let transport = MockEmailTransport::unconfigured();
    let pipeline = pipeline(&ledger, transport.clone());
    let recipients = vec!["g1".to_string(), "g2".to_string()];

    let report = pipeline
        .deliver("ann-4", &payload(), &recipients, &BasicRenderer)
        .await
        .unwrap();
    assert_eq!(report.total_sent, 0);
    assert_eq!(report.total_failed, 0);

    let dal = DAL::new(ledger.database.clone());
    for id in ["g1", "g2"] {
        let status = dal.email_statuses().get("ann-4", id).await.unwrap().unwrap();
        assert_eq!(status.status(), EmailStatus::Queued);
        assert!(status.last_error.unwrap().contains("credential"));
        assert_eq!(status.attempts, 0);
    }

    // Operator supplies the credential; the same records move to sent.
    transport.configured.store(true, Ordering::SeqCst);
    let report = pipeline
        .deliver("ann-4", &payload(), &recipients, &BasicRenderer)
        .await
        .unwrap();
    assert_eq!(report.total_sent, 2);

    for id in ["g1", "g2"] {
        let status = dal.email_statuses().get("ann-4", id).await.unwrap().unwrap();
        assert_eq!(status.status(), EmailStatus::Sent);
        assert_eq!(status.attempts, 1);
    }
}

#[tokio::test]
#[serial]
async fn test_failed_records_are_retried_on_a_later_run() {
    let ledger = TestLedger::new().await;
    ledger.seed_user("g1", Some("g1@example.org"), "family", None, &[]).await;

    let transport = MockEmailTransport::new();
    transport.fail_address("g1@example.org");
    let pipeline = pipeline(&ledger, transport.clone());
    let recipients = vec!["g1".to_string()];

    let report = pipeline
        .deliver("ann-5", &payload(), &recipients, &BasicRenderer)
        .await
        .unwrap();
    assert_eq!(report.total_failed, 1);

    // The address recovers; failed is not terminal.
    transport.failing.lock().unwrap().clear();
    let report = pipeline
        .deliver("ann-5", &payload(), &recipients, &BasicRenderer)
        .await
        .unwrap();
    assert_eq!(report.total_sent, 1);

    let dal = DAL::new(ledger.database.clone());
    let status = dal.email_statuses().get("ann-5", "g1").await.unwrap().unwrap();
    assert_eq!(status.status(), EmailStatus::Sent);
    assert_eq!(status.attempts, 2);
}
