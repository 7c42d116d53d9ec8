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

use serde_json::json;
use serial_test::serial;
use std::sync::Arc;

use aviso::config::{NotifierConfig, RateLimitConfig};
use aviso::dal::DAL;
use aviso::email::BasicRenderer;
use aviso::handlers::{EventEnvelope, EventKind, Notifier};
use aviso::models::email_status::EmailStatus;
use aviso::models::notification::DeliveryState;

use crate::fixtures::{MockEmailTransport, MockPushTransport, TestLedger};

fn test_config() -> NotifierConfig {
    NotifierConfig {
        rate_limit: RateLimitConfig {
            min_interval_ms: 0,
            max_attempts: 3,
            backoff_base_ms: 1,
            backoff_cap_ms: 1,
            jitter_ms: 0,
        },
        ..NotifierConfig::default()
    }
}

fn notifier(
    ledger: &TestLedger,
    push: Arc<MockPushTransport>,
    email: Arc<MockEmailTransport>,
) -> Notifier {
    Notifier::with_transports(
        ledger.database.clone(),
        test_config(),
        push,
        email,
        Box::new(BasicRenderer),
    )
}

async fn seed_cohort(ledger: &TestLedger) {
    ledger
        .seed_user("g1", Some("g1@example.org"), "family", None, &["tok-g1"])
        .await;
    ledger
        .seed_user("g2", Some("g2@example.org"), "family", None, &["tok-g2"])
        .await;
    ledger.seed_user("s1", None, "staff", Some("room-2"), &[]).await;
    ledger.seed_child("c1", "room-2", &["g1", "g2"], &[]).await;
}

fn announcement(entity_id: &str) -> EventEnvelope {
    EventEnvelope::created(
        EventKind::AnnouncementCreated,
        entity_id,
        json!({
            "title": "Open day on Saturday",
            "body": "Doors open at 10.",
            "click_action": "/news",
            "audience": {"kind": "cohort", "key": "room-2"},
            "send_by_email": true
        }),
    )
}

#[tokio::test]
#[serial]
async fn test_announcement_pushes_and_emails_once() {
    let ledger = TestLedger::new().await;
    seed_cohort(&ledger).await;

    let push = MockPushTransport::new();
    let email = MockEmailTransport::new();
    let notifier = notifier(&ledger, push.clone(), email.clone());

    notifier.handle(&announcement("ann-1")).await.unwrap();

    assert_eq!(push.total_tokens_sent(), 2);
    assert_eq!(email.sends_to("g1@example.org"), 1);
    assert_eq!(email.sends_to("g2@example.org"), 1);

    let dal = DAL::new(ledger.database.clone());
    let record = dal.notifications().get("ann-1").await.unwrap().unwrap();
    assert_eq!(record.delivery_state(), DeliveryState::Sent);
    let mut recipients = record.recipient_ids();
    recipients.sort();
    assert_eq!(recipients, vec!["g1", "g2", "s1"]);

    // Redelivery of the same event is absorbed by the lock.
    notifier.handle(&announcement("ann-1")).await.unwrap();
    assert_eq!(push.total_tokens_sent(), 2);
    assert_eq!(email.sends_to("g1@example.org"), 1);
}

#[tokio::test]
#[serial]
async fn test_empty_audience_is_a_clean_noop() {
    let ledger = TestLedger::new().await;

    let push = MockPushTransport::new();
    let email = MockEmailTransport::new();
    let notifier = notifier(&ledger, push.clone(), email.clone());

    notifier.handle(&announcement("ann-2")).await.unwrap();

    assert_eq!(push.total_tokens_sent(), 0);
    let dal = DAL::new(ledger.database.clone());
    assert!(dal.notifications().get("ann-2").await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn test_email_deferred_until_attachments_complete() {
    let ledger = TestLedger::new().await;
    seed_cohort(&ledger).await;

    let push = MockPushTransport::new();
    let email = MockEmailTransport::new();
    let notifier = notifier(&ledger, push.clone(), email.clone());

    let created = EventEnvelope::created(
        EventKind::DocumentCreated,
        "doc-1",
        json!({
            "title": "Field trip consent form",
            "audience": {"kind": "cohort", "key": "room-2"},
            "send_by_email": true,
            "has_pending_attachments": true
        }),
    );
    notifier.handle(&created).await.unwrap();

    // Push goes out immediately, email waits for the attachments.
    assert_eq!(push.total_tokens_sent(), 2);
    assert_eq!(email.sends_to("g1@example.org"), 0);

    let dal = DAL::new(ledger.database.clone());
    let record = dal.notifications().get("doc-1").await.unwrap().unwrap();
    assert_eq!(record.delivery_state(), DeliveryState::AwaitingAttachments);

    let completed = EventEnvelope::updated(
        EventKind::AttachmentsCompleted,
        "doc-1",
        json!({"has_pending_attachments": true}),
        json!({"has_pending_attachments": false}),
    );
    notifier.handle(&completed).await.unwrap();

    assert_eq!(email.sends_to("g1@example.org"), 1);
    assert_eq!(email.sends_to("g2@example.org"), 1);
    let record = dal.notifications().get("doc-1").await.unwrap().unwrap();
    assert_eq!(record.delivery_state(), DeliveryState::Sent);

    // Redelivered completion event loses the compare-and-set and no-ops.
    notifier.handle(&completed).await.unwrap();
    assert_eq!(email.sends_to("g1@example.org"), 1);
}

#[tokio::test]
#[serial]
async fn test_attachments_event_without_transition_is_ignored() {
    let ledger = TestLedger::new().await;

    let push = MockPushTransport::new();
    let email = MockEmailTransport::new();
    let notifier = notifier(&ledger, push.clone(), email.clone());

    let unrelated = EventEnvelope::updated(
        EventKind::AttachmentsCompleted,
        "doc-9",
        json!({"has_pending_attachments": false}),
        json!({"has_pending_attachments": false}),
    );
    notifier.handle(&unrelated).await.unwrap();
    assert_eq!(email.sent_to.lock().unwrap().len(), 0);
}

#[tokio::test]
#[serial]
async fn test_appointment_notifies_guardians_of_assigned_child() {
    let ledger = TestLedger::new().await;
    ledger
        .seed_user("g1", Some("g1@example.org"), "family", None, &["tok-g1"])
        .await;
    ledger.seed_child("c1", "room-1", &["g1"], &[]).await;

    let push = MockPushTransport::new();
    let email = MockEmailTransport::new();
    let notifier = notifier(&ledger, push.clone(), email.clone());

    let envelope = EventEnvelope::created(
        EventKind::AppointmentAssigned,
        "appt-1",
        json!({
            "title": "Parent meeting",
            "date": "2026-09-12",
            "assigned_to": ["c1"]
        }),
    );
    notifier.handle(&envelope).await.unwrap();

    assert_eq!(push.total_tokens_sent(), 1);
    // Appointments are push-only.
    assert_eq!(email.sent_to.lock().unwrap().len(), 0);

    // Redelivery is locked out.
    notifier.handle(&envelope).await.unwrap();
    assert_eq!(push.total_tokens_sent(), 1);
}

#[tokio::test]
#[serial]
async fn test_appointment_without_assignees_is_a_validation_error() {
    let ledger = TestLedger::new().await;

    let push = MockPushTransport::new();
    let email = MockEmailTransport::new();
    let notifier = notifier(&ledger, push.clone(), email.clone());

    let envelope = EventEnvelope::created(
        EventKind::AppointmentAssigned,
        "appt-2",
        json!({"title": "Parent meeting"}),
    );
    assert!(notifier.handle(&envelope).await.is_err());
    assert_eq!(push.total_tokens_sent(), 0);
}

#[tokio::test]
#[serial]
async fn test_snack_duty_cancellation() {
    let ledger = TestLedger::new().await;
    ledger
        .seed_user("g1", Some("g1@example.org"), "family", None, &["tok-g1"])
        .await;
    ledger.seed_child("c1", "room-1", &["g1"], &[]).await;

    let push = MockPushTransport::new();
    let email = MockEmailTransport::new();
    let notifier = notifier(&ledger, push.clone(), email.clone());

    // An entry that is not cancelled does nothing.
    let active = EventEnvelope::created(
        EventKind::SnackDutyCancelled,
        "snack-1",
        json!({"date": "2026-09-05", "assigned_to": ["c1"], "cancelled": false}),
    );
    notifier.handle(&active).await.unwrap();
    assert_eq!(push.total_tokens_sent(), 0);

    let cancelled = EventEnvelope::created(
        EventKind::SnackDutyCancelled,
        "snack-1",
        json!({"date": "2026-09-05", "assigned_to": ["c1"], "cancelled": true}),
    );
    notifier.handle(&cancelled).await.unwrap();
    assert_eq!(push.total_tokens_sent(), 1);

    notifier.handle(&cancelled).await.unwrap();
    assert_eq!(push.total_tokens_sent(), 1);
}

#[tokio::test]
#[serial]
async fn test_push_ledger_failure_still_reaches_email_stage() {
    let ledger = TestLedger::new().await;
    ledger.seed_child("c1", "room-1", &["g1"], &[]).await;

    let push = MockPushTransport::new();
    let email = MockEmailTransport::new();
    let notifier = notifier(&ledger, push.clone(), email.clone());

    // Resolution goes through the children table only; the broken user
    // store is first touched by the push stage.
    ledger.break_user_store().await;

    let envelope = EventEnvelope::created(
        EventKind::AnnouncementCreated,
        "ann-9",
        json!({
            "title": "Open day on Saturday",
            "audience": {"kind": "explicit", "ids": ["c1"]},
            "send_by_email": true
        }),
    );
    let err = notifier.handle(&envelope).await.unwrap_err();

    // The failure surfacing is the email stage's, proving the push
    // stage's ledger error did not abort the handler.
    assert!(matches!(err, aviso::HandlerError::Email(_)));
}

#[tokio::test]
#[serial]
async fn test_push_ledger_failure_is_contained_without_email() {
    let ledger = TestLedger::new().await;
    ledger.seed_child("c1", "room-1", &["g1"], &[]).await;

    let push = MockPushTransport::new();
    let email = MockEmailTransport::new();
    let notifier = notifier(&ledger, push.clone(), email.clone());

    ledger.break_user_store().await;

    let envelope = EventEnvelope::created(
        EventKind::AnnouncementCreated,
        "ann-10",
        json!({
            "title": "Open day on Saturday",
            "audience": {"kind": "explicit", "ids": ["c1"]},
            "send_by_email": false
        }),
    );
    notifier.handle(&envelope).await.unwrap();
    assert_eq!(push.total_tokens_sent(), 0);
}

#[tokio::test]
#[serial]
async fn test_push_failure_does_not_block_email() {
    let ledger = TestLedger::new().await;
    seed_cohort(&ledger).await;

    let push = MockPushTransport::new();
    push.configured
        .store(false, std::sync::atomic::Ordering::SeqCst);
    let email = MockEmailTransport::new();
    let notifier = notifier(&ledger, push.clone(), email.clone());

    notifier.handle(&announcement("ann-3")).await.unwrap();

    assert_eq!(push.total_tokens_sent(), 0);
    assert_eq!(email.sends_to("g1@example.org"), 1);

    let dal = DAL::new(ledger.database.clone());
    let status = dal.email_statuses().get("ann-3", "g1").await.unwrap().unwrap();
    assert_eq!(status.status(), EmailStatus::Sent);
}
