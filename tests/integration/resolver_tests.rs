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

use async_trait::async_trait;
use serial_test::serial;
use std::sync::Arc;

use aviso::dal::DAL;
use aviso::error::LedgerError;
use aviso::models::child::ChildRecord;
use aviso::resolver::{Audience, ChildLookup, RecipientResolver};

use crate::fixtures::TestLedger;

/// Child lookup that fails for scripted ids and delegates the rest.
struct FlakyChildLookup {
    dal: DAL,
    failing_id: String,
}

#[async_trait]
impl ChildLookup for FlakyChildLookup {
    async fn child_by_id(&self, id: &str) -> Result<Option<ChildRecord>, LedgerError> {
        if id == self.failing_id {
            return Err(LedgerError::Interact("connection reset".to_string()));
        }
        self.dal.children().get_by_id(id).await
    }
}

#[tokio::test]
#[serial]
async fn test_cohort_resolves_guardians_and_staff() {
    let ledger = TestLedger::new().await;
    ledger.seed_user("g1", Some("g1@example.org"), "family", None, &[]).await;
    ledger.seed_user("g2", Some("g2@example.org"), "family", None, &[]).await;
    ledger.seed_user("s1", None, "staff", Some("room-2"), &[]).await;
    ledger.seed_user("s2", None, "staff", Some("room-3"), &[]).await;
    ledger.seed_child("c1", "room-2", &["g1", "g2"], &[]).await;

    let resolver = RecipientResolver::new(DAL::new(ledger.database.clone()));
    let set = resolver
        .resolve(&Audience::Cohort {
            key: "room-2".to_string(),
        })
        .await
        .unwrap();

    let mut ids = set.ids();
    ids.sort();
    assert_eq!(ids, vec!["g1", "g2", "s1"]);
    assert_eq!(set.children_of("g1"), &["c1".to_string()]);
}

#[tokio::test]
#[serial]
async fn test_guardian_of_two_children_appears_once() {
    let ledger = TestLedger::new().await;
    ledger.seed_user("g1", None, "family", None, &[]).await;
    ledger.seed_child("c1", "room-2", &["g1"], &[]).await;
    ledger.seed_child("c2", "room-2", &["g1"], &[]).await;

    let resolver = RecipientResolver::new(DAL::new(ledger.database.clone()));
    let set = resolver
        .resolve(&Audience::Cohort {
            key: "room-2".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(set.ids(), vec!["g1"]);
    assert_eq!(
        set.children_of("g1"),
        &["c1".to_string(), "c2".to_string()]
    );
}

#[tokio::test]
#[serial]
async fn test_explicit_ids_expand_children_to_guardians() {
    let ledger = TestLedger::new().await;
    ledger.seed_user("u9", None, "family", None, &[]).await;
    ledger.seed_child("c1", "room-1", &["g1", "g2"], &[]).await;

    let resolver = RecipientResolver::new(DAL::new(ledger.database.clone()));
    let set = resolver
        .resolve(&Audience::Explicit {
            // c1 is a child, u9 is a plain user id, u9 again checks dedup
            ids: vec!["c1".to_string(), "u9".to_string(), "u9".to_string()],
        })
        .await
        .unwrap();

    let mut ids = set.ids();
    ids.sort();
    assert_eq!(ids, vec!["g1", "g2", "u9"]);
}

#[tokio::test]
#[serial]
async fn test_failed_lookup_skips_only_that_id() {
    let ledger = TestLedger::new().await;
    ledger.seed_user("u9", None, "family", None, &[]).await;
    ledger.seed_child("c1", "room-1", &["g1"], &[]).await;

    let dal = DAL::new(ledger.database.clone());
    let resolver = RecipientResolver::with_child_lookup(
        dal.clone(),
        Arc::new(FlakyChildLookup {
            dal,
            failing_id: "c-broken".to_string(),
        }),
    );

    let set = resolver
        .resolve(&Audience::Explicit {
            ids: vec![
                "c-broken".to_string(),
                "c1".to_string(),
                "u9".to_string(),
            ],
        })
        .await
        .unwrap();

    // The failing id is skipped; the rest of the batch resolves.
    let mut ids = set.ids();
    ids.sort();
    assert_eq!(ids, vec!["g1", "u9"]);
}

#[tokio::test]
#[serial]
async fn test_activity_scoped_resolution() {
    let ledger = TestLedger::new().await;
    ledger.seed_child("c1", "room-1", &["g1"], &["chess", "choir"]).await;
    ledger.seed_child("c2", "room-2", &["g2"], &["choir"]).await;
    ledger.seed_child("c3", "room-2", &["g3"], &["swimming"]).await;

    let resolver = RecipientResolver::new(DAL::new(ledger.database.clone()));
    let set = resolver
        .resolve(&Audience::Activity {
            name: "choir".to_string(),
        })
        .await
        .unwrap();

    let mut ids = set.ids();
    ids.sort();
    assert_eq!(ids, vec!["g1", "g2"]);
}

#[tokio::test]
#[serial]
async fn test_global_resolution_filters_roles_and_disabled() {
    let ledger = TestLedger::new().await;
    ledger.seed_user("f1", None, "family", None, &[]).await;
    ledger.seed_user("s1", None, "staff", None, &[]).await;
    ledger.seed_user("a1", None, "admin", None, &[]).await;

    let resolver = RecipientResolver::new(DAL::new(ledger.database.clone()));
    let set = resolver
        .resolve(&Audience::Global {
            roles: vec!["family".to_string(), "staff".to_string()],
        })
        .await
        .unwrap();

    let mut ids = set.ids();
    ids.sort();
    assert_eq!(ids, vec!["f1", "s1"]);
}
