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
use std::sync::Arc;

use aviso::dal::DAL;
use aviso::lock::LockManager;

use crate::fixtures::TestLedger;

#[tokio::test]
#[serial]
async fn test_second_acquire_is_refused() {
    let ledger = TestLedger::new().await;
    let locks = LockManager::new(DAL::new(ledger.database.clone()));

    assert!(locks.acquire("announcement", "ann-1").await.unwrap());
    assert!(!locks.acquire("announcement", "ann-1").await.unwrap());
}

#[tokio::test]
#[serial]
async fn test_different_natural_keys_do_not_contend() {
    let ledger = TestLedger::new().await;
    let locks = LockManager::new(DAL::new(ledger.database.clone()));

    assert!(locks.acquire("announcement", "ann-1").await.unwrap());
    assert!(locks.acquire("announcement", "ann-2").await.unwrap());
    assert!(locks.acquire("event", "ann-1").await.unwrap());
}

#[tokio::test]
#[serial]
async fn test_locks_survive_in_a_file_backed_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let url = path.to_string_lossy().to_string();

    {
        let database = aviso::database::Database::new(&url);
        database.run_migrations().await.unwrap();
        let locks = LockManager::new(DAL::new(database));
        assert!(locks.acquire("announcement", "ann-1").await.unwrap());
    }

    // A fresh process over the same file still sees the lock.
    let database = aviso::database::Database::new(&url);
    database.run_migrations().await.unwrap();
    let locks = LockManager::new(DAL::new(database));
    assert!(!locks.acquire("announcement", "ann-1").await.unwrap());
}

#[tokio::test]
#[serial]
async fn test_concurrent_acquires_yield_one_winner() {
    let ledger = TestLedger::new().await;
    let locks = Arc::new(LockManager::new(DAL::new(ledger.database.clone())));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let locks = locks.clone();
        handles.push(tokio::spawn(async move {
            locks.acquire("document", "doc-7").await.unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}
