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

//! Data Access Layer for the notification ledger.
//!
//! The root [`DAL`] hands out per-entity sub-DALs that borrow it. All
//! mutations use atomic merge or create-only writes, never unconditional
//! overwrites of previously-read values, so concurrent and duplicate
//! handler invocations cannot lose each other's updates.

mod child;
mod email_status;
mod lock;
mod notification;
mod user;

pub use child::ChildDAL;
pub use email_status::EmailStatusDAL;
pub use lock::LockDAL;
pub use notification::NotificationDAL;
pub use user::UserDAL;

use crate::database::Database;
use crate::error::LedgerError;
use deadpool_diesel::sqlite::Manager as SqliteManager;

/// Root data access layer.
#[derive(Clone)]
pub struct DAL {
    pub(crate) database: Database,
}

impl DAL {
    /// Creates a new DAL over the given database.
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Data access for user records.
    pub fn users(&self) -> UserDAL<'_> {
        UserDAL::new(self)
    }

    /// Data access for child records.
    pub fn children(&self) -> ChildDAL<'_> {
        ChildDAL::new(self)
    }

    /// Data access for idempotency locks.
    pub fn locks(&self) -> LockDAL<'_> {
        LockDAL::new(self)
    }

    /// Data access for notification records.
    pub fn notifications(&self) -> NotificationDAL<'_> {
        NotificationDAL::new(self)
    }

    /// Data access for per-recipient email statuses.
    pub fn email_statuses(&self) -> EmailStatusDAL<'_> {
        EmailStatusDAL::new(self)
    }

    /// Checks out a pooled connection.
    pub(crate) async fn conn(
        &self,
    ) -> Result<deadpool::managed::Object<SqliteManager>, LedgerError> {
        self.database
            .pool()
            .get()
            .await
            .map_err(|e| LedgerError::Pool(e.to_string()))
    }
}

/// Maps a deadpool interact failure into a ledger error.
pub(crate) fn interact_err(e: deadpool_diesel::InteractError) -> LedgerError {
    LedgerError::Interact(e.to_string())
}
