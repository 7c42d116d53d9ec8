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

//! Data models for the ledger tables.

pub mod child;
pub mod email_status;
pub mod lock;
pub mod notification;
pub mod user;

pub use child::ChildRecord;
pub use email_status::{EmailStatus, EmailStatusRecord};
pub use lock::{EventLock, NewEventLock};
pub use notification::{DeliveryState, NewNotification, NotificationRecord};
pub use user::{Role, UserRecord};

/// Current time as the RFC3339 TEXT representation used in every table.
pub(crate) fn current_timestamp_string() -> String {
    chrono::Utc::now().to_rfc3339()
}
