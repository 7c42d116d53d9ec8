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

//! User read-model records.
//!
//! Users are guardians, staff or administrators. The pipeline never
//! creates users; it only reads them and removes confirmed-invalid push
//! tokens from their token sets.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Role of a user record, stored as TEXT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A guardian of one or more children
    Family,
    /// Teaching staff, optionally assigned to a cohort
    Staff,
    /// Administrative staff
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Family => "family",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }

    /// Parses a stored role; unknown values fall back to `Family`, the
    /// least-privileged role (legacy records carry free-form values).
    pub fn parse(raw: &str) -> Self {
        match raw {
            "staff" | "docente" => Role::Staff,
            "admin" => Role::Admin,
            _ => Role::Family,
        }
    }
}

/// A user record as stored in the ledger mirror.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::users)]
pub struct UserRecord {
    /// Opaque identifier from the upstream user store
    pub id: String,
    pub display_name: String,
    /// Email address; absent means no email is ever attempted
    pub email: Option<String>,
    /// Role as TEXT; use [`UserRecord::role`]
    pub role: String,
    /// Non-zero means the user is disabled and receives nothing
    pub disabled: i32,
    /// Cohort key for staff assignment, if any
    pub assigned_cohort: Option<String>,
    /// JSON array of device push tokens
    pub fcm_tokens: String,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRecord {
    pub fn role(&self) -> Role {
        Role::parse(&self.role)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled != 0
    }

    /// Parses the token set; a corrupt column yields an empty set rather
    /// than failing the whole dispatch.
    pub fn tokens(&self) -> Vec<String> {
        serde_json::from_str(&self.fcm_tokens).unwrap_or_default()
    }
}
