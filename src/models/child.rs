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

//! Child read-model records.
//!
//! Children are not notification recipients themselves; they are the
//! indirection through which guardians are reached. A child may have
//! multiple guardians and a guardian may have multiple children.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// A child record as stored in the ledger mirror.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::children)]
pub struct ChildRecord {
    pub id: String,
    pub display_name: String,
    /// Cohort ("ambiente") key used as an audience grouping
    pub cohort: String,
    /// JSON array of guardian user ids
    pub guardians: String,
    /// JSON array of special-activity names the child is enrolled in
    pub activities: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ChildRecord {
    pub fn guardian_ids(&self) -> Vec<String> {
        serde_json::from_str(&self.guardians).unwrap_or_default()
    }

    pub fn activity_names(&self) -> Vec<String> {
        serde_json::from_str(&self.activities).unwrap_or_default()
    }
}
