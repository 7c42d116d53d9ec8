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

//! Event payload document shapes.
//!
//! These mirror the upstream content store's documents; unknown fields
//! are ignored, optional fields default so legacy documents parse.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ValidationError;
use crate::resolver::Audience;

/// A content document that produces a notification on creation:
/// announcements, events, documents, resource posts, activity posts.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentDoc {
    pub title: String,

    #[serde(default)]
    pub body: String,

    #[serde(default = "default_click_action")]
    pub click_action: String,

    pub audience: Audience,

    #[serde(default)]
    pub send_by_email: bool,

    /// Email is deferred while attachments are still uploading.
    #[serde(default)]
    pub has_pending_attachments: bool,

    /// Whether push targets family users only.
    #[serde(default = "default_staff_excluded")]
    pub staff_excluded: bool,
}

fn default_click_action() -> String {
    "/".to_string()
}

fn default_staff_excluded() -> bool {
    true
}

impl ContentDoc {
    pub fn parse(entity: &'static str, value: &Value) -> Result<Self, ValidationError> {
        let doc: ContentDoc = serde_json::from_value(value.clone())?;
        if doc.title.trim().is_empty() {
            return Err(ValidationError::MissingField {
                entity,
                field: "title",
            });
        }
        Ok(doc)
    }
}

/// An appointment slot assigned to a family.
#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentDoc {
    pub title: String,

    #[serde(default)]
    pub date: String,

    /// Entity ids of the assignees; children expand to their guardians.
    #[serde(default)]
    pub assigned_to: Vec<String>,
}

impl AppointmentDoc {
    pub fn parse(value: &Value) -> Result<Self, ValidationError> {
        let doc: AppointmentDoc = serde_json::from_value(value.clone())?;
        if doc.assigned_to.is_empty() {
            return Err(ValidationError::MissingField {
                entity: "appointment",
                field: "assigned_to",
            });
        }
        Ok(doc)
    }
}

/// A snack-duty calendar entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SnackDutyDoc {
    #[serde(default)]
    pub date: String,

    /// Entity ids on duty for the slot; children expand to guardians.
    #[serde(default)]
    pub assigned_to: Vec<String>,

    #[serde(default)]
    pub cancelled: bool,
}

impl SnackDutyDoc {
    pub fn parse(value: &Value) -> Result<Self, ValidationError> {
        Ok(serde_json::from_value(value.clone())?)
    }
}
