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

//! Notification payload text handling.

use serde::{Deserialize, Serialize};

/// Longest title sent to the push transport, in characters.
pub const MAX_TITLE_CHARS: usize = 80;
/// Longest body sent to the push transport, in characters.
pub const MAX_BODY_CHARS: usize = 200;

/// Plain-text payload delivered through push and reused as the email
/// subject line. Always sanitized before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    /// App-relative path opened when the notification is tapped.
    pub click_action: String,
}

impl NotificationPayload {
    /// Builds a payload ready for dispatch: markup stripped, title and
    /// body truncated to the transport limits.
    pub fn new(title: &str, body: &str, click_action: &str) -> Self {
        Self {
            title: truncate_chars(&strip_markup(title), MAX_TITLE_CHARS),
            body: truncate_chars(&strip_markup(body), MAX_BODY_CHARS),
            click_action: click_action.to_string(),
        }
    }
}

/// Removes markup tags and collapses the result to plain text.
///
/// Content bodies arrive as rich text; push payloads and subject lines
/// must be plain. Entities the editor commonly emits are unescaped,
/// runs of whitespace collapse to a single space.
pub fn strip_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                if in_tag {
                    in_tag = false;
                    out.push(' ');
                } else {
                    out.push(ch);
                }
            }
            _ if in_tag => {}
            _ => out.push(ch),
        }
    }

    let unescaped = out
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    unescaped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncates to at most `max` characters, counting chars not bytes so a
/// cut never lands inside a multi-byte sequence.
pub fn truncate_chars(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        return input.to_string();
    }
    input.chars().take(max).collect()
}
