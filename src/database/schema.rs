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

//! Diesel table definitions for the ledger schema.
//!
//! Identifiers are opaque TEXT keys from the upstream user store, timestamps
//! are RFC3339 TEXT, and string-set columns hold JSON arrays.

diesel::table! {
    users (id) {
        id -> Text,
        display_name -> Text,
        email -> Nullable<Text>,
        role -> Text,
        disabled -> Integer,
        assigned_cohort -> Nullable<Text>,
        fcm_tokens -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    children (id) {
        id -> Text,
        display_name -> Text,
        cohort -> Text,
        guardians -> Text,
        activities -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    event_locks (id) {
        id -> Text,
        event_type -> Text,
        natural_key -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    notifications (id) {
        id -> Text,
        kind -> Text,
        title -> Text,
        body -> Text,
        click_action -> Text,
        send_by_email -> Integer,
        delivery_state -> Text,
        recipients -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    email_statuses (notification_id, recipient_id) {
        notification_id -> Text,
        recipient_id -> Text,
        status -> Text,
        email -> Nullable<Text>,
        attempts -> Integer,
        last_error -> Nullable<Text>,
        provider_message_id -> Nullable<Text>,
        sent_at -> Nullable<Text>,
        failed_at -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(users, children, event_locks, notifications, email_statuses,);
