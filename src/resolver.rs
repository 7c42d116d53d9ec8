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

//! Audience resolution.
//!
//! Expands a logical audience descriptor into a deduplicated set of user
//! ids. Children are never recipients themselves: any id that resolves
//! to a child record expands to that child's guardians, and the
//! guardian→child link is kept for message personalization. An id that
//! is not a child passes through as a user id, which covers legacy
//! payloads that listed users directly.

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::dal::DAL;
use crate::error::{LedgerError, ResolveError};
use crate::models::child::ChildRecord;
use crate::models::user::Role;

/// Logical audience of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Audience {
    /// Fixed list of entity ids (users or children).
    Explicit { ids: Vec<String> },
    /// Every active user holding one of the given roles.
    Global { roles: Vec<String> },
    /// Guardians of the cohort's children plus staff assigned to it.
    Cohort { key: String },
    /// Guardians of children enrolled in a named special activity.
    Activity { name: String },
}

/// Resolved recipients: unique user ids plus the child each guardian
/// was reached through, when resolution went via a child record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientSet {
    ids: BTreeSet<String>,
    child_links: BTreeMap<String, Vec<String>>,
}

impl RecipientSet {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Recipient ids, duplicate-free. Order carries no meaning.
    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }

    /// Children the given guardian was reached through, if any.
    pub fn children_of(&self, guardian_id: &str) -> &[String] {
        self.child_links
            .get(guardian_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn add_user(&mut self, id: String) {
        self.ids.insert(id);
    }

    fn add_guardian(&mut self, guardian_id: String, child_id: &str) {
        let links = self.child_links.entry(guardian_id.clone()).or_default();
        if !links.iter().any(|c| c == child_id) {
            links.push(child_id.to_string());
        }
        self.ids.insert(guardian_id);
    }
}

/// Lookup seam for resolving a single entity id to a child record.
///
/// The default implementation reads the ledger; tests inject failing
/// lookups to exercise per-id isolation.
#[async_trait]
pub trait ChildLookup: Send + Sync {
    async fn child_by_id(&self, id: &str) -> Result<Option<ChildRecord>, LedgerError>;
}

struct LedgerChildLookup {
    dal: DAL,
}

#[async_trait]
impl ChildLookup for LedgerChildLookup {
    async fn child_by_id(&self, id: &str) -> Result<Option<ChildRecord>, LedgerError> {
        self.dal.children().get_by_id(id).await
    }
}

/// Expands audience descriptors against the ledger's read model.
#[derive(Clone)]
pub struct RecipientResolver {
    dal: DAL,
    children: Arc<dyn ChildLookup>,
}

impl RecipientResolver {
    pub fn new(dal: DAL) -> Self {
        let children = Arc::new(LedgerChildLookup { dal: dal.clone() });
        Self { dal, children }
    }

    /// Resolver with an injected child lookup.
    pub fn with_child_lookup(dal: DAL, children: Arc<dyn ChildLookup>) -> Self {
        Self { dal, children }
    }

    /// Resolves a descriptor to its recipient set.
    ///
    /// A lookup failure for a single id is logged and that id skipped;
    /// only whole-query failures (cohort scan, role scan) propagate.
    pub async fn resolve(&self, audience: &Audience) -> Result<RecipientSet, ResolveError> {
        let set = match audience {
            Audience::Explicit { ids } => self.expand_entity_ids(ids).await,
            Audience::Global { roles } => self.resolve_global(roles).await?,
            Audience::Cohort { key } => self.resolve_cohort(key).await?,
            Audience::Activity { name } => self.resolve_activity(name).await?,
        };
        debug!(recipients = set.len(), "Resolved audience");
        Ok(set)
    }

    async fn resolve_global(&self, roles: &[String]) -> Result<RecipientSet, ResolveError> {
        let roles: Vec<Role> = roles.iter().map(|r| Role::parse(r)).collect();
        let users = self.dal.users().get_active_by_roles(&roles).await?;

        let mut set = RecipientSet::default();
        for user in users {
            set.add_user(user.id);
        }
        Ok(set)
    }

    async fn resolve_cohort(&self, key: &str) -> Result<RecipientSet, ResolveError> {
        let mut set = RecipientSet::default();

        for child in self.dal.children().get_by_cohort(key).await? {
            for guardian in child.guardian_ids() {
                set.add_guardian(guardian, &child.id);
            }
        }
        for staff in self.dal.users().get_staff_by_cohort(key).await? {
            set.add_user(staff.id);
        }
        Ok(set)
    }

    async fn resolve_activity(&self, name: &str) -> Result<RecipientSet, ResolveError> {
        let mut set = RecipientSet::default();
        for child in self.dal.children().get_by_activity(name).await? {
            for guardian in child.guardian_ids() {
                set.add_guardian(guardian, &child.id);
            }
        }
        Ok(set)
    }

    /// Expands a list of entity ids, going through the child→guardian
    /// indirection where an id names a child.
    ///
    /// Lookups run concurrently. An id whose lookup fails is skipped so
    /// one bad record cannot sink the whole batch.
    async fn expand_entity_ids(&self, ids: &[String]) -> RecipientSet {
        let unique: BTreeSet<&String> = ids.iter().collect();
        let lookups = unique.iter().map(|id| {
            let id = (*id).clone();
            async move {
                let result = self.children.child_by_id(&id).await;
                (id, result)
            }
        });

        let mut set = RecipientSet::default();
        for (id, result) in join_all(lookups).await {
            match result {
                Ok(Some(child)) => {
                    for guardian in child.guardian_ids() {
                        set.add_guardian(guardian, &child.id);
                    }
                }
                Ok(None) => {
                    // Not a child; the id is already a user id.
                    set.add_user(id);
                }
                Err(e) => {
                    warn!(entity_id = %id, error = %e, "Skipping unresolvable audience entry");
                }
            }
        }
        set
    }

    /// Reconciles the resolved set with a notification's persisted
    /// recipient list and returns the union.
    pub async fn merge_persisted(
        &self,
        notification_id: &str,
        resolved: &RecipientSet,
    ) -> Result<Vec<String>, ResolveError> {
        let merged = self
            .dal
            .notifications()
            .merge_recipients(notification_id, resolved.ids())
            .await?;
        Ok(merged)
    }
}
