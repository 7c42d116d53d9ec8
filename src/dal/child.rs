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

//! DAL for child records.

use super::{interact_err, DAL};
use crate::error::LedgerError;
use crate::models::child::ChildRecord;
use diesel::prelude::*;

/// Data access layer for child read-model operations.
#[derive(Clone)]
pub struct ChildDAL<'a> {
    dal: &'a DAL,
}

impl<'a> ChildDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Fetches one child by id.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<ChildRecord>, LedgerError> {
        use crate::database::schema::children;

        let conn = self.dal.conn().await?;
        let id = id.to_string();
        let record = conn
            .interact(move |conn| {
                children::table
                    .find(id)
                    .select(ChildRecord::as_select())
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(interact_err)??;
        Ok(record)
    }

    /// All children tagged with the given cohort key.
    pub async fn get_by_cohort(&self, cohort: &str) -> Result<Vec<ChildRecord>, LedgerError> {
        use crate::database::schema::children;

        let conn = self.dal.conn().await?;
        let cohort = cohort.to_string();
        let records = conn
            .interact(move |conn| {
                children::table
                    .filter(children::cohort.eq(cohort))
                    .select(ChildRecord::as_select())
                    .load(conn)
            })
            .await
            .map_err(interact_err)??;
        Ok(records)
    }

    /// All children enrolled in the named special activity.
    ///
    /// The activities column is a JSON array of names; the LIKE probe on
    /// the quoted name narrows the scan and the parsed list is checked
    /// afterwards to rule out substring matches.
    pub async fn get_by_activity(&self, activity: &str) -> Result<Vec<ChildRecord>, LedgerError> {
        use crate::database::schema::children;

        let conn = self.dal.conn().await?;
        let name = activity.to_string();
        let pattern = format!("%\"{}\"%", name.replace('%', "").replace('_', ""));
        let records: Vec<ChildRecord> = conn
            .interact(move |conn| {
                children::table
                    .filter(children::activities.like(pattern))
                    .select(ChildRecord::as_select())
                    .load(conn)
            })
            .await
            .map_err(interact_err)??;

        Ok(records
            .into_iter()
            .filter(|c| c.activity_names().iter().any(|a| a == activity))
            .collect())
    }
}
