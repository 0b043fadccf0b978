use std::{collections::BTreeMap, sync::Arc};

use serde::Serialize;
use serde_json::{json, Value};

use super::table::{Order, TableGateway};
use crate::{
    models::MemberStatus,
    record::Record,
    schema::MEMBERS,
    store::{Store, StoreResult},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberStats {
    pub total: i64,
    pub active: i64,
    pub pending: i64,
    /// Members without a school are not listed.
    pub by_school: BTreeMap<String, i64>,
}

#[derive(Clone)]
pub struct MemberGateway {
    table: TableGateway,
}

impl MemberGateway {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            table: TableGateway::new(&MEMBERS, store),
        }
    }

    pub fn table(&self) -> &TableGateway {
        &self.table
    }

    pub async fn list(&self, filter: Record) -> StoreResult<Vec<Record>> {
        self.table
            .find_all(filter, Order::desc("createdAt"), None)
            .await
    }

    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<Record>> {
        let mut filter = Record::new();
        filter.insert("email".into(), json!(email));
        Ok(self
            .table
            .find_all(filter, Order::default(), Some(1))
            .await?
            .pop())
    }

    pub async fn create(&self, member: Record) -> StoreResult<Record> {
        self.table.create(member).await
    }

    pub async fn stats(&self) -> StoreResult<MemberStats> {
        let mut stats = MemberStats {
            total: self.table.count(Record::new()).await?,
            ..MemberStats::default()
        };
        for (status, count) in self.table.count_by("status").await? {
            match status.as_str() {
                Some(s) if s == MemberStatus::Active.as_str() => stats.active = count,
                Some(s) if s == MemberStatus::Pending.as_str() => stats.pending = count,
                _ => {}
            }
        }
        for (school, count) in self.table.count_by("school").await? {
            if let Value::String(school) = school {
                stats.by_school.insert(school, count);
            }
        }
        Ok(stats)
    }
}
