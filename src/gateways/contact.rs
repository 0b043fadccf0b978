use std::sync::Arc;

use super::table::{Order, TableGateway};
use crate::{
    models::MessageStatus,
    record::Record,
    schema::CONTACT_MESSAGES,
    store::{Store, StoreResult},
};

const NEWEST: Order = Order::desc("createdAt");

#[derive(Clone)]
pub struct ContactGateway {
    table: TableGateway,
}

impl ContactGateway {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            table: TableGateway::new(&CONTACT_MESSAGES, store),
        }
    }

    pub async fn create(&self, message: Record) -> StoreResult<Record> {
        self.table.create(message).await
    }

    pub async fn list(&self, filter: Record, limit: Option<i64>) -> StoreResult<Vec<Record>> {
        self.table.find_all(filter, NEWEST, limit).await
    }

    pub async fn unread(&self) -> StoreResult<Vec<Record>> {
        let mut filter = Record::new();
        filter.insert("status".into(), MessageStatus::New.into());
        self.list(filter, None).await
    }

    pub async fn mark_as_read(&self, id: i32) -> StoreResult<Option<Record>> {
        let mut changes = Record::new();
        changes.insert("status".into(), MessageStatus::Read.into());
        self.table.update(id, changes).await
    }
}
