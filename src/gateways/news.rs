use std::sync::Arc;

use serde_json::json;

use super::table::{Counter, Order, TableGateway};
use crate::{
    record::Record,
    schema::NEWS,
    store::{Store, StoreResult},
};

const NEWEST: Order = Order::desc("publishDate");

#[derive(Clone)]
pub struct NewsGateway {
    table: TableGateway,
}

impl NewsGateway {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            table: TableGateway::new(&NEWS, store),
        }
    }

    pub fn table(&self) -> &TableGateway {
        &self.table
    }

    pub async fn find_by_id(&self, id: i32) -> StoreResult<Option<Record>> {
        self.table.find_by_id(id).await
    }

    pub async fn create(&self, article: Record) -> StoreResult<Record> {
        self.table.create(article).await
    }

    pub async fn update(&self, id: i32, changes: Record) -> StoreResult<Option<Record>> {
        self.table.update(id, changes).await
    }

    pub async fn delete(&self, id: i32) -> StoreResult<bool> {
        self.table.delete(id).await
    }

    pub async fn featured(&self, limit: i64) -> StoreResult<Vec<Record>> {
        let mut filter = Record::new();
        filter.insert("featured".into(), json!(true));
        filter.insert("published".into(), json!(true));
        self.table.find_all(filter, NEWEST, Some(limit)).await
    }

    /// Published articles, narrowed further by whatever `filter` holds.
    pub async fn published(&self, mut filter: Record, limit: Option<i64>) -> StoreResult<Vec<Record>> {
        filter.insert("published".into(), json!(true));
        self.table.find_all(filter, NEWEST, limit).await
    }

    /// Bumps the view counter without reading it back.
    pub async fn increment_views(&self, id: i32) -> StoreResult<()> {
        self.table
            .increment(
                id,
                Counter {
                    field: "views",
                    by: 1,
                    ceiling: None,
                    touch: false,
                },
            )
            .await?;
        Ok(())
    }
}
