//! The one reusable read/write path over a single table. Callers speak
//! application naming; this is the only layer that translates to storage
//! naming, and every field name is checked against the table schema before
//! it reaches a store.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;

use crate::{
    record::{application_record, storage_key, Record},
    schema::{ColumnDefault, TableDef, ID, UPDATED_AT},
    store::{Direction, Increment, Selection, Store, StoreError, StoreResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub field: &'static str,
    pub direction: Direction,
}

impl Order {
    pub const fn asc(field: &'static str) -> Self {
        Self {
            field,
            direction: Direction::Asc,
        }
    }

    pub const fn desc(field: &'static str) -> Self {
        Self {
            field,
            direction: Direction::Desc,
        }
    }
}

impl Default for Order {
    fn default() -> Self {
        Self::desc(ID)
    }
}

/// Equality on every pair in `equals`, plus an optional `field >= date`.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub equals: Record,
    pub on_or_after: Option<(&'static str, NaiveDate)>,
}

impl Filter {
    pub fn equals(equals: Record) -> Self {
        Self {
            equals,
            on_or_after: None,
        }
    }

    pub fn on_or_after(mut self, field: &'static str, date: NaiveDate) -> Self {
        self.on_or_after = Some((field, date));
        self
    }
}

/// `field = field + by` in one store statement.
#[derive(Debug, Clone, Copy)]
pub struct Counter {
    pub field: &'static str,
    pub by: i64,
    pub ceiling: Option<&'static str>,
    pub touch: bool,
}

#[derive(Clone)]
pub struct TableGateway {
    table: &'static TableDef,
    store: Arc<dyn Store>,
}

impl TableGateway {
    pub fn new(table: &'static TableDef, store: Arc<dyn Store>) -> Self {
        Self { table, store }
    }

    fn column(&self, field: &str) -> StoreResult<&'static str> {
        let key = storage_key(field);
        if key == ID {
            return Ok(ID);
        }
        self.table
            .column(&key)
            .map(|c| c.name)
            .ok_or_else(|| StoreError::UnknownField {
                table: self.table.name.to_string(),
                field: field.to_string(),
            })
    }

    fn readable(&self, record: Record) -> StoreResult<Record> {
        record
            .into_iter()
            .map(|(field, value)| Ok((self.column(&field)?.to_string(), value)))
            .collect()
    }

    fn writable(&self, record: Record) -> StoreResult<Record> {
        let record = self.readable(record)?;
        if let Some(field) = record.keys().find(|k| *k == ID || *k == UPDATED_AT) {
            return Err(StoreError::ReadOnlyField {
                table: self.table.name.to_string(),
                field: field.clone(),
            });
        }
        Ok(record)
    }

    /// NOT NULL columns must not be written as null, and on insert must be
    /// present unless the column has a default. Checked here so every backend
    /// reports the same error.
    fn complete(&self, values: &Record, inserting: bool) -> StoreResult<()> {
        let missing = self.table.columns.iter().filter(|c| c.not_null).find(|c| {
            match values.get(c.name) {
                Some(value) => value.is_null(),
                None => inserting && c.default == ColumnDefault::None,
            }
        });
        match missing {
            Some(column) => Err(StoreError::ConstraintViolation {
                table: self.table.name.to_string(),
                message: format!("null value in column \"{}\"", column.name),
            }),
            None => Ok(()),
        }
    }

    fn logged<T>(&self, op: &'static str, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(e) = &result {
            tracing::error!(table = self.table.name, op, error = %e, "store operation failed");
        }
        result
    }

    pub async fn find_all(
        &self,
        filter: Record,
        order: Order,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Record>> {
        self.select(Filter::equals(filter), order, limit).await
    }

    pub async fn select(
        &self,
        filter: Filter,
        order: Order,
        limit: Option<i64>,
    ) -> StoreResult<Vec<Record>> {
        let on_or_after = match filter.on_or_after {
            Some((field, date)) => Some((self.column(field)?.to_string(), date)),
            None => None,
        };
        let selection = Selection {
            equals: self.readable(filter.equals)?,
            on_or_after,
            order_by: self.column(order.field)?.to_string(),
            direction: order.direction,
            limit,
        };
        let rows = self.logged("select", self.store.select(self.table, &selection).await)?;
        Ok(rows.into_iter().map(application_record).collect())
    }

    pub async fn find_by_id(&self, id: i32) -> StoreResult<Option<Record>> {
        let row = self.logged("find_by_id", self.store.find_by_id(self.table, id).await)?;
        Ok(row.map(application_record))
    }

    pub async fn create(&self, record: Record) -> StoreResult<Record> {
        let values = self.writable(record)?;
        self.complete(&values, true)?;
        let row = self.logged("create", self.store.insert(self.table, values).await)?;
        tracing::debug!(table = self.table.name, id = ?row.get(ID), "created");
        Ok(application_record(row))
    }

    pub async fn update(&self, id: i32, changes: Record) -> StoreResult<Option<Record>> {
        let changes = self.writable(changes)?;
        self.complete(&changes, false)?;
        let row = self.logged("update", self.store.update(self.table, id, changes).await)?;
        Ok(row.map(application_record))
    }

    /// Always `true` once the statement ran; a missing row is not an error.
    pub async fn delete(&self, id: i32) -> StoreResult<bool> {
        self.logged("delete", self.store.delete(self.table, id).await)?;
        Ok(true)
    }

    pub async fn increment(&self, id: i32, counter: Counter) -> StoreResult<Option<Record>> {
        let ceiling = match counter.ceiling {
            Some(field) => Some(self.column(field)?),
            None => None,
        };
        let increment = Increment {
            column: self.column(counter.field)?,
            by: counter.by,
            ceiling,
            touch: counter.touch,
        };
        let row = self.logged("increment", self.store.increment(self.table, id, increment).await)?;
        Ok(row.map(application_record))
    }

    pub async fn count(&self, filter: Record) -> StoreResult<i64> {
        let equals = self.readable(filter)?;
        self.logged("count", self.store.count(self.table, &equals).await)
    }

    pub async fn count_by(&self, field: &str) -> StoreResult<Vec<(Value, i64)>> {
        let column = self.column(field)?;
        self.logged("count_by", self.store.count_by(self.table, column).await)
    }

    pub async fn sum(&self, field: &str, filter: Record) -> StoreResult<i64> {
        let column = self.column(field)?;
        let equals = self.readable(filter)?;
        self.logged("sum", self.store.sum(self.table, column, &equals).await)
    }
}
