//! Storage backends. Everything below this module speaks storage naming
//! (snake_case columns) and trusts that column names were checked against
//! the table schema by the gateway.

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::{record::Record, schema::TableDef};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Connection(String),

    #[error("duplicate value violates `{constraint}` on `{table}`")]
    UniqueViolation { table: String, constraint: String },

    #[error("constraint violated on `{table}`: {message}")]
    ConstraintViolation { table: String, message: String },

    #[error("`{table}` has no field `{field}`")]
    UnknownField { table: String, field: String },

    #[error("field `{field}` of `{table}` cannot be written")]
    ReadOnlyField { table: String, field: String },

    #[error("query failed: {0}")]
    Query(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// A read over one table: equality on every `equals` pair, an optional
/// lower date bound, ordering and an optional row cap.
#[derive(Debug, Clone)]
pub struct Selection {
    pub equals: Record,
    pub on_or_after: Option<(String, NaiveDate)>,
    pub order_by: String,
    pub direction: Direction,
    pub limit: Option<i64>,
}

impl Selection {
    pub fn all() -> Self {
        Self {
            equals: Record::new(),
            on_or_after: None,
            order_by: crate::schema::ID.to_string(),
            direction: Direction::Desc,
            limit: None,
        }
    }
}

/// `column = column + by`, applied as one statement.
#[derive(Debug, Clone, Copy)]
pub struct Increment {
    pub column: &'static str,
    pub by: i64,
    /// Refuse the change when it would push `column` above this column's
    /// value. A NULL ceiling means unbounded.
    pub ceiling: Option<&'static str>,
    /// Refresh `updated_at` alongside the counter.
    pub touch: bool,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn select(&self, table: &'static TableDef, selection: &Selection) -> StoreResult<Vec<Record>>;

    async fn find_by_id(&self, table: &'static TableDef, id: i32) -> StoreResult<Option<Record>>;

    /// Inserts one row and returns it as stored, defaults included.
    async fn insert(&self, table: &'static TableDef, values: Record) -> StoreResult<Record>;

    /// Applies `changes` and refreshes `updated_at`. `None` if no such row.
    async fn update(&self, table: &'static TableDef, id: i32, changes: Record) -> StoreResult<Option<Record>>;

    /// Succeeds whether or not the row existed.
    async fn delete(&self, table: &'static TableDef, id: i32) -> StoreResult<()>;

    /// `None` if no such row or the ceiling refused the change.
    async fn increment(&self, table: &'static TableDef, id: i32, increment: Increment) -> StoreResult<Option<Record>>;

    async fn count(&self, table: &'static TableDef, equals: &Record) -> StoreResult<i64>;

    /// Row counts grouped by the value of `column`.
    async fn count_by(&self, table: &'static TableDef, column: &str) -> StoreResult<Vec<(Value, i64)>>;

    async fn sum(&self, table: &'static TableDef, column: &str, equals: &Record) -> StoreResult<i64>;

    async fn ping(&self) -> StoreResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(format!("unknown storage backend `{other}`")),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
        })
    }
}
