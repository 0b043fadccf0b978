//! PostgreSQL backend. Every operation is a single statement. Table and
//! column names come from the static schema; record values travel as one
//! `jsonb` parameter and are spread into columns with
//! `jsonb_populate_record`, rows come back through `to_jsonb`.
//!
//! Queries go through `sql_query` rather than diesel's typed DSL: filters,
//! ordering and written columns are chosen per request from a flat record,
//! and one generic gateway serves all seven tables, so there is no fixed
//! `table!` type to build them against. Only schema-checked identifiers are
//! ever formatted into the SQL text.

use async_trait::async_trait;
use deadpool::managed::Object;
use diesel::{
    pg::Pg,
    result::{DatabaseErrorKind, Error as DieselError},
    sql_query,
    sql_types::{BigInt, Date, Integer, Jsonb, Nullable},
    OptionalExtension, QueryableByName,
};
use diesel_async::{
    pooled_connection::AsyncDieselConnectionManager, AsyncPgConnection, RunQueryDsl,
    SimpleAsyncConnection,
};
use serde_json::Value;

use super::{Direction, Increment, Selection, Store, StoreError, StoreResult};
use crate::{
    record::Record,
    schema::{TableDef, ID, TABLES, UPDATED_AT},
    DbPool,
};

#[derive(QueryableByName)]
struct JsonRow {
    #[diesel(sql_type = Jsonb)]
    data: Value,
}

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

#[derive(QueryableByName)]
struct GroupRow {
    #[diesel(sql_type = Nullable<Jsonb>)]
    value: Option<Value>,
    #[diesel(sql_type = BigInt)]
    count: i64,
}

#[derive(QueryableByName)]
struct SumRow {
    #[diesel(sql_type = BigInt)]
    total: i64,
}

fn select_sql(table: &TableDef, selection: &Selection) -> String {
    let mut sql = format!(
        "SELECT to_jsonb(t) AS data FROM {} AS t WHERE to_jsonb(t) @> $1",
        table.name
    );
    if let Some((column, _)) = &selection.on_or_after {
        sql.push_str(&format!(" AND t.{column} >= $2"));
    }
    let direction = selection.direction.as_sql();
    sql.push_str(&format!(" ORDER BY t.{} {direction}", selection.order_by));
    if selection.order_by != ID {
        sql.push_str(&format!(", t.id {direction}"));
    }
    if let Some(limit) = selection.limit {
        sql.push_str(&format!(" LIMIT {}", limit.max(0)));
    }
    sql
}

fn find_by_id_sql(table: &TableDef) -> String {
    format!("SELECT to_jsonb(t) AS data FROM {} AS t WHERE t.id = $1", table.name)
}

fn insert_sql(table: &TableDef, columns: &[&str]) -> String {
    if columns.is_empty() {
        return format!(
            "INSERT INTO {} AS t DEFAULT VALUES RETURNING to_jsonb(t) AS data",
            table.name
        );
    }
    let targets = columns.join(", ");
    let sources = columns
        .iter()
        .map(|c| format!("r.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {table} AS t ({targets}) SELECT {sources} \
         FROM jsonb_populate_record(NULL::{table}, $1) AS r \
         RETURNING to_jsonb(t) AS data",
        table = table.name
    )
}

fn update_sql(table: &TableDef, columns: &[&str]) -> String {
    let assignments = columns
        .iter()
        .map(|c| format!("{c} = r.{c}"))
        .chain(std::iter::once(format!("{UPDATED_AT} = now()")))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {table} AS t SET {assignments} \
         FROM jsonb_populate_record(NULL::{table}, $1) AS r \
         WHERE t.id = $2 RETURNING to_jsonb(t) AS data",
        table = table.name
    )
}

fn increment_sql(table: &TableDef, increment: &Increment) -> String {
    let column = increment.column;
    let mut sql = format!("UPDATE {} AS t SET {column} = t.{column} + $2", table.name);
    if increment.touch {
        sql.push_str(&format!(", {UPDATED_AT} = now()"));
    }
    sql.push_str(" WHERE t.id = $1");
    if let Some(ceiling) = increment.ceiling {
        sql.push_str(&format!(
            " AND (t.{ceiling} IS NULL OR t.{column} + $2 <= t.{ceiling})"
        ));
    }
    sql.push_str(" RETURNING to_jsonb(t) AS data");
    sql
}

fn count_sql(table: &TableDef) -> String {
    format!(
        "SELECT COUNT(*) AS count FROM {} AS t WHERE to_jsonb(t) @> $1",
        table.name
    )
}

fn count_by_sql(table: &TableDef, column: &str) -> String {
    format!(
        "SELECT to_jsonb(t.{column}) AS value, COUNT(*) AS count FROM {} AS t GROUP BY t.{column}",
        table.name
    )
}

fn sum_sql(table: &TableDef, column: &str) -> String {
    format!(
        "SELECT COALESCE(SUM(t.{column}), 0)::BIGINT AS total FROM {} AS t WHERE to_jsonb(t) @> $1",
        table.name
    )
}

fn into_record(row: JsonRow) -> StoreResult<Record> {
    match row.data {
        Value::Object(record) => Ok(record),
        other => Err(StoreError::Query(format!("expected a row object, got {other}"))),
    }
}

fn violates_check(table: &TableDef, constraint: Option<&str>) -> bool {
    constraint.map_or(false, |name| {
        table.checks.iter().any(|check| check.name(table.name) == name)
    })
}

fn storage_error(table: &TableDef, err: DieselError) -> StoreError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            StoreError::UniqueViolation {
                table: table.name.to_string(),
                constraint: info.constraint_name().unwrap_or_default().to_string(),
            }
        }
        DieselError::DatabaseError(
            DatabaseErrorKind::ForeignKeyViolation
            | DatabaseErrorKind::NotNullViolation
            | DatabaseErrorKind::CheckViolation,
            info,
        ) => StoreError::ConstraintViolation {
            table: table.name.to_string(),
            message: info.message().to_string(),
        },
        // diesel 2.0 reports CHECK failures as `Unknown`; the constraint name
        // still identifies them.
        DieselError::DatabaseError(_, info) if violates_check(table, info.constraint_name()) => {
            StoreError::ConstraintViolation {
                table: table.name.to_string(),
                message: info.message().to_string(),
            }
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            StoreError::Connection(info.message().to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> StoreResult<Object<AsyncDieselConnectionManager<AsyncPgConnection>>> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }

    /// Creates missing tables. Existing tables are left as they are.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        for table in TABLES {
            conn.batch_execute(&table.create_statement())
                .await
                .map_err(|e| storage_error(table, e))?;
            tracing::debug!(table = table.name, "table ready");
        }
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn select(&self, table: &'static TableDef, selection: &Selection) -> StoreResult<Vec<Record>> {
        let mut conn = self.connection().await?;
        let query = sql_query(select_sql(table, selection))
            .into_boxed::<Pg>()
            .bind::<Jsonb, _>(Value::Object(selection.equals.clone()));
        let query = match &selection.on_or_after {
            Some((_, date)) => query.bind::<Date, _>(*date),
            None => query,
        };
        query
            .load::<JsonRow>(&mut *conn)
            .await
            .map_err(|e| storage_error(table, e))?
            .into_iter()
            .map(into_record)
            .collect()
    }

    async fn find_by_id(&self, table: &'static TableDef, id: i32) -> StoreResult<Option<Record>> {
        let mut conn = self.connection().await?;
        sql_query(find_by_id_sql(table))
            .bind::<Integer, _>(id)
            .get_result::<JsonRow>(&mut *conn)
            .await
            .optional()
            .map_err(|e| storage_error(table, e))?
            .map(into_record)
            .transpose()
    }

    async fn insert(&self, table: &'static TableDef, values: Record) -> StoreResult<Record> {
        let columns: Vec<&str> = values.keys().map(String::as_str).collect();
        let sql = insert_sql(table, &columns);
        let mut conn = self.connection().await?;
        let row = sql_query(sql)
            .bind::<Jsonb, _>(Value::Object(values))
            .get_result::<JsonRow>(&mut *conn)
            .await
            .map_err(|e| storage_error(table, e))?;
        into_record(row)
    }

    async fn update(&self, table: &'static TableDef, id: i32, changes: Record) -> StoreResult<Option<Record>> {
        let columns: Vec<&str> = changes.keys().map(String::as_str).collect();
        let sql = update_sql(table, &columns);
        let mut conn = self.connection().await?;
        sql_query(sql)
            .bind::<Jsonb, _>(Value::Object(changes))
            .bind::<Integer, _>(id)
            .get_result::<JsonRow>(&mut *conn)
            .await
            .optional()
            .map_err(|e| storage_error(table, e))?
            .map(into_record)
            .transpose()
    }

    async fn delete(&self, table: &'static TableDef, id: i32) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        sql_query(format!("DELETE FROM {} WHERE id = $1", table.name))
            .bind::<Integer, _>(id)
            .execute(&mut *conn)
            .await
            .map_err(|e| storage_error(table, e))?;
        Ok(())
    }

    async fn increment(&self, table: &'static TableDef, id: i32, increment: Increment) -> StoreResult<Option<Record>> {
        let mut conn = self.connection().await?;
        sql_query(increment_sql(table, &increment))
            .bind::<Integer, _>(id)
            .bind::<BigInt, _>(increment.by)
            .get_result::<JsonRow>(&mut *conn)
            .await
            .optional()
            .map_err(|e| storage_error(table, e))?
            .map(into_record)
            .transpose()
    }

    async fn count(&self, table: &'static TableDef, equals: &Record) -> StoreResult<i64> {
        let mut conn = self.connection().await?;
        let row = sql_query(count_sql(table))
            .bind::<Jsonb, _>(Value::Object(equals.clone()))
            .get_result::<CountRow>(&mut *conn)
            .await
            .map_err(|e| storage_error(table, e))?;
        Ok(row.count)
    }

    async fn count_by(&self, table: &'static TableDef, column: &str) -> StoreResult<Vec<(Value, i64)>> {
        let mut conn = self.connection().await?;
        let rows = sql_query(count_by_sql(table, column))
            .load::<GroupRow>(&mut *conn)
            .await
            .map_err(|e| storage_error(table, e))?;
        Ok(rows
            .into_iter()
            .map(|row| (row.value.unwrap_or(Value::Null), row.count))
            .collect())
    }

    async fn sum(&self, table: &'static TableDef, column: &str, equals: &Record) -> StoreResult<i64> {
        let mut conn = self.connection().await?;
        let row = sql_query(sum_sql(table, column))
            .bind::<Jsonb, _>(Value::Object(equals.clone()))
            .get_result::<SumRow>(&mut *conn)
            .await
            .map_err(|e| storage_error(table, e))?;
        Ok(row.total)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        conn.batch_execute("SELECT 1")
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EVENTS, MEMBERS, NEWS};
    use chrono::NaiveDate;

    #[test]
    fn select_defaults_to_id_descending() {
        assert_eq!(
            select_sql(&MEMBERS, &Selection::all()),
            "SELECT to_jsonb(t) AS data FROM members AS t WHERE to_jsonb(t) @> $1 ORDER BY t.id DESC"
        );
    }

    #[test]
    fn select_with_date_bound_order_and_limit() {
        let selection = Selection {
            on_or_after: Some((
                "event_date".to_string(),
                NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            )),
            order_by: "event_date".to_string(),
            direction: Direction::Asc,
            limit: Some(3),
            ..Selection::all()
        };
        assert_eq!(
            select_sql(&EVENTS, &selection),
            "SELECT to_jsonb(t) AS data FROM events AS t WHERE to_jsonb(t) @> $1 \
             AND t.event_date >= $2 ORDER BY t.event_date ASC, t.id ASC LIMIT 3"
        );
    }

    #[test]
    fn insert_spreads_the_json_parameter() {
        assert_eq!(
            insert_sql(&MEMBERS, &["email", "name"]),
            "INSERT INTO members AS t (email, name) SELECT r.email, r.name \
             FROM jsonb_populate_record(NULL::members, $1) AS r RETURNING to_jsonb(t) AS data"
        );
        assert_eq!(
            insert_sql(&MEMBERS, &[]),
            "INSERT INTO members AS t DEFAULT VALUES RETURNING to_jsonb(t) AS data"
        );
    }

    #[test]
    fn update_always_refreshes_modification_time() {
        assert_eq!(
            update_sql(&NEWS, &["title"]),
            "UPDATE news AS t SET title = r.title, updated_at = now() \
             FROM jsonb_populate_record(NULL::news, $1) AS r WHERE t.id = $2 RETURNING to_jsonb(t) AS data"
        );
        assert!(update_sql(&NEWS, &[]).contains("SET updated_at = now() FROM"));
    }

    #[test]
    fn increment_is_a_single_bounded_statement() {
        let seat = Increment {
            column: "current_participants",
            by: 1,
            ceiling: Some("max_participants"),
            touch: true,
        };
        assert_eq!(
            increment_sql(&EVENTS, &seat),
            "UPDATE events AS t SET current_participants = t.current_participants + $2, updated_at = now() \
             WHERE t.id = $1 AND (t.max_participants IS NULL OR t.current_participants + $2 <= t.max_participants) \
             RETURNING to_jsonb(t) AS data"
        );

        let views = Increment {
            column: "views",
            by: 1,
            ceiling: None,
            touch: false,
        };
        assert_eq!(
            increment_sql(&NEWS, &views),
            "UPDATE news AS t SET views = t.views + $2 WHERE t.id = $1 RETURNING to_jsonb(t) AS data"
        );
    }

    #[test]
    fn aggregates_stay_in_the_database() {
        assert_eq!(
            count_by_sql(&MEMBERS, "school"),
            "SELECT to_jsonb(t.school) AS value, COUNT(*) AS count FROM members AS t GROUP BY t.school"
        );
        assert!(sum_sql(&NEWS, "views").starts_with("SELECT COALESCE(SUM(t.views), 0)::BIGINT"));
        assert!(count_sql(&NEWS).ends_with("WHERE to_jsonb(t) @> $1"));
    }

    #[test]
    fn check_failures_are_recognised_by_constraint_name() {
        assert!(violates_check(&EVENTS, Some("events_current_participants_limit_check")));
        assert!(violates_check(&EVENTS, Some("events_max_participants_check")));
        assert!(!violates_check(&EVENTS, Some("events_pkey")));
        assert!(!violates_check(&MEMBERS, Some("events_max_participants_check")));
        assert!(!violates_check(&EVENTS, None));
    }
}
