use std::{cmp::Ordering, collections::BTreeMap, collections::HashMap};

use async_trait::async_trait;
use chrono::{NaiveDate, SecondsFormat, Utc};
use itertools::Itertools;
use parking_lot::Mutex;
use serde_json::Value;

use super::{Direction, Increment, Selection, Store, StoreError, StoreResult};
use crate::{
    record::Record,
    schema::{Check, ColumnDefault, TableDef, ID, UPDATED_AT},
};

#[derive(Default)]
struct Table {
    last_id: i32,
    rows: BTreeMap<i32, Record>,
}

/// Non-persistent store for tests and local development. Column defaults,
/// NOT NULL, UNIQUE and foreign references from the schema are enforced the
/// way PostgreSQL enforces them, so callers see the same failures.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<&'static str, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false))
}

fn default_value(default: ColumnDefault) -> Value {
    match default {
        ColumnDefault::None => Value::Null,
        ColumnDefault::Text(s) => Value::String(s.to_string()),
        ColumnDefault::Int(i) => Value::from(i),
        ColumnDefault::Bool(b) => Value::Bool(b),
        ColumnDefault::Now => now(),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

/// NULL compares greater than everything, as in PostgreSQL.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn field<'a>(row: &'a Record, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn date_of(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?;
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()
}

fn matches(row: &Record, equals: &Record) -> bool {
    equals
        .iter()
        .all(|(column, expected)| values_equal(field(row, column), expected))
}

fn row_id(row: &Record) -> i64 {
    field(row, ID).as_i64().unwrap_or_default()
}

fn unknown_field(table: &TableDef, field: &str) -> StoreError {
    StoreError::UnknownField {
        table: table.name.to_string(),
        field: field.to_string(),
    }
}

fn check_not_null(table: &TableDef, row: &Record) -> StoreResult<()> {
    match table
        .columns
        .iter()
        .find(|c| c.not_null && field(row, c.name).is_null())
    {
        Some(column) => Err(StoreError::ConstraintViolation {
            table: table.name.to_string(),
            message: format!("null value in column \"{}\"", column.name),
        }),
        None => Ok(()),
    }
}

fn check_rules(table: &TableDef, row: &Record) -> StoreResult<()> {
    let number = |column: &str| field(row, column).as_f64();
    let violated = table.checks.iter().find(|check| match **check {
        Check::NonNegative(column) => number(column).map_or(false, |n| n < 0.0),
        Check::AtMost { column, limit } => match (number(column), number(limit)) {
            (Some(n), Some(limit)) => n > limit,
            _ => false,
        },
    });
    match violated {
        Some(check) => Err(StoreError::ConstraintViolation {
            table: table.name.to_string(),
            message: format!("new row violates check constraint \"{}\"", check.name(table.name)),
        }),
        None => Ok(()),
    }
}

fn check_unique(table: &TableDef, rows: &BTreeMap<i32, Record>, row: &Record) -> StoreResult<()> {
    let id = row_id(row);
    for column in table.columns.iter().filter(|c| c.unique) {
        let value = field(row, column.name);
        if value.is_null() {
            continue;
        }
        if rows
            .values()
            .any(|other| row_id(other) != id && values_equal(field(other, column.name), value))
        {
            return Err(StoreError::UniqueViolation {
                table: table.name.to_string(),
                constraint: format!("{}_{}_key", table.name, column.name),
            });
        }
    }
    Ok(())
}

fn check_references(
    tables: &HashMap<&'static str, Table>,
    table: &TableDef,
    row: &Record,
) -> StoreResult<()> {
    for column in table.columns {
        let Some(target) = column.references else {
            continue;
        };
        let value = field(row, column.name);
        if value.is_null() {
            continue;
        }
        let exists = value
            .as_i64()
            .and_then(|id| i32::try_from(id).ok())
            .and_then(|id| tables.get(target).map(|t| t.rows.contains_key(&id)))
            .unwrap_or(false);
        if !exists {
            return Err(StoreError::ConstraintViolation {
                table: table.name.to_string(),
                message: format!("{}={} is not present in table \"{target}\"", column.name, value),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, table: &'static TableDef, selection: &Selection) -> StoreResult<Vec<Record>> {
        let tables = self.tables.lock();
        let Some(t) = tables.get(table.name) else {
            return Ok(Vec::new());
        };

        let ordering = |a: &&Record, b: &&Record| {
            let by_column = compare_values(field(a, &selection.order_by), field(b, &selection.order_by))
                .then_with(|| row_id(a).cmp(&row_id(b)));
            match selection.direction {
                Direction::Asc => by_column,
                Direction::Desc => by_column.reverse(),
            }
        };
        let limit = selection
            .limit
            .map(|l| usize::try_from(l).unwrap_or(0))
            .unwrap_or(usize::MAX);

        Ok(t.rows
            .values()
            .filter(|row| matches(row, &selection.equals))
            .filter(|row| match &selection.on_or_after {
                Some((column, bound)) => date_of(field(row, column)).map_or(false, |d| d >= *bound),
                None => true,
            })
            .sorted_by(ordering)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, table: &'static TableDef, id: i32) -> StoreResult<Option<Record>> {
        Ok(self
            .tables
            .lock()
            .get(table.name)
            .and_then(|t| t.rows.get(&id))
            .cloned())
    }

    async fn insert(&self, table: &'static TableDef, mut values: Record) -> StoreResult<Record> {
        let mut tables = self.tables.lock();

        let mut row = Record::new();
        for column in table.columns {
            let value = values
                .remove(column.name)
                .unwrap_or_else(|| default_value(column.default));
            row.insert(column.name.to_string(), value);
        }
        if let Some(extra) = values.keys().next() {
            return Err(unknown_field(table, extra));
        }

        check_not_null(table, &row)?;
        check_rules(table, &row)?;
        check_references(&tables, table, &row)?;

        let t = tables.entry(table.name).or_default();
        let id = t.last_id + 1;
        row.insert(ID.to_string(), Value::from(id));
        check_unique(table, &t.rows, &row)?;

        t.last_id = id;
        t.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn update(&self, table: &'static TableDef, id: i32, changes: Record) -> StoreResult<Option<Record>> {
        let mut tables = self.tables.lock();
        let Some(current) = tables.get(table.name).and_then(|t| t.rows.get(&id)) else {
            return Ok(None);
        };

        let mut row = current.clone();
        for (column, value) in changes {
            if table.column(&column).is_none() {
                return Err(unknown_field(table, &column));
            }
            row.insert(column, value);
        }
        row.insert(UPDATED_AT.to_string(), now());

        check_not_null(table, &row)?;
        check_rules(table, &row)?;
        check_references(&tables, table, &row)?;
        let t = tables.entry(table.name).or_default();
        check_unique(table, &t.rows, &row)?;

        t.rows.insert(id, row.clone());
        Ok(Some(row))
    }

    async fn delete(&self, table: &'static TableDef, id: i32) -> StoreResult<()> {
        if let Some(t) = self.tables.lock().get_mut(table.name) {
            t.rows.remove(&id);
        }
        Ok(())
    }

    async fn increment(&self, table: &'static TableDef, id: i32, increment: Increment) -> StoreResult<Option<Record>> {
        let mut tables = self.tables.lock();
        let Some(row) = tables.get_mut(table.name).and_then(|t| t.rows.get_mut(&id)) else {
            return Ok(None);
        };

        let next = field(row, increment.column).as_i64().map(|n| n + increment.by);
        if let Some(ceiling) = increment.ceiling {
            if let Some(limit) = field(row, ceiling).as_i64() {
                if next.map_or(true, |n| n > limit) {
                    return Ok(None);
                }
            }
        }

        let mut updated = row.clone();
        updated.insert(
            increment.column.to_string(),
            next.map_or(Value::Null, Value::from),
        );
        if increment.touch {
            updated.insert(UPDATED_AT.to_string(), now());
        }
        check_rules(table, &updated)?;
        *row = updated.clone();
        Ok(Some(updated))
    }

    async fn count(&self, table: &'static TableDef, equals: &Record) -> StoreResult<i64> {
        let tables = self.tables.lock();
        let count = tables
            .get(table.name)
            .map_or(0, |t| t.rows.values().filter(|row| matches(row, equals)).count());
        Ok(count as i64)
    }

    async fn count_by(&self, table: &'static TableDef, column: &str) -> StoreResult<Vec<(Value, i64)>> {
        let tables = self.tables.lock();
        let Some(t) = tables.get(table.name) else {
            return Ok(Vec::new());
        };

        let mut groups: BTreeMap<String, (Value, i64)> = BTreeMap::new();
        for row in t.rows.values() {
            let value = field(row, column);
            groups
                .entry(value.to_string())
                .or_insert_with(|| (value.clone(), 0))
                .1 += 1;
        }
        Ok(groups.into_values().collect())
    }

    async fn sum(&self, table: &'static TableDef, column: &str, equals: &Record) -> StoreResult<i64> {
        let tables = self.tables.lock();
        Ok(tables.get(table.name).map_or(0, |t| {
            t.rows
                .values()
                .filter(|row| matches(row, equals))
                .filter_map(|row| field(row, column).as_i64())
                .sum()
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EVENTS, EVENT_REGISTRATIONS, MEMBERS};
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(record) => record,
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn insert_fills_defaults_and_assigns_ids() {
        let store = MemoryStore::new();
        let first = store
            .insert(&MEMBERS, record(json!({ "name": "Tan", "email": "tan@example.com" })))
            .await
            .unwrap();
        let second = store
            .insert(&MEMBERS, record(json!({ "name": "Lee", "email": "lee@example.com" })))
            .await
            .unwrap();

        assert_eq!(first["id"], json!(1));
        assert_eq!(second["id"], json!(2));
        assert_eq!(first["status"], json!("pending"));
        assert_eq!(first["membership_type"], json!("regular"));
        assert_eq!(first["phone"], Value::Null);
        assert!(first["created_at"].is_string());
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = MemoryStore::new();
        store
            .insert(&MEMBERS, record(json!({ "name": "Tan", "email": "a@example.com" })))
            .await
            .unwrap();
        store.delete(&MEMBERS, 1).await.unwrap();
        let next = store
            .insert(&MEMBERS, record(json!({ "name": "Tan", "email": "b@example.com" })))
            .await
            .unwrap();
        assert_eq!(next["id"], json!(2));
    }

    #[tokio::test]
    async fn rejects_missing_required_column() {
        let store = MemoryStore::new();
        let err = store
            .insert(&MEMBERS, record(json!({ "email": "tan@example.com" })))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation { .. }));
        assert_eq!(store.count(&MEMBERS, &Record::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rejects_dangling_reference() {
        let store = MemoryStore::new();
        let err = store
            .insert(
                &EVENT_REGISTRATIONS,
                record(json!({
                    "event_id": 42,
                    "participant_name": "Tan",
                    "participant_email": "tan@example.com",
                })),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation { .. }));
    }

    #[tokio::test]
    async fn orders_nulls_last_when_ascending() {
        let store = MemoryStore::new();
        for (title, max) in [("a", json!(5)), ("b", Value::Null), ("c", json!(1))] {
            store
                .insert(
                    &EVENTS,
                    record(json!({ "title": title, "event_date": "2030-01-01", "max_participants": max })),
                )
                .await
                .unwrap();
        }

        let mut selection = Selection::all();
        selection.order_by = "max_participants".into();
        selection.direction = Direction::Asc;
        let titles: Vec<_> = store
            .select(&EVENTS, &selection)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r["title"].clone())
            .collect();
        assert_eq!(titles, vec![json!("c"), json!("a"), json!("b")]);

        selection.direction = Direction::Desc;
        let first = &store.select(&EVENTS, &selection).await.unwrap()[0];
        assert_eq!(first["title"], json!("b"));
    }

    #[tokio::test]
    async fn numeric_equality_ignores_representation() {
        let store = MemoryStore::new();
        store
            .insert(
                &MEMBERS,
                record(json!({ "name": "Tan", "email": "tan@example.com", "graduation_year": 2010 })),
            )
            .await
            .unwrap();
        let equals = record(json!({ "graduation_year": 2010.0 }));
        assert_eq!(store.count(&MEMBERS, &equals).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn ceiling_blocks_increment() {
        let store = MemoryStore::new();
        store
            .insert(
                &EVENTS,
                record(json!({
                    "title": "Gala",
                    "event_date": "2030-01-01",
                    "max_participants": 1,
                })),
            )
            .await
            .unwrap();
        let seat = Increment {
            column: "current_participants",
            by: 1,
            ceiling: Some("max_participants"),
            touch: true,
        };

        let taken = store.increment(&EVENTS, 1, seat).await.unwrap().unwrap();
        assert_eq!(taken["current_participants"], json!(1));
        assert!(store.increment(&EVENTS, 1, seat).await.unwrap().is_none());
        assert!(store.increment(&EVENTS, 99, seat).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn capacity_rules_hold_on_every_write() {
        let store = MemoryStore::new();
        let err = store
            .insert(
                &EVENTS,
                record(json!({ "title": "Gala", "event_date": "2030-01-01", "max_participants": -3 })),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation { .. }));

        store
            .insert(
                &EVENTS,
                record(json!({
                    "title": "Gala",
                    "event_date": "2030-01-01",
                    "max_participants": 2,
                    "current_participants": 2,
                })),
            )
            .await
            .unwrap();
        let err = store
            .update(&EVENTS, 1, record(json!({ "max_participants": 1 })))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation { .. }));

        let unbounded = Increment {
            column: "current_participants",
            by: 1,
            ceiling: None,
            touch: true,
        };
        assert!(store.increment(&EVENTS, 1, unbounded).await.is_err());

        let event = store.find_by_id(&EVENTS, 1).await.unwrap().unwrap();
        assert_eq!(event["max_participants"], json!(2));
        assert_eq!(event["current_participants"], json!(2));
    }

    #[tokio::test]
    async fn groups_counts_by_value() {
        let store = MemoryStore::new();
        for (i, school) in [json!("A"), json!("B"), json!("A"), Value::Null].into_iter().enumerate() {
            store
                .insert(
                    &MEMBERS,
                    record(json!({ "name": "x", "email": format!("{i}@example.com"), "school": school })),
                )
                .await
                .unwrap();
        }
        let mut groups = store.count_by(&MEMBERS, "school").await.unwrap();
        groups.sort_by(|a, b| compare_values(&a.0, &b.0));
        assert_eq!(
            groups,
            vec![(json!("A"), 2), (json!("B"), 1), (Value::Null, 1)]
        );
    }
}
