//! Flat records and the naming bridge between the API (camelCase) and the
//! storage columns (snake_case).

use serde_json::{Map, Value};

/// One entity instance: field name to scalar value.
pub type Record = Map<String, Value>;

/// `graduationYear` -> `graduation_year`.
pub fn storage_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `graduation_year` -> `graduationYear`.
pub fn application_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('_', Some(next)) if next.is_ascii_lowercase() => {
                out.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

fn rename_keys(record: Record, rename: impl Fn(&str) -> String) -> Record {
    record
        .into_iter()
        .map(|(key, value)| (rename(&key), value))
        .collect()
}

pub fn storage_record(record: Record) -> Record {
    rename_keys(record, storage_key)
}

pub fn application_record(record: Record) -> Record {
    rename_keys(record, application_key)
}

/// Renames the top-level keys of an object. Nested values and non-objects
/// are returned untouched.
pub fn to_storage_naming(value: Value) -> Value {
    match value {
        Value::Object(record) => Value::Object(storage_record(record)),
        other => other,
    }
}

pub fn to_application_naming(value: Value) -> Value {
    match value {
        Value::Object(record) => Value::Object(application_record(record)),
        other => other,
    }
}

/// Builds a [`Record`] out of anything serializable to a JSON object.
/// Fields serialized as `null` because they were absent are dropped.
pub fn record_of<T: serde::Serialize>(value: &T) -> serde_json::Result<Record> {
    match serde_json::to_value(value)? {
        Value::Object(record) => Ok(record
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .collect()),
        other => Err(serde::ser::Error::custom(format!(
            "expected an object, got {other}"
        ))),
    }
}
