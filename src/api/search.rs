use axum::{extract::Query, http::StatusCode, routing::get, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::events::with_aliases;
use crate::{
    error::{AppError, AppResult},
    gateways::Gateways,
    record::Record,
};

const MAX_RESULTS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SearchType {
    Events,
    News,
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
    #[serde(rename = "type")]
    kind: Option<SearchType>,
}

/// Hits go in `data`; `total` counts every match before truncation.
#[derive(Serialize)]
struct SearchResults {
    success: bool,
    data: Vec<Record>,
    total: usize,
}

/// Case-insensitive substring match over the string values of `fields`.
fn matches(record: &Record, fields: &[&str], needle: &str) -> bool {
    fields.iter().any(|f| {
        record
            .get(*f)
            .and_then(Value::as_str)
            .map_or(false, |s| s.to_lowercase().contains(needle))
    })
}

fn tagged(mut record: Record, kind: &str) -> Record {
    record.insert("type".into(), json!(kind));
    record
}

async fn search(
    Extension(gateways): Extension<Gateways>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<SearchResults>> {
    let q = query.q.map(|q| q.trim().to_string()).unwrap_or_default();
    if q.is_empty() {
        return Err(AppError::from(
            StatusCode::BAD_REQUEST,
            "a search keyword is required",
        ));
    }
    let needle = q.to_lowercase();

    let mut results = Vec::new();
    if query.kind != Some(SearchType::News) {
        let events = gateways.events.list(Record::new(), None).await?;
        results.extend(
            events
                .into_iter()
                .filter(|e| matches(e, &["title", "description"], &needle))
                .map(|e| tagged(with_aliases(e), "event")),
        );
    }
    if query.kind != Some(SearchType::Events) {
        let articles = gateways.news.published(Record::new(), None).await?;
        results.extend(
            articles
                .into_iter()
                .filter(|a| matches(a, &["title", "content"], &needle))
                .map(|a| tagged(a, "news")),
        );
    }

    let total = results.len();
    results.truncate(MAX_RESULTS);
    tracing::debug!(query = %q, total, "search finished");
    Ok(Json(SearchResults {
        success: true,
        data: results,
        total,
    }))
}

pub fn app() -> Router {
    Router::new().route("/", get(search))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_ignores_case_and_non_strings() {
        let mut record = Record::new();
        record.insert("title".into(), json!("Annual Alumni DINNER"));
        record.insert("description".into(), Value::Null);
        assert!(matches(&record, &["title", "description"], "dinner"));
        assert!(!matches(&record, &["description"], "dinner"));
        assert!(!matches(&record, &["title"], "gala"));
    }
}
