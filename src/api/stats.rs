use std::collections::BTreeMap;

use axum::{routing::get, Extension, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use super::{
    data,
    events::{parse_date, with_aliases},
    Envelope,
};
use crate::{
    error::AppResult,
    gateways::{Gateways, MemberStats, TableGateway},
    models::{ApplicationStatus, EventStatus},
    record::Record,
    store::StoreResult,
};

const DASHBOARD_ITEMS: i64 = 3;

/// A total plus one key per status, zero when no row has it.
#[derive(Serialize)]
struct StatusCounts {
    total: i64,
    #[serde(flatten)]
    by_status: BTreeMap<String, i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationCounts {
    total_applications: i64,
    #[serde(flatten)]
    by_status: BTreeMap<String, i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewsStats {
    total: i64,
    published: i64,
    featured: i64,
    total_views: i64,
}

#[derive(Serialize)]
struct Stats {
    members: MemberStats,
    events: StatusCounts,
    scholarships: ApplicationCounts,
    news: NewsStats,
}

async fn by_status(
    table: &TableGateway,
    statuses: impl IntoIterator<Item = &'static str>,
) -> StoreResult<BTreeMap<String, i64>> {
    let mut counts: BTreeMap<String, i64> =
        statuses.into_iter().map(|s| (s.to_string(), 0)).collect();
    for (status, count) in table.count_by("status").await? {
        if let Value::String(status) = status {
            if let Some(slot) = counts.get_mut(&status) {
                *slot = count;
            }
        }
    }
    Ok(counts)
}

fn flag(field: &str) -> Record {
    let mut filter = Record::new();
    filter.insert(field.into(), json!(true));
    filter
}

async fn stats(Extension(gateways): Extension<Gateways>) -> AppResult<Json<Envelope<Stats>>> {
    let events = gateways.events.table();
    let applications = gateways.applications.table();
    let news = gateways.news.table();

    Ok(data(Stats {
        members: gateways.members.stats().await?,
        events: StatusCounts {
            total: events.count(Record::new()).await?,
            by_status: by_status(events, EventStatus::ALL.iter().map(|s| s.as_str())).await?,
        },
        scholarships: ApplicationCounts {
            total_applications: applications.count(Record::new()).await?,
            by_status: by_status(applications, ApplicationStatus::ALL.iter().map(|s| s.as_str()))
                .await?,
        },
        news: NewsStats {
            total: news.count(Record::new()).await?,
            published: news.count(flag("published")).await?,
            featured: news.count(flag("featured")).await?,
            total_views: news.sum("views", Record::new()).await?,
        },
    }))
}

/// `2025年3月9日`, or `fallback` when the value is not a date.
fn display_date(value: Option<&Value>, fallback: &str) -> Value {
    match value.and_then(Value::as_str).and_then(parse_date) {
        Some(date) => json!(date.format("%Y年%-m月%-d日").to_string()),
        None => json!(fallback),
    }
}

async fn dashboard(Extension(gateways): Extension<Gateways>) -> AppResult<Json<Envelope<Value>>> {
    let upcoming: Vec<Record> = gateways
        .events
        .upcoming(DASHBOARD_ITEMS)
        .await?
        .into_iter()
        .map(|event| {
            let mut event = with_aliases(event);
            let display = display_date(event.get("eventDate"), "日期待定");
            event.insert("displayDate".into(), display);
            event
        })
        .collect();
    let latest: Vec<Record> = gateways
        .news
        .featured(DASHBOARD_ITEMS)
        .await?
        .into_iter()
        .map(|mut article| {
            let published = article.get("publishDate");
            let formatted = published
                .and_then(Value::as_str)
                .and_then(parse_date)
                .map(|d| d.format("%Y-%m-%d").to_string());
            let display = display_date(published, "发布日期待定");
            article.insert("formattedPublishDate".into(), json!(formatted));
            article.insert("displayPublishDate".into(), display);
            article
        })
        .collect();

    let mut pending = Record::new();
    pending.insert("status".into(), ApplicationStatus::Pending.into());
    let members = gateways.members.stats().await?;
    let upcoming_count = upcoming.len();

    Ok(data(json!({
        "upcomingEvents": upcoming,
        "latestNews": latest,
        "stats": {
            "totalMembers": members.total,
            "upcomingEvents": upcoming_count,
            "activeScholarships": gateways.applications.table().count(pending).await?,
            "openScholarships": gateways.scholarships.active().await?.len(),
            "totalEvents": gateways.events.table().count(Record::new()).await?,
        },
    })))
}

pub fn app() -> Router {
    Router::new()
        .route("/stats", get(stats))
        .route("/dashboard", get(dashboard))
}
