use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{data, message, parse_limit, require, Envelope};
use crate::{
    error::{AppError, AppResult},
    gateways::Gateways,
    record::{record_of, Record},
};

#[derive(Deserialize)]
struct NewsQuery {
    category: Option<String>,
    featured: Option<bool>,
    limit: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsRequest {
    title: String,
    content: Option<String>,
    author: Option<String>,
    category: Option<String>,
    featured: Option<bool>,
    published: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewArticle {
    title: String,
    content: Option<String>,
    author: Option<String>,
    category: Option<String>,
    featured: bool,
    published: bool,
    views: i32,
    publish_date: String,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewsUpdate {
    title: Option<String>,
    content: Option<String>,
    author: Option<String>,
    category: Option<String>,
    featured: Option<bool>,
    published: Option<bool>,
    publish_date: Option<String>,
}

async fn list(
    Extension(gateways): Extension<Gateways>,
    Query(query): Query<NewsQuery>,
) -> AppResult<Json<Envelope<Vec<Record>>>> {
    let mut filter = Record::new();
    if let Some(category) = query.category {
        filter.insert("category".into(), json!(category));
    }
    if let Some(featured) = query.featured {
        filter.insert("featured".into(), json!(featured));
    }
    let articles = gateways
        .news
        .published(filter, parse_limit(query.limit.as_deref()))
        .await?;
    Ok(data(articles))
}

async fn info(
    Extension(gateways): Extension<Gateways>,
    Path(id): Path<i32>,
) -> AppResult<Json<Envelope<Record>>> {
    let mut article = gateways
        .news
        .find_by_id(id)
        .await?
        .filter(|a| a.get("published") == Some(&Value::Bool(true)))
        .ok_or_else(|| AppError::not_found("article"))?;

    gateways.news.increment_views(id).await?;
    let views = article.get("views").and_then(Value::as_i64).unwrap_or(0);
    article.insert("views".into(), json!(views + 1));
    Ok(data(article))
}

async fn create(
    Extension(gateways): Extension<Gateways>,
    Json(req): Json<NewsRequest>,
) -> AppResult<(StatusCode, Json<Envelope<Record>>)> {
    require(&req.title, "title")?;
    let article = gateways
        .news
        .create(record_of(&NewArticle {
            title: req.title,
            content: req.content,
            author: req.author.filter(|a| !a.trim().is_empty()),
            category: req.category,
            featured: req.featured.unwrap_or(false),
            published: req.published.unwrap_or(false),
            views: 0,
            publish_date: Local::now().date_naive().format("%Y-%m-%d").to_string(),
        })?)
        .await?;
    tracing::info!(article_id = ?article.get("id"), "article created");
    Ok((StatusCode::CREATED, data(article)))
}

async fn update(
    Extension(gateways): Extension<Gateways>,
    Path(id): Path<i32>,
    Json(req): Json<NewsUpdate>,
) -> AppResult<Json<Envelope<Record>>> {
    let article = gateways
        .news
        .update(id, record_of(&req)?)
        .await?
        .ok_or_else(|| AppError::not_found("article"))?;
    Ok(data(article))
}

async fn remove(
    Extension(gateways): Extension<Gateways>,
    Path(id): Path<i32>,
) -> AppResult<Json<Envelope<()>>> {
    if gateways.news.find_by_id(id).await?.is_none() {
        return Err(AppError::not_found("article"));
    }
    gateways.news.delete(id).await?;
    tracing::info!(article_id = id, "article deleted");
    Ok(message("article deleted"))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(info).put(update).delete(remove))
}
