//! In-memory REST server for any resource name.
//!
//! `GET/POST /{resource}` lists and creates records, `GET/PUT/DELETE
//! /{resource}/{id}` reads, merges and removes one. Records are JSON objects
//! keyed by their `id` field; creation assigns a UUID string when the body
//! has no usable id.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub type Record = Map<String, Value>;

pub type Db = Arc<RwLock<HashMap<String, Vec<Record>>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/{resource}", get(list_records).post(create_record))
        .route(
            "/{resource}/{id}",
            get(get_record).put(update_record).delete(delete_record),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// String form of an id value as it appears in a URL path.
fn path_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn has_id(record: &Record, id: &str) -> bool {
    record.get("id").and_then(path_id).as_deref() == Some(id)
}

/// Query values match a field's string form; strings match unquoted.
fn matches_query(record: &Record, query: &HashMap<String, String>) -> bool {
    query.iter().all(|(key, expected)| match record.get(key) {
        Some(Value::String(s)) => s == expected,
        Some(other) => other.to_string() == *expected,
        None => false,
    })
}

async fn list_records(
    State(db): State<Db>,
    Path(resource): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Vec<Record>> {
    let db = db.read().await;
    let records = db
        .get(&resource)
        .map(|records| {
            records
                .iter()
                .filter(|record| matches_query(record, &query))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    Json(records)
}

async fn create_record(
    State(db): State<Db>,
    Path(resource): Path<String>,
    Json(mut input): Json<Record>,
) -> Result<(StatusCode, Json<Record>), StatusCode> {
    let mut db = db.write().await;
    let records = db.entry(resource).or_default();

    match input.get("id").and_then(path_id) {
        Some(id) if records.iter().any(|r| has_id(r, &id)) => return Err(StatusCode::CONFLICT),
        Some(_) => {}
        None => {
            input.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
    }

    records.push(input.clone());
    Ok((StatusCode::CREATED, Json(input)))
}

async fn get_record(
    State(db): State<Db>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Json<Record>, StatusCode> {
    let db = db.read().await;
    db.get(&resource)
        .and_then(|records| records.iter().find(|r| has_id(r, &id)))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_record(
    State(db): State<Db>,
    Path((resource, id)): Path<(String, String)>,
    Json(mut input): Json<Record>,
) -> Result<Json<Record>, StatusCode> {
    let mut db = db.write().await;
    let record = db
        .get_mut(&resource)
        .and_then(|records| records.iter_mut().find(|r| has_id(r, &id)))
        .ok_or(StatusCode::NOT_FOUND)?;
    // The path owns the identity; a body id never renames a record.
    input.remove("id");
    record.extend(input);
    Ok(Json(record.clone()))
}

async fn delete_record(
    State(db): State<Db>,
    Path((resource, id)): Path<(String, String)>,
) -> StatusCode {
    let mut db = db.write().await;
    let Some(records) = db.get_mut(&resource) else {
        return StatusCode::NOT_FOUND;
    };
    match records.iter().position(|r| has_id(r, &id)) {
        Some(index) => {
            records.remove(index);
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}
