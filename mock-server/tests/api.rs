use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Record};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

// --- list ---

#[tokio::test]
async fn list_unknown_resource_is_empty() {
    let resp = app().oneshot(empty_request("GET", "/widgets")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let records: Vec<Record> = body_json(resp).await;
    assert!(records.is_empty());
}

// --- create ---

#[tokio::test]
async fn create_assigns_id_and_returns_201() {
    let resp = app()
        .oneshot(json_request("POST", "/test", r#"{"name":"New Item"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let record: Value = body_json(resp).await;
    assert_eq!(record["name"], "New Item");
    assert!(!record["id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn create_keeps_client_supplied_id() {
    let resp = app()
        .oneshot(json_request("POST", "/test", r#"{"id":42,"name":"Numbered"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let record: Value = body_json(resp).await;
    assert_eq!(record["id"], 42);
}

#[tokio::test]
async fn create_non_object_returns_422() {
    let resp = app()
        .oneshot(json_request("POST", "/test", r#"[1,2,3]"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- get / update / delete on missing records ---

#[tokio::test]
async fn get_missing_record_returns_404() {
    let resp = app().oneshot(empty_request("GET", "/test/nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_missing_record_returns_404() {
    let resp = app()
        .oneshot(json_request("PUT", "/test/nope", r#"{"name":"Nope"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_missing_record_returns_404() {
    let resp = app().oneshot(empty_request("DELETE", "/test/nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- full CRUD lifecycle ---

#[tokio::test]
async fn crud_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // create two records, one with a fixed id
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("POST", "/users", r#"{"name":"Ann","team":"x"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = body_json(resp).await;
    let id = created["id"].as_str().unwrap().to_string();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("POST", "/users", r#"{"id":"b","name":"Bob","team":"y"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    // duplicate id
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("POST", "/users", r#"{"id":"b"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // list, then filtered list
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", "/users"))
        .await
        .unwrap();
    let all: Vec<Record> = body_json(resp).await;
    assert_eq!(all.len(), 2);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", "/users?team=y"))
        .await
        .unwrap();
    let filtered: Vec<Value> = body_json(resp).await;
    assert_eq!(filtered, vec![json!({"id": "b", "name": "Bob", "team": "y"})]);

    // update merges fields and ignores a body id
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "PUT",
            &format!("/users/{id}"),
            r#"{"id":"hijack","team":"z"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = body_json(resp).await;
    assert_eq!(updated["id"], id.as_str());
    assert_eq!(updated["name"], "Ann");
    assert_eq!(updated["team"], "z");

    // get
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", &format!("/users/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Value = body_json(resp).await;
    assert_eq!(fetched, updated);

    // delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("DELETE", &format!("/users/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    // get after delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", &format!("/users/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // other resources are untouched
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", "/users"))
        .await
        .unwrap();
    let remaining: Vec<Record> = body_json(resp).await;
    assert_eq!(remaining.len(), 1);
}
