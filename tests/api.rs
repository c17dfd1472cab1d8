mod common;

use agora::domain::types::JobType;
use agora::infra::http::build_router;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use common::Harness;

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    let response = router
        .clone()
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("response");

    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

#[tokio::test]
async fn view_recording_is_accepted_and_buffered() {
    let harness = Harness::new();
    let router = build_router(harness.api_state());

    let (status, body) = send(&router, Method::POST, "/api/v1/threads/17/views", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({ "thread_id": 17, "queue_len": 1 }));
    assert_eq!(harness.views.queue_len().await.expect("len"), 1);
}

#[tokio::test]
async fn forum_write_and_read_flow() {
    let harness = Harness::new();
    let router = build_router(harness.api_state());

    let (status, root) = send(
        &router,
        Method::POST,
        "/api/v1/categories",
        Some(json!({ "title": "Languages" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, child) = send(
        &router,
        Method::POST,
        "/api/v1/categories",
        Some(json!({ "title": "Rust", "parent_id": root["id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(child["level"], 1);

    let (status, thread) = send(
        &router,
        Method::POST,
        "/api/v1/threads",
        Some(json!({ "title": "Pin explained", "category_id": child["id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, tag) = send(
        &router,
        Method::POST,
        "/api/v1/tags",
        Some(json!({ "name": "async" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let assign_uri = format!("/api/v1/tags/{}/threads", tag["id"]);
    let assign_body = json!({ "thread_id": thread["id"] });
    let (status, body) = send(&router, Method::POST, &assign_uri, Some(assign_body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["created"], true);
    let (status, body) = send(&router, Method::POST, &assign_uri, Some(assign_body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], false);

    let (status, body) = send(
        &router,
        Method::GET,
        &format!("/api/v1/threads/{}/tags", thread["id"]),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"][0]["name"], "async");

    let (status, body) = send(&router, Method::GET, "/api/v1/homepage", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["children"][0]["thread_count"], 1);
}

#[tokio::test]
async fn duplicate_tag_is_a_conflict() {
    let harness = Harness::new();
    harness.seed_tag("rust").await;
    let router = build_router(harness.api_state());

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/tags",
        Some(json!({ "name": "rust" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "duplicate");
}

#[tokio::test]
async fn blank_tag_name_is_rejected() {
    let harness = Harness::new();
    let router = build_router(harness.api_state());

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/tags",
        Some(json!({ "name": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn similar_threads_for_unknown_thread_is_not_found() {
    let harness = Harness::new();
    let router = build_router(harness.api_state());

    let (status, body) = send(&router, Method::GET, "/api/v1/threads/999/similar", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn similar_threads_respects_limit() {
    let harness = Harness::new();
    let category = harness.seed_category().await;
    let source = harness.seed_thread(category, "source").await;
    for n in 0..3 {
        harness.seed_thread(category, &format!("sibling {n}")).await;
    }
    let router = build_router(harness.api_state());

    let uri = format!("/api/v1/threads/{}/similar?limit=2", source.id);
    let (status, body) = send(&router, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["thread_id"], source.id);
    assert_eq!(body["threads"].as_array().map(Vec::len), Some(2));

    let uri = format!("/api/v1/threads/{}/similar", source.id);
    let (_, body) = send(&router, Method::GET, &uri, None).await;
    assert_eq!(body["threads"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn trending_is_empty_before_first_refresh() {
    let harness = Harness::new();
    let router = build_router(harness.api_state());

    let (status, body) = send(&router, Method::GET, "/api/v1/trending?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "threads": [] }));
}

#[tokio::test]
async fn trending_serves_refreshed_snapshot() {
    let harness = Harness::new();
    let category = harness.seed_category().await;
    let thread = harness.seed_thread(category, "hot").await;
    harness.views.record(thread.id).await.expect("record");
    harness.aggregator.drain_all().await.expect("drain");
    harness.trending.refresh().await.expect("refresh");
    let router = build_router(harness.api_state());

    let (status, body) = send(&router, Method::GET, "/api/v1/trending", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "threads": [{ "thread_id": thread.id, "score": 8 }] })
    );
}

#[tokio::test]
async fn admin_triggers_enqueue_jobs() {
    let harness = Harness::new();
    let router = build_router(harness.api_state());

    let (status, body) = send(&router, Method::POST, "/api/v1/admin/trending/refresh", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body["job_id"].is_string());

    let (status, _) = send(&router, Method::POST, "/api/v1/admin/views/drain", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let kinds: Vec<JobType> = harness
        .repos
        .enqueued_jobs()
        .into_iter()
        .map(|job| job.job_type)
        .collect();
    assert_eq!(kinds, vec![JobType::RefreshTrending, JobType::DrainViews]);
}

#[tokio::test]
async fn health_and_request_id() {
    let harness = Harness::new();
    let router = build_router(harness.api_state());

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok()),
        Some("req-123")
    );

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert!(response.headers().contains_key("x-request-id"));
}
