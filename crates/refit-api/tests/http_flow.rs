use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

use refit_api::{AppStateInner, router};
use refit_db::{ConnectionRegistry, Database};
use refit_types::api::Claims;

const SECRET: &str = "integration-secret";

fn app(admin_enabled: bool) -> Router {
    let state = Arc::new(AppStateInner {
        databases: ConnectionRegistry::new(Database::open_in_memory().unwrap(), None),
        jwt_secret: SECRET.to_string(),
        admin_enabled,
    });
    router(state)
}

fn token(user: &str) -> String {
    let claims = Claims {
        sub: user.to_string(),
        name: Some(user.to_uppercase()),
        email: Some(format!("{user}@example.com")),
        picture: None,
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn send(app: &Router, method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create(app: &Router, user: &str, title: &str, is_public: bool) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/results",
        Some(user),
        Some(json!({ "title": title, "content": "body", "isPublic": is_public })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn like_scenario_over_http() {
    let app = app(false);
    let id = create(&app, "owner", "Shared", true).await;
    let like = format!("/results/{id}/like");

    let (status, body) = send(&app, Method::POST, &like, Some("a"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "liked": true, "likesCount": 1 }));

    let (_, body) = send(&app, Method::POST, &like, Some("b"), None).await;
    assert_eq!(body, json!({ "liked": true, "likesCount": 2 }));

    let (_, body) = send(&app, Method::POST, &like, Some("a"), None).await;
    assert_eq!(body, json!({ "liked": false, "likesCount": 1 }));

    let (status, body) = send(&app, Method::POST, &like, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn private_results_stay_private() {
    let app = app(false);
    let id = create(&app, "owner", "Secret", false).await;

    let (status, _) = send(&app, Method::GET, &format!("/results/{id}"), Some("owner"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, &format!("/results/{id}"), Some("viewer"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.get("content").is_none());

    let (status, _) = send(&app, Method::POST, &format!("/results/{id}/like"), Some("viewer"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, listing) = send(&app, Method::GET, "/results?mode=public", None, None).await;
    assert_eq!(listing["pagination"]["total"], 0);

    let (status, body) = send(&app, Method::DELETE, &format!("/results/{id}"), Some("viewer"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Result not found or no access");
}

#[tokio::test]
async fn popular_listing_annotates_the_viewer() {
    let app = app(false);
    let quiet = create(&app, "owner", "Quiet", true).await;
    let hit = create(&app, "owner", "Hit", true).await;
    send(&app, Method::POST, &format!("/results/{hit}/like"), Some("fan"), None).await;

    let (status, body) = send(&app, Method::GET, "/results?sort=popular&limit=1&page=1", Some("fan"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"], json!({ "page": 1, "limit": 1, "total": 2, "totalPages": 2 }));
    assert_eq!(body["items"][0]["id"], hit.as_str());
    assert_eq!(body["items"][0]["likedByMe"], true);

    let (_, body) = send(&app, Method::GET, "/results?sort=popular&limit=1&page=2", None, None).await;
    assert_eq!(body["items"][0]["id"], quiet.as_str());
    assert_eq!(body["items"][0]["likedByMe"], false);

    let (_, body) = send(&app, Method::GET, "/results?sort=popular&limit=1&page=3", None, None).await;
    assert_eq!(body["items"], json!([]));
}

#[tokio::test]
async fn owner_modes_and_validation() {
    let app = app(false);
    let (status, _) = send(&app, Method::GET, "/results?mode=owned", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/results",
        Some("owner"),
        Some(json!({ "title": "", "content": "body" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Title is required");

    let id = create(&app, "owner", "Mine", false).await;
    let (status, body) = send(&app, Method::POST, &format!("/results/{id}/favorite"), Some("owner"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isFavorite"], true);

    let (_, body) = send(&app, Method::GET, "/results?mode=favorites-of-owner", Some("owner"), None).await;
    assert_eq!(body["pagination"]["total"], 1);

    let (status, _) = send(&app, Method::GET, "/results?page=0", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_input_answers_with_json_errors() {
    let app = app(false);

    let (status, body) = send(
        &app,
        Method::POST,
        "/results",
        Some("owner"),
        Some(json!({ "title": "t", "content": "c", "pinned": true })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{body}");

    let (status, body) = send(&app, Method::POST, "/results", Some("owner"), Some(json!({ "content": "c" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{body}");

    let (status, body) = send(&app, Method::GET, "/results?sort=loudest", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{body}");

    let (status, body) = send(&app, Method::POST, "/results/not-a-uuid/like", Some("fan"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{body}");
}

#[tokio::test]
async fn session_sync_and_bad_tokens() {
    let app = app(false);
    let (status, body) = send(&app, Method::POST, "/auth/session", Some("ada"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "ada");
    assert_eq!(body["email"], "ada@example.com");

    let request = Request::builder()
        .uri("/results")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_browser_is_opt_in() {
    let disabled = app(false);
    let (status, _) = send(&disabled, Method::GET, "/admin/tables", Some("admin"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let enabled = app(true);
    create(&enabled, "owner", "Post", true).await;
    let (status, body) = send(&enabled, Method::GET, "/admin/tables?db=local", Some("admin"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[1], json!({ "name": "results", "label": "Results", "count": 1 }));

    let (status, _) = send(&enabled, Method::GET, "/admin/tables/sqlite_master", Some("admin"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, created) = send(
        &enabled,
        Method::POST,
        "/admin/tables/results",
        Some("admin"),
        Some(json!({ "ownerId": "owner", "title": "Seeded", "content": "body", "isPublic": true })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");

    let uri = format!("/admin/tables/results/{}", created["id"].as_str().unwrap());
    let (status, updated) = send(&enabled, Method::PUT, &uri, Some("admin"), Some(json!({ "title": "Renamed" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Renamed");
    assert_eq!(updated["isPublic"], true);

    let (status, body) = send(&enabled, Method::PUT, &uri, Some("admin"), Some(json!({ "views": 3 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
