use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use swopp_api::{AppState, AppStateInner, auth::hash_password, router};
use swopp_core::{Policy, Swopp, storage::MemoryImageStore};
use swopp_db::Database;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
const BOUNDARY: &str = "swopp-test-boundary";

fn app(public_reads: bool) -> (Router, AppState) {
    let db = Database::open_in_memory().unwrap();
    let swopp = Swopp::new(
        Arc::new(db),
        Arc::new(MemoryImageStore::new()),
        Policy::default(),
    );
    let state: AppState = Arc::new(AppStateInner {
        swopp,
        jwt_secret: "test-secret".into(),
        token_ttl: chrono::Duration::hours(1),
    });
    (router(state.clone(), public_reads), state)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn bare_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn multipart_request(
    method: Method,
    uri: &str,
    token: &str,
    item: Option<Value>,
    image: Option<(&str, &[u8])>,
) -> Request<Body> {
    let mut body = Vec::new();
    if let Some(item) = item {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"item\"\r\n\r\n{}\r\n",
                item
            )
            .as_bytes(),
        );
    }
    if let Some((content_type, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"upload\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body))
        .unwrap()
}

async fn register(app: &Router, email: &str, is_driver: bool) -> String {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/auth/register",
            None,
            json!({ "email": email, "name": "Someone", "password": "hunter2hunter2", "isDriver": is_driver }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["token"].as_str().unwrap().to_string()
}

async fn admin_token(app: &Router, state: &AppState) -> String {
    state
        .swopp
        .ensure_admin("root@x.com", "Root", hash_password("rootroot1").unwrap())
        .await
        .unwrap();
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/auth/login",
            None,
            json!({ "email": "root@x.com", "password": "rootroot1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "admin");
    body["token"].as_str().unwrap().to_string()
}

async fn create_draft(app: &Router, token: &str) -> i64 {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/requests",
            Some(token),
            json!({ "pickup": "Depot", "dropoff": "Harbour" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "draft");
    body["id"].as_i64().unwrap()
}

fn item_json(request_id: i64, name: &str) -> Value {
    json!({
        "requestId": request_id,
        "name": name,
        "itemType": "parcel",
        "price": 12.5,
        "width": 0.3,
        "height": 0.2,
        "depth": 0.1,
        "weight": 1.75
    })
}

#[tokio::test]
async fn test_register_login_and_profile() {
    let (app, _) = app(true);
    let token = register(&app, "Dana@X.com", false).await;

    let (status, me) = send(&app, bare_request(Method::GET, "/users/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "dana@x.com");
    assert_eq!(me["isDriver"], false);
    assert!(me.get("password").is_none());

    let (status, login) = send(
        &app,
        json_request(
            Method::POST,
            "/auth/login",
            None,
            json!({ "email": "dana@x.com", "password": "hunter2hunter2" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["role"], "user");

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/auth/login",
            None,
            json!({ "email": "dana@x.com", "password": "wrong-password" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn test_register_rejections() {
    let (app, _) = app(true);
    register(&app, "dana@x.com", false).await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/auth/register",
            None,
            json!({ "email": "DANA@x.com", "name": "Again", "password": "longenough" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/auth/register",
            None,
            json!({ "email": "eve@x.com", "name": "Eve", "password": "short" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/auth/register",
            None,
            json!({ "email": "not-an-email", "name": "Eve", "password": "longenough" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_or_bad_token() {
    let (app, _) = app(true);
    let (status, body) = send(
        &app,
        json_request(Method::POST, "/requests", None, json!({ "pickup": "P", "dropoff": "D" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");

    let (status, _) = send(&app, bare_request(Method::GET, "/users/me", Some("garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_delivery_over_http() {
    let (app, _) = app(true);
    let sender = register(&app, "sender@x.com", false).await;
    let driver = register(&app, "driver@x.com", true).await;
    let id = create_draft(&app, &sender).await;

    let (status, item) = send(
        &app,
        multipart_request(
            Method::POST,
            "/items",
            &sender,
            Some(item_json(id, "Box")),
            Some(("image/png", PNG)),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{item}");
    assert_eq!(item["weight"], 1.75);
    let key = item["image"].as_str().unwrap().to_string();

    // reads are public
    let (status, request) = send(&app, bare_request(Method::GET, &format!("/requests/{id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(request["status"], "pending");

    let (status, items) = send(&app, bare_request(Method::GET, &format!("/items/{id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(items.as_array().unwrap().len(), 1);

    let resp = app
        .clone()
        .oneshot(bare_request(Method::GET, &format!("/items/image/{key}"), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], PNG);

    let (status, body) = send(
        &app,
        multipart_request(Method::POST, "/items", &sender, Some(item_json(id, "Late")), None),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_state");

    let (status, open) = send(&app, bare_request(Method::GET, "/requests/open", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(open.as_array().unwrap().len(), 1);

    let accept = json!({ "status": "accepted", "driverEmail": "driver@x.com" });
    let uri = format!("/requests/{id}/status");
    let (status, body) = send(&app, json_request(Method::POST, &uri, Some(&driver), accept.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["driverEmail"], "driver@x.com");

    let (status, body) = send(&app, json_request(Method::POST, &uri, Some(&driver), accept)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_transition");

    let (status, assigned) = send(&app, bare_request(Method::GET, "/requests/assigned", Some(&driver))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assigned.as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        json_request(Method::POST, &uri, Some(&driver), json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
}

#[tokio::test]
async fn test_rejects_disguised_upload() {
    let (app, _) = app(true);
    let sender = register(&app, "sender@x.com", false).await;
    let id = create_draft(&app, &sender).await;

    let (status, body) = send(
        &app,
        multipart_request(
            Method::POST,
            "/items",
            &sender,
            Some(item_json(id, "Box")),
            Some(("image/png", &b"<script>alert(1)</script>"[..])),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (_, request) = send(&app, bare_request(Method::GET, &format!("/requests/{id}"), None)).await;
    assert_eq!(request["status"], "draft");

    let (status, _) = send(
        &app,
        multipart_request(Method::POST, "/items", &sender, None, Some(("image/png", PNG))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_image_is_not_found() {
    let (app, _) = app(true);
    for name in ["missing.png", "00000000-0000-0000-0000-000000000000.png"] {
        let (status, _) = send(&app, bare_request(Method::GET, &format!("/items/image/{name}"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_private_reads_require_token() {
    let (app, _) = app(false);
    let sender = register(&app, "sender@x.com", false).await;
    let id = create_draft(&app, &sender).await;

    let (status, _) = send(&app, bare_request(Method::GET, &format!("/requests/{id}"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, bare_request(Method::GET, &format!("/requests/{id}"), Some(&sender))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);
}

#[tokio::test]
async fn test_guarded_mutations() {
    let (app, _) = app(true);
    let sender = register(&app, "sender@x.com", false).await;
    let stranger = register(&app, "stranger@x.com", false).await;
    let id = create_draft(&app, &sender).await;
    let uri = format!("/requests/{id}");

    // ownership beats payload validation
    let (status, body) = send(
        &app,
        json_request(Method::PUT, &uri, Some(&stranger), json!({ "pickup": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, body) = send(
        &app,
        json_request(Method::PUT, &uri, Some(&sender), json!({ "dropoff": "Airport" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dropoff"], "Airport");

    let (status, _) = send(&app, bare_request(Method::DELETE, &uri, Some(&stranger))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, bare_request(Method::DELETE, &uri, Some(&sender))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, bare_request(Method::GET, &uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, _) = send(&app, bare_request(Method::DELETE, &uri, Some(&sender))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_routes() {
    let (app, state) = app(true);
    let sender = register(&app, "sender@x.com", false).await;
    let admin = admin_token(&app, &state).await;
    create_draft(&app, &sender).await;

    let (status, _) = send(&app, bare_request(Method::GET, "/admin/users", Some(&sender))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, users) = send(&app, bare_request(Method::GET, "/admin/users", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 2);

    let (status, requests) = send(&app, bare_request(Method::GET, "/admin/requests", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(requests.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, bare_request(Method::DELETE, "/admin/users/root@x.com", Some(&admin))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, bare_request(Method::DELETE, "/admin/users/sender@x.com", Some(&admin))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, requests) = send(&app, bare_request(Method::GET, "/admin/requests", Some(&admin))).await;
    assert!(requests.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_profile_picture() {
    let (app, _) = app(true);
    let token = register(&app, "dana@x.com", false).await;
    let other = register(&app, "eve@x.com", false).await;

    let (status, user) = send(
        &app,
        multipart_request(Method::PUT, "/users/dana@x.com/picture", &token, None, Some(("image/png", PNG))),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{user}");
    assert!(user["picture"].as_str().unwrap().ends_with(".png"));

    let (status, _) = send(
        &app,
        multipart_request(Method::PUT, "/users/dana@x.com/picture", &other, None, Some(("image/png", PNG))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, user) = send(
        &app,
        json_request(Method::PUT, "/users/dana@x.com", Some(&token), json!({ "isDriver": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["isDriver"], true);
}

#[tokio::test]
async fn test_empty_file_input_means_no_image() {
    let (app, _) = app(true);
    let sender = register(&app, "sender@x.com", false).await;
    let id = create_draft(&app, &sender).await;

    let (status, item) = send(
        &app,
        multipart_request(
            Method::POST,
            "/items",
            &sender,
            Some(item_json(id, "Box")),
            Some(("application/octet-stream", &b""[..])),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{item}");
    assert!(item["image"].is_null());
}
