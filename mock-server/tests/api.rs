use axum::http::{self, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use mock_server::{app, router, Item, ListOut, Role, ShareOut, ShareRole, SharedDb, UserOut};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<&str>) -> Request<String> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
    }
    if body.is_some() {
        builder = builder.header(http::header::CONTENT_TYPE, "application/json");
    }
    builder.body(body.unwrap_or_default().to_string()).unwrap()
}

async fn send(app: &Router, req: Request<String>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

fn login_request(email: &str, password: &str) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri("/auth/token")
        .header(
            http::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(format!("username={email}&password={password}"))
        .unwrap()
}

/// Register and sign in, returning the bearer token.
async fn signup(app: &Router, email: &str) -> String {
    let body = format!(r#"{{"email":"{email}","password":"pass12345"}}"#);
    let resp = send(app, request("POST", "/auth/register", None, Some(&body))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = send(app, login_request(email, "pass12345")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let token: Value = body_json(resp).await;
    token["access_token"].as_str().unwrap().to_string()
}

async fn create_list(app: &Router, token: &str, name: &str) -> ListOut {
    let body = format!(r#"{{"name":"{name}"}}"#);
    let resp = send(app, request("POST", "/lists/", Some(token), Some(&body))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await
}

async fn detail(resp: Response) -> Value {
    let body: Value = body_json(resp).await;
    body["detail"].clone()
}

// --- auth ---

#[tokio::test]
async fn login_sets_session_cookie_and_returns_token() {
    let app = app();
    let body = r#"{"email":"Ann@Example.com","password":"pass12345"}"#;
    let resp = send(&app, request("POST", "/auth/register", None, Some(body))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let user: UserOut = body_json(resp).await;
    assert_eq!(user.email, "ann@example.com");

    let resp = send(&app, login_request("ann@example.com", "pass12345")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp
        .headers()
        .get(http::header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let token: Value = body_json(resp).await;
    let token = token["access_token"].as_str().unwrap();
    assert!(cookie.starts_with(&format!("access_token={token};")));

    let resp = send(
        &app,
        Request::builder()
            .uri("/me")
            .header(http::header::COOKIE, format!("access_token={token}"))
            .body(String::new())
            .unwrap(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let me: UserOut = body_json(resp).await;
    assert_eq!(me.id, user.id);
}

#[tokio::test]
async fn wrong_password_is_401() {
    let app = app();
    signup(&app, "ann@example.com").await;
    let resp = send(&app, login_request("ann@example.com", "nope")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(detail(resp).await, "Incorrect email or password");
}

#[tokio::test]
async fn duplicate_registration_is_400() {
    let app = app();
    signup(&app, "ann@example.com").await;
    let body = r#"{"email":"ann@example.com","password":"pass12345"}"#;
    let resp = send(&app, request("POST", "/auth/register", None, Some(body))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(detail(resp).await, "Email already registered");
}

#[tokio::test]
async fn short_password_is_422_with_detail_list() {
    let app = app();
    let body = r#"{"email":"ann@example.com","password":"short"}"#;
    let resp = send(&app, request("POST", "/auth/register", None, Some(body))).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let detail = detail(resp).await;
    assert_eq!(detail[0]["msg"], "Password must be at least 8 characters");
}

#[tokio::test]
async fn me_without_credentials_is_401() {
    let app = app();
    let resp = send(&app, request("GET", "/me", None, None)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(detail(resp).await, "Not authenticated");
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = app();
    let token = signup(&app, "ann@example.com").await;
    let resp = send(&app, request("POST", "/auth/logout", Some(&token), None)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    let resp = send(&app, request("GET", "/me", Some(&token), None)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_update_and_password_change() {
    let app = app();
    let token = signup(&app, "ann@example.com").await;

    let resp = send(&app, request("PATCH", "/me", Some(&token), Some(r#"{"name":" Ann "}"#))).await;
    let me: UserOut = body_json(resp).await;
    assert_eq!(me.name.as_deref(), Some("Ann"));

    let body = r#"{"current_password":"wrong-one","new_password":"newpass123"}"#;
    let resp = send(&app, request("POST", "/auth/change-password", Some(&token), Some(body))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body = r#"{"current_password":"pass12345","new_password":"newpass123"}"#;
    let resp = send(&app, request("POST", "/auth/change-password", Some(&token), Some(body))).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(&app, login_request("ann@example.com", "newpass123")).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn password_reset_token_is_single_use() {
    let db = SharedDb::default();
    let app = router(db.clone());
    signup(&app, "ann@example.com").await;

    let resp = send(
        &app,
        request("POST", "/auth/forgot-password", None, Some(r#"{"email":"nobody@example.com"}"#)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send(
        &app,
        request("POST", "/auth/forgot-password", None, Some(r#"{"email":"ann@example.com"}"#)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let reset = db.read().await.reset_token_for("ann@example.com").unwrap();
    let body = format!(r#"{{"token":"{reset}","new_password":"fresh-pass"}}"#);
    let resp = send(&app, request("POST", "/auth/reset-password", None, Some(&body))).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send(&app, request("POST", "/auth/reset-password", None, Some(&body))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(&app, login_request("ann@example.com", "fresh-pass")).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

// --- lists and items ---

#[tokio::test]
async fn owner_crud_on_lists_and_items() {
    let app = app();
    let token = signup(&app, "ann@example.com").await;
    let list = create_list(&app, &token, "Groceries").await;
    assert_eq!(list.role, Role::Owner);
    assert!(!list.shared);

    let uri = format!("/lists/{}/items", list.id);
    let resp = send(&app, request("POST", &uri, Some(&token), Some(r#"{"name":"Bread"}"#))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bread: Item = body_json(resp).await;
    assert_eq!(bread.quantity, 1);

    let body = r#"{"name":"Eggs","quantity":12,"expiry":"2025-09-01"}"#;
    let eggs: Item = body_json(send(&app, request("POST", &uri, Some(&token), Some(body))).await).await;

    let items: Vec<Item> = body_json(send(&app, request("GET", &uri, Some(&token), None)).await).await;
    let ids: Vec<i64> = items.iter().map(|it| it.id).collect();
    assert_eq!(ids, vec![eggs.id, bread.id]);

    let item_uri = format!("/lists/items/{}", eggs.id);
    let body = r#"{"name":"Eggs","quantity":6,"expiry":null}"#;
    let resp = send(&app, request("PATCH", &item_uri, Some(&token), Some(body))).await;
    let updated: Item = body_json(resp).await;
    assert_eq!(updated.quantity, 6);
    assert!(updated.expiry.is_none());

    let resp = send(&app, request("DELETE", &item_uri, Some(&token), None)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send(&app, request("DELETE", &item_uri, Some(&token), None)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(detail(resp).await, "Item not found");

    let list_uri = format!("/lists/{}", list.id);
    let resp = send(&app, request("PATCH", &list_uri, Some(&token), Some(r#"{"name":"Weekly"}"#))).await;
    let renamed: ListOut = body_json(resp).await;
    assert_eq!(renamed.name, "Weekly");

    let resp = send(&app, request("DELETE", &list_uri, Some(&token), None)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send(&app, request("GET", &uri, Some(&token), None)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn zero_quantity_is_rejected() {
    let app = app();
    let token = signup(&app, "ann@example.com").await;
    let list = create_list(&app, &token, "Groceries").await;
    let uri = format!("/lists/{}/items", list.id);
    let resp = send(
        &app,
        request("POST", &uri, Some(&token), Some(r#"{"name":"Milk","quantity":0}"#)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let detail = detail(resp).await;
    assert_eq!(detail[0]["loc"][1], "quantity");
}

#[tokio::test]
async fn other_users_lists_are_not_found() {
    let app = app();
    let ann = signup(&app, "ann@example.com").await;
    let bob = signup(&app, "bob@example.com").await;
    let list = create_list(&app, &ann, "Groceries").await;

    let lists: Vec<ListOut> = body_json(send(&app, request("GET", "/lists/", Some(&bob), None)).await).await;
    assert!(lists.is_empty());
    let uri = format!("/lists/{}/items", list.id);
    let resp = send(&app, request("GET", &uri, Some(&bob), None)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- sharing ---

#[tokio::test]
async fn sharing_roles_gate_mutations() {
    let app = app();
    let ann = signup(&app, "ann@example.com").await;
    let bob = signup(&app, "bob@example.com").await;
    let list = create_list(&app, &ann, "Groceries").await;
    let share_uri = format!("/lists/{}/share", list.id);
    let items_uri = format!("/lists/{}/items", list.id);

    let resp = send(
        &app,
        request("POST", &share_uri, Some(&ann), Some(r#"{"email":"bob@example.com"}"#)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let share: ShareOut = body_json(resp).await;
    assert_eq!(share.role, ShareRole::Viewer);
    assert_eq!(share.email, "bob@example.com");

    let lists: Vec<ListOut> = body_json(send(&app, request("GET", "/lists/", Some(&bob), None)).await).await;
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].role, Role::Viewer);
    assert!(lists[0].shared);

    let resp = send(&app, request("POST", &items_uri, Some(&bob), Some(r#"{"name":"Tea"}"#))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let uri = format!("{share_uri}/{}", share.id);
    let resp = send(&app, request("PATCH", &uri, Some(&ann), Some(r#"{"role":"editor"}"#))).await;
    let share: ShareOut = body_json(resp).await;
    assert_eq!(share.role, ShareRole::Editor);

    let resp = send(&app, request("POST", &items_uri, Some(&bob), Some(r#"{"name":"Tea"}"#))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resp = send(
        &app,
        request("PATCH", &format!("/lists/{}", list.id), Some(&bob), Some(r#"{"name":"Mine"}"#)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = send(&app, request("GET", &share_uri, Some(&bob), None)).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = send(&app, request("DELETE", &uri, Some(&ann), None)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send(&app, request("GET", &items_uri, Some(&bob), None)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let shares: Vec<ShareOut> = body_json(send(&app, request("GET", &share_uri, Some(&ann), None)).await).await;
    assert!(shares.is_empty());
}

#[tokio::test]
async fn sharing_with_unknown_or_self_fails() {
    let app = app();
    let ann = signup(&app, "ann@example.com").await;
    let list = create_list(&app, &ann, "Groceries").await;
    let share_uri = format!("/lists/{}/share", list.id);

    let resp = send(
        &app,
        request("POST", &share_uri, Some(&ann), Some(r#"{"email":"ghost@example.com"}"#)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = send(
        &app,
        request("POST", &share_uri, Some(&ann), Some(r#"{"email":"ann@example.com"}"#)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn hiding_affects_only_the_recipient() {
    let app = app();
    let ann = signup(&app, "ann@example.com").await;
    let bob = signup(&app, "bob@example.com").await;
    let list = create_list(&app, &ann, "Groceries").await;
    let share_uri = format!("/lists/{}/share", list.id);
    send(
        &app,
        request("POST", &share_uri, Some(&ann), Some(r#"{"email":"bob@example.com"}"#)),
    )
    .await;

    let resp = send(&app, request("POST", &format!("/lists/{}/hide", list.id), Some(&ann), None)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(detail(resp).await, "Owners cannot hide their own lists");

    let resp = send(&app, request("POST", &format!("/lists/{}/hide", list.id), Some(&bob), None)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let visible: Vec<ListOut> = body_json(send(&app, request("GET", "/lists/", Some(&bob), None)).await).await;
    assert!(visible.is_empty());
    let all: Vec<ListOut> = body_json(
        send(&app, request("GET", "/lists/?include_hidden=true", Some(&bob), None)).await,
    )
    .await;
    assert!(all[0].hidden);

    let owner_view: Vec<ListOut> = body_json(send(&app, request("GET", "/lists/", Some(&ann), None)).await).await;
    assert_eq!(owner_view.len(), 1);
    assert!(!owner_view[0].hidden);
    let shares: Vec<ShareOut> = body_json(send(&app, request("GET", &share_uri, Some(&ann), None)).await).await;
    assert_eq!(shares.len(), 1);

    let resp = send(&app, request("POST", &format!("/lists/{}/unhide", list.id), Some(&bob), None)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let visible: Vec<ListOut> = body_json(send(&app, request("GET", "/lists/", Some(&bob), None)).await).await;
    assert_eq!(visible.len(), 1);
}
