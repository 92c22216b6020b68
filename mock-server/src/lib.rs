//! In-memory grocery backend.
//!
//! Serves the same wire shapes as the production API: JSON bodies, `detail`
//! error payloads, cookie or bearer authentication and 204 for empty
//! responses. State lives in one `Db` behind an async `RwLock`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Form, Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const SESSION_COOKIE: &str = "access_token";

const MIN_PASSWORD_LEN: usize = 8;
const EDIT_DENIED: &str = "You do not have permission to modify this list";
const SHARE_DENIED: &str = "Only the owner can manage sharing";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserOut {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Editor,
    Viewer,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShareRole {
    #[default]
    Viewer,
    Editor,
}

impl From<ShareRole> for Role {
    fn from(role: ShareRole) -> Self {
        match role {
            ShareRole::Viewer => Role::Viewer,
            ShareRole::Editor => Role::Editor,
        }
    }
}

/// A list as seen by one user.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListOut {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
    pub shared: bool,
    pub role: Role,
    pub hidden: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: i64,
    pub list_id: i64,
    pub name: String,
    pub quantity: i64,
    pub expiry: Option<NaiveDate>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareOut {
    pub id: i64,
    pub list_id: i64,
    pub user_id: i64,
    pub email: String,
    pub role: ShareRole,
}

#[derive(Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Deserialize)]
pub struct PasswordChange {
    pub current_password: Option<String>,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct ForgotPassword {
    pub email: String,
}

#[derive(Deserialize)]
pub struct PasswordReset {
    pub token: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct ListName {
    pub name: String,
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub include_hidden: bool,
}

#[derive(Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub expiry: Option<NaiveDate>,
}

/// Item edit. `expiry` is always replaced; absent means cleared.
#[derive(Deserialize)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub quantity: Option<i64>,
    #[serde(default)]
    pub expiry: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct NewShare {
    pub email: String,
    #[serde(default)]
    pub role: ShareRole,
}

#[derive(Deserialize)]
pub struct ShareRoleUpdate {
    pub role: ShareRole,
}

fn default_quantity() -> i64 {
    1
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error rendered as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: Value,
}

impl ApiError {
    fn new(status: StatusCode, detail: &str) -> Self {
        Self {
            status,
            detail: Value::String(detail.to_string()),
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Not authenticated")
    }

    fn not_found(detail: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    fn forbidden(detail: &str) -> Self {
        Self::new(StatusCode::FORBIDDEN, detail)
    }

    fn bad_request(detail: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    /// Field validation failure in the list-of-entries shape.
    fn invalid(field: &str, msg: &str) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: json!([{ "loc": ["body", field], "msg": msg, "type": "value_error" }]),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn required(value: &str, field: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::invalid(field, "Field cannot be empty"));
    }
    Ok(trimmed.to_string())
}

fn check_quantity(quantity: i64) -> ApiResult<i64> {
    if quantity < 1 {
        return Err(ApiError::invalid(
            "quantity",
            "Input should be greater than or equal to 1",
        ));
    }
    Ok(quantity)
}

fn check_password(password: &str, field: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::invalid(
            field,
            "Password must be at least 8 characters",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

struct UserRecord {
    user: UserOut,
    password: String,
}

#[derive(Clone)]
struct ListRecord {
    id: i64,
    name: String,
    owner_id: i64,
}

#[derive(Clone)]
struct ShareRecord {
    id: i64,
    list_id: i64,
    user_id: i64,
    role: ShareRole,
    /// Per-recipient flag; the owner never sees it.
    hidden: bool,
}

#[derive(Default)]
pub struct Db {
    next_id: i64,
    users: BTreeMap<i64, UserRecord>,
    sessions: HashMap<String, i64>,
    reset_tokens: HashMap<String, i64>,
    lists: BTreeMap<i64, ListRecord>,
    items: BTreeMap<i64, Item>,
    shares: BTreeMap<i64, ShareRecord>,
}

pub type SharedDb = Arc<RwLock<Db>>;

impl Db {
    /// Pending password-reset token for `email`, as the reset email would
    /// carry it.
    pub fn reset_token_for(&self, email: &str) -> Option<String> {
        let user_id = self.user_by_email(email)?.user.id;
        self.reset_tokens
            .iter()
            .find(|(_, id)| **id == user_id)
            .map(|(token, _)| token.clone())
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn issue_token(&mut self, kind: &str, user_id: i64) -> String {
        let n = self.next_id();
        format!("{kind}-{user_id}-{n}")
    }

    fn user_by_email(&self, email: &str) -> Option<&UserRecord> {
        let email = email.trim();
        self.users
            .values()
            .find(|u| u.user.email.eq_ignore_ascii_case(email))
    }

    fn authenticate(&self, headers: &HeaderMap) -> ApiResult<i64> {
        request_token(headers)
            .and_then(|token| self.sessions.get(&token).copied())
            .ok_or_else(ApiError::unauthorized)
    }

    /// The caller's role on a list. Lists the caller cannot see are 404.
    fn role_on(&self, list_id: i64, user_id: i64) -> ApiResult<Role> {
        let list = self
            .lists
            .get(&list_id)
            .ok_or_else(|| ApiError::not_found("List not found"))?;
        if list.owner_id == user_id {
            return Ok(Role::Owner);
        }
        self.share_for(list_id, user_id)
            .map(|s| s.role.into())
            .ok_or_else(|| ApiError::not_found("List not found"))
    }

    fn require_editor(&self, list_id: i64, user_id: i64) -> ApiResult<()> {
        match self.role_on(list_id, user_id)? {
            Role::Viewer => Err(ApiError::forbidden(EDIT_DENIED)),
            _ => Ok(()),
        }
    }

    fn require_owner(&self, list_id: i64, user_id: i64, denied: &str) -> ApiResult<()> {
        match self.role_on(list_id, user_id)? {
            Role::Owner => Ok(()),
            _ => Err(ApiError::forbidden(denied)),
        }
    }

    fn share_for(&self, list_id: i64, user_id: i64) -> Option<&ShareRecord> {
        self.shares
            .values()
            .find(|s| s.list_id == list_id && s.user_id == user_id)
    }

    fn list_out(&self, list: &ListRecord, user_id: i64) -> ListOut {
        let share = self.share_for(list.id, user_id);
        let role = if list.owner_id == user_id {
            Role::Owner
        } else {
            share.map_or(Role::Viewer, |s| s.role.into())
        };
        ListOut {
            id: list.id,
            name: list.name.clone(),
            owner_id: list.owner_id,
            shared: self.shares.values().any(|s| s.list_id == list.id),
            role,
            hidden: list.owner_id != user_id && share.is_some_and(|s| s.hidden),
        }
    }

    fn visible_lists(&self, user_id: i64, include_hidden: bool) -> Vec<ListOut> {
        self.lists
            .values()
            .filter(|l| l.owner_id == user_id || self.share_for(l.id, user_id).is_some())
            .map(|l| self.list_out(l, user_id))
            .filter(|l| include_hidden || !l.hidden)
            .collect()
    }

    fn share_out(&self, share: &ShareRecord) -> ShareOut {
        ShareOut {
            id: share.id,
            list_id: share.list_id,
            user_id: share.user_id,
            email: self
                .users
                .get(&share.user_id)
                .map(|u| u.user.email.clone())
                .unwrap_or_default(),
            role: share.role,
        }
    }

    fn item_list(&self, item_id: i64, user_id: i64) -> ApiResult<i64> {
        let list_id = self
            .items
            .get(&item_id)
            .map(|it| it.list_id)
            .ok_or_else(|| ApiError::not_found("Item not found"))?;
        self.role_on(list_id, user_id)
            .map_err(|_| ApiError::not_found("Item not found"))?;
        Ok(list_id)
    }
}

/// Bearer header first, then the session cookie.
fn request_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());
    bearer.or_else(|| {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
            .map(|(_, value)| value.to_string())
    })
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn app() -> Router {
    router(SharedDb::default())
}

/// Build the router over an existing store, so tests can inspect it.
pub fn router(db: SharedDb) -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/token", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/change-password", post(change_password))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/me", get(me).patch(update_me))
        .route("/lists/", get(list_lists).post(create_list))
        .route("/lists/{list_id}", patch(rename_list).delete(delete_list))
        .route("/lists/{list_id}/hide", post(hide_list))
        .route("/lists/{list_id}/unhide", post(unhide_list))
        .route("/lists/{list_id}/items", get(list_items).post(create_item))
        .route(
            "/lists/items/{item_id}",
            patch(update_item).delete(delete_item),
        )
        .route("/lists/{list_id}/share", get(list_shares).post(create_share))
        .route(
            "/lists/{list_id}/share/{share_id}",
            patch(update_share).delete(revoke_share),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, SharedDb::default()).await
}

pub async fn run_with(listener: TcpListener, db: SharedDb) -> Result<(), std::io::Error> {
    axum::serve(listener, router(db)).await
}

// ---------------------------------------------------------------------------
// Auth and account
// ---------------------------------------------------------------------------

async fn register(
    State(db): State<SharedDb>,
    Json(input): Json<Registration>,
) -> ApiResult<(StatusCode, Json<UserOut>)> {
    let email = required(&input.email, "email")?.to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::invalid("email", "value is not a valid email address"));
    }
    check_password(&input.password, "password")?;

    let mut db = db.write().await;
    if db.user_by_email(&email).is_some() {
        return Err(ApiError::bad_request("Email already registered"));
    }
    let id = db.next_id();
    let user = UserOut {
        id,
        email,
        name: None,
        picture: None,
    };
    db.users.insert(
        id,
        UserRecord {
            user: user.clone(),
            password: input.password,
        },
    );
    tracing::info!(user_id = id, "registered {}", user.email);
    Ok((StatusCode::CREATED, Json(user)))
}

/// Sets the session cookie and also returns the token for bearer clients.
async fn login(State(db): State<SharedDb>, Form(form): Form<LoginForm>) -> ApiResult<Response> {
    let mut db = db.write().await;
    let user_id = db
        .user_by_email(&form.username)
        .filter(|u| u.password == form.password)
        .map(|u| u.user.id)
        .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Incorrect email or password"))?;
    let token = db.issue_token("session", user_id);
    db.sessions.insert(token.clone(), user_id);
    tracing::info!(user_id, "signed in");

    let cookie = format!("{SESSION_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "access_token": token, "token_type": "bearer" })),
    )
        .into_response())
}

async fn logout(State(db): State<SharedDb>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = request_token(&headers) {
        db.write().await.sessions.remove(&token);
    }
    let cookie = format!("{SESSION_COOKIE}=; Max-Age=0; Path=/");
    (StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)])
}

async fn me(State(db): State<SharedDb>, headers: HeaderMap) -> ApiResult<Json<UserOut>> {
    let db = db.read().await;
    let user_id = db.authenticate(&headers)?;
    db.users
        .get(&user_id)
        .map(|u| Json(u.user.clone()))
        .ok_or_else(ApiError::unauthorized)
}

/// An empty string clears the field.
async fn update_me(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Json(input): Json<ProfileUpdate>,
) -> ApiResult<Json<UserOut>> {
    let mut db = db.write().await;
    let user_id = db.authenticate(&headers)?;
    let record = db.users.get_mut(&user_id).ok_or_else(ApiError::unauthorized)?;
    if let Some(name) = input.name {
        record.user.name = Some(name.trim().to_string()).filter(|n| !n.is_empty());
    }
    if let Some(picture) = input.picture {
        record.user.picture = Some(picture.trim().to_string()).filter(|p| !p.is_empty());
    }
    Ok(Json(record.user.clone()))
}

async fn change_password(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Json(input): Json<PasswordChange>,
) -> ApiResult<StatusCode> {
    check_password(&input.new_password, "new_password")?;
    let mut db = db.write().await;
    let user_id = db.authenticate(&headers)?;
    let record = db.users.get_mut(&user_id).ok_or_else(ApiError::unauthorized)?;
    if input.current_password.as_deref() != Some(record.password.as_str()) {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }
    record.password = input.new_password;
    Ok(StatusCode::NO_CONTENT)
}

/// Always 204 so the endpoint does not reveal which emails exist.
async fn forgot_password(
    State(db): State<SharedDb>,
    Json(input): Json<ForgotPassword>,
) -> StatusCode {
    let mut db = db.write().await;
    if let Some(user_id) = db.user_by_email(&input.email).map(|u| u.user.id) {
        db.reset_tokens.retain(|_, id| *id != user_id);
        let token = db.issue_token("reset", user_id);
        db.reset_tokens.insert(token, user_id);
        tracing::info!(user_id, "password reset requested");
    }
    StatusCode::NO_CONTENT
}

/// Tokens are single use. Existing sessions of the user are dropped.
async fn reset_password(
    State(db): State<SharedDb>,
    Json(input): Json<PasswordReset>,
) -> ApiResult<StatusCode> {
    check_password(&input.new_password, "new_password")?;
    let mut db = db.write().await;
    let user_id = db
        .reset_tokens
        .remove(input.token.trim())
        .ok_or_else(|| ApiError::bad_request("Invalid or expired reset token"))?;
    if let Some(record) = db.users.get_mut(&user_id) {
        record.password = input.new_password;
    }
    db.sessions.retain(|_, id| *id != user_id);
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

async fn list_lists(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ListOut>>> {
    let db = db.read().await;
    let user_id = db.authenticate(&headers)?;
    Ok(Json(db.visible_lists(user_id, query.include_hidden)))
}

async fn create_list(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Json(input): Json<ListName>,
) -> ApiResult<(StatusCode, Json<ListOut>)> {
    let name = required(&input.name, "name")?;
    let mut db = db.write().await;
    let user_id = db.authenticate(&headers)?;
    let id = db.next_id();
    let list = ListRecord {
        id,
        name,
        owner_id: user_id,
    };
    let out = db.list_out(&list, user_id);
    db.lists.insert(id, list);
    Ok((StatusCode::CREATED, Json(out)))
}

async fn rename_list(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Path(list_id): Path<i64>,
    Json(input): Json<ListName>,
) -> ApiResult<Json<ListOut>> {
    let name = required(&input.name, "name")?;
    let mut db = db.write().await;
    let user_id = db.authenticate(&headers)?;
    db.require_owner(list_id, user_id, "Only the owner can rename this list")?;
    let list = db
        .lists
        .get_mut(&list_id)
        .ok_or_else(|| ApiError::not_found("List not found"))?;
    list.name = name;
    let list = list.clone();
    Ok(Json(db.list_out(&list, user_id)))
}

/// Removes the list with its items and shares.
async fn delete_list(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Path(list_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let mut db = db.write().await;
    let user_id = db.authenticate(&headers)?;
    db.require_owner(list_id, user_id, "Only the owner can delete this list")?;
    db.lists.remove(&list_id);
    db.items.retain(|_, it| it.list_id != list_id);
    db.shares.retain(|_, s| s.list_id != list_id);
    Ok(StatusCode::NO_CONTENT)
}

async fn hide_list(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Path(list_id): Path<i64>,
) -> ApiResult<StatusCode> {
    set_hidden(&db, &headers, list_id, true).await
}

async fn unhide_list(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Path(list_id): Path<i64>,
) -> ApiResult<StatusCode> {
    set_hidden(&db, &headers, list_id, false).await
}

async fn set_hidden(
    db: &SharedDb,
    headers: &HeaderMap,
    list_id: i64,
    hidden: bool,
) -> ApiResult<StatusCode> {
    let mut db = db.write().await;
    let user_id = db.authenticate(headers)?;
    if db.role_on(list_id, user_id)? == Role::Owner {
        return Err(ApiError::bad_request("Owners cannot hide their own lists"));
    }
    if let Some(share) = db
        .shares
        .values_mut()
        .find(|s| s.list_id == list_id && s.user_id == user_id)
    {
        share.hidden = hidden;
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Newest first.
async fn list_items(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Path(list_id): Path<i64>,
) -> ApiResult<Json<Vec<Item>>> {
    let db = db.read().await;
    let user_id = db.authenticate(&headers)?;
    db.role_on(list_id, user_id)?;
    Ok(Json(
        db.items
            .values()
            .rev()
            .filter(|it| it.list_id == list_id)
            .cloned()
            .collect(),
    ))
}

async fn create_item(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Path(list_id): Path<i64>,
    Json(input): Json<NewItem>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    let name = required(&input.name, "name")?;
    let quantity = check_quantity(input.quantity)?;
    let mut db = db.write().await;
    let user_id = db.authenticate(&headers)?;
    db.require_editor(list_id, user_id)?;

    let item = Item {
        id: db.next_id(),
        list_id,
        name,
        quantity,
        expiry: input.expiry,
    };
    db.items.insert(item.id, item.clone());
    Ok((StatusCode::CREATED, Json(item)))
}

async fn update_item(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Path(item_id): Path<i64>,
    Json(input): Json<ItemPatch>,
) -> ApiResult<Json<Item>> {
    let name = input.name.as_deref().map(|n| required(n, "name")).transpose()?;
    let quantity = input.quantity.map(check_quantity).transpose()?;
    let mut db = db.write().await;
    let user_id = db.authenticate(&headers)?;
    let list_id = db.item_list(item_id, user_id)?;
    db.require_editor(list_id, user_id)?;

    let item = db
        .items
        .get_mut(&item_id)
        .ok_or_else(|| ApiError::not_found("Item not found"))?;
    if let Some(name) = name {
        item.name = name;
    }
    if let Some(quantity) = quantity {
        item.quantity = quantity;
    }
    item.expiry = input.expiry;
    Ok(Json(item.clone()))
}

async fn delete_item(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Path(item_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let mut db = db.write().await;
    let user_id = db.authenticate(&headers)?;
    let list_id = db.item_list(item_id, user_id)?;
    db.require_editor(list_id, user_id)?;
    db.items.remove(&item_id);
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Sharing
// ---------------------------------------------------------------------------

async fn list_shares(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Path(list_id): Path<i64>,
) -> ApiResult<Json<Vec<ShareOut>>> {
    let db = db.read().await;
    let user_id = db.authenticate(&headers)?;
    db.require_owner(list_id, user_id, SHARE_DENIED)?;
    Ok(Json(
        db.shares
            .values()
            .filter(|s| s.list_id == list_id)
            .map(|s| db.share_out(s))
            .collect(),
    ))
}

async fn create_share(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Path(list_id): Path<i64>,
    Json(input): Json<NewShare>,
) -> ApiResult<(StatusCode, Json<ShareOut>)> {
    let email = required(&input.email, "email")?;
    let mut db = db.write().await;
    let user_id = db.authenticate(&headers)?;
    db.require_owner(list_id, user_id, SHARE_DENIED)?;

    let target = db
        .user_by_email(&email)
        .map(|u| u.user.id)
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if target == user_id {
        return Err(ApiError::bad_request("You already own this list"));
    }
    if db.share_for(list_id, target).is_some() {
        return Err(ApiError::bad_request("List already shared with this user"));
    }
    let share = ShareRecord {
        id: db.next_id(),
        list_id,
        user_id: target,
        role: input.role,
        hidden: false,
    };
    db.shares.insert(share.id, share.clone());
    Ok((StatusCode::CREATED, Json(db.share_out(&share))))
}

async fn update_share(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Path((list_id, share_id)): Path<(i64, i64)>,
    Json(input): Json<ShareRoleUpdate>,
) -> ApiResult<Json<ShareOut>> {
    let mut db = db.write().await;
    let user_id = db.authenticate(&headers)?;
    db.require_owner(list_id, user_id, SHARE_DENIED)?;
    let share = db
        .shares
        .get_mut(&share_id)
        .filter(|s| s.list_id == list_id)
        .ok_or_else(|| ApiError::not_found("Share not found"))?;
    share.role = input.role;
    let share = share.clone();
    Ok(Json(db.share_out(&share)))
}

async fn revoke_share(
    State(db): State<SharedDb>,
    headers: HeaderMap,
    Path((list_id, share_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    let mut db = db.write().await;
    let user_id = db.authenticate(&headers)?;
    db.require_owner(list_id, user_id, SHARE_DENIED)?;
    let belongs = db
        .shares
        .get(&share_id)
        .is_some_and(|s| s.list_id == list_id);
    if !belongs {
        return Err(ApiError::not_found("Share not found"));
    }
    db.shares.remove(&share_id);
    Ok(StatusCode::NO_CONTENT)
}
