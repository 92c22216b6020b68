//! Stateless HTTP request builder and response parser for the grocery API.
//!
//! # Design
//! `GroceryClient` holds the `base_url` and the injected `Credential`. Each
//! operation is split into a `build_*` method that produces an `HttpRequest`
//! and a `parse_*` method that consumes an `HttpResponse`. The caller
//! executes the HTTP round-trip in between, so the client never does I/O.
//!
//! Inputs the backend would reject anyway (blank names, quantity below one)
//! are refused at build time with `ApiError::Validation`.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    ForgotPassword, GroceryList, Item, ItemId, ItemUpdate, ListId, ListName, NewItem, NewShare,
    PasswordChange, PasswordReset, ProfileUpdate, Registration, Share, ShareId, ShareRole,
    ShareRoleUpdate, TokenResponse, User,
};

/// Name of the session cookie the backend sets on login.
pub const SESSION_COOKIE: &str = "access_token";

/// `application/x-www-form-urlencoded` escaping, matching `URLSearchParams`.
const FORM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'*')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_');

/// How authenticated requests prove who they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Credential {
    /// The transport carries the session cookie; no header is added.
    #[default]
    Cookie,
    /// Fallback for environments that block cookies.
    Bearer(String),
}

/// Synchronous, stateless client for the grocery API.
#[derive(Debug, Clone)]
pub struct GroceryClient {
    base_url: String,
    credential: Credential,
}

impl GroceryClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credential: Credential::Cookie,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }

    pub fn set_credential(&mut self, credential: Credential) {
        self.credential = credential;
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -----------------------------------------------------------------------
    // Auth and account
    // -----------------------------------------------------------------------

    /// Form-encoded password login. The backend answers with a session cookie
    /// and possibly a token payload.
    pub fn build_login(&self, email: &str, password: &str) -> HttpRequest {
        let body = format!(
            "username={}&password={}",
            utf8_percent_encode(email.trim(), FORM),
            utf8_percent_encode(password, FORM)
        );
        HttpRequest {
            method: HttpMethod::Post,
            url: self.url("/auth/token"),
            headers: vec![(
                "content-type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            body: Some(body),
        }
    }

    /// Returns the bearer token if the server handed one out, either as a
    /// JSON payload or as the session cookie.
    pub fn parse_login(&self, response: HttpResponse) -> Result<Option<String>, ApiError> {
        check_status(&response)?;
        if response.is_json() && !response.body.trim().is_empty() {
            if let Ok(token) = serde_json::from_str::<TokenResponse>(&response.body) {
                return Ok(Some(token.access_token));
            }
        }
        Ok(session_cookie(&response))
    }

    pub fn build_register(&self, input: &Registration) -> Result<HttpRequest, ApiError> {
        if input.email.trim().is_empty() || input.password.is_empty() {
            return Err(ApiError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        self.json_request(HttpMethod::Post, "/auth/register", input)
    }

    pub fn build_logout(&self) -> HttpRequest {
        self.request(HttpMethod::Post, "/auth/logout")
    }

    pub fn build_me(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/me")
    }

    pub fn build_update_profile(&self, input: &ProfileUpdate) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Patch, "/me", input)
    }

    pub fn build_change_password(&self, input: &PasswordChange) -> Result<HttpRequest, ApiError> {
        if input.new_password.is_empty() {
            return Err(ApiError::Validation("New password is required".to_string()));
        }
        self.json_request(HttpMethod::Post, "/auth/change-password", input)
    }

    pub fn build_forgot_password(&self, email: &str) -> Result<HttpRequest, ApiError> {
        let email = required(email, "Email")?;
        self.json_request(HttpMethod::Post, "/auth/forgot-password", &ForgotPassword { email })
    }

    pub fn build_reset_password(&self, input: &PasswordReset) -> Result<HttpRequest, ApiError> {
        if input.token.trim().is_empty() {
            return Err(ApiError::Validation("Reset token is required".to_string()));
        }
        self.json_request(HttpMethod::Post, "/auth/reset-password", input)
    }

    /// Where the browser is sent to start Google sign-in.
    pub fn google_login_url(&self) -> String {
        self.url("/auth/google/login")
    }

    pub fn parse_user(&self, response: HttpResponse) -> Result<User, ApiError> {
        parse_json(response)
    }

    // -----------------------------------------------------------------------
    // Lists
    // -----------------------------------------------------------------------

    pub fn build_list_lists(&self, include_hidden: bool) -> HttpRequest {
        self.request(
            HttpMethod::Get,
            &format!("/lists/?include_hidden={include_hidden}"),
        )
    }

    pub fn parse_lists(&self, response: HttpResponse) -> Result<Vec<GroceryList>, ApiError> {
        parse_json(response)
    }

    pub fn build_create_list(&self, name: &str) -> Result<HttpRequest, ApiError> {
        let name = required(name, "List name")?;
        self.json_request(HttpMethod::Post, "/lists/", &ListName { name })
    }

    pub fn build_rename_list(&self, id: ListId, name: &str) -> Result<HttpRequest, ApiError> {
        let name = required(name, "List name")?;
        self.json_request(HttpMethod::Patch, &format!("/lists/{id}"), &ListName { name })
    }

    pub fn parse_list(&self, response: HttpResponse) -> Result<GroceryList, ApiError> {
        parse_json(response)
    }

    pub fn build_delete_list(&self, id: ListId) -> HttpRequest {
        self.request(HttpMethod::Delete, &format!("/lists/{id}"))
    }

    pub fn build_hide_list(&self, id: ListId) -> HttpRequest {
        self.request(HttpMethod::Post, &format!("/lists/{id}/hide"))
    }

    pub fn build_unhide_list(&self, id: ListId) -> HttpRequest {
        self.request(HttpMethod::Post, &format!("/lists/{id}/unhide"))
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    pub fn build_list_items(&self, list_id: ListId) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("/lists/{list_id}/items"))
    }

    pub fn parse_items(&self, response: HttpResponse) -> Result<Vec<Item>, ApiError> {
        parse_json(response)
    }

    pub fn build_create_item(&self, list_id: ListId, input: &NewItem) -> Result<HttpRequest, ApiError> {
        let payload = NewItem {
            name: required(&input.name, "Item name")?,
            quantity: positive_quantity(input.quantity)?,
            expiry: input.expiry,
        };
        self.json_request(HttpMethod::Post, &format!("/lists/{list_id}/items"), &payload)
    }

    pub fn build_update_item(&self, item_id: ItemId, input: &ItemUpdate) -> Result<HttpRequest, ApiError> {
        let payload = ItemUpdate {
            name: required(&input.name, "Item name")?,
            quantity: positive_quantity(input.quantity)?,
            expiry: input.expiry,
        };
        self.json_request(HttpMethod::Patch, &format!("/lists/items/{item_id}"), &payload)
    }

    pub fn parse_item(&self, response: HttpResponse) -> Result<Item, ApiError> {
        parse_json(response)
    }

    pub fn build_delete_item(&self, item_id: ItemId) -> HttpRequest {
        self.request(HttpMethod::Delete, &format!("/lists/items/{item_id}"))
    }

    // -----------------------------------------------------------------------
    // Sharing
    // -----------------------------------------------------------------------

    pub fn build_list_shares(&self, list_id: ListId) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("/lists/{list_id}/share"))
    }

    pub fn parse_shares(&self, response: HttpResponse) -> Result<Vec<Share>, ApiError> {
        parse_json(response)
    }

    pub fn build_create_share(&self, list_id: ListId, input: &NewShare) -> Result<HttpRequest, ApiError> {
        let payload = NewShare {
            email: required(&input.email, "Email")?,
            role: input.role,
        };
        self.json_request(HttpMethod::Post, &format!("/lists/{list_id}/share"), &payload)
    }

    pub fn build_update_share(
        &self,
        list_id: ListId,
        share_id: ShareId,
        role: ShareRole,
    ) -> Result<HttpRequest, ApiError> {
        self.json_request(
            HttpMethod::Patch,
            &format!("/lists/{list_id}/share/{share_id}"),
            &ShareRoleUpdate { role },
        )
    }

    pub fn build_revoke_share(&self, list_id: ListId, share_id: ShareId) -> HttpRequest {
        self.request(HttpMethod::Delete, &format!("/lists/{list_id}/share/{share_id}"))
    }

    pub fn parse_share(&self, response: HttpResponse) -> Result<Share, ApiError> {
        parse_json(response)
    }

    /// Accept any 2xx and ignore the body. Used for 204 endpoints and for
    /// endpoints whose payload the caller does not need.
    pub fn parse_empty(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        let mut headers = Vec::new();
        if let Credential::Bearer(token) = &self.credential {
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }
        HttpRequest {
            method,
            url: self.url(path),
            headers,
            body: None,
        }
    }

    fn json_request<T: Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        input: &T,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut req = self.request(method, path);
        req.headers
            .push(("content-type".to_string(), "application/json".to_string()));
        req.body = Some(body);
        Ok(req)
    }
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(ApiError::from_response(response))
    }
}

fn parse_json<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    check_status(&response)?;
    if response.status == 204 || response.body.trim().is_empty() {
        return Err(ApiError::Deserialization(format!(
            "expected a JSON body, got an empty {} response",
            response.status
        )));
    }
    serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

fn session_cookie(response: &HttpResponse) -> Option<String> {
    response.header_values("set-cookie").find_map(|cookie| {
        let pair = cookie.split(';').next()?;
        let (name, value) = pair.split_once('=')?;
        let value = value.trim().trim_matches('"');
        (name.trim() == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

fn required(value: &str, what: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!("{what} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

fn positive_quantity(quantity: i64) -> Result<i64, ApiError> {
    if quantity < 1 {
        return Err(ApiError::Validation(
            "Quantity must be at least 1".to_string(),
        ));
    }
    Ok(quantity)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn client() -> GroceryClient {
        GroceryClient::new("http://localhost:8000")
    }

    fn body(req: &HttpRequest) -> serde_json::Value {
        serde_json::from_str(req.body.as_deref().unwrap()).unwrap()
    }

    #[test]
    fn build_list_lists_produces_correct_request() {
        let req = client().build_list_lists(false);
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:8000/lists/?include_hidden=false");
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn bearer_credential_adds_authorization_header() {
        let c = client().with_credential(Credential::Bearer("tok".to_string()));
        let req = c.build_list_items(4);
        assert_eq!(req.url, "http://localhost:8000/lists/4/items");
        assert_eq!(req.header("authorization"), Some("Bearer tok"));
    }

    #[test]
    fn build_login_is_form_encoded() {
        let req = client().build_login(" a+b@example.com ", "p&ss word");
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:8000/auth/token");
        assert_eq!(
            req.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(
            req.body.as_deref(),
            Some("username=a%2Bb%40example.com&password=p%26ss%20word")
        );
    }

    #[test]
    fn parse_login_reads_token_payload_or_cookie() {
        let c = client();
        let json = HttpResponse::json(200, r#"{"access_token":"abc","token_type":"bearer"}"#);
        assert_eq!(c.parse_login(json).unwrap().as_deref(), Some("abc"));

        let cookie = HttpResponse::new(204, "")
            .with_header("set-cookie", "access_token=xyz; HttpOnly; Path=/; SameSite=Lax");
        assert_eq!(c.parse_login(cookie).unwrap().as_deref(), Some("xyz"));

        assert_eq!(c.parse_login(HttpResponse::new(204, "")).unwrap(), None);
    }

    #[test]
    fn parse_login_rejects_bad_credentials() {
        let resp = HttpResponse::json(401, r#"{"detail":"Incorrect email or password"}"#);
        let err = client().parse_login(resp).unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "Incorrect email or password");
    }

    #[test]
    fn build_create_item_sends_defaults() {
        let req = client().build_create_item(1, &NewItem::named("Milk")).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:8000/lists/1/items");
        assert_eq!(req.header("content-type"), Some("application/json"));
        let json = body(&req);
        assert_eq!(json["name"], "Milk");
        assert_eq!(json["quantity"], 1);
        assert!(json["expiry"].is_null());
    }

    #[test]
    fn build_create_item_rejects_bad_input() {
        let mut input = NewItem::named("Milk");
        input.quantity = 0;
        assert!(matches!(
            client().build_create_item(1, &input),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            client().build_create_item(1, &NewItem::named("   ")),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn build_update_item_rejects_non_positive_quantity() {
        let input = ItemUpdate {
            name: "Milk".to_string(),
            quantity: -2,
            expiry: None,
        };
        assert!(matches!(
            client().build_update_item(9, &input),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn build_update_item_produces_patch() {
        let input = ItemUpdate {
            name: " Oat milk ".to_string(),
            quantity: 3,
            expiry: NaiveDate::from_ymd_opt(2025, 9, 1),
        };
        let req = client().build_update_item(9, &input).unwrap();
        assert_eq!(req.method, HttpMethod::Patch);
        assert_eq!(req.url, "http://localhost:8000/lists/items/9");
        let json = body(&req);
        assert_eq!(json["name"], "Oat milk");
        assert_eq!(json["expiry"], "2025-09-01");
    }

    #[test]
    fn share_endpoints_are_list_scoped() {
        let c = client();
        assert_eq!(c.build_list_shares(2).url, "http://localhost:8000/lists/2/share");
        let req = c.build_update_share(2, 5, ShareRole::Editor).unwrap();
        assert_eq!(req.method, HttpMethod::Patch);
        assert_eq!(req.url, "http://localhost:8000/lists/2/share/5");
        assert_eq!(body(&req)["role"], "editor");
        let req = c.build_revoke_share(2, 5);
        assert_eq!(req.method, HttpMethod::Delete);
    }

    #[test]
    fn hide_and_unhide_are_posts() {
        let c = client();
        let hide = c.build_hide_list(3);
        assert_eq!(hide.method, HttpMethod::Post);
        assert_eq!(hide.url, "http://localhost:8000/lists/3/hide");
        assert_eq!(c.build_unhide_list(3).url, "http://localhost:8000/lists/3/unhide");
    }

    #[test]
    fn parse_items_success() {
        let resp = HttpResponse::json(
            200,
            r#"[{"id":1,"list_id":1,"name":"Milk","quantity":2,"expiry":null}]"#,
        );
        let items = client().parse_items(resp).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
    }

    #[test]
    fn parse_item_bad_json() {
        let resp = HttpResponse::json(200, "not json");
        assert!(matches!(
            client().parse_item(resp),
            Err(ApiError::Deserialization(_))
        ));
    }

    #[test]
    fn parse_list_on_204_is_an_error() {
        let resp = HttpResponse::new(204, "");
        assert!(matches!(
            client().parse_list(resp),
            Err(ApiError::Deserialization(_))
        ));
    }

    #[test]
    fn parse_empty_accepts_any_2xx() {
        let c = client();
        assert!(c.parse_empty(HttpResponse::new(204, "")).is_ok());
        assert!(c.parse_empty(HttpResponse::json(200, r#"{"ok":true}"#)).is_ok());
        let err = c
            .parse_empty(HttpResponse::json(404, r#"{"detail":"Item not found"}"#))
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let c = GroceryClient::new("http://localhost:8000/");
        assert_eq!(c.build_me().url, "http://localhost:8000/me");
        assert_eq!(c.google_login_url(), "http://localhost:8000/auth/google/login");
    }
}
