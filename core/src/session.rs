//! Session and authentication state.
//!
//! # Design
//! `Session` owns the client, the transport and the credential store, so the
//! credential is an explicit value injected into every request rather than
//! ambient state. Auth moves through `Loading -> Authenticated | Anonymous`;
//! logout and any 401 force `Anonymous`. Nothing is retried.

use crate::client::{Credential, GroceryClient};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::storage::{KeyValueStore, TOKEN_KEY};
use crate::transport::Transport;
use crate::types::{PasswordChange, PasswordReset, ProfileUpdate, Registration, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Loading,
    Authenticated(User),
    Anonymous,
}

pub struct Session<T, S> {
    client: GroceryClient,
    transport: T,
    store: S,
    state: AuthState,
    bearer_fallback: bool,
}

impl<T: Transport, S: KeyValueStore> Session<T, S> {
    /// Start in `Loading`, restoring a stored fallback token if allowed.
    /// Call `refresh` to learn who the user is.
    pub fn new(config: &ClientConfig, transport: T, store: S) -> Self {
        let mut client = GroceryClient::new(&config.api_base);
        if config.bearer_fallback {
            if let Some(token) = store.get(TOKEN_KEY).filter(|t| !t.is_empty()) {
                client.set_credential(Credential::Bearer(token));
            }
        }
        Self {
            client,
            transport,
            store,
            state: AuthState::Loading,
            bearer_fallback: config.bearer_fallback,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn user(&self) -> Option<&User> {
        match &self.state {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    pub fn client(&self) -> &GroceryClient {
        &self.client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Execute one request, logging the exchange.
    pub fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        send_logged(&self.transport, request)
    }

    /// Execute `request` and parse the response with one of the client's
    /// `parse_*` methods.
    pub fn call<R>(
        &self,
        request: &HttpRequest,
        parse: impl FnOnce(&GroceryClient, HttpResponse) -> Result<R, ApiError>,
    ) -> Result<R, ApiError> {
        let response = self.send(request)?;
        parse(&self.client, response)
    }

    /// Re-fetch the current user. Any failure, network or 401, leaves the
    /// session anonymous; a 401 also drops the stored token.
    pub fn refresh(&mut self) -> Result<User, ApiError> {
        self.state = AuthState::Loading;
        let result = self
            .send(&self.client.build_me())
            .and_then(|resp| self.client.parse_user(resp));
        match result {
            Ok(user) => {
                tracing::debug!(user_id = user.id, "session refreshed");
                self.state = AuthState::Authenticated(user.clone());
                Ok(user)
            }
            Err(e) => {
                tracing::debug!("session refresh failed: {e}");
                if e.is_unauthorized() {
                    self.clear();
                } else {
                    self.state = AuthState::Anonymous;
                }
                Err(e)
            }
        }
    }

    /// Exchange email and password for a session, then load the user.
    pub fn login(&mut self, email: &str, password: &str) -> Result<User, ApiError> {
        let request = self.client.build_login(email, password);
        let token = self
            .send(&request)
            .and_then(|resp| self.client.parse_login(resp))?;

        match token.filter(|_| self.bearer_fallback) {
            Some(token) => {
                self.store.set(TOKEN_KEY, &token);
                self.client.set_credential(Credential::Bearer(token));
            }
            None => {
                self.store.remove(TOKEN_KEY);
                self.client.set_credential(Credential::Cookie);
            }
        }
        let user = self.refresh()?;
        tracing::info!(user_id = user.id, "signed in");
        Ok(user)
    }

    /// Create an account and sign straight in.
    pub fn register(&mut self, email: &str, password: &str) -> Result<User, ApiError> {
        let input = Registration {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let request = self.client.build_register(&input)?;
        self.send(&request)
            .and_then(|resp| self.client.parse_empty(resp))?;
        tracing::info!("registered {}", input.email);
        self.login(&input.email, password)
    }

    /// The OAuth redirect lands back with the session cookie already set.
    pub fn complete_oauth(&mut self) -> Result<User, ApiError> {
        self.client.set_credential(Credential::Cookie);
        self.refresh()
    }

    pub fn google_login_url(&self) -> String {
        self.client.google_login_url()
    }

    /// Best-effort server logout; the local session is cleared regardless.
    pub fn logout(&mut self) {
        let result = self
            .send(&self.client.build_logout())
            .and_then(|resp| self.client.parse_empty(resp));
        if let Err(e) = result {
            tracing::warn!("server logout failed: {e}");
        }
        self.clear();
        tracing::info!("signed out");
    }

    /// Drop the credential after the server rejected it.
    pub fn invalidate(&mut self) {
        if !matches!(self.state, AuthState::Anonymous) {
            tracing::info!("session invalidated by server");
        }
        self.clear();
    }

    pub fn update_profile(&mut self, input: &ProfileUpdate) -> Result<User, ApiError> {
        let request = self.client.build_update_profile(input)?;
        let result = self
            .send(&request)
            .and_then(|resp| self.client.parse_user(resp));
        let user = self.guard(result)?;
        self.state = AuthState::Authenticated(user.clone());
        Ok(user)
    }

    pub fn change_password(
        &mut self,
        current_password: Option<&str>,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let input = PasswordChange {
            current_password: current_password.map(str::to_string),
            new_password: new_password.to_string(),
        };
        let request = self.client.build_change_password(&input)?;
        let result = self
            .send(&request)
            .and_then(|resp| self.client.parse_empty(resp));
        self.guard(result)
    }

    /// Ask the backend to email a reset code. Succeeds whether or not the
    /// address is known.
    pub fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        let request = self.client.build_forgot_password(email)?;
        self.send(&request)
            .and_then(|resp| self.client.parse_empty(resp))
    }

    pub fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ApiError> {
        let input = PasswordReset {
            token: token.trim().to_string(),
            new_password: new_password.to_string(),
        };
        let request = self.client.build_reset_password(&input)?;
        self.send(&request)
            .and_then(|resp| self.client.parse_empty(resp))
    }

    fn guard<R>(&mut self, result: Result<R, ApiError>) -> Result<R, ApiError> {
        if let Err(e) = &result {
            if e.is_unauthorized() {
                self.invalidate();
            }
        }
        result
    }

    fn clear(&mut self) {
        self.store.remove(TOKEN_KEY);
        self.client.set_credential(Credential::Cookie);
        self.state = AuthState::Anonymous;
    }
}

/// Execute `request` on `transport` with request/response logging.
pub(crate) fn send_logged<T: Transport + ?Sized>(
    transport: &T,
    request: &HttpRequest,
) -> Result<HttpResponse, ApiError> {
    tracing::debug!(method = request.method.as_str(), url = %request.url, "request");
    match transport.execute(request) {
        Ok(response) => {
            tracing::debug!(
                method = request.method.as_str(),
                url = %request.url,
                status = response.status,
                "response"
            );
            Ok(response)
        }
        Err(e) => {
            tracing::warn!(method = request.method.as_str(), url = %request.url, "transport error: {e}");
            Err(e)
        }
    }
}
