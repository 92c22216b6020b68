//! View state for the "Lists" screen.
//!
//! # Design
//! `ListsController` is the single store behind the screen: the list
//! collection, a per-list item cache, drafts and edit buffers, per-list
//! filter/sort, shares, transient notices and the current route. Every
//! collection carries an explicit `LoadState` instead of ad hoc fetch guards.
//!
//! Mutations are confirm-then-apply: the request goes out first and local
//! state changes only after the server returns the canonical entity. Each
//! operation reports its own failure as a notice and returns the error; a
//! 401 anywhere signs the user out and routes to the login view.

mod items;
mod lists;
mod query;
mod shares;

use std::collections::HashMap;

pub use items::{ClearReport, ItemDraft};
pub use query::{ItemQuery, SortDir, SortKey};

use crate::error::ApiError;
use crate::session::{AuthState, Session};
use crate::storage::KeyValueStore;
use crate::transport::Transport;
use crate::types::{
    GroceryList, Item, ItemId, ListId, ListRole, ProfileUpdate, Share, User, UserId,
};

/// Lifecycle of a fetched collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Danger,
}

/// A transient message for the user (a toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Route {
    #[default]
    Lists,
    Login,
}

#[derive(Debug, Default)]
struct ItemCache {
    state: LoadState,
    items: Vec<Item>,
}

pub struct ListsController<T, S> {
    session: Session<T, S>,
    route: Route,
    notices: Vec<Notice>,

    lists: Vec<GroceryList>,
    lists_state: LoadState,
    show_hidden: bool,
    list_query: String,
    selected: Option<ListId>,

    items: HashMap<ListId, ItemCache>,
    drafts: HashMap<ListId, ItemDraft>,
    editing: HashMap<ItemId, ItemDraft>,
    queries: HashMap<ListId, ItemQuery>,

    shares: Vec<Share>,
    shares_state: LoadState,
    shares_list: Option<ListId>,
}

impl<T: Transport, S: KeyValueStore> ListsController<T, S> {
    pub fn new(session: Session<T, S>) -> Self {
        let route = if session.is_authenticated() {
            Route::Lists
        } else {
            Route::Login
        };
        Self {
            session,
            route,
            notices: Vec::new(),
            lists: Vec::new(),
            lists_state: LoadState::Idle,
            show_hidden: false,
            list_query: String::new(),
            selected: None,
            items: HashMap::new(),
            drafts: HashMap::new(),
            editing: HashMap::new(),
            queries: HashMap::new(),
            shares: Vec::new(),
            shares_state: LoadState::Idle,
            shares_list: None,
        }
    }

    pub fn session(&self) -> &Session<T, S> {
        &self.session
    }

    /// Persisted client state such as the theme.
    pub fn store_mut(&mut self) -> &mut S {
        self.session.store_mut()
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Hand pending notices to the UI, which shows each once.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// App start: resolve the session, then load lists or route to login.
    pub fn start(&mut self) -> Result<(), ApiError> {
        match self.session.refresh() {
            Ok(_) => {
                self.route = Route::Lists;
                self.load_lists()
            }
            Err(e) => {
                self.reset();
                self.route = Route::Login;
                Err(e)
            }
        }
    }

    pub fn sign_in(&mut self, email: &str, password: &str) -> Result<User, ApiError> {
        match self.session.login(email, password) {
            Ok(user) => {
                self.reset();
                self.route = Route::Lists;
                // A failed list load is already reported; the sign-in stands.
                let _ = self.load_lists();
                Ok(user)
            }
            Err(e) => {
                self.notify(NoticeLevel::Danger, e.to_string());
                Err(e)
            }
        }
    }

    pub fn sign_out(&mut self) {
        self.session.logout();
        self.reset();
        self.route = Route::Login;
    }

    // -----------------------------------------------------------------------
    // Account
    // -----------------------------------------------------------------------

    pub fn update_profile(&mut self, input: &ProfileUpdate) -> Result<User, ApiError> {
        match self.session.update_profile(input) {
            Ok(user) => {
                self.notify(NoticeLevel::Success, "Profile updated");
                Ok(user)
            }
            Err(e) => Err(self.fail("update profile", e)),
        }
    }

    /// `current_password` may be omitted for accounts created through Google.
    pub fn change_password(
        &mut self,
        current_password: Option<&str>,
        new_password: &str,
    ) -> Result<(), ApiError> {
        match self.session.change_password(current_password, new_password) {
            Ok(()) => {
                self.notify(NoticeLevel::Success, "Password changed");
                Ok(())
            }
            Err(e) => Err(self.fail("change password", e)),
        }
    }

    // -----------------------------------------------------------------------
    // Permissions
    // -----------------------------------------------------------------------

    pub fn active_list(&self) -> Option<&GroceryList> {
        self.selected.and_then(|id| self.list(id))
    }

    pub fn active_role(&self) -> Option<ListRole> {
        self.active_list().map(|l| l.role)
    }

    /// Item mutations and list contents.
    pub fn can_edit_active(&self) -> bool {
        self.active_role().is_some_and(ListRole::can_edit)
    }

    /// Rename, delete and sharing.
    pub fn can_manage_active(&self) -> bool {
        self.active_role().is_some_and(ListRole::is_owner)
    }

    // -----------------------------------------------------------------------
    // Internals shared by the operation modules
    // -----------------------------------------------------------------------

    fn list(&self, id: ListId) -> Option<&GroceryList> {
        self.lists.iter().find(|l| l.id == id)
    }

    fn user_id(&self) -> Option<UserId> {
        match self.session.state() {
            AuthState::Authenticated(user) => Some(user.id),
            _ => None,
        }
    }

    /// Re-derive the caller's role so that `owner` always means ownership.
    fn normalize(&self, mut list: GroceryList) -> GroceryList {
        if let Some(user_id) = self.user_id() {
            list.role = list.role_for(user_id);
        }
        list
    }

    /// Check the caller's role on `list_id` before dispatching anything.
    fn require(
        &mut self,
        list_id: ListId,
        allowed: fn(ListRole) -> bool,
        denied: &str,
    ) -> Result<(), ApiError> {
        let err = match self.list(list_id) {
            Some(list) if allowed(list.role) => return Ok(()),
            Some(_) => ApiError::Forbidden(denied.to_string()),
            None => ApiError::Validation(format!("Unknown list {list_id}")),
        };
        Err(self.reject(err))
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }

    /// Input or permission problem caught before any request.
    fn reject(&mut self, err: ApiError) -> ApiError {
        self.notify(NoticeLevel::Warning, err.to_string());
        err
    }

    /// Report a failed call. A 401 ends the session.
    fn fail(&mut self, action: &str, err: ApiError) -> ApiError {
        tracing::warn!("{action} failed: {err}");
        match err {
            ApiError::Validation(_) | ApiError::Forbidden(_) => return self.reject(err),
            _ if err.is_unauthorized() => self.sign_out_to_login(),
            _ => {}
        }
        self.notify(NoticeLevel::Danger, err.to_string());
        err
    }

    fn sign_out_to_login(&mut self) {
        self.session.invalidate();
        self.reset();
        self.route = Route::Login;
    }

    fn reset(&mut self) {
        self.lists.clear();
        self.lists_state = LoadState::Idle;
        self.selected = None;
        self.items.clear();
        self.drafts.clear();
        self.editing.clear();
        self.queries.clear();
        self.clear_shares();
    }

    fn clear_shares(&mut self) {
        self.shares.clear();
        self.shares_state = LoadState::Idle;
        self.shares_list = None;
    }
}
