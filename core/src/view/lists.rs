//! List collection, selection and list-level mutations.

use super::{ItemCache, ListsController, LoadState, NoticeLevel};
use crate::client::GroceryClient;
use crate::error::ApiError;
use crate::storage::KeyValueStore;
use crate::transport::Transport;
use crate::types::{GroceryList, ListId, ListRole};

impl<T: Transport, S: KeyValueStore> ListsController<T, S> {
    pub fn lists(&self) -> &[GroceryList] {
        &self.lists
    }

    pub fn lists_state(&self) -> &LoadState {
        &self.lists_state
    }

    pub fn selected(&self) -> Option<ListId> {
        self.selected
    }

    pub fn show_hidden(&self) -> bool {
        self.show_hidden
    }

    pub fn set_list_query(&mut self, query: &str) {
        self.list_query = query.to_string();
    }

    /// Lists whose name contains the search text, case-insensitively.
    pub fn visible_lists(&self) -> Vec<&GroceryList> {
        let needle = self.list_query.trim().to_lowercase();
        self.lists
            .iter()
            .filter(|l| needle.is_empty() || l.name.to_lowercase().contains(&needle))
            .collect()
    }

    /// Fetch the list collection. Selects the first list when nothing valid
    /// is selected, which lazily loads its items.
    pub fn load_lists(&mut self) -> Result<(), ApiError> {
        self.lists_state = LoadState::Loading;
        let request = self.session.client().build_list_lists(self.show_hidden);
        let lists = match self.session.call(&request, GroceryClient::parse_lists) {
            Ok(lists) => lists,
            Err(e) => {
                self.lists_state = LoadState::Failed(e.to_string());
                return Err(self.fail("load lists", e));
            }
        };
        self.lists = lists.into_iter().map(|l| self.normalize(l)).collect();
        self.lists_state = LoadState::Loaded;
        let lists = &self.lists;
        self.items.retain(|id, _| lists.iter().any(|l| l.id == *id));

        let still_there = self.selected.is_some_and(|id| self.list(id).is_some());
        if !still_there {
            self.selected = None;
            self.clear_shares();
            if let Some(first) = self.lists.first().map(|l| l.id) {
                // Item load failures are reported by select_list itself.
                let _ = self.select_list(first);
            }
        }
        Ok(())
    }

    /// Toggle whether hidden shared lists are listed, then reload.
    pub fn set_show_hidden(&mut self, show: bool) -> Result<(), ApiError> {
        if self.show_hidden == show {
            return Ok(());
        }
        self.show_hidden = show;
        self.load_lists()
    }

    /// Make `id` the active list and load its items once.
    pub fn select_list(&mut self, id: ListId) -> Result<(), ApiError> {
        if self.list(id).is_none() {
            return Err(self.reject(ApiError::Validation(format!("Unknown list {id}"))));
        }
        if self.selected != Some(id) {
            self.clear_shares();
        }
        self.selected = Some(id);
        self.ensure_items(id)
    }

    /// Fetch items unless they are cached or already in flight. A failed
    /// load is retried.
    pub(super) fn ensure_items(&mut self, id: ListId) -> Result<(), ApiError> {
        let cache = self.items.entry(id).or_default();
        if matches!(cache.state, LoadState::Loaded | LoadState::Loading) {
            return Ok(());
        }
        cache.state = LoadState::Loading;
        self.fetch_items(id)
    }

    /// Re-fetch items for `id` even if they are cached.
    pub fn reload_items(&mut self, id: ListId) -> Result<(), ApiError> {
        self.items.entry(id).or_default().state = LoadState::Loading;
        self.fetch_items(id)
    }

    fn fetch_items(&mut self, id: ListId) -> Result<(), ApiError> {
        let request = self.session.client().build_list_items(id);
        match self.session.call(&request, GroceryClient::parse_items) {
            Ok(items) => {
                let cache = self.items.entry(id).or_default();
                cache.items = items;
                cache.state = LoadState::Loaded;
                Ok(())
            }
            Err(e) => {
                self.items.entry(id).or_default().state = LoadState::Failed(e.to_string());
                Err(self.fail("load items", e))
            }
        }
    }

    pub fn create_list(&mut self, name: &str) -> Result<GroceryList, ApiError> {
        let request = match self.session.client().build_create_list(name) {
            Ok(request) => request,
            Err(e) => return Err(self.reject(e)),
        };
        let list = match self.session.call(&request, GroceryClient::parse_list) {
            Ok(list) => self.normalize(list),
            Err(e) => return Err(self.fail("create list", e)),
        };

        self.lists.push(list.clone());
        // A brand new list has no items; nothing to fetch.
        self.items.insert(
            list.id,
            ItemCache {
                state: LoadState::Loaded,
                items: Vec::new(),
            },
        );
        if self.selected.is_none() {
            self.selected = Some(list.id);
        }
        self.notify(NoticeLevel::Success, "List created");
        Ok(list)
    }

    pub fn rename_list(&mut self, id: ListId, name: &str) -> Result<GroceryList, ApiError> {
        self.require(id, ListRole::is_owner, "Only the owner can rename this list")?;
        let request = match self.session.client().build_rename_list(id, name) {
            Ok(request) => request,
            Err(e) => return Err(self.reject(e)),
        };
        let updated = match self.session.call(&request, GroceryClient::parse_list) {
            Ok(list) => self.normalize(list),
            Err(e) => return Err(self.fail("rename list", e)),
        };

        if let Some(slot) = self.lists.iter_mut().find(|l| l.id == id) {
            // The rename response may omit per-user fields.
            *slot = GroceryList {
                hidden: slot.hidden,
                shared: slot.shared || updated.shared,
                ..updated.clone()
            };
        }
        self.notify(NoticeLevel::Success, "List renamed");
        Ok(updated)
    }

    /// Delete a list the user owns, drop its cached state and move the
    /// selection to the first remaining list.
    pub fn delete_list(&mut self, id: ListId) -> Result<(), ApiError> {
        self.require(id, ListRole::is_owner, "Only the owner can delete this list")?;
        let request = self.session.client().build_delete_list(id);
        if let Err(e) = self.session.call(&request, GroceryClient::parse_empty) {
            return Err(self.fail("delete list", e));
        }

        self.forget_list(id);
        self.notify(NoticeLevel::Success, "List deleted");
        Ok(())
    }

    /// Hide a list shared with the user. Only affects this user's view; the
    /// share itself is untouched.
    pub fn hide_list(&mut self, id: ListId) -> Result<(), ApiError> {
        self.set_hidden(id, true)
    }

    pub fn unhide_list(&mut self, id: ListId) -> Result<(), ApiError> {
        self.set_hidden(id, false)
    }

    fn set_hidden(&mut self, id: ListId, hidden: bool) -> Result<(), ApiError> {
        self.require(
            id,
            |role| !role.is_owner(),
            "Owners cannot hide their own lists",
        )?;
        let client = self.session.client();
        let request = if hidden {
            client.build_hide_list(id)
        } else {
            client.build_unhide_list(id)
        };
        if let Err(e) = self.session.call(&request, GroceryClient::parse_empty) {
            let action = if hidden { "hide list" } else { "unhide list" };
            return Err(self.fail(action, e));
        }

        if hidden && !self.show_hidden {
            self.forget_list(id);
        } else if let Some(list) = self.lists.iter_mut().find(|l| l.id == id) {
            list.hidden = hidden;
        }
        let message = if hidden { "List hidden" } else { "List restored" };
        self.notify(NoticeLevel::Success, message);
        Ok(())
    }

    fn forget_list(&mut self, id: ListId) {
        self.lists.retain(|l| l.id != id);
        if let Some(cache) = self.items.remove(&id) {
            for item in &cache.items {
                self.editing.remove(&item.id);
            }
        }
        self.drafts.remove(&id);
        self.queries.remove(&id);

        if self.selected == Some(id) {
            self.selected = None;
            self.clear_shares();
            if let Some(first) = self.lists.first().map(|l| l.id) {
                let _ = self.select_list(first);
            }
        }
    }
}
