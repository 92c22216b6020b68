//! Item drafts, inline edit buffers and item mutations.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;

use super::{ListsController, LoadState, NoticeLevel};
use crate::client::GroceryClient;
use crate::error::ApiError;
use crate::session::send_logged;
use crate::storage::KeyValueStore;
use crate::transport::Transport;
use crate::types::{Item, ItemId, ItemUpdate, ListId, ListRole, NewItem};

const EDIT_DENIED: &str = "You have view-only access to this list";

/// Upper bound on concurrent deletes issued by `clear_all`.
pub(super) const CLEAR_WORKERS: usize = 8;

/// Form state for a new item or an item being edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDraft {
    pub name: String,
    pub quantity: i64,
    pub expiry: Option<NaiveDate>,
}

impl Default for ItemDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            quantity: 1,
            expiry: None,
        }
    }
}

impl From<&Item> for ItemDraft {
    fn from(item: &Item) -> Self {
        Self {
            name: item.name.clone(),
            quantity: item.quantity,
            expiry: item.expiry,
        }
    }
}

/// Outcome of a bulk delete.
#[derive(Debug, Default)]
pub struct ClearReport {
    pub removed: Vec<ItemId>,
    pub failed: Vec<(ItemId, ApiError)>,
}

impl<T: Transport, S: KeyValueStore> ListsController<T, S> {
    pub fn items(&self, list_id: ListId) -> &[Item] {
        self.items
            .get(&list_id)
            .map_or(&[][..], |cache| cache.items.as_slice())
    }

    pub fn items_state(&self, list_id: ListId) -> LoadState {
        self.items
            .get(&list_id)
            .map(|cache| cache.state.clone())
            .unwrap_or_default()
    }

    /// Number of cached items, zero until the list has been opened.
    pub fn item_count(&self, list_id: ListId) -> usize {
        self.items(list_id).len()
    }

    pub fn draft(&self, list_id: ListId) -> ItemDraft {
        self.drafts.get(&list_id).cloned().unwrap_or_default()
    }

    pub fn draft_mut(&mut self, list_id: ListId) -> &mut ItemDraft {
        self.drafts.entry(list_id).or_default()
    }

    pub fn clear_draft(&mut self, list_id: ListId) {
        self.drafts.remove(&list_id);
    }

    /// Submit the list's draft. The created item goes to the top of the
    /// cache and the draft resets.
    pub fn add_item(&mut self, list_id: ListId) -> Result<Item, ApiError> {
        self.require(list_id, ListRole::can_edit, EDIT_DENIED)?;
        let draft = self.draft(list_id);
        let input = NewItem {
            name: draft.name,
            quantity: draft.quantity,
            expiry: draft.expiry,
        };
        let request = match self.session.client().build_create_item(list_id, &input) {
            Ok(request) => request,
            Err(e) => return Err(self.reject(e)),
        };
        let item = match self.session.call(&request, GroceryClient::parse_item) {
            Ok(item) => item,
            Err(e) => return Err(self.fail("add item", e)),
        };

        self.items
            .entry(list_id)
            .or_default()
            .items
            .insert(0, item.clone());
        self.drafts.remove(&list_id);
        self.notify(NoticeLevel::Success, "Item added");
        Ok(item)
    }

    pub fn is_editing(&self, item_id: ItemId) -> bool {
        self.editing.contains_key(&item_id)
    }

    /// Open an edit buffer seeded from the cached item.
    pub fn start_edit(&mut self, item_id: ItemId) -> bool {
        let Some(draft) = self.find_item(item_id).map(|(_, item)| ItemDraft::from(item)) else {
            return false;
        };
        self.editing.insert(item_id, draft);
        true
    }

    pub fn edit_buffer(&self, item_id: ItemId) -> Option<&ItemDraft> {
        self.editing.get(&item_id)
    }

    pub fn edit_buffer_mut(&mut self, item_id: ItemId) -> Option<&mut ItemDraft> {
        self.editing.get_mut(&item_id)
    }

    pub fn cancel_edit(&mut self, item_id: ItemId) {
        self.editing.remove(&item_id);
    }

    /// Send the edit buffer and splice the server's item into the cache.
    pub fn save_edit(&mut self, item_id: ItemId) -> Result<Item, ApiError> {
        let Some(draft) = self.editing.get(&item_id).cloned() else {
            return Err(self.reject(ApiError::Validation(format!(
                "Item {item_id} is not being edited"
            ))));
        };
        let list_id = self.owning_list(item_id)?;
        self.require(list_id, ListRole::can_edit, EDIT_DENIED)?;

        let input = ItemUpdate {
            name: draft.name,
            quantity: draft.quantity,
            expiry: draft.expiry,
        };
        let request = match self.session.client().build_update_item(item_id, &input) {
            Ok(request) => request,
            Err(e) => return Err(self.reject(e)),
        };
        let updated = match self.session.call(&request, GroceryClient::parse_item) {
            Ok(item) => item,
            Err(e) => return Err(self.fail("update item", e)),
        };

        if let Some(cache) = self.items.get_mut(&list_id) {
            if let Some(slot) = cache.items.iter_mut().find(|it| it.id == item_id) {
                *slot = updated.clone();
            }
        }
        self.editing.remove(&item_id);
        self.notify(NoticeLevel::Success, "Item updated");
        Ok(updated)
    }

    pub fn delete_item(&mut self, item_id: ItemId) -> Result<(), ApiError> {
        let list_id = self.owning_list(item_id)?;
        self.require(list_id, ListRole::can_edit, EDIT_DENIED)?;
        let request = self.session.client().build_delete_item(item_id);
        if let Err(e) = self.session.call(&request, GroceryClient::parse_empty) {
            return Err(self.fail("delete item", e));
        }

        if let Some(cache) = self.items.get_mut(&list_id) {
            cache.items.retain(|it| it.id != item_id);
        }
        self.editing.remove(&item_id);
        self.notify(NoticeLevel::Success, "Item deleted");
        Ok(())
    }

    /// Delete every item of `list_id` on a bounded pool of workers, loading
    /// the items first if the list was never opened. Successful deletes
    /// leave the cache; each failure is reported on its own and the rest of
    /// the batch still completes.
    pub fn clear_all(&mut self, list_id: ListId) -> Result<ClearReport, ApiError> {
        self.require(list_id, ListRole::can_edit, EDIT_DENIED)?;
        self.ensure_items(list_id)?;
        let targets: Vec<(ItemId, String)> = self
            .items(list_id)
            .iter()
            .map(|it| (it.id, it.name.clone()))
            .collect();
        if targets.is_empty() {
            self.notify(NoticeLevel::Warning, "There are no items to clear");
            return Ok(ClearReport::default());
        }

        let client = self.session.client();
        let transport = self.session.transport();
        let next = AtomicUsize::new(0);
        let workers = CLEAR_WORKERS.min(targets.len());
        let mut outcomes: Vec<Option<Result<(), ApiError>>> =
            std::iter::repeat_with(|| None).take(targets.len()).collect();
        let worker = || {
            let mut done = Vec::new();
            loop {
                let idx = next.fetch_add(1, Ordering::Relaxed);
                let Some(&(id, _)) = targets.get(idx) else {
                    break;
                };
                let request = client.build_delete_item(id);
                let result =
                    send_logged(transport, &request).and_then(|resp| client.parse_empty(resp));
                done.push((idx, result));
            }
            done
        };
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .filter_map(|n| {
                    std::thread::Builder::new()
                        .name(format!("clear-all-{n}"))
                        .spawn_scoped(scope, worker)
                        .map_err(|e| tracing::warn!("cannot start delete worker: {e}"))
                        .ok()
                })
                .collect();
            for handle in handles {
                for (idx, result) in handle.join().unwrap_or_default() {
                    outcomes[idx] = Some(result);
                }
            }
        });
        let results = targets.iter().zip(outcomes).map(|(&(id, _), outcome)| {
            let result = outcome.unwrap_or_else(|| {
                Err(ApiError::Transport("delete was not attempted".to_string()))
            });
            (id, result)
        });

        let mut report = ClearReport::default();
        for (id, result) in results {
            match result {
                Ok(()) => report.removed.push(id),
                Err(e) => report.failed.push((id, e)),
            }
        }

        if let Some(cache) = self.items.get_mut(&list_id) {
            cache.items.retain(|it| !report.removed.contains(&it.id));
        }
        for id in &report.removed {
            self.editing.remove(id);
        }
        tracing::debug!(
            list_id,
            removed = report.removed.len(),
            failed = report.failed.len(),
            "clear all finished"
        );

        if report.failed.iter().any(|(_, e)| e.is_unauthorized()) {
            self.sign_out_to_login();
            self.notify(NoticeLevel::Danger, "Your session has expired");
            return Ok(report);
        }
        for (id, e) in &report.failed {
            let name = targets
                .iter()
                .find(|(tid, _)| tid == id)
                .map_or("item", |(_, name)| name.as_str());
            self.notify(NoticeLevel::Danger, format!("Failed to delete {name}: {e}"));
        }
        if !report.removed.is_empty() {
            self.notify(
                NoticeLevel::Success,
                format!("Removed {} item(s)", report.removed.len()),
            );
        }
        Ok(report)
    }

    fn find_item(&self, item_id: ItemId) -> Option<(ListId, &Item)> {
        self.items.iter().find_map(|(list_id, cache)| {
            cache
                .items
                .iter()
                .find(|it| it.id == item_id)
                .map(|it| (*list_id, it))
        })
    }

    fn owning_list(&mut self, item_id: ItemId) -> Result<ListId, ApiError> {
        let found = self.find_item(item_id).map(|(list_id, _)| list_id);
        match found {
            Some(list_id) => Ok(list_id),
            None => Err(self.reject(ApiError::Validation(format!("Unknown item {item_id}")))),
        }
    }
}
