//! Per-list filter and sort, applied in memory over the cached items.

use std::cmp::Ordering;

use super::ListsController;
use crate::expiry::compare_expiry;
use crate::storage::KeyValueStore;
use crate::transport::Transport;
use crate::types::{Item, ListId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Name,
    Quantity,
    Expiry,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    fn flipped(self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemQuery {
    pub filter: String,
    pub key: SortKey,
    pub dir: SortDir,
}

impl ItemQuery {
    /// Same key flips the direction; a new key starts ascending.
    pub fn toggle(&mut self, key: SortKey) {
        if self.key == key {
            self.dir = self.dir.flipped();
        } else {
            self.key = key;
            self.dir = SortDir::Asc;
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        let needle = self.filter.trim().to_lowercase();
        needle.is_empty() || item.name.to_lowercase().contains(&needle)
    }

    pub fn compare(&self, a: &Item, b: &Item) -> Ordering {
        let ord = match self.key {
            SortKey::Name => compare_names(&a.name, &b.name),
            SortKey::Quantity => a.quantity.cmp(&b.quantity),
            SortKey::Expiry => compare_expiry(a.expiry, b.expiry),
        };
        match self.dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        }
    }

    /// Filter then stable-sort `items`.
    pub fn apply<'a>(&self, items: &'a [Item]) -> Vec<&'a Item> {
        let mut view: Vec<&Item> = items.iter().filter(|it| self.matches(it)).collect();
        view.sort_by(|a, b| self.compare(a, b));
        view
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

impl<T: Transport, S: KeyValueStore> ListsController<T, S> {
    pub fn query(&self, list_id: ListId) -> ItemQuery {
        self.queries.get(&list_id).cloned().unwrap_or_default()
    }

    pub fn set_filter(&mut self, list_id: ListId, filter: &str) {
        self.queries.entry(list_id).or_default().filter = filter.to_string();
    }

    pub fn toggle_sort(&mut self, list_id: ListId, key: SortKey) {
        self.queries.entry(list_id).or_default().toggle(key);
    }

    /// The cached items of `list_id` as the table shows them.
    pub fn view_items(&self, list_id: ListId) -> Vec<&Item> {
        let query = self.queries.get(&list_id).cloned().unwrap_or_default();
        query.apply(self.items(list_id))
    }
}
