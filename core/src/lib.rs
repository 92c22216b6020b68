//! Client core for the grocery list service.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values for every
//! backend endpoint (host-does-IO pattern), tracks the signed-in session, and
//! holds the view state of the "Lists" screen.
//!
//! # Design
//! - `GroceryClient` holds only `base_url` and the injected `Credential`.
//! - Each operation is split into `build_*` (produces request) and
//!   `parse_*` (consumes response), so the I/O boundary is explicit.
//! - `Transport` is the one seam that touches the network; `UreqTransport`
//!   is the blocking implementation.
//! - `Session` owns client, transport and credential store.
//! - `ListsController` is the single store behind the Lists screen.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod expiry;
pub mod http;
pub mod session;
pub mod storage;
pub mod transport;
pub mod types;
pub mod view;

#[cfg(test)]
mod testing;

pub use client::{Credential, GroceryClient};
pub use config::ClientConfig;
pub use error::ApiError;
pub use expiry::ExpiryStatus;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use session::{AuthState, Session};
pub use storage::{FileStore, KeyValueStore, MemoryStore, Theme};
pub use transport::{Transport, UreqTransport};
pub use types::{
    GroceryList, Item, ItemUpdate, ListRole, NewItem, ProfileUpdate, Share, ShareRole, User,
};
pub use view::{ClearReport, ItemDraft, ListsController, LoadState, Notice, NoticeLevel, Route};
