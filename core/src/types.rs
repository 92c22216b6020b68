//! Domain DTOs for the grocery API.
//!
//! # Design
//! These types mirror the backend's JSON schema but are defined independently
//! from the mock-server crate. Integration tests catch any schema drift.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type ListId = i64;
pub type ItemId = i64;
pub type ShareId = i64;

/// The authenticated user as returned by `GET /me`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl User {
    /// Name for display, falling back to the email address.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// The current user's role on a list.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ListRole {
    Owner,
    Editor,
    #[default]
    Viewer,
}

impl ListRole {
    /// Items and list contents may be changed.
    pub fn can_edit(self) -> bool {
        matches!(self, ListRole::Owner | ListRole::Editor)
    }

    /// Rename, delete and sharing are reserved for the owner.
    pub fn is_owner(self) -> bool {
        self == ListRole::Owner
    }
}

/// Role granted to a share recipient.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ShareRole {
    #[default]
    Viewer,
    Editor,
}

impl From<ShareRole> for ListRole {
    fn from(role: ShareRole) -> Self {
        match role {
            ShareRole::Viewer => ListRole::Viewer,
            ShareRole::Editor => ListRole::Editor,
        }
    }
}

/// A grocery list visible to the current user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroceryList {
    pub id: ListId,
    pub name: String,
    pub owner_id: UserId,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub role: ListRole,
    #[serde(default)]
    pub hidden: bool,
}

impl GroceryList {
    /// Role of `user_id` on this list. Ownership always wins over whatever
    /// role the server reported.
    pub fn role_for(&self, user_id: UserId) -> ListRole {
        if self.owner_id == user_id {
            ListRole::Owner
        } else if self.role == ListRole::Owner {
            ListRole::Viewer
        } else {
            self.role
        }
    }
}

/// A single item on a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub list_id: ListId,
    pub name: String,
    pub quantity: i64,
    #[serde(default)]
    pub expiry: Option<NaiveDate>,
}

fn default_quantity() -> i64 {
    1
}

/// Request payload for adding an item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewItem {
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub expiry: Option<NaiveDate>,
}

impl NewItem {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: default_quantity(),
            expiry: None,
        }
    }
}

/// Request payload for editing an item. `expiry: None` clears the date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemUpdate {
    pub name: String,
    pub quantity: i64,
    pub expiry: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListName {
    pub name: String,
}

/// An access grant on a list owned by the current user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Share {
    pub id: ShareId,
    pub list_id: ListId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub email: String,
    pub role: ShareRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewShare {
    pub email: String,
    #[serde(default)]
    pub role: ShareRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareRoleUpdate {
    pub role: ShareRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Registration {
    pub email: String,
    pub password: String,
}

/// Profile patch for `PATCH /me`. An empty string clears the field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_password: Option<String>,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForgotPassword {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordReset {
    pub token: String,
    pub new_password: String,
}

/// Optional token payload some backends return from `POST /auth/token`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
}

fn bearer() -> String {
    "bearer".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(owner_id: UserId, role: ListRole) -> GroceryList {
        GroceryList {
            id: 1,
            name: "Groceries".to_string(),
            owner_id,
            shared: false,
            role,
            hidden: false,
        }
    }

    #[test]
    fn owner_role_follows_owner_id() {
        assert_eq!(list(7, ListRole::Viewer).role_for(7), ListRole::Owner);
        assert_eq!(list(7, ListRole::Owner).role_for(8), ListRole::Viewer);
        assert_eq!(list(7, ListRole::Editor).role_for(8), ListRole::Editor);
    }

    #[test]
    fn list_without_sharing_fields_deserializes() {
        let l: GroceryList =
            serde_json::from_str(r#"{"id":1,"name":"Groceries","owner_id":7}"#).unwrap();
        assert!(!l.shared);
        assert!(!l.hidden);
        assert_eq!(l.role, ListRole::Viewer);
    }

    #[test]
    fn new_item_defaults_quantity_to_one() {
        let item: NewItem = serde_json::from_str(r#"{"name":"Milk"}"#).unwrap();
        assert_eq!(item.quantity, 1);
        assert!(item.expiry.is_none());
        assert_eq!(NewItem::named("Eggs").quantity, 1);
    }

    #[test]
    fn item_expiry_is_an_iso_date() {
        let item: Item = serde_json::from_str(
            r#"{"id":3,"list_id":1,"name":"Milk","quantity":2,"expiry":"2025-09-01"}"#,
        )
        .unwrap();
        assert_eq!(item.expiry, NaiveDate::from_ymd_opt(2025, 9, 1));
    }

    #[test]
    fn item_update_serializes_null_expiry() {
        let update = ItemUpdate {
            name: "Milk".to_string(),
            quantity: 2,
            expiry: None,
        };
        let json = serde_json::to_value(&update).unwrap();
        assert!(json["expiry"].is_null());
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let mut user = User {
            id: 1,
            email: "a@example.com".to_string(),
            name: Some("  ".to_string()),
            picture: None,
        };
        assert_eq!(user.display_name(), "a@example.com");
        user.name = Some("Alice".to_string());
        assert_eq!(user.display_name(), "Alice");
    }
}
