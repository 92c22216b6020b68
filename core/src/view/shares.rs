//! Share management for lists the user owns.

use super::{ListsController, LoadState, NoticeLevel};
use crate::client::GroceryClient;
use crate::error::ApiError;
use crate::storage::KeyValueStore;
use crate::transport::Transport;
use crate::types::{ListId, ListRole, NewShare, Share, ShareId, ShareRole};

const SHARE_DENIED: &str = "Only the owner can manage sharing";

impl<T: Transport, S: KeyValueStore> ListsController<T, S> {
    /// Shares of the list last loaded with `load_shares`.
    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    pub fn shares_state(&self) -> &LoadState {
        &self.shares_state
    }

    pub fn load_shares(&mut self, list_id: ListId) -> Result<(), ApiError> {
        self.require(list_id, ListRole::is_owner, SHARE_DENIED)?;
        self.shares_state = LoadState::Loading;
        let request = self.session.client().build_list_shares(list_id);
        match self.session.call(&request, GroceryClient::parse_shares) {
            Ok(shares) => {
                self.shares = shares;
                self.shares_list = Some(list_id);
                self.shares_state = LoadState::Loaded;
                Ok(())
            }
            Err(e) => {
                self.shares_state = LoadState::Failed(e.to_string());
                Err(self.fail("load shares", e))
            }
        }
    }

    pub fn add_share(
        &mut self,
        list_id: ListId,
        email: &str,
        role: ShareRole,
    ) -> Result<Share, ApiError> {
        self.require(list_id, ListRole::is_owner, SHARE_DENIED)?;
        let input = NewShare {
            email: email.to_string(),
            role,
        };
        let request = match self.session.client().build_create_share(list_id, &input) {
            Ok(request) => request,
            Err(e) => return Err(self.reject(e)),
        };
        let share = match self.session.call(&request, GroceryClient::parse_share) {
            Ok(share) => share,
            Err(e) => return Err(self.fail("share list", e)),
        };

        if self.shares_list == Some(list_id) {
            self.shares.push(share.clone());
        }
        self.mark_shared(list_id, true);
        self.notify(NoticeLevel::Success, format!("Shared with {}", share.email));
        Ok(share)
    }

    pub fn change_share_role(
        &mut self,
        list_id: ListId,
        share_id: ShareId,
        role: ShareRole,
    ) -> Result<Share, ApiError> {
        self.require(list_id, ListRole::is_owner, SHARE_DENIED)?;
        let request = match self.session.client().build_update_share(list_id, share_id, role) {
            Ok(request) => request,
            Err(e) => return Err(self.reject(e)),
        };
        let updated = match self.session.call(&request, GroceryClient::parse_share) {
            Ok(share) => share,
            Err(e) => return Err(self.fail("update share role", e)),
        };

        if let Some(slot) = self.shares.iter_mut().find(|s| s.id == share_id) {
            *slot = updated.clone();
        }
        self.notify(NoticeLevel::Success, "Role updated");
        Ok(updated)
    }

    pub fn revoke_share(&mut self, list_id: ListId, share_id: ShareId) -> Result<(), ApiError> {
        self.require(list_id, ListRole::is_owner, SHARE_DENIED)?;
        let request = self.session.client().build_revoke_share(list_id, share_id);
        if let Err(e) = self.session.call(&request, GroceryClient::parse_empty) {
            return Err(self.fail("revoke share", e));
        }

        if self.shares_list == Some(list_id) {
            self.shares.retain(|s| s.id != share_id);
            if self.shares.is_empty() {
                self.mark_shared(list_id, false);
            }
        }
        self.notify(NoticeLevel::Success, "Access revoked");
        Ok(())
    }

    fn mark_shared(&mut self, list_id: ListId, shared: bool) {
        if let Some(list) = self.lists.iter_mut().find(|l| l.id == list_id) {
            list.shared = shared;
        }
    }
}
