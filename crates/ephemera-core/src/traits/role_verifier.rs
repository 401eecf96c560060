//! Role lookup for connections.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;

use crate::result::SyncResult;
use crate::types::{OriginId, Role};

/// Maps a connection to the roles it holds.
#[async_trait]
pub trait RoleVerifier: Send + Sync + fmt::Debug + 'static {
    /// Roles held by the given connection.
    async fn roles_for(&self, origin_id: &OriginId) -> SyncResult<HashSet<Role>>;

    /// Whether the connection holds at least one of `allowed`.
    ///
    /// An empty `allowed` list means unrestricted.
    async fn has_any_role(&self, origin_id: &OriginId, allowed: &[Role]) -> SyncResult<bool> {
        if allowed.is_empty() {
            return Ok(true);
        }
        let roles = self.roles_for(origin_id).await?;
        Ok(allowed.iter().any(|role| roles.contains(role)))
    }
}
