//! Fixed role assignments for connections.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;

use ephemera_core::result::SyncResult;
use ephemera_core::traits::RoleVerifier;
use ephemera_core::types::{OriginId, Role};

/// Role verifier backed by an in-memory assignment table.
///
/// Connections without an explicit assignment get `default_roles`.
#[derive(Debug, Default)]
pub struct StaticRoleVerifier {
    /// Connection id → assigned roles
    assignments: DashMap<OriginId, HashSet<Role>>,
    default_roles: HashSet<Role>,
}

impl StaticRoleVerifier {
    /// Every unassigned connection holds every role.
    pub fn allow_all() -> Self {
        Self::with_default_roles([
            Role::Organizer,
            Role::Presenter,
            Role::Attendee,
            Role::Guest,
        ])
    }

    /// Unassigned connections hold `roles`.
    pub fn with_default_roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            assignments: DashMap::new(),
            default_roles: roles.into_iter().collect(),
        }
    }

    /// Assign roles to a connection, replacing earlier assignments.
    pub fn assign(&self, origin_id: OriginId, roles: impl IntoIterator<Item = Role>) {
        self.assignments
            .insert(origin_id, roles.into_iter().collect());
    }
}

#[async_trait]
impl RoleVerifier for StaticRoleVerifier {
    async fn roles_for(&self, origin_id: &OriginId) -> SyncResult<HashSet<Role>> {
        Ok(self
            .assignments
            .get(origin_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| self.default_roles.clone()))
    }
}
