use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::TenantConfig;

/// Bot-level privilege, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Moderator,
    Admin,
    Owner,
}

/// Who is issuing a command, as reported by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: String,
    /// Administrator of the chat the command came from
    pub is_chat_admin: bool,
}

impl Caller {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_chat_admin: false,
        }
    }

    pub fn chat_admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_chat_admin: true,
        }
    }
}

/// Highest role held by each user
#[derive(Debug, Clone, Default)]
pub struct RoleSet {
    roles: HashMap<String, Role>,
}

impl RoleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &TenantConfig) -> Self {
        let mut set = Self::new();
        for (users, role) in [
            (&config.moderators, Role::Moderator),
            (&config.admins, Role::Admin),
            (&config.owners, Role::Owner),
        ] {
            for user in users {
                set.grant(user.clone(), role);
            }
        }
        set
    }

    /// Give `role` to a user. A higher role already held is kept.
    pub fn grant(&mut self, user: impl Into<String>, role: Role) {
        let entry = self.roles.entry(user.into()).or_insert(role);
        *entry = (*entry).max(role);
    }

    pub fn revoke(&mut self, user: &str) -> Option<Role> {
        self.roles.remove(user)
    }

    pub fn role_of(&self, user: &str) -> Option<Role> {
        self.roles.get(user).copied()
    }

    pub fn has_at_least(&self, user: &str, role: Role) -> bool {
        self.role_of(user).map(|r| r >= role).unwrap_or(false)
    }
}
