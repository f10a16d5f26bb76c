use serde::{Deserialize, Serialize};

use stockline_auth::Role;
use stockline_core::UserId;

/// Who a notification is for, as requested by the caller.
///
/// Role audiences are resolved to concrete users at dispatch time; the
/// resulting [`Recipients`] are what gets persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "targets", rename_all = "snake_case")]
pub enum Audience {
    /// Everyone (one row, `notifications.global`).
    Global,
    /// Explicit users.
    Users(Vec<UserId>),
    /// Every active user holding any of the roles.
    Roles(Vec<Role>),
}

impl Audience {
    /// Explicit users, deduplicated. An empty list means everyone.
    pub fn users(ids: impl IntoIterator<Item = UserId>) -> Self {
        let ids = dedup(ids.into_iter().collect());
        if ids.is_empty() {
            Audience::Global
        } else {
            Audience::Users(ids)
        }
    }

    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Self {
        let mut roles: Vec<Role> = roles.into_iter().collect();
        roles.sort();
        roles.dedup();
        Audience::Roles(roles)
    }

    /// Normalise a deserialized audience (empty user list → global, duplicates removed).
    pub fn normalized(self) -> Self {
        match self {
            Audience::Global => Audience::Global,
            Audience::Users(ids) => Audience::users(ids),
            Audience::Roles(roles) => Audience::roles(roles),
        }
    }
}

/// Resolved recipients of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    Global,
    Users(Vec<UserId>),
}

impl Recipients {
    pub fn users(ids: Vec<UserId>) -> Self {
        Recipients::Users(dedup(ids))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Recipients::Users(ids) if ids.is_empty())
    }
}

fn dedup(ids: Vec<UserId>) -> Vec<UserId> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_user_list_is_global() {
        assert_eq!(Audience::users(Vec::new()), Audience::Global);
    }

    #[test]
    fn user_list_is_deduplicated_in_order() {
        let a = UserId::new();
        let b = UserId::new();
        assert_eq!(Audience::users([a, b, a]), Audience::Users(vec![a, b]));
    }

    #[test]
    fn deserializes_tagged_form() {
        let a: Audience = serde_json::from_str(r#"{"type":"roles","targets":["admin","warehouse"]}"#).unwrap();
        assert_eq!(a, Audience::Roles(vec![Role::ADMIN, Role::WAREHOUSE]));

        let g: Audience = serde_json::from_str(r#"{"type":"global"}"#).unwrap();
        assert_eq!(g, Audience::Global);

        let empty: Audience = serde_json::from_str(r#"{"type":"users","targets":[]}"#).unwrap();
        assert_eq!(empty.normalized(), Audience::Global);
    }
}
