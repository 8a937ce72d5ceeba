//! Role-based authorization.
//!
//! The chat adapter takes a snapshot of the caller's role names, the predicate
//! below only tests membership and never touches the live platform state.

use std::collections::BTreeSet;

/// Role required by privileged commands.
pub const MANAGER_ROLE: &str = "Bot Manager";

const ADMINISTRATOR_ROLE: &str = "Administrator";
const MODERATOR_ROLE: &str = "Moderator";
const MEMBER_ROLE: &str = "Member";

const ADMINISTRATOR_LEVEL: i64 = 100;
const MODERATOR_LEVEL: i64 = 50;

/// Immutable set of role names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        RoleSet(iter.into_iter().map(Into::into).collect())
    }
}

/// Returns `true` when `roles` contains `required`.
pub fn is_authorized(roles: &RoleSet, required: &str) -> bool {
    roles.contains(required)
}

/// Maps a Matrix power level to role names.
///
/// `manager_level` is the level from which [`MANAGER_ROLE`] is granted.
pub fn roles_for_power_level(level: i64, manager_level: i64) -> RoleSet {
    let mut roles = BTreeSet::new();

    let base_role = match level {
        level if level >= ADMINISTRATOR_LEVEL => ADMINISTRATOR_ROLE,
        level if level >= MODERATOR_LEVEL => MODERATOR_ROLE,
        _ => MEMBER_ROLE,
    };
    roles.insert(base_role.to_owned());

    if level >= manager_level {
        roles.insert(MANAGER_ROLE.to_owned());
    }

    RoleSet(roles)
}
