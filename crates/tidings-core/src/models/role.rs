//! Role domain model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TidingsError;
use crate::models::account::AccountFlags;

/// Closed set of roles, ordered by privilege.
///
/// A higher role implies every capability of the roles below it, so
/// capability checks are plain comparisons: `role >= Role::Moderator`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Collapse an account's privilege flags into its single effective
    /// role. The highest set flag wins.
    pub fn from_flags(flags: &AccountFlags) -> Self {
        if flags.super_admin {
            Role::SuperAdmin
        } else if flags.admin {
            Role::Admin
        } else if flags.moderator {
            Role::Moderator
        } else {
            Role::User
        }
    }

    /// Whether this role carries every capability of `required`.
    pub fn includes(self, required: Role) -> bool {
        self >= required
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = TidingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            "super_admin" => Ok(Role::SuperAdmin),
            other => Err(TidingsError::Validation {
                message: format!("unknown role: {other}"),
            }),
        }
    }
}
