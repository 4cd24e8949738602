use serde::{Deserialize, Serialize};
use std::fmt;

/// Staff authorization level. Variant order is the ranking: `User < Admin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::User, Role::Admin];

    pub fn level(&self) -> u8 {
        match self {
            Role::User => 1,
            Role::Admin => 2,
        }
    }

    pub fn has_required_role(&self, required: Role) -> bool {
        self.level() >= required.level()
    }

    /// Identity-provider group the account is placed in.
    pub fn group_name(&self) -> &'static str {
        self.as_str()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Admin => "Admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
