//! User domain types.

use serde::{Deserialize, Serialize};

/// User permission level within a tenant.
///
/// JSON carries the name (`USER` / `ADMIN`). Tokens and the database carry
/// the numeric code from [`UserRole::as_u8`] (0 = User, 1 = Admin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    User = 0,
    Admin = 1,
}

impl UserRole {
    /// Convert from the numeric code. Returns `None` for unknown values.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::User),
            1 => Some(Self::Admin),
            _ => None,
        }
    }

    /// Numeric code stored in tokens and the database.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}
