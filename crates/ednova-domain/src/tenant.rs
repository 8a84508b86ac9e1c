//! Tenant identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Longest accepted tenant name (Postgres identifier limit is 63 bytes).
pub const MAX_TENANT_NAME_LEN: usize = 63;

/// Databases every Postgres server already has. A tenant named after one of
/// them would be migrated into it.
pub const RESERVED_TENANT_NAMES: [&str; 3] = ["postgres", "template0", "template1"];

/// Why a tenant name was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TenantNameError {
    #[error("tenant name is empty")]
    Empty,
    #[error("tenant name must be at least 2 characters")]
    TooShort,
    #[error("tenant name is too long")]
    TooLong,
    #[error("tenant name must start with a lowercase letter")]
    BadStart,
    #[error("tenant name may only contain lowercase letters, digits, '-' and '_'")]
    BadCharacter,
    #[error("tenant name {0} is reserved")]
    Reserved(String),
}

/// A validated tenant slug, e.g. `acme` or `khan-academy`.
///
/// Matches `^[a-z][a-z0-9_-]{1,62}$` and is none of [`RESERVED_TENANT_NAMES`].
/// The name is used verbatim as the name of the tenant's database, so nothing
/// outside this alphabet is ever accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TenantName(String);

impl TenantName {
    pub fn parse(raw: &str) -> Result<Self, TenantNameError> {
        let mut chars = raw.chars();
        let first = chars.next().ok_or(TenantNameError::Empty)?;
        if raw.len() > MAX_TENANT_NAME_LEN {
            return Err(TenantNameError::TooLong);
        }
        if !first.is_ascii_lowercase() {
            return Err(TenantNameError::BadStart);
        }
        if raw.len() < 2 {
            return Err(TenantNameError::TooShort);
        }
        if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_') {
            return Err(TenantNameError::BadCharacter);
        }
        if RESERVED_TENANT_NAMES.contains(&raw) {
            return Err(TenantNameError::Reserved(raw.to_owned()));
        }
        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TenantName {
    type Err = TenantNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for TenantName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
