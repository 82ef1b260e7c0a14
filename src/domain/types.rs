//! Roles and capability levels used by the session authority and the gate.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Role attached to an account and, after login, to its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(DomainError::UnknownRole {
                value: other.to_string(),
            }),
        }
    }
}

/// What a request is allowed to do, ordered from least to most privileged.
///
/// `Anonymous` is the absence of a valid session; it is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Anonymous,
    User,
    Admin,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl From<Role> for Capability {
    fn from(role: Role) -> Self {
        match role {
            Role::User => Capability::User,
            Role::Admin => Capability::Admin,
        }
    }
}

impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_are_ordered_by_privilege() {
        assert!(Capability::Anonymous < Capability::User);
        assert!(Capability::User < Capability::Admin);
        assert_eq!(Capability::from(Role::Admin), Capability::Admin);
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("ADMIN".parse::<Role>().expect("role"), Role::Admin);
        assert_eq!(" user ".parse::<Role>().expect("role"), Role::User);
        assert!("owner".parse::<Role>().is_err());
    }
}
