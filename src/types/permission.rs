use std::fmt;

use serde::{Deserialize, Serialize};

/// Permission represents a bitmask of granted permissions.
///
/// `READ` and `WRITE` are attached to routes, `MANAGER` is a global token
/// permission that satisfies every check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(u32);

impl Permission {
    pub const READ: Permission = Permission(1 << 0); // 1
    pub const WRITE: Permission = Permission(1 << 1); // 2
    pub const MANAGER: Permission = Permission(1 << 2); // 4

    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if this permission bitmask contains the required permission.
    #[must_use]
    pub const fn has(self, required: Permission) -> bool {
        self.0 & required.0 == required.0
    }

    /// Combines two permission bitmasks.
    #[must_use]
    pub const fn union(self, other: Permission) -> Permission {
        Permission(self.0 | other.0)
    }

    /// Removes permissions from this bitmask.
    #[must_use]
    pub const fn difference(self, other: Permission) -> Permission {
        Permission(self.0 & !other.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Converts a permission string to its bitmask value.
    /// Accepts the long names and the single-letter shorthands.
    pub fn parse(s: &str) -> Option<Permission> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" | "r" => Some(Self::READ),
            "write" | "w" => Some(Self::WRITE),
            "manager" | "m" => Some(Self::MANAGER),
            _ => None,
        }
    }

    /// Parses a shorthand string such as `"rw"`.
    pub fn parse_shorthand(s: &str) -> Option<Permission> {
        let mut result = Permission::default();
        for c in s.chars() {
            result = result.union(Self::parse(&c.to_string())?);
        }
        Some(result)
    }

    /// Converts a slice of permission strings to a combined bitmask.
    pub fn parse_many(strs: &[&str]) -> Option<Permission> {
        let mut result = Permission::default();
        for s in strs {
            result = result.union(Self::parse(s)?);
        }
        Some(result)
    }

    /// Returns a slice of permission strings for this bitmask.
    #[must_use]
    pub fn to_strings(self) -> Vec<&'static str> {
        let mut perms = Vec::new();
        if self.has(Self::READ) {
            perms.push("read");
        }
        if self.has(Self::WRITE) {
            perms.push("write");
        }
        if self.has(Self::MANAGER) {
            perms.push("manager");
        }
        perms
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_strings().join(", "))
    }
}

impl From<u32> for Permission {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<Permission> for u32 {
    fn from(p: Permission) -> Self {
        p.0
    }
}
