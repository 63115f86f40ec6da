//! Permission kinds and immutable permission sets.
//!
//! A [`PermissionSet`] is a small bitmask over [`Permission`] values. All
//! operations return new sets; nothing mutates in place, so sets can be
//! copied freely into concurrent evaluations.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A single permission kind.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum Permission {
    Read,
    Write,
    Administrate,
}

impl Permission {
    /// Every permission kind, in canonical order.
    pub const ALL: [Permission; 3] = [Permission::Read, Permission::Write, Permission::Administrate];

    const fn bit(self) -> u8 {
        match self {
            Permission::Read => 0b001,
            Permission::Write => 0b010,
            Permission::Administrate => 0b100,
        }
    }

    /// Canonical upper-case name ("READ", "WRITE", "ADMINISTRATE").
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Read => "READ",
            Permission::Write => "WRITE",
            Permission::Administrate => "ADMINISTRATE",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ConfigError;

    /// Names are matched case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownPermission(s.to_string()))
    }
}

/// Immutable set of permission kinds.
///
/// The empty set is the identity for [`PermissionSet::union`].
#[derive(Clone, Copy, Default, Hash, Eq, PartialEq)]
pub struct PermissionSet(u8);

impl PermissionSet {
    pub const EMPTY: PermissionSet = PermissionSet(0);
    pub const READ: PermissionSet = PermissionSet(Permission::Read.bit());
    pub const WRITE: PermissionSet = PermissionSet(Permission::Write.bit());
    pub const ADMINISTRATE: PermissionSet = PermissionSet(Permission::Administrate.bit());
    pub const READ_WRITE: PermissionSet = PermissionSet(Permission::Read.bit() | Permission::Write.bit());
    pub const ALL: PermissionSet = PermissionSet(0b111);

    pub fn from_permissions<I: IntoIterator<Item = Permission>>(permissions: I) -> Self {
        PermissionSet(permissions.into_iter().fold(0, |acc, p| acc | p.bit()))
    }

    /// Parse a list of permission names. Unknown names are a configuration error.
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, ConfigError> {
        names
            .iter()
            .map(|n| n.as_ref().parse::<Permission>())
            .collect::<Result<Vec<_>, _>>()
            .map(PermissionSet::from_permissions)
    }

    #[must_use]
    pub const fn union(self, other: PermissionSet) -> PermissionSet {
        PermissionSet(self.0 | other.0)
    }

    /// Permissions in `self` that are not in `other`.
    #[must_use]
    pub const fn difference(self, other: PermissionSet) -> PermissionSet {
        PermissionSet(self.0 & !other.0)
    }

    #[must_use]
    pub const fn intersection(self, other: PermissionSet) -> PermissionSet {
        PermissionSet(self.0 & other.0)
    }

    /// `true` iff every permission of `self` is also in `other`.
    #[must_use]
    pub const fn is_subset_of(self, other: PermissionSet) -> bool {
        self.0 & !other.0 == 0
    }

    #[must_use]
    pub const fn contains(self, permission: Permission) -> bool {
        self.0 & permission.bit() != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Permission> {
        Permission::ALL.into_iter().filter(move |p| self.contains(*p))
    }
}

impl From<Permission> for PermissionSet {
    fn from(permission: Permission) -> Self {
        PermissionSet(permission.bit())
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        PermissionSet::from_permissions(iter)
    }
}

impl fmt::Debug for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Permission::as_str).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

impl Serialize for PermissionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(None)?;
        for permission in self.iter() {
            seq.serialize_element(permission.as_str())?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for PermissionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NamesVisitor;

        impl<'de> Visitor<'de> for NamesVisitor {
            type Value = PermissionSet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of permission names")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut set = PermissionSet::EMPTY;
                while let Some(name) = seq.next_element::<String>()? {
                    let permission = name.parse::<Permission>().map_err(de::Error::custom)?;
                    set = set.union(permission.into());
                }
                Ok(set)
            }
        }

        deserializer.deserialize_seq(NamesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_union_identity() {
        for set in [PermissionSet::READ, PermissionSet::READ_WRITE, PermissionSet::ALL] {
            assert_eq!(set.union(PermissionSet::EMPTY), set);
            assert_eq!(PermissionSet::EMPTY.union(set), set);
        }
    }

    #[test]
    fn difference_removes_only_revoked() {
        let effective = PermissionSet::ALL.difference(PermissionSet::WRITE);
        assert!(effective.contains(Permission::Read));
        assert!(!effective.contains(Permission::Write));
        assert!(effective.contains(Permission::Administrate));
    }

    #[test]
    fn subset_semantics() {
        assert!(PermissionSet::EMPTY.is_subset_of(PermissionSet::EMPTY));
        assert!(PermissionSet::READ.is_subset_of(PermissionSet::READ_WRITE));
        assert!(!PermissionSet::READ_WRITE.is_subset_of(PermissionSet::READ));
    }

    #[test]
    fn parse_is_case_insensitive() {
        let set = PermissionSet::parse(&["read", "Write"]).unwrap();
        assert_eq!(set, PermissionSet::READ_WRITE);
    }

    #[test]
    fn parse_rejects_unknown_names() {
        let err = PermissionSet::parse(&["READ", "EXECUTE"]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPermission(name) if name == "EXECUTE"));
    }

    #[test]
    fn serde_uses_names() {
        let json = serde_json::to_string(&PermissionSet::READ_WRITE).unwrap();
        assert_eq!(json, r#"["READ","WRITE"]"#);
        let back: PermissionSet = serde_json::from_str(r#"["administrate"]"#).unwrap();
        assert_eq!(back, PermissionSet::ADMINISTRATE);
        assert!(serde_json::from_str::<PermissionSet>(r#"["nope"]"#).is_err());
    }

    #[test]
    fn display_lists_names() {
        assert_eq!(PermissionSet::READ_WRITE.to_string(), "[READ, WRITE]");
        assert_eq!(PermissionSet::EMPTY.to_string(), "[]");
    }
}
