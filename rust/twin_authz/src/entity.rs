//! Entity identifiers of the form `<namespace>:<name>`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InvariantViolation;

/// Identifier of a thing or a policy.
///
/// The namespace is everything before the first `:`; it may be empty (the
/// default namespace) but never contains `:`. The name must not be empty.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    namespace: String,
    name: String,
}

impl EntityId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self, InvariantViolation> {
        let namespace = namespace.into();
        let name = name.into();
        if name.is_empty() || namespace.contains(':') {
            return Err(InvariantViolation::MalformedEntityId(format!("{namespace}:{name}")));
        }
        Ok(Self { namespace, name })
    }

    pub fn parse(s: &str) -> Result<Self, InvariantViolation> {
        let (namespace, name) = s
            .split_once(':')
            .ok_or_else(|| InvariantViolation::MalformedEntityId(s.to_string()))?;
        if name.is_empty() {
            return Err(InvariantViolation::MalformedEntityId(s.to_string()));
        }
        Self::new(namespace, name)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

impl TryFrom<String> for EntityId {
    type Error = InvariantViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EntityId::parse(&value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}
