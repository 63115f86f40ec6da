//! Resource keys: `(resource type, path)` addresses inside an entity's tree.
//!
//! The textual form is `<type>:/<segment>/<segment>`, e.g.
//! `thing:/features/temperature`. The root of a resource type is `thing:/`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InvariantViolation;

/// Resource type of digital twins.
pub const THING: &str = "thing";
/// Resource type of policies.
pub const POLICY: &str = "policy";

/// A node inside an entity's logical tree.
///
/// Invariants: the resource type is non-empty, no path segment is empty, and
/// the root path is the empty sequence. [`ResourceKey::depth`] is the segment
/// count and serves as the specificity measure during resolution.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceKey {
    resource_type: String,
    path: Vec<String>,
}

impl ResourceKey {
    pub fn new<T, I, S>(resource_type: T, segments: I) -> Result<Self, InvariantViolation>
    where
        T: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let resource_type = resource_type.into();
        if resource_type.is_empty() {
            return Err(InvariantViolation::EmptyResourceType);
        }
        let path: Vec<String> = segments.into_iter().map(Into::into).collect();
        if path.iter().any(String::is_empty) {
            return Err(InvariantViolation::EmptyPathSegment {
                path: format!("/{}", path.join("/")),
            });
        }
        Ok(Self {
            resource_type,
            path,
        })
    }

    /// The root key of a resource type.
    pub fn root(resource_type: impl Into<String>) -> Result<Self, InvariantViolation> {
        Self::new(resource_type, std::iter::empty::<String>())
    }

    /// Root of one of the built-in resource types.
    pub(crate) fn root_of(resource_type: &'static str) -> Self {
        debug_assert!(!resource_type.is_empty());
        Self {
            resource_type: resource_type.to_string(),
            path: Vec::new(),
        }
    }

    /// Build a key from a slash-separated path. One leading and one trailing
    /// `/` are tolerated; `""` and `"/"` are the root. Any `//`, including a
    /// bare `"//"`, is rejected.
    pub fn from_path(resource_type: impl Into<String>, path: &str) -> Result<Self, InvariantViolation> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        if trimmed.is_empty() {
            return Self::root(resource_type);
        }
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        Self::new(resource_type, trimmed.split('/')).map_err(|e| match e {
            InvariantViolation::EmptyPathSegment { .. } => InvariantViolation::EmptyPathSegment {
                path: path.to_string(),
            },
            other => other,
        })
    }

    /// Parse the textual form `<type>:/<path>`.
    pub fn parse(s: &str) -> Result<Self, InvariantViolation> {
        let (resource_type, path) = s
            .split_once(':')
            .ok_or_else(|| InvariantViolation::MalformedResourceKey(s.to_string()))?;
        if !path.is_empty() && !path.starts_with('/') {
            return Err(InvariantViolation::MalformedResourceKey(s.to_string()));
        }
        Self::from_path(resource_type, path)
    }

    /// A key one level below this one.
    pub fn child(&self, segment: impl Into<String>) -> Result<Self, InvariantViolation> {
        Self::new(
            self.resource_type.clone(),
            self.path.iter().cloned().chain(std::iter::once(segment.into())),
        )
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn segments(&self) -> &[String] {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// `true` iff both keys share the resource type and `self.path` is a
    /// prefix of `other.path` (equal keys count as ancestors).
    pub fn is_ancestor_of(&self, other: &ResourceKey) -> bool {
        self.resource_type == other.resource_type && other.path.starts_with(&self.path)
    }

    /// Like [`ResourceKey::is_ancestor_of`] but excludes equal keys.
    pub fn is_strict_ancestor_of(&self, other: &ResourceKey) -> bool {
        self.depth() < other.depth() && self.is_ancestor_of(other)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:/{}", self.resource_type, self.path.join("/"))
    }
}

impl TryFrom<String> for ResourceKey {
    type Error = InvariantViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ResourceKey::parse(&value)
    }
}

impl From<ResourceKey> for String {
    fn from(key: ResourceKey) -> Self {
        key.to_string()
    }
}
