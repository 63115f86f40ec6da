//! Error types for the enforcement core.
//!
//! Denials are never errors. They are ordinary return values of the
//! evaluation functions. The two enums here cover the remaining failure
//! channels: configuration that cannot be loaded, and values that break a
//! caller-side contract.

use thiserror::Error;

/// Configuration could not be loaded. Loading fails closed: no partially
/// valid rule list is ever installed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A pattern in a restriction rule did not compile. Wildcards are
    /// translated to regexes first, so both syntaxes report here.
    #[error("invalid {field} pattern {pattern:?}: {source}")]
    InvalidRegex {
        field: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Unknown permission name.
    #[error("unknown permission: {0}")]
    UnknownPermission(String),

    /// A resource key or entity id in configuration is malformed.
    #[error("invalid configuration value: {0}")]
    Invariant(#[from] InvariantViolation),

    /// JSON syntax or shape error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A caller handed the core a value that breaks one of its invariants.
///
/// Raised when the offending value is constructed, so evaluation never sees
/// an invalid value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("resource type must not be empty")]
    EmptyResourceType,

    #[error("resource path {path:?} contains an empty segment")]
    EmptyPathSegment { path: String },

    #[error("resource key {0:?} is not of the form <type>:/<path>")]
    MalformedResourceKey(String),

    #[error("entity id {0:?} is not of the form <namespace>:<name>")]
    MalformedEntityId(String),

    #[error("{kind} signals cannot address {target}")]
    UnaddressableTarget { kind: String, target: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
