//! `twin_authz`: policy enforcement core for digital twins.
//!
//! Decides, for every inbound signal, whether the caller holds the required
//! permissions on the addressed resource, and whether creating a new entity
//! is allowed by the configured creation restrictions. All evaluation is
//! pure and synchronous; policies and rule lists are borrowed snapshots.
//!
//! Modules:
//! - `permission` - permission kinds and immutable permission sets
//! - `resource` - `(type, path)` resource keys with ancestor comparison
//! - `entity` - `namespace:name` entity ids
//! - `policy` - subjects, policy entries, policies and policy imports
//! - `resolver` - longest-prefix effective-permission resolution
//! - `pattern` - full-match regex / wildcard pattern lists
//! - `restriction` - creation-restriction rules and their evaluation
//! - `signal` - decoded signals and the closed signal-kind catalogue
//! - `enforcement` - dispatch of a signal to the right decision path
//! - `config` - JSON loading and the hot-reloadable rule snapshot
//! - `error` - configuration errors and invariant violations

pub mod config;
pub mod enforcement;
pub mod entity;
pub mod error;
pub mod pattern;
pub mod permission;
pub mod policy;
pub mod resolver;
pub mod resource;
pub mod restriction;
pub mod signal;

pub use config::RestrictionsHandle;
pub use enforcement::{enforce, EnforcementResult, Enforcer};
pub use entity::EntityId;
pub use error::{ConfigError, InvariantViolation};
pub use permission::{Permission, PermissionSet};
pub use policy::{Policy, PolicyEntry, SubjectId};
pub use resolver::{has_partial_permission, has_permission};
pub use resource::ResourceKey;
pub use restriction::{is_creation_allowed, CreationRequest, CreationRestrictions, RestrictionRule};
pub use signal::{Signal, SignalKind};
