//! Configuration loading: restriction rules and policy snapshots from JSON,
//! plus the swappable snapshot handle for hot reload.
//!
//! Restriction configuration:
//!
//! ```json
//! {
//!   "grant": [
//!     {"resource_types": ["thing"], "namespaces": ["org\\.acme(\\..*)?"],
//!      "auth_subjects": ["integration:.*"], "thing_definitions": [null, "acme:.*"]}
//!   ],
//!   "revoke": [
//!     {"namespaces": ["org.acme.frozen*"], "syntax": "wildcard"}
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashMap as StdHashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;

use crate::entity::EntityId;
use crate::error::Result;
use crate::pattern::PatternSyntax;
use crate::policy::{Importable, Policy, PolicyEntry, PolicyImport, ResourcePermissions, SubjectId};
use crate::resource::ResourceKey;
use crate::restriction::CreationRestrictions;
use crate::signal::Signal;

/// One restriction rule as configured. Every list is optional; an absent or
/// empty list matches anything.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleConfig {
    pub resource_types: Vec<String>,
    pub namespaces: Vec<String>,
    pub auth_subjects: Vec<String>,
    /// `null` entries permit creating a thing without a definition.
    pub thing_definitions: Vec<Option<String>>,
    pub syntax: PatternSyntax,
}

/// Restriction configuration as configured.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RestrictionConfig {
    pub grant: Vec<RuleConfig>,
    pub revoke: Vec<RuleConfig>,
}

/// Parse a restriction config from a JSON string.
pub fn parse_restriction_config(json: &str) -> Result<RestrictionConfig> {
    Ok(serde_json::from_str(json)?)
}

/// Parse and compile restriction rules from a JSON string.
pub fn load_restrictions(json: &str) -> Result<CreationRestrictions> {
    CreationRestrictions::from_config(&parse_restriction_config(json)?)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyDocument {
    id: EntityId,
    #[serde(default)]
    entries: BTreeMap<String, EntryDocument>,
    #[serde(default)]
    imports: Vec<PolicyImport>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntryDocument {
    #[serde(default)]
    subjects: Vec<SubjectId>,
    #[serde(default)]
    resources: StdHashMap<ResourceKey, ResourcePermissions>,
    #[serde(default)]
    importable: Importable,
}

/// Parse a policy snapshot from a JSON string.
///
/// ```json
/// {
///   "id": "org.acme:lamp",
///   "entries": {
///     "owner": {
///       "subjects": ["user:alice"],
///       "resources": {"thing:/": {"grant": ["READ", "WRITE"]}}
///     }
///   }
/// }
/// ```
pub fn parse_policy(json: &str) -> Result<Policy> {
    let document: PolicyDocument = serde_json::from_str(json)?;

    let policy = document
        .entries
        .into_iter()
        .map(|(label, entry)| {
            entry.resources.into_iter().fold(
                PolicyEntry::new(label)
                    .with_subjects(entry.subjects)
                    .with_importable(entry.importable),
                |acc, (key, permissions)| acc.with_resource(key, permissions.grant, permissions.revoke),
            )
        })
        .fold(Policy::new(document.id), Policy::with_entry);

    Ok(document.imports.into_iter().fold(policy, Policy::with_import))
}

/// Parse a decoded signal from a JSON string.
///
/// ```json
/// {"kind": "modify_feature", "entity_id": "org.acme:lamp",
///  "path": "/features/switch", "subjects": ["user:alice"]}
/// ```
pub fn parse_signal(json: &str) -> Result<Signal> {
    Ok(serde_json::from_str(json)?)
}

/// Holder of the current creation restrictions.
///
/// Readers take an `Arc` snapshot and evaluate against it without holding the
/// lock, so an evaluation sees either the complete old rule list or the
/// complete new one.
#[derive(Debug, Default)]
pub struct RestrictionsHandle {
    current: RwLock<Arc<CreationRestrictions>>,
}

impl RestrictionsHandle {
    pub fn new(initial: CreationRestrictions) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// The snapshot in effect right now.
    pub fn load(&self) -> Arc<CreationRestrictions> {
        Arc::clone(&self.current.read())
    }

    /// Install `next` and return the snapshot it replaced.
    pub fn replace(&self, next: CreationRestrictions) -> Arc<CreationRestrictions> {
        std::mem::replace(&mut *self.current.write(), Arc::new(next))
    }

    /// Compile `json` and install it. On error the previous rules stay in
    /// effect and the error is returned.
    pub fn reload_from_json(&self, json: &str) -> Result<()> {
        let next = load_restrictions(json).inspect_err(|e| {
            tracing::warn!(error = %e, "rejected creation restriction reload, keeping previous rules");
        })?;
        let (grant, revoke) = (next.grant().len(), next.revoke().len());
        self.replace(next);
        tracing::info!(grant, revoke, "creation restrictions reloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::permission::PermissionSet;
    use crate::restriction::CreationRequest;

    fn thing_request(namespace: &str) -> CreationRequest {
        CreationRequest {
            resource_type: "thing".to_string(),
            namespace: namespace.to_string(),
            auth_subjects: vec![SubjectId::from("user:alice")],
            definition: None,
        }
    }

    #[test]
    fn parse_full_restriction_config() {
        let json = r#"{
            "grant": [{
                "resource_types": ["thing"],
                "namespaces": ["org\\.acme"],
                "auth_subjects": ["user:.*"],
                "thing_definitions": [null, "acme:lamp:.*"]
            }],
            "revoke": [{"namespaces": ["org.acme.frozen*"], "syntax": "wildcard"}]
        }"#;
        let config = parse_restriction_config(json).unwrap();
        assert_eq!(config.grant.len(), 1);
        assert_eq!(
            config.grant[0].thing_definitions,
            vec![None, Some("acme:lamp:.*".to_string())]
        );
        assert_eq!(config.revoke[0].syntax, PatternSyntax::Wildcard);
        assert_eq!(config.grant[0].syntax, PatternSyntax::Regex);
    }

    #[test]
    fn empty_object_means_no_restriction() {
        let restrictions = load_restrictions("{}").unwrap();
        assert!(restrictions.grant().is_empty());
        assert!(restrictions.is_allowed(&thing_request("anything")));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = parse_restriction_config(r#"{"grant":[{"namespace":["x"]}]}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn malformed_pattern_fails_load() {
        let err = load_restrictions(r#"{"grant":[{"namespaces":["(unclosed"]}]}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegex { .. }));
    }

    #[test]
    fn parse_policy_document() {
        let json = r#"{
            "id": "org.acme:lamp",
            "entries": {
                "owner": {
                    "subjects": ["user:alice"],
                    "resources": {
                        "thing:/": {"grant": ["READ", "WRITE"]},
                        "thing:/features/secret": {"revoke": ["READ"]}
                    }
                },
                "template": {
                    "subjects": ["group:ops"],
                    "resources": {"policy:/": {"grant": ["READ"]}},
                    "importable": "explicit"
                }
            },
            "imports": [{"policy_id": "org.acme:base", "entries": ["ops"]}]
        }"#;
        let policy = parse_policy(json).unwrap();

        assert_eq!(policy.id().to_string(), "org.acme:lamp");
        assert_eq!(policy.entries().len(), 2);
        assert_eq!(policy.imports().len(), 1);

        let owner = policy.entry("owner").unwrap();
        assert!(owner.subjects().contains(&SubjectId::from("user:alice")));
        let secret = owner
            .resources()
            .get(&ResourceKey::parse("thing:/features/secret").unwrap())
            .unwrap();
        assert_eq!(secret.grant, PermissionSet::EMPTY);
        assert_eq!(secret.revoke, PermissionSet::READ);

        assert_eq!(
            policy.entry("template").unwrap().importable(),
            Importable::Explicit
        );
    }

    #[test]
    fn policy_with_bad_resource_key_fails() {
        let json = r#"{"id":"ns:p","entries":{"e":{"resources":{"thing:/a//b":{}}}}}"#;
        assert!(matches!(parse_policy(json), Err(ConfigError::Json(_))));
    }

    #[test]
    fn policy_with_unknown_permission_fails() {
        let json = r#"{"id":"ns:p","entries":{"e":{"resources":{"thing:/":{"grant":["EXECUTE"]}}}}}"#;
        assert!(parse_policy(json).is_err());
    }

    #[test]
    fn handle_swaps_whole_snapshot() {
        let handle = RestrictionsHandle::default();
        let before = handle.load();
        assert!(before.is_allowed(&thing_request("com.other")));

        handle
            .reload_from_json(r#"{"grant":[{"namespaces":["org\\.acme"]}]}"#)
            .unwrap();
        let after = handle.load();

        // The old snapshot is unaffected by the swap.
        assert!(before.is_allowed(&thing_request("com.other")));
        assert!(!after.is_allowed(&thing_request("com.other")));
        assert!(after.is_allowed(&thing_request("org.acme")));
    }

    #[test]
    fn failed_reload_keeps_previous_rules() {
        let handle = RestrictionsHandle::new(
            load_restrictions(r#"{"grant":[{"namespaces":["org\\.acme"]}]}"#).unwrap(),
        );
        let err = handle
            .reload_from_json(r#"{"grant":[{"namespaces":["[broken"]}]}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegex { .. }));

        let current = handle.load();
        assert_eq!(current.grant().len(), 1);
        assert!(!current.is_allowed(&thing_request("com.other")));
    }

    #[test]
    fn concurrent_readers_see_complete_snapshots() {
        let handle = Arc::new(RestrictionsHandle::default());
        let strict = r#"{"grant":[{"namespaces":["a"]},{"namespaces":["b"]}]}"#;

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let handle = Arc::clone(&handle);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let grant = handle.load().grant().len();
                        assert!(grant == 0 || grant == 2, "partial snapshot: {grant}");
                    }
                })
            })
            .collect();

        for _ in 0..100 {
            handle.reload_from_json(strict).unwrap();
            handle.replace(CreationRestrictions::default());
        }
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
