//! Policy data model: subjects, entries and policies.
//!
//! A [`Policy`] is a read-only snapshot owned by the persistence layer. The
//! enforcement core borrows it for the duration of one evaluation and never
//! mutates it; a new policy version replaces the old one wholesale.

use std::fmt;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::permission::PermissionSet;
use crate::resource::ResourceKey;

/// Opaque subject identifier, compared by exact string equality.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SubjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Granted and revoked permissions at one resource key.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourcePermissions {
    pub grant: PermissionSet,
    pub revoke: PermissionSet,
}

impl ResourcePermissions {
    pub fn new(grant: PermissionSet, revoke: PermissionSet) -> Self {
        Self { grant, revoke }
    }
}

/// Whether an entry may be pulled into another policy through an import.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importable {
    /// Imported whenever the policy is imported.
    #[default]
    Implicit,
    /// Imported only when the import lists the entry's label.
    Explicit,
    /// Never imported.
    Never,
}

/// One labelled rule of a policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyEntry {
    label: String,
    subjects: AHashSet<SubjectId>,
    resources: AHashMap<ResourceKey, ResourcePermissions>,
    importable: Importable,
}

impl PolicyEntry {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            subjects: AHashSet::new(),
            resources: AHashMap::new(),
            importable: Importable::default(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<SubjectId>) -> Self {
        self.subjects.insert(subject.into());
        self
    }

    pub fn with_subjects<I, S>(mut self, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SubjectId>,
    {
        self.subjects.extend(subjects.into_iter().map(Into::into));
        self
    }

    /// Set the permissions at `key`. A later call for the same key replaces
    /// the earlier one.
    pub fn with_resource(mut self, key: ResourceKey, grant: PermissionSet, revoke: PermissionSet) -> Self {
        self.resources.insert(key, ResourcePermissions::new(grant, revoke));
        self
    }

    pub fn with_importable(mut self, importable: Importable) -> Self {
        self.importable = importable;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn subjects(&self) -> &AHashSet<SubjectId> {
        &self.subjects
    }

    pub fn resources(&self) -> &AHashMap<ResourceKey, ResourcePermissions> {
        &self.resources
    }

    pub fn importable(&self) -> Importable {
        self.importable
    }

    /// `true` iff any of `subjects` is named by this entry. Entries without
    /// subjects never match.
    pub fn matches_any_subject(&self, subjects: &[SubjectId]) -> bool {
        subjects.iter().any(|s| self.subjects.contains(s))
    }

    fn relabelled(&self, label: String) -> Self {
        Self {
            label,
            ..self.clone()
        }
    }
}

/// Reference from one policy to entries of another.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyImport {
    pub policy_id: EntityId,
    /// Labels of `explicit` entries to import in addition to the `implicit` ones.
    #[serde(default)]
    pub entries: Vec<String>,
}

/// The authorization source of truth for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    id: EntityId,
    entries: Vec<PolicyEntry>,
    imports: Vec<PolicyImport>,
}

impl Policy {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            entries: Vec::new(),
            imports: Vec::new(),
        }
    }

    pub fn with_entry(mut self, entry: PolicyEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn with_import(mut self, import: PolicyImport) -> Self {
        self.imports.push(import);
        self
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn entries(&self) -> &[PolicyEntry] {
        &self.entries
    }

    pub fn imports(&self) -> &[PolicyImport] {
        &self.imports
    }

    pub fn entry(&self, label: &str) -> Option<&PolicyEntry> {
        self.entries.iter().find(|e| e.label == label)
    }

    /// Every subject named by any entry.
    pub fn subjects(&self) -> AHashSet<&SubjectId> {
        self.entries.iter().flat_map(|e| e.subjects.iter()).collect()
    }

    /// Resolve imports into a self-contained policy.
    ///
    /// Imported entries are appended with the label
    /// `imported-<policyId>-<label>`. Imports of imported policies are not
    /// followed. An import whose policy `lookup` cannot find contributes
    /// nothing.
    pub fn with_imports<'a, F>(&self, lookup: F) -> Policy
    where
        F: Fn(&EntityId) -> Option<&'a Policy>,
    {
        let mut resolved = Policy {
            id: self.id.clone(),
            entries: self.entries.clone(),
            imports: Vec::new(),
        };

        for import in &self.imports {
            let Some(imported) = lookup(&import.policy_id) else {
                tracing::debug!(
                    policy = %self.id,
                    imported = %import.policy_id,
                    "imported policy not found, skipping"
                );
                continue;
            };

            for entry in &imported.entries {
                let selected = match entry.importable {
                    Importable::Implicit => true,
                    Importable::Explicit => import.entries.iter().any(|l| *l == entry.label),
                    Importable::Never => false,
                };
                if selected {
                    let label = format!("imported-{}-{}", imported.id, entry.label);
                    resolved.entries.push(entry.relabelled(label));
                }
            }
        }

        resolved
    }
}
