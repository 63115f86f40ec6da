//! Decoded inbound signals and the closed catalogue of signal kinds.
//!
//! Each [`SignalKind`] carries its entity type and required permissions
//! statically; there is no runtime registry.

use std::fmt;

use serde::Deserialize;

use crate::entity::EntityId;
use crate::error::InvariantViolation;
use crate::permission::PermissionSet;
use crate::policy::SubjectId;
use crate::resource::{ResourceKey, POLICY, THING};
use crate::restriction::CreationRequest;

/// Path segment under which a thing's features live.
pub const FEATURES: &str = "features";
/// Path segment under which a policy's entries live.
pub const ENTRIES: &str = "entries";

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    CreateThing,
    RetrieveThing,
    ModifyThing,
    DeleteThing,
    RetrieveFeature,
    ModifyFeature,
    DeleteFeature,
    CreatePolicy,
    RetrievePolicy,
    ModifyPolicy,
    DeletePolicy,
    RetrievePolicyEntry,
    ModifyPolicyEntry,
}

impl SignalKind {
    /// Resource type of the addressed entity.
    pub const fn resource_type(self) -> &'static str {
        match self {
            SignalKind::CreateThing
            | SignalKind::RetrieveThing
            | SignalKind::ModifyThing
            | SignalKind::DeleteThing
            | SignalKind::RetrieveFeature
            | SignalKind::ModifyFeature
            | SignalKind::DeleteFeature => THING,
            SignalKind::CreatePolicy
            | SignalKind::RetrievePolicy
            | SignalKind::ModifyPolicy
            | SignalKind::DeletePolicy
            | SignalKind::RetrievePolicyEntry
            | SignalKind::ModifyPolicyEntry => POLICY,
        }
    }

    pub const fn required_permissions(self) -> PermissionSet {
        match self {
            SignalKind::RetrieveThing
            | SignalKind::RetrieveFeature
            | SignalKind::RetrievePolicy
            | SignalKind::RetrievePolicyEntry => PermissionSet::READ,
            SignalKind::CreateThing
            | SignalKind::ModifyThing
            | SignalKind::DeleteThing
            | SignalKind::ModifyFeature
            | SignalKind::DeleteFeature
            | SignalKind::CreatePolicy
            | SignalKind::ModifyPolicy
            | SignalKind::DeletePolicy
            | SignalKind::ModifyPolicyEntry => PermissionSet::WRITE,
        }
    }

    pub const fn is_creation(self) -> bool {
        matches!(self, SignalKind::CreateThing | SignalKind::CreatePolicy)
    }

    /// Retrievals of things succeed when any part of the addressed subtree is
    /// readable; the caller filters the response.
    pub const fn allows_partial(self) -> bool {
        matches!(self, SignalKind::RetrieveThing | SignalKind::RetrieveFeature)
    }

    /// Whether a signal of this kind may address `target`.
    ///
    /// Whole-entity kinds other than retrieve and modify address the entity
    /// root, feature kinds address `/features/<id>[/...]`, and policy-entry
    /// kinds address exactly `/entries/<label>`.
    pub fn addresses(self, target: &ResourceKey) -> bool {
        if target.resource_type() != self.resource_type() {
            return false;
        }
        let segments = target.segments();
        match self {
            SignalKind::RetrieveThing | SignalKind::ModifyThing => true,
            SignalKind::CreateThing
            | SignalKind::DeleteThing
            | SignalKind::CreatePolicy
            | SignalKind::RetrievePolicy
            | SignalKind::ModifyPolicy
            | SignalKind::DeletePolicy => target.is_root(),
            SignalKind::RetrieveFeature | SignalKind::ModifyFeature | SignalKind::DeleteFeature => {
                segments.len() >= 2 && segments[0] == FEATURES
            }
            SignalKind::RetrievePolicyEntry | SignalKind::ModifyPolicyEntry => {
                segments.len() == 2 && segments[0] == ENTRIES
            }
        }
    }

    const fn container(self) -> Option<&'static str> {
        match self {
            SignalKind::RetrieveFeature | SignalKind::ModifyFeature | SignalKind::DeleteFeature => {
                Some(FEATURES)
            }
            SignalKind::RetrievePolicyEntry | SignalKind::ModifyPolicyEntry => Some(ENTRIES),
            _ => None,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A decoded command, as handed over by the protocol layer.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(try_from = "SignalDocument")]
pub struct Signal {
    kind: SignalKind,
    entity_id: EntityId,
    resource: ResourceKey,
    subjects: Vec<SubjectId>,
    definition: Option<String>,
}

impl Signal {
    /// A signal addressing the root of the entity. Fails for feature and
    /// policy-entry kinds, which need [`Signal::for_member`].
    pub fn new(
        kind: SignalKind,
        entity_id: EntityId,
        subjects: Vec<SubjectId>,
    ) -> Result<Self, InvariantViolation> {
        Self::addressing(kind, entity_id, ResourceKey::root_of(kind.resource_type()), subjects)
    }

    /// A feature or policy-entry signal addressing `<container>/<id>`.
    pub fn for_member(
        kind: SignalKind,
        entity_id: EntityId,
        member: &str,
        subjects: Vec<SubjectId>,
    ) -> Result<Self, InvariantViolation> {
        let root = ResourceKey::root_of(kind.resource_type());
        let resource = match kind.container() {
            Some(container) => root.child(container)?.child(member)?,
            None => root.child(member)?,
        };
        Self::addressing(kind, entity_id, resource, subjects)
    }

    /// Address `path` below the entity root instead of the root itself.
    pub fn with_path(self, path: &str) -> Result<Self, InvariantViolation> {
        let resource = ResourceKey::from_path(self.kind.resource_type(), path)?;
        let definition = self.definition;
        let signal = Self::addressing(self.kind, self.entity_id, resource, self.subjects)?;
        Ok(Self { definition, ..signal })
    }

    fn addressing(
        kind: SignalKind,
        entity_id: EntityId,
        resource: ResourceKey,
        subjects: Vec<SubjectId>,
    ) -> Result<Self, InvariantViolation> {
        if !kind.addresses(&resource) {
            return Err(InvariantViolation::UnaddressableTarget {
                kind: kind.to_string(),
                target: resource.to_string(),
            });
        }
        Ok(Self {
            kind,
            entity_id,
            resource,
            subjects,
            definition: None,
        })
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn resource(&self) -> &ResourceKey {
        &self.resource
    }

    pub fn subjects(&self) -> &[SubjectId] {
        &self.subjects
    }

    pub fn definition(&self) -> Option<&str> {
        self.definition.as_deref()
    }

    /// The creation request this signal would make. The namespace is taken
    /// from the entity id.
    pub fn creation_request(&self) -> CreationRequest {
        CreationRequest {
            resource_type: self.kind.resource_type().to_string(),
            namespace: self.entity_id.namespace().to_string(),
            auth_subjects: self.subjects.clone(),
            definition: self.definition.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SignalDocument {
    kind: SignalKind,
    entity_id: EntityId,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    subjects: Vec<SubjectId>,
    #[serde(default)]
    definition: Option<String>,
}

impl TryFrom<SignalDocument> for Signal {
    type Error = InvariantViolation;

    fn try_from(doc: SignalDocument) -> Result<Self, Self::Error> {
        let resource = match doc.path {
            Some(path) => ResourceKey::from_path(doc.kind.resource_type(), &path)?,
            None => ResourceKey::root_of(doc.kind.resource_type()),
        };
        let mut signal = Signal::addressing(doc.kind, doc.entity_id, resource, doc.subjects)?;
        signal.definition = doc.definition;
        Ok(signal)
    }
}
