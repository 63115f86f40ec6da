//! Enforcement dispatch: route a signal to the creation-restriction path or
//! to permission resolution.
//!
//! ```text
//! Signal ─┬─ creation, no policy yet ──> CreationRestrictions ──> Permitted | DeniedCreationRestricted
//!         ├─ policy snapshot present ──> resolver              ──> Permitted | DeniedPermission
//!         └─ no policy snapshot      ───────────────────────────> DeniedPermission
//! ```
//!
//! A missing entity and a missing permission produce the same
//! `DeniedPermission` result so that unauthorized callers learn nothing
//! about which entities exist.

use crate::config::RestrictionsHandle;
use crate::permission::PermissionSet;
use crate::policy::Policy;
use crate::resolver::{has_partial_permission, has_permission};
use crate::resource::ResourceKey;
use crate::restriction::{CreationRequest, CreationRestrictions};
use crate::signal::Signal;

/// Outcome of enforcing one signal.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum EnforcementResult {
    /// The signal may proceed.
    Permitted(Signal),
    /// The caller lacks `required` at `target`, or the entity does not exist.
    DeniedPermission {
        target: ResourceKey,
        required: PermissionSet,
    },
    /// Creation is blocked by the configured restrictions.
    DeniedCreationRestricted(CreationRequest),
}

impl EnforcementResult {
    #[must_use]
    pub fn is_permitted(&self) -> bool {
        matches!(self, Self::Permitted(_))
    }

    /// Returns the status as a string ("permitted", "denied_permission",
    /// "denied_creation_restricted").
    #[must_use]
    pub fn status_str(&self) -> &'static str {
        match self {
            Self::Permitted(_) => "permitted",
            Self::DeniedPermission { .. } => "denied_permission",
            Self::DeniedCreationRestricted(_) => "denied_creation_restricted",
        }
    }
}

/// Decide whether `signal` may proceed.
///
/// `policy` is the snapshot of the addressed entity's policy, `None` when the
/// entity does not exist yet. Pure apart from trace logging.
pub fn enforce(
    signal: Signal,
    policy: Option<&Policy>,
    restrictions: &CreationRestrictions,
) -> EnforcementResult {
    let kind = signal.kind();
    let required = kind.required_permissions();

    let Some(policy) = policy else {
        if !kind.is_creation() {
            tracing::debug!(%kind, entity = %signal.entity_id(), "no policy snapshot, denying");
            return denied(&signal, required);
        }

        let request = signal.creation_request();
        if restrictions.is_allowed(&request) {
            // The creator becomes owner; there is no policy to consult yet.
            tracing::debug!(%kind, entity = %signal.entity_id(), "creation permitted");
            return EnforcementResult::Permitted(signal);
        }
        tracing::debug!(
            %kind,
            entity = %signal.entity_id(),
            namespace = %request.namespace,
            "creation restricted"
        );
        return EnforcementResult::DeniedCreationRestricted(request);
    };

    let check = if kind.allows_partial() {
        has_partial_permission
    } else {
        has_permission
    };

    if check(policy, signal.subjects(), signal.resource(), required) {
        tracing::trace!(%kind, target = %signal.resource(), "permitted");
        EnforcementResult::Permitted(signal)
    } else {
        tracing::debug!(%kind, target = %signal.resource(), %required, "permission denied");
        denied(&signal, required)
    }
}

fn denied(signal: &Signal, required: PermissionSet) -> EnforcementResult {
    EnforcementResult::DeniedPermission {
        target: signal.resource().clone(),
        required,
    }
}

/// Enforcement entry point bound to a reloadable restriction configuration.
///
/// Thread-safe: `enforce` takes `&self` and evaluates against the snapshot
/// current at call time. The handle's read lock is held only while cloning
/// the snapshot `Arc`; evaluation itself runs on the clone, lock-free, and
/// never delays a concurrent reload.
#[derive(Debug, Default)]
pub struct Enforcer {
    restrictions: RestrictionsHandle,
}

impl Enforcer {
    pub fn new(restrictions: CreationRestrictions) -> Self {
        Self {
            restrictions: RestrictionsHandle::new(restrictions),
        }
    }

    /// Handle for hot-reloading the creation restrictions.
    pub fn restrictions(&self) -> &RestrictionsHandle {
        &self.restrictions
    }

    pub fn enforce(&self, signal: Signal, policy: Option<&Policy>) -> EnforcementResult {
        let snapshot = self.restrictions.load();
        enforce(signal, policy, &snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_restrictions, parse_signal};
    use crate::entity::EntityId;
    use crate::error::ConfigError;
    use crate::policy::{PolicyEntry, SubjectId};
    use crate::signal::SignalKind;

    fn id(s: &str) -> EntityId {
        EntityId::parse(s).unwrap()
    }

    fn key(s: &str) -> ResourceKey {
        ResourceKey::parse(s).unwrap()
    }

    fn alice() -> Vec<SubjectId> {
        vec![SubjectId::from("user:alice")]
    }

    fn lamp_policy() -> Policy {
        Policy::new(id("org.acme:lamp"))
            .with_entry(
                PolicyEntry::new("owner")
                    .with_subject("user:alice")
                    .with_resource(key("thing:/"), PermissionSet::READ_WRITE, PermissionSet::EMPTY)
                    .with_resource(key("policy:/"), PermissionSet::READ, PermissionSet::EMPTY),
            )
            .with_entry(
                PolicyEntry::new("observer")
                    .with_subject("user:bob")
                    .with_resource(
                        key("thing:/features/switch"),
                        PermissionSet::READ,
                        PermissionSet::EMPTY,
                    ),
            )
    }

    #[test]
    fn permitted_with_sufficient_permission() {
        let signal = Signal::new(SignalKind::ModifyThing, id("org.acme:lamp"), alice()).unwrap();
        let result = enforce(signal.clone(), Some(&lamp_policy()), &CreationRestrictions::default());
        assert_eq!(result, EnforcementResult::Permitted(signal));
    }

    #[test]
    fn denied_reports_target_and_required() {
        let signal = Signal::new(SignalKind::ModifyPolicy, id("org.acme:lamp"), alice()).unwrap();
        let result = enforce(signal, Some(&lamp_policy()), &CreationRestrictions::default());
        assert_eq!(
            result,
            EnforcementResult::DeniedPermission {
                target: key("policy:/"),
                required: PermissionSet::WRITE,
            }
        );
        assert_eq!(result.status_str(), "denied_permission");
    }

    #[test]
    fn missing_entity_looks_like_missing_permission() {
        let signal = Signal::new(SignalKind::RetrieveThing, id("org.acme:ghost"), alice()).unwrap();
        let result = enforce(signal, None, &CreationRestrictions::default());
        assert!(matches!(result, EnforcementResult::DeniedPermission { .. }));
    }

    #[test]
    fn retrieve_thing_allows_partial_readers() {
        let bob = vec![SubjectId::from("user:bob")];
        let retrieve = Signal::new(SignalKind::RetrieveThing, id("org.acme:lamp"), bob.clone()).unwrap();
        assert!(enforce(retrieve, Some(&lamp_policy()), &CreationRestrictions::default()).is_permitted());

        let modify = Signal::new(SignalKind::ModifyThing, id("org.acme:lamp"), bob).unwrap();
        assert!(!enforce(modify, Some(&lamp_policy()), &CreationRestrictions::default()).is_permitted());
    }

    #[test]
    fn feature_signal_checks_feature_path() {
        let bob = vec![SubjectId::from("user:bob")];
        let switch = Signal::for_member(SignalKind::RetrieveFeature, id("org.acme:lamp"), "switch", bob.clone())
            .unwrap();
        assert!(enforce(switch, Some(&lamp_policy()), &CreationRestrictions::default()).is_permitted());

        let dimmer = Signal::for_member(SignalKind::RetrieveFeature, id("org.acme:lamp"), "dimmer", bob)
            .unwrap();
        assert!(!enforce(dimmer, Some(&lamp_policy()), &CreationRestrictions::default()).is_permitted());
    }

    #[test]
    fn creation_without_rules_is_permitted() {
        let signal = Signal::new(SignalKind::CreateThing, id("org.acme:new"), alice()).unwrap();
        assert!(enforce(signal, None, &CreationRestrictions::default()).is_permitted());
    }

    #[test]
    fn creation_restricted_by_namespace() {
        let restrictions = load_restrictions(r#"{"grant":[{"namespaces":["org\\.acme"]}]}"#).unwrap();
        let signal = Signal::new(SignalKind::CreateThing, id("com.other:new"), alice()).unwrap();
        let result = enforce(signal.clone(), None, &restrictions);
        assert_eq!(
            result,
            EnforcementResult::DeniedCreationRestricted(signal.creation_request())
        );
    }

    #[test]
    fn creation_of_existing_entity_goes_through_policy() {
        let bob = vec![SubjectId::from("user:bob")];
        let signal = Signal::new(SignalKind::CreateThing, id("org.acme:lamp"), bob).unwrap();
        let result = enforce(signal, Some(&lamp_policy()), &CreationRestrictions::default());
        assert!(matches!(result, EnforcementResult::DeniedPermission { .. }));
    }

    #[test]
    fn enforcer_observes_reloaded_rules() {
        let enforcer = Enforcer::default();
        let create = || Signal::new(SignalKind::CreatePolicy, id("com.other:p"), alice()).unwrap();
        assert!(enforcer.enforce(create(), None).is_permitted());

        enforcer
            .restrictions()
            .reload_from_json(r#"{"grant":[{"resource_types":["thing"]}]}"#)
            .unwrap();
        assert_eq!(
            enforcer.enforce(create(), None).status_str(),
            "denied_creation_restricted"
        );
    }

    #[test]
    fn whole_thing_signals_ignore_feature_grants() {
        let policy = Policy::new(id("org.acme:lamp")).with_entry(
            PolicyEntry::new("switcher")
                .with_subject("user:bob")
                .with_resource(key("thing:/features/switch"), PermissionSet::WRITE, PermissionSet::EMPTY),
        );
        let bob = vec![SubjectId::from("user:bob")];

        let smuggled = parse_signal(
            r#"{"kind":"delete_thing","entity_id":"org.acme:lamp",
                "path":"/features/switch","subjects":["user:bob"]}"#,
        );
        assert!(matches!(smuggled, Err(ConfigError::Json(_))));

        let delete = Signal::new(SignalKind::DeleteThing, id("org.acme:lamp"), bob.clone()).unwrap();
        assert_eq!(
            enforce(delete, Some(&policy), &CreationRestrictions::default()),
            EnforcementResult::DeniedPermission {
                target: key("thing:/"),
                required: PermissionSet::WRITE,
            }
        );

        let modify = Signal::for_member(SignalKind::ModifyFeature, id("org.acme:lamp"), "switch", bob).unwrap();
        assert!(enforce(modify, Some(&policy), &CreationRestrictions::default()).is_permitted());
    }

    #[test]
    fn feature_signal_cannot_target_attributes() {
        let err = parse_signal(
            r#"{"kind":"modify_feature","entity_id":"org.acme:lamp",
                "path":"/attributes/x","subjects":["user:alice"]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot address thing:/attributes/x"), "{err}");
    }

    #[test]
    fn in_flight_snapshot_does_not_block_reload() {
        let enforcer = Enforcer::default();
        let snapshot = enforcer.restrictions().load();

        enforcer
            .restrictions()
            .reload_from_json(r#"{"grant":[{"namespaces":["org\\.acme"]}]}"#)
            .unwrap();

        let create = Signal::new(SignalKind::CreateThing, id("com.other:x"), alice()).unwrap();
        assert!(enforce(create.clone(), None, &snapshot).is_permitted());
        assert!(!enforcer.enforce(create, None).is_permitted());
    }
}
