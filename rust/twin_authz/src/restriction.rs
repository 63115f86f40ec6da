//! Creation restrictions: pattern-based allow-lists that gate entity creation.
//!
//! Restrictions are layered on top of permission checks. An empty rule list
//! means "no restriction". A non-empty list allows a creation only when at
//! least one rule matches the request in all four dimensions.

use ahash::AHashSet;

use crate::config::{RestrictionConfig, RuleConfig};
use crate::error::ConfigError;
use crate::pattern::PatternList;
use crate::policy::SubjectId;
use crate::resource::THING;

/// A proposed creation of a new entity.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CreationRequest {
    pub resource_type: String,
    pub namespace: String,
    pub auth_subjects: Vec<SubjectId>,
    /// Definition the new entity declares, if any. Only things carry one.
    pub definition: Option<String>,
}

/// Definition patterns plus the "no definition" sentinel.
#[derive(Debug, Clone)]
struct DefinitionPatterns {
    patterns: PatternList,
    permits_absent: bool,
}

impl DefinitionPatterns {
    fn is_unrestricted(&self) -> bool {
        self.patterns.is_empty() && !self.permits_absent
    }

    /// The sentinel and a matching pattern are alternatives; either suffices.
    fn accepts(&self, definition: Option<&str>) -> bool {
        if self.is_unrestricted() {
            return true;
        }
        match definition {
            None => self.permits_absent,
            Some(definition) => self.patterns.matches(definition),
        }
    }
}

/// One compiled creation-restriction entry.
///
/// Empty dimensions match anything. Patterns must match the whole candidate.
#[derive(Debug, Clone)]
pub struct RestrictionRule {
    resource_types: AHashSet<String>,
    namespaces: PatternList,
    auth_subjects: PatternList,
    definitions: DefinitionPatterns,
}

impl RestrictionRule {
    /// Compile a rule. Malformed patterns fail here, never during evaluation.
    pub fn from_config(config: &RuleConfig) -> Result<Self, ConfigError> {
        let syntax = config.syntax;
        let (absent, present): (Vec<_>, Vec<_>) =
            config.thing_definitions.iter().partition(|d| d.is_none());
        let definition_patterns: Vec<&str> = present.into_iter().flatten().map(String::as_str).collect();

        Ok(Self {
            resource_types: config.resource_types.iter().cloned().collect(),
            namespaces: PatternList::compile("namespaces", &config.namespaces, syntax)?,
            auth_subjects: PatternList::compile("auth_subjects", &config.auth_subjects, syntax)?,
            definitions: DefinitionPatterns {
                patterns: PatternList::compile("thing_definitions", &definition_patterns, syntax)?,
                permits_absent: !absent.is_empty(),
            },
        })
    }

    /// `true` iff every dimension of the rule accepts `request`.
    pub fn matches(&self, request: &CreationRequest) -> bool {
        self.matches_resource_type(&request.resource_type)
            && self.matches_namespace(&request.namespace)
            && self.matches_auth_subjects(&request.auth_subjects)
            && self.matches_definition(&request.resource_type, request.definition.as_deref())
    }

    fn matches_resource_type(&self, resource_type: &str) -> bool {
        self.resource_types.is_empty() || self.resource_types.contains(resource_type)
    }

    fn matches_namespace(&self, namespace: &str) -> bool {
        self.namespaces.is_empty() || self.namespaces.matches(namespace)
    }

    fn matches_auth_subjects(&self, subjects: &[SubjectId]) -> bool {
        self.auth_subjects.is_empty()
            || subjects
                .iter()
                .any(|subject| self.auth_subjects.matches(subject.as_str()))
    }

    /// Restriction by definition is a no-op outside of things.
    fn matches_definition(&self, resource_type: &str, definition: Option<&str>) -> bool {
        resource_type != THING || self.definitions.accepts(definition)
    }
}

/// `true` iff `rules` is empty or at least one rule matches `request`.
pub fn is_creation_allowed(rules: &[RestrictionRule], request: &CreationRequest) -> bool {
    rules.is_empty() || rules.iter().any(|rule| rule.matches(request))
}

/// The complete creation configuration: an allow-list and a block-list.
///
/// A creation is allowed iff the grant list allows it and no revoke rule
/// matches. The default (both lists empty) allows everything.
#[derive(Debug, Clone, Default)]
pub struct CreationRestrictions {
    grant: Vec<RestrictionRule>,
    revoke: Vec<RestrictionRule>,
}

impl CreationRestrictions {
    pub fn new(grant: Vec<RestrictionRule>, revoke: Vec<RestrictionRule>) -> Self {
        Self { grant, revoke }
    }

    /// Compile every rule; the first malformed rule fails the whole load.
    pub fn from_config(config: &RestrictionConfig) -> Result<Self, ConfigError> {
        let compile = |rules: &[RuleConfig]| -> Result<Vec<RestrictionRule>, ConfigError> {
            rules.iter().map(RestrictionRule::from_config).collect()
        };
        Ok(Self {
            grant: compile(&config.grant)?,
            revoke: compile(&config.revoke)?,
        })
    }

    pub fn grant(&self) -> &[RestrictionRule] {
        &self.grant
    }

    pub fn revoke(&self) -> &[RestrictionRule] {
        &self.revoke
    }

    pub fn is_allowed(&self, request: &CreationRequest) -> bool {
        let granted = is_creation_allowed(&self.grant, request);
        let revoked = granted && self.revoke.iter().any(|rule| rule.matches(request));
        tracing::trace!(
            resource_type = %request.resource_type,
            namespace = %request.namespace,
            granted,
            revoked,
            "creation restriction evaluated"
        );
        granted && !revoked
    }
}
