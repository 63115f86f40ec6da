//! Command implementations, kept apart from argument parsing so they can be
//! exercised directly in tests.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use twin_authz::config::{load_restrictions, parse_policy, parse_signal};
use twin_authz::resolver::{resolve, subjects_with_permission};
use twin_authz::{
    enforce, CreationRequest, CreationRestrictions, Policy, PermissionSet, ResourceKey, Signal,
    SubjectId,
};

/// Result of one evaluation, ready to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub allowed: bool,
    pub detail: String,
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

pub fn load_policy(path: &Path) -> Result<Policy> {
    parse_policy(&read(path)?).with_context(|| format!("invalid policy in {}", path.display()))
}

/// Load restrictions; no path means no restriction.
pub fn load_rules(path: Option<&Path>) -> Result<CreationRestrictions> {
    match path {
        Some(path) => load_restrictions(&read(path)?)
            .with_context(|| format!("invalid restriction rules in {}", path.display())),
        None => Ok(CreationRestrictions::default()),
    }
}

/// Load a policy and resolve its imports against `imports`.
fn load_policy_with_imports(path: &Path, imports: &[PathBuf]) -> Result<Policy> {
    let policy = load_policy(path)?;
    if imports.is_empty() {
        return Ok(policy);
    }
    let imported = imports
        .iter()
        .map(|p| load_policy(p))
        .collect::<Result<Vec<_>>>()?;
    Ok(policy.with_imports(|id| imported.iter().find(|p| p.id() == id)))
}

fn subject_ids(subjects: &[String]) -> Vec<SubjectId> {
    subjects.iter().map(|s| SubjectId::from(s.as_str())).collect()
}

pub fn validate_rules(path: &Path) -> Result<Outcome> {
    let rules = load_rules(Some(path))?;
    Ok(Outcome {
        allowed: true,
        detail: format!(
            "ok: {} grant rule(s), {} revoke rule(s)",
            rules.grant().len(),
            rules.revoke().len()
        ),
    })
}

pub fn check(
    policy: &Path,
    imports: &[PathBuf],
    resource: &str,
    subjects: &[String],
    permissions: &[String],
    partial: bool,
) -> Result<Outcome> {
    let policy = load_policy_with_imports(policy, imports)?;
    let target = ResourceKey::parse(resource)?;
    let required = PermissionSet::parse(permissions)?;
    let subjects = subject_ids(subjects);

    let resolution = resolve(&policy, &subjects, &target);
    let allowed = if partial {
        twin_authz::has_partial_permission(&policy, &subjects, &target, required)
    } else {
        twin_authz::has_permission(&policy, &subjects, &target, required)
    };
    tracing::debug!(?resolution, allowed, "check evaluated");

    let detail = match resolution {
        Some(r) => format!(
            "{} {} at {}: effective {} (decided at depth {})",
            if allowed { "allowed" } else { "denied" },
            required,
            target,
            r.effective(),
            r.depth
        ),
        None => format!(
            "{} {} at {}: no applicable entry",
            if allowed { "allowed" } else { "denied" },
            required,
            target
        ),
    };
    Ok(Outcome { allowed, detail })
}

pub fn subjects(policy: &Path, imports: &[PathBuf], resource: &str, permissions: &[String]) -> Result<Outcome> {
    let policy = load_policy_with_imports(policy, imports)?;
    let target = ResourceKey::parse(resource)?;
    let required = PermissionSet::parse(permissions)?;

    let mut names: Vec<String> = subjects_with_permission(&policy, &target, required)
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    names.sort();

    Ok(Outcome {
        allowed: !names.is_empty(),
        detail: names.join("\n"),
    })
}

pub fn can_create(
    rules: Option<&Path>,
    resource_type: &str,
    namespace: &str,
    subjects: &[String],
    definition: Option<&str>,
) -> Result<Outcome> {
    let rules = load_rules(rules)?;
    let request = CreationRequest {
        resource_type: resource_type.to_string(),
        namespace: namespace.to_string(),
        auth_subjects: subject_ids(subjects),
        definition: definition.map(str::to_string),
    };
    let allowed = rules.is_allowed(&request);
    Ok(Outcome {
        allowed,
        detail: format!(
            "creation of {} in namespace {:?} {}",
            resource_type,
            namespace,
            if allowed { "allowed" } else { "restricted" }
        ),
    })
}

pub fn enforce_signal(
    signal: &Path,
    policy: Option<&Path>,
    imports: &[PathBuf],
    rules: Option<&Path>,
) -> Result<Outcome> {
    let signal = load_signal(signal)?;
    let policy = policy
        .map(|p| load_policy_with_imports(p, imports))
        .transpose()?;
    let rules = load_rules(rules)?;

    let kind = signal.kind();
    let result = enforce(signal, policy.as_ref(), &rules);
    Ok(Outcome {
        allowed: result.is_permitted(),
        detail: format!("{kind}: {}", result.status_str()),
    })
}

fn load_signal(path: &Path) -> Result<Signal> {
    parse_signal(&read(path)?)
        .with_context(|| format!("invalid signal in {}", path.display()))
}
