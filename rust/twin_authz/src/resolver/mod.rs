//! Effective-permission resolution over a policy snapshot.
//!
//! Resolution is longest-prefix-wins: among the resource keys that are
//! ancestors of (or equal to) the target and belong to an entry naming one of
//! the caller's subjects, only the deepest ones count. Grants and revokes at
//! that depth are unioned across entries, then revokes are subtracted from
//! grants. Without any applicable key the decision is deny.
//!
//! Every function here is pure: no I/O, no locks, no allocation on the
//! `has_permission` path. Entry order never influences the outcome.

use ahash::AHashSet;

use crate::permission::PermissionSet;
use crate::policy::{Policy, SubjectId};
use crate::resource::ResourceKey;

/// The deepest applicable level found for a target.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Resolution {
    /// Depth of the deciding resource keys.
    pub depth: usize,
    /// Union of grants at `depth`.
    pub grant: PermissionSet,
    /// Union of revokes at `depth`.
    pub revoke: PermissionSet,
}

impl Resolution {
    /// Grants minus revokes; revoke wins where both name a permission.
    pub fn effective(&self) -> PermissionSet {
        self.grant.difference(self.revoke)
    }

    fn merge(self, other: Resolution) -> Resolution {
        Resolution {
            depth: self.depth,
            grant: self.grant.union(other.grant),
            revoke: self.revoke.union(other.revoke),
        }
    }
}

/// Find the deciding level for `target`, or `None` when no entry naming one
/// of `subjects` has a key on the path from the root to `target`.
pub fn resolve(policy: &Policy, subjects: &[SubjectId], target: &ResourceKey) -> Option<Resolution> {
    let mut best: Option<Resolution> = None;

    for entry in policy.entries() {
        // Non-matching entries are excluded before depth comparison.
        if !entry.matches_any_subject(subjects) {
            continue;
        }
        for (key, permissions) in entry.resources().iter() {
            if !key.is_ancestor_of(target) {
                continue;
            }
            let candidate = Resolution {
                depth: key.depth(),
                grant: permissions.grant,
                revoke: permissions.revoke,
            };
            best = Some(match best {
                Some(current) if current.depth > candidate.depth => current,
                Some(current) if current.depth == candidate.depth => current.merge(candidate),
                _ => candidate,
            });
        }
    }

    best
}

/// Effective permissions of `subjects` at `target`; empty on default deny.
pub fn effective_permissions(
    policy: &Policy,
    subjects: &[SubjectId],
    target: &ResourceKey,
) -> PermissionSet {
    resolve(policy, subjects, target)
        .map(|r| r.effective())
        .unwrap_or(PermissionSet::EMPTY)
}

/// `true` iff `required` is contained in the effective permissions of
/// `subjects` at `target`. Default deny: without an applicable key the
/// answer is `false`, even for an empty `required` set.
pub fn has_permission(
    policy: &Policy,
    subjects: &[SubjectId],
    target: &ResourceKey,
    required: PermissionSet,
) -> bool {
    match resolve(policy, subjects, target) {
        Some(resolution) => required.is_subset_of(resolution.effective()),
        None => false,
    }
}

/// `true` iff `required` holds at `target` or at some key strictly below
/// `target` that an entry naming one of `subjects` mentions.
///
/// Used to decide whether a caller may see part of an entity.
pub fn has_partial_permission(
    policy: &Policy,
    subjects: &[SubjectId],
    target: &ResourceKey,
    required: PermissionSet,
) -> bool {
    if has_permission(policy, subjects, target, required) {
        return true;
    }

    policy
        .entries()
        .iter()
        .filter(|entry| entry.matches_any_subject(subjects))
        .flat_map(|entry| entry.resources().keys())
        .filter(|key| target.is_strict_ancestor_of(key))
        .any(|key| has_permission(policy, subjects, key, required))
}

/// Every subject named in `policy` that on its own holds `required` at
/// `target`.
pub fn subjects_with_permission(
    policy: &Policy,
    target: &ResourceKey,
    required: PermissionSet,
) -> AHashSet<SubjectId> {
    policy
        .subjects()
        .into_iter()
        .filter(|subject| has_permission(policy, std::slice::from_ref(*subject), target, required))
        .cloned()
        .collect()
}
