//! Canonical ownership resolution.
//!
//! Every place that needs to know who owns a budget or a transaction goes
//! through [`ScopeResolver::resolve`]. The resolver never guesses: when a
//! family context exists and no member matches, the result is
//! [`Resolution::Unresolved`].

use super::types::{FamilyContext, OwnerRef, Resolution, Scope, UnresolvedReason};

/// Maps records to their owning scope.
pub struct ScopeResolver;

impl ScopeResolver {
    /// Resolves the owner of a record.
    ///
    /// 1. A direct family member reference wins.
    /// 2. A user reference inside a family resolves to that user's member record,
    ///    so spend recorded via the user path and via the member path lands in
    ///    the same scope.
    /// 3. A user reference without a family is a plain user scope.
    #[must_use]
    pub fn resolve(owner: &OwnerRef, family: Option<&FamilyContext>) -> Resolution {
        if let Some(member_id) = owner.family_member_id {
            let Some(family) = family else {
                return Resolution::Unresolved(UnresolvedReason::MemberWithoutFamily(member_id));
            };
            return match family.member(member_id) {
                Some(member) => Resolution::Resolved(member.scope()),
                None => Resolution::Unresolved(UnresolvedReason::MemberNotInFamily(member_id)),
            };
        }

        match (owner.user_id, family) {
            (Some(user_id), Some(family)) => match family.member_for_user(user_id) {
                Some(member) => Resolution::Resolved(member.scope()),
                None => Resolution::Unresolved(UnresolvedReason::UserNotInFamily(user_id)),
            },
            (Some(user_id), None) => Resolution::Resolved(Scope::user(user_id)),
            (None, _) => Resolution::Unresolved(UnresolvedReason::NoOwnerReference),
        }
    }
}
