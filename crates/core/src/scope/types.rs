//! Scope data types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use carryover_shared::types::{FamilyId, FamilyMemberId, UserId};

/// Kind of entity that owns a budget chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerKind {
    /// An individual user outside any family context.
    User,
    /// A family member linked to a registered user.
    FamilyMember,
    /// A family member without a login, managed by an admin.
    CustodialMember,
}

impl OwnerKind {
    /// Returns true for the two family member kinds.
    #[must_use]
    pub const fn is_member(self) -> bool {
        matches!(self, Self::FamilyMember | Self::CustodialMember)
    }
}

impl std::fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "USER"),
            Self::FamilyMember => write!(f, "FAMILY_MEMBER"),
            Self::CustodialMember => write!(f, "CUSTODIAL_MEMBER"),
        }
    }
}

/// Canonical owner of a budget period chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Owner kind.
    pub kind: OwnerKind,
    /// User id for `User`, family member id otherwise.
    pub owner_id: Uuid,
}

impl Scope {
    /// Scope of a plain user.
    #[must_use]
    pub const fn user(id: UserId) -> Self {
        Self {
            kind: OwnerKind::User,
            owner_id: id.0,
        }
    }

    /// Scope of a registered family member.
    #[must_use]
    pub const fn family_member(id: FamilyMemberId) -> Self {
        Self {
            kind: OwnerKind::FamilyMember,
            owner_id: id.0,
        }
    }

    /// Scope of a custodial family member.
    #[must_use]
    pub const fn custodial(id: FamilyMemberId) -> Self {
        Self {
            kind: OwnerKind::CustodialMember,
            owner_id: id.0,
        }
    }

    /// Returns the user id of a plain user scope.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self.kind {
            OwnerKind::User => Some(UserId(self.owner_id)),
            OwnerKind::FamilyMember | OwnerKind::CustodialMember => None,
        }
    }

    /// Returns the family member id when the scope is member-owned.
    #[must_use]
    pub const fn member_id(&self) -> Option<FamilyMemberId> {
        match self.kind {
            OwnerKind::User => None,
            OwnerKind::FamilyMember | OwnerKind::CustodialMember => {
                Some(FamilyMemberId(self.owner_id))
            }
        }
    }

    /// Returns true if both scopes name the same owner.
    ///
    /// Member scopes match on the member id alone, so rows written before a
    /// member registered (or lost their login) still belong to them.
    #[must_use]
    pub fn same_owner(&self, other: &Self) -> bool {
        self.owner_id == other.owner_id
            && (self.kind == other.kind || (self.kind.is_member() && other.kind.is_member()))
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.owner_id)
    }
}

/// A family member as seen by scope resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyMember {
    /// Member ID.
    pub id: FamilyMemberId,
    /// Linked registered user, absent for custodial members.
    pub user_id: Option<UserId>,
}

impl FamilyMember {
    /// Returns true if the member has no login of their own.
    #[must_use]
    pub const fn is_custodial(&self) -> bool {
        self.user_id.is_none()
    }

    /// Returns the scope this member owns.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        if self.is_custodial() {
            Scope::custodial(self.id)
        } else {
            Scope::family_member(self.id)
        }
    }

    /// The member scope of the other kind, which this member must not own.
    #[must_use]
    pub const fn superseded_scope(&self) -> Scope {
        if self.is_custodial() {
            Scope::family_member(self.id)
        } else {
            Scope::custodial(self.id)
        }
    }
}

/// Family context of an account book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyContext {
    /// Family ID.
    pub family_id: FamilyId,
    /// All members of the family.
    pub members: Vec<FamilyMember>,
}

impl FamilyContext {
    /// Finds a member by its id.
    #[must_use]
    pub fn member(&self, id: FamilyMemberId) -> Option<&FamilyMember> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Finds the member linked to a registered user.
    #[must_use]
    pub fn member_for_user(&self, user_id: UserId) -> Option<&FamilyMember> {
        self.members.iter().find(|m| m.user_id == Some(user_id))
    }

    /// Member scopes stored under the wrong kind for the current family,
    /// e.g. a chain opened while a member was custodial who has since
    /// registered.
    #[must_use]
    pub fn superseded_scopes(&self) -> Vec<Scope> {
        self.members.iter().map(FamilyMember::superseded_scope).collect()
    }
}

/// Ownership columns carried by a budget or transaction record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    /// User the record was created by or for.
    pub user_id: Option<UserId>,
    /// Family member the record is attributed to.
    pub family_member_id: Option<FamilyMemberId>,
}

impl OwnerRef {
    /// Reference through the user path.
    #[must_use]
    pub const fn user(id: UserId) -> Self {
        Self {
            user_id: Some(id),
            family_member_id: None,
        }
    }

    /// Reference through the member path.
    #[must_use]
    pub const fn member(id: FamilyMemberId) -> Self {
        Self {
            user_id: None,
            family_member_id: Some(id),
        }
    }
}

/// Why a record could not be attributed to a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// The record references neither a user nor a member.
    NoOwnerReference,
    /// The referenced member does not belong to the account book's family.
    MemberNotInFamily(FamilyMemberId),
    /// The referenced user has no member record in the family.
    UserNotInFamily(UserId),
    /// A member id was referenced on an account book without a family.
    MemberWithoutFamily(FamilyMemberId),
    /// A member scope named a kind other than the member's canonical one.
    KindMismatch {
        /// The member.
        member: FamilyMemberId,
        /// Kind the member is owned under.
        canonical: OwnerKind,
    },
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoOwnerReference => write!(f, "record has no owner reference"),
            Self::MemberNotInFamily(id) => write!(f, "member {id} is not part of the family"),
            Self::UserNotInFamily(id) => write!(f, "user {id} has no member record in the family"),
            Self::MemberWithoutFamily(id) => {
                write!(f, "member {id} referenced on an account book without a family")
            }
            Self::KindMismatch { member, canonical } => {
                write!(f, "member {member} is owned as {canonical}")
            }
        }
    }
}

/// Outcome of scope resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Ownership established.
    Resolved(Scope),
    /// No match could be established; callers must skip and flag.
    Unresolved(UnresolvedReason),
}

impl Resolution {
    /// Returns the resolved scope, if any.
    #[must_use]
    pub const fn scope(&self) -> Option<Scope> {
        match self {
            Self::Resolved(scope) => Some(*scope),
            Self::Unresolved(_) => None,
        }
    }
}
