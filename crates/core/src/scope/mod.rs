//! Ownership scopes and their resolution.

pub mod resolver;
pub mod types;

pub use resolver::ScopeResolver;
pub use types::{
    FamilyContext, FamilyMember, OwnerKind, OwnerRef, Resolution, Scope, UnresolvedReason,
};
