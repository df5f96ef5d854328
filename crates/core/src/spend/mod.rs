//! Spend aggregation over expense transactions.
//!
//! Spend is always recomputed on demand. [`SpendFilter`] is the single
//! definition of which transactions count against a scope; the in-memory
//! [`SpendAggregator`] and the SQL repository both evaluate it.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use carryover_shared::types::{AccountBookId, BudgetPeriodId, FamilyMemberId, TransactionId, UserId};

use crate::period::DateRange;
use crate::scope::{FamilyContext, OwnerKind, Scope, UnresolvedReason};

/// Transaction direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Counts against the budget.
    Expense,
    /// Never counts against the budget.
    Income,
}

/// Read-only view of a persisted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction ID.
    pub id: TransactionId,
    /// Account book.
    pub account_book_id: AccountBookId,
    /// User who recorded it.
    pub user_id: Option<UserId>,
    /// Family member it is attributed to.
    pub family_member_id: Option<FamilyMemberId>,
    /// Budget period it was booked against, if any.
    pub budget_id: Option<BudgetPeriodId>,
    /// Direction.
    pub kind: TransactionKind,
    /// Positive amount.
    pub amount: Decimal,
    /// Booking date.
    pub date: NaiveDate,
}

/// Which transactions are attributed to a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpendFilter {
    /// `user_id = u AND family_member_id IS NULL`.
    User {
        /// The user.
        user_id: UserId,
    },
    /// `family_member_id = m`, or, for registered members,
    /// `family_member_id IS NULL AND user_id = linked_user`.
    Member {
        /// The member.
        member_id: FamilyMemberId,
        /// Linked registered user; `None` for custodial members.
        linked_user: Option<UserId>,
    },
}

impl SpendFilter {
    /// Builds the filter for a scope.
    ///
    /// # Errors
    ///
    /// Returns the unresolved reason when a member scope is not part of the
    /// account book's family, or names a kind other than the member's
    /// canonical one.
    pub fn for_scope(
        scope: Scope,
        family: Option<&FamilyContext>,
    ) -> Result<Self, UnresolvedReason> {
        match scope.kind {
            OwnerKind::User => Ok(Self::User {
                user_id: UserId(scope.owner_id),
            }),
            OwnerKind::FamilyMember | OwnerKind::CustodialMember => {
                let member_id = FamilyMemberId(scope.owner_id);
                let family = family.ok_or(UnresolvedReason::MemberWithoutFamily(member_id))?;
                let member = family
                    .member(member_id)
                    .ok_or(UnresolvedReason::MemberNotInFamily(member_id))?;
                let canonical = member.scope();
                if canonical != scope {
                    return Err(UnresolvedReason::KindMismatch {
                        member: member_id,
                        canonical: canonical.kind,
                    });
                }
                Ok(Self::Member {
                    member_id,
                    linked_user: member.user_id,
                })
            }
        }
    }

    /// Returns true if the transaction is attributed to the filtered scope.
    #[must_use]
    pub fn matches(&self, tx: &TransactionRecord) -> bool {
        match *self {
            Self::User { user_id } => tx.family_member_id.is_none() && tx.user_id == Some(user_id),
            Self::Member {
                member_id,
                linked_user,
            } => match tx.family_member_id {
                Some(id) => id == member_id,
                None => linked_user.is_some() && tx.user_id == linked_user,
            },
        }
    }
}

/// In-memory evaluation of the spend aggregate.
pub struct SpendAggregator;

impl SpendAggregator {
    /// Sums EXPENSE transactions for the filter within the book and range.
    #[must_use]
    pub fn sum<'a>(
        transactions: impl IntoIterator<Item = &'a TransactionRecord>,
        filter: &SpendFilter,
        account_book_id: AccountBookId,
        range: DateRange,
    ) -> Decimal {
        transactions
            .into_iter()
            .filter(|tx| tx.kind == TransactionKind::Expense)
            .filter(|tx| tx.account_book_id == account_book_id)
            .filter(|tx| range.contains(tx.date))
            .filter(|tx| filter.matches(tx))
            .map(|tx| tx.amount)
            .sum()
    }
}
