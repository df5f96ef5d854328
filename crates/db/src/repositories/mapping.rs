//! Conversions between entity rows and domain values.

use chrono::Utc;
use sea_orm::Set;
use uuid::Uuid;

use carryover_core::period::{BudgetPeriod, DateRange, PeriodLength};
use carryover_core::repair::{
    Attribution, AttributionChange, BudgetAttributionRecord, FixMethod, RecordKind, RepairPhase,
};
use carryover_core::rollover::{CorrectionKind, RolloverKind, RolloverRecord};
use carryover_core::scope::{OwnerKind, Scope};
use carryover_shared::types::{AccountBookId, BudgetPeriodId, FamilyId, FamilyMemberId, UserId};

use crate::entities::{
    attribution_changes, budget_periods, budget_rollover_history, sea_orm_active_enums as db,
};

impl From<OwnerKind> for db::OwnerKind {
    fn from(kind: OwnerKind) -> Self {
        match kind {
            OwnerKind::User => Self::User,
            OwnerKind::FamilyMember => Self::FamilyMember,
            OwnerKind::CustodialMember => Self::CustodialMember,
        }
    }
}

impl From<db::OwnerKind> for OwnerKind {
    fn from(kind: db::OwnerKind) -> Self {
        match kind {
            db::OwnerKind::User => Self::User,
            db::OwnerKind::FamilyMember => Self::FamilyMember,
            db::OwnerKind::CustodialMember => Self::CustodialMember,
        }
    }
}

impl From<db::PeriodLength> for PeriodLength {
    fn from(length: db::PeriodLength) -> Self {
        match length {
            db::PeriodLength::Monthly => Self::Monthly,
            db::PeriodLength::Yearly => Self::Yearly,
        }
    }
}

impl From<RolloverKind> for db::RolloverKind {
    fn from(kind: RolloverKind) -> Self {
        match kind {
            RolloverKind::Surplus => Self::Surplus,
            RolloverKind::Deficit => Self::Deficit,
        }
    }
}

impl From<db::RolloverKind> for RolloverKind {
    fn from(kind: db::RolloverKind) -> Self {
        match kind {
            db::RolloverKind::Surplus => Self::Surplus,
            db::RolloverKind::Deficit => Self::Deficit,
        }
    }
}

impl From<CorrectionKind> for db::CorrectionKind {
    fn from(kind: CorrectionKind) -> Self {
        match kind {
            CorrectionKind::RolloverDrift => Self::RolloverDrift,
            CorrectionKind::GapFilled => Self::GapFilled,
        }
    }
}

impl From<RepairPhase> for db::RepairPhase {
    fn from(phase: RepairPhase) -> Self {
        match phase {
            RepairPhase::BudgetAttribution => Self::BudgetAttribution,
            RepairPhase::TransactionAttribution => Self::TransactionAttribution,
            RepairPhase::Chains => Self::Chains,
        }
    }
}

impl From<db::RepairPhase> for RepairPhase {
    fn from(phase: db::RepairPhase) -> Self {
        match phase {
            db::RepairPhase::BudgetAttribution => Self::BudgetAttribution,
            db::RepairPhase::TransactionAttribution => Self::TransactionAttribution,
            db::RepairPhase::Chains => Self::Chains,
        }
    }
}

impl From<RecordKind> for db::RecordKind {
    fn from(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Budget => Self::Budget,
            RecordKind::Transaction => Self::Transaction,
        }
    }
}

impl From<db::RecordKind> for RecordKind {
    fn from(kind: db::RecordKind) -> Self {
        match kind {
            db::RecordKind::Budget => Self::Budget,
            db::RecordKind::Transaction => Self::Transaction,
        }
    }
}

impl From<FixMethod> for db::FixMethod {
    fn from(method: FixMethod) -> Self {
        match method {
            FixMethod::ViaMember => Self::ViaMember,
            FixMethod::ViaBudget => Self::ViaBudget,
            FixMethod::ViaUser => Self::ViaUser,
            FixMethod::Skipped => Self::Skipped,
        }
    }
}

impl From<db::FixMethod> for FixMethod {
    fn from(method: db::FixMethod) -> Self {
        match method {
            db::FixMethod::ViaMember => Self::ViaMember,
            db::FixMethod::ViaBudget => Self::ViaBudget,
            db::FixMethod::ViaUser => Self::ViaUser,
            db::FixMethod::Skipped => Self::Skipped,
        }
    }
}

/// Owner kinds a scope may be stored under: both member kinds for a member.
pub(crate) fn stored_kinds(scope: Scope) -> Vec<db::OwnerKind> {
    if scope.kind.is_member() {
        vec![db::OwnerKind::FamilyMember, db::OwnerKind::CustodialMember]
    } else {
        vec![scope.kind.into()]
    }
}

pub(crate) fn scope_of(model: &budget_periods::Model) -> Scope {
    Scope {
        kind: model.owner_kind.into(),
        owner_id: model.owner_id,
    }
}

pub(crate) fn period_from_model(model: budget_periods::Model) -> BudgetPeriod {
    BudgetPeriod {
        id: BudgetPeriodId(model.id),
        scope: scope_of(&model),
        account_book_id: AccountBookId(model.account_book_id),
        start_date: model.start_date,
        end_date: model.end_date,
        base_amount: model.base_amount,
        rollover_enabled: model.rollover_enabled,
        rollover_amount: model.rollover_amount,
    }
}

pub(crate) fn attribution_from_model(model: &budget_periods::Model) -> BudgetAttributionRecord {
    BudgetAttributionRecord {
        id: BudgetPeriodId(model.id),
        account_book_id: AccountBookId(model.account_book_id),
        scope: scope_of(model),
        user_id: model.user_id.map(UserId),
        family_id: model.family_id.map(FamilyId),
        family_member_id: model.family_member_id.map(FamilyMemberId),
    }
}

pub(crate) fn history_from_model(model: budget_rollover_history::Model) -> RolloverRecord {
    RolloverRecord {
        period_id: BudgetPeriodId(model.budget_period_id),
        scope: Scope {
            kind: model.owner_kind.into(),
            owner_id: model.owner_id,
        },
        account_book_id: AccountBookId(model.account_book_id),
        range: DateRange {
            start: model.period_start,
            end: model.period_end,
        },
        base_amount: model.base_amount,
        previous_rollover: model.previous_rollover,
        spent: model.spent,
        carried: model.carried,
        kind: model.kind.into(),
    }
}

fn stored_scope(kind: Option<db::OwnerKind>, owner_id: Option<Uuid>) -> Option<Scope> {
    Some(Scope {
        kind: kind?.into(),
        owner_id: owner_id?,
    })
}

pub(crate) fn change_from_model(model: attribution_changes::Model) -> AttributionChange {
    AttributionChange {
        run_id: model.run_id,
        account_book_id: AccountBookId(model.account_book_id),
        kind: model.record_kind.into(),
        record_id: model.record_id,
        method: model.method.into(),
        before: Attribution {
            family_id: model.old_family_id.map(FamilyId),
            family_member_id: model.old_family_member_id.map(FamilyMemberId),
            scope: stored_scope(model.old_owner_kind, model.old_owner_id),
        },
        after: Attribution {
            family_id: model.new_family_id.map(FamilyId),
            family_member_id: model.new_family_member_id.map(FamilyMemberId),
            scope: stored_scope(model.new_owner_kind, model.new_owner_id),
        },
        rolled_back: model.rolled_back_at.is_some(),
    }
}

pub(crate) fn change_to_active(change: &AttributionChange) -> attribution_changes::ActiveModel {
    attribution_changes::ActiveModel {
        id: Set(Uuid::now_v7()),
        run_id: Set(change.run_id),
        account_book_id: Set(change.account_book_id.0),
        record_kind: Set(change.kind.into()),
        record_id: Set(change.record_id),
        method: Set(change.method.into()),
        old_family_id: Set(change.before.family_id.map(|id| id.0)),
        old_family_member_id: Set(change.before.family_member_id.map(|id| id.0)),
        old_owner_kind: Set(change.before.scope.map(|s| s.kind.into())),
        old_owner_id: Set(change.before.scope.map(|s| s.owner_id)),
        new_family_id: Set(change.after.family_id.map(|id| id.0)),
        new_family_member_id: Set(change.after.family_member_id.map(|id| id.0)),
        new_owner_kind: Set(change.after.scope.map(|s| s.kind.into())),
        new_owner_id: Set(change.after.scope.map(|s| s.owner_id)),
        rolled_back_at: Set(None),
        created_at: Set(Utc::now().into()),
    }
}
