//! Postgres enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "owner_kind")]
pub enum OwnerKind {
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "family_member")]
    FamilyMember,
    #[sea_orm(string_value = "custodial_member")]
    CustodialMember,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "transaction_type")]
pub enum TransactionType {
    #[sea_orm(string_value = "expense")]
    Expense,
    #[sea_orm(string_value = "income")]
    Income,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "period_length")]
pub enum PeriodLength {
    #[sea_orm(string_value = "monthly")]
    Monthly,
    #[sea_orm(string_value = "yearly")]
    Yearly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "rollover_kind")]
pub enum RolloverKind {
    #[sea_orm(string_value = "surplus")]
    Surplus,
    #[sea_orm(string_value = "deficit")]
    Deficit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "correction_kind")]
pub enum CorrectionKind {
    #[sea_orm(string_value = "rollover_drift")]
    RolloverDrift,
    #[sea_orm(string_value = "gap_filled")]
    GapFilled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "repair_phase")]
pub enum RepairPhase {
    #[sea_orm(string_value = "budget_attribution")]
    BudgetAttribution,
    #[sea_orm(string_value = "transaction_attribution")]
    TransactionAttribution,
    #[sea_orm(string_value = "chains")]
    Chains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "record_kind")]
pub enum RecordKind {
    #[sea_orm(string_value = "budget")]
    Budget,
    #[sea_orm(string_value = "transaction")]
    Transaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "fix_method")]
pub enum FixMethod {
    #[sea_orm(string_value = "via_member")]
    ViaMember,
    #[sea_orm(string_value = "via_budget")]
    ViaBudget,
    #[sea_orm(string_value = "via_user")]
    ViaUser,
    #[sea_orm(string_value = "skipped")]
    Skipped,
}
