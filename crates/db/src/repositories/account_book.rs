//! Account book and family lookups.

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use uuid::Uuid;

use carryover_core::engine::{Directory, EngineError};
use carryover_core::period::{AccountBookConfig, PeriodSchedule};
use carryover_core::scope::{FamilyContext, FamilyMember};
use carryover_shared::types::{AccountBookId, Currency, FamilyId, FamilyMemberId, UserId};

use super::error::StoreError;
use crate::entities::{account_books, families, family_members};

/// Repository for account books and families.
#[derive(Debug, Clone)]
pub struct AccountBookRepository {
    db: DatabaseConnection,
}

impl AccountBookRepository {
    /// Creates a new account book repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Converts a row into the engine's configuration.
pub(crate) fn config_from_model(model: account_books::Model) -> Result<AccountBookConfig, StoreError> {
    let book = model.id;
    let invalid = move |message: String| StoreError::InvalidAccountBook { book, message };

    let refresh_day = u32::try_from(model.refresh_day)
        .map_err(|_| invalid(format!("negative refresh day {}", model.refresh_day)))?;
    let schedule =
        PeriodSchedule::new(model.period_length.into(), refresh_day).map_err(|e| invalid(e.to_string()))?;
    let currency = model.currency.parse::<Currency>().map_err(invalid)?;

    Ok(AccountBookConfig {
        id: AccountBookId(model.id),
        family_id: model.family_id.map(FamilyId),
        schedule,
        currency,
    })
}

impl Directory for AccountBookRepository {
    async fn account_book(&self, id: AccountBookId) -> Result<Option<AccountBookConfig>, EngineError> {
        let row = account_books::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(StoreError::from)?;
        row.map(config_from_model).transpose().map_err(Into::into)
    }

    async fn family(&self, id: FamilyId) -> Result<Option<FamilyContext>, EngineError> {
        let Some(family) = families::Entity::find_by_id(id.0)
            .one(&self.db)
            .await
            .map_err(StoreError::from)?
        else {
            return Ok(None);
        };

        let members = family_members::Entity::find()
            .filter(family_members::Column::FamilyId.eq(family.id))
            .order_by_asc(family_members::Column::Id)
            .all(&self.db)
            .await
            .map_err(StoreError::from)?;

        Ok(Some(FamilyContext {
            family_id: FamilyId(family.id),
            members: members
                .into_iter()
                .map(|m| FamilyMember {
                    id: FamilyMemberId(m.id),
                    user_id: m.user_id.map(UserId),
                })
                .collect(),
        }))
    }

    async fn account_books(&self) -> Result<Vec<AccountBookId>, EngineError> {
        let ids: Vec<Uuid> = account_books::Entity::find()
            .select_only()
            .column(account_books::Column::Id)
            .order_by_asc(account_books::Column::Id)
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(StoreError::from)?;
        Ok(ids.into_iter().map(AccountBookId).collect())
    }
}
