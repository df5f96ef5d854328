//! Attribution audit migration.
//!
//! Records every attribution a repair run writes, with the values it
//! replaced, and keeps the owner kind of the last reconciled scope on the
//! repair cursor.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(ENUMS_SQL).await?;
        db.execute_unprepared(ATTRIBUTION_CHANGES_SQL).await?;
        db.execute_unprepared(REPAIR_CURSORS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const ENUMS_SQL: &str = r"
CREATE TYPE record_kind AS ENUM ('budget', 'transaction');
CREATE TYPE fix_method AS ENUM ('via_member', 'via_budget', 'via_user', 'skipped');
";

const ATTRIBUTION_CHANGES_SQL: &str = r"
-- record_id points at budget_periods or transactions depending on record_kind
-- owner columns are NULL for transactions
CREATE TABLE attribution_changes (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    run_id UUID NOT NULL,
    account_book_id UUID NOT NULL REFERENCES account_books(id) ON DELETE CASCADE,
    record_kind record_kind NOT NULL,
    record_id UUID NOT NULL,
    method fix_method NOT NULL,
    old_family_id UUID,
    old_family_member_id UUID,
    old_owner_kind owner_kind,
    old_owner_id UUID,
    new_family_id UUID,
    new_family_member_id UUID,
    new_owner_kind owner_kind,
    new_owner_id UUID,
    rolled_back_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_attribution_changes_record UNIQUE (run_id, record_id)
);

CREATE INDEX idx_attribution_changes_book ON attribution_changes(account_book_id, created_at DESC);
";

const REPAIR_CURSORS_SQL: &str = r"
ALTER TABLE repair_cursors ADD COLUMN last_owner_kind owner_kind;
";

const DROP_SQL: &str = r"
ALTER TABLE repair_cursors DROP COLUMN IF EXISTS last_owner_kind;
DROP TABLE IF EXISTS attribution_changes CASCADE;
DROP TYPE IF EXISTS fix_method;
DROP TYPE IF EXISTS record_kind;
";
