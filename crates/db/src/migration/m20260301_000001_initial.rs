//! Initial database migration.
//!
//! Creates the family, account book, budget period and transaction tables,
//! the rollover history and audit tables, and the repair cursor table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;
        db.execute_unprepared(FUNCTIONS_SQL).await?;

        // ============================================================
        // PART 2: OWNERSHIP
        // ============================================================
        db.execute_unprepared(FAMILIES_SQL).await?;
        db.execute_unprepared(ACCOUNT_BOOKS_SQL).await?;

        // ============================================================
        // PART 3: BUDGETS & SPEND
        // ============================================================
        db.execute_unprepared(BUDGET_PERIODS_SQL).await?;
        db.execute_unprepared(TRANSACTIONS_SQL).await?;
        db.execute_unprepared(BUDGET_AMOUNT_OVERRIDES_SQL).await?;

        // ============================================================
        // PART 4: HISTORY, AUDIT & REPAIR
        // ============================================================
        db.execute_unprepared(ROLLOVER_HISTORY_SQL).await?;
        db.execute_unprepared(ROLLOVER_CORRECTIONS_SQL).await?;
        db.execute_unprepared(REPAIR_CURSORS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

const ENUMS_SQL: &str = r"
CREATE TYPE owner_kind AS ENUM ('user', 'family_member', 'custodial_member');
CREATE TYPE transaction_type AS ENUM ('expense', 'income');
CREATE TYPE period_length AS ENUM ('monthly', 'yearly');
CREATE TYPE rollover_kind AS ENUM ('surplus', 'deficit');
CREATE TYPE correction_kind AS ENUM ('rollover_drift', 'gap_filled');
CREATE TYPE repair_phase AS ENUM ('budget_attribution', 'transaction_attribution', 'chains');
";

const FUNCTIONS_SQL: &str = r"
CREATE OR REPLACE FUNCTION set_updated_at() RETURNS TRIGGER AS $$
BEGIN
    NEW.updated_at = now();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;
";

const FAMILIES_SQL: &str = r"
CREATE TABLE families (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- user_id NULL marks a custodial member (no login)
CREATE TABLE family_members (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    family_id UUID NOT NULL REFERENCES families(id) ON DELETE CASCADE,
    user_id UUID,
    display_name VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_family_members_user UNIQUE (family_id, user_id)
);

CREATE INDEX idx_family_members_family ON family_members(family_id);
";

const ACCOUNT_BOOKS_SQL: &str = r"
CREATE TABLE account_books (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    family_id UUID REFERENCES families(id) ON DELETE SET NULL,
    period_length period_length NOT NULL DEFAULT 'monthly',
    refresh_day SMALLINT NOT NULL DEFAULT 1,
    currency VARCHAR(3) NOT NULL DEFAULT 'CNY',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_refresh_day CHECK (refresh_day BETWEEN 1 AND 31)
);
";

const BUDGET_PERIODS_SQL: &str = r"
CREATE TABLE budget_periods (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    account_book_id UUID NOT NULL REFERENCES account_books(id) ON DELETE CASCADE,
    owner_kind owner_kind NOT NULL,
    owner_id UUID NOT NULL,
    user_id UUID,
    family_id UUID REFERENCES families(id) ON DELETE SET NULL,
    family_member_id UUID REFERENCES family_members(id) ON DELETE SET NULL,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    base_amount NUMERIC(19, 4) NOT NULL,
    rollover_enabled BOOLEAN NOT NULL DEFAULT true,
    rollover_amount NUMERIC(19, 4) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_budget_period_range CHECK (end_date >= start_date),
    CONSTRAINT uq_budget_period_scope_start UNIQUE (owner_kind, owner_id, account_book_id, start_date)
);

CREATE INDEX idx_budget_periods_scope ON budget_periods(account_book_id, owner_kind, owner_id, start_date DESC);
CREATE INDEX idx_budget_periods_unattributed ON budget_periods(account_book_id, id)
    WHERE family_id IS NULL OR family_member_id IS NULL;

CREATE TRIGGER trg_budget_periods_updated_at
    BEFORE UPDATE ON budget_periods
    FOR EACH ROW EXECUTE FUNCTION set_updated_at();
";

const TRANSACTIONS_SQL: &str = r"
CREATE TABLE transactions (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    account_book_id UUID NOT NULL REFERENCES account_books(id) ON DELETE CASCADE,
    user_id UUID,
    family_id UUID REFERENCES families(id) ON DELETE SET NULL,
    family_member_id UUID REFERENCES family_members(id) ON DELETE SET NULL,
    budget_id UUID REFERENCES budget_periods(id) ON DELETE SET NULL,
    transaction_type transaction_type NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    transaction_date DATE NOT NULL,
    description TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_transaction_amount CHECK (amount >= 0)
);

-- Spend aggregation by member and by user
CREATE INDEX idx_transactions_member_spend ON transactions(account_book_id, family_member_id, transaction_date)
    WHERE transaction_type = 'expense';
CREATE INDEX idx_transactions_user_spend ON transactions(account_book_id, user_id, transaction_date)
    WHERE transaction_type = 'expense';
CREATE INDEX idx_transactions_unattributed ON transactions(account_book_id, id)
    WHERE family_member_id IS NULL;
";

const BUDGET_AMOUNT_OVERRIDES_SQL: &str = r"
CREATE TABLE budget_amount_overrides (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    account_book_id UUID NOT NULL REFERENCES account_books(id) ON DELETE CASCADE,
    owner_kind owner_kind NOT NULL,
    owner_id UUID NOT NULL,
    effective_from DATE NOT NULL,
    amount NUMERIC(19, 4) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_budget_override UNIQUE (owner_kind, owner_id, account_book_id, effective_from)
);
";

const ROLLOVER_HISTORY_SQL: &str = r"
CREATE TABLE budget_rollover_history (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    budget_period_id UUID NOT NULL REFERENCES budget_periods(id) ON DELETE CASCADE,
    account_book_id UUID NOT NULL REFERENCES account_books(id) ON DELETE CASCADE,
    owner_kind owner_kind NOT NULL,
    owner_id UUID NOT NULL,
    period_start DATE NOT NULL,
    period_end DATE NOT NULL,
    base_amount NUMERIC(19, 4) NOT NULL,
    previous_rollover NUMERIC(19, 4) NOT NULL,
    spent NUMERIC(19, 4) NOT NULL,
    carried NUMERIC(19, 4) NOT NULL,
    kind rollover_kind NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_rollover_history_period ON budget_rollover_history(budget_period_id);
";

const ROLLOVER_CORRECTIONS_SQL: &str = r"
-- old_amount NULL for synthesized (gap-filled) periods
CREATE TABLE rollover_corrections (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    budget_period_id UUID NOT NULL REFERENCES budget_periods(id) ON DELETE CASCADE,
    account_book_id UUID NOT NULL REFERENCES account_books(id) ON DELETE CASCADE,
    owner_kind owner_kind NOT NULL,
    owner_id UUID NOT NULL,
    start_date DATE NOT NULL,
    old_amount NUMERIC(19, 4),
    new_amount NUMERIC(19, 4) NOT NULL,
    kind correction_kind NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_rollover_corrections_scope ON rollover_corrections(account_book_id, owner_kind, owner_id, created_at DESC);
";

const REPAIR_CURSORS_SQL: &str = r"
CREATE TABLE repair_cursors (
    account_book_id UUID PRIMARY KEY REFERENCES account_books(id) ON DELETE CASCADE,
    phase repair_phase NOT NULL,
    last_id UUID,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS repair_cursors CASCADE;
DROP TABLE IF EXISTS rollover_corrections CASCADE;
DROP TABLE IF EXISTS budget_rollover_history CASCADE;
DROP TABLE IF EXISTS budget_amount_overrides CASCADE;
DROP TABLE IF EXISTS transactions CASCADE;
DROP TABLE IF EXISTS budget_periods CASCADE;
DROP TABLE IF EXISTS account_books CASCADE;
DROP TABLE IF EXISTS family_members CASCADE;
DROP TABLE IF EXISTS families CASCADE;
DROP FUNCTION IF EXISTS set_updated_at();
DROP TYPE IF EXISTS repair_phase;
DROP TYPE IF EXISTS correction_kind;
DROP TYPE IF EXISTS rollover_kind;
DROP TYPE IF EXISTS period_length;
DROP TYPE IF EXISTS transaction_type;
DROP TYPE IF EXISTS owner_kind;
";
