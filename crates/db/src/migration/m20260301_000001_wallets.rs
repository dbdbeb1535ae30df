//! Wallets, the append-only wallet ledger and balance reservations.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(WALLETS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const WALLETS_SQL: &str = r"
-- ============================================================
-- ENUM TYPES
-- ============================================================
CREATE TYPE wallet_status AS ENUM ('ACTIVE', 'CLOSED');

CREATE TYPE ledger_entry_type AS ENUM (
    'ACCRUAL', 'USAGE', 'ADJUSTMENT_ADD', 'CARRY_OVER', 'RESERVATION', 'REVERSAL'
);

CREATE TYPE reservation_status AS ENUM ('PENDING', 'CONFIRMED', 'CANCELLED', 'EXPIRED');

-- ============================================================
-- WALLETS: one row per (user, year), running counters
-- ============================================================
CREATE TABLE wallets (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id UUID NOT NULL,
    year INTEGER NOT NULL,
    vacation_previous_year NUMERIC(10, 2) NOT NULL DEFAULT 0,
    vacation_current_year NUMERIC(10, 2) NOT NULL DEFAULT 0,
    vacation_accrued NUMERIC(10, 2) NOT NULL DEFAULT 0,
    vacation_used_ap NUMERIC(10, 2) NOT NULL DEFAULT 0,
    vacation_used_ac NUMERIC(10, 2) NOT NULL DEFAULT 0,
    rol_previous_year NUMERIC(10, 2) NOT NULL DEFAULT 0,
    rol_accrued NUMERIC(10, 2) NOT NULL DEFAULT 0,
    rol_used NUMERIC(10, 2) NOT NULL DEFAULT 0,
    permits_total NUMERIC(10, 2) NOT NULL DEFAULT 0,
    permits_used NUMERIC(10, 2) NOT NULL DEFAULT 0,
    ap_expiry_date DATE,
    status wallet_status NOT NULL DEFAULT 'ACTIVE',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_wallets_user_year UNIQUE (user_id, year),
    CONSTRAINT chk_wallets_year CHECK (year BETWEEN 1900 AND 9999)
);

CREATE INDEX idx_wallets_year ON wallets(year, user_id);

-- ============================================================
-- WALLET LEDGER: append-only audit log, one line per bucket
-- ============================================================
CREATE TABLE wallet_ledger_entries (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    wallet_id UUID NOT NULL REFERENCES wallets(id),
    year INTEGER NOT NULL,
    posting_id UUID NOT NULL,
    entry_type ledger_entry_type NOT NULL,
    balance_type VARCHAR(32) NOT NULL,
    amount NUMERIC(10, 2) NOT NULL,
    remaining_amount NUMERIC(10, 2) NOT NULL DEFAULT 0,
    reference_type VARCHAR(32),
    reference_id VARCHAR(255),
    reference_status VARCHAR(32),
    expiry_date DATE,
    description TEXT,
    created_by UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_ledger_remaining_non_negative CHECK (remaining_amount >= 0),
    CONSTRAINT chk_ledger_remaining_bounded CHECK (remaining_amount <= GREATEST(amount, 0)),
    CONSTRAINT chk_ledger_reference_pair CHECK ((reference_type IS NULL) = (reference_id IS NULL))
);

CREATE INDEX idx_ledger_wallet ON wallet_ledger_entries(wallet_id, created_at);
CREATE INDEX idx_ledger_posting ON wallet_ledger_entries(posting_id);
CREATE INDEX idx_ledger_reference ON wallet_ledger_entries(reference_type, reference_id)
    WHERE reference_id IS NOT NULL;
CREATE INDEX idx_ledger_open_buckets ON wallet_ledger_entries(wallet_id, balance_type, expiry_date)
    WHERE remaining_amount > 0;

-- ============================================================
-- FUNCTION: guard_ledger_append_only
-- Lines are never deleted; the only permitted update is a decrease
-- of remaining_amount by FIFO consumption.
-- ============================================================
CREATE OR REPLACE FUNCTION guard_ledger_append_only()
RETURNS TRIGGER AS $$
BEGIN
    IF TG_OP = 'DELETE' THEN
        RAISE EXCEPTION 'wallet_ledger_entries is append-only';
    END IF;

    IF NEW.id IS DISTINCT FROM OLD.id
        OR NEW.wallet_id IS DISTINCT FROM OLD.wallet_id
        OR NEW.year IS DISTINCT FROM OLD.year
        OR NEW.posting_id IS DISTINCT FROM OLD.posting_id
        OR NEW.entry_type IS DISTINCT FROM OLD.entry_type
        OR NEW.balance_type IS DISTINCT FROM OLD.balance_type
        OR NEW.amount IS DISTINCT FROM OLD.amount
        OR NEW.reference_type IS DISTINCT FROM OLD.reference_type
        OR NEW.reference_id IS DISTINCT FROM OLD.reference_id
        OR NEW.reference_status IS DISTINCT FROM OLD.reference_status
        OR NEW.expiry_date IS DISTINCT FROM OLD.expiry_date
        OR NEW.description IS DISTINCT FROM OLD.description
        OR NEW.created_by IS DISTINCT FROM OLD.created_by
        OR NEW.created_at IS DISTINCT FROM OLD.created_at THEN
        RAISE EXCEPTION 'wallet_ledger_entries: only remaining_amount may change';
    END IF;

    IF NEW.remaining_amount > OLD.remaining_amount THEN
        RAISE EXCEPTION 'wallet_ledger_entries: remaining_amount may only decrease';
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_ledger_append_only
BEFORE UPDATE OR DELETE ON wallet_ledger_entries
FOR EACH ROW
EXECUTE FUNCTION guard_ledger_append_only();

-- ============================================================
-- RESERVATIONS: virtual holds, never touching wallet counters
-- ============================================================
CREATE TABLE balance_reservations (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    wallet_id UUID NOT NULL REFERENCES wallets(id),
    user_id UUID NOT NULL,
    year INTEGER NOT NULL,
    leave_request_id VARCHAR(255) NOT NULL,
    balance_type VARCHAR(32) NOT NULL,
    amount NUMERIC(10, 2) NOT NULL,
    status reservation_status NOT NULL DEFAULT 'PENDING',
    expires_at TIMESTAMPTZ NOT NULL,
    posting_id UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    resolved_at TIMESTAMPTZ,
    CONSTRAINT chk_reservations_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_reservations_resolved CHECK ((status = 'PENDING') = (resolved_at IS NULL))
);

-- At most one pending hold per leave request
CREATE UNIQUE INDEX uq_reservations_pending_request ON balance_reservations(leave_request_id)
    WHERE status = 'PENDING';

CREATE INDEX idx_reservations_request ON balance_reservations(leave_request_id, created_at DESC);
CREATE INDEX idx_reservations_wallet ON balance_reservations(wallet_id, status);
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS balance_reservations CASCADE;
DROP TRIGGER IF EXISTS trg_ledger_append_only ON wallet_ledger_entries;
DROP FUNCTION IF EXISTS guard_ledger_append_only();
DROP TABLE IF EXISTS wallet_ledger_entries CASCADE;
DROP TABLE IF EXISTS wallets CASCADE;
DROP TYPE IF EXISTS reservation_status;
DROP TYPE IF EXISTS ledger_entry_type;
DROP TYPE IF EXISTS wallet_status;
";
