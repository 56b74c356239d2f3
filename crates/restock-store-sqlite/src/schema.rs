//! SQL schema for the notifier's SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Host-side mirror of the catalog. The host keeps it current.
CREATE TABLE IF NOT EXISTS variants (
    variant_id             TEXT PRIMARY KEY,
    sku                    TEXT NOT NULL,
    name                   TEXT NOT NULL,
    stock_on_hand          INTEGER NOT NULL DEFAULT 0,
    stock_allocated        INTEGER NOT NULL DEFAULT 0,
    out_of_stock_threshold INTEGER NOT NULL DEFAULT 0,
    updated_at             TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS customers (
    customer_id   TEXT PRIMARY KEY,
    email_address TEXT NOT NULL UNIQUE,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    token       TEXT PRIMARY KEY,
    customer_id TEXT REFERENCES customers(customer_id),
    created_at  TEXT NOT NULL
);

-- Subscriptions are never deleted; only `status` and `updated_at` change.
CREATE TABLE IF NOT EXISTS subscriptions (
    subscription_id TEXT PRIMARY KEY,
    status          TEXT NOT NULL,   -- 'Created' | 'Notified' | 'Converted'
    variant_id      TEXT NOT NULL REFERENCES variants(variant_id),
    channel         TEXT NOT NULL,
    customer_id     TEXT REFERENCES customers(customer_id),
    email           TEXT NOT NULL,
    created_at      TEXT NOT NULL,   -- fixed-width RFC 3339 UTC; sorts lexically
    updated_at      TEXT NOT NULL
);

-- At most one active subscription per (variant, channel, email).
CREATE UNIQUE INDEX IF NOT EXISTS subscriptions_active_uniq
    ON subscriptions(variant_id, channel, email)
    WHERE status = 'Created';

CREATE INDEX IF NOT EXISTS subscriptions_variant_idx
    ON subscriptions(variant_id, status, created_at);
CREATE INDEX IF NOT EXISTS subscriptions_created_idx
    ON subscriptions(created_at);

PRAGMA user_version = 1;
";
