//! SQL schema for the Stockfeed SQLite store.
//!
//! Executed once at connection startup. The uniqueness and CHECK
//! constraints here are load-bearing: `product_id` and
//! `(product_id, snapshot_date)` dedupe re-ingested batches, and the
//! NOCASE collation on reference names makes the database the final
//! arbiter when concurrent batches introduce the same name.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS categories (
    category_id   INTEGER PRIMARY KEY,
    category_name TEXT NOT NULL UNIQUE COLLATE NOCASE
);

CREATE TABLE IF NOT EXISTS companies (
    company_id       INTEGER PRIMARY KEY,
    company_name     TEXT NOT NULL UNIQUE COLLATE NOCASE,
    company_industry TEXT             -- carried in the schema, not populated
);

CREATE TABLE IF NOT EXISTS products (
    product_id  TEXT PRIMARY KEY,     -- natural key; immutable
    name        TEXT NOT NULL,
    category_id INTEGER REFERENCES categories(category_id),
    company_id  INTEGER REFERENCES companies(company_id),
    description TEXT,
    price       REAL CHECK (price IS NULL OR price >= 0),
    url         TEXT NOT NULL,
    created_at  TEXT NOT NULL,        -- RFC 3339 UTC; set on first insert
    updated_at  TEXT NOT NULL         -- refreshed on every upsert
);

CREATE TABLE IF NOT EXISTS product_metrics (
    product_id    TEXT NOT NULL REFERENCES products(product_id),
    snapshot_date TEXT NOT NULL,      -- YYYY-MM-DD
    reviews_count INTEGER NOT NULL CHECK (reviews_count >= 0),
    avg_rating    REAL CHECK (avg_rating IS NULL OR (avg_rating >= 0 AND avg_rating <= 5)),
    is_featured   INTEGER NOT NULL DEFAULT 0,
    UNIQUE (product_id, snapshot_date)
);

CREATE INDEX IF NOT EXISTS products_category_idx ON products(category_id);
CREATE INDEX IF NOT EXISTS products_company_idx  ON products(company_id);
CREATE INDEX IF NOT EXISTS metrics_date_idx      ON product_metrics(snapshot_date);

PRAGMA user_version = 1;
";
