//! SQL schema for the commndata SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per entity instance. `body` is the flat JSON serialisation of the
-- entity, audit envelope included; filters run over json_extract(body, ...).
-- Rows are never hard-deleted; soft deletes set body.delete_flag.
CREATE TABLE IF NOT EXISTS records (
    entity      TEXT    NOT NULL,   -- e.g. 'code_master'
    record_id   TEXT    NOT NULL,
    version     INTEGER NOT NULL CHECK (version >= 1),  -- mirrors body.version
    unique_key  TEXT    NOT NULL,   -- JSON array of the natural-key values
    body        TEXT    NOT NULL,
    PRIMARY KEY (entity, record_id),
    UNIQUE (entity, unique_key)
);

CREATE INDEX IF NOT EXISTS records_entity_idx ON records(entity);

PRAGMA user_version = 1;
";
