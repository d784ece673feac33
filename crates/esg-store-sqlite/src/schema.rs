//! SQL schema for the ESG SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision for later migrations.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS companies (
    company_id          TEXT PRIMARY KEY,
    name                TEXT NOT NULL UNIQUE COLLATE NOCASE
                        CHECK (length(trim(name)) > 0),
    first_researched_at TEXT NOT NULL,
    last_updated        TEXT NOT NULL
);

-- Replaced wholesale on every re-analysis.
CREATE TABLE IF NOT EXISTS sources (
    source_id  TEXT PRIMARY KEY,
    company_id TEXT NOT NULL REFERENCES companies(company_id) ON DELETE CASCADE,
    url        TEXT NOT NULL,
    text       TEXT NOT NULL,
    scraped_at TEXT NOT NULL
);

-- Exactly one row per schema metric per company; replaced on re-analysis.
CREATE TABLE IF NOT EXISTS metrics (
    metric_id    TEXT PRIMARY KEY,
    company_id   TEXT NOT NULL REFERENCES companies(company_id) ON DELETE CASCADE,
    position     INTEGER NOT NULL,  -- schema order
    category     TEXT NOT NULL,     -- 'Environmental' | 'Social' | 'Governance'
    name         TEXT NOT NULL,
    value        REAL NOT NULL CHECK (value BETWEEN 0 AND 100),
    confidence   REAL NOT NULL CHECK (confidence BETWEEN 0 AND 1),
    origin       TEXT NOT NULL,     -- 'extracted' | 'defaulted'
    evidence     TEXT,
    extracted_at TEXT NOT NULL,
    UNIQUE (company_id, name)
);

-- Append-only. The newest record is the company's current score.
CREATE TABLE IF NOT EXISTS score_records (
    score_id       TEXT PRIMARY KEY,
    company_id     TEXT NOT NULL REFERENCES companies(company_id) ON DELETE CASCADE,
    final_score    REAL NOT NULL CHECK (final_score   BETWEEN 0 AND 100),
    environmental  REAL NOT NULL CHECK (environmental BETWEEN 0 AND 100),
    social         REAL NOT NULL CHECK (social        BETWEEN 0 AND 100),
    governance     REAL NOT NULL CHECK (governance    BETWEEN 0 AND 100),
    level          TEXT NOT NULL,
    breakdown_json TEXT NOT NULL,
    computed_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS sources_company_idx ON sources(company_id, scraped_at);
CREATE INDEX IF NOT EXISTS metrics_company_idx ON metrics(company_id, position);
CREATE INDEX IF NOT EXISTS scores_company_idx  ON score_records(company_id, computed_at);

PRAGMA user_version = 1;
";
