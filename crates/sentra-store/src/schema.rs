//! Table definitions.

/// Schema statements executed at startup, in order.
///
/// The partial unique index on `export_jobs` is load-bearing: it closes the
/// single-flight check-then-create race by letting the second concurrent
/// insert fail instead of creating a duplicate in-flight job.
pub(crate) const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS consent_records (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        type_key TEXT NOT NULL,
        granted BOOLEAN NOT NULL,
        catalog_version TEXT NOT NULL,
        legal_basis TEXT NOT NULL,
        ip_masked TEXT,
        user_agent TEXT,
        session_id TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_consent_records_lookup
        ON consent_records(user_id, type_key, created_at)",
    "CREATE TABLE IF NOT EXISTS consent_forensics (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        record_id TEXT NOT NULL,
        action TEXT NOT NULL,
        previous_state TEXT,
        new_state TEXT NOT NULL,
        diff TEXT NOT NULL,
        source TEXT NOT NULL,
        interaction_method TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_consent_forensics_user
        ON consent_forensics(user_id, created_at)",
    "CREATE TABLE IF NOT EXISTS audit_entries (
        id TEXT PRIMARY KEY,
        actor TEXT,
        user_id TEXT,
        action TEXT NOT NULL,
        legal_basis TEXT NOT NULL,
        details TEXT NOT NULL,
        method TEXT,
        path TEXT,
        ip_masked TEXT,
        user_agent TEXT,
        session_id TEXT,
        retention_until TEXT NOT NULL,
        note TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        verified BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_audit_entries_created
        ON audit_entries(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_audit_entries_retention
        ON audit_entries(retention_until)",
    "CREATE TABLE IF NOT EXISTS activity_events (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        category TEXT NOT NULL,
        privacy_level TEXT NOT NULL,
        description TEXT NOT NULL,
        ip_masked TEXT,
        retention_until TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_activity_events_retention
        ON activity_events(retention_until)",
    "CREATE TABLE IF NOT EXISTS restrictions (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        reason TEXT NOT NULL,
        status TEXT NOT NULL,
        data_categories TEXT NOT NULL,
        notes TEXT,
        expires_at TEXT,
        lifted_by TEXT,
        lifted_reason TEXT,
        lifted_at TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_restrictions_user_status
        ON restrictions(user_id, status)",
    "CREATE TABLE IF NOT EXISTS export_jobs (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        token TEXT NOT NULL UNIQUE,
        format TEXT NOT NULL,
        categories TEXT NOT NULL,
        status TEXT NOT NULL,
        progress INTEGER NOT NULL DEFAULT 0,
        file_path TEXT,
        file_size INTEGER,
        download_count INTEGER NOT NULL DEFAULT 0,
        last_downloaded_at TEXT,
        expires_at TEXT,
        error TEXT,
        created_at TEXT NOT NULL,
        completed_at TEXT
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_export_jobs_single_flight
        ON export_jobs(user_id) WHERE status IN ('pending', 'processing')",
    "CREATE INDEX IF NOT EXISTS idx_export_jobs_expiry
        ON export_jobs(status, expires_at)",
];
