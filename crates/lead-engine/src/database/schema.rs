//! Table definitions
//!
//! Timestamps are stored as integer microseconds since the epoch so range
//! queries compare numbers, not strings. Enquiries, rules and audit records
//! keep their full JSON in `body` next to the indexed columns.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::Result;

const STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS enquiries (
        id TEXT PRIMARY KEY,
        mobile TEXT NOT NULL,
        status TEXT NOT NULL,
        stage TEXT NOT NULL,
        assigned_to TEXT,
        is_duplicate INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        version INTEGER NOT NULL,
        body TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_enquiries_mobile ON enquiries(mobile, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_enquiries_assignee ON enquiries(assigned_to, status)",
    "CREATE INDEX IF NOT EXISTS idx_enquiries_stage ON enquiries(stage, created_at)",
    "CREATE TABLE IF NOT EXISTS assignment_rules (
        id TEXT PRIMARY KEY,
        priority INTEGER NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at INTEGER NOT NULL,
        body TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS handlers (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        team TEXT,
        is_active INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS audit_records (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        enquiry_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        actor TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        body TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_audit_enquiry ON audit_records(enquiry_id, seq)",
    "CREATE TABLE IF NOT EXISTS rule_rotation (
        rule_id TEXT PRIMARY KEY,
        next_slot INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS daily_assignments (
        handler_id TEXT NOT NULL,
        day TEXT NOT NULL,
        assigned INTEGER NOT NULL,
        PRIMARY KEY (handler_id, day)
    )",
];

pub(crate) async fn create_tables(pool: &SqlitePool) -> Result<()> {
    debug!("📋 Creating lead database schema");
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    debug!("✅ Database schema created successfully");
    Ok(())
}
