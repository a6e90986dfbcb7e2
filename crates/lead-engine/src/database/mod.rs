//! # SQLite Persistence
//!
//! [`LeadDatabase`] implements every collaborator trait on one `sqlx`
//! connection pool:
//!
//! | Trait                 | Module             |
//! |-----------------------|--------------------|
//! | `EnquiryRepository`   | `enquiry_store`    |
//! | `RuleRepository`      | `rule_store`       |
//! | `HandlerDirectory`    | `handler_store`    |
//! | `AssignmentLedger`    | `ledger_store`     |
//! | `AuditSink`           | `audit_store`      |
//!
//! Enquiry writes and their audit rows share one transaction, and the ledger
//! counters are single conditional statements, so concurrent engines on the
//! same database file stay consistent.

pub mod audit_store;
pub mod enquiry_store;
pub mod handler_store;
pub mod ledger_store;
pub mod rule_store;
mod schema;

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, error, info};

use crate::config::DatabaseConfig;
use crate::error::Result;

/// SQLite-backed store
#[derive(Clone, Debug)]
pub struct LeadDatabase {
    pool: SqlitePool,
}

impl LeadDatabase {
    /// Open (creating if needed) the database described by `config`
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        Self::open(&config.url, config.max_connections).await
    }

    /// Open a database by URL with the default pool size
    pub async fn new(url: &str) -> Result<Self> {
        Self::open(url, DatabaseConfig::default().max_connections).await
    }

    /// Private in-memory database for tests
    pub async fn new_in_memory() -> Result<Self> {
        // Every pooled connection to :memory: would see its own database
        Self::open("sqlite::memory:", 1).await
    }

    async fn open(url: &str, max_connections: u32) -> Result<Self> {
        info!("🗄️ Opening lead database at: {}", url);

        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        schema::create_tables(&pool).await?;

        info!("✅ Lead database ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Execute a health check query
    pub async fn health_check(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => {
                debug!("💚 Database health check passed");
                true
            }
            Err(e) => {
                error!("❌ Database health check failed: {}", e);
                false
            }
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

pub(crate) fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}
