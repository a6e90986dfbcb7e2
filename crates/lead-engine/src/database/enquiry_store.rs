//! Enquiries table

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::debug;

use crate::audit::AuditRecord;
use crate::enquiry::{Enquiry, EnquiryId, EnquiryStatus, HandlerId, Stage};
use crate::error::{LeadError, Result};
use crate::repository::EnquiryRepository;

use super::audit_store::insert_record;
use super::{to_micros, LeadDatabase};

fn decode(row: &SqliteRow) -> Result<Enquiry> {
    let body: String = row.try_get("body")?;
    Ok(serde_json::from_str(&body)?)
}

fn open_statuses() -> String {
    EnquiryStatus::ALL
        .iter()
        .filter(|status| status.is_open())
        .map(|status| format!("'{}'", status.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

async fn append_audit(conn: &mut SqliteConnection, audit: &[AuditRecord]) -> Result<()> {
    for record in audit {
        insert_record(conn, record).await?;
    }
    Ok(())
}

#[async_trait]
impl EnquiryRepository for LeadDatabase {
    async fn find_by_id(&self, id: EnquiryId) -> Result<Option<Enquiry>> {
        let row = sqlx::query("SELECT body FROM enquiries WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode).transpose()
    }

    async fn find_by_mobile_within(
        &self,
        mobile: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Enquiry>> {
        let rows = sqlx::query(
            "SELECT body FROM enquiries
             WHERE mobile = ? AND is_duplicate = 0 AND created_at >= ? AND created_at <= ?
             ORDER BY created_at, id",
        )
        .bind(mobile)
        .bind(to_micros(since))
        .bind(to_micros(until))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(decode).collect()
    }

    async fn insert(&self, enquiry: &Enquiry, audit: &[AuditRecord]) -> Result<Enquiry> {
        let mut stored = enquiry.clone();
        stored.version = 1;
        let body = serde_json::to_string(&stored)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO enquiries
             (id, mobile, status, stage, assigned_to, is_duplicate, created_at, updated_at, version, body)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(stored.id.to_string())
        .bind(&stored.mobile)
        .bind(stored.status.as_str())
        .bind(stored.stage.as_str())
        .bind(stored.assigned_to.as_ref().map(HandlerId::as_str))
        .bind(stored.is_duplicate)
        .bind(to_micros(stored.created_at))
        .bind(to_micros(stored.updated_at))
        .bind(stored.version as i64)
        .bind(body)
        .execute(&mut *tx)
        .await?;

        append_audit(&mut tx, audit).await?;
        tx.commit().await?;

        debug!("Stored enquiry {} ({} audit records)", stored.id, audit.len());
        Ok(stored)
    }

    async fn save(&self, enquiry: &Enquiry, audit: &[AuditRecord]) -> Result<Enquiry> {
        let mut stored = enquiry.clone();
        stored.version = enquiry.version + 1;
        let body = serde_json::to_string(&stored)?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE enquiries
             SET status = ?, stage = ?, assigned_to = ?, is_duplicate = ?, updated_at = ?,
                 version = ?, body = ?
             WHERE id = ? AND version = ?",
        )
        .bind(stored.status.as_str())
        .bind(stored.stage.as_str())
        .bind(stored.assigned_to.as_ref().map(HandlerId::as_str))
        .bind(stored.is_duplicate)
        .bind(to_micros(stored.updated_at))
        .bind(stored.version as i64)
        .bind(body)
        .bind(stored.id.to_string())
        .bind(enquiry.version as i64)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM enquiries WHERE id = ?")
                .bind(stored.id.to_string())
                .fetch_optional(&mut *tx)
                .await?
                .is_some();
            tx.rollback().await?;
            return Err(if exists {
                LeadError::conflict(format!(
                    "Enquiry {} was modified concurrently (expected version {})",
                    enquiry.id, enquiry.version
                ))
            } else {
                LeadError::not_found(format!("Enquiry not found: {}", enquiry.id))
            });
        }

        append_audit(&mut tx, audit).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn count_open_for_handler(&self, handler: &HandlerId) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) AS open FROM enquiries
             WHERE assigned_to = ? AND is_duplicate = 0 AND status IN ({})",
            open_statuses()
        );
        let row = sqlx::query(&sql)
            .bind(handler.as_str())
            .fetch_one(&self.pool)
            .await?;
        let open: i64 = row.try_get("open")?;
        Ok(open.max(0) as u64)
    }

    async fn list_by_stage(&self, stage: Stage, limit: usize) -> Result<Vec<Enquiry>> {
        let rows = sqlx::query(
            "SELECT body FROM enquiries WHERE stage = ? ORDER BY created_at, id LIMIT ?",
        )
        .bind(stage.as_str())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(decode).collect()
    }
}
