//! Audit records table

use async_trait::async_trait;
use sqlx::{Row, SqliteConnection};

use crate::audit::{AuditRecord, AuditSink};
use crate::enquiry::EnquiryId;
use crate::error::Result;

use super::{to_micros, LeadDatabase};

/// Insert one record on an open connection or transaction
pub(crate) async fn insert_record(conn: &mut SqliteConnection, record: &AuditRecord) -> Result<()> {
    let body = serde_json::to_string(record)?;
    sqlx::query(
        "INSERT INTO audit_records (id, enquiry_id, kind, actor, created_at, body)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(record.id.to_string())
    .bind(record.enquiry_id.to_string())
    .bind(record.kind.as_str())
    .bind(&record.actor)
    .bind(to_micros(record.created_at))
    .bind(body)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl AuditSink for LeadDatabase {
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_record(&mut conn, record).await
    }

    async fn append_batch(&self, records: &[AuditRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            insert_record(&mut tx, record).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn trail(&self, enquiry_id: EnquiryId) -> Result<Vec<AuditRecord>> {
        let rows = sqlx::query("SELECT body FROM audit_records WHERE enquiry_id = ? ORDER BY seq")
            .bind(enquiry_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<AuditRecord> {
                let body: String = row.try_get("body")?;
                Ok(serde_json::from_str(&body)?)
            })
            .collect()
    }
}
