//! Handlers table

use async_trait::async_trait;
use sqlx::Row;

use crate::enquiry::HandlerId;
use crate::error::Result;
use crate::repository::{Handler, HandlerDirectory};

use super::LeadDatabase;

impl LeadDatabase {
    /// Add or replace a handler
    pub async fn upsert_handler(&self, handler: &Handler) -> Result<()> {
        sqlx::query(
            "INSERT INTO handlers (id, name, team, is_active) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                team = excluded.team,
                is_active = excluded.is_active",
        )
        .bind(handler.id.as_str())
        .bind(&handler.name)
        .bind(handler.team.as_deref())
        .bind(handler.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_handlers(&self) -> Result<Vec<Handler>> {
        let rows = sqlx::query("SELECT id, name, team, is_active FROM handlers ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode).collect()
    }
}

fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<Handler> {
    let id: String = row.try_get("id")?;
    Ok(Handler {
        id: HandlerId::new(id),
        name: row.try_get("name")?,
        team: row.try_get("team")?,
        is_active: row.try_get("is_active")?,
    })
}

#[async_trait]
impl HandlerDirectory for LeadDatabase {
    async fn find_handler(&self, id: &HandlerId) -> Result<Option<Handler>> {
        let row = sqlx::query("SELECT id, name, team, is_active FROM handlers WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode).transpose()
    }
}
