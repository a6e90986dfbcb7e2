//! Assignment rules table

use async_trait::async_trait;
use sqlx::Row;
use tracing::info;

use crate::error::Result;
use crate::repository::RuleRepository;
use crate::rules::{AssignmentRule, RuleId};

use super::{to_micros, LeadDatabase};

impl LeadDatabase {
    /// Add or replace a rule
    pub async fn upsert_rule(&self, rule: &AssignmentRule) -> Result<()> {
        rule.validate()?;
        let body = serde_json::to_string(rule)?;
        sqlx::query(
            "INSERT INTO assignment_rules (id, priority, is_active, created_at, body)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                priority = excluded.priority,
                is_active = excluded.is_active,
                created_at = excluded.created_at,
                body = excluded.body",
        )
        .bind(rule.id.as_str())
        .bind(rule.priority)
        .bind(rule.is_active)
        .bind(to_micros(rule.created_at))
        .bind(body)
        .execute(&self.pool)
        .await?;

        info!("📐 Stored rule {} ({}, priority {})", rule.id, rule.rule_type, rule.priority);
        Ok(())
    }

    /// Activate or deactivate a rule; returns false when it does not exist
    pub async fn set_rule_active(&self, id: &RuleId, active: bool) -> Result<bool> {
        let Some(mut rule) = self.find_rule(id).await? else {
            return Ok(false);
        };
        rule.is_active = active;
        self.upsert_rule(&rule).await?;
        Ok(true)
    }

    pub async fn find_rule(&self, id: &RuleId) -> Result<Option<AssignmentRule>> {
        let row = sqlx::query("SELECT body FROM assignment_rules WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let body: String = row.try_get("body")?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RuleRepository for LeadDatabase {
    async fn active_rules_by_priority_desc(&self) -> Result<Vec<AssignmentRule>> {
        let rows = sqlx::query(
            "SELECT body FROM assignment_rules
             WHERE is_active = 1
             ORDER BY priority DESC, created_at ASC, rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            let body: String = row.try_get("body")?;
            rules.push(serde_json::from_str(&body)?);
        }
        Ok(rules)
    }
}
