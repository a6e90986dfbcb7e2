//! Rotation pointers and daily assignment counters
//!
//! Each operation is one statement, so SQLite's write lock is the only
//! coordination concurrent engines need.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;
use tracing::debug;

use crate::enquiry::HandlerId;
use crate::error::{LeadError, Result};
use crate::repository::AssignmentLedger;
use crate::rules::RuleId;

use super::LeadDatabase;

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

#[async_trait]
impl AssignmentLedger for LeadDatabase {
    async fn next_rotation(&self, rule: &RuleId, len: usize) -> Result<usize> {
        if len == 0 {
            return Err(LeadError::internal(format!("Rule {} has no targets to rotate", rule)));
        }

        // next_slot holds how many slots have been handed out so far
        let row = sqlx::query(
            "INSERT INTO rule_rotation (rule_id, next_slot) VALUES (?, 1)
             ON CONFLICT(rule_id) DO UPDATE SET next_slot = next_slot + 1
             RETURNING next_slot",
        )
        .bind(rule.as_str())
        .fetch_one(&self.pool)
        .await?;

        let issued: i64 = row.try_get("next_slot")?;
        let pointer = (issued - 1).max(0) as u64;
        Ok((pointer % len as u64) as usize)
    }

    async fn try_reserve_daily(&self, handler: &HandlerId, day: NaiveDate, cap: u32) -> Result<bool> {
        let result = if cap == 0 {
            sqlx::query(
                "INSERT INTO daily_assignments (handler_id, day, assigned) VALUES (?, ?, 1)
                 ON CONFLICT(handler_id, day) DO UPDATE SET assigned = assigned + 1",
            )
            .bind(handler.as_str())
            .bind(day_key(day))
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                "INSERT INTO daily_assignments (handler_id, day, assigned) VALUES (?, ?, 1)
                 ON CONFLICT(handler_id, day) DO UPDATE SET assigned = assigned + 1
                 WHERE assigned < ?",
            )
            .bind(handler.as_str())
            .bind(day_key(day))
            .bind(i64::from(cap))
            .execute(&self.pool)
            .await?
        };

        let reserved = result.rows_affected() > 0;
        if !reserved {
            debug!("Handler {} is at its daily cap of {} on {}", handler, cap, day);
        }
        Ok(reserved)
    }

    async fn release_daily(&self, handler: &HandlerId, day: NaiveDate) -> Result<()> {
        sqlx::query(
            "UPDATE daily_assignments SET assigned = MAX(0, assigned - 1)
             WHERE handler_id = ? AND day = ?",
        )
        .bind(handler.as_str())
        .bind(day_key(day))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn daily_count(&self, handler: &HandlerId, day: NaiveDate) -> Result<u32> {
        let row = sqlx::query("SELECT assigned FROM daily_assignments WHERE handler_id = ? AND day = ?")
            .bind(handler.as_str())
            .bind(day_key(day))
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let assigned: i64 = row.try_get("assigned")?;
                Ok(u32::try_from(assigned.max(0)).unwrap_or(u32::MAX))
            }
            None => Ok(0),
        }
    }
}
