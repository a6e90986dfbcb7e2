//! Audit trail for enquiry transitions and assignments
//!
//! Every status change, profile identification and assignment decision
//! produces one immutable [`AuditRecord`]. Records are committed in the same
//! unit as the enquiry write they describe: if the sink refuses a record the
//! write is abandoned.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enquiry::{Enquiry, EnquiryId, EnquiryStatus, HandlerId, Stage};
use crate::error::Result;

/// What an audit record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    Created,
    StatusChange,
    ProfileIdentified,
    Assignment,
    ManualReassignment,
    AssignmentPending,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::Created => "created",
            AuditKind::StatusChange => "status_change",
            AuditKind::ProfileIdentified => "profile_identified",
            AuditKind::Assignment => "assignment",
            AuditKind::ManualReassignment => "manual_reassignment",
            AuditKind::AssignmentPending => "assignment_pending",
        }
    }
}

/// Immutable record of one transition or assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub enquiry_id: EnquiryId,
    pub kind: AuditKind,
    /// Absent for the creation record
    pub old_status: Option<EnquiryStatus>,
    pub new_status: EnquiryStatus,
    pub old_stage: Option<Stage>,
    pub new_stage: Stage,
    pub actor: String,
    pub handler: Option<HandlerId>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Record the move of `enquiry` from `(old_status, old_stage)` to its current state
    pub fn capture(
        enquiry: &Enquiry,
        kind: AuditKind,
        old: Option<(EnquiryStatus, Stage)>,
        actor: &str,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            enquiry_id: enquiry.id,
            kind,
            old_status: old.map(|(status, _)| status),
            new_status: enquiry.status,
            old_stage: old.map(|(_, stage)| stage),
            new_stage: enquiry.stage,
            actor: actor.to_string(),
            handler: enquiry.assigned_to.clone(),
            reason: reason.into(),
            created_at: at,
        }
    }
}

/// Destination for audit records. Must never drop a record silently.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one record
    async fn append(&self, record: &AuditRecord) -> Result<()>;

    /// Append several records as one unit. The default appends one by one;
    /// sinks that can do better should make the batch all-or-nothing.
    async fn append_batch(&self, records: &[AuditRecord]) -> Result<()> {
        for record in records {
            self.append(record).await?;
        }
        Ok(())
    }

    /// Records for one enquiry, oldest first
    async fn trail(&self, enquiry_id: EnquiryId) -> Result<Vec<AuditRecord>>;
}

/// In-process audit log
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Snapshot of every record
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.read().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        self.records.write().push(record.clone());
        Ok(())
    }

    async fn append_batch(&self, records: &[AuditRecord]) -> Result<()> {
        self.records.write().extend(records.iter().cloned());
        Ok(())
    }

    async fn trail(&self, enquiry_id: EnquiryId) -> Result<Vec<AuditRecord>> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|record| record.enquiry_id == enquiry_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enquiry::EnquiryStatus;

    fn record(enquiry_id: EnquiryId, kind: AuditKind) -> AuditRecord {
        AuditRecord {
            id: Uuid::new_v4(),
            enquiry_id,
            kind,
            old_status: None,
            new_status: EnquiryStatus::New,
            old_stage: None,
            new_stage: Stage::Captured,
            actor: "system".to_string(),
            handler: None,
            reason: "test".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_trail_filters_by_enquiry() {
        let log = MemoryAuditLog::new();
        let a = EnquiryId::new();
        let b = EnquiryId::new();

        log.append(&record(a, AuditKind::Created)).await.unwrap();
        log.append_batch(&[record(b, AuditKind::Created), record(a, AuditKind::StatusChange)])
            .await
            .unwrap();

        let trail = log.trail(a).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].kind, AuditKind::Created);
        assert_eq!(trail[1].kind, AuditKind::StatusChange);
        assert_eq!(log.len(), 3);
    }
}
