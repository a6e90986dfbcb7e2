//! In-memory store
//!
//! Backs every collaborator trait with process-local maps, for tests and
//! embeddings that do not need persistence.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::RwLock as SyncRwLock;
use tokio::sync::RwLock;
use tracing::debug;

use crate::audit::{AuditRecord, AuditSink, MemoryAuditLog};
use crate::enquiry::{Enquiry, EnquiryId, HandlerId, Stage};
use crate::error::{LeadError, Result};
use crate::rules::{AssignmentRule, RuleId};

use super::{AssignmentLedger, EnquiryRepository, Handler, HandlerDirectory, RuleRepository};

/// Process-local implementation of every collaborator
pub struct MemoryStore {
    /// Enquiries by id; writes hold the lock across the audit append so the
    /// two commit together
    enquiries: RwLock<HashMap<EnquiryId, Enquiry>>,

    rules: SyncRwLock<Vec<AssignmentRule>>,

    handlers: DashMap<HandlerId, Handler>,

    /// Rotation pointer per round-robin rule
    rotation: DashMap<RuleId, AtomicU64>,

    /// Assignments per handler per local day
    daily: DashMap<(HandlerId, NaiveDate), u32>,

    audit: Arc<dyn AuditSink>,
}

impl MemoryStore {
    /// Create an empty store with its own in-memory audit log
    pub fn new() -> Self {
        Self::with_audit_sink(Arc::new(MemoryAuditLog::new()))
    }

    /// Create an empty store that commits audit records to `audit`
    pub fn with_audit_sink(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            enquiries: RwLock::new(HashMap::new()),
            rules: SyncRwLock::new(Vec::new()),
            handlers: DashMap::new(),
            rotation: DashMap::new(),
            daily: DashMap::new(),
            audit,
        }
    }

    /// The sink audit records are committed to
    pub fn audit_sink(&self) -> Arc<dyn AuditSink> {
        self.audit.clone()
    }

    /// Add or replace a rule
    pub fn upsert_rule(&self, rule: AssignmentRule) -> Result<()> {
        rule.validate()?;
        let mut rules = self.rules.write();
        match rules.iter_mut().find(|existing| existing.id == rule.id) {
            Some(existing) => *existing = rule,
            None => rules.push(rule),
        }
        Ok(())
    }

    /// Add or replace a handler
    pub fn upsert_handler(&self, handler: Handler) {
        self.handlers.insert(handler.id.clone(), handler);
    }

    /// Number of stored enquiries
    pub async fn enquiry_count(&self) -> usize {
        self.enquiries.read().await.len()
    }

    /// Snapshot of every stored enquiry, oldest first
    pub async fn all_enquiries(&self) -> Vec<Enquiry> {
        let mut all: Vec<Enquiry> = self.enquiries.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EnquiryRepository for MemoryStore {
    async fn find_by_id(&self, id: EnquiryId) -> Result<Option<Enquiry>> {
        Ok(self.enquiries.read().await.get(&id).cloned())
    }

    async fn find_by_mobile_within(
        &self,
        mobile: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Enquiry>> {
        let mut matches: Vec<Enquiry> = self
            .enquiries
            .read()
            .await
            .values()
            .filter(|e| !e.is_duplicate && e.mobile == mobile)
            .filter(|e| e.created_at >= since && e.created_at <= until)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(matches)
    }

    async fn insert(&self, enquiry: &Enquiry, audit: &[AuditRecord]) -> Result<Enquiry> {
        let mut enquiries = self.enquiries.write().await;
        if enquiries.contains_key(&enquiry.id) {
            return Err(LeadError::conflict(format!("Enquiry {} already exists", enquiry.id)));
        }

        self.audit.append_batch(audit).await?;

        let mut stored = enquiry.clone();
        stored.version = 1;
        enquiries.insert(stored.id, stored.clone());
        debug!("Stored enquiry {} ({} audit records)", stored.id, audit.len());
        Ok(stored)
    }

    async fn save(&self, enquiry: &Enquiry, audit: &[AuditRecord]) -> Result<Enquiry> {
        let mut enquiries = self.enquiries.write().await;
        let current = enquiries
            .get(&enquiry.id)
            .ok_or_else(|| LeadError::not_found(format!("Enquiry not found: {}", enquiry.id)))?;

        if current.version != enquiry.version {
            return Err(LeadError::conflict(format!(
                "Enquiry {} was modified concurrently (expected version {}, found {})",
                enquiry.id, enquiry.version, current.version
            )));
        }

        self.audit.append_batch(audit).await?;

        let mut stored = enquiry.clone();
        stored.version += 1;
        enquiries.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn count_open_for_handler(&self, handler: &HandlerId) -> Result<u64> {
        let count = self
            .enquiries
            .read()
            .await
            .values()
            .filter(|e| e.is_open() && e.assigned_to.as_ref() == Some(handler))
            .count();
        Ok(count as u64)
    }

    async fn list_by_stage(&self, stage: Stage, limit: usize) -> Result<Vec<Enquiry>> {
        let mut matches: Vec<Enquiry> = self
            .enquiries
            .read()
            .await
            .values()
            .filter(|e| e.stage == stage)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        matches.truncate(limit);
        Ok(matches)
    }
}

#[async_trait]
impl RuleRepository for MemoryStore {
    async fn active_rules_by_priority_desc(&self) -> Result<Vec<AssignmentRule>> {
        let mut active: Vec<AssignmentRule> = self
            .rules
            .read()
            .iter()
            .filter(|rule| rule.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));
        Ok(active)
    }
}

#[async_trait]
impl HandlerDirectory for MemoryStore {
    async fn find_handler(&self, id: &HandlerId) -> Result<Option<Handler>> {
        Ok(self.handlers.get(id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl AssignmentLedger for MemoryStore {
    async fn next_rotation(&self, rule: &RuleId, len: usize) -> Result<usize> {
        if len == 0 {
            return Err(LeadError::internal(format!("Rule {} has no targets to rotate", rule)));
        }
        let pointer = self
            .rotation
            .entry(rule.clone())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::SeqCst);
        Ok((pointer % len as u64) as usize)
    }

    async fn try_reserve_daily(&self, handler: &HandlerId, day: NaiveDate, cap: u32) -> Result<bool> {
        // The entry guard locks the shard, so check and increment are one step
        let mut count = self.daily.entry((handler.clone(), day)).or_insert(0);
        if cap > 0 && *count >= cap {
            return Ok(false);
        }
        *count += 1;
        Ok(true)
    }

    async fn release_daily(&self, handler: &HandlerId, day: NaiveDate) -> Result<()> {
        if let Some(mut count) = self.daily.get_mut(&(handler.clone(), day)) {
            *count = count.saturating_sub(1);
        }
        Ok(())
    }

    async fn daily_count(&self, handler: &HandlerId, day: NaiveDate) -> Result<u32> {
        Ok(self
            .daily
            .get(&(handler.clone(), day))
            .map(|count| *count.value())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditKind;
    use crate::enquiry::{tests_support, EnquiryStatus};
    use crate::rules::RuleType;
    use chrono::Duration;

    fn created(enquiry: &Enquiry) -> AuditRecord {
        AuditRecord::capture(enquiry, AuditKind::Created, None, "system", "created", enquiry.created_at)
    }

    #[tokio::test]
    async fn test_insert_and_versioned_save() {
        let store = MemoryStore::new();
        let enquiry = tests_support::enquiry();

        let stored = store.insert(&enquiry, &[created(&enquiry)]).await.unwrap();
        assert_eq!(stored.version, 1);

        let mut update = stored.clone();
        update.status = EnquiryStatus::InProgress;
        let saved = store.save(&update, &[]).await.unwrap();
        assert_eq!(saved.version, 2);

        // Stale copy is refused
        let err = store.save(&stored, &[]).await.unwrap_err();
        assert!(matches!(err, LeadError::Conflict(_)));

        let current = store.find_by_id(enquiry.id).await.unwrap().unwrap();
        assert_eq!(current.status, EnquiryStatus::InProgress);
        assert_eq!(store.audit_sink().trail(enquiry.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mobile_window_skips_duplicates() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut original = tests_support::enquiry();
        original.created_at = now - Duration::days(2);
        store.insert(&original, &[]).await.unwrap();

        let mut repeat = tests_support::enquiry();
        repeat.is_duplicate = true;
        repeat.status = EnquiryStatus::Duplicate;
        store.insert(&repeat, &[]).await.unwrap();

        let found = store
            .find_by_mobile_within("9876543210", now - Duration::days(7), now)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, original.id);

        let none = store
            .find_by_mobile_within("9876543210", now - Duration::days(1), now)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_rotation_wraps() {
        let store = MemoryStore::new();
        let rule = RuleId::new("rr");
        let mut slots = Vec::new();
        for _ in 0..6 {
            slots.push(store.next_rotation(&rule, 3).await.unwrap());
        }
        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2]);
        assert!(store.next_rotation(&rule, 0).await.is_err());
    }

    #[tokio::test]
    async fn test_daily_reservation_respects_cap() {
        let store = MemoryStore::new();
        let handler = HandlerId::new("asha");
        let day = Utc::now().date_naive();

        assert!(store.try_reserve_daily(&handler, day, 2).await.unwrap());
        assert!(store.try_reserve_daily(&handler, day, 2).await.unwrap());
        assert!(!store.try_reserve_daily(&handler, day, 2).await.unwrap());

        store.release_daily(&handler, day).await.unwrap();
        assert_eq!(store.daily_count(&handler, day).await.unwrap(), 1);

        // Unlimited always succeeds
        for _ in 0..10 {
            assert!(store.try_reserve_daily(&handler, day, 0).await.unwrap());
        }
        assert_eq!(store.daily_count(&handler, day).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_rules_ordered_and_filtered() {
        let store = MemoryStore::new();
        store
            .upsert_rule(AssignmentRule::new("low", "low", RuleType::Manual, 1))
            .unwrap();
        store
            .upsert_rule(AssignmentRule::new("high", "high", RuleType::Manual, 9))
            .unwrap();
        store
            .upsert_rule(AssignmentRule::new("off", "off", RuleType::Manual, 50).inactive())
            .unwrap();

        let rules = store.active_rules_by_priority_desc().await.unwrap();
        let ids: Vec<&str> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "low"]);
    }
}
