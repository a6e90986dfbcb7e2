//! # Lead Engine
//!
//! Entry point for callers. Every operation follows the same shape:
//!
//! 1. Validate input and load the enquiry (no side effects on failure)
//! 2. Apply the transition in memory through the [`LifecycleStateMachine`]
//! 3. Run the assignment pipeline when the transition calls for it
//! 4. Commit the enquiry and its audit records as one unit
//! 5. Notify the new assignee, best effort
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use leadroute_engine::prelude::*;
//!
//! # async fn example() -> leadroute_engine::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let engine = LeadEngine::new(EngineConfig::default(), Collaborators::memory(store))?;
//!
//! let enquiry = engine
//!     .create_enquiry(NewEnquiry {
//!         mobile: "9876543210".to_string(),
//!         lead_type: Some(LeadType::B2c),
//!         capacity: Some(3.0),
//!         category: Some("Residential".to_string()),
//!         profile: Some(ProfileType::Retail),
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! engine.change_status(enquiry.id, EnquiryStatus::InProgress, "priya").await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::assignment::{AssignmentOutcome, Assigner};
use crate::audit::{AuditKind, AuditRecord, AuditSink};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::database::LeadDatabase;
use crate::duplicate::DuplicateDetector;
use crate::enquiry::{Enquiry, EnquiryId, EnquiryStatus, HandlerId, NewEnquiry, ProfileType, Stage};
use crate::error::{LeadError, Result};
use crate::lifecycle::{LifecycleStateMachine, ProfileChange};
use crate::notify::{NotificationSender, TracingNotifier};
use crate::repository::{AssignmentLedger, EnquiryRepository, HandlerDirectory, MemoryStore, RuleRepository};

/// The stores and sinks an engine runs against
#[derive(Clone)]
pub struct Collaborators {
    pub enquiries: Arc<dyn EnquiryRepository>,
    pub rules: Arc<dyn RuleRepository>,
    pub handlers: Arc<dyn HandlerDirectory>,
    pub ledger: Arc<dyn AssignmentLedger>,
    pub audit: Arc<dyn AuditSink>,
}

impl Collaborators {
    /// Everything backed by one in-process store
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            audit: store.audit_sink(),
            enquiries: store.clone(),
            rules: store.clone(),
            handlers: store.clone(),
            ledger: store,
        }
    }

    /// Everything backed by one SQLite database
    pub fn database(db: Arc<LeadDatabase>) -> Self {
        Self {
            enquiries: db.clone(),
            rules: db.clone(),
            handlers: db.clone(),
            ledger: db.clone(),
            audit: db,
        }
    }
}

/// Enquiry assignment and lifecycle engine
pub struct LeadEngine {
    config: EngineConfig,
    enquiries: Arc<dyn EnquiryRepository>,
    handlers: Arc<dyn HandlerDirectory>,
    audit: Arc<dyn AuditSink>,
    assigner: Assigner,
    detector: DuplicateDetector,
    lifecycle: LifecycleStateMachine,
    notifier: Arc<dyn NotificationSender>,
    clock: Arc<dyn Clock>,
}

impl LeadEngine {
    /// Create an engine; notifications go to the log until a sender is set
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let Collaborators {
            enquiries,
            rules,
            handlers,
            ledger,
            audit,
        } = collaborators;

        info!(
            "🚀 Lead engine ready (duplicate window {} days, UTC offset {} min)",
            config.intake.duplicate_window_days, config.assignment.utc_offset_minutes
        );

        Ok(Self {
            detector: DuplicateDetector::new(config.intake.duplicate_window()),
            assigner: Assigner::new(enquiries.clone(), rules, handlers.clone(), ledger),
            lifecycle: LifecycleStateMachine::new(),
            notifier: Arc::new(TracingNotifier),
            clock: Arc::new(SystemClock),
            config,
            enquiries,
            handlers,
            audit,
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSender>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Intake: duplicate check, initial state and, for identified profiles,
    /// one assignment attempt. Duplicates are stored, not rejected.
    pub async fn create_enquiry(&self, input: NewEnquiry) -> Result<Enquiry> {
        let lead = input.validate()?;
        let now = self.clock.now();
        let system = self.config.assignment.system_actor.as_str();
        let actor = non_blank(input.created_by.as_deref()).unwrap_or(system).to_string();

        let profile = input.profile.unwrap_or_default();
        let (status, stage) = self.lifecycle.initial_state(profile);
        let mut enquiry = Enquiry {
            id: EnquiryId::new(),
            name: non_blank(input.name.as_deref()).map(str::to_string),
            mobile: input.mobile_key(),
            email: non_blank(input.email.as_deref()).map(str::to_string),
            lead,
            profile,
            source: non_blank(input.source.as_deref()).map(str::to_string),
            city: non_blank(input.city.as_deref()).map(str::to_string),
            state: non_blank(input.state.as_deref()).map(str::to_string),
            tags: input.tags,
            attributes: input.attributes,
            status,
            stage,
            priority: input.priority.unwrap_or(self.config.intake.default_priority),
            assigned_to: None,
            assigned_team: None,
            assigned_rule: None,
            is_duplicate: false,
            duplicate_of: None,
            remarks: Vec::new(),
            created_at: now,
            updated_at: now,
            last_call_at: None,
            next_follow_up_at: None,
            closed_at: None,
            version: 0,
        };
        if let Some(remark) = non_blank(input.remark.as_deref()) {
            enquiry.push_remark(actor.as_str(), remark, now);
        }

        let original = self
            .detector
            .find_original(self.enquiries.as_ref(), &enquiry.mobile, now)
            .await?;

        let mut audit = Vec::with_capacity(2);
        let mut outcome = None;
        match original {
            Some(original) => {
                self.lifecycle.mark_duplicate(&mut enquiry, &original);
                audit.push(AuditRecord::capture(
                    &enquiry,
                    AuditKind::Created,
                    None,
                    &actor,
                    format!("Duplicate of enquiry {}", original.id),
                    now,
                ));
            }
            None => {
                audit.push(AuditRecord::capture(
                    &enquiry,
                    AuditKind::Created,
                    None,
                    &actor,
                    "Enquiry created",
                    now,
                ));
                if enquiry.is_routable() {
                    let attempt = self.assigner.attempt(&enquiry, self.today(now)).await;
                    audit.push(self.lifecycle.apply_assignment(&mut enquiry, &attempt, system, now));
                    outcome = Some(attempt);
                }
            }
        }

        let stored = self.commit(Commit::Insert, &enquiry, &audit, outcome.as_ref()).await?;
        info!(
            "📥 Enquiry {} created ({} / {}, {})",
            stored.id,
            stored.status,
            stored.stage,
            stored.source.as_deref().unwrap_or("unknown source")
        );
        self.notify_if_assigned(&stored, outcome.as_ref()).await;
        Ok(stored)
    }

    /// Lifecycle transition only; never routes
    pub async fn change_status(&self, id: EnquiryId, next: EnquiryStatus, actor: &str) -> Result<Enquiry> {
        let actor = require_actor(actor)?;
        let mut enquiry = self.get_enquiry(id).await?;
        let record = self.lifecycle.change_status(&mut enquiry, next, actor, self.clock.now())?;
        self.enquiries.save(&enquiry, &[record]).await
    }

    /// Human override. Skips the rule matcher but is audited like any assignment.
    pub async fn reassign_manually(&self, id: EnquiryId, handler: &HandlerId, actor: &str) -> Result<Enquiry> {
        let actor = require_actor(actor)?;
        let mut enquiry = self.get_enquiry(id).await?;
        let handler = self
            .handlers
            .find_handler(handler)
            .await?
            .filter(|h| h.is_active)
            .ok_or_else(|| LeadError::not_found(format!("Active handler not found: {}", handler)))?;

        let record = self.lifecycle.reassign(&mut enquiry, &handler, actor, self.clock.now())?;
        let stored = self.enquiries.save(&enquiry, &[record]).await?;
        self.notify(&stored).await;
        Ok(stored)
    }

    /// Telecaller classification. Leaving `Unknown` re-enters the assignment
    /// pipeline exactly once, in the same commit.
    pub async fn identify_profile(&self, id: EnquiryId, profile: ProfileType, actor: &str) -> Result<Enquiry> {
        let actor = require_actor(actor)?;
        let now = self.clock.now();
        let mut enquiry = self.get_enquiry(id).await?;

        let mut audit = Vec::with_capacity(2);
        let mut outcome = None;
        if let ProfileChange::Identified(record) = self.lifecycle.identify_profile(&mut enquiry, profile, actor, now)? {
            audit.push(record);
            let attempt = self.assigner.attempt(&enquiry, self.today(now)).await;
            audit.push(self.lifecycle.apply_assignment(
                &mut enquiry,
                &attempt,
                &self.config.assignment.system_actor,
                now,
            ));
            outcome = Some(attempt);
        }

        let stored = self.commit(Commit::Save, &enquiry, &audit, outcome.as_ref()).await?;
        self.notify_if_assigned(&stored, outcome.as_ref()).await;
        Ok(stored)
    }

    /// Append a free-text remark
    pub async fn add_remark(&self, id: EnquiryId, author: &str, text: &str) -> Result<Enquiry> {
        let author = require_actor(author)?;
        let text = non_blank(Some(text)).ok_or_else(|| LeadError::validation("remark text cannot be empty"))?;
        let mut enquiry = self.get_enquiry(id).await?;
        enquiry.push_remark(author, text, self.clock.now());
        self.enquiries.save(&enquiry, &[]).await
    }

    /// Log a call to the customer and optionally schedule the next one
    pub async fn record_call(
        &self,
        id: EnquiryId,
        actor: &str,
        next_follow_up: Option<DateTime<Utc>>,
        note: Option<&str>,
    ) -> Result<Enquiry> {
        let actor = require_actor(actor)?;
        let now = self.clock.now();
        if let Some(at) = next_follow_up {
            if at <= now {
                return Err(LeadError::validation(format!("next follow-up {} is not in the future", at)));
            }
        }

        let mut enquiry = self.get_enquiry(id).await?;
        if enquiry.status.is_terminal() {
            return Err(LeadError::invalid_transition(format!(
                "Enquiry {} is {}, calls can no longer be logged",
                enquiry.id, enquiry.status
            )));
        }

        enquiry.last_call_at = Some(now);
        enquiry.next_follow_up_at = next_follow_up;
        let mut text = match next_follow_up {
            Some(at) => format!("Call logged, next follow-up at {}", at.to_rfc3339()),
            None => "Call logged".to_string(),
        };
        if let Some(note) = non_blank(note) {
            text.push_str(": ");
            text.push_str(note);
        }
        enquiry.push_remark(actor, text, now);
        self.enquiries.save(&enquiry, &[]).await
    }

    /// Run the pipeline again for an enquiry stuck in `Assignment Pending`
    pub async fn retry_assignment(&self, id: EnquiryId, actor: &str) -> Result<Enquiry> {
        let actor = require_actor(actor)?;
        let now = self.clock.now();
        let mut enquiry = self.get_enquiry(id).await?;
        if enquiry.stage != Stage::AssignmentPending || !enquiry.is_routable() {
            return Err(LeadError::invalid_transition(format!(
                "Enquiry {} is {} / {}, only routable enquiries in {} can be retried",
                enquiry.id,
                enquiry.status,
                enquiry.stage,
                Stage::AssignmentPending
            )));
        }

        let attempt = self.assigner.attempt(&enquiry, self.today(now)).await;
        let record = self.lifecycle.apply_assignment(&mut enquiry, &attempt, actor, now);
        let stored = self.commit(Commit::Save, &enquiry, &[record], Some(&attempt)).await?;
        self.notify_if_assigned(&stored, Some(&attempt)).await;
        Ok(stored)
    }

    /// Retry up to `limit` pending enquiries, oldest first. Returns how many
    /// were assigned; individual failures are logged and skipped.
    pub async fn retry_pending_assignments(&self, actor: &str, limit: usize) -> Result<usize> {
        let actor = require_actor(actor)?;
        let pending = self.enquiries.list_by_stage(Stage::AssignmentPending, limit).await?;
        debug!("Retrying {} pending enquiries", pending.len());

        let mut assigned = 0;
        for enquiry in pending.iter().filter(|e| e.is_routable()) {
            match self.retry_assignment(enquiry.id, actor).await {
                Ok(updated) if updated.stage == Stage::Assigned => assigned += 1,
                Ok(_) => {}
                Err(e) => warn!("⚠️ Retry of enquiry {} failed: {}", enquiry.id, e),
            }
        }

        info!("🔁 Retried {} pending enquiries, {} assigned", pending.len(), assigned);
        Ok(assigned)
    }

    pub async fn get_enquiry(&self, id: EnquiryId) -> Result<Enquiry> {
        self.enquiries
            .find_by_id(id)
            .await?
            .ok_or_else(|| LeadError::not_found(format!("Enquiry not found: {}", id)))
    }

    /// Audit records of one enquiry, oldest first
    pub async fn audit_trail(&self, id: EnquiryId) -> Result<Vec<AuditRecord>> {
        self.get_enquiry(id).await?;
        self.audit.trail(id).await
    }

    fn today(&self, now: DateTime<Utc>) -> chrono::NaiveDate {
        self.config.assignment.local_day(now)
    }

    /// Write the enquiry; a failed write hands back any daily slot the
    /// assignment took
    async fn commit(
        &self,
        kind: Commit,
        enquiry: &Enquiry,
        audit: &[AuditRecord],
        outcome: Option<&AssignmentOutcome>,
    ) -> Result<Enquiry> {
        let result = match kind {
            Commit::Insert => self.enquiries.insert(enquiry, audit).await,
            Commit::Save => self.enquiries.save(enquiry, audit).await,
        };
        if result.is_err() {
            self.assigner.release(outcome.and_then(|o| o.reservation())).await;
        }
        result
    }

    async fn notify_if_assigned(&self, enquiry: &Enquiry, outcome: Option<&AssignmentOutcome>) {
        if outcome.is_some_and(|o| o.is_assigned()) {
            self.notify(enquiry).await;
        }
    }

    async fn notify(&self, enquiry: &Enquiry) {
        if !self.config.notifications.enabled {
            return;
        }
        let Some(handler) = &enquiry.assigned_to else {
            return;
        };
        if let Err(e) = self.notifier.notify(handler, enquiry).await {
            warn!("⚠️ Failed to notify {} about enquiry {}: {}", handler, enquiry.id, e);
        }
    }
}

enum Commit {
    Insert,
    Save,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn require_actor(actor: &str) -> Result<&str> {
    non_blank(Some(actor)).ok_or_else(|| LeadError::validation("actor is required"))
}
