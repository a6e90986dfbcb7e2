//! # Enquiry Lifecycle
//!
//! Validates and applies transitions to an in-memory [`Enquiry`]. Nothing here
//! touches storage: each method mutates the enquiry and returns the
//! [`AuditRecord`] that must be committed with it.
//!
//! ```text
//! Unknown ──► New ──► In Progress ──► Quoted ──┬──► Converted
//!    │         │           │            │      └──► Rejected
//!    └─────────┴───────────┴────────────┴─────────► Archived
//!
//! Duplicate (intake only) ────────────────────────► Archived
//! ```

use chrono::{DateTime, Utc};
use tracing::info;

use crate::assignment::AssignmentOutcome;
use crate::audit::{AuditKind, AuditRecord};
use crate::enquiry::{Enquiry, EnquiryStatus, ProfileType, Stage};
use crate::error::{LeadError, Result};
use crate::repository::Handler;

/// What identifying a profile did to the enquiry
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileChange {
    /// Moved to `New` / `Profile Identified`; an assignment attempt must follow
    Identified(AuditRecord),
    /// Profile stored, lifecycle untouched
    Recorded,
}

/// Enquiry state machine
#[derive(Debug, Clone, Default)]
pub struct LifecycleStateMachine;

impl LifecycleStateMachine {
    pub fn new() -> Self {
        Self
    }

    /// Status and stage a non-duplicate enquiry starts in
    pub fn initial_state(&self, profile: ProfileType) -> (EnquiryStatus, Stage) {
        let status = if profile.is_identified() {
            EnquiryStatus::New
        } else {
            EnquiryStatus::Unknown
        };
        (status, status.derived_stage())
    }

    /// Park a fresh enquiry as a duplicate of `original`
    pub fn mark_duplicate(&self, enquiry: &mut Enquiry, original: &Enquiry) {
        enquiry.is_duplicate = true;
        enquiry.duplicate_of = Some(original.id);
        enquiry.status = EnquiryStatus::Duplicate;
        enquiry.stage = EnquiryStatus::Duplicate.derived_stage();
        enquiry.assigned_to = None;
        enquiry.assigned_team = None;
        enquiry.assigned_rule = None;
    }

    /// Move the enquiry to `next`, appending the status remark
    pub fn change_status(
        &self,
        enquiry: &mut Enquiry,
        next: EnquiryStatus,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<AuditRecord> {
        let current = enquiry.status;
        if !current.can_transition_to(next) {
            return Err(LeadError::invalid_transition(format!(
                "Cannot change status of enquiry {} from {} to {}",
                enquiry.id, current, next
            )));
        }

        let old = (current, enquiry.stage);
        enquiry.status = next;
        enquiry.stage = next.derived_stage();
        if next.sets_closure() {
            enquiry.closed_at = Some(at);
        }

        let text = status_remark(current, next);
        enquiry.push_remark(actor, text.clone(), at);

        info!("🔄 Enquiry {} status: {} → {} by {}", enquiry.id, current, next, actor);
        Ok(AuditRecord::capture(enquiry, AuditKind::StatusChange, Some(old), actor, text, at))
    }

    /// Record a telecaller's profile classification.
    ///
    /// Leaving `Unknown` on a live enquiry forces `New` / `Profile Identified`,
    /// whatever status it had reached. Terminal and duplicate enquiries only
    /// store the profile.
    pub fn identify_profile(
        &self,
        enquiry: &mut Enquiry,
        profile: ProfileType,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<ProfileChange> {
        if !profile.is_identified() {
            return Err(LeadError::validation("profile cannot be set back to Unknown"));
        }
        if enquiry.profile == profile {
            return Err(LeadError::validation(format!(
                "enquiry {} already has profile {}",
                enquiry.id, profile
            )));
        }

        let was_unknown = !enquiry.profile.is_identified();
        enquiry.profile = profile;
        enquiry.updated_at = at;

        let reroutes = was_unknown && !enquiry.is_duplicate && !enquiry.status.is_terminal();
        if !reroutes {
            enquiry.push_remark(actor, format!("Profile set to {}", profile), at);
            return Ok(ProfileChange::Recorded);
        }

        let old = (enquiry.status, enquiry.stage);
        if old.0 != EnquiryStatus::New {
            enquiry.push_remark(actor, status_remark(old.0, EnquiryStatus::New), at);
        }
        enquiry.status = EnquiryStatus::New;
        enquiry.stage = Stage::ProfileIdentified;
        let text = format!("Profile identified as {}", profile);
        enquiry.push_remark(actor, text.clone(), at);

        info!("🪪 Enquiry {} profile identified as {} by {}", enquiry.id, profile, actor);
        Ok(ProfileChange::Identified(AuditRecord::capture(
            enquiry,
            AuditKind::ProfileIdentified,
            Some(old),
            actor,
            text,
            at,
        )))
    }

    /// Apply an assignment attempt and describe it for the audit trail
    pub fn apply_assignment(
        &self,
        enquiry: &mut Enquiry,
        outcome: &AssignmentOutcome,
        actor: &str,
        at: DateTime<Utc>,
    ) -> AuditRecord {
        let old = (enquiry.status, enquiry.stage);
        outcome.apply(enquiry, at);
        let kind = if outcome.is_assigned() {
            AuditKind::Assignment
        } else {
            AuditKind::AssignmentPending
        };
        AuditRecord::capture(enquiry, kind, Some(old), actor, outcome.reason(), at)
    }

    /// Human override of the assignee
    pub fn reassign(
        &self,
        enquiry: &mut Enquiry,
        handler: &Handler,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<AuditRecord> {
        if enquiry.is_duplicate || enquiry.status.is_terminal() {
            return Err(LeadError::invalid_transition(format!(
                "Enquiry {} is {} and cannot be reassigned",
                enquiry.id, enquiry.status
            )));
        }
        if enquiry.assigned_to.as_ref() == Some(&handler.id) {
            return Err(LeadError::validation(format!(
                "enquiry {} is already assigned to {}",
                enquiry.id, handler.id
            )));
        }

        let old = (enquiry.status, enquiry.stage);
        let text = match &enquiry.assigned_to {
            Some(previous) => format!("Reassigned from {} to {}", previous, handler.id),
            None => format!("Assigned to {}", handler.id),
        };

        enquiry.assigned_to = Some(handler.id.clone());
        enquiry.assigned_team = handler.team.clone();
        enquiry.assigned_rule = None;
        enquiry.stage = Stage::Assigned;
        enquiry.push_remark(actor, text.clone(), at);

        info!("👤 Enquiry {} manually assigned to {} by {}", enquiry.id, handler.id, actor);
        Ok(AuditRecord::capture(
            enquiry,
            AuditKind::ManualReassignment,
            Some(old),
            actor,
            text,
            at,
        ))
    }
}

fn status_remark(from: EnquiryStatus, to: EnquiryStatus) -> String {
    format!("Status changed from {} to {}", from, to)
}
