//! # Collaborator Interfaces
//!
//! The engine owns no storage. Everything it reads or writes goes through the
//! traits in this module, so the same decision logic runs against the
//! in-process [`MemoryStore`] or the SQLite-backed
//! [`LeadDatabase`](crate::database::LeadDatabase).
//!
//! ## Atomicity
//!
//! - [`EnquiryRepository::insert`] and [`EnquiryRepository::save`] commit the
//!   enquiry and its audit records together or not at all.
//! - [`EnquiryRepository::save`] is version-checked: the stored version must
//!   equal the version of the enquiry being saved.
//! - [`AssignmentLedger`] counters are single atomic operations; callers
//!   never read a counter and write it back.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::AuditRecord;
use crate::enquiry::{Enquiry, EnquiryId, HandlerId, Stage};
use crate::error::Result;
use crate::rules::{AssignmentRule, RuleId};

pub use memory::MemoryStore;

/// Person or desk enquiries are routed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handler {
    pub id: HandlerId,
    pub name: String,
    pub team: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Handler {
    pub fn new<I: Into<HandlerId>, N: Into<String>>(id: I, name: N) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            team: None,
            is_active: true,
        }
    }

    pub fn with_team<T: Into<String>>(mut self, team: T) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Enquiry persistence
#[async_trait]
pub trait EnquiryRepository: Send + Sync {
    async fn find_by_id(&self, id: EnquiryId) -> Result<Option<Enquiry>>;

    /// Non-duplicate enquiries for `mobile` created in `[since, until]`,
    /// oldest first
    async fn find_by_mobile_within(
        &self,
        mobile: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Enquiry>>;

    /// Store a new enquiry with its audit records; returns the committed copy
    async fn insert(&self, enquiry: &Enquiry, audit: &[AuditRecord]) -> Result<Enquiry>;

    /// Replace a stored enquiry if its version still matches, appending the
    /// audit records in the same unit; returns the committed copy with its
    /// version bumped
    async fn save(&self, enquiry: &Enquiry, audit: &[AuditRecord]) -> Result<Enquiry>;

    /// Open (non-terminal, non-duplicate) enquiries currently assigned to `handler`
    async fn count_open_for_handler(&self, handler: &HandlerId) -> Result<u64>;

    /// Enquiries sitting in `stage`, oldest first
    async fn list_by_stage(&self, stage: Stage, limit: usize) -> Result<Vec<Enquiry>>;
}

/// Read access to assignment rules
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Active rules, highest priority first, ties in creation order
    async fn active_rules_by_priority_desc(&self) -> Result<Vec<AssignmentRule>>;
}

/// Read access to handlers
#[async_trait]
pub trait HandlerDirectory: Send + Sync {
    async fn find_handler(&self, id: &HandlerId) -> Result<Option<Handler>>;
}

/// Shared counters behind the round-robin and load-based strategies
#[async_trait]
pub trait AssignmentLedger: Send + Sync {
    /// Advance the rotation pointer of `rule` and return the slot to use,
    /// in `0..len`. Concurrent callers always observe distinct pointer values.
    async fn next_rotation(&self, rule: &RuleId, len: usize) -> Result<usize>;

    /// Count one assignment to `handler` on `day` unless that would exceed
    /// `cap`. A cap of 0 is unlimited. Returns whether the slot was taken.
    async fn try_reserve_daily(&self, handler: &HandlerId, day: NaiveDate, cap: u32) -> Result<bool>;

    /// Give back a slot taken by `try_reserve_daily`
    async fn release_daily(&self, handler: &HandlerId, day: NaiveDate) -> Result<()>;

    /// Assignments counted for `handler` on `day`
    async fn daily_count(&self, handler: &HandlerId, day: NaiveDate) -> Result<u32>;
}
