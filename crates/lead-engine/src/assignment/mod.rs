//! # Assignment Strategies
//!
//! Once the [`RuleMatcher`](crate::rules::RuleMatcher) has picked a rule, the
//! rule's [`RuleType`] decides which strategy chooses the handler.
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌────────────────────────────┐
//! │   Enquiry    │───►│ RuleMatcher  │───►│ StrategyRegistry[rule_type]│
//! └──────────────┘    └──────┬───────┘    └─────────────┬──────────────┘
//!                            │ no match                 │
//!                            ▼                ┌─────────┼─────────┬─────────┐
//!                   Assignment Pending        ▼         ▼         ▼         ▼
//!                                        RoundRobin LoadBased Fallback   Manual
//!                                             │         │         │         │
//!                                             └────┬────┴────┬────┘         │
//!                                                  ▼         ▼              ▼
//!                                              Assigned   Assignment Pending
//! ```
//!
//! ## Strategies
//!
//! ### **Round Robin**
//! - Rotates over the rule's targets using a per-rule pointer
//! - Pointer lives in the [`AssignmentLedger`], so it survives across calls
//!   and concurrent callers never observe the same slot
//! - Slots holding an inactive or unknown handler are stepped over
//!
//! ### **Load Based**
//! - Weighted load is `open enquiries / weight`, lowest wins
//! - Ties go to the target listed first
//! - Inactive or unknown handlers are never candidates
//! - Targets at their daily cap are skipped; the cap check and the count
//!   increment are one ledger operation
//!
//! ### **Fallback**
//! - Always the rule's `fallback_handler`, when one is set and active
//!
//! ### **Manual**
//! - Never picks anyone; a person assigns the enquiry later
//!
//! ## Failure Handling
//!
//! [`Assigner::attempt`] never fails. Repository, ledger or directory errors
//! are logged and resolved to [`AssignmentOutcome::Pending`].

pub mod fallback;
pub mod load_based;
pub mod manual;
pub mod round_robin;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, error, info, warn};

use crate::enquiry::{Enquiry, HandlerId, Stage};
use crate::error::Result;
use crate::repository::{AssignmentLedger, EnquiryRepository, Handler, HandlerDirectory, RuleRepository};
use crate::rules::{AssignmentRule, RuleId, RuleMatcher, RuleType};

pub use fallback::FallbackStrategy;
pub use load_based::LoadBasedStrategy;
pub use manual::ManualStrategy;
pub use round_robin::RoundRobinStrategy;

/// Everything a strategy may consult while choosing a handler
pub struct SelectionContext<'a> {
    pub rule: &'a AssignmentRule,
    pub enquiry: &'a Enquiry,
    /// Local calendar day daily caps are counted against
    pub day: NaiveDate,
    pub enquiries: &'a dyn EnquiryRepository,
    pub ledger: &'a dyn AssignmentLedger,
    pub handlers: &'a dyn HandlerDirectory,
}

impl SelectionContext<'_> {
    /// Whether `handler` exists in the directory and may take new work
    pub async fn can_take_work(&self, handler: &HandlerId) -> Result<bool> {
        Ok(self
            .handlers
            .find_handler(handler)
            .await?
            .is_some_and(|h| h.is_active))
    }
}

/// Daily slot held for a selection until the enquiry write commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub handler: HandlerId,
    pub day: NaiveDate,
}

/// A strategy's choice
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub handler: HandlerId,
    pub reservation: Option<Reservation>,
    /// Human-readable explanation for the audit trail
    pub reason: String,
}

impl Selection {
    pub fn new<R: Into<String>>(handler: HandlerId, reason: R) -> Self {
        Self {
            handler,
            reservation: None,
            reason: reason.into(),
        }
    }

    pub fn with_reservation(mut self, day: NaiveDate) -> Self {
        self.reservation = Some(Reservation {
            handler: self.handler.clone(),
            day,
        });
        self
    }
}

/// Picks one handler from a matched rule, or none
#[async_trait]
pub trait AssignmentStrategy: Send + Sync {
    fn rule_type(&self) -> RuleType;

    /// `Ok(None)` means no eligible handler, which is a normal outcome
    async fn select(&self, ctx: &SelectionContext<'_>) -> Result<Option<Selection>>;
}

/// Static mapping from [`RuleType`] to its strategy
#[derive(Debug, Default)]
pub struct StrategyRegistry {
    round_robin: RoundRobinStrategy,
    load_based: LoadBasedStrategy,
    fallback: FallbackStrategy,
    manual: ManualStrategy,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_rule(&self, rule_type: RuleType) -> &dyn AssignmentStrategy {
        match rule_type {
            RuleType::RoundRobin => &self.round_robin,
            RuleType::LoadBased => &self.load_based,
            RuleType::Fallback => &self.fallback,
            RuleType::Manual => &self.manual,
        }
    }
}

/// Result of one pass through the assignment pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentOutcome {
    Assigned {
        handler: Handler,
        rule: RuleId,
        reservation: Option<Reservation>,
        reason: String,
    },
    Pending {
        rule: Option<RuleId>,
        reason: String,
    },
}

impl AssignmentOutcome {
    fn pending<R: Into<String>>(rule: Option<RuleId>, reason: R) -> Self {
        AssignmentOutcome::Pending {
            rule,
            reason: reason.into(),
        }
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self, AssignmentOutcome::Assigned { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            AssignmentOutcome::Assigned { reason, .. } | AssignmentOutcome::Pending { reason, .. } => reason,
        }
    }

    pub fn reservation(&self) -> Option<&Reservation> {
        match self {
            AssignmentOutcome::Assigned { reservation, .. } => reservation.as_ref(),
            AssignmentOutcome::Pending { .. } => None,
        }
    }

    /// Write the outcome onto the enquiry. A pending outcome only moves the
    /// stage; any existing assignee is left as it was.
    pub fn apply(&self, enquiry: &mut Enquiry, at: DateTime<Utc>) {
        match self {
            AssignmentOutcome::Assigned { handler, rule, .. } => {
                enquiry.assigned_to = Some(handler.id.clone());
                enquiry.assigned_team = handler.team.clone();
                enquiry.assigned_rule = Some(rule.clone());
                enquiry.stage = Stage::Assigned;
            }
            AssignmentOutcome::Pending { .. } => {
                enquiry.stage = Stage::AssignmentPending;
            }
        }
        enquiry.updated_at = at;
    }
}

/// Runs matcher, strategy and directory lookup for one enquiry
pub struct Assigner {
    enquiries: Arc<dyn EnquiryRepository>,
    rules: Arc<dyn RuleRepository>,
    handlers: Arc<dyn HandlerDirectory>,
    ledger: Arc<dyn AssignmentLedger>,
    matcher: RuleMatcher,
    strategies: StrategyRegistry,
}

impl Assigner {
    pub fn new(
        enquiries: Arc<dyn EnquiryRepository>,
        rules: Arc<dyn RuleRepository>,
        handlers: Arc<dyn HandlerDirectory>,
        ledger: Arc<dyn AssignmentLedger>,
    ) -> Self {
        Self {
            enquiries,
            rules,
            handlers,
            ledger,
            matcher: RuleMatcher::new(),
            strategies: StrategyRegistry::new(),
        }
    }

    /// One assignment attempt. Infrastructure failures resolve to `Pending`.
    pub async fn attempt(&self, enquiry: &Enquiry, day: NaiveDate) -> AssignmentOutcome {
        if !enquiry.is_routable() {
            return AssignmentOutcome::pending(
                None,
                format!("Enquiry is not routable ({}, profile {})", enquiry.status, enquiry.profile),
            );
        }

        match self.try_attempt(enquiry, day).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_infrastructure() => {
                error!("❌ Assignment of enquiry {} hit a store failure, leaving it pending: {}", enquiry.id, e);
                AssignmentOutcome::pending(None, format!("Assignment failed: {}", e))
            }
            Err(e) => {
                warn!("⚠️ Assignment of enquiry {} failed, leaving it pending: {}", enquiry.id, e);
                AssignmentOutcome::pending(None, format!("Assignment failed: {}", e))
            }
        }
    }

    async fn try_attempt(&self, enquiry: &Enquiry, day: NaiveDate) -> Result<AssignmentOutcome> {
        let rules = self.rules.active_rules_by_priority_desc().await?;
        let Some(rule) = self.matcher.find_match(enquiry, &rules) else {
            info!("📋 No rule matched enquiry {}, assignment pending", enquiry.id);
            return Ok(AssignmentOutcome::pending(None, "No assignment rule matched"));
        };

        let strategy = self.strategies.for_rule(rule.rule_type);
        debug!("Rule {} matched enquiry {}, using {} strategy", rule.id, enquiry.id, strategy.rule_type());
        let ctx = SelectionContext {
            rule,
            enquiry,
            day,
            enquiries: self.enquiries.as_ref(),
            ledger: self.ledger.as_ref(),
            handlers: self.handlers.as_ref(),
        };

        let Some(selection) = strategy.select(&ctx).await? else {
            info!(
                "📋 Rule {} ({}) found no eligible handler for enquiry {}",
                rule.id, rule.rule_type, enquiry.id
            );
            return Ok(AssignmentOutcome::pending(
                Some(rule.id.clone()),
                format!("No eligible handler under rule {} ({})", rule.name, rule.rule_type),
            ));
        };

        // The directory may have changed since the strategy looked
        let handler = match self.handlers.find_handler(&selection.handler).await {
            Ok(Some(handler)) if handler.is_active => handler,
            Ok(found) => {
                self.release(selection.reservation.as_ref()).await;
                let why = if found.is_some() { "inactive" } else { "unknown" };
                warn!(
                    "⚠️ Rule {} selected {} handler {} for enquiry {}",
                    rule.id, why, selection.handler, enquiry.id
                );
                return Ok(AssignmentOutcome::pending(
                    Some(rule.id.clone()),
                    format!("Selected handler {} is {}", selection.handler, why),
                ));
            }
            Err(e) => {
                self.release(selection.reservation.as_ref()).await;
                return Err(e);
            }
        };

        info!(
            "✅ Enquiry {} assigned to {} by rule {} ({})",
            enquiry.id, handler.id, rule.id, rule.rule_type
        );

        Ok(AssignmentOutcome::Assigned {
            handler,
            rule: rule.id.clone(),
            reservation: selection.reservation,
            reason: selection.reason,
        })
    }

    /// Hand back a daily slot whose enquiry write did not commit
    pub async fn release(&self, reservation: Option<&Reservation>) {
        let Some(reservation) = reservation else {
            return;
        };
        if let Err(e) = self.ledger.release_daily(&reservation.handler, reservation.day).await {
            warn!(
                "⚠️ Failed to release daily slot of {} on {}: {}",
                reservation.handler, reservation.day, e
            );
        } else {
            debug!("Released daily slot of {} on {}", reservation.handler, reservation.day);
        }
    }
}
