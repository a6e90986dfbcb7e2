//! # Leadroute Engine
//!
//! Assignment and lifecycle engine for inbound enquiries (leads). Enquiries
//! arrive from many channels, are checked for duplicates, classified, routed
//! to exactly one handler by priority-ordered rules and then tracked through a
//! closed set of statuses until they close.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         LeadEngine                           │
//! │  create_enquiry · change_status · identify_profile · ...     │
//! └───────┬───────────────┬──────────────────┬───────────────────┘
//!         │               │                  │
//! ┌───────▼──────┐ ┌──────▼────────┐ ┌───────▼─────────────────┐
//! │  Duplicate   │ │  Lifecycle    │ │  Assigner               │
//! │  Detector    │ │  StateMachine │ │  RuleMatcher → Strategy │
//! └───────┬──────┘ └──────┬────────┘ └───────┬─────────────────┘
//!         │               │                  │
//! ┌───────▼───────────────▼──────────────────▼───────────────────┐
//! │  Collaborators: EnquiryRepository · RuleRepository ·         │
//! │  HandlerDirectory · AssignmentLedger · AuditSink ·           │
//! │  NotificationSender                                          │
//! └──────────────────────────────────────────────────────────────┘
//!         │                                   │
//!   MemoryStore                         LeadDatabase (SQLite)
//! ```
//!
//! ## Guarantees
//!
//! - Duplicates (same mobile inside the window) are stored but never routed
//! - The highest-priority matching rule always wins; ties go to the older rule
//! - Round-robin is a true rotation and load-based selection never exceeds a
//!   handler's daily cap, even under concurrent intake
//! - A status change and its audit record commit together or not at all
//! - Notification failures are logged and never undo an assignment
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use leadroute_engine::prelude::*;
//!
//! # async fn example() -> leadroute_engine::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! store.upsert_handler(Handler::new("asha", "Asha").with_team("west"));
//! store.upsert_rule(
//!     AssignmentRule::new("retail", "Retail leads", RuleType::RoundRobin, 10)
//!         .with_condition(Condition::new("profile", Operator::Equals, serde_json::json!("Retail")))
//!         .with_target(AssignmentTarget::new("asha")),
//! )?;
//!
//! let engine = LeadEngine::new(EngineConfig::default(), Collaborators::memory(store))?;
//! let enquiry = engine
//!     .create_enquiry(NewEnquiry {
//!         mobile: "9876543210".to_string(),
//!         lead_type: Some(LeadType::B2c),
//!         capacity: Some(5.0),
//!         category: Some("Residential".to_string()),
//!         profile: Some(ProfileType::Retail),
//!         ..Default::default()
//!     })
//!     .await?;
//! assert_eq!(enquiry.stage, Stage::Assigned);
//! # Ok(())
//! # }
//! ```

pub mod assignment;
pub mod audit;
pub mod clock;
pub mod config;
pub mod database;
pub mod duplicate;
pub mod engine;
pub mod enquiry;
pub mod error;
pub mod lifecycle;
pub mod notify;
pub mod repository;
pub mod rules;

pub use config::EngineConfig;
pub use engine::{Collaborators, LeadEngine};
pub use error::{LeadError, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::assignment::{AssignmentOutcome, AssignmentStrategy, StrategyRegistry};
    pub use crate::audit::{AuditKind, AuditRecord, AuditSink, MemoryAuditLog};
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::EngineConfig;
    pub use crate::database::LeadDatabase;
    pub use crate::engine::{Collaborators, LeadEngine};
    pub use crate::enquiry::{
        Enquiry, EnquiryId, EnquiryStatus, HandlerId, LeadDetails, LeadType, NewEnquiry, Priority, ProfileType,
        Stage,
    };
    pub use crate::error::{LeadError, Result};
    pub use crate::notify::{ChannelNotifier, Notification, NotificationSender, TracingNotifier};
    pub use crate::repository::{
        AssignmentLedger, EnquiryRepository, Handler, HandlerDirectory, MemoryStore, RuleRepository,
    };
    pub use crate::rules::{AssignmentRule, AssignmentTarget, Condition, Operator, RuleId, RuleType};
}
