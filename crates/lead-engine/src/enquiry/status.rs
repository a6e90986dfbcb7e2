//! Enquiry statuses, stages and the legal transitions between them

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of an enquiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnquiryStatus {
    /// Profile not yet identified, waiting in the telecaller queue
    #[serde(rename = "Unknown")]
    Unknown,

    /// Identified and ready for routing
    #[serde(rename = "New")]
    New,

    /// A handler is working the enquiry
    #[serde(rename = "In Progress")]
    InProgress,

    /// A quotation has been sent
    #[serde(rename = "Quoted")]
    Quoted,

    /// Closed as won
    #[serde(rename = "Converted")]
    Converted,

    /// Closed as lost
    #[serde(rename = "Rejected")]
    Rejected,

    /// Shelved without an outcome
    #[serde(rename = "Archived")]
    Archived,

    /// Repeat of a recent enquiry; set only at intake
    #[serde(rename = "Duplicate")]
    Duplicate,
}

/// Operational sub-state of an enquiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "Telecaller Queue")]
    TelecallerQueue,
    #[serde(rename = "Captured")]
    Captured,
    #[serde(rename = "Profile Identified")]
    ProfileIdentified,
    #[serde(rename = "Assignment Pending")]
    AssignmentPending,
    #[serde(rename = "Assigned")]
    Assigned,
    #[serde(rename = "Action in Progress")]
    ActionInProgress,
    #[serde(rename = "Quoted")]
    Quoted,
    #[serde(rename = "Closed-Converted")]
    ClosedConverted,
    #[serde(rename = "Closed-Rejected")]
    ClosedRejected,
    #[serde(rename = "Archived")]
    Archived,
    #[serde(rename = "Validation")]
    Validation,
}

impl EnquiryStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [EnquiryStatus; 8] = [
        EnquiryStatus::Unknown,
        EnquiryStatus::New,
        EnquiryStatus::InProgress,
        EnquiryStatus::Quoted,
        EnquiryStatus::Converted,
        EnquiryStatus::Rejected,
        EnquiryStatus::Archived,
        EnquiryStatus::Duplicate,
    ];

    /// Display name
    pub fn as_str(&self) -> &'static str {
        match self {
            EnquiryStatus::Unknown => "Unknown",
            EnquiryStatus::New => "New",
            EnquiryStatus::InProgress => "In Progress",
            EnquiryStatus::Quoted => "Quoted",
            EnquiryStatus::Converted => "Converted",
            EnquiryStatus::Rejected => "Rejected",
            EnquiryStatus::Archived => "Archived",
            EnquiryStatus::Duplicate => "Duplicate",
        }
    }

    /// The stage every enquiry in this status defaults to
    pub fn derived_stage(&self) -> Stage {
        match self {
            EnquiryStatus::Unknown => Stage::TelecallerQueue,
            EnquiryStatus::New => Stage::Captured,
            EnquiryStatus::InProgress => Stage::ActionInProgress,
            EnquiryStatus::Quoted => Stage::Quoted,
            EnquiryStatus::Converted => Stage::ClosedConverted,
            EnquiryStatus::Rejected => Stage::ClosedRejected,
            EnquiryStatus::Archived => Stage::Archived,
            EnquiryStatus::Duplicate => Stage::Validation,
        }
    }

    /// No transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EnquiryStatus::Converted | EnquiryStatus::Rejected | EnquiryStatus::Archived
        )
    }

    /// Counted towards a handler's open load
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            EnquiryStatus::Unknown
                | EnquiryStatus::New
                | EnquiryStatus::InProgress
                | EnquiryStatus::Quoted
        )
    }

    /// Entering this status stamps the closure time
    pub fn sets_closure(&self) -> bool {
        matches!(self, EnquiryStatus::Converted | EnquiryStatus::Rejected)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: EnquiryStatus) -> bool {
        use EnquiryStatus::*;

        if self.is_terminal() || *self == next {
            return false;
        }

        match (self, next) {
            // Duplicate is only ever assigned at intake
            (_, Duplicate) => false,
            (_, Archived) => true,
            (Unknown, New) => true,
            (New, InProgress) => true,
            (InProgress, Quoted) => true,
            (Quoted, Converted) | (Quoted, Rejected) => true,
            _ => false,
        }
    }

    /// Statuses reachable in one step from `self`
    pub fn next_statuses(&self) -> Vec<EnquiryStatus> {
        Self::ALL
            .iter()
            .copied()
            .filter(|next| self.can_transition_to(*next))
            .collect()
    }
}

impl Stage {
    /// Display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::TelecallerQueue => "Telecaller Queue",
            Stage::Captured => "Captured",
            Stage::ProfileIdentified => "Profile Identified",
            Stage::AssignmentPending => "Assignment Pending",
            Stage::Assigned => "Assigned",
            Stage::ActionInProgress => "Action in Progress",
            Stage::Quoted => "Quoted",
            Stage::ClosedConverted => "Closed-Converted",
            Stage::ClosedRejected => "Closed-Rejected",
            Stage::Archived => "Archived",
            Stage::Validation => "Validation",
        }
    }

    /// Parse a stage from its display name
    pub fn parse(s: &str) -> Option<Self> {
        let stage = match s.trim() {
            "Telecaller Queue" => Stage::TelecallerQueue,
            "Captured" => Stage::Captured,
            "Profile Identified" => Stage::ProfileIdentified,
            "Assignment Pending" => Stage::AssignmentPending,
            "Assigned" => Stage::Assigned,
            "Action in Progress" => Stage::ActionInProgress,
            "Quoted" => Stage::Quoted,
            "Closed-Converted" => Stage::ClosedConverted,
            "Closed-Rejected" => Stage::ClosedRejected,
            "Archived" => Stage::Archived,
            "Validation" => Stage::Validation,
            _ => return None,
        };
        Some(stage)
    }
}

impl fmt::Display for EnquiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnquiryStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "unknown" => Ok(EnquiryStatus::Unknown),
            "new" => Ok(EnquiryStatus::New),
            "in progress" | "inprogress" => Ok(EnquiryStatus::InProgress),
            "quoted" => Ok(EnquiryStatus::Quoted),
            "converted" => Ok(EnquiryStatus::Converted),
            "rejected" => Ok(EnquiryStatus::Rejected),
            "archived" => Ok(EnquiryStatus::Archived),
            "duplicate" => Ok(EnquiryStatus::Duplicate),
            _ => Err(format!("Unknown enquiry status: {}", s)),
        }
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unknown stage: {}", s))
    }
}
