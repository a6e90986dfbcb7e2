//! # Enquiry Model
//!
//! Types for inbound leads: identity, contact key, lead-type specific details,
//! lifecycle status and stage, assignment and the append-only remark log.
//!
//! Input arrives as a [`NewEnquiry`], which is validated into [`LeadDetails`]
//! before anything is persisted. B2B and B2C leads carry different required
//! fields, so they are modelled as variants of one enum rather than a bag of
//! optional columns.

pub mod status;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LeadError, Result};
use crate::rules::RuleId;

pub use status::{EnquiryStatus, Stage};

static MOBILE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{10}$").unwrap());
static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Enquiry identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnquiryId(pub Uuid);

impl EnquiryId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EnquiryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EnquiryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EnquiryId {
    type Err = LeadError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| LeadError::validation(format!("Invalid enquiry id: {}", s)))
    }
}

/// Handler (person or desk) an enquiry can be routed to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerId(pub String);

impl HandlerId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HandlerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Enquiry urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

/// Business or consumer lead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeadType {
    #[serde(rename = "B2B")]
    B2b,
    #[serde(rename = "B2C")]
    B2c,
}

impl LeadType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadType::B2b => "B2B",
            LeadType::B2c => "B2C",
        }
    }
}

/// Lead-type specific details; each variant carries exactly the fields its
/// lead type requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "lead_type")]
pub enum LeadDetails {
    #[serde(rename = "B2B")]
    B2b {
        business_model: String,
        company_name: String,
    },
    #[serde(rename = "B2C")]
    B2c {
        capacity: f64,
        category: String,
    },
}

impl LeadDetails {
    pub fn lead_type(&self) -> LeadType {
        match self {
            LeadDetails::B2b { .. } => LeadType::B2b,
            LeadDetails::B2c { .. } => LeadType::B2c,
        }
    }
}

/// Customer profile. `Unknown` means a telecaller has not classified the
/// enquiry yet; every other value makes it routable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileType {
    Unknown,
    Project,
    Dealer,
    Retail,
    Institutional,
}

impl ProfileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileType::Unknown => "Unknown",
            ProfileType::Project => "Project",
            ProfileType::Dealer => "Dealer",
            ProfileType::Retail => "Retail",
            ProfileType::Institutional => "Institutional",
        }
    }

    pub fn is_identified(&self) -> bool {
        !matches!(self, ProfileType::Unknown)
    }
}

impl Default for ProfileType {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for ProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unknown" => Ok(ProfileType::Unknown),
            "project" => Ok(ProfileType::Project),
            "dealer" => Ok(ProfileType::Dealer),
            "retail" => Ok(ProfileType::Retail),
            "institutional" => Ok(ProfileType::Institutional),
            _ => Err(format!("Unknown profile type: {}", s)),
        }
    }
}

/// One entry of the append-only remark log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Remark {
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A lead awaiting classification, routing and follow-up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enquiry {
    pub id: EnquiryId,
    pub name: Option<String>,
    pub mobile: String,
    pub email: Option<String>,
    pub lead: LeadDetails,
    pub profile: ProfileType,
    pub source: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,

    pub status: EnquiryStatus,
    pub stage: Stage,
    pub priority: Priority,

    pub assigned_to: Option<HandlerId>,
    pub assigned_team: Option<String>,
    /// Rule that produced the current assignment, if any
    pub assigned_rule: Option<RuleId>,

    pub is_duplicate: bool,
    pub duplicate_of: Option<EnquiryId>,

    #[serde(default)]
    pub remarks: Vec<Remark>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_call_at: Option<DateTime<Utc>>,
    pub next_follow_up_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,

    /// Optimistic concurrency token, bumped by every committed write
    pub version: u64,
}

impl Enquiry {
    pub fn lead_type(&self) -> LeadType {
        self.lead.lead_type()
    }

    /// Eligible for the rule matcher
    pub fn is_routable(&self) -> bool {
        !self.is_duplicate && self.status == EnquiryStatus::New && self.profile.is_identified()
    }

    /// Counts towards its assignee's open load
    pub fn is_open(&self) -> bool {
        !self.is_duplicate && self.status.is_open()
    }

    /// Append to the remark log
    pub fn push_remark<A: Into<String>, T: Into<String>>(&mut self, author: A, text: T, at: DateTime<Utc>) {
        self.remarks.push(Remark {
            author: author.into(),
            text: text.into(),
            created_at: at,
        });
        self.updated_at = at;
    }
}

/// Intake payload for a new enquiry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewEnquiry {
    pub name: Option<String>,
    pub mobile: String,
    pub email: Option<String>,
    pub lead_type: Option<LeadType>,
    pub business_model: Option<String>,
    pub company_name: Option<String>,
    pub capacity: Option<f64>,
    pub category: Option<String>,
    pub profile: Option<ProfileType>,
    pub source: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub tags: Vec<String>,
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub priority: Option<Priority>,
    /// Opening remark, recorded under `created_by`
    pub remark: Option<String>,
    pub created_by: Option<String>,
}

impl NewEnquiry {
    /// Check contact fields and build the lead-type details
    pub fn validate(&self) -> Result<LeadDetails> {
        let mobile = self.mobile.trim();
        if mobile.is_empty() {
            return Err(LeadError::validation("mobile is required"));
        }
        if !MOBILE_REGEX.is_match(mobile) {
            return Err(LeadError::validation(format!(
                "mobile must be exactly 10 digits: {}",
                mobile
            )));
        }

        if let Some(email) = non_blank(&self.email) {
            if !EMAIL_REGEX.is_match(email) {
                return Err(LeadError::validation(format!("invalid email: {}", email)));
            }
        }

        let lead_type = self
            .lead_type
            .ok_or_else(|| LeadError::validation("lead_type is required"))?;

        match lead_type {
            LeadType::B2b => {
                let business_model = non_blank(&self.business_model)
                    .ok_or_else(|| LeadError::validation("business_model is required for B2B leads"))?;
                let company_name = non_blank(&self.company_name)
                    .ok_or_else(|| LeadError::validation("company_name is required for B2B leads"))?;
                Ok(LeadDetails::B2b {
                    business_model: business_model.to_string(),
                    company_name: company_name.to_string(),
                })
            }
            LeadType::B2c => {
                let capacity = self
                    .capacity
                    .ok_or_else(|| LeadError::validation("capacity is required for B2C leads"))?;
                if !capacity.is_finite() || capacity <= 0.0 {
                    return Err(LeadError::validation("capacity must be a positive number"));
                }
                let category = non_blank(&self.category)
                    .ok_or_else(|| LeadError::validation("category is required for B2C leads"))?;
                Ok(LeadDetails::B2c {
                    capacity,
                    category: category.to_string(),
                })
            }
        }
    }

    /// Normalised mobile number used as the duplicate key
    pub fn mobile_key(&self) -> String {
        self.mobile.trim().to_string()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    /// Routable B2C enquiry with no assignee
    pub(crate) fn enquiry() -> Enquiry {
        let now = Utc::now();
        Enquiry {
            id: EnquiryId::new(),
            name: Some("Ravi Kumar".to_string()),
            mobile: "9876543210".to_string(),
            email: None,
            lead: LeadDetails::B2c {
                capacity: 5.0,
                category: "Residential".to_string(),
            },
            profile: ProfileType::Retail,
            source: Some("website".to_string()),
            city: Some("Pune".to_string()),
            state: Some("Maharashtra".to_string()),
            tags: Vec::new(),
            attributes: BTreeMap::new(),
            status: EnquiryStatus::New,
            stage: Stage::Captured,
            priority: Priority::High,
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
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b2c_input() -> NewEnquiry {
        NewEnquiry {
            mobile: "9876543210".to_string(),
            lead_type: Some(LeadType::B2c),
            capacity: Some(5.0),
            category: Some("Residential".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_b2c_input() {
        let details = b2c_input().validate().unwrap();
        assert_eq!(details.lead_type(), LeadType::B2c);
    }

    #[test]
    fn test_mobile_must_have_ten_digits() {
        let mut input = b2c_input();
        input.mobile = "98765".to_string();
        assert!(matches!(input.validate(), Err(LeadError::Validation(_))));

        input.mobile = "98765abcde".to_string();
        assert!(matches!(input.validate(), Err(LeadError::Validation(_))));

        input.mobile = String::new();
        assert!(matches!(input.validate(), Err(LeadError::Validation(_))));
    }

    #[test]
    fn test_b2b_requires_company_fields() {
        let input = NewEnquiry {
            mobile: "9876543210".to_string(),
            lead_type: Some(LeadType::B2b),
            business_model: Some("EPC".to_string()),
            ..Default::default()
        };
        let err = input.validate().unwrap_err();
        assert!(err.to_string().contains("company_name"));
    }

    #[test]
    fn test_b2c_rejects_non_positive_capacity() {
        let mut input = b2c_input();
        input.capacity = Some(0.0);
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_invalid_email_rejected() {
        let mut input = b2c_input();
        input.email = Some("not-an-email".to_string());
        assert!(input.validate().is_err());

        input.email = Some("   ".to_string());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_lead_details_tagging() {
        let details = LeadDetails::B2b {
            business_model: "Distributor".to_string(),
            company_name: "Acme".to_string(),
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["lead_type"], "B2B");
        assert_eq!(json["company_name"], "Acme");
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!("project".parse::<ProfileType>().unwrap(), ProfileType::Project);
        assert!(!ProfileType::Unknown.is_identified());
        assert!(ProfileType::Dealer.is_identified());
        assert!("vendor".parse::<ProfileType>().is_err());
    }
}
