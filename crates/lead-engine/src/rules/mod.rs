//! # Assignment Rules
//!
//! An [`AssignmentRule`] is a priority-ordered condition set plus the
//! routing strategy used to pick a handler once the conditions hold.
//!
//! ```text
//! Enquiry ──► RuleMatcher ──► first matching rule (priority desc, stable)
//!                 │
//!                 └─ conditions: field / operator / value, all must hold
//! ```
//!
//! Rules are administered elsewhere; the engine only reads a snapshot of the
//! active set for each enquiry it routes.

pub mod condition;
pub mod matcher;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enquiry::HandlerId;
use crate::error::{LeadError, Result};

pub use condition::{evaluate_condition, evaluate_conditions, resolve_field, FieldValue};
pub use matcher::RuleMatcher;

/// Rule identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub String);

impl RuleId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strategy a rule routes with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    RoundRobin,
    LoadBased,
    Manual,
    Fallback,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::RoundRobin => "round_robin",
            RuleType::LoadBased => "load_based",
            RuleType::Manual => "manual",
            RuleType::Fallback => "fallback",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison applied by a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    In,
    NotIn,
    /// Anything the engine does not recognise; never matches
    #[serde(other)]
    Unsupported,
}

/// One `{field, operator, value}` test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: serde_json::Value,
}

impl Condition {
    pub fn new<F: Into<String>>(field: F, operator: Operator, value: serde_json::Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

/// Candidate handler of a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentTarget {
    pub handler: HandlerId,
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Daily cap; 0 means unlimited
    #[serde(default)]
    pub max_daily_assignments: u32,
}

fn default_weight() -> u32 {
    1
}

fn default_active() -> bool {
    true
}

impl AssignmentTarget {
    pub fn new<H: Into<HandlerId>>(handler: H) -> Self {
        Self {
            handler: handler.into(),
            weight: 1,
            max_daily_assignments: 0,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_daily_cap(mut self, cap: u32) -> Self {
        self.max_daily_assignments = cap;
        self
    }
}

/// Priority-ordered routing rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRule {
    pub id: RuleId,
    pub name: String,
    /// Higher values are evaluated first
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub rule_type: RuleType,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub assignment_to: Vec<AssignmentTarget>,
    /// Only consulted by fallback rules
    pub fallback_handler: Option<HandlerId>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl AssignmentRule {
    /// Create an active rule with no conditions and no targets
    pub fn new<I: Into<String>, N: Into<String>>(id: I, name: N, rule_type: RuleType, priority: i32) -> Self {
        Self {
            id: RuleId::new(id),
            name: name.into(),
            priority,
            is_active: true,
            rule_type,
            conditions: Vec::new(),
            assignment_to: Vec::new(),
            fallback_handler: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_target(mut self, target: AssignmentTarget) -> Self {
        self.assignment_to.push(target);
        self
    }

    pub fn with_fallback<H: Into<HandlerId>>(mut self, handler: H) -> Self {
        self.fallback_handler = Some(handler.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Check the invariants administration must uphold before storing a rule
    pub fn validate(&self) -> Result<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(LeadError::validation("rule id cannot be empty"));
        }

        for target in &self.assignment_to {
            if target.handler.as_str().trim().is_empty() {
                return Err(LeadError::validation(format!(
                    "rule {} has a target without a handler",
                    self.id
                )));
            }
            if target.weight == 0 {
                return Err(LeadError::validation(format!(
                    "rule {} target {} must have weight >= 1",
                    self.id, target.handler
                )));
            }
        }

        for condition in &self.conditions {
            if condition.field.trim().is_empty() {
                return Err(LeadError::validation(format!(
                    "rule {} has a condition without a field",
                    self.id
                )));
            }
        }

        Ok(())
    }
}
