//! Rule selection

use std::cmp::Ordering;

use tracing::debug;

use crate::enquiry::Enquiry;

use super::condition::evaluate_conditions;
use super::AssignmentRule;

/// Picks the single highest-priority active rule whose conditions all hold
#[derive(Debug, Clone, Default)]
pub struct RuleMatcher;

impl RuleMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Order rules for evaluation: priority descending, then creation time
    /// ascending. The sort is stable, so rules that tie on both keep the
    /// order the repository returned them in.
    pub fn order<'a>(&self, rules: &'a [AssignmentRule]) -> Vec<&'a AssignmentRule> {
        let mut ordered: Vec<&AssignmentRule> = rules.iter().filter(|rule| rule.is_active).collect();
        ordered.sort_by(|a, b| match b.priority.cmp(&a.priority) {
            Ordering::Equal => a.created_at.cmp(&b.created_at),
            other => other,
        });
        ordered
    }

    /// First matching rule, or `None` when nothing applies
    pub fn find_match<'a>(&self, enquiry: &Enquiry, rules: &'a [AssignmentRule]) -> Option<&'a AssignmentRule> {
        let matched = self
            .order(rules)
            .into_iter()
            .find(|rule| evaluate_conditions(&rule.conditions, enquiry));

        match matched {
            Some(rule) => debug!(
                "Enquiry {} matched rule {} ({}, priority {})",
                enquiry.id, rule.id, rule.rule_type, rule.priority
            ),
            None => debug!("Enquiry {} matched none of {} rules", enquiry.id, rules.len()),
        }

        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enquiry::{tests_support, LeadDetails, ProfileType};
    use crate::rules::{Condition, Operator, RuleType};
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn enquiry(city: &str) -> Enquiry {
        let mut enquiry = tests_support::enquiry();
        enquiry.lead = LeadDetails::B2b {
            business_model: "EPC".to_string(),
            company_name: "Sunrise Infra".to_string(),
        };
        enquiry.profile = ProfileType::Project;
        enquiry.city = Some(city.to_string());
        enquiry
    }

    #[test]
    fn test_highest_priority_wins() {
        let rules = vec![
            AssignmentRule::new("low", "catch-all", RuleType::RoundRobin, 5),
            AssignmentRule::new("high", "b2b", RuleType::LoadBased, 10)
                .with_condition(Condition::new("lead_type", Operator::Equals, json!("B2B"))),
        ];

        let matcher = RuleMatcher::new();
        for _ in 0..20 {
            let rule = matcher.find_match(&enquiry("Pune"), &rules).unwrap();
            assert_eq!(rule.id.as_str(), "high");
        }
    }

    #[test]
    fn test_ties_broken_by_creation_order() {
        let base = Utc::now();
        let rules = vec![
            AssignmentRule::new("second", "b", RuleType::Manual, 7).with_created_at(base + Duration::seconds(5)),
            AssignmentRule::new("first", "a", RuleType::Manual, 7).with_created_at(base),
        ];

        let rule = RuleMatcher::new().find_match(&enquiry("Pune"), &rules).unwrap();
        assert_eq!(rule.id.as_str(), "first");
    }

    #[test]
    fn test_inactive_and_non_matching_rules_skipped() {
        let rules = vec![
            AssignmentRule::new("inactive", "x", RuleType::Fallback, 100).inactive(),
            AssignmentRule::new("mumbai", "y", RuleType::Fallback, 50)
                .with_condition(Condition::new("city", Operator::Equals, json!("Mumbai"))),
        ];

        assert!(RuleMatcher::new().find_match(&enquiry("Pune"), &rules).is_none());
        assert_eq!(
            RuleMatcher::new().find_match(&enquiry("Mumbai"), &rules).unwrap().id.as_str(),
            "mumbai"
        );
    }
}
