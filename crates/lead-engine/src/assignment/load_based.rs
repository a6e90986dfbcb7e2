//! Weighted least-load selection with daily caps

use std::cmp::Ordering;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::rules::{AssignmentTarget, RuleType};

use super::{AssignmentStrategy, Selection, SelectionContext};

/// Picks the target with the lowest `open / weight`, skipping anyone who is
/// inactive, unknown to the directory or already at their daily cap.
///
/// Candidates are tried in load order and each try is an atomic
/// reserve-if-under-cap on the ledger, so two concurrent callers can never
/// both take the last slot of the same handler.
#[derive(Debug, Clone, Default)]
pub struct LoadBasedStrategy;

struct Candidate<'a> {
    position: usize,
    load: f64,
    target: &'a AssignmentTarget,
}

#[async_trait]
impl AssignmentStrategy for LoadBasedStrategy {
    fn rule_type(&self) -> RuleType {
        RuleType::LoadBased
    }

    async fn select(&self, ctx: &SelectionContext<'_>) -> Result<Option<Selection>> {
        let mut candidates = Vec::with_capacity(ctx.rule.assignment_to.len());
        for (position, target) in ctx.rule.assignment_to.iter().enumerate() {
            // An idle inactive handler would otherwise always have the lowest load
            if !ctx.can_take_work(&target.handler).await? {
                debug!("Skipping {} under rule {}: not an active handler", target.handler, ctx.rule.id);
                continue;
            }
            let open = ctx.enquiries.count_open_for_handler(&target.handler).await?;
            candidates.push(Candidate {
                position,
                load: open as f64 / f64::from(target.weight.max(1)),
                target,
            });
        }

        // Stable on equal loads: first listed wins
        candidates.sort_by(|a, b| {
            a.load
                .partial_cmp(&b.load)
                .unwrap_or(Ordering::Equal)
                .then(a.position.cmp(&b.position))
        });

        for candidate in candidates {
            let target = candidate.target;
            if ctx
                .ledger
                .try_reserve_daily(&target.handler, ctx.day, target.max_daily_assignments)
                .await?
            {
                debug!(
                    "⚖️ Rule {} picked {} (weighted load {:.2})",
                    ctx.rule.id, target.handler, candidate.load
                );
                let selection = Selection::new(
                    target.handler.clone(),
                    format!(
                        "Least weighted load ({:.2}) under rule {}",
                        candidate.load, ctx.rule.name
                    ),
                )
                .with_reservation(ctx.day);
                return Ok(Some(selection));
            }
            debug!(
                "Handler {} reached its daily cap of {} on {}",
                target.handler, target.max_daily_assignments, ctx.day
            );
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enquiry::{tests_support, HandlerId};
    use crate::repository::{AssignmentLedger, EnquiryRepository, Handler, MemoryStore};
    use crate::rules::AssignmentRule;
    use chrono::{NaiveDate, Utc};

    async fn open_for(store: &MemoryStore, handler: &str, n: usize) {
        for _ in 0..n {
            let mut enquiry = tests_support::enquiry();
            enquiry.assigned_to = Some(HandlerId::new(handler));
            store.insert(&enquiry, &[]).await.unwrap();
        }
    }

    fn store_with(handlers: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        for id in handlers {
            store.upsert_handler(Handler::new(*id, *id));
        }
        store
    }

    async fn pick(store: &MemoryStore, rule: &AssignmentRule, day: NaiveDate) -> Option<HandlerId> {
        let enquiry = tests_support::enquiry();
        let ctx = SelectionContext {
            rule,
            enquiry: &enquiry,
            day,
            enquiries: store,
            ledger: store,
            handlers: store,
        };
        LoadBasedStrategy.select(&ctx).await.unwrap().map(|s| s.handler)
    }

    #[tokio::test]
    async fn test_weighted_load_decides() {
        let store = store_with(&["a", "b"]);
        open_for(&store, "a", 4).await;
        open_for(&store, "b", 3).await;

        // a: 4/2 = 2.0, b: 3/1 = 3.0
        let rule = AssignmentRule::new("lb", "lb", RuleType::LoadBased, 1)
            .with_target(AssignmentTarget::new("b"))
            .with_target(AssignmentTarget::new("a").with_weight(2));

        let day = Utc::now().date_naive();
        assert_eq!(pick(&store, &rule, day).await, Some(HandlerId::new("a")));
    }

    #[tokio::test]
    async fn test_ties_go_to_first_listed() {
        let store = store_with(&["first", "second"]);
        let rule = AssignmentRule::new("lb", "lb", RuleType::LoadBased, 1)
            .with_target(AssignmentTarget::new("second"))
            .with_target(AssignmentTarget::new("first"));

        let day = Utc::now().date_naive();
        assert_eq!(pick(&store, &rule, day).await, Some(HandlerId::new("second")));
    }

    #[tokio::test]
    async fn test_capped_candidates_excluded() {
        let store = store_with(&["a", "b"]);
        open_for(&store, "b", 10).await;
        let rule = AssignmentRule::new("lb", "lb", RuleType::LoadBased, 1)
            .with_target(AssignmentTarget::new("a").with_daily_cap(1))
            .with_target(AssignmentTarget::new("b").with_daily_cap(1));

        let day = Utc::now().date_naive();
        assert_eq!(pick(&store, &rule, day).await, Some(HandlerId::new("a")));
        assert_eq!(pick(&store, &rule, day).await, Some(HandlerId::new("b")));
        assert_eq!(pick(&store, &rule, day).await, None);

        // A new day resets the caps
        let tomorrow = day.succ_opt().unwrap();
        assert_eq!(pick(&store, &rule, tomorrow).await, Some(HandlerId::new("a")));
        assert_eq!(store.daily_count(&HandlerId::new("a"), day).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_idle_inactive_handler_is_not_a_candidate() {
        let store = store_with(&["here"]);
        store.upsert_handler(Handler::new("away", "Away").inactive());
        open_for(&store, "here", 5).await;
        let rule = AssignmentRule::new("lb", "lb", RuleType::LoadBased, 1)
            .with_target(AssignmentTarget::new("away"))
            .with_target(AssignmentTarget::new("ghost"))
            .with_target(AssignmentTarget::new("here"));

        let day = Utc::now().date_naive();
        for _ in 0..10 {
            assert_eq!(pick(&store, &rule, day).await, Some(HandlerId::new("here")));
        }
        assert_eq!(store.daily_count(&HandlerId::new("away"), day).await.unwrap(), 0);
        assert_eq!(store.daily_count(&HandlerId::new("ghost"), day).await.unwrap(), 0);
    }
}
