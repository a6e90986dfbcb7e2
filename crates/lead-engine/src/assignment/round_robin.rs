//! Rotation over a rule's targets

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::rules::RuleType;

use super::{AssignmentStrategy, Selection, SelectionContext};

/// Picks targets in list order, one step per call, wrapping at the end.
/// The pointer is owned by the ledger, scoped per rule. Slots whose handler
/// cannot take work are stepped over, at most one full turn per call.
#[derive(Debug, Clone, Default)]
pub struct RoundRobinStrategy;

#[async_trait]
impl AssignmentStrategy for RoundRobinStrategy {
    fn rule_type(&self) -> RuleType {
        RuleType::RoundRobin
    }

    async fn select(&self, ctx: &SelectionContext<'_>) -> Result<Option<Selection>> {
        let targets = &ctx.rule.assignment_to;
        if targets.is_empty() {
            return Ok(None);
        }

        for _ in 0..targets.len() {
            let slot = ctx.ledger.next_rotation(&ctx.rule.id, targets.len()).await?;
            let target = &targets[slot];
            if !ctx.can_take_work(&target.handler).await? {
                debug!("Rule {} slot {} holds {}, not an active handler", ctx.rule.id, slot + 1, target.handler);
                continue;
            }
            debug!("🔄 Rule {} rotation slot {}/{} -> {}", ctx.rule.id, slot + 1, targets.len(), target.handler);

            return Ok(Some(Selection::new(
                target.handler.clone(),
                format!("Round robin slot {} of {} under rule {}", slot + 1, targets.len(), ctx.rule.name),
            )));
        }

        Ok(None)
    }
}
