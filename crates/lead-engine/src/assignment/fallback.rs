//! Fixed fallback handler

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::rules::RuleType;

use super::{AssignmentStrategy, Selection, SelectionContext};

#[derive(Debug, Clone, Default)]
pub struct FallbackStrategy;

#[async_trait]
impl AssignmentStrategy for FallbackStrategy {
    fn rule_type(&self) -> RuleType {
        RuleType::Fallback
    }

    async fn select(&self, ctx: &SelectionContext<'_>) -> Result<Option<Selection>> {
        let Some(handler) = ctx.rule.fallback_handler.as_ref() else {
            return Ok(None);
        };
        if !ctx.can_take_work(handler).await? {
            debug!("Fallback handler {} of rule {} cannot take work", handler, ctx.rule.id);
            return Ok(None);
        }
        Ok(Some(Selection::new(
            handler.clone(),
            format!("Fallback handler of rule {}", ctx.rule.name),
        )))
    }
}
