//! Manual routing: leave the enquiry for a person to assign

use async_trait::async_trait;

use crate::error::Result;
use crate::rules::RuleType;

use super::{AssignmentStrategy, Selection, SelectionContext};

#[derive(Debug, Clone, Default)]
pub struct ManualStrategy;

#[async_trait]
impl AssignmentStrategy for ManualStrategy {
    fn rule_type(&self) -> RuleType {
        RuleType::Manual
    }

    async fn select(&self, _ctx: &SelectionContext<'_>) -> Result<Option<Selection>> {
        Ok(None)
    }
}
