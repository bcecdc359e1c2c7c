use uuid::Uuid;

use super::history::HistoryLedger;
use crate::error::Result;
use crate::model::activity::{UserActivity, merge_timeline};

/// A user's merged item and sprint timeline.
pub trait ActivityService: Send + Sync {
    /// Newest-first timeline truncated to `limit` entries (`<= 0` keeps all).
    fn user_activity(&self, user_id: Uuid, limit: i64) -> Result<UserActivity>;
}

/// Reads both ledgers in full and merges them in memory. Limiting happens
/// only after the merge: each stream's newest N is not the merged newest N.
#[derive(Debug, Clone)]
pub struct ActivityAggregator<L> {
    ledger: L,
}

impl<L: HistoryLedger> ActivityAggregator<L> {
    pub const fn new(ledger: L) -> Self {
        Self { ledger }
    }
}

impl<L: HistoryLedger> ActivityService for ActivityAggregator<L> {
    fn user_activity(&self, user_id: Uuid, limit: i64) -> Result<UserActivity> {
        let item_history = self.ledger.item_history_by_user(user_id, None)?;
        let sprint_history = self.ledger.sprint_history_by_user(user_id, None)?;
        tracing::debug!(
            user_id = %user_id,
            items = item_history.len(),
            sprints = sprint_history.len(),
            limit,
            "merging activity streams"
        );
        Ok(merge_timeline(item_history, sprint_history, limit))
    }
}
