use uuid::Uuid;

use crate::db::{Database, history};
use crate::error::Result;
use crate::model::history::{ItemHistory, NewItemHistory, NewSprintHistory, SprintHistory};

/// Append and query access to both ledgers.
///
/// Services that change state write their ledger rows inside their own
/// transaction. This trait is the standalone entry point: readers such as
/// the activity aggregator query through it, and `record_*` appends a row in
/// a transaction of its own for collaborators with no state change to pair it
/// with.
pub trait HistoryLedger: Send + Sync {
    fn record_item(&self, entry: &NewItemHistory) -> Result<Uuid>;
    fn record_sprint(&self, entry: &NewSprintHistory) -> Result<Uuid>;

    /// All entries for one item, newest first.
    fn item_history(&self, item_id: Uuid) -> Result<Vec<ItemHistory>>;
    /// All entries for one sprint, newest first.
    fn sprint_history(&self, sprint_id: Uuid) -> Result<Vec<SprintHistory>>;

    /// Item-ledger entries by one user, newest first; `None` means no limit.
    fn item_history_by_user(&self, user_id: Uuid, limit: Option<u32>)
    -> Result<Vec<ItemHistory>>;
    /// Sprint-ledger entries by one user, newest first; `None` means no limit.
    fn sprint_history_by_user(
        &self,
        user_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<SprintHistory>>;
}

#[derive(Debug, Clone)]
pub struct SqliteHistoryLedger {
    db: Database,
}

impl SqliteHistoryLedger {
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }
}

impl HistoryLedger for SqliteHistoryLedger {
    fn record_item(&self, entry: &NewItemHistory) -> Result<Uuid> {
        self.db.write(|tx| history::append_item(tx, entry))
    }

    fn record_sprint(&self, entry: &NewSprintHistory) -> Result<Uuid> {
        self.db.write(|tx| history::append_sprint(tx, entry))
    }

    fn item_history(&self, item_id: Uuid) -> Result<Vec<ItemHistory>> {
        self.db.read(|conn| history::by_item(conn, item_id))
    }

    fn sprint_history(&self, sprint_id: Uuid) -> Result<Vec<SprintHistory>> {
        self.db.read(|conn| history::by_sprint(conn, sprint_id))
    }

    fn item_history_by_user(
        &self,
        user_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<ItemHistory>> {
        self.db
            .read(|conn| history::item_by_user(conn, user_id, limit))
    }

    fn sprint_history_by_user(
        &self,
        user_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<SprintHistory>> {
        self.db
            .read(|conn| history::sprint_by_user(conn, user_id, limit))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::history::{ItemAction, SprintAction};
    use crate::service::sprint::SprintService;
    use crate::service::testing::{Fixture, sprint_input};

    #[test]
    fn recorded_item_entry_reads_back_enriched() {
        let fx = Fixture::new();
        let item = fx.item("Search", Some(2));

        let id = fx
            .ledger
            .record_item(
                &NewItemHistory::new(item, fx.user, ItemAction::CommentAdded)
                    .comment("imported from the old tracker"),
            )
            .expect("record");

        let log = fx.ledger.item_history(item).expect("history");
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].id, id);
        assert_eq!(log[0].action, ItemAction::CommentAdded);
        assert_eq!(log[0].comment.as_deref(), Some("imported from the old tracker"));
        assert_eq!(log[0].user.as_ref().map(|u| u.name.as_str()), Some("Ada"));
        assert_eq!(log[1].action, ItemAction::Created);

        let mine = fx
            .ledger
            .item_history_by_user(fx.user, Some(1))
            .expect("by user");
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, id);
    }

    #[test]
    fn recorded_sprint_entry_reads_back_with_item() {
        let fx = Fixture::new();
        let sprint = fx
            .sprints
            .create(fx.user, sprint_input(fx.project, "Sprint 1"))
            .expect("sprint");
        let item = fx.item("Search", None);

        let id = fx
            .ledger
            .record_sprint(
                &NewSprintHistory::new(sprint.id, fx.user, SprintAction::ItemAdded)
                    .item(item)
                    .new_value(json!({ "item_id": item })),
            )
            .expect("record");

        let log = fx.ledger.sprint_history(sprint.id).expect("history");
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].id, id);
        assert_eq!(log[0].item_id, Some(item));
        assert_eq!(log[0].item.as_ref().map(|i| i.title.as_str()), Some("Search"));
        assert_eq!(log[0].new_value, Some(json!({ "item_id": item })));
        assert_eq!(log[1].action, SprintAction::Created);

        let mine = fx.ledger.sprint_history_by_user(fx.user, None).expect("by user");
        assert_eq!(mine.len(), 2);
    }
}
