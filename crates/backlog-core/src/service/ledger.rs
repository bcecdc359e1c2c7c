//! Dual-ledger bookkeeping for sprint membership changes.
//!
//! Every change of an item's sprint reference goes through [`reassign`], so
//! the item ledger and the affected sprint ledgers are written in the same
//! transaction as the reference itself.

use rusqlite::Connection;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::clock;
use crate::db::{history, items};
use crate::error::Result;
use crate::model::history::{ItemAction, NewItemHistory, NewSprintHistory, SprintAction};
use crate::model::item::BacklogItem;

pub const SPRINT_FIELD: &str = "sprint_id";

/// `{item_id, item_title}` payload used on sprint ledgers.
pub fn item_ref(item: &BacklogItem) -> Value {
    json!({ "item_id": item.id, "item_title": item.title })
}

/// Point `item` at `target` and record the change on every ledger it
/// touches:
/// - into a sprint: `ItemAdded` on the sprint, `SprintAssigned` on the item
/// - out of a sprint: `ItemRemoved` on the sprint, `SprintRemoved` on the item
///
/// A move between sprints is recorded as an assignment whose old value is
/// the sprint the item left; the left sprint's ledger is not written.
///
/// Callers must have checked that `target` exists. A no-op when the
/// reference does not change.
pub fn reassign(
    conn: &Connection,
    actor: Uuid,
    item: &BacklogItem,
    target: Option<Uuid>,
) -> Result<()> {
    let previous = item.sprint_id;
    if previous == target {
        return Ok(());
    }

    items::set_sprint(conn, item.id, target, clock::next_timestamp_us())?;

    match (previous, target) {
        (_, Some(to)) => {
            record_added(conn, actor, item, to)?;
            history::append_item(
                conn,
                &NewItemHistory::new(item.id, actor, ItemAction::SprintAssigned)
                    .field(SPRINT_FIELD)
                    .old(previous.map_or(Value::Null, |from| json!(from)))
                    .new_value(json!(to)),
            )?;
        }
        (Some(from), None) => {
            history::append_sprint(
                conn,
                &NewSprintHistory::new(from, actor, SprintAction::ItemRemoved)
                    .item(item.id)
                    .old(item_ref(item)),
            )?;
            history::append_item(
                conn,
                &NewItemHistory::new(item.id, actor, ItemAction::SprintRemoved)
                    .field(SPRINT_FIELD)
                    .old(json!(from)),
            )?;
        }
        (None, None) => {}
    }

    tracing::debug!(
        item_id = %item.id,
        user_id = %actor,
        from = ?previous,
        to = ?target,
        "item sprint reassigned"
    );
    Ok(())
}

fn record_added(conn: &Connection, actor: Uuid, item: &BacklogItem, to: Uuid) -> Result<()> {
    history::append_sprint(
        conn,
        &NewSprintHistory::new(to, actor, SprintAction::ItemAdded)
            .item(item.id)
            .new_value(item_ref(item)),
    )?;
    Ok(())
}
