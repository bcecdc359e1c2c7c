use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::history::{ItemHistory, SprintHistory};
use super::item::ItemSummary;
use super::sprint::SprintSummary;

/// Which ledger an activity entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Item,
    Sprint,
}

/// A ledger entry in the common shape shown on a user's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub id: Uuid,
    pub action: String,
    pub field_name: Option<String>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprint: Option<SprintSummary>,
}

impl From<ItemHistory> for Activity {
    fn from(h: ItemHistory) -> Self {
        Self {
            kind: ActivityKind::Item,
            id: h.id,
            action: h.action.as_str().to_string(),
            field_name: h.field_name,
            old_value: h.old_value,
            new_value: h.new_value,
            comment: h.comment,
            created_at: h.created_at,
            item: h.item,
            sprint: None,
        }
    }
}

impl From<SprintHistory> for Activity {
    fn from(h: SprintHistory) -> Self {
        Self {
            kind: ActivityKind::Sprint,
            id: h.id,
            action: h.action.as_str().to_string(),
            field_name: None,
            old_value: h.old_value,
            new_value: h.new_value,
            comment: None,
            created_at: h.created_at,
            item: h.item,
            sprint: h.sprint,
        }
    }
}

/// A user's merged timeline. `total` counts entries before truncation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserActivity {
    pub activities: Vec<Activity>,
    pub total: usize,
    pub limit: i64,
}

/// Merge both ledgers into one newest-first timeline.
///
/// Item entries precede sprint entries before the stable sort, so equal
/// timestamps keep item-stream order first, then insertion order within a
/// stream. A `limit` of zero or less keeps every entry.
#[must_use]
pub fn merge_timeline(
    item_history: Vec<ItemHistory>,
    sprint_history: Vec<SprintHistory>,
    limit: i64,
) -> UserActivity {
    let mut activities: Vec<Activity> = item_history
        .into_iter()
        .map(Activity::from)
        .chain(sprint_history.into_iter().map(Activity::from))
        .collect();

    activities.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let total = activities.len();
    if limit > 0 {
        activities.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    }

    UserActivity {
        activities,
        total,
        limit,
    }
}
