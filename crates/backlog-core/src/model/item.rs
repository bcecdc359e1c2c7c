use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use super::ParseEnumError;
use super::sprint::SprintSummary;
use super::user::UserSummary;

/// The four kinds of backlog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    Story,
    Bug,
    Task,
    Epic,
}

impl ItemType {
    pub const ALL: [Self; 4] = [Self::Story, Self::Bug, Self::Task, Self::Epic];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Story => "Story",
            Self::Bug => "Bug",
            Self::Task => "Task",
            Self::Epic => "Epic",
        }
    }
}

/// Item priority, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Self; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

/// Workflow status of a backlog item.
///
/// Any status may be set from any other; the item store validates membership
/// only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ItemStatus {
    #[default]
    New,
    Ready,
    #[serde(rename = "In Progress")]
    InProgress,
    Done,
    Archived,
}

impl ItemStatus {
    pub const ALL: [Self; 5] = [
        Self::New,
        Self::Ready,
        Self::InProgress,
        Self::Done,
        Self::Archived,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Ready => "Ready",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
            Self::Archived => "Archived",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .collect::<String>()
        .to_ascii_lowercase()
}

impl FromStr for ItemType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "story" => Ok(Self::Story),
            "bug" => Ok(Self::Bug),
            "task" => Ok(Self::Task),
            "epic" => Ok(Self::Epic),
            _ => Err(ParseEnumError {
                expected: "item type",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(ParseEnumError {
                expected: "priority",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for ItemStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "new" => Ok(Self::New),
            "ready" => Ok(Self::Ready),
            "inprogress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "archived" => Ok(Self::Archived),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

/// Compact reference to an item, embedded in history and activity rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
}

/// A stored backlog item together with its display enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogItem {
    pub id: Uuid,
    pub project_id: Uuid,
    pub sprint_id: Option<Uuid>,
    pub created_by_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub priority: Priority,
    pub status: ItemStatus,
    pub story_points: Option<u32>,
    pub labels: Vec<String>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprint: Option<SprintSummary>,
}

impl BacklogItem {
    /// Story points counted towards sprint totals (unestimated counts as 0).
    #[must_use]
    pub fn points(&self) -> u64 {
        u64::from(self.story_points.unwrap_or(0))
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status == ItemStatus::Done
    }
}

/// Input for creating a backlog item. Enum fields arrive as raw strings so
/// the store can report which one failed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBacklogItem {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub item_type: String,
    pub priority: String,
    pub status: Option<String>,
    pub story_points: Option<u32>,
    pub labels: Vec<String>,
    pub sprint_id: Option<Uuid>,
}

/// Sprint reference change requested through an item update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SprintChange {
    Assign(Uuid),
    Unassign,
}

/// Partial update for a backlog item; `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogItemUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub item_type: Option<String>,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub story_points: Option<u32>,
    pub labels: Option<Vec<String>>,
    pub sprint: Option<SprintChange>,
}

/// Sprint filter for item listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SprintFilter {
    Unassigned,
    Sprint(Uuid),
}

/// Validated item listing filter. Empty vectors mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub project_id: Option<Uuid>,
    pub search: Option<String>,
    pub types: Vec<ItemType>,
    pub priorities: Vec<Priority>,
    pub statuses: Vec<ItemStatus>,
    pub sprint: Option<SprintFilter>,
    pub labels: Vec<String>,
}

/// Raw listing parameters as received from the request layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuery {
    pub project_id: Option<Uuid>,
    pub search: Option<String>,
    pub types: Vec<String>,
    pub priorities: Vec<String>,
    pub statuses: Vec<String>,
    pub sprint_id: Option<String>,
    pub labels: Vec<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Sentinel accepted in `ItemQuery::sprint_id` for items without a sprint.
pub const UNASSIGNED_SPRINT: &str = "none";

impl ItemQuery {
    /// Convert raw parameters into a filter. Unknown enum values and an
    /// unparseable sprint id are dropped rather than rejected.
    #[must_use]
    pub fn to_filter(&self) -> ItemFilter {
        let sprint = self.sprint_id.as_deref().map(str::trim).and_then(|raw| {
            if raw.eq_ignore_ascii_case(UNASSIGNED_SPRINT) {
                Some(SprintFilter::Unassigned)
            } else {
                Uuid::parse_str(raw).ok().map(SprintFilter::Sprint)
            }
        });

        ItemFilter {
            project_id: self.project_id,
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            types: self.types.iter().filter_map(|t| t.parse().ok()).collect(),
            priorities: self.priorities.iter().filter_map(|p| p.parse().ok()).collect(),
            statuses: self.statuses.iter().filter_map(|s| s.parse().ok()).collect(),
            sprint,
            labels: self
                .labels
                .iter()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_display_form() {
        for status in ItemStatus::ALL {
            assert_eq!(status.as_str().parse::<ItemStatus>(), Ok(status));
        }
        assert_eq!("in_progress".parse::<ItemStatus>(), Ok(ItemStatus::InProgress));
        assert!("started".parse::<ItemStatus>().is_err());
    }

    #[test]
    fn status_serializes_with_space() {
        let json = serde_json::to_string(&ItemStatus::InProgress).expect("serialize");
        assert_eq!(json, "\"In Progress\"");
    }

    #[test]
    fn type_and_priority_parse_case_insensitively() {
        assert_eq!("story".parse::<ItemType>(), Ok(ItemType::Story));
        assert_eq!(" HIGH ".parse::<Priority>(), Ok(Priority::High));
        let err = "Feature".parse::<ItemType>().expect_err("unknown type");
        assert_eq!(err.expected, "item type");
    }

    #[test]
    fn query_drops_unknown_values_and_understands_none_sentinel() {
        let query = ItemQuery {
            types: vec!["Bug".into(), "Feature".into()],
            priorities: vec!["urgent".into()],
            statuses: vec!["Done".into(), "In Progress".into()],
            sprint_id: Some("none".into()),
            labels: vec![" backend ".into(), String::new()],
            search: Some("   ".into()),
            ..ItemQuery::default()
        };

        let filter = query.to_filter();
        assert_eq!(filter.types, vec![ItemType::Bug]);
        assert!(filter.priorities.is_empty());
        assert_eq!(filter.statuses, vec![ItemStatus::Done, ItemStatus::InProgress]);
        assert_eq!(filter.sprint, Some(SprintFilter::Unassigned));
        assert_eq!(filter.labels, vec!["backend".to_string()]);
        assert_eq!(filter.search, None);
    }

    #[test]
    fn query_ignores_garbage_sprint_id() {
        let query = ItemQuery {
            sprint_id: Some("not-a-uuid".into()),
            ..ItemQuery::default()
        };
        assert_eq!(query.to_filter().sprint, None);
    }
}
