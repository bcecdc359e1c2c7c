use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use super::ParseEnumError;
use super::item::BacklogItem;
use super::project::ProjectSummary;
use super::user::UserSummary;

/// The four sprint lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SprintStatus {
    #[default]
    Planning,
    Active,
    Completed,
    Cancelled,
}

impl SprintStatus {
    pub const ALL: [Self; 4] = [
        Self::Planning,
        Self::Active,
        Self::Completed,
        Self::Cancelled,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "Planning",
            Self::Active => "Active",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Completed and Cancelled sprints never change status again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Valid transitions:
    /// - `planning -> active` (start)
    /// - `active -> completed` (complete)
    /// - `planning -> cancelled`, `active -> cancelled` (cancel)
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Planning, Self::Active)
                | (Self::Active, Self::Completed)
                | (Self::Planning | Self::Active, Self::Cancelled)
        )
    }
}

impl fmt::Display for SprintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SprintStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "planning" => Ok(Self::Planning),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(ParseEnumError {
                expected: "sprint status",
                got: s.to_string(),
            }),
        }
    }
}

/// Compact reference to a sprint, embedded in items and activity rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SprintSummary {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprint {
    pub id: Uuid,
    pub project_id: Uuid,
    pub created_by_id: Uuid,
    pub name: String,
    pub goal: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: SprintStatus,
    /// Frozen sum of done story points, set only when the sprint completes.
    pub velocity: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSprint {
    pub project_id: Uuid,
    pub name: String,
    pub goal: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Partial update of a sprint's non-status fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SprintUpdate {
    pub name: Option<String>,
    pub goal: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Raw sprint listing parameters as received from the request layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SprintQuery {
    pub project_id: Option<Uuid>,
    pub statuses: Vec<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Validated sprint listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SprintFilter {
    pub project_id: Option<Uuid>,
    pub statuses: Vec<SprintStatus>,
}

impl SprintQuery {
    /// Invalid status values are dropped, matching item listing behavior.
    #[must_use]
    pub fn to_filter(&self) -> SprintFilter {
        SprintFilter {
            project_id: self.project_id,
            statuses: self.statuses.iter().filter_map(|s| s.parse().ok()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SprintWithItems {
    #[serde(flatten)]
    pub sprint: Sprint,
    pub items: Vec<BacklogItem>,
    pub total_items: usize,
    pub total_points: u64,
}

impl SprintWithItems {
    #[must_use]
    pub fn new(sprint: Sprint, items: Vec<BacklogItem>) -> Self {
        let total_points = items.iter().map(BacklogItem::points).sum();
        Self {
            sprint,
            total_items: items.len(),
            total_points,
            items,
        }
    }
}

/// Progress figures for one sprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SprintReport {
    pub sprint: Sprint,
    pub total_items: usize,
    pub completed_items: usize,
    pub total_story_points: u64,
    pub completed_story_points: u64,
    pub velocity: u64,
    pub completion_percentage: f64,
}

impl SprintReport {
    /// Build the report from the sprint's current items. After completion the
    /// stored velocity wins over the live done-points figure.
    #[must_use]
    pub fn compute(sprint: Sprint, items: &[BacklogItem]) -> Self {
        let total_items = items.len();
        let completed: Vec<&BacklogItem> = items.iter().filter(|i| i.is_done()).collect();
        let completed_items = completed.len();
        let total_story_points = items.iter().map(BacklogItem::points).sum();
        let completed_story_points = completed.iter().map(|i| i.points()).sum();

        #[allow(clippy::cast_precision_loss)]
        let completion_percentage = if total_items == 0 {
            0.0
        } else {
            completed_items as f64 / total_items as f64 * 100.0
        };

        let velocity = sprint.velocity.unwrap_or(completed_story_points);

        Self {
            sprint,
            total_items,
            completed_items,
            total_story_points,
            completed_story_points,
            velocity,
            completion_percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::{ItemStatus, ItemType, Priority};
    use chrono::TimeZone;

    fn sprint(velocity: Option<u64>) -> Sprint {
        let at = Utc.timestamp_opt(1_700_000_000, 0).single().expect("valid ts");
        Sprint {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            created_by_id: Uuid::new_v4(),
            name: "Sprint 1".into(),
            goal: None,
            start_date: at,
            end_date: at + chrono::Duration::days(14),
            status: SprintStatus::Active,
            velocity,
            created_at: at,
            updated_at: at,
            created_by: None,
            project: None,
        }
    }

    fn item(status: ItemStatus, points: Option<u32>) -> BacklogItem {
        let at = Utc.timestamp_opt(1_700_000_000, 0).single().expect("valid ts");
        BacklogItem {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            sprint_id: None,
            created_by_id: Uuid::new_v4(),
            title: "item".into(),
            description: None,
            item_type: ItemType::Task,
            priority: Priority::Medium,
            status,
            story_points: points,
            labels: vec![],
            position: 1,
            created_at: at,
            updated_at: at,
            created_by: None,
            sprint: None,
        }
    }

    #[test]
    fn transitions_follow_lifecycle() {
        use SprintStatus::*;
        assert!(Planning.can_transition_to(Active));
        assert!(Planning.can_transition_to(Cancelled));
        assert!(Active.can_transition_to(Completed));
        assert!(Active.can_transition_to(Cancelled));
        assert!(!Planning.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Cancelled.can_transition_to(Planning));
        assert!(Completed.is_terminal() && Cancelled.is_terminal());
    }

    #[test]
    fn report_with_no_items_has_zero_completion() {
        let report = SprintReport::compute(sprint(None), &[]);
        assert_eq!(report.total_items, 0);
        assert!(report.completion_percentage.abs() < f64::EPSILON);
        assert_eq!(report.velocity, 0);
    }

    #[test]
    fn report_uses_live_points_until_velocity_is_frozen() {
        let items = vec![
            item(ItemStatus::Done, Some(5)),
            item(ItemStatus::New, Some(3)),
            item(ItemStatus::Done, None),
        ];
        let live = SprintReport::compute(sprint(None), &items);
        assert_eq!(live.total_items, 3);
        assert_eq!(live.completed_items, 2);
        assert_eq!(live.total_story_points, 8);
        assert_eq!(live.completed_story_points, 5);
        assert_eq!(live.velocity, 5);

        let frozen = SprintReport::compute(sprint(Some(13)), &items);
        assert_eq!(frozen.velocity, 13);
    }

    #[test]
    fn status_parses_both_cancel_spellings() {
        assert_eq!("canceled".parse::<SprintStatus>(), Ok(SprintStatus::Cancelled));
        assert_eq!("ACTIVE".parse::<SprintStatus>(), Ok(SprintStatus::Active));
        assert!("done".parse::<SprintStatus>().is_err());
    }
}
