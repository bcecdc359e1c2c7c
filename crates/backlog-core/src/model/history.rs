use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};
use uuid::Uuid;

use super::ParseEnumError;
use super::item::ItemSummary;
use super::sprint::SprintSummary;
use super::user::UserSummary;

/// Events recorded on an item's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemAction {
    Created,
    Updated,
    StatusChanged,
    PriorityChanged,
    SprintAssigned,
    SprintRemoved,
    CommentAdded,
    LabelAdded,
    LabelRemoved,
    DescriptionUpdated,
}

impl ItemAction {
    pub const ALL: [Self; 10] = [
        Self::Created,
        Self::Updated,
        Self::StatusChanged,
        Self::PriorityChanged,
        Self::SprintAssigned,
        Self::SprintRemoved,
        Self::CommentAdded,
        Self::LabelAdded,
        Self::LabelRemoved,
        Self::DescriptionUpdated,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Updated => "Updated",
            Self::StatusChanged => "StatusChanged",
            Self::PriorityChanged => "PriorityChanged",
            Self::SprintAssigned => "SprintAssigned",
            Self::SprintRemoved => "SprintRemoved",
            Self::CommentAdded => "CommentAdded",
            Self::LabelAdded => "LabelAdded",
            Self::LabelRemoved => "LabelRemoved",
            Self::DescriptionUpdated => "DescriptionUpdated",
        }
    }

    /// Action used when a single field changes through a general update.
    #[must_use]
    pub fn for_field(field: &str) -> Self {
        match field {
            "status" => Self::StatusChanged,
            "priority" => Self::PriorityChanged,
            "description" => Self::DescriptionUpdated,
            _ => Self::Updated,
        }
    }
}

/// Events recorded on a sprint's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SprintAction {
    Created,
    Updated,
    Started,
    ItemAdded,
    ItemRemoved,
    ItemMoved,
    Completed,
    Cancelled,
}

impl SprintAction {
    pub const ALL: [Self; 8] = [
        Self::Created,
        Self::Updated,
        Self::Started,
        Self::ItemAdded,
        Self::ItemRemoved,
        Self::ItemMoved,
        Self::Completed,
        Self::Cancelled,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Updated => "Updated",
            Self::Started => "Started",
            Self::ItemAdded => "ItemAdded",
            Self::ItemRemoved => "ItemRemoved",
            Self::ItemMoved => "ItemMoved",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for ItemAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SprintAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                expected: "item action",
                got: s.to_string(),
            })
    }
}

impl FromStr for SprintAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                expected: "sprint action",
                got: s.to_string(),
            })
    }
}

/// One row of an item's ledger, enriched for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemHistory {
    pub id: Uuid,
    pub item_id: Uuid,
    pub user_id: Uuid,
    pub action: ItemAction,
    pub field_name: Option<String>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemSummary>,
}

/// One row of a sprint's ledger, enriched for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SprintHistory {
    pub id: Uuid,
    pub sprint_id: Uuid,
    pub user_id: Uuid,
    pub item_id: Option<Uuid>,
    pub action: SprintAction,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprint: Option<SprintSummary>,
}

/// Item ledger entry awaiting insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItemHistory {
    pub item_id: Uuid,
    pub user_id: Uuid,
    pub action: ItemAction,
    pub field_name: Option<String>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub comment: Option<String>,
}

impl NewItemHistory {
    #[must_use]
    pub const fn new(item_id: Uuid, user_id: Uuid, action: ItemAction) -> Self {
        Self {
            item_id,
            user_id,
            action,
            field_name: None,
            old_value: None,
            new_value: None,
            comment: None,
        }
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn old(mut self, value: Value) -> Self {
        self.old_value = Some(value);
        self
    }

    #[must_use]
    pub fn new_value(mut self, value: Value) -> Self {
        self.new_value = Some(value);
        self
    }

    #[must_use]
    pub fn comment(mut self, text: impl Into<String>) -> Self {
        self.comment = Some(text.into());
        self
    }
}

/// Sprint ledger entry awaiting insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSprintHistory {
    pub sprint_id: Uuid,
    pub user_id: Uuid,
    pub item_id: Option<Uuid>,
    pub action: SprintAction,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl NewSprintHistory {
    #[must_use]
    pub const fn new(sprint_id: Uuid, user_id: Uuid, action: SprintAction) -> Self {
        Self {
            sprint_id,
            user_id,
            item_id: None,
            action,
            old_value: None,
            new_value: None,
        }
    }

    #[must_use]
    pub const fn item(mut self, item_id: Uuid) -> Self {
        self.item_id = Some(item_id);
        self
    }

    #[must_use]
    pub fn old(mut self, value: Value) -> Self {
        self.old_value = Some(value);
        self
    }

    #[must_use]
    pub fn new_value(mut self, value: Value) -> Self {
        self.new_value = Some(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_round_trip_through_strings() {
        for action in ItemAction::ALL {
            assert_eq!(action.as_str().parse::<ItemAction>(), Ok(action));
        }
        for action in SprintAction::ALL {
            assert_eq!(action.as_str().parse::<SprintAction>(), Ok(action));
        }
        assert!("created".parse::<SprintAction>().is_err());
    }

    #[test]
    fn field_actions() {
        assert_eq!(ItemAction::for_field("status"), ItemAction::StatusChanged);
        assert_eq!(ItemAction::for_field("priority"), ItemAction::PriorityChanged);
        assert_eq!(
            ItemAction::for_field("description"),
            ItemAction::DescriptionUpdated
        );
        assert_eq!(ItemAction::for_field("title"), ItemAction::Updated);
    }
}
