use std::fmt;

use uuid::Uuid;

use crate::model::sprint::SprintStatus;

/// Result alias used by every service and store function in this crate.
pub type Result<T, E = BacklogError> = std::result::Result<T, E>;

/// Coarse error category so callers can pick a response without matching
/// individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    ValidationFailed,
    Conflict,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::ValidationFailed => "validation_failed",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ProjectNotFound,
    SprintNotFound,
    ItemNotFound,
    UserNotFound,
    InvalidEnumValue,
    InvalidDateRange,
    InvalidField,
    InvalidProjectKey,
    ProjectKeyExists,
    SprintAlreadyActive,
    InvalidSprintTransition,
    ItemAlreadyInSprint,
    ItemNotInSprint,
    StorageFailure,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ProjectNotFound => "E1001",
            Self::SprintNotFound => "E1002",
            Self::ItemNotFound => "E1003",
            Self::UserNotFound => "E1004",
            Self::InvalidEnumValue => "E2001",
            Self::InvalidDateRange => "E2002",
            Self::InvalidField => "E2003",
            Self::InvalidProjectKey => "E2004",
            Self::ProjectKeyExists => "E3001",
            Self::SprintAlreadyActive => "E3002",
            Self::InvalidSprintTransition => "E3003",
            Self::ItemAlreadyInSprint => "E3004",
            Self::ItemNotInSprint => "E3005",
            Self::StorageFailure => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ProjectNotFound => "Project not found",
            Self::SprintNotFound => "Sprint not found",
            Self::ItemNotFound => "Backlog item not found",
            Self::UserNotFound => "User not found",
            Self::InvalidEnumValue => "Invalid type/priority/status value",
            Self::InvalidDateRange => "Invalid sprint date range",
            Self::InvalidField => "Invalid field value",
            Self::InvalidProjectKey => "Invalid project key",
            Self::ProjectKeyExists => "Project key already exists",
            Self::SprintAlreadyActive => "Project already has an active sprint",
            Self::InvalidSprintTransition => "Invalid sprint state transition",
            Self::ItemAlreadyInSprint => "Item already in sprint",
            Self::ItemNotInSprint => "Item not in sprint",
            Self::StorageFailure => "Storage failure",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ProjectNotFound | Self::SprintNotFound | Self::ItemNotFound => {
                Some("Check the identifier with the matching `list` command.")
            }
            Self::UserNotFound => Some("Register the user with `bl user register` first."),
            Self::InvalidEnumValue => {
                Some("Use one of the documented type/priority/status values.")
            }
            Self::InvalidDateRange => Some("The end date must be strictly after the start date."),
            Self::InvalidField => None,
            Self::InvalidProjectKey => Some("Use 2-10 uppercase letters or digits, e.g. `CORE`."),
            Self::ProjectKeyExists => Some("Pick a different project key."),
            Self::SprintAlreadyActive => {
                Some("Complete or cancel the active sprint before starting another.")
            }
            Self::InvalidSprintTransition => Some(
                "Follow valid transitions: planning -> active -> completed, planning|active -> cancelled.",
            ),
            Self::ItemAlreadyInSprint | Self::ItemNotInSprint => {
                Some("Inspect the sprint with `bl sprint show`.")
            }
            Self::StorageFailure => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Every typed outcome the services can produce.
#[derive(Debug, thiserror::Error)]
pub enum BacklogError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("sprint not found: {0}")]
    SprintNotFound(String),

    #[error("backlog item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("invalid item type: '{0}'")]
    InvalidItemType(String),

    #[error("invalid priority: '{0}'")]
    InvalidPriority(String),

    #[error("invalid status: '{0}'")]
    InvalidStatus(String),

    #[error("invalid sprint status: '{0}'")]
    InvalidSprintStatus(String),

    #[error("end date must be after start date")]
    InvalidDateRange,

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("project key must be 2-10 uppercase alphanumerics: '{0}'")]
    InvalidProjectKey(String),

    #[error("project key already exists: {0}")]
    ProjectKeyExists(String),

    #[error("there is already an active sprint in project {project_id}")]
    SprintAlreadyActive { project_id: Uuid },

    #[error("sprint must be in planning status to start (current: {status})")]
    SprintNotPlanning { status: SprintStatus },

    #[error("sprint must be in active status to complete or cancel (current: {status})")]
    SprintNotActive { status: SprintStatus },

    #[error("item {item_id} is already in sprint {sprint_id}")]
    ItemAlreadyInSprint { item_id: Uuid, sprint_id: Uuid },

    #[error("item {item_id} is not in sprint {sprint_id}")]
    ItemNotInSprint { item_id: Uuid, sprint_id: Uuid },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

impl BacklogError {
    /// Category of the error, following the not-found / validation /
    /// conflict / internal split.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ProjectNotFound(_)
            | Self::SprintNotFound(_)
            | Self::ItemNotFound(_)
            | Self::UserNotFound(_) => ErrorKind::NotFound,
            Self::InvalidItemType(_)
            | Self::InvalidPriority(_)
            | Self::InvalidStatus(_)
            | Self::InvalidSprintStatus(_)
            | Self::InvalidDateRange
            | Self::InvalidField { .. }
            | Self::InvalidProjectKey(_) => ErrorKind::ValidationFailed,
            Self::ProjectKeyExists(_)
            | Self::SprintAlreadyActive { .. }
            | Self::SprintNotPlanning { .. }
            | Self::SprintNotActive { .. }
            | Self::ItemAlreadyInSprint { .. }
            | Self::ItemNotInSprint { .. } => ErrorKind::Conflict,
            Self::Storage(_) | Self::Pool(_) => ErrorKind::Internal,
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ProjectNotFound(_) => ErrorCode::ProjectNotFound,
            Self::SprintNotFound(_) => ErrorCode::SprintNotFound,
            Self::ItemNotFound(_) => ErrorCode::ItemNotFound,
            Self::UserNotFound(_) => ErrorCode::UserNotFound,
            Self::InvalidItemType(_)
            | Self::InvalidPriority(_)
            | Self::InvalidStatus(_)
            | Self::InvalidSprintStatus(_) => ErrorCode::InvalidEnumValue,
            Self::InvalidDateRange => ErrorCode::InvalidDateRange,
            Self::InvalidField { .. } => ErrorCode::InvalidField,
            Self::InvalidProjectKey(_) => ErrorCode::InvalidProjectKey,
            Self::ProjectKeyExists(_) => ErrorCode::ProjectKeyExists,
            Self::SprintAlreadyActive { .. } => ErrorCode::SprintAlreadyActive,
            Self::SprintNotPlanning { .. } | Self::SprintNotActive { .. } => {
                ErrorCode::InvalidSprintTransition
            }
            Self::ItemAlreadyInSprint { .. } => ErrorCode::ItemAlreadyInSprint,
            Self::ItemNotInSprint { .. } => ErrorCode::ItemNotInSprint,
            Self::Storage(_) | Self::Pool(_) => ErrorCode::StorageFailure,
        }
    }

    /// Remediation hint for the error, if one exists.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    pub(crate) fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn sprint_not_found(id: Uuid) -> Self {
        Self::SprintNotFound(id.to_string())
    }

    pub(crate) fn project_not_found(id: Uuid) -> Self {
        Self::ProjectNotFound(id.to_string())
    }
}
