//! Canonical SQLite schema for the backlog store.
//!
//! - `projects`, `sprints` and `items` hold current state
//! - `item_labels` models the multi-valued label set as an edge table
//! - `item_history` and `sprint_history` are the append-only ledgers
//! - `schema_meta` mirrors `PRAGMA user_version` for external inspection
//!
//! Timestamps are microseconds since the Unix epoch (`*_us` columns). User
//! references carry no foreign key; users are display-only collaborators.

/// Migration v1: tables.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    google_id TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL,
    name TEXT NOT NULL,
    avatar_url TEXT,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    key TEXT NOT NULL UNIQUE,
    description TEXT,
    created_by TEXT NOT NULL,
    last_item_position INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sprints (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    created_by TEXT NOT NULL,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    goal TEXT,
    start_date_us INTEGER NOT NULL,
    end_date_us INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'Planning'
        CHECK (status IN ('Planning', 'Active', 'Completed', 'Cancelled')),
    velocity INTEGER CHECK (velocity IS NULL OR velocity >= 0),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    CHECK (end_date_us > start_date_us)
);

CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    sprint_id TEXT REFERENCES sprints(id) ON DELETE SET NULL,
    created_by TEXT NOT NULL,
    title TEXT NOT NULL CHECK (length(trim(title)) > 0),
    description TEXT,
    item_type TEXT NOT NULL CHECK (item_type IN ('Story', 'Bug', 'Task', 'Epic')),
    priority TEXT NOT NULL CHECK (priority IN ('Critical', 'High', 'Medium', 'Low')),
    status TEXT NOT NULL DEFAULT 'New'
        CHECK (status IN ('New', 'Ready', 'In Progress', 'Done', 'Archived')),
    story_points INTEGER CHECK (story_points IS NULL OR story_points BETWEEN 0 AND 100),
    position INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS item_labels (
    item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    label TEXT NOT NULL CHECK (length(trim(label)) > 0),
    PRIMARY KEY (item_id, label)
);

CREATE TABLE IF NOT EXISTS item_history (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL,
    action TEXT NOT NULL CHECK (action IN (
        'Created', 'Updated', 'StatusChanged', 'PriorityChanged',
        'SprintAssigned', 'SprintRemoved', 'CommentAdded',
        'LabelAdded', 'LabelRemoved', 'DescriptionUpdated'
    )),
    field_name TEXT,
    old_value TEXT,
    new_value TEXT,
    comment TEXT,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sprint_history (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    sprint_id TEXT NOT NULL REFERENCES sprints(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL,
    item_id TEXT REFERENCES items(id) ON DELETE SET NULL,
    action TEXT NOT NULL CHECK (action IN (
        'Created', 'Updated', 'Started', 'ItemAdded', 'ItemRemoved',
        'ItemMoved', 'Completed', 'Cancelled'
    )),
    old_value TEXT,
    new_value TEXT,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO schema_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: read-path indexes and the one-active-sprint guard.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_items_project_position
    ON items(project_id, position, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_items_sprint
    ON items(sprint_id, position);

CREATE INDEX IF NOT EXISTS idx_items_created
    ON items(created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_item_labels_label
    ON item_labels(label, item_id);

CREATE INDEX IF NOT EXISTS idx_sprints_project_start
    ON sprints(project_id, start_date_us DESC);

CREATE UNIQUE INDEX IF NOT EXISTS idx_sprints_one_active
    ON sprints(project_id) WHERE status = 'Active';

CREATE INDEX IF NOT EXISTS idx_item_history_item
    ON item_history(item_id, created_at_us DESC, seq DESC);

CREATE INDEX IF NOT EXISTS idx_item_history_user
    ON item_history(user_id, created_at_us DESC, seq DESC);

CREATE INDEX IF NOT EXISTS idx_sprint_history_sprint
    ON sprint_history(sprint_id, created_at_us DESC, seq DESC);

CREATE INDEX IF NOT EXISTS idx_sprint_history_user
    ON sprint_history(user_id, created_at_us DESC, seq DESC);

CREATE INDEX IF NOT EXISTS idx_sprint_history_item
    ON sprint_history(item_id);
";

/// Name of the partial unique index allowing one Active sprint per project.
pub const ACTIVE_SPRINT_INDEX: &str = "idx_sprints_one_active";

/// Indexes expected by list/filter/ledger query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_items_project_position",
    "idx_items_sprint",
    "idx_items_created",
    "idx_item_labels_label",
    "idx_sprints_project_start",
    ACTIVE_SPRINT_INDEX,
    "idx_item_history_item",
    "idx_item_history_user",
    "idx_sprint_history_sprint",
    "idx_sprint_history_user",
    "idx_sprint_history_item",
];
