//! Service layer: one capability trait per component plus its SQLite
//! implementation. Services receive their database handle and settings
//! through their constructors; [`Services`] wires a full set together.

pub mod activity;
pub mod backlog;
pub mod history;
mod ledger;
pub mod project;
pub mod sprint;
pub mod user;
pub mod validate;

pub use activity::{ActivityAggregator, ActivityService};
pub use backlog::{BacklogService, SqliteBacklogService};
pub use history::{HistoryLedger, SqliteHistoryLedger};
pub use project::{ProjectService, SqliteProjectService};
pub use sprint::{SprintService, SqliteSprintService};
pub use user::{SqliteUserService, UserService};

use crate::config::ProjectConfig;
use crate::db::Database;

/// Every service, sharing one connection pool.
#[derive(Debug, Clone)]
pub struct Services {
    pub users: SqliteUserService,
    pub projects: SqliteProjectService,
    pub backlog: SqliteBacklogService,
    pub sprints: SqliteSprintService,
    pub ledger: SqliteHistoryLedger,
    pub activity: ActivityAggregator<SqliteHistoryLedger>,
}

impl Services {
    #[must_use]
    pub fn new(db: &Database, config: &ProjectConfig) -> Self {
        let pagination = config.pagination;
        Self {
            users: SqliteUserService::new(db.clone()),
            projects: SqliteProjectService::new(db.clone(), pagination),
            backlog: SqliteBacklogService::new(db.clone(), pagination),
            sprints: SqliteSprintService::new(db.clone(), pagination),
            ledger: SqliteHistoryLedger::new(db.clone()),
            activity: ActivityAggregator::new(SqliteHistoryLedger::new(db.clone())),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{Duration, Utc};
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;
    use crate::config::DatabaseConfig;
    use crate::model::item::NewBacklogItem;
    use crate::model::project::NewProject;
    use crate::model::sprint::NewSprint;
    use crate::model::user::IdentityClaims;

    /// A migrated temp-file database with one user ("Ada") and one project
    /// ("CORE").
    pub struct Fixture {
        pub users: SqliteUserService,
        pub projects: SqliteProjectService,
        pub backlog: SqliteBacklogService,
        pub sprints: SqliteSprintService,
        pub ledger: SqliteHistoryLedger,
        pub user: Uuid,
        pub project: Uuid,
        _dir: TempDir,
    }

    impl Fixture {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().expect("temp dir");
            let db = Database::open(&dir.path().join("backlog.db"), &DatabaseConfig::default())
                .expect("open db");
            let services = Services::new(&db, &ProjectConfig::default());
            let user = services
                .users
                .register(&IdentityClaims {
                    google_id: "g-ada".into(),
                    email: "ada@example.com".into(),
                    name: "Ada".into(),
                    avatar_url: None,
                })
                .expect("register")
                .id;
            let project = services
                .projects
                .create(
                    user,
                    NewProject {
                        name: "Core".into(),
                        key: "core".into(),
                        description: None,
                    },
                )
                .expect("project")
                .id;
            Self {
                users: services.users,
                projects: services.projects,
                backlog: services.backlog,
                sprints: services.sprints,
                ledger: services.ledger,
                user,
                project,
                _dir: dir,
            }
        }

        /// Create a Story in the fixture project and return its id.
        pub fn item(&self, title: &str, points: Option<u32>) -> Uuid {
            self.backlog
                .create(
                    self.user,
                    NewBacklogItem {
                        project_id: self.project,
                        title: title.into(),
                        item_type: "Story".into(),
                        priority: "Medium".into(),
                        story_points: points,
                        ..NewBacklogItem::default()
                    },
                )
                .expect("create item")
                .id
        }
    }

    /// Two-week sprint starting now.
    pub fn sprint_input(project_id: Uuid, name: &str) -> NewSprint {
        let start = Utc::now();
        NewSprint {
            project_id,
            name: name.into(),
            goal: None,
            start_date: start,
            end_date: start + Duration::days(14),
        }
    }
}
