//! Project CRUD. Projects scope sprints and items; deleting one cascades to
//! both and to their ledgers.

use uuid::Uuid;

use super::validate;
use crate::config::PaginationConfig;
use crate::db::{Database, projects};
use crate::error::{BacklogError, Result};
use crate::model::page::{Page, PageRequest};
use crate::model::project::{NewProject, Project, ProjectUpdate, canonical_key, is_valid_key};

pub trait ProjectService: Send + Sync {
    fn create(&self, actor: Uuid, new: NewProject) -> Result<Project>;
    fn get(&self, id: Uuid) -> Result<Project>;
    /// Keys are matched case-insensitively.
    fn get_by_key(&self, key: &str) -> Result<Project>;
    fn list(&self, page: Option<i64>, limit: Option<i64>) -> Result<Page<Project>>;
    fn list_all(&self) -> Result<Vec<Project>>;
    fn update(&self, id: Uuid, update: ProjectUpdate) -> Result<Project>;
    fn delete(&self, id: Uuid) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SqliteProjectService {
    db: Database,
    pagination: PaginationConfig,
}

impl SqliteProjectService {
    #[must_use]
    pub const fn new(db: Database, pagination: PaginationConfig) -> Self {
        Self { db, pagination }
    }
}

impl ProjectService for SqliteProjectService {
    fn create(&self, actor: Uuid, new: NewProject) -> Result<Project> {
        let key = canonical_key(&new.key);
        if !is_valid_key(&key) {
            return Err(BacklogError::InvalidProjectKey(new.key));
        }
        let validated = NewProject {
            name: validate::required("name", &new.name, validate::PROJECT_NAME_MAX)?,
            key,
            description: validate::optional(
                "description",
                new.description.as_deref(),
                validate::PROJECT_DESCRIPTION_MAX,
            )?,
        };

        self.db.write(|tx| {
            let project = projects::insert(tx, &validated, actor)?;
            tracing::debug!(
                project_id = %project.id,
                key = %project.key,
                user_id = %actor,
                "project created"
            );
            Ok(project)
        })
    }

    fn get(&self, id: Uuid) -> Result<Project> {
        self.db
            .read(|conn| projects::get(conn, id)?.ok_or_else(|| BacklogError::project_not_found(id)))
    }

    fn get_by_key(&self, key: &str) -> Result<Project> {
        let key = canonical_key(key);
        self.db.read(|conn| {
            projects::get_by_key(conn, &key)?.ok_or_else(|| BacklogError::ProjectNotFound(key.clone()))
        })
    }

    fn list(&self, page: Option<i64>, limit: Option<i64>) -> Result<Page<Project>> {
        let req = PageRequest::normalize(page, limit, &self.pagination);
        self.db.read(|conn| {
            let total = projects::count(conn)?;
            Ok(Page::new(projects::list(conn, Some(req))?, total, req))
        })
    }

    fn list_all(&self) -> Result<Vec<Project>> {
        self.db.read(|conn| projects::list(conn, None))
    }

    fn update(&self, id: Uuid, update: ProjectUpdate) -> Result<Project> {
        // Empty input leaves the stored value untouched.
        let validated = ProjectUpdate {
            name: update
                .name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .map(|n| validate::required("name", n, validate::PROJECT_NAME_MAX))
                .transpose()?,
            description: validate::optional(
                "description",
                update.description.as_deref(),
                validate::PROJECT_DESCRIPTION_MAX,
            )?,
        };

        self.db.write(|tx| {
            if !projects::update(tx, id, &validated)? {
                return Err(BacklogError::project_not_found(id));
            }
            tracing::debug!(project_id = %id, "project updated");
            projects::get(tx, id)?.ok_or_else(|| BacklogError::project_not_found(id))
        })
    }

    fn delete(&self, id: Uuid) -> Result<()> {
        self.db.write(|tx| {
            if !projects::delete(tx, id)? {
                return Err(BacklogError::project_not_found(id));
            }
            tracing::debug!(project_id = %id, "project deleted");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::backlog::BacklogService;
    use crate::service::sprint::SprintService;
    use crate::service::testing::{Fixture, sprint_input};

    #[test]
    fn keys_are_canonical_and_unique() {
        let fx = Fixture::new();
        assert_eq!(fx.projects.get(fx.project).expect("get").key, "CORE");
        assert_eq!(fx.projects.get_by_key("core").expect("by key").id, fx.project);

        let dup = fx.projects.create(
            fx.user,
            NewProject {
                name: "Other".into(),
                key: " Core ".into(),
                description: None,
            },
        );
        assert!(matches!(dup, Err(BacklogError::ProjectKeyExists(k)) if k == "CORE"));

        let bad = fx.projects.create(
            fx.user,
            NewProject {
                name: "Bad".into(),
                key: "no-dashes".into(),
                description: None,
            },
        );
        assert!(matches!(bad, Err(BacklogError::InvalidProjectKey(_))));
    }

    #[test]
    fn update_ignores_empty_fields() {
        let fx = Fixture::new();
        let updated = fx
            .projects
            .update(
                fx.project,
                ProjectUpdate {
                    name: Some(String::new()),
                    description: Some("Main product".into()),
                },
            )
            .expect("update");
        assert_eq!(updated.name, "Core");
        assert_eq!(updated.description.as_deref(), Some("Main product"));

        assert!(matches!(
            fx.projects.update(Uuid::new_v4(), ProjectUpdate::default()),
            Err(BacklogError::ProjectNotFound(_))
        ));
    }

    #[test]
    fn delete_cascades_to_sprints_and_items() {
        let fx = Fixture::new();
        let sprint = fx
            .sprints
            .create(fx.user, sprint_input(fx.project, "S"))
            .expect("sprint");
        let item = fx.item("A", Some(1));

        fx.projects.delete(fx.project).expect("delete");
        assert!(matches!(
            fx.sprints.get(sprint.id),
            Err(BacklogError::SprintNotFound(_))
        ));
        assert!(matches!(
            fx.backlog.get(item),
            Err(BacklogError::ItemNotFound(_))
        ));
        assert!(matches!(
            fx.projects.delete(fx.project),
            Err(BacklogError::ProjectNotFound(_))
        ));
    }

    #[test]
    fn list_pages_newest_first() {
        let fx = Fixture::new();
        fx.projects
            .create(
                fx.user,
                NewProject {
                    name: "Web".into(),
                    key: "WEB".into(),
                    description: None,
                },
            )
            .expect("web");
        let page = fx.projects.list(Some(1), Some(1)).expect("page");
        assert_eq!(page.total, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items[0].key, "WEB");
        assert_eq!(fx.projects.list_all().expect("all").len(), 2);
    }
}
