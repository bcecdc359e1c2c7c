use backlog_core::config::ProjectConfig;
use backlog_core::db::Database;
use backlog_core::model::history::{ItemAction, SprintAction};
use backlog_core::model::item::{BacklogItemUpdate, ItemQuery, NewBacklogItem, SprintChange};
use backlog_core::model::project::NewProject;
use backlog_core::model::sprint::NewSprint;
use backlog_core::service::{BacklogService, ProjectService, SprintService};
use backlog_core::{BacklogError, ErrorKind, Services};
use chrono::{Duration, Utc};
use tempfile::TempDir;
use uuid::Uuid;

fn setup() -> (Services, Uuid, Uuid, TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = ProjectConfig::default();
    let db = Database::open(&dir.path().join("backlog.db"), &config.database).expect("open db");
    let services = Services::new(&db, &config);
    // Actors need not be registered users.
    let actor = Uuid::new_v4();
    let project = services
        .projects
        .create(
            actor,
            NewProject {
                name: "Api".into(),
                key: "api".into(),
                description: None,
            },
        )
        .expect("project")
        .id;
    (services, actor, project, dir)
}

fn item(project_id: Uuid, title: &str) -> NewBacklogItem {
    NewBacklogItem {
        project_id,
        title: title.into(),
        item_type: "Task".into(),
        priority: "Low".into(),
        ..NewBacklogItem::default()
    }
}

#[test]
fn unregistered_actor_is_accepted_and_unenriched() {
    let (services, actor, project, _dir) = setup();
    let created = services
        .backlog
        .create(actor, item(project, "Anonymous"))
        .expect("create");
    assert_eq!(created.created_by_id, actor);
    assert!(created.created_by.is_none());
    let log = services.backlog.history(created.id).expect("history");
    assert!(log[0].user.is_none());
}

#[test]
fn adding_an_existing_label_is_a_no_op() {
    let (services, actor, project, _dir) = setup();
    let mut input = item(project, "Tagged");
    input.labels = vec!["api".into(), "api".into(), "db".into()];
    let created = services.backlog.create(actor, input).expect("create");
    assert_eq!(created.labels, vec!["api".to_string(), "db".to_string()]);

    let again = services
        .backlog
        .add_label(actor, created.id, "api")
        .expect("add existing");
    assert_eq!(again.labels, created.labels);
    let log = services.backlog.history(created.id).expect("history");
    assert!(log.iter().all(|h| h.action != ItemAction::LabelAdded));
}

#[test]
fn label_update_replaces_the_set_and_records_it() {
    let (services, actor, project, _dir) = setup();
    let mut input = item(project, "Tagged");
    input.labels = vec!["a".into()];
    let created = services.backlog.create(actor, input).expect("create");

    let updated = services
        .backlog
        .update(
            actor,
            created.id,
            BacklogItemUpdate {
                labels: Some(vec!["b".into(), "c".into()]),
                ..BacklogItemUpdate::default()
            },
        )
        .expect("update");
    assert_eq!(updated.labels, vec!["b".to_string(), "c".to_string()]);
    let log = services.backlog.history(created.id).expect("history");
    assert_eq!(log[0].field_name.as_deref(), Some("labels"));
    assert_eq!(log[0].old_value, Some(serde_json::json!(["a"])));
    assert_eq!(log[0].new_value, Some(serde_json::json!(["b", "c"])));
}

#[test]
fn update_reassigns_between_sprints_through_both_ledgers() {
    let (services, actor, project, _dir) = setup();
    let start = Utc::now();
    let make = |name: &str| {
        services
            .sprints
            .create(
                actor,
                NewSprint {
                    project_id: project,
                    name: name.into(),
                    goal: None,
                    start_date: start,
                    end_date: start + Duration::days(7),
                },
            )
            .expect("sprint")
            .id
    };
    let first = make("First");
    let second = make("Second");
    let created = services
        .backlog
        .create(actor, item(project, "Mover"))
        .expect("create");

    for target in [first, second] {
        services
            .backlog
            .update(
                actor,
                created.id,
                BacklogItemUpdate {
                    sprint: Some(SprintChange::Assign(target)),
                    ..BacklogItemUpdate::default()
                },
            )
            .expect("assign");
    }

    let moved = services.backlog.get(created.id).expect("get");
    assert_eq!(moved.sprint_id, Some(second));
    let item_log = services.backlog.history(created.id).expect("item history");
    assert_eq!(item_log[0].action, ItemAction::SprintAssigned);
    assert_eq!(item_log[0].old_value, Some(serde_json::json!(first)));

    let first_log = services.sprints.history(first).expect("first history");
    assert_eq!(first_log[0].action, SprintAction::ItemAdded);
    assert_eq!(first_log.len(), 2);
}

#[test]
fn listing_by_sprint_and_unassigned() {
    let (services, actor, project, _dir) = setup();
    let start = Utc::now();
    let sprint = services
        .sprints
        .create(
            actor,
            NewSprint {
                project_id: project,
                name: "S".into(),
                goal: None,
                start_date: start,
                end_date: start + Duration::days(7),
            },
        )
        .expect("sprint");
    let assigned = services
        .backlog
        .create(actor, item(project, "In sprint"))
        .expect("a");
    services
        .backlog
        .create(actor, item(project, "Loose"))
        .expect("b");
    services
        .sprints
        .add_item(actor, sprint.id, assigned.id)
        .expect("add");

    let in_sprint = services
        .backlog
        .list(&ItemQuery {
            sprint_id: Some(sprint.id.to_string()),
            ..ItemQuery::default()
        })
        .expect("list");
    assert_eq!(in_sprint.total, 1);
    assert_eq!(in_sprint.items[0].id, assigned.id);

    let loose = services
        .backlog
        .list(&ItemQuery {
            sprint_id: Some("NONE".into()),
            ..ItemQuery::default()
        })
        .expect("list");
    assert_eq!(loose.total, 1);
    assert_eq!(loose.items[0].title, "Loose");
}

#[test]
fn errors_carry_their_category() {
    let (services, actor, project, _dir) = setup();
    let err = services
        .backlog
        .get(Uuid::new_v4())
        .expect_err("missing");
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let mut bad = item(project, "Bad");
    bad.priority = "Someday".into();
    let err = services.backlog.create(actor, bad).expect_err("bad");
    assert!(matches!(err, BacklogError::InvalidPriority(_)));
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(err.code().code(), "E2001");
}
