//! Store Tests
//!
//! Exercises the stores together over in-memory repositories.

use std::sync::Arc;
use std::time::Duration;

use touch_drag::{DragGesture, DragOutcome};

use crate::domain::{
    Column, DomainError, MemberRole, NewMember, NewTask, NewUser, PermissionAction, Permissions, Project, Task,
    TaskPatch, Team, TeamPatch, User, UserFilters, UserPatch, UserRole, DEFAULT_ADMIN_ID,
};
use crate::repository::{InMemoryRepository, KeyValueStore, MemoryKeyValueStore, Repository};
use crate::store::{Board, KanbanStore, Latency, ProjectStore, TeamStore, UserStore};

fn storage() -> Arc<dyn KeyValueStore> {
    Arc::new(MemoryKeyValueStore::new())
}

async fn project_store(storage: Arc<dyn KeyValueStore>) -> ProjectStore {
    ProjectStore::open(Arc::new(InMemoryRepository::<Project>::new()), storage, Latency::none()).await
}

async fn user_store(storage: Arc<dyn KeyValueStore>) -> UserStore {
    UserStore::open(Arc::new(InMemoryRepository::<User>::new()), storage, Latency::none()).await
}

struct BoardFixture {
    teams: Arc<TeamStore>,
    kanban: Arc<KanbanStore>,
    board: Board,
    project: Project,
}

async fn board_fixture() -> BoardFixture {
    let teams = Arc::new(TeamStore::new(Arc::new(InMemoryRepository::<Team>::new())));
    let kanban = Arc::new(KanbanStore::new(
        Arc::new(InMemoryRepository::<Column>::new()),
        Arc::new(InMemoryRepository::<Task>::new()),
        teams.clone(),
    ));
    let board = Board::new(teams.clone(), kanban.clone());
    let project = Project::new("Site".to_string(), String::new());
    board.open(&project).await.expect("Failed to open board");

    BoardFixture {
        teams,
        kanban,
        board,
        project,
    }
}

impl BoardFixture {
    async fn column_id(&self, order: usize) -> String {
        self.kanban.get_project_columns(&self.project.id).await.unwrap()[order].id.clone()
    }

    async fn task_in(&self, order: usize, title: &str) -> Task {
        let mut data = NewTask::new(self.project.id.clone(), title);
        data.column_id = Some(self.column_id(order).await);
        self.kanban.add_task(data, DEFAULT_ADMIN_ID).await.unwrap()
    }

    async fn member(&self, role: MemberRole) -> String {
        let member = NewMember {
            name: format!("{:?}", role),
            email: format!("{:?}@example.com", role).to_lowercase(),
            role,
        };
        self.teams
            .add_member(&self.project.id, member, DEFAULT_ADMIN_ID)
            .await
            .unwrap()
            .id
    }

    async fn drag(&self, task_id: &str, dx: f64, actor: &str) -> Option<Task> {
        let mut gesture = DragGesture::new();
        gesture.start(200.0);
        gesture.update(200.0 + dx);
        let outcome = gesture.release(200.0 + dx);
        self.board.apply_drag(task_id, outcome, actor).await.unwrap()
    }
}

// ========================
// Project store
// ========================

#[tokio::test]
async fn test_duplicate_project_name_is_rejected() {
    let store = project_store(storage()).await;
    store.create_project("Harbor Wall", "").await.unwrap();

    let err = store.create_project("harbor wall", "again").await.unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));

    let state = store.state().await;
    assert_eq!(state.projects.len(), 1);
    assert!(!state.status.is_loading);
    assert_eq!(state.status.error, Some(err.to_string()));
}

#[tokio::test]
async fn test_empty_project_name_is_rejected() {
    let store = project_store(storage()).await;
    assert!(matches!(
        store.create_project("   ", "").await,
        Err(DomainError::Validation(_))
    ));
    assert!(store.state().await.projects.is_empty());
}

#[tokio::test]
async fn test_select_project_leaves_single_active() {
    let store = project_store(storage()).await;
    let a = store.create_project("A", "").await.unwrap();
    let b = store.create_project("B", "").await.unwrap();

    store.select_project(&a.id).await.unwrap();
    store.select_project(&b.id).await.unwrap();

    let state = store.state().await;
    let active: Vec<&Project> = state.projects.iter().filter(|p| p.is_active).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(Some(active[0]), state.current_project.as_ref());
    assert_eq!(active[0].id, b.id);

    // Repository agrees after a reload
    let reloaded = store.get_projects().await.unwrap();
    assert_eq!(reloaded.iter().filter(|p| p.is_active).count(), 1);
}

#[tokio::test]
async fn test_select_unknown_project_fails() {
    let store = project_store(storage()).await;
    let a = store.create_project("A", "").await.unwrap();
    store.select_project(&a.id).await.unwrap();

    let err = store.select_project("missing").await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound(_)));
    assert_eq!(store.current_project().await.map(|p| p.id), Some(a.id));
}

#[tokio::test]
async fn test_delete_current_project_clears_selection() {
    let store = project_store(storage()).await;
    let a = store.create_project("A", "").await.unwrap();
    let b = store.create_project("B", "").await.unwrap();
    store.select_project(&a.id).await.unwrap();

    store.delete_project(&b.id).await.unwrap();
    assert!(store.current_project().await.is_some());

    store.delete_project(&a.id).await.unwrap();
    let state = store.state().await;
    assert!(state.current_project.is_none());
    assert!(state.projects.is_empty());

    assert!(matches!(store.delete_project(&a.id).await, Err(DomainError::NotFound(_))));
}

#[tokio::test]
async fn test_get_projects_deduplicates() {
    let p = Project::new("Seeded".to_string(), String::new());
    let q = Project::new("Other".to_string(), String::new());
    let repo = Arc::new(InMemoryRepository::with_items(vec![p.clone(), q, p]));
    let store = ProjectStore::open(repo, storage(), Latency::none()).await;

    let projects = store.get_projects().await.unwrap();
    let names: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Seeded", "Other"]);
}

#[tokio::test]
async fn test_update_project_keeps_names_unique() {
    let store = project_store(storage()).await;
    let a = store.create_project("A", "").await.unwrap();
    store.create_project("B", "").await.unwrap();
    store.select_project(&a.id).await.unwrap();

    assert!(matches!(
        store.update_project(&a.id, Some("b"), None).await,
        Err(DomainError::Validation(_))
    ));

    // Renaming to itself with different case is fine
    let renamed = store.update_project(&a.id, Some("a"), Some("docs")).await.unwrap();
    assert_eq!(renamed.name, "a");
    assert_eq!(store.current_project().await.unwrap().description, "docs");
}

#[tokio::test]
async fn test_project_state_survives_restart() {
    let storage = storage();
    let repo: Arc<dyn Repository<Project>> = Arc::new(InMemoryRepository::new());

    let before = {
        let store = ProjectStore::open(repo.clone(), storage.clone(), Latency::none()).await;
        store.create_project("A", "first").await.unwrap();
        let b = store.create_project("B", "second").await.unwrap();
        store.select_project(&b.id).await.unwrap();
        store.snapshot().await
    };

    let store = ProjectStore::open(repo, storage, Latency::none()).await;
    let after = store.snapshot().await;
    assert_eq!(after, before);
    assert_eq!(after.projects.len(), 2);
    assert_eq!(after.current_project.map(|p| p.name), Some("B".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_mutation_is_refused() {
    let store = ProjectStore::open(
        Arc::new(InMemoryRepository::<Project>::new()),
        storage(),
        Latency::from_millis(300),
    )
    .await;

    let (first, second) = tokio::join!(store.create_project("A", ""), store.create_project("B", ""));
    assert!(first.is_ok());
    assert!(matches!(second, Err(DomainError::Conflict(_))));

    let state = store.state().await;
    assert_eq!(state.projects.len(), 1);
    assert!(!state.status.is_loading);
    // The refused call never owned the loading state
    assert!(state.status.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_loading_flag_during_latency() {
    let store = Arc::new(
        ProjectStore::open(
            Arc::new(InMemoryRepository::<Project>::new()),
            storage(),
            Latency::from_millis(500),
        )
        .await,
    );

    let pending = tokio::spawn({
        let store = store.clone();
        async move { store.create_project("A", "").await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(store.state().await.status.is_loading);

    pending.await.unwrap().unwrap();
    assert!(!store.state().await.status.is_loading);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_action_releases_loading() {
    let store = ProjectStore::open(
        Arc::new(InMemoryRepository::<Project>::new()),
        storage(),
        Latency::from_millis(300),
    )
    .await;

    let abandoned = tokio::time::timeout(Duration::from_millis(10), store.create_project("A", "")).await;
    assert!(abandoned.is_err());
    assert!(!store.state().await.status.is_loading);

    tokio::time::sleep(Duration::from_millis(500)).await;
    let created = store.create_project("B", "").await.unwrap();
    assert_eq!(created.name, "B");

    let state = store.state().await;
    assert_eq!(state.projects.len(), 1);
    assert!(!state.status.is_loading);
    assert!(state.status.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_user_action_releases_loading() {
    let store = UserStore::open(
        Arc::new(InMemoryRepository::<User>::new()),
        storage(),
        Latency::from_millis(300),
    )
    .await;

    let abandoned = tokio::time::timeout(Duration::from_millis(10), store.fetch_users()).await;
    assert!(abandoned.is_err());

    store
        .create_user(new_user("Ana", "ana@example.com", UserRole::Admin, "Field"))
        .await
        .unwrap();
    assert!(!store.state().await.status.is_loading);
}

#[tokio::test]
async fn test_project_changes_are_published() {
    let store = project_store(storage()).await;
    let rx = store.subscribe();
    let before = *rx.borrow();

    store.create_project("A", "").await.unwrap();
    assert!(*rx.borrow() > before);
}

// ========================
// User store
// ========================

fn new_user(name: &str, email: &str, role: UserRole, department: &str) -> NewUser {
    NewUser {
        name: name.to_string(),
        email: email.to_string(),
        role,
        department: Some(department.to_string()),
        ..NewUser::default()
    }
}

#[tokio::test]
async fn test_user_email_must_be_unique() {
    let store = user_store(storage()).await;
    store
        .create_user(new_user("Ana", "ana@example.com", UserRole::Member, "Field"))
        .await
        .unwrap();

    let err = store
        .create_user(new_user("Ana B", "ANA@example.com", UserRole::Member, "Field"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
    assert_eq!(store.state().await.users.len(), 1);
}

#[tokio::test]
async fn test_user_filters() {
    let store = user_store(storage()).await;
    store
        .create_user(new_user("Ana", "ana@example.com", UserRole::Manager, "Field"))
        .await
        .unwrap();
    store
        .create_user(new_user("Ben", "ben@example.com", UserRole::Member, "Office"))
        .await
        .unwrap();

    store
        .set_filters(UserFilters {
            department: Some("Office".to_string()),
            ..UserFilters::default()
        })
        .await;
    let names: Vec<String> = store.filtered_users().await.into_iter().map(|u| u.name).collect();
    assert_eq!(names, vec!["Ben"]);

    store.clear_filters().await;
    assert_eq!(store.filtered_users().await.len(), 2);
}

#[tokio::test]
async fn test_user_state_survives_restart() {
    let storage = storage();
    let repo: Arc<dyn Repository<User>> = Arc::new(InMemoryRepository::new());

    let before = {
        let store = UserStore::open(repo.clone(), storage.clone(), Latency::none()).await;
        let ana = store
            .create_user(new_user("Ana", "ana@example.com", UserRole::Admin, "Field"))
            .await
            .unwrap();
        store.set_current_user(Some(&ana.id)).await.unwrap();
        store
            .set_filters(UserFilters {
                role: Some(UserRole::Admin),
                ..UserFilters::default()
            })
            .await;
        store.snapshot().await
    };

    let store = UserStore::open(repo, storage, Latency::none()).await;
    assert_eq!(store.snapshot().await, before);
    assert_eq!(store.state().await.current_user.map(|u| u.name), Some("Ana".to_string()));
}

#[tokio::test]
async fn test_update_and_delete_current_user() {
    let store = user_store(storage()).await;
    let ana = store
        .create_user(new_user("Ana", "ana@example.com", UserRole::Member, "Field"))
        .await
        .unwrap();
    store.set_current_user(Some(&ana.id)).await.unwrap();

    let patch = UserPatch {
        position: Some(Some("Foreman".to_string())),
        ..Default::default()
    };
    store.update_user(&ana.id, patch).await.unwrap();
    assert_eq!(
        store.state().await.current_user.and_then(|u| u.position),
        Some("Foreman".to_string())
    );

    store.delete_user(&ana.id).await.unwrap();
    assert!(store.state().await.current_user.is_none());
    assert!(matches!(
        store.set_current_user(Some(&ana.id)).await,
        Err(DomainError::NotFound(_))
    ));
}

// ========================
// Team store
// ========================

#[tokio::test]
async fn test_default_team_is_provisioned_once() {
    let fx = board_fixture().await;
    let first = fx.teams.get_team(&fx.project.id).await.unwrap().unwrap();
    let again = fx.teams.ensure_default_team(&fx.project.id, "Renamed").await.unwrap();

    assert_eq!(first, again);
    assert_eq!(again.members.len(), 1);
    assert_eq!(again.members[0].id, DEFAULT_ADMIN_ID);
    assert_eq!(fx.teams.list_teams().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_default_team_is_created_once() {
    let teams = Arc::new(TeamStore::new(Arc::new(InMemoryRepository::<Team>::new())));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let teams = teams.clone();
            tokio::spawn(async move { teams.ensure_default_team("p-roof", "Roof").await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().id, "p-roof");
    }

    assert_eq!(teams.list_teams().await.unwrap().len(), 1);
    assert!(teams.last_error().await.is_none());
}

#[tokio::test]
async fn test_permission_checks_fail_closed() {
    let fx = board_fixture().await;

    assert!(
        fx.teams
            .can_member_perform_action(&fx.project.id, DEFAULT_ADMIN_ID, PermissionAction::DeleteTask)
            .await
    );
    assert!(
        !fx.teams
            .can_member_perform_action(&fx.project.id, "stranger", PermissionAction::CreateTask)
            .await
    );
    assert!(
        !fx.teams
            .can_member_perform_action("no-team", DEFAULT_ADMIN_ID, PermissionAction::CreateTask)
            .await
    );
}

#[tokio::test]
async fn test_member_permissions_diverge_from_role() {
    let fx = board_fixture().await;
    let member = fx.member(MemberRole::Member).await;
    assert!(
        fx.teams
            .can_member_perform_action(&fx.project.id, &member, PermissionAction::MoveTask)
            .await
    );

    let restricted = Permissions {
        can_move_task: false,
        ..Permissions::for_role(MemberRole::Member)
    };
    let updated = fx
        .teams
        .update_member_permissions(&fx.project.id, &member, restricted, DEFAULT_ADMIN_ID)
        .await
        .unwrap();
    assert_eq!(updated.role, MemberRole::Member);
    assert!(
        !fx.teams
            .can_member_perform_action(&fx.project.id, &member, PermissionAction::MoveTask)
            .await
    );

    // Role change without reseed keeps the custom flags
    let promoted = fx
        .teams
        .update_member_role(&fx.project.id, &member, MemberRole::Manager, false, DEFAULT_ADMIN_ID)
        .await
        .unwrap();
    assert!(!promoted.permissions.can_move_task);

    let reseeded = fx
        .teams
        .update_member_role(&fx.project.id, &member, MemberRole::Manager, true, DEFAULT_ADMIN_ID)
        .await
        .unwrap();
    assert_eq!(reseeded.permissions, Permissions::for_role(MemberRole::Manager));
}

#[tokio::test]
async fn test_team_management_needs_permission() {
    let fx = board_fixture().await;
    let member = fx.member(MemberRole::Member).await;

    let outsider = NewMember {
        name: "Eve".to_string(),
        email: "eve@example.com".to_string(),
        role: MemberRole::Admin,
    };
    assert!(matches!(
        fx.teams.add_member(&fx.project.id, outsider, &member).await,
        Err(DomainError::PermissionDenied(_))
    ));
    assert!(fx.teams.last_error().await.is_some());
    assert_eq!(fx.teams.get_team(&fx.project.id).await.unwrap().unwrap().members.len(), 2);
}

#[tokio::test]
async fn test_duplicate_member_email_rejected() {
    let fx = board_fixture().await;
    fx.member(MemberRole::Viewer).await;

    let dup = NewMember {
        name: "Other".to_string(),
        email: "VIEWER@example.com".to_string(),
        role: MemberRole::Viewer,
    };
    assert!(matches!(
        fx.teams.add_member(&fx.project.id, dup, DEFAULT_ADMIN_ID).await,
        Err(DomainError::Validation(_))
    ));
}

#[tokio::test]
async fn test_last_manager_cannot_leave() {
    let fx = board_fixture().await;
    let member = fx.member(MemberRole::Member).await;

    assert!(matches!(
        fx.teams
            .remove_member(&fx.project.id, DEFAULT_ADMIN_ID, DEFAULT_ADMIN_ID)
            .await,
        Err(DomainError::Validation(_))
    ));
    assert!(matches!(
        fx.teams
            .update_member_permissions(&fx.project.id, DEFAULT_ADMIN_ID, Permissions::default(), DEFAULT_ADMIN_ID)
            .await,
        Err(DomainError::Validation(_))
    ));

    fx.teams
        .remove_member(&fx.project.id, &member, DEFAULT_ADMIN_ID)
        .await
        .unwrap();
    let team = fx.teams.get_team(&fx.project.id).await.unwrap().unwrap();
    assert_eq!(team.members.len(), 1);
}

#[tokio::test]
async fn test_create_team_requires_manager_creator() {
    let teams = TeamStore::new(Arc::new(InMemoryRepository::<Team>::new()));
    let viewer = NewMember {
        name: "Vic".to_string(),
        email: "vic@example.com".to_string(),
        role: MemberRole::Viewer,
    };
    assert!(matches!(
        teams.create_team("p1", "Crew", "", viewer).await,
        Err(DomainError::Validation(_))
    ));

    let lead = NewMember {
        name: "Lea".to_string(),
        email: "lea@example.com".to_string(),
        role: MemberRole::Manager,
    };
    let team = teams.create_team("p1", "Crew", "", lead.clone()).await.unwrap();
    assert_eq!(team.created_by, team.members[0].id);
    assert!(matches!(
        teams.create_team("p1", "Crew 2", "", lead).await,
        Err(DomainError::Validation(_))
    ));
}

#[tokio::test]
async fn test_delete_team_needs_permission() {
    let fx = board_fixture().await;
    let member = fx.member(MemberRole::Member).await;

    assert!(matches!(
        fx.teams.delete_team(&fx.project.id, &member).await,
        Err(DomainError::PermissionDenied(_))
    ));
    fx.teams.delete_team(&fx.project.id, DEFAULT_ADMIN_ID).await.unwrap();
    assert!(fx.teams.get_team(&fx.project.id).await.unwrap().is_none());

    // With the team gone every check is denied
    assert!(
        !fx.teams
            .can_member_perform_action(&fx.project.id, DEFAULT_ADMIN_ID, PermissionAction::CreateTask)
            .await
    );
}

// ========================
// Kanban store
// ========================

#[tokio::test]
async fn test_initialize_columns_is_idempotent() {
    let fx = board_fixture().await;
    let columns = fx.kanban.initialize_project_columns(&fx.project.id).await.unwrap();
    assert_eq!(columns.len(), 3);

    let titles: Vec<&str> = columns.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["To Do", "In Progress", "Done"]);
    let orders: Vec<i32> = columns.iter().map(|c| c.order).collect();
    assert_eq!(orders, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_initialize_uses_team_custom_columns() {
    let teams = Arc::new(TeamStore::new(Arc::new(InMemoryRepository::<Team>::new())));
    let kanban = KanbanStore::new(
        Arc::new(InMemoryRepository::<Column>::new()),
        Arc::new(InMemoryRepository::<Task>::new()),
        teams.clone(),
    );
    teams.ensure_default_team("p1", "Shop").await.unwrap();
    let patch = TeamPatch {
        custom_columns: Some(vec!["Backlog".to_string(), " ".to_string(), "Shipped".to_string()]),
        ..TeamPatch::default()
    };
    teams.update_team("p1", patch, DEFAULT_ADMIN_ID).await.unwrap();

    let columns = kanban.initialize_project_columns("p1").await.unwrap();
    let titles: Vec<&str> = columns.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Backlog", "Shipped"]);
}

#[tokio::test]
async fn test_add_task_defaults_to_first_column_by_order() {
    let fx = board_fixture().await;
    let mut ids: Vec<String> = fx
        .kanban
        .get_project_columns(&fx.project.id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    ids.reverse();
    fx.kanban
        .reorder_columns(&fx.project.id, &ids, DEFAULT_ADMIN_ID)
        .await
        .unwrap();

    let task = fx
        .kanban
        .add_task(NewTask::new(fx.project.id.clone(), "Survey"), DEFAULT_ADMIN_ID)
        .await
        .unwrap();
    assert_eq!(task.column_id, ids[0]);
    assert_eq!(fx.kanban.get_project_tasks(&fx.project.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_add_task_without_columns_fails() {
    let fx = board_fixture().await;
    fx.teams.ensure_default_team("bare", "Bare").await.unwrap();

    let err = fx
        .kanban
        .add_task(NewTask::new("bare", "Orphan"), DEFAULT_ADMIN_ID)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
    assert_eq!(fx.kanban.last_error().await, Some(err.to_string()));
}

#[tokio::test]
async fn test_viewer_cannot_add_task() {
    let fx = board_fixture().await;
    let viewer = fx.member(MemberRole::Viewer).await;

    assert!(matches!(
        fx.kanban
            .add_task(NewTask::new(fx.project.id.clone(), "Nope"), &viewer)
            .await,
        Err(DomainError::PermissionDenied(_))
    ));
    assert!(fx.kanban.get_project_tasks(&fx.project.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_move_without_permission_keeps_column() {
    let fx = board_fixture().await;
    let task = fx.task_in(0, "Frame walls").await;
    let viewer = fx.member(MemberRole::Viewer).await;
    let target = fx.column_id(1).await;

    let err = fx.kanban.move_task(&task.id, &target, &viewer).await.unwrap_err();
    assert!(matches!(err, DomainError::PermissionDenied(_)));
    assert_eq!(fx.kanban.get_task(&task.id).await.unwrap().column_id, task.column_id);
}

#[tokio::test]
async fn test_move_task() {
    let fx = board_fixture().await;
    let task = fx.task_in(0, "Frame walls").await;
    let member = fx.member(MemberRole::Member).await;
    let target = fx.column_id(2).await;

    let moved = fx.kanban.move_task(&task.id, &target, &member).await.unwrap();
    assert_eq!(moved.column_id, target);
    assert!(moved.updated_at >= task.updated_at);
    assert_eq!(fx.kanban.get_column_tasks(&target).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_move_to_foreign_column_rejected() {
    let fx = board_fixture().await;
    let task = fx.task_in(0, "Frame walls").await;

    let other = Project::new("Other".to_string(), String::new());
    let other_view = fx.board.open(&other).await.unwrap();
    let foreign = other_view.columns[1].column.id.clone();

    assert!(matches!(
        fx.kanban.move_task(&task.id, &foreign, DEFAULT_ADMIN_ID).await,
        Err(DomainError::Validation(_))
    ));
    assert_eq!(fx.kanban.get_task(&task.id).await.unwrap().column_id, task.column_id);
}

#[tokio::test]
async fn test_update_and_delete_task_permissions() {
    let fx = board_fixture().await;
    let task = fx.task_in(0, "Frame walls").await;
    let member = fx.member(MemberRole::Member).await;

    let patch = TaskPatch {
        title: Some(" Frame north wall ".to_string()),
        spent_hours: Some(3.0),
        ..TaskPatch::default()
    };
    let updated = fx.kanban.update_task(&task.id, patch, &member).await.unwrap();
    assert_eq!(updated.title, "Frame north wall");
    assert_eq!(updated.column_id, task.column_id);

    let commented = fx.kanban.add_comment(&task.id, "Studs arrived", &member).await.unwrap();
    assert_eq!(commented.comments.len(), 1);
    assert_eq!(commented.comments[0].author_id, member);

    assert!(matches!(
        fx.kanban.delete_task(&task.id, &member).await,
        Err(DomainError::PermissionDenied(_))
    ));
    fx.kanban.delete_task(&task.id, DEFAULT_ADMIN_ID).await.unwrap();
    assert!(matches!(fx.kanban.get_task(&task.id).await, Err(DomainError::NotFound(_))));
}

#[tokio::test]
async fn test_delete_column_reassigns_tasks() {
    let fx = board_fixture().await;
    let first = fx.column_id(0).await;
    let middle = fx.column_id(1).await;
    fx.task_in(1, "A").await;
    fx.task_in(1, "B").await;
    fx.task_in(2, "C").await;

    // Tasks land in the first remaining column
    let moved = fx.kanban.delete_column(&middle, DEFAULT_ADMIN_ID).await.unwrap();
    assert_eq!(moved, 2);

    let columns = fx.kanban.get_project_columns(&fx.project.id).await.unwrap();
    let orders: Vec<i32> = columns.iter().map(|c| c.order).collect();
    assert_eq!(orders, vec![0, 1]);

    let tasks = fx.kanban.get_project_tasks(&fx.project.id).await.unwrap();
    assert!(tasks.iter().all(|t| columns.iter().any(|c| c.id == t.column_id)));
    assert_eq!(fx.kanban.get_column_tasks(&first).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_first_column_moves_tasks_right() {
    let fx = board_fixture().await;
    let first = fx.column_id(0).await;
    let second = fx.column_id(1).await;
    let task = fx.task_in(0, "A").await;

    fx.kanban.delete_column(&first, DEFAULT_ADMIN_ID).await.unwrap();
    assert_eq!(fx.kanban.get_task(&task.id).await.unwrap().column_id, second);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tasks_added_during_column_delete_stay_on_board() {
    for _ in 0..25 {
        let fx = board_fixture().await;
        let first = fx.column_id(0).await;

        let adds: Vec<_> = (0..20)
            .map(|i| {
                let kanban = fx.kanban.clone();
                let data = NewTask::new(fx.project.id.clone(), format!("Task {}", i));
                tokio::spawn(async move { kanban.add_task(data, DEFAULT_ADMIN_ID).await })
            })
            .collect();
        let kanban = fx.kanban.clone();
        let delete = tokio::spawn(async move { kanban.delete_column(&first, DEFAULT_ADMIN_ID).await });

        for add in adds {
            add.await.unwrap().unwrap();
        }
        delete.await.unwrap().unwrap();

        let column_ids: Vec<String> = fx
            .kanban
            .get_project_columns(&fx.project.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        let tasks = fx.kanban.get_project_tasks(&fx.project.id).await.unwrap();
        assert_eq!(tasks.len(), 20);
        assert!(tasks.iter().all(|t| column_ids.contains(&t.column_id)));
    }
}

#[tokio::test]
async fn test_last_column_cannot_be_deleted() {
    let fx = board_fixture().await;
    fx.kanban.delete_column(&fx.column_id(0).await, DEFAULT_ADMIN_ID).await.unwrap();
    fx.kanban.delete_column(&fx.column_id(0).await, DEFAULT_ADMIN_ID).await.unwrap();

    let last = fx.column_id(0).await;
    assert!(matches!(
        fx.kanban.delete_column(&last, DEFAULT_ADMIN_ID).await,
        Err(DomainError::Validation(_))
    ));
}

#[tokio::test]
async fn test_column_management_needs_permission() {
    let fx = board_fixture().await;
    let member = fx.member(MemberRole::Member).await;

    assert!(matches!(
        fx.kanban.add_column(&fx.project.id, "QA", &member).await,
        Err(DomainError::PermissionDenied(_))
    ));

    let qa = fx.kanban.add_column(&fx.project.id, "QA", DEFAULT_ADMIN_ID).await.unwrap();
    assert_eq!(qa.order, 3);

    let renamed = fx.kanban.update_column(&qa.id, "Review", DEFAULT_ADMIN_ID).await.unwrap();
    assert_eq!(renamed.title, "Review");
}

#[tokio::test]
async fn test_reorder_requires_full_permutation() {
    let fx = board_fixture().await;
    let a = fx.column_id(0).await;
    let b = fx.column_id(1).await;

    assert!(matches!(
        fx.kanban
            .reorder_columns(&fx.project.id, &[a.clone(), b.clone()], DEFAULT_ADMIN_ID)
            .await,
        Err(DomainError::Validation(_))
    ));
    assert!(matches!(
        fx.kanban
            .reorder_columns(&fx.project.id, &[a.clone(), a.clone(), b.clone()], DEFAULT_ADMIN_ID)
            .await,
        Err(DomainError::Validation(_))
    ));

    let c = fx.column_id(2).await;
    let reordered = fx
        .kanban
        .reorder_columns(&fx.project.id, &[c.clone(), a.clone(), b.clone()], DEFAULT_ADMIN_ID)
        .await
        .unwrap();
    let ids: Vec<&str> = reordered.iter().map(|col| col.id.as_str()).collect();
    assert_eq!(ids, vec![c.as_str(), a.as_str(), b.as_str()]);
    assert_eq!(fx.column_id(0).await, c);
}

// ========================
// Drag to move
// ========================

#[tokio::test]
async fn test_short_drag_does_not_move() {
    let fx = board_fixture().await;
    let task = fx.task_in(1, "Wire panel").await;

    assert!(fx.drag(&task.id, 29.0, DEFAULT_ADMIN_ID).await.is_none());
    assert!(fx.drag(&task.id, -29.0, DEFAULT_ADMIN_ID).await.is_none());
    assert_eq!(fx.kanban.get_task(&task.id).await.unwrap().column_id, task.column_id);
}

#[tokio::test]
async fn test_committed_drag_moves_one_column() {
    let fx = board_fixture().await;
    let task = fx.task_in(1, "Wire panel").await;

    let moved = fx.drag(&task.id, 31.0, DEFAULT_ADMIN_ID).await.unwrap();
    assert_eq!(moved.column_id, fx.column_id(2).await);

    // Already rightmost
    assert!(fx.drag(&task.id, 120.0, DEFAULT_ADMIN_ID).await.is_none());
    assert_eq!(fx.kanban.get_task(&task.id).await.unwrap().column_id, fx.column_id(2).await);

    let back = fx.drag(&task.id, -31.0, DEFAULT_ADMIN_ID).await.unwrap();
    assert_eq!(back.column_id, fx.column_id(1).await);
}

#[tokio::test]
async fn test_leftward_drag_at_first_column_is_noop() {
    let fx = board_fixture().await;
    let task = fx.task_in(0, "Order parts").await;
    assert!(fx.drag(&task.id, -200.0, DEFAULT_ADMIN_ID).await.is_none());
}

#[tokio::test]
async fn test_drag_respects_move_permission() {
    let fx = board_fixture().await;
    let task = fx.task_in(0, "Order parts").await;
    let viewer = fx.member(MemberRole::Viewer).await;

    let mut gesture = DragGesture::new();
    gesture.start(0.0);
    let outcome = gesture.release(80.0);
    assert!(matches!(
        fx.board.apply_drag(&task.id, outcome, &viewer).await,
        Err(DomainError::PermissionDenied(_))
    ));
    assert_eq!(fx.kanban.get_task(&task.id).await.unwrap().column_id, task.column_id);
}

#[tokio::test]
async fn test_interrupted_drag_is_noop() {
    let fx = board_fixture().await;
    let task = fx.task_in(0, "Order parts").await;

    let mut gesture = DragGesture::new();
    gesture.start(0.0);
    gesture.update(150.0);
    let outcome = gesture.terminate();
    assert_eq!(outcome, DragOutcome::SnapBack);
    assert!(fx.board.apply_drag(&task.id, outcome, DEFAULT_ADMIN_ID).await.unwrap().is_none());
}

#[tokio::test]
async fn test_drag_on_deleted_task_records_error() {
    let fx = board_fixture().await;
    let task = fx.task_in(0, "Stale card").await;
    fx.kanban.delete_task(&task.id, DEFAULT_ADMIN_ID).await.unwrap();

    let mut gesture = DragGesture::new();
    gesture.start(200.0);
    gesture.update(260.0);
    let outcome = gesture.release(260.0);
    assert!(outcome.direction().is_some());

    let result = fx.board.apply_drag(&task.id, outcome, DEFAULT_ADMIN_ID).await;
    assert!(matches!(result, Err(DomainError::NotFound(_))));
    assert!(fx.kanban.last_error().await.is_some());
}

#[tokio::test]
async fn test_board_view_groups_tasks() {
    let fx = board_fixture().await;
    let a = fx.task_in(0, "A").await;
    fx.task_in(0, "B").await;
    fx.task_in(2, "C").await;

    let view = fx.board.view(&fx.project.id).await.unwrap();
    let counts: Vec<usize> = view.columns.iter().map(|bc| bc.tasks.len()).collect();
    assert_eq!(counts, vec![2, 0, 1]);
    assert_eq!(view.task_count(), 3);
    assert_eq!(view.column_of(&a.id).map(|c| c.order), Some(0));
    // Insertion order inside a column
    assert_eq!(view.columns[0].tasks[0].title, "A");
}
