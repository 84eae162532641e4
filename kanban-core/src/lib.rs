//! Kanban Core
//!
//! State layer for a mobile Kanban board.
//!
//! Layered architecture:
//! - domain: entities, permission model and validation
//! - repository: storage traits with SQLite and in-memory backends
//! - store: project, user, team and board state the screens call into
//! - config: settings and storage location

use std::sync::Arc;

pub mod config;
pub mod domain;
pub mod repository;
pub mod seed;
pub mod store;

pub use config::{AppConfig, ConfigError, StorageKind};
pub use domain::{DomainError, DomainResult};
pub use store::{Board, KanbanStore, ProjectStore, TeamStore, UserStore};

use domain::{Column, Project, Task, Team, User};
use repository::{
    init_db, InMemoryRepository, KeyValueStore, MemoryKeyValueStore, Repository, SqliteKeyValueStore, SqliteRepository,
};

/// Stores shared by every screen
pub struct AppState {
    pub config: AppConfig,
    pub projects: Arc<ProjectStore>,
    pub users: Arc<UserStore>,
    pub teams: Arc<TeamStore>,
    pub kanban: Arc<KanbanStore>,
    pub board: Board,
}

/// Install the rolling file logger under the configured data dir
pub fn init_logging(config: &AppConfig) -> Result<(), rolling_logger::LoggerError> {
    rolling_logger::init_logger_with(config.log_dir(), "Kanban", config.logger_options())
}

/// Open storage, seed it if asked, and wire the stores together.
///
/// Projects and users use the configured backend; teams and boards are
/// always held in memory.
pub async fn bootstrap(config: AppConfig) -> DomainResult<AppState> {
    let (project_repo, user_repo, storage): (
        Arc<dyn Repository<Project>>,
        Arc<dyn Repository<User>>,
        Arc<dyn KeyValueStore>,
    ) = match config.storage {
        StorageKind::Sqlite => {
            let db = init_db(&config.db_path())?;
            (
                Arc::new(SqliteRepository::<Project>::new(db.clone(), "projects")),
                Arc::new(SqliteRepository::<User>::new(db.clone(), "users")),
                Arc::new(SqliteKeyValueStore::new(db)),
            )
        }
        StorageKind::Memory => (
            Arc::new(InMemoryRepository::<Project>::new()),
            Arc::new(InMemoryRepository::<User>::new()),
            Arc::new(MemoryKeyValueStore::new()),
        ),
    };

    if config.seed_demo_data {
        let projects = seed::seed_if_empty(project_repo.as_ref(), seed::demo_projects()).await?;
        let users = seed::seed_if_empty(user_repo.as_ref(), seed::demo_users()?).await?;
        tracing::info!(projects, users, "demo data seeded");
    }

    let latency = config.latency();
    let projects = Arc::new(ProjectStore::open(project_repo, storage.clone(), latency).await);
    let users = Arc::new(UserStore::open(user_repo, storage, latency).await);
    let teams = Arc::new(TeamStore::new(Arc::new(InMemoryRepository::<Team>::new())));
    let kanban = Arc::new(KanbanStore::new(
        Arc::new(InMemoryRepository::<Column>::new()),
        Arc::new(InMemoryRepository::<Task>::new()),
        teams.clone(),
    ));
    let board = Board::new(teams.clone(), kanban.clone());

    tracing::info!(storage = ?config.storage, data_dir = %config.data_dir.display(), "state layer ready");
    Ok(AppState {
        config,
        projects,
        users,
        teams,
        kanban,
        board,
    })
}
