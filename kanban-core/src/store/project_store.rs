//! Project Store
//!
//! Project list plus the current selection, mirrored to device storage
//! under `project-storage`. Every action waits the simulated latency.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};

use super::persist::PersistedSlot;
use super::state::{ChangeFeed, InFlight, InFlightGuard, Latency, StoreStatus};
use crate::domain::{validate_required, DomainError, DomainResult, Project};
use crate::repository::{KeyValueStore, Repository};

pub const PROJECT_STORAGE_KEY: &str = "project-storage";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectState {
    pub projects: Vec<Project>,
    pub current_project: Option<Project>,
    pub status: StoreStatus,
}

/// Persisted part of [`ProjectState`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    pub projects: Vec<Project>,
    pub current_project: Option<Project>,
}

impl From<&ProjectState> for ProjectSnapshot {
    fn from(state: &ProjectState) -> Self {
        Self {
            projects: state.projects.clone(),
            current_project: state.current_project.clone(),
        }
    }
}

pub struct ProjectStore {
    repo: Arc<dyn Repository<Project>>,
    slot: PersistedSlot<ProjectSnapshot>,
    latency: Latency,
    state: Mutex<ProjectState>,
    in_flight: InFlight,
    changes: ChangeFeed,
}

impl ProjectStore {
    /// Open the store, rehydrating from `storage` when a snapshot exists
    pub async fn open(repo: Arc<dyn Repository<Project>>, storage: Arc<dyn KeyValueStore>, latency: Latency) -> Self {
        let slot: PersistedSlot<ProjectSnapshot> = PersistedSlot::new(PROJECT_STORAGE_KEY, storage);
        let mut state = ProjectState::default();
        if let Some(snapshot) = slot.load().await {
            tracing::debug!(count = snapshot.projects.len(), "projects rehydrated");
            state.projects = snapshot.projects;
            state.current_project = snapshot.current_project;
        }

        Self {
            repo,
            slot,
            latency,
            state: Mutex::new(state),
            in_flight: InFlight::default(),
            changes: ChangeFeed::new(),
        }
    }

    pub async fn state(&self) -> ProjectState {
        let mut state = self.state.lock().await.clone();
        state.status.is_loading = self.in_flight.is_active();
        state
    }

    pub async fn snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot::from(&*self.state.lock().await)
    }

    pub async fn current_project(&self) -> Option<Project> {
        self.state.lock().await.current_project.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Load all projects, dropping repeated ids
    pub async fn get_projects(&self) -> DomainResult<Vec<Project>> {
        let _loading = self.begin().await?;
        self.latency.wait().await;
        let result = self.load_projects().await;
        self.settle("get_projects", result).await
    }

    pub async fn create_project(&self, name: &str, description: &str) -> DomainResult<Project> {
        let _loading = self.begin().await?;
        self.latency.wait().await;
        let result = self.insert_project(name, description).await;
        self.settle("create_project", result).await
    }

    /// Make `id` the single active project and the current one
    pub async fn select_project(&self, id: &str) -> DomainResult<Project> {
        let _loading = self.begin().await?;
        self.latency.wait().await;
        let result = self.activate_project(id).await;
        self.settle("select_project", result).await
    }

    pub async fn update_project(&self, id: &str, name: Option<&str>, description: Option<&str>) -> DomainResult<Project> {
        let _loading = self.begin().await?;
        self.latency.wait().await;
        let result = self.edit_project(id, name, description).await;
        self.settle("update_project", result).await
    }

    pub async fn delete_project(&self, id: &str) -> DomainResult<()> {
        let _loading = self.begin().await?;
        self.latency.wait().await;
        let result = self.remove_project(id).await;
        self.settle("delete_project", result).await
    }

    pub async fn clear_error(&self) {
        self.state.lock().await.status.error = None;
        self.changes.bump();
    }

    async fn begin(&self) -> DomainResult<InFlightGuard<'_>> {
        let guard = self.in_flight.enter()?;
        let mut state = self.state.lock().await;
        state.status.is_loading = true;
        state.status.error = None;
        drop(state);
        self.changes.bump();
        Ok(guard)
    }

    async fn settle<T>(&self, action: &'static str, result: DomainResult<T>) -> DomainResult<T> {
        let mut state = self.state.lock().await;
        state.status.finish(&result);
        match &result {
            Ok(_) => {
                if let Err(e) = self.slot.save(&ProjectSnapshot::from(&*state)).await {
                    tracing::warn!(key = self.slot.key(), error = %e, "failed to persist projects");
                }
            }
            Err(e) => tracing::warn!(action, error = %e, "project action failed"),
        }
        drop(state);
        self.changes.bump();
        result
    }

    async fn load_projects(&self) -> DomainResult<Vec<Project>> {
        let mut seen = HashSet::new();
        let projects: Vec<Project> = self
            .repo
            .list()
            .await?
            .into_iter()
            .filter(|p| seen.insert(p.id.clone()))
            .collect();

        let mut state = self.state.lock().await;
        // Keep the selection only if the project still exists
        let current = state.current_project.take();
        state.current_project = current.and_then(|current| projects.iter().find(|p| p.id == current.id).cloned());
        state.projects = projects.clone();
        Ok(projects)
    }

    async fn insert_project(&self, name: &str, description: &str) -> DomainResult<Project> {
        let name = validate_required("Project name", name)?;
        let existing = self.repo.list().await?;
        if existing.iter().any(|p| p.name_matches(&name)) {
            return Err(DomainError::Validation(format!("A project named '{}' already exists", name)));
        }

        let project = self
            .repo
            .create(&Project::new(name, description.trim().to_string()))
            .await?;
        self.state.lock().await.projects.push(project.clone());
        tracing::info!(project_id = %project.id, name = %project.name, "project created");
        Ok(project)
    }

    async fn activate_project(&self, id: &str) -> DomainResult<Project> {
        let all = self.repo.list().await?;
        let mut selected = all
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("project {}", id)))?;

        for mut project in all {
            let active = project.id == id;
            if project.is_active != active {
                project.is_active = active;
                self.repo.update(&project).await?;
            }
        }
        selected.is_active = true;

        let mut state = self.state.lock().await;
        for project in state.projects.iter_mut() {
            project.is_active = project.id == id;
        }
        if !state.projects.iter().any(|p| p.id == id) {
            state.projects.push(selected.clone());
        }
        state.current_project = Some(selected.clone());
        tracing::info!(project_id = %id, "project selected");
        Ok(selected)
    }

    async fn edit_project(&self, id: &str, name: Option<&str>, description: Option<&str>) -> DomainResult<Project> {
        let all = self.repo.list().await?;
        let mut project = all
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("project {}", id)))?;

        if let Some(name) = name {
            let name = validate_required("Project name", name)?;
            if all.iter().any(|p| p.id != id && p.name_matches(&name)) {
                return Err(DomainError::Validation(format!("A project named '{}' already exists", name)));
            }
            project.name = name;
        }
        if let Some(description) = description {
            project.description = description.trim().to_string();
        }
        project.updated_at = Utc::now();
        self.repo.update(&project).await?;

        let mut state = self.state.lock().await;
        if let Some(cached) = state.projects.iter_mut().find(|p| p.id == id) {
            *cached = project.clone();
        }
        if state.current_project.as_ref().is_some_and(|p| p.id == id) {
            state.current_project = Some(project.clone());
        }
        Ok(project)
    }

    async fn remove_project(&self, id: &str) -> DomainResult<()> {
        self.repo.delete(id).await.map_err(|e| match e {
            DomainError::NotFound(_) => DomainError::NotFound(format!("project {}", id)),
            other => other,
        })?;

        let mut state = self.state.lock().await;
        state.projects.retain(|p| p.id != id);
        if state.current_project.as_ref().is_some_and(|p| p.id == id) {
            state.current_project = None;
        }
        tracing::info!(project_id = %id, "project deleted");
        Ok(())
    }
}
