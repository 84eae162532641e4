//! User Store
//!
//! Profile records, the signed-in profile and list filters, mirrored to
//! device storage under `user-storage`. CRUD actions wait the simulated
//! latency; selection and filter setters apply immediately.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};

use super::persist::PersistedSlot;
use super::state::{ChangeFeed, InFlight, InFlightGuard, Latency, StoreStatus};
use crate::domain::{DomainError, DomainResult, NewUser, User, UserFilters, UserPatch};
use crate::repository::{KeyValueStore, Repository};

pub const USER_STORAGE_KEY: &str = "user-storage";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserState {
    pub users: Vec<User>,
    pub current_user: Option<User>,
    pub filters: UserFilters,
    pub status: StoreStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    pub users: Vec<User>,
    pub current_user: Option<User>,
    pub filters: UserFilters,
}

impl From<&UserState> for UserSnapshot {
    fn from(state: &UserState) -> Self {
        Self {
            users: state.users.clone(),
            current_user: state.current_user.clone(),
            filters: state.filters.clone(),
        }
    }
}

pub struct UserStore {
    repo: Arc<dyn Repository<User>>,
    slot: PersistedSlot<UserSnapshot>,
    latency: Latency,
    state: Mutex<UserState>,
    in_flight: InFlight,
    changes: ChangeFeed,
}

impl UserStore {
    pub async fn open(repo: Arc<dyn Repository<User>>, storage: Arc<dyn KeyValueStore>, latency: Latency) -> Self {
        let slot: PersistedSlot<UserSnapshot> = PersistedSlot::new(USER_STORAGE_KEY, storage);
        let mut state = UserState::default();
        if let Some(snapshot) = slot.load().await {
            state.users = snapshot.users;
            state.current_user = snapshot.current_user;
            state.filters = snapshot.filters;
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

    pub async fn state(&self) -> UserState {
        let mut state = self.state.lock().await.clone();
        state.status.is_loading = self.in_flight.is_active();
        state
    }

    pub async fn snapshot(&self) -> UserSnapshot {
        UserSnapshot::from(&*self.state.lock().await)
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Cached users passing the active filters
    pub async fn filtered_users(&self) -> Vec<User> {
        let state = self.state.lock().await;
        state
            .users
            .iter()
            .filter(|u| u.matches(&state.filters))
            .cloned()
            .collect()
    }

    pub async fn fetch_users(&self) -> DomainResult<Vec<User>> {
        let _loading = self.begin().await?;
        self.latency.wait().await;
        let result = self.load_users().await;
        self.settle("fetch_users", result).await
    }

    pub async fn create_user(&self, data: NewUser) -> DomainResult<User> {
        let _loading = self.begin().await?;
        self.latency.wait().await;
        let result = self.insert_user(data).await;
        self.settle("create_user", result).await
    }

    pub async fn update_user(&self, id: &str, patch: UserPatch) -> DomainResult<User> {
        let _loading = self.begin().await?;
        self.latency.wait().await;
        let result = self.edit_user(id, patch).await;
        self.settle("update_user", result).await
    }

    pub async fn delete_user(&self, id: &str) -> DomainResult<()> {
        let _loading = self.begin().await?;
        self.latency.wait().await;
        let result = self.remove_user(id).await;
        self.settle("delete_user", result).await
    }

    /// Select the profile shown on the profile screen; `None` clears it
    pub async fn set_current_user(&self, id: Option<&str>) -> DomainResult<Option<User>> {
        let user = match id {
            Some(id) => Some(self.find_user(id).await?),
            None => None,
        };

        let mut state = self.state.lock().await;
        state.current_user = user.clone();
        self.persist(&state).await;
        drop(state);
        self.changes.bump();
        Ok(user)
    }

    pub async fn set_filters(&self, filters: UserFilters) {
        let mut state = self.state.lock().await;
        state.filters = filters;
        self.persist(&state).await;
        drop(state);
        self.changes.bump();
    }

    pub async fn clear_filters(&self) {
        self.set_filters(UserFilters::default()).await;
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
            Ok(_) => self.persist(&state).await,
            Err(e) => tracing::warn!(action, error = %e, "user action failed"),
        }
        drop(state);
        self.changes.bump();
        result
    }

    async fn persist(&self, state: &UserState) {
        if let Err(e) = self.slot.save(&UserSnapshot::from(state)).await {
            tracing::warn!(key = self.slot.key(), error = %e, "failed to persist users");
        }
    }

    /// Cached copy first, then the repository
    async fn find_user(&self, id: &str) -> DomainResult<User> {
        if let Some(user) = self.state.lock().await.users.iter().find(|u| u.id == id).cloned() {
            return Ok(user);
        }
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("user {}", id)))
    }

    async fn load_users(&self) -> DomainResult<Vec<User>> {
        let mut seen = HashSet::new();
        let users: Vec<User> = self
            .repo
            .list()
            .await?
            .into_iter()
            .filter(|u| seen.insert(u.id.clone()))
            .collect();

        let mut state = self.state.lock().await;
        let current = state.current_user.take();
        state.current_user = current.and_then(|current| users.iter().find(|u| u.id == current.id).cloned());
        state.users = users.clone();
        Ok(users)
    }

    async fn insert_user(&self, data: NewUser) -> DomainResult<User> {
        let user = User::new(data)?;
        let existing = self.repo.list().await?;
        if existing.iter().any(|u| u.email_matches(&user.email)) {
            return Err(DomainError::Validation(format!("Email {} is already in use", user.email)));
        }

        let user = self.repo.create(&user).await?;
        self.state.lock().await.users.push(user.clone());
        tracing::info!(user_id = %user.id, "user created");
        Ok(user)
    }

    async fn edit_user(&self, id: &str, patch: UserPatch) -> DomainResult<User> {
        let all = self.repo.list().await?;
        let mut user = all
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("user {}", id)))?;

        if let Some(email) = patch.email.as_deref() {
            if all.iter().any(|u| u.id != id && u.email_matches(email)) {
                return Err(DomainError::Validation(format!("Email {} is already in use", email.trim())));
            }
        }
        patch.apply(&mut user)?;
        self.repo.update(&user).await?;

        let mut state = self.state.lock().await;
        if let Some(cached) = state.users.iter_mut().find(|u| u.id == id) {
            *cached = user.clone();
        }
        if state.current_user.as_ref().is_some_and(|u| u.id == id) {
            state.current_user = Some(user.clone());
        }
        Ok(user)
    }

    async fn remove_user(&self, id: &str) -> DomainResult<()> {
        self.repo.delete(id).await.map_err(|e| match e {
            DomainError::NotFound(_) => DomainError::NotFound(format!("user {}", id)),
            other => other,
        })?;

        let mut state = self.state.lock().await;
        state.users.retain(|u| u.id != id);
        if state.current_user.as_ref().is_some_and(|u| u.id == id) {
            state.current_user = None;
        }
        tracing::info!(user_id = %id, "user deleted");
        Ok(())
    }
}
