//! Kanban Store
//!
//! Columns and tasks of every project board. Each mutation checks the
//! acting member's permission flag in the project's team first; a denied
//! action leaves the board untouched.
//!
//! Board invariants kept here:
//! - column orders per project are `0..n` after reorder and delete
//! - a task's `column_id` names a column of its own project
//!
//! Mutations run one at a time under `write_lock`, so a check made at the
//! start of one still holds when it writes.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use touch_drag::{resolve_target, DragDirection};

use super::state::ChangeFeed;
use super::team_store::TeamStore;
use crate::domain::{
    validate_required, Column, Comment, DomainError, DomainResult, NewTask, PermissionAction, Task, TaskPatch,
    DEFAULT_COLUMN_TITLES,
};
use crate::repository::Repository;

pub struct KanbanStore {
    columns: Arc<dyn Repository<Column>>,
    tasks: Arc<dyn Repository<Task>>,
    teams: Arc<TeamStore>,
    changes: ChangeFeed,
    error: Mutex<Option<String>>,
    write_lock: Mutex<()>,
}

impl KanbanStore {
    pub fn new(columns: Arc<dyn Repository<Column>>, tasks: Arc<dyn Repository<Task>>, teams: Arc<TeamStore>) -> Self {
        Self {
            columns,
            tasks,
            teams,
            changes: ChangeFeed::new(),
            error: Mutex::new(None),
            write_lock: Mutex::new(()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.error.lock().await.clone()
    }

    pub async fn clear_error(&self) {
        *self.error.lock().await = None;
    }

    // ========================
    // Queries
    // ========================

    /// Project columns sorted by `order`
    pub async fn get_project_columns(&self, project_id: &str) -> DomainResult<Vec<Column>> {
        let mut columns: Vec<Column> = self
            .columns
            .list()
            .await?
            .into_iter()
            .filter(|c| c.project_id == project_id)
            .collect();
        columns.sort_by_key(|c| c.order);
        Ok(columns)
    }

    pub async fn get_project_tasks(&self, project_id: &str) -> DomainResult<Vec<Task>> {
        Ok(self
            .tasks
            .list()
            .await?
            .into_iter()
            .filter(|t| t.project_id == project_id)
            .collect())
    }

    /// Tasks of one column in insertion order
    pub async fn get_column_tasks(&self, column_id: &str) -> DomainResult<Vec<Task>> {
        Ok(self
            .tasks
            .list()
            .await?
            .into_iter()
            .filter(|t| t.column_id == column_id)
            .collect())
    }

    pub async fn get_task(&self, task_id: &str) -> DomainResult<Task> {
        self.load_task(task_id).await
    }

    // ========================
    // Board setup
    // ========================

    /// Give a project its starting columns unless it already has some.
    ///
    /// Titles come from the team's custom columns, falling back to the
    /// built-in three.
    pub async fn initialize_project_columns(&self, project_id: &str) -> DomainResult<Vec<Column>> {
        let _write = self.write_lock.lock().await;
        let existing = self.get_project_columns(project_id).await?;
        if !existing.is_empty() {
            return Ok(existing);
        }

        let titles: Vec<String> = match self.teams.get_team(project_id).await? {
            Some(team) if !team.custom_columns.is_empty() => team.custom_columns,
            _ => DEFAULT_COLUMN_TITLES.iter().map(|t| t.to_string()).collect(),
        };

        let mut created = Vec::with_capacity(titles.len());
        for (order, title) in titles.into_iter().enumerate() {
            let column = Column::new(project_id.to_string(), title, order as i32);
            created.push(self.columns.create(&column).await?);
        }
        tracing::info!(project_id, count = created.len(), "board columns initialized");
        self.changes.bump();
        Ok(created)
    }

    // ========================
    // Tasks
    // ========================

    pub async fn add_task(&self, data: NewTask, actor: &str) -> DomainResult<Task> {
        let _write = self.write_lock.lock().await;
        let result = self.insert_task(data, actor).await;
        self.settle("add_task", result).await
    }

    /// Put a task in `target_column_id`. Moving into its own column is a no-op.
    pub async fn move_task(&self, task_id: &str, target_column_id: &str, actor: &str) -> DomainResult<Task> {
        let _write = self.write_lock.lock().await;
        let result = self.relocate_task(task_id, target_column_id, actor).await;
        self.settle("move_task", result).await
    }

    /// Move a task one column left or right, as a committed drag asks.
    ///
    /// `Ok(None)` when there is no column in that direction.
    pub async fn move_task_to_adjacent(
        &self,
        task_id: &str,
        direction: DragDirection,
        actor: &str,
    ) -> DomainResult<Option<Task>> {
        let _write = self.write_lock.lock().await;
        let result = self.relocate_to_adjacent(task_id, direction, actor).await;
        self.settle("move_task", result).await
    }

    pub async fn update_task(&self, task_id: &str, patch: TaskPatch, actor: &str) -> DomainResult<Task> {
        let _write = self.write_lock.lock().await;
        let result = self.edit_task(task_id, patch, actor).await;
        self.settle("update_task", result).await
    }

    pub async fn delete_task(&self, task_id: &str, actor: &str) -> DomainResult<()> {
        let _write = self.write_lock.lock().await;
        let result = self.remove_task(task_id, actor).await;
        self.settle("delete_task", result).await
    }

    pub async fn add_comment(&self, task_id: &str, body: &str, actor: &str) -> DomainResult<Task> {
        let _write = self.write_lock.lock().await;
        let result = self.append_comment(task_id, body, actor).await;
        self.settle("add_comment", result).await
    }

    // ========================
    // Columns
    // ========================

    /// Append a column at the right end of the board
    pub async fn add_column(&self, project_id: &str, title: &str, actor: &str) -> DomainResult<Column> {
        let _write = self.write_lock.lock().await;
        let result = self.insert_column(project_id, title, actor).await;
        self.settle("add_column", result).await
    }

    pub async fn update_column(&self, column_id: &str, title: &str, actor: &str) -> DomainResult<Column> {
        let _write = self.write_lock.lock().await;
        let result = self.rename_column(column_id, title, actor).await;
        self.settle("update_column", result).await
    }

    /// Delete a column, moving its tasks to the first remaining column.
    /// Returns how many tasks were moved.
    pub async fn delete_column(&self, column_id: &str, actor: &str) -> DomainResult<usize> {
        let _write = self.write_lock.lock().await;
        let result = self.remove_column(column_id, actor).await;
        self.settle("delete_column", result).await
    }

    /// Set the board order to `ordered_ids`, which must list every column
    /// of the project exactly once
    pub async fn reorder_columns(&self, project_id: &str, ordered_ids: &[String], actor: &str) -> DomainResult<Vec<Column>> {
        let _write = self.write_lock.lock().await;
        let result = self.apply_column_order(project_id, ordered_ids, actor).await;
        self.settle("reorder_columns", result).await
    }

    async fn settle<T>(&self, action: &'static str, result: DomainResult<T>) -> DomainResult<T> {
        let mut error = self.error.lock().await;
        match &result {
            Ok(_) => {
                *error = None;
                self.changes.bump();
            }
            Err(e) => {
                tracing::warn!(action, error = %e, "board action failed");
                *error = Some(e.to_string());
            }
        }
        result
    }

    async fn load_task(&self, task_id: &str) -> DomainResult<Task> {
        self.tasks
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("task {}", task_id)))
    }

    async fn load_column(&self, column_id: &str) -> DomainResult<Column> {
        self.columns
            .find_by_id(column_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("column {}", column_id)))
    }

    async fn insert_task(&self, data: NewTask, actor: &str) -> DomainResult<Task> {
        self.teams
            .require_permission(&data.project_id, actor, PermissionAction::CreateTask)
            .await?;
        let title = validate_required("Task title", &data.title)?;

        let columns = self.get_project_columns(&data.project_id).await?;
        let column = match data.column_id.as_deref() {
            Some(id) => columns
                .iter()
                .find(|c| c.id == id)
                .ok_or_else(|| DomainError::NotFound(format!("column {} in project {}", id, data.project_id)))?,
            None => columns
                .first()
                .ok_or_else(|| DomainError::Validation(format!("Project {} has no columns", data.project_id)))?,
        };

        let column_id = column.id.clone();
        let task = self.tasks.create(&Task::from_new(data, title, column_id)).await?;
        tracing::info!(task_id = %task.id, column_id = %task.column_id, "task added");
        Ok(task)
    }

    async fn relocate_task(&self, task_id: &str, target_column_id: &str, actor: &str) -> DomainResult<Task> {
        let mut task = self.load_task(task_id).await?;
        self.teams
            .require_permission(&task.project_id, actor, PermissionAction::MoveTask)
            .await?;

        let target = self.load_column(target_column_id).await?;
        if target.project_id != task.project_id {
            return Err(DomainError::Validation(format!(
                "Column {} is not on the board of project {}",
                target.id, task.project_id
            )));
        }
        if task.column_id == target.id {
            return Ok(task);
        }

        let from = std::mem::replace(&mut task.column_id, target.id);
        task.touch();
        let task = self.tasks.update(&task).await?;
        tracing::info!(task_id, from = %from, to = %task.column_id, "task moved");
        Ok(task)
    }

    async fn relocate_to_adjacent(
        &self,
        task_id: &str,
        direction: DragDirection,
        actor: &str,
    ) -> DomainResult<Option<Task>> {
        let task = self.load_task(task_id).await?;
        let columns = self.get_project_columns(&task.project_id).await?;

        match resolve_target(&columns, &task.column_id, direction) {
            Some(target) => self.relocate_task(task_id, &target.id, actor).await.map(Some),
            None => {
                tracing::debug!(task_id, ?direction, "no adjacent column");
                Ok(None)
            }
        }
    }

    async fn edit_task(&self, task_id: &str, patch: TaskPatch, actor: &str) -> DomainResult<Task> {
        let mut task = self.load_task(task_id).await?;
        self.teams
            .require_permission(&task.project_id, actor, PermissionAction::EditTask)
            .await?;

        if let Some(title) = patch.title.as_deref() {
            validate_required("Task title", title)?;
        }
        patch.apply(&mut task);
        task.title = task.title.trim().to_string();
        self.tasks.update(&task).await
    }

    async fn remove_task(&self, task_id: &str, actor: &str) -> DomainResult<()> {
        let task = self.load_task(task_id).await?;
        self.teams
            .require_permission(&task.project_id, actor, PermissionAction::DeleteTask)
            .await?;
        self.tasks.delete(task_id).await?;
        tracing::info!(task_id, "task deleted");
        Ok(())
    }

    async fn append_comment(&self, task_id: &str, body: &str, actor: &str) -> DomainResult<Task> {
        let mut task = self.load_task(task_id).await?;
        self.teams
            .require_permission(&task.project_id, actor, PermissionAction::EditTask)
            .await?;

        let body = validate_required("Comment", body)?;
        task.comments.push(Comment::new(actor.to_string(), body));
        task.touch();
        self.tasks.update(&task).await
    }

    async fn insert_column(&self, project_id: &str, title: &str, actor: &str) -> DomainResult<Column> {
        self.teams
            .require_permission(project_id, actor, PermissionAction::ManageTeam)
            .await?;
        let title = validate_required("Column title", title)?;

        let order = self.get_project_columns(project_id).await?.len() as i32;
        self.columns
            .create(&Column::new(project_id.to_string(), title, order))
            .await
    }

    async fn rename_column(&self, column_id: &str, title: &str, actor: &str) -> DomainResult<Column> {
        let mut column = self.load_column(column_id).await?;
        self.teams
            .require_permission(&column.project_id, actor, PermissionAction::ManageTeam)
            .await?;

        column.title = validate_required("Column title", title)?;
        self.columns.update(&column).await
    }

    async fn remove_column(&self, column_id: &str, actor: &str) -> DomainResult<usize> {
        let column = self.load_column(column_id).await?;
        self.teams
            .require_permission(&column.project_id, actor, PermissionAction::ManageTeam)
            .await?;

        let remaining: Vec<Column> = self
            .get_project_columns(&column.project_id)
            .await?
            .into_iter()
            .filter(|c| c.id != column.id)
            .collect();
        let fallback_id = remaining
            .first()
            .map(|c| c.id.clone())
            .ok_or_else(|| DomainError::Validation("Cannot delete the last column of a board".to_string()))?;

        // Re-home tasks before the column disappears
        let orphans = self.get_column_tasks(&column.id).await?;
        for mut task in orphans.iter().cloned() {
            task.column_id = fallback_id.clone();
            task.touch();
            self.tasks.update(&task).await?;
        }

        self.columns.delete(&column.id).await?;
        self.renumber(remaining).await?;

        tracing::info!(column_id, moved = orphans.len(), to = %fallback_id, "column deleted");
        Ok(orphans.len())
    }

    async fn apply_column_order(&self, project_id: &str, ordered_ids: &[String], actor: &str) -> DomainResult<Vec<Column>> {
        self.teams
            .require_permission(project_id, actor, PermissionAction::ManageTeam)
            .await?;

        let current = self.get_project_columns(project_id).await?;
        let known: HashSet<&str> = current.iter().map(|c| c.id.as_str()).collect();
        let requested: HashSet<&str> = ordered_ids.iter().map(String::as_str).collect();
        if requested.len() != ordered_ids.len() || requested != known {
            return Err(DomainError::Validation(
                "Column order must list every column of the board exactly once".to_string(),
            ));
        }

        let mut reordered = Vec::with_capacity(ordered_ids.len());
        for id in ordered_ids {
            if let Some(column) = current.iter().find(|c| &c.id == id) {
                reordered.push(column.clone());
            }
        }
        self.renumber(reordered).await
    }

    /// Rewrite `order` as the position in `columns`, saving only changes
    async fn renumber(&self, columns: Vec<Column>) -> DomainResult<Vec<Column>> {
        let mut result = Vec::with_capacity(columns.len());
        for (order, mut column) in columns.into_iter().enumerate() {
            if column.order != order as i32 {
                column.order = order as i32;
                column = self.columns.update(&column).await?;
            }
            result.push(column);
        }
        Ok(result)
    }
}
