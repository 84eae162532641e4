//! Board facade
//!
//! Opens a project's board (provisioning its team and columns on first
//! view) and turns finished card drags into task moves.

use std::sync::Arc;

use serde::Serialize;
use touch_drag::DragOutcome;

use super::kanban_store::KanbanStore;
use super::team_store::TeamStore;
use crate::domain::{Column, DomainResult, Project, Task};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardColumn {
    pub column: Column,
    pub tasks: Vec<Task>,
}

/// Columns left to right, each with its tasks in insertion order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    pub project_id: String,
    pub columns: Vec<BoardColumn>,
}

impl BoardView {
    /// Column currently holding `task_id`
    pub fn column_of(&self, task_id: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|bc| bc.tasks.iter().any(|t| t.id == task_id))
            .map(|bc| &bc.column)
    }

    pub fn task_count(&self) -> usize {
        self.columns.iter().map(|bc| bc.tasks.len()).sum()
    }
}

pub struct Board {
    teams: Arc<TeamStore>,
    kanban: Arc<KanbanStore>,
}

impl Board {
    pub fn new(teams: Arc<TeamStore>, kanban: Arc<KanbanStore>) -> Self {
        Self { teams, kanban }
    }

    /// First view of a board creates its default team and columns
    pub async fn open(&self, project: &Project) -> DomainResult<BoardView> {
        self.teams.ensure_default_team(&project.id, &project.name).await?;
        self.kanban.initialize_project_columns(&project.id).await?;
        self.view(&project.id).await
    }

    pub async fn view(&self, project_id: &str) -> DomainResult<BoardView> {
        let columns = self.kanban.get_project_columns(project_id).await?;
        let mut tasks = self.kanban.get_project_tasks(project_id).await?;

        let mut board = Vec::with_capacity(columns.len());
        for column in columns {
            let (mine, rest): (Vec<Task>, Vec<Task>) = tasks.into_iter().partition(|t| t.column_id == column.id);
            tasks = rest;
            board.push(BoardColumn { column, tasks: mine });
        }
        if !tasks.is_empty() {
            tracing::warn!(project_id, count = tasks.len(), "tasks reference missing columns");
        }

        Ok(BoardView {
            project_id: project_id.to_string(),
            columns: board,
        })
    }

    /// Apply a finished gesture; `Ok(None)` when nothing moved.
    /// The card itself always snaps back to where it was dragged from.
    pub async fn apply_drag(&self, task_id: &str, outcome: DragOutcome, actor: &str) -> DomainResult<Option<Task>> {
        match outcome.direction() {
            Some(direction) => self.kanban.move_task_to_adjacent(task_id, direction, actor).await,
            None => Ok(None),
        }
    }
}
