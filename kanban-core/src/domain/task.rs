//! Task Entity
//!
//! A card on the board. `column_id` alone decides where it shows up;
//! order inside a column is insertion order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{generate_id, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Review,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// Material consumed by a task (site work, workshop jobs, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: String,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
}

impl Material {
    pub fn new(name: String, quantity: f64, unit: String) -> Self {
        Self {
            id: generate_id(),
            name,
            quantity,
            unit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub uri: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(author_id: String, body: String) -> Self {
        Self {
            id: generate_id(),
            author_id,
            body,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<String>,
    pub project_id: String,
    pub column_id: String,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub spent_hours: f64,
    pub materials: Vec<Material>,
    pub attachments: Vec<Attachment>,
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Build a task from caller input once its column is known
    pub fn from_new(data: NewTask, title: String, column_id: String) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            title,
            description: data.description,
            status: data.status,
            priority: data.priority,
            assignee_id: data.assignee_id,
            project_id: data.project_id,
            column_id,
            due_date: data.due_date,
            estimated_hours: data.estimated_hours,
            spent_hours: 0.0,
            materials: data.materials,
            attachments: data.attachments,
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Entity for Task {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Input for `KanbanStore::add_task`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewTask {
    pub project_id: String,
    pub title: String,
    pub description: String,
    /// Target column; the project's first column when `None`
    pub column_id: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub materials: Vec<Material>,
    pub attachments: Vec<Attachment>,
}

impl NewTask {
    pub fn new(project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Field merge for `KanbanStore::update_task`.
///
/// Outer `None` keeps the current value; for nullable fields
/// `Some(None)` clears it. Board position is changed by moving, not here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Option<String>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub estimated_hours: Option<Option<f64>>,
    pub spent_hours: Option<f64>,
    pub materials: Option<Vec<Material>>,
    pub attachments: Option<Vec<Attachment>>,
}

impl TaskPatch {
    pub fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(assignee_id) = self.assignee_id {
            task.assignee_id = assignee_id;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(estimated_hours) = self.estimated_hours {
            task.estimated_hours = estimated_hours;
        }
        if let Some(spent_hours) = self.spent_hours {
            task.spent_hours = spent_hours;
        }
        if let Some(materials) = self.materials {
            task.materials = materials;
        }
        if let Some(attachments) = self.attachments {
            task.attachments = attachments;
        }
        task.touch();
    }
}
