//! Column Entity
//!
//! A named, ordered bucket of tasks on a project's board.

use serde::{Deserialize, Serialize};
use touch_drag::OrderedColumn;

use super::entity::{generate_id, Entity};

/// Titles used when a project's board is first opened
pub const DEFAULT_COLUMN_TITLES: [&str; 3] = ["To Do", "In Progress", "Done"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub title: String,
    /// Owning project; also the id of the project's team
    pub project_id: String,
    /// Dense position on the board, starting at 0
    pub order: i32,
}

impl Column {
    pub fn new(project_id: String, title: String, order: i32) -> Self {
        Self {
            id: generate_id(),
            title,
            project_id,
            order,
        }
    }
}

impl Entity for Column {
    fn id(&self) -> &str {
        &self.id
    }
}

impl OrderedColumn for Column {
    type Id = String;

    fn column_id(&self) -> &String {
        &self.id
    }

    fn order(&self) -> i32 {
        self.order
    }
}
