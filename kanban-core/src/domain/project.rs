//! Project Entity
//!
//! A board owner. One project is active at a time on the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{generate_id, Entity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Project {
    pub fn new(name: String, description: String) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            name,
            description,
            created_at: now,
            updated_at: now,
            is_active: false,
        }
    }

    /// Case-insensitive name comparison, ignoring surrounding whitespace
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}

impl Entity for Project {
    fn id(&self) -> &str {
        &self.id
    }
}
