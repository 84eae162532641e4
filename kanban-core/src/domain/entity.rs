//! Domain Layer - Core Entity Trait
//!
//! This trait defines the basic contract for all domain entities.
//! All entities must have a unique ID and be thread-safe.

use serde::{Deserialize, Serialize};

/// Core trait for all domain entities
pub trait Entity: Sized + Send + Sync + Clone {
    /// Returns the entity's unique identifier
    fn id(&self) -> &str;
}

/// Common result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level errors
///
/// The display string is what ends up in a store's `error` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum DomainError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::Internal(e.to_string())
    }
}

/// Millisecond timestamp followed by a random suffix, e.g. `1718000000000k3j9x0a2b`
pub fn generate_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", chrono::Utc::now().timestamp_millis(), &suffix[..9])
}

/// Trimmed value, or a validation error naming `field` when blank
pub fn validate_required(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}
