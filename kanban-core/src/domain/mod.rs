//! Domain Layer
//!
//! Contains all domain entities and core abstractions.
//! No storage or runtime concerns live here.

mod entity;
mod project;
mod column;
mod task;
mod team;
mod user;

pub use entity::{generate_id, validate_required, Entity, DomainError, DomainResult};
pub use project::Project;
pub use column::{Column, DEFAULT_COLUMN_TITLES};
pub use task::{Attachment, Comment, Material, NewTask, Task, TaskPatch, TaskPriority, TaskStatus};
pub use team::{
    can_perform, MemberRole, NewMember, PermissionAction, Permissions, Team, TeamMember, TeamPatch, DEFAULT_ADMIN_ID,
};
pub use user::{NewUser, User, UserFilters, UserPatch, UserRole};
