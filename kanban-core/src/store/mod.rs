//! Store Layer
//!
//! State containers the screens call into. Stores own their collections
//! through injected repositories and publish a change counter after every
//! mutation.

mod state;
mod persist;
mod project_store;
mod user_store;
mod team_store;
mod kanban_store;
mod board;

#[cfg(test)]
mod tests;

pub use state::{ChangeFeed, Latency, StoreStatus};
pub use persist::{PersistedSlot, SNAPSHOT_VERSION};
pub use project_store::{ProjectSnapshot, ProjectState, ProjectStore, PROJECT_STORAGE_KEY};
pub use user_store::{UserSnapshot, UserState, UserStore, USER_STORAGE_KEY};
pub use team_store::TeamStore;
pub use kanban_store::KanbanStore;
pub use board::{Board, BoardColumn, BoardView};
