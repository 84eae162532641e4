//! Touch Drag
//!
//! Horizontal drag-to-move for Kanban cards.
//! Movement thresholds separate a tap, a visual hint and a committed move.

pub mod gesture;
#[cfg(feature = "leptos")]
pub mod signals;

pub use gesture::{
    classify_direction, commit_direction, resolve_target, DragDirection, DragGesture, DragOutcome, DragPhase,
    OrderedColumn, Thresholds, COMMIT_THRESHOLD_PX, DIRECTION_THRESHOLD_PX,
};
