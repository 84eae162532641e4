//! Card drag gesture
//!
//! Per-card state machine: `Idle -> Dragging -> (Idle | committed move)`.
//! Horizontal displacement alone decides the outcome; a committed drag
//! moves the card exactly one column left or right.

/// Displacement past which the card shows a direction hint
pub const DIRECTION_THRESHOLD_PX: f64 = 20.0;

/// Displacement past which releasing the card moves it
pub const COMMIT_THRESHOLD_PX: f64 = 30.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragDirection {
    Left,
    Right,
}

impl DragDirection {
    /// Offset applied to the source column's `order`
    pub fn order_offset(self) -> i32 {
        match self {
            DragDirection::Left => -1,
            DragDirection::Right => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    pub direction_px: f64,
    pub commit_px: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            direction_px: DIRECTION_THRESHOLD_PX,
            commit_px: COMMIT_THRESHOLD_PX,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum DragPhase {
    #[default]
    Idle,
    Dragging { start_x: f64, current_x: f64 },
}

/// What a finished gesture asks for. The card snaps back either way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragOutcome {
    SnapBack,
    Commit(DragDirection),
}

impl DragOutcome {
    pub fn direction(self) -> Option<DragDirection> {
        match self {
            DragOutcome::SnapBack => None,
            DragOutcome::Commit(direction) => Some(direction),
        }
    }
}

/// Direction of `dx` once it strictly exceeds `threshold`
pub fn classify_direction(dx: f64, threshold: f64) -> Option<DragDirection> {
    if dx.abs() > threshold {
        Some(if dx > 0.0 { DragDirection::Right } else { DragDirection::Left })
    } else {
        None
    }
}

/// Direction to move on release, `None` means snap back
pub fn commit_direction(dx: f64, threshold: f64) -> Option<DragDirection> {
    classify_direction(dx, threshold)
}

/// A column the resolver can navigate by `order`
pub trait OrderedColumn {
    type Id: PartialEq;

    fn column_id(&self) -> &Self::Id;
    fn order(&self) -> i32;
}

/// Column whose order is exactly one step from `source` in `direction`.
///
/// Returns `None` when `source` is not in `columns`, when it sits at the
/// edge, or when the only match is `source` itself.
pub fn resolve_target<'a, C: OrderedColumn>(
    columns: &'a [C],
    source: &C::Id,
    direction: DragDirection,
) -> Option<&'a C> {
    let source_order = columns.iter().find(|c| c.column_id() == source)?.order();
    let wanted = source_order.checked_add(direction.order_offset())?;
    columns
        .iter()
        .find(|c| c.order() == wanted && c.column_id() != source)
}

/// Gesture tracker for one card
#[derive(Clone, Debug, Default)]
pub struct DragGesture {
    phase: DragPhase,
    thresholds: Thresholds,
    direction: Option<DragDirection>,
}

impl DragGesture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> DragPhase {
        self.phase
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.phase, DragPhase::Dragging { .. })
    }

    /// Current horizontal displacement, 0 when idle
    pub fn offset(&self) -> f64 {
        match self.phase {
            DragPhase::Idle => 0.0,
            DragPhase::Dragging { start_x, current_x } => current_x - start_x,
        }
    }

    /// Visual direction hint
    pub fn direction(&self) -> Option<DragDirection> {
        self.direction
    }

    pub fn start(&mut self, x: f64) {
        self.phase = DragPhase::Dragging {
            start_x: x,
            current_x: x,
        };
        self.direction = None;
    }

    /// Track a move; returns the direction hint
    pub fn update(&mut self, x: f64) -> Option<DragDirection> {
        if let DragPhase::Dragging { start_x, .. } = self.phase {
            self.phase = DragPhase::Dragging { start_x, current_x: x };
            self.direction = classify_direction(x - start_x, self.thresholds.direction_px);
        }
        self.direction
    }

    pub fn release(&mut self, x: f64) -> DragOutcome {
        let outcome = match self.phase {
            DragPhase::Idle => DragOutcome::SnapBack,
            DragPhase::Dragging { start_x, .. } => {
                match commit_direction(x - start_x, self.thresholds.commit_px) {
                    Some(direction) => DragOutcome::Commit(direction),
                    None => DragOutcome::SnapBack,
                }
            }
        };
        self.reset();
        outcome
    }

    /// Gesture taken away by the system (scroll, call, ...)
    pub fn terminate(&mut self) -> DragOutcome {
        self.reset();
        DragOutcome::SnapBack
    }

    fn reset(&mut self) {
        self.phase = DragPhase::Idle;
        self.direction = None;
    }
}
