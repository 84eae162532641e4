//! Reactive touch bindings
//!
//! Wires `touchstart`/`touchmove`/`touchend`/`touchcancel` on task cards to
//! the gesture math in [`crate::gesture`]. Only one card drags at a time.

use leptos::prelude::*;
use wasm_bindgen::JsCast;

use crate::gesture::{classify_direction, commit_direction, DragDirection, COMMIT_THRESHOLD_PX, DIRECTION_THRESHOLD_PX};

/// Drag state signals shared by every card on a board
#[derive(Clone, Copy)]
pub struct TouchDragSignals {
    pub dragging_id_read: ReadSignal<Option<String>>,
    pub dragging_id_write: WriteSignal<Option<String>>,
    /// Touch x where the drag began
    pub start_x_read: ReadSignal<f64>,
    pub start_x_write: WriteSignal<f64>,
    /// Card translation while dragging, back to 0 on release
    pub offset_x_read: ReadSignal<f64>,
    pub offset_x_write: WriteSignal<f64>,
    pub direction_read: ReadSignal<Option<DragDirection>>,
    pub direction_write: WriteSignal<Option<DragDirection>>,
}

pub fn create_touch_drag_signals() -> TouchDragSignals {
    let (dragging_id_read, dragging_id_write) = signal(None::<String>);
    let (start_x_read, start_x_write) = signal(0.0f64);
    let (offset_x_read, offset_x_write) = signal(0.0f64);
    let (direction_read, direction_write) = signal(None::<DragDirection>);
    TouchDragSignals {
        dragging_id_read,
        dragging_id_write,
        start_x_read,
        start_x_write,
        offset_x_read,
        offset_x_write,
        direction_read,
        direction_write,
    }
}

pub fn begin_drag(signals: &TouchDragSignals, task_id: &str, x: f64) {
    signals.dragging_id_write.set(Some(task_id.to_string()));
    signals.start_x_write.set(x);
    signals.offset_x_write.set(0.0);
    signals.direction_write.set(None);
}

/// Update the card offset; returns the direction hint
pub fn track_drag(signals: &TouchDragSignals, x: f64) -> Option<DragDirection> {
    if signals.dragging_id_read.get_untracked().is_none() {
        return None;
    }
    let dx = x - signals.start_x_read.get_untracked();
    let direction = classify_direction(dx, DIRECTION_THRESHOLD_PX);
    signals.offset_x_write.set(dx);
    signals.direction_write.set(direction);
    direction
}

/// End the drag and snap the card back.
///
/// `x` is `None` when the system cancelled the touch. Returns the card id
/// and direction when the release should move the card.
pub fn finish_drag(signals: &TouchDragSignals, x: Option<f64>) -> Option<(String, DragDirection)> {
    let dragging = signals.dragging_id_read.get_untracked();
    let start_x = signals.start_x_read.get_untracked();

    signals.dragging_id_write.set(None);
    signals.offset_x_write.set(0.0);
    signals.direction_write.set(None);

    let task_id = dragging?;
    let direction = commit_direction(x? - start_x, COMMIT_THRESHOLD_PX)?;
    Some((task_id, direction))
}

fn changed_touch_x(ev: &web_sys::TouchEvent) -> Option<f64> {
    ev.changed_touches().get(0).map(|touch| f64::from(touch.client_x()))
}

fn is_control_target(ev: &web_sys::TouchEvent) -> bool {
    match ev.target() {
        Some(target) => {
            target.dyn_ref::<web_sys::HtmlInputElement>().is_some()
                || target.dyn_ref::<web_sys::HtmlButtonElement>().is_some()
        }
        None => false,
    }
}

/// touchstart handler for a task card
pub fn make_on_touchstart(signals: TouchDragSignals, task_id: String) -> impl Fn(web_sys::TouchEvent) + Clone + 'static {
    move |ev: web_sys::TouchEvent| {
        // Buttons and inputs on the card keep their own taps
        if is_control_target(&ev) {
            return;
        }
        if let Some(x) = changed_touch_x(&ev) {
            begin_drag(&signals, &task_id, x);
        }
    }
}

pub fn make_on_touchmove(signals: TouchDragSignals) -> impl Fn(web_sys::TouchEvent) + Copy + 'static {
    move |ev: web_sys::TouchEvent| {
        if let Some(x) = changed_touch_x(&ev) {
            track_drag(&signals, x);
        }
    }
}

/// touchend handler; `on_commit` receives the card id and direction
pub fn make_on_touchend<F>(signals: TouchDragSignals, on_commit: F) -> impl Fn(web_sys::TouchEvent) + Clone + 'static
where
    F: Fn(String, DragDirection) + Clone + 'static,
{
    move |ev: web_sys::TouchEvent| {
        if let Some((task_id, direction)) = finish_drag(&signals, changed_touch_x(&ev)) {
            log::debug!("drag commit {} {:?}", task_id, direction);
            on_commit(task_id, direction);
        }
    }
}

pub fn make_on_touchcancel(signals: TouchDragSignals) -> impl Fn(web_sys::TouchEvent) + Copy + 'static {
    move |_ev: web_sys::TouchEvent| {
        finish_drag(&signals, None);
    }
}
