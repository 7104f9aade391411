//! Gestures: event controllers that track input sequences.
//!
//! A gesture is an [`EventController`](super::EventController) that also
//! exposes a [`GestureCore`]. The tree feeds the core before the gesture's
//! own handler runs: a begin event starts tracking a sequence, updates and
//! ends refresh the tracked point, and an end or cancel forgets it. The
//! gesture itself only decides what the movement means, asks the tree to
//! claim or deny the sequence, and reports [`GestureNotify`] values.
//!
//! # Sequence states
//!
//! Every tracked sequence starts in [`SequenceState::None`]. The only legal
//! transitions are `None → Claimed` and `None → Denied`; both targets are
//! terminal. Claiming a sequence makes every other gesture handling it,
//! outside the claimant's group, deny it.
//!
//! # Usage
//!
//! ```ignore
//! use trellis::widget::gesture::GestureDrag;
//! use trellis::widget::{GestureNotify, PropagationPhase};
//!
//! let drag = tree.add_controller(widget, GestureDrag::new(), PropagationPhase::Bubble).unwrap();
//! tree.controller_signals_mut(drag).unwrap().notify.connect(|_, (_, notify)| {
//!     if let GestureNotify::DragUpdate { dx, dy } = notify {
//!         println!("dragged by {dx},{dy}");
//!     }
//! });
//! ```
//!
//! [`GestureNotify`]: super::GestureNotify

mod drag;
mod long_press;
mod multi_press;

use std::collections::HashMap;

use super::WidgetId;
use super::controller::SequenceState;
use super::events::{Event, EventKind, EventSequence};

pub use drag::GestureDrag;
pub use long_press::GestureLongPress;
pub use multi_press::GestureMultiPress;

/// What a gesture knows about one tracked sequence.
#[derive(Debug, Clone)]
pub struct PointData {
    pub(crate) state: SequenceState,
    pub(crate) start: (f64, f64),
    pub(crate) position: (f64, f64),
    pub(crate) begin_event: Event,
    pub(crate) last_event: Event,
    pub(crate) target: WidgetId,
    /// The gesture consumed the begin event in the capture phase.
    pub(crate) press_handled: bool,
}

impl PointData {
    /// Current state of the sequence.
    pub fn state(&self) -> SequenceState {
        self.state
    }

    /// Position of the begin event.
    pub fn start(&self) -> (f64, f64) {
        self.start
    }

    /// Position of the latest event.
    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    /// Distance travelled since the begin event.
    pub fn offset(&self) -> (f64, f64) {
        (self.position.0 - self.start.0, self.position.1 - self.start.1)
    }

    /// The event that started the sequence.
    pub fn begin_event(&self) -> &Event {
        &self.begin_event
    }

    /// The latest event of the sequence.
    pub fn last_event(&self) -> &Event {
        &self.last_event
    }

    /// Widget the begin event was aimed at.
    pub fn target(&self) -> WidgetId {
        self.target
    }
}

/// Sequence bookkeeping shared by every gesture.
#[derive(Debug, Clone, Default)]
pub struct GestureCore {
    points: HashMap<EventSequence, PointData>,
    /// Mouse button to react to, `0` for any.
    button: u32,
    touch_only: bool,
}

impl GestureCore {
    /// A core reacting to any button and to touch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the gesture to one mouse button, `0` for any.
    pub fn set_button(&mut self, button: u32) {
        self.button = button;
    }

    /// The button the gesture reacts to, `0` for any.
    pub fn button(&self) -> u32 {
        self.button
    }

    /// Ignore pointer sequences.
    pub fn set_touch_only(&mut self, touch_only: bool) {
        self.touch_only = touch_only;
    }

    /// Whether pointer sequences are ignored.
    pub fn touch_only(&self) -> bool {
        self.touch_only
    }

    /// Whether the gesture is tracking the sequence.
    pub fn handles_sequence(&self, sequence: EventSequence) -> bool {
        self.points.contains_key(&sequence)
    }

    /// State of a tracked sequence; [`SequenceState::None`] if untracked.
    pub fn sequence_state(&self, sequence: EventSequence) -> SequenceState {
        self.points
            .get(&sequence)
            .map_or(SequenceState::None, |p| p.state)
    }

    /// Tracking data for a sequence.
    pub fn point(&self, sequence: EventSequence) -> Option<&PointData> {
        self.points.get(&sequence)
    }

    /// The latest event of a tracked sequence.
    pub fn last_event(&self, sequence: EventSequence) -> Option<&Event> {
        self.points.get(&sequence).map(|p| &p.last_event)
    }

    /// Tracked sequences.
    pub fn sequences(&self) -> Vec<EventSequence> {
        self.points.keys().copied().collect()
    }

    /// Number of tracked sequences that are not denied.
    pub fn n_points(&self) -> usize {
        self.points
            .values()
            .filter(|p| p.state != SequenceState::Denied)
            .count()
    }

    /// Whether any tracked sequence is still undecided or claimed.
    pub fn is_active(&self) -> bool {
        self.n_points() > 0
    }

    /// Start tracking a sequence from its begin event.
    ///
    /// Returns `false` if the gesture filters the event out.
    pub(crate) fn begin(&mut self, sequence: EventSequence, event: &Event, target: WidgetId) -> bool {
        if self.touch_only && sequence == EventSequence::Pointer {
            return false;
        }
        if let EventKind::ButtonPress(button) = &event.kind {
            if self.button != 0 && button.button != self.button {
                return false;
            }
        }
        let position = event.position().unwrap_or_default();
        self.points.insert(
            sequence,
            PointData {
                state: SequenceState::None,
                start: position,
                position,
                begin_event: event.clone(),
                last_event: event.clone(),
                target,
                press_handled: false,
            },
        );
        true
    }

    /// Refresh a tracked sequence. Returns `false` if it is not tracked.
    pub(crate) fn update(&mut self, sequence: EventSequence, event: &Event) -> bool {
        let Some(point) = self.points.get_mut(&sequence) else {
            return false;
        };
        if let Some(position) = event.position() {
            point.position = position;
        }
        point.last_event = event.clone();
        true
    }

    pub(crate) fn set_state(&mut self, sequence: EventSequence, state: SequenceState) {
        if let Some(point) = self.points.get_mut(&sequence) {
            point.state = state;
        }
    }

    pub(crate) fn set_press_handled(&mut self, sequence: EventSequence, handled: bool) {
        if let Some(point) = self.points.get_mut(&sequence) {
            point.press_handled = handled;
        }
    }

    pub(crate) fn remove(&mut self, sequence: EventSequence) -> Option<PointData> {
        self.points.remove(&sequence)
    }

    pub(crate) fn clear(&mut self) {
        self.points.clear();
    }
}

/// Euclidean length of an offset.
pub(crate) fn distance((dx, dy): (f64, f64)) -> f64 {
    dx.hypot(dy)
}
