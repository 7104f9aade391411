//! Drag gesture.

use super::{GestureCore, distance};
use crate::widget::controller::{ControllerContext, EventController, GestureNotify, SequenceState};
use crate::widget::events::{Event, EventSequence, Propagation};

/// Follows a single press as it moves.
///
/// Reports [`GestureNotify::DragBegin`] on the press,
/// [`GestureNotify::DragUpdate`] with the offset from the start on every
/// move, and [`GestureNotify::DragEnd`] on release or cancellation. Once
/// the offset exceeds the drag threshold from the settings the gesture
/// claims the sequence.
#[derive(Debug, Default)]
pub struct GestureDrag {
    core: GestureCore,
    /// The sequence being dragged; later sequences are ignored.
    current: Option<EventSequence>,
}

impl GestureDrag {
    /// A drag gesture for any button and touch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the gesture to one mouse button, `0` for any.
    pub fn with_button(mut self, button: u32) -> Self {
        self.core.set_button(button);
        self
    }

    /// The start position of the current drag.
    pub fn start_point(&self) -> Option<(f64, f64)> {
        let point = self.core.point(self.current?)?;
        Some(point.start())
    }

    /// The offset of the current drag from its start.
    pub fn offset(&self) -> Option<(f64, f64)> {
        let point = self.core.point(self.current?)?;
        Some(point.offset())
    }

    fn end(&mut self, cx: &mut ControllerContext<'_>, sequence: EventSequence) {
        if self.current != Some(sequence) {
            return;
        }
        let (dx, dy) = self
            .core
            .point(sequence)
            .map_or((0.0, 0.0), |p| p.offset());
        self.current = None;
        cx.notify(GestureNotify::DragEnd { dx, dy });
    }
}

impl EventController for GestureDrag {
    fn handle_event(&mut self, cx: &mut ControllerContext<'_>, event: &Event) -> Propagation {
        let Some(sequence) = event.sequence() else {
            return Propagation::Proceed;
        };
        if event.is_begin() {
            if self.current.is_some() {
                return Propagation::Proceed;
            }
            let (x, y) = event.position().unwrap_or_default();
            self.current = Some(sequence);
            cx.notify(GestureNotify::DragBegin { x, y });
            return Propagation::Proceed;
        }
        if self.current != Some(sequence) {
            return Propagation::Proceed;
        }
        let Some(point) = self.core.point(sequence) else {
            return Propagation::Proceed;
        };
        let (dx, dy) = point.offset();
        let undecided = point.state() == SequenceState::None;
        if event.is_end() {
            self.end(cx, sequence);
            return Propagation::Proceed;
        }
        cx.notify(GestureNotify::DragUpdate { dx, dy });
        if undecided && distance((dx, dy)) > f64::from(cx.settings().drag_threshold) {
            cx.claim(sequence);
        }
        Propagation::Proceed
    }

    fn reset(&mut self, _cx: &mut ControllerContext<'_>) {
        self.current = None;
    }

    fn gesture(&self) -> Option<&GestureCore> {
        Some(&self.core)
    }

    fn gesture_mut(&mut self) -> Option<&mut GestureCore> {
        Some(&mut self.core)
    }

    fn sequence_state_changed(
        &mut self,
        cx: &mut ControllerContext<'_>,
        sequence: EventSequence,
        state: SequenceState,
    ) {
        if state == SequenceState::Denied {
            self.end(cx, sequence);
        }
    }

    fn sequence_cancelled(&mut self, cx: &mut ControllerContext<'_>, sequence: EventSequence) {
        self.end(cx, sequence);
    }
}
