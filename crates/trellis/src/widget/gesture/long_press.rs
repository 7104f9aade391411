//! Long-press gesture.

use super::{GestureCore, distance};
use crate::widget::controller::{ControllerContext, EventController, GestureNotify, SequenceState};
use crate::widget::events::{Event, EventSequence, Propagation};

#[derive(Debug, Clone, Copy)]
struct Pending {
    sequence: EventSequence,
    /// Timestamp of the press.
    since: u32,
    x: f64,
    y: f64,
}

/// Recognizes a press held in place.
///
/// The press triggers once it has been held for the long-press time from
/// the settings, checked by [`WidgetTree::check_gesture_timeouts`], and the
/// gesture then claims the sequence. Moving further than the drag
/// threshold, or releasing early, denies the sequence and reports
/// [`GestureNotify::LongPressCancelled`].
///
/// [`WidgetTree::check_gesture_timeouts`]: crate::widget::WidgetTree::check_gesture_timeouts
#[derive(Debug, Default)]
pub struct GestureLongPress {
    core: GestureCore,
    pending: Option<Pending>,
    triggered: bool,
    /// Overrides the settings' long-press time.
    delay_factor: Option<f64>,
}

impl GestureLongPress {
    /// A long-press gesture for any button and touch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scale the long-press time from the settings.
    pub fn with_delay_factor(mut self, factor: f64) -> Self {
        self.delay_factor = Some(factor.max(0.5));
        self
    }

    /// Whether the current press already triggered.
    pub fn triggered(&self) -> bool {
        self.triggered
    }

    fn cancel(&mut self, cx: &mut ControllerContext<'_>, deny: bool) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if self.triggered {
            return;
        }
        if deny {
            cx.deny(pending.sequence);
        }
        cx.notify(GestureNotify::LongPressCancelled);
    }
}

impl EventController for GestureLongPress {
    fn handle_event(&mut self, cx: &mut ControllerContext<'_>, event: &Event) -> Propagation {
        let Some(sequence) = event.sequence() else {
            return Propagation::Proceed;
        };
        if event.is_begin() {
            if self.pending.is_some() {
                return Propagation::Proceed;
            }
            let (x, y) = event.position().unwrap_or_default();
            self.triggered = false;
            self.pending = Some(Pending {
                sequence,
                since: event.time,
                x,
                y,
            });
            return Propagation::Proceed;
        }
        if self.pending.map(|p| p.sequence) != Some(sequence) {
            return Propagation::Proceed;
        }
        if event.is_end() {
            if self.triggered {
                self.pending = None;
            } else {
                self.cancel(cx, true);
            }
            return Propagation::Proceed;
        }
        let moved = self
            .core
            .point(sequence)
            .is_some_and(|p| distance(p.offset()) > f64::from(cx.settings().drag_threshold));
        if moved && !self.triggered {
            self.cancel(cx, true);
        }
        Propagation::Proceed
    }

    fn check_timeout(&mut self, cx: &mut ControllerContext<'_>, now_ms: u32) {
        let Some(pending) = self.pending else {
            return;
        };
        if self.triggered {
            return;
        }
        let delay = f64::from(cx.settings().long_press_time_ms) * self.delay_factor.unwrap_or(1.0);
        if f64::from(now_ms.wrapping_sub(pending.since)) < delay {
            return;
        }
        let state = match self.core.point(pending.sequence) {
            Some(point) => point.state(),
            None => return,
        };
        if state == SequenceState::Denied {
            return;
        }
        self.triggered = true;
        cx.notify(GestureNotify::LongPressed {
            x: pending.x,
            y: pending.y,
        });
        if state == SequenceState::None {
            cx.claim(pending.sequence);
        }
    }

    fn reset(&mut self, _cx: &mut ControllerContext<'_>) {
        self.pending = None;
        self.triggered = false;
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
        if state == SequenceState::Denied && self.pending.map(|p| p.sequence) == Some(sequence) {
            self.cancel(cx, false);
        }
    }

    fn sequence_cancelled(&mut self, cx: &mut ControllerContext<'_>, sequence: EventSequence) {
        if self.pending.map(|p| p.sequence) == Some(sequence) {
            self.cancel(cx, false);
        }
    }
}
