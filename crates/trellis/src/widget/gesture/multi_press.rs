//! Multi-press (double click) gesture.

use super::{GestureCore, distance};
use crate::widget::controller::{ControllerContext, EventController, GestureNotify};
use crate::widget::events::{Event, EventSequence, Propagation};

#[derive(Debug, Clone, Copy)]
struct Series {
    n_press: u32,
    /// Timestamp of the latest press.
    last_time: u32,
    /// Position of the first press.
    origin: (f64, f64),
}

/// Counts presses that follow each other closely.
///
/// Each press reports [`GestureNotify::Pressed`] with the number of presses
/// so far; presses count towards the same series while they come within
/// the double-click time and distance from the settings. A series ends with
/// [`GestureNotify::Stopped`] when a press comes too late or too far away,
/// or when the pointer strays beyond the double-click distance.
///
/// The gesture never claims a sequence.
#[derive(Debug, Default)]
pub struct GestureMultiPress {
    core: GestureCore,
    series: Option<Series>,
    current: Option<EventSequence>,
}

impl GestureMultiPress {
    /// A multi-press gesture for any button and touch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the gesture to one mouse button, `0` for any.
    pub fn with_button(mut self, button: u32) -> Self {
        self.core.set_button(button);
        self
    }

    /// Presses in the running series.
    pub fn n_press(&self) -> u32 {
        self.series.map_or(0, |s| s.n_press)
    }

    fn stop(&mut self, cx: &mut ControllerContext<'_>) {
        if self.series.take().is_some() {
            cx.notify(GestureNotify::Stopped);
        }
    }

    fn outside(&self, cx: &ControllerContext<'_>, position: (f64, f64)) -> bool {
        self.series.is_some_and(|s| {
            let offset = (position.0 - s.origin.0, position.1 - s.origin.1);
            distance(offset) > f64::from(cx.settings().double_click_distance)
        })
    }
}

impl EventController for GestureMultiPress {
    fn handle_event(&mut self, cx: &mut ControllerContext<'_>, event: &Event) -> Propagation {
        let Some(sequence) = event.sequence() else {
            return Propagation::Proceed;
        };
        let position = event.position().unwrap_or_default();

        if event.is_begin() {
            if self.current.is_some() {
                return Propagation::Proceed;
            }
            let late = self.series.is_some_and(|s| {
                event.time.wrapping_sub(s.last_time) > cx.settings().double_click_time_ms
            });
            if late || self.outside(cx, position) {
                self.stop(cx);
            }
            let series = self.series.get_or_insert(Series {
                n_press: 0,
                last_time: event.time,
                origin: position,
            });
            series.n_press += 1;
            series.last_time = event.time;
            let n_press = series.n_press;
            self.current = Some(sequence);
            cx.notify(GestureNotify::Pressed {
                n_press,
                x: position.0,
                y: position.1,
            });
            return Propagation::Proceed;
        }
        if self.current != Some(sequence) {
            return Propagation::Proceed;
        }
        if event.is_end() {
            self.current = None;
            cx.notify(GestureNotify::Released {
                n_press: self.n_press(),
                x: position.0,
                y: position.1,
            });
        } else if self.outside(cx, position) {
            self.stop(cx);
        }
        Propagation::Proceed
    }

    fn check_timeout(&mut self, cx: &mut ControllerContext<'_>, now_ms: u32) {
        if self.current.is_some() {
            return;
        }
        let expired = self.series.is_some_and(|s| {
            now_ms.wrapping_sub(s.last_time) > cx.settings().double_click_time_ms
        });
        if expired {
            self.stop(cx);
        }
    }

    fn reset(&mut self, cx: &mut ControllerContext<'_>) {
        self.current = None;
        self.stop(cx);
    }

    fn gesture(&self) -> Option<&GestureCore> {
        Some(&self.core)
    }

    fn gesture_mut(&mut self) -> Option<&mut GestureCore> {
        Some(&mut self.core)
    }

    fn sequence_cancelled(&mut self, cx: &mut ControllerContext<'_>, sequence: EventSequence) {
        if self.current == Some(sequence) {
            self.current = None;
            self.stop(cx);
        }
    }
}
