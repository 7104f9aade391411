//! Input and window events delivered to widgets.
//!
//! An [`Event`] carries the fields every event has (window, device, time,
//! modifiers) plus an [`EventKind`] with the type-specific payload.
//! Positions are in the coordinate space of `window`.

use trellis_core::{Point, Rect};

use super::WidgetId;
use super::flags::{EventMask, ModifierType};
use crate::display::NativeWindowId;

/// Identifier of an input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

impl DeviceId {
    /// The core pointer.
    pub const POINTER: Self = Self(0);
    /// The core keyboard.
    pub const KEYBOARD: Self = Self(1);
    /// The first touchscreen.
    pub const TOUCHSCREEN: Self = Self(2);
}

/// Kind of physical device that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputSource {
    /// A mouse or other relative pointer.
    #[default]
    Mouse,
    /// A stylus tip.
    Pen,
    /// A stylus eraser.
    Eraser,
    /// A keyboard.
    Keyboard,
    /// A direct touch surface.
    Touchscreen,
    /// An indirect touch surface.
    Touchpad,
    /// Buttons, rings and strips of a tablet pad.
    TabletPad,
}

/// One continuous input stream.
///
/// All pointer events share the `Pointer` sequence; each touch point has
/// its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSequence {
    /// The pointer sequence.
    Pointer,
    /// A touch point.
    Touch(u32),
}

/// Whether an event handler lets an event continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Propagation {
    /// Continue delivery.
    #[default]
    Proceed,
    /// Stop delivery.
    Stop,
}

impl Propagation {
    /// Whether delivery stops.
    pub fn is_stop(self) -> bool {
        self == Self::Stop
    }
}

/// Why a crossing event was generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CrossingMode {
    /// The pointer moved.
    #[default]
    Normal,
    /// A grab was activated.
    Grab,
    /// A grab was released.
    Ungrab,
    /// A widget changed sensitivity.
    StateChanged,
    /// Touch emulation started.
    TouchBegin,
    /// Touch emulation ended.
    TouchEnd,
}

/// Relationship between the source and destination of a crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotifyType {
    /// The other end is an ancestor of this widget.
    Ancestor,
    /// This widget lies between the two ends, which are related.
    Virtual,
    /// The other end is a descendant of this widget.
    Inferior,
    /// The two ends are unrelated.
    Nonlinear,
    /// This widget lies between two unrelated ends.
    NonlinearVirtual,
    /// Unknown.
    Unknown,
}

/// Scroll direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollDirection {
    /// Up.
    Up,
    /// Down.
    Down,
    /// Left.
    Left,
    /// Right.
    Right,
    /// Use the deltas.
    Smooth,
}

/// Stage of a touchpad gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchpadPhase {
    /// Gesture started.
    Begin,
    /// Gesture moved.
    Update,
    /// Gesture finished.
    End,
    /// Gesture aborted.
    Cancel,
}

/// Button press or release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButtonEvent {
    /// X position.
    pub x: f64,
    /// Y position.
    pub y: f64,
    /// Button number, 1 is primary.
    pub button: u32,
}

/// Pointer motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEvent {
    /// X position.
    pub x: f64,
    /// Y position.
    pub y: f64,
}

/// Scroll wheel or smooth scroll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollEvent {
    /// X position.
    pub x: f64,
    /// Y position.
    pub y: f64,
    /// Direction.
    pub direction: ScrollDirection,
    /// Horizontal delta for smooth scrolling.
    pub delta_x: f64,
    /// Vertical delta for smooth scrolling.
    pub delta_y: f64,
}

/// Key press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Key symbol.
    pub keyval: u32,
    /// Hardware scan code.
    pub hardware_keycode: u16,
    /// Whether the key is a modifier.
    pub is_modifier: bool,
}

/// Pointer entering or leaving.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossingEvent {
    /// X position.
    pub x: f64,
    /// Y position.
    pub y: f64,
    /// Cause.
    pub mode: CrossingMode,
    /// Relationship between the ends.
    pub detail: NotifyType,
}

/// A grab held by a widget was broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrabBrokenEvent {
    /// Keyboard rather than pointer grab.
    pub keyboard: bool,
    /// The broken grab was an implicit press grab.
    pub implicit: bool,
    /// Widget now holding the grab, if any.
    pub grab_widget: Option<WidgetId>,
}

/// Touch point event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    /// Touch point identifier.
    pub sequence: u32,
    /// X position.
    pub x: f64,
    /// Y position.
    pub y: f64,
    /// Whether this touch drives pointer emulation.
    pub emulating_pointer: bool,
}

/// Multi-finger touchpad gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchpadEvent {
    /// Stage.
    pub phase: TouchpadPhase,
    /// Number of fingers.
    pub fingers: u32,
    /// X position.
    pub x: f64,
    /// Y position.
    pub y: f64,
    /// Horizontal movement.
    pub dx: f64,
    /// Vertical movement.
    pub dy: f64,
    /// Pinch scale, 1.0 for swipes.
    pub scale: f64,
}

/// Tablet pad button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadButtonEvent {
    /// Pad group.
    pub group: u32,
    /// Button index.
    pub button: u32,
    /// Current mode.
    pub mode: u32,
}

/// Tablet pad ring or strip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PadAxisEvent {
    /// Pad group.
    pub group: u32,
    /// Ring or strip index.
    pub index: u32,
    /// Current mode.
    pub mode: u32,
    /// Normalized value.
    pub value: f64,
}

/// Type-specific event payload.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    ButtonPress(ButtonEvent),
    ButtonRelease(ButtonEvent),
    Motion(MotionEvent),
    Scroll(ScrollEvent),
    KeyPress(KeyEvent),
    KeyRelease(KeyEvent),
    Enter(CrossingEvent),
    Leave(CrossingEvent),
    FocusChange {
        /// Focus gained rather than lost.
        focus_in: bool,
    },
    Configure(Rect),
    Map,
    Unmap,
    WindowState {
        /// Bits that changed.
        changed: u32,
        /// New state bits.
        new_state: u32,
    },
    PropertyNotify {
        /// Property name.
        property: String,
    },
    SelectionClear,
    SelectionRequest,
    SelectionNotify,
    ProximityIn,
    ProximityOut,
    GrabBroken(GrabBrokenEvent),
    Damage(Rect),
    TouchBegin(TouchEvent),
    TouchUpdate(TouchEvent),
    TouchEnd(TouchEvent),
    TouchCancel(TouchEvent),
    TouchpadSwipe(TouchpadEvent),
    TouchpadPinch(TouchpadEvent),
    PadButtonPress(PadButtonEvent),
    PadButtonRelease(PadButtonEvent),
    PadRing(PadAxisEvent),
    PadStrip(PadAxisEvent),
    PadGroupMode {
        /// Pad group.
        group: u32,
        /// New mode.
        mode: u32,
    },
    Delete,
    Destroy,
}

/// An event addressed to a native window.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Window the event was reported on.
    pub window: Option<NativeWindowId>,
    /// Logical device.
    pub device: DeviceId,
    /// Physical source kind.
    pub source: InputSource,
    /// Timestamp in milliseconds.
    pub time: u32,
    /// Modifier state.
    pub state: ModifierType,
    /// Synthesized by the toolkit rather than the window system.
    pub send_event: bool,
    /// A pointer event emulated from a touch sequence.
    pub pointer_emulated: bool,
    /// Payload.
    pub kind: EventKind,
}

impl Event {
    /// Create an event from the core pointer with no window.
    pub fn new(kind: EventKind) -> Self {
        let (device, source) = match &kind {
            EventKind::KeyPress(_) | EventKind::KeyRelease(_) | EventKind::FocusChange { .. } => {
                (DeviceId::KEYBOARD, InputSource::Keyboard)
            }
            EventKind::TouchBegin(_)
            | EventKind::TouchUpdate(_)
            | EventKind::TouchEnd(_)
            | EventKind::TouchCancel(_) => (DeviceId::TOUCHSCREEN, InputSource::Touchscreen),
            EventKind::TouchpadSwipe(_) | EventKind::TouchpadPinch(_) => {
                (DeviceId::POINTER, InputSource::Touchpad)
            }
            EventKind::PadButtonPress(_)
            | EventKind::PadButtonRelease(_)
            | EventKind::PadRing(_)
            | EventKind::PadStrip(_)
            | EventKind::PadGroupMode { .. } => (DeviceId::POINTER, InputSource::TabletPad),
            _ => (DeviceId::POINTER, InputSource::Mouse),
        };
        Self {
            window: None,
            device,
            source,
            time: 0,
            state: ModifierType::empty(),
            send_event: false,
            pointer_emulated: false,
            kind,
        }
    }

    /// Primary button press at a position.
    pub fn button_press(x: f64, y: f64, button: u32) -> Self {
        Self::new(EventKind::ButtonPress(ButtonEvent { x, y, button }))
    }

    /// Button release at a position.
    pub fn button_release(x: f64, y: f64, button: u32) -> Self {
        Self::new(EventKind::ButtonRelease(ButtonEvent { x, y, button }))
    }

    /// Pointer motion to a position.
    pub fn motion(x: f64, y: f64) -> Self {
        Self::new(EventKind::Motion(MotionEvent { x, y }))
    }

    /// Key press.
    pub fn key_press(keyval: u32, state: ModifierType) -> Self {
        let mut event = Self::new(EventKind::KeyPress(KeyEvent {
            keyval,
            hardware_keycode: 0,
            is_modifier: false,
        }));
        event.state = state;
        event
    }

    /// Touch begin for a touch point.
    pub fn touch_begin(sequence: u32, x: f64, y: f64) -> Self {
        Self::new(EventKind::TouchBegin(TouchEvent {
            sequence,
            x,
            y,
            emulating_pointer: false,
        }))
    }

    /// Touch update for a touch point.
    pub fn touch_update(sequence: u32, x: f64, y: f64) -> Self {
        Self::new(EventKind::TouchUpdate(TouchEvent {
            sequence,
            x,
            y,
            emulating_pointer: false,
        }))
    }

    /// Touch end for a touch point.
    pub fn touch_end(sequence: u32, x: f64, y: f64) -> Self {
        Self::new(EventKind::TouchEnd(TouchEvent {
            sequence,
            x,
            y,
            emulating_pointer: false,
        }))
    }

    /// Touch cancel for a touch point.
    pub fn touch_cancel(sequence: u32) -> Self {
        Self::new(EventKind::TouchCancel(TouchEvent {
            sequence,
            x: 0.0,
            y: 0.0,
            emulating_pointer: false,
        }))
    }

    /// Set the window.
    pub fn with_window(mut self, window: NativeWindowId) -> Self {
        self.window = Some(window);
        self
    }

    /// Set the device.
    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = device;
        self
    }

    /// Set the timestamp.
    pub fn with_time(mut self, time: u32) -> Self {
        self.time = time;
        self
    }

    /// Short name of the event type, for logs.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            EventKind::ButtonPress(_) => "button-press",
            EventKind::ButtonRelease(_) => "button-release",
            EventKind::Motion(_) => "motion",
            EventKind::Scroll(_) => "scroll",
            EventKind::KeyPress(_) => "key-press",
            EventKind::KeyRelease(_) => "key-release",
            EventKind::Enter(_) => "enter-notify",
            EventKind::Leave(_) => "leave-notify",
            EventKind::FocusChange { .. } => "focus-change",
            EventKind::Configure(_) => "configure",
            EventKind::Map => "map",
            EventKind::Unmap => "unmap",
            EventKind::WindowState { .. } => "window-state",
            EventKind::PropertyNotify { .. } => "property-notify",
            EventKind::SelectionClear => "selection-clear",
            EventKind::SelectionRequest => "selection-request",
            EventKind::SelectionNotify => "selection-notify",
            EventKind::ProximityIn => "proximity-in",
            EventKind::ProximityOut => "proximity-out",
            EventKind::GrabBroken(_) => "grab-broken",
            EventKind::Damage(_) => "damage",
            EventKind::TouchBegin(_) => "touch-begin",
            EventKind::TouchUpdate(_) => "touch-update",
            EventKind::TouchEnd(_) => "touch-end",
            EventKind::TouchCancel(_) => "touch-cancel",
            EventKind::TouchpadSwipe(_) => "touchpad-swipe",
            EventKind::TouchpadPinch(_) => "touchpad-pinch",
            EventKind::PadButtonPress(_) => "pad-button-press",
            EventKind::PadButtonRelease(_) => "pad-button-release",
            EventKind::PadRing(_) => "pad-ring",
            EventKind::PadStrip(_) => "pad-strip",
            EventKind::PadGroupMode { .. } => "pad-group-mode",
            EventKind::Delete => "delete",
            EventKind::Destroy => "destroy",
        }
    }

    /// Position of the event, for events that have one.
    pub fn position(&self) -> Option<(f64, f64)> {
        match &self.kind {
            EventKind::ButtonPress(e) | EventKind::ButtonRelease(e) => Some((e.x, e.y)),
            EventKind::Motion(e) => Some((e.x, e.y)),
            EventKind::Scroll(e) => Some((e.x, e.y)),
            EventKind::Enter(e) | EventKind::Leave(e) => Some((e.x, e.y)),
            EventKind::TouchBegin(e)
            | EventKind::TouchUpdate(e)
            | EventKind::TouchEnd(e)
            | EventKind::TouchCancel(e) => Some((e.x, e.y)),
            EventKind::TouchpadSwipe(e) | EventKind::TouchpadPinch(e) => Some((e.x, e.y)),
            _ => None,
        }
    }

    /// Position rounded down to whole pixels.
    pub fn point(&self) -> Option<Point> {
        self.position()
            .map(|(x, y)| Point::new(x.floor() as i32, y.floor() as i32))
    }

    /// The input sequence the event belongs to.
    ///
    /// Pointer-emulated events report no sequence so that gestures, which
    /// already see the originating touch, ignore them.
    pub fn sequence(&self) -> Option<EventSequence> {
        if self.pointer_emulated {
            return None;
        }
        match &self.kind {
            EventKind::ButtonPress(_) | EventKind::ButtonRelease(_) | EventKind::Motion(_) => {
                Some(EventSequence::Pointer)
            }
            EventKind::TouchBegin(e)
            | EventKind::TouchUpdate(e)
            | EventKind::TouchEnd(e)
            | EventKind::TouchCancel(e) => Some(EventSequence::Touch(e.sequence)),
            _ => None,
        }
    }

    /// Whether the event starts a sequence.
    pub fn is_begin(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ButtonPress(_) | EventKind::TouchBegin(_)
        )
    }

    /// Whether the event ends a sequence.
    pub fn is_end(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ButtonRelease(_) | EventKind::TouchEnd(_) | EventKind::TouchCancel(_)
        )
    }

    /// Whether the event comes from user input and is subject to sensitivity.
    pub fn is_input(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ButtonPress(_)
                | EventKind::ButtonRelease(_)
                | EventKind::Motion(_)
                | EventKind::Scroll(_)
                | EventKind::KeyPress(_)
                | EventKind::KeyRelease(_)
                | EventKind::Enter(_)
                | EventKind::Leave(_)
                | EventKind::TouchBegin(_)
                | EventKind::TouchUpdate(_)
                | EventKind::TouchEnd(_)
                | EventKind::TouchpadSwipe(_)
                | EventKind::TouchpadPinch(_)
                | EventKind::PadButtonPress(_)
                | EventKind::PadButtonRelease(_)
                | EventKind::PadRing(_)
                | EventKind::PadStrip(_)
                | EventKind::ProximityIn
                | EventKind::ProximityOut
        )
    }

    /// Whether the event must be delivered even to an unviewable window.
    ///
    /// These let consumers clean up state started by an earlier event.
    pub fn is_cleanup(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ButtonRelease(_)
                | EventKind::Leave(_)
                | EventKind::TouchEnd(_)
                | EventKind::TouchCancel(_)
                | EventKind::KeyRelease(_)
        )
    }

    /// Event-mask bit a window must select to receive this event.
    pub fn required_mask(&self) -> Option<EventMask> {
        match &self.kind {
            EventKind::ButtonPress(_) => Some(EventMask::BUTTON_PRESS),
            EventKind::ButtonRelease(_) => Some(EventMask::BUTTON_RELEASE),
            EventKind::Motion(_) => Some(EventMask::POINTER_MOTION | EventMask::BUTTON_MOTION),
            EventKind::Scroll(_) => Some(EventMask::SCROLL | EventMask::SMOOTH_SCROLL),
            EventKind::KeyPress(_) => Some(EventMask::KEY_PRESS),
            EventKind::KeyRelease(_) => Some(EventMask::KEY_RELEASE),
            EventKind::Enter(_) => Some(EventMask::ENTER_NOTIFY),
            EventKind::Leave(_) => Some(EventMask::LEAVE_NOTIFY),
            EventKind::FocusChange { .. } => Some(EventMask::FOCUS_CHANGE),
            EventKind::ProximityIn => Some(EventMask::PROXIMITY_IN),
            EventKind::ProximityOut => Some(EventMask::PROXIMITY_OUT),
            EventKind::TouchBegin(_)
            | EventKind::TouchUpdate(_)
            | EventKind::TouchEnd(_)
            | EventKind::TouchCancel(_) => Some(EventMask::TOUCH),
            EventKind::TouchpadSwipe(_) | EventKind::TouchpadPinch(_) => {
                Some(EventMask::TOUCHPAD_GESTURE)
            }
            EventKind::PadButtonPress(_)
            | EventKind::PadButtonRelease(_)
            | EventKind::PadRing(_)
            | EventKind::PadStrip(_)
            | EventKind::PadGroupMode { .. } => Some(EventMask::TABLET_PAD),
            _ => None,
        }
    }

    /// Pointer event emulated from this touch event.
    pub fn emulated_pointer_event(&self) -> Option<Event> {
        let kind = match &self.kind {
            EventKind::TouchBegin(t) => EventKind::ButtonPress(ButtonEvent {
                x: t.x,
                y: t.y,
                button: 1,
            }),
            EventKind::TouchUpdate(t) => EventKind::Motion(MotionEvent { x: t.x, y: t.y }),
            EventKind::TouchEnd(t) => EventKind::ButtonRelease(ButtonEvent {
                x: t.x,
                y: t.y,
                button: 1,
            }),
            _ => return None,
        };
        let mut state = self.state;
        if !matches!(self.kind, EventKind::TouchBegin(_)) {
            state |= ModifierType::BUTTON1;
        }
        Some(Event {
            kind,
            state,
            pointer_emulated: true,
            ..self.clone()
        })
    }

    /// Copy of a begin event marked as synthesized.
    pub fn synthesized_press(&self) -> Event {
        Event {
            send_event: true,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emulated_pointer_has_no_sequence() {
        let touch = Event::touch_begin(7, 3.0, 4.0);
        assert_eq!(touch.sequence(), Some(EventSequence::Touch(7)));

        let emulated = touch.emulated_pointer_event().unwrap();
        assert!(matches!(emulated.kind, EventKind::ButtonPress(_)));
        assert!(emulated.pointer_emulated);
        assert_eq!(emulated.sequence(), None);
        assert_eq!(emulated.position(), Some((3.0, 4.0)));
    }

    #[test]
    fn cleanup_events() {
        assert!(Event::button_release(0.0, 0.0, 1).is_cleanup());
        assert!(Event::touch_cancel(1).is_cleanup());
        assert!(!Event::button_press(0.0, 0.0, 1).is_cleanup());
    }

    #[test]
    fn synthesized_press_keeps_payload() {
        let begin = Event::touch_begin(1, 10.0, 10.0).with_time(5);
        let press = begin.synthesized_press();
        assert!(press.send_event);
        assert_eq!(press.kind, begin.kind);
        assert_eq!(press.time, 5);
    }
}
