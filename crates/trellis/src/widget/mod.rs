//! The widget core.
//!
//! Widgets live in a [`WidgetTree`] arena and are addressed by [`WidgetId`].
//! The tree owns everything a widget shares with every other widget: flags,
//! geometry, state, signals, controllers and tick callbacks. Class specific
//! behaviour is supplied by a boxed [`Widget`] trait object stored in the
//! node.
//!
//! # Overview
//!
//! - **Lifecycle**: [`WidgetTree::show`], [`WidgetTree::realize`],
//!   [`WidgetTree::map`] and their inverses, with the invariants
//!   `mapped ⇒ realized ∧ visible` enforced on every transition.
//! - **Layout**: request ([`WidgetTree::measure`]) and allocation
//!   ([`WidgetTree::size_allocate_with_baseline`]) with margins, alignment,
//!   baselines, size groups and a per-widget request cache.
//! - **Events**: [`WidgetTree::dispatch_event`] routes backend events
//!   through capture, target and bubble phases, driving event controllers
//!   and gestures.
//! - **State**: sensitivity, backdrop and direction cascade through the tree.
//! - **Frames**: tick callbacks, the resize queue and painting are driven by
//!   [`WidgetTree::run_frame`].
//!
//! # Creating a Widget
//!
//! ```ignore
//! use trellis::widget::*;
//!
//! struct Swatch;
//!
//! impl Widget for Swatch {
//!     fn measure(&mut self, _: &mut WidgetTree, _: WidgetId, _: Orientation, _: i32) -> Measurement {
//!         Measurement::new(16, 32)
//!     }
//!
//!     fn draw(&mut self, _: &WidgetTree, _: WidgetId, cx: &mut PaintContext<'_>) -> Propagation {
//!         let rect = cx.rect();
//!         cx.cr().fill_rect(rect, 0x3366ccff);
//!         Propagation::Proceed
//!     }
//! }
//!
//! let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
//! let window = tree.create(Window::new());
//! let swatch = tree.create(Swatch);
//! tree.container_add(window, swatch);
//! tree.show_all(window);
//! ```

mod accel;
mod accessibility;
mod actions;
mod allocation;
mod buildable;
mod builder;
mod controller;
mod crossing;
mod debug;
mod dispatcher;
mod events;
mod flags;
mod focus;
mod frame_clock;
mod geometry;
pub mod gesture;
mod grab;
mod invalidation;
mod lifecycle;
mod navigation;
mod node;
mod painting;
mod properties;
mod size_group;
mod size_request;
mod state;
mod style;
mod template;
mod traits;
mod tree;
mod widget_path;
pub mod widgets;

#[cfg(test)]
mod tests;

use slotmap::new_key_type;

new_key_type! {
    /// Identifier of a widget in a [`WidgetTree`].
    pub struct WidgetId;

    /// Identifier of an event controller attached to a widget.
    pub struct ControllerId;

    /// Identifier of a size group.
    pub struct SizeGroupId;

    /// Identifier of a per-toplevel frame clock.
    pub struct FrameClockId;

    /// Identifier of a window group.
    pub struct WindowGroupId;
}

pub use accel::{AccelGroup, AccelKey, parse_accelerator};
pub use accessibility::{
    AccessibleAction, AccessibleError, AccessiblePeer, AccessibleRelation, AccessibleRole,
};
pub use actions::{ActionCallback, ActionGroup};
pub use buildable::{AcceleratorSpec, BuildableData, CustomTag, CustomTagParser};
pub use builder::BuilderObjects;
pub use controller::{
    CallbackController, ControllerContext, ControllerSignals, EventController, GestureNotify,
    PropagationPhase, SequenceState,
};
pub use debug::{InvariantViolation, WidgetTreeDebug};
pub use events::{
    ButtonEvent, CrossingEvent, CrossingMode, DeviceId, Event, EventKind, EventSequence,
    GrabBrokenEvent, InputSource, KeyEvent, MotionEvent, NotifyType, PadAxisEvent, PadButtonEvent,
    Propagation, ScrollDirection, ScrollEvent, TouchEvent, TouchpadEvent, TouchpadPhase,
};
pub use flags::{EventMask, ModifierType, StateFlags, WidgetFlags};
pub use frame_clock::{FrameClock, TickCallbackId, TickControl};
pub use geometry::{
    Align, AxisAllocation, Margin, Measurement, Orientation, SizeRequestMode, TextDirection,
};
pub use navigation::DirectionType;
pub use node::{WidgetSignal, WidgetSignals};
pub use painting::FrameStats;
pub use properties::PropertyValue;
pub use size_group::{SizeGroup, SizeGroupMode};
pub use style::{StaticStyleProvider, StyleContext, StyleProvider, StylePropertyPool, StyleValue};
pub use template::{ClassRegistry, TemplateCallback, WidgetFactory};
pub use traits::{AsAny, PaintContext, Widget};
pub use tree::WidgetTree;
pub use widget_path::{PathNode, WidgetPath};
pub use widgets::{BaselinePosition, BoxContainer, Window};

static_assertions::assert_impl_all!(WidgetId: Copy, Send, Sync, std::hash::Hash);
static_assertions::assert_impl_all!(WidgetFlags: Copy, Send, Sync);
static_assertions::assert_impl_all!(StateFlags: Copy, Send, Sync);
