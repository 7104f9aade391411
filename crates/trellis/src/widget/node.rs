//! Per-widget instance state stored in the tree arena.

use std::any::TypeId;
use std::collections::HashMap;

use trellis_core::{ConnectionId, Rect, Signal, Size};

use super::accel::AccelGroup;
use super::accessibility::AccessiblePeer;
use super::actions::ActionGroup;
use super::buildable::BuildableData;
use super::events::{DeviceId, Event, Propagation};
use super::flags::{EventMask, StateFlags, WidgetFlags};
use super::frame_clock::TickCallback;
use super::geometry::{Align, Margin, TextDirection};
use super::navigation::DirectionType;
use super::size_request::SizeRequestCache;
use super::style::StyleContext;
use super::traits::Widget;
use super::{ControllerId, FrameClockId, SizeGroupId, WidgetId, WidgetTree, WindowGroupId};
use crate::display::{DrawingContext, NativeWindowId};

/// A signal emitted by the tree on behalf of a widget.
///
/// Slots receive the tree and `(widget, payload)`.
pub type WidgetSignal<A = ()> = Signal<WidgetTree, (WidgetId, A)>;

/// Signals every widget carries.
#[derive(Default)]
pub struct WidgetSignals {
    /// The widget became visible.
    pub show: WidgetSignal,
    /// The widget became invisible.
    pub hide: WidgetSignal,
    /// The widget was mapped.
    pub map: WidgetSignal,
    /// The widget was unmapped.
    pub unmap: WidgetSignal,
    /// The widget was realized.
    pub realize: WidgetSignal,
    /// The widget is being unrealized.
    pub unrealize: WidgetSignal,
    /// The widget is being destroyed. Emitted once.
    pub destroy: WidgetSignal,
    /// The widget is about to be freed. Emitted once.
    pub finalize: WidgetSignal,
    /// The parent changed; the payload is the previous parent.
    pub parent_set: WidgetSignal<Option<WidgetId>>,
    /// The anchoring toplevel changed; the payload is the previous toplevel.
    pub hierarchy_changed: WidgetSignal<Option<WidgetId>>,
    /// The widget received an allocation and baseline.
    pub size_allocate: WidgetSignal<(Rect, i32)>,
    /// Effective state flags changed; the payload is the previous value.
    pub state_flags_changed: WidgetSignal<StateFlags>,
    /// Resolved direction changed; the payload is the previous value.
    pub direction_changed: WidgetSignal<TextDirection>,
    /// A property changed.
    pub notify: WidgetSignal<&'static str>,
    /// The style context was invalidated.
    pub style_updated: WidgetSignal,
    /// Typed event delivery. Returning [`Propagation::Stop`] handles it.
    pub event: Signal<WidgetTree, (WidgetId, Event), Propagation>,
    /// Emitted on the event widget after every delivery.
    pub event_after: WidgetSignal<Event>,
    /// Drawing, before the class draws. Returning [`Propagation::Stop`]
    /// suppresses the class handler.
    pub draw: Signal<dyn DrawingContext, (WidgetId, Size), Propagation>,
    /// An accelerator bound to the widget fired; the payload is the
    /// accelerator's signal name.
    pub accel_activated: WidgetSignal<String>,
    /// The widget became shadowed (`false`) or unshadowed (`true`) by a grab.
    pub grab_notify: WidgetSignal<bool>,
    /// A mnemonic targeting the widget was pressed; the payload is true
    /// when other widgets share the mnemonic. Returning
    /// [`Propagation::Stop`] handles it.
    pub mnemonic_activate: Signal<WidgetTree, (WidgetId, bool), Propagation>,
    /// Keyboard navigation could not leave the widget in a direction.
    /// Returning [`Propagation::Stop`] ends the navigation there.
    pub keynav_failed: Signal<WidgetTree, (WidgetId, DirectionType), Propagation>,
}

/// State held only by toplevel widgets.
#[derive(Default)]
pub(crate) struct ToplevelData {
    pub(crate) focus_widget: Option<WidgetId>,
    pub(crate) default_widget: Option<WidgetId>,
    pub(crate) accel_group: AccelGroup,
    pub(crate) window_group: Option<WindowGroupId>,
    pub(crate) frame_clock: Option<FrameClockId>,
    /// Mnemonic targets by normalized keyval.
    pub(crate) mnemonics: HashMap<u32, Vec<WidgetId>>,
}

pub(crate) struct WidgetNode {
    pub(crate) class: Option<Box<dyn Widget>>,
    pub(crate) type_name: &'static str,
    /// Concrete class type, readable while the class is borrowed out.
    pub(crate) class_type: TypeId,
    pub(crate) container: bool,
    pub(crate) name: Option<String>,
    pub(crate) parent: Option<WidgetId>,
    pub(crate) children: Vec<WidgetId>,
    pub(crate) flags: WidgetFlags,

    /// State set on the widget itself, without inherited bits.
    pub(crate) own_state: StateFlags,
    /// Effective state: own, inherited and direction bits.
    pub(crate) state: StateFlags,
    pub(crate) direction: TextDirection,
    pub(crate) scale: i32,

    pub(crate) allocation: Rect,
    /// Rectangle last passed to `size_allocate_with_baseline`, before
    /// adjustment.
    pub(crate) allocated_rect: Rect,
    pub(crate) allocated_baseline: i32,
    pub(crate) baseline: i32,
    pub(crate) clip: Rect,
    pub(crate) width_request: i32,
    pub(crate) height_request: i32,
    pub(crate) margin: Margin,
    pub(crate) halign: Align,
    pub(crate) valign: Align,
    pub(crate) user_alpha: u8,
    pub(crate) alpha: u8,

    pub(crate) window: Option<NativeWindowId>,
    pub(crate) events: EventMask,
    pub(crate) device_events: HashMap<DeviceId, EventMask>,
    pub(crate) enabled_devices: Vec<DeviceId>,
    pub(crate) shape: Option<Rect>,
    pub(crate) input_shape: Option<Rect>,

    pub(crate) style: Option<StyleContext>,
    pub(crate) tick_callbacks: Vec<TickCallback>,
    pub(crate) frame_clock: Option<FrameClockId>,
    /// Slot on the frame clock's update signal running the tick callbacks.
    pub(crate) tick_connection: Option<ConnectionId>,
    pub(crate) controllers: Vec<ControllerId>,
    pub(crate) request_cache: SizeRequestCache,
    pub(crate) size_groups: Vec<SizeGroupId>,

    pub(crate) focus_child: Option<WidgetId>,
    pub(crate) toplevel: Option<ToplevelData>,
    pub(crate) accessible: Option<AccessiblePeer>,
    pub(crate) tooltip_text: Option<String>,
    pub(crate) tooltip_markup: Option<String>,
    pub(crate) mnemonic_labels: Vec<WidgetId>,
    pub(crate) template_children: HashMap<String, WidgetId>,
    pub(crate) action_groups: HashMap<String, ActionGroup>,
    pub(crate) buildable: Option<BuildableData>,

    pub(crate) ref_count: u32,
    pub(crate) verify_depth: u32,
    pub(crate) signals: WidgetSignals,
}

impl WidgetNode {
    pub(crate) fn new(class: Box<dyn Widget>, redraw_on_alloc: bool) -> Self {
        let type_name = class.type_name();
        let class_type = (*class).as_any().type_id();
        let container = class.is_container();
        let mut flags = WidgetFlags::default();
        flags.set(WidgetFlags::REDRAW_ON_ALLOC, redraw_on_alloc);
        Self {
            class: Some(class),
            type_name,
            class_type,
            container,
            name: None,
            parent: None,
            children: Vec::new(),
            flags,
            own_state: StateFlags::empty(),
            state: StateFlags::empty(),
            direction: TextDirection::None,
            scale: 1,
            allocation: Rect::new(-1, -1, 1, 1),
            allocated_rect: Rect::new(-1, -1, 1, 1),
            allocated_baseline: -1,
            baseline: -1,
            clip: Rect::new(-1, -1, 1, 1),
            width_request: -1,
            height_request: -1,
            margin: Margin::default(),
            halign: Align::Fill,
            valign: Align::Fill,
            user_alpha: 255,
            alpha: 255,
            window: None,
            events: EventMask::empty(),
            device_events: HashMap::new(),
            enabled_devices: Vec::new(),
            shape: None,
            input_shape: None,
            style: None,
            tick_callbacks: Vec::new(),
            frame_clock: None,
            tick_connection: None,
            controllers: Vec::new(),
            request_cache: SizeRequestCache::default(),
            size_groups: Vec::new(),
            focus_child: None,
            toplevel: None,
            accessible: None,
            tooltip_text: None,
            tooltip_markup: None,
            mnemonic_labels: Vec::new(),
            template_children: HashMap::new(),
            action_groups: HashMap::new(),
            buildable: None,
            ref_count: 1,
            verify_depth: 0,
            signals: WidgetSignals::default(),
        }
    }

    #[inline]
    pub(crate) fn has(&self, flags: WidgetFlags) -> bool {
        self.flags.contains(flags)
    }

    #[inline]
    pub(crate) fn set(&mut self, flags: WidgetFlags, value: bool) {
        self.flags.set(flags, value);
    }

    /// Whether the widget owns its native window.
    #[inline]
    pub(crate) fn has_window(&self) -> bool {
        !self.flags.contains(WidgetFlags::NO_WINDOW)
    }

    #[inline]
    pub(crate) fn is_toplevel(&self) -> bool {
        self.flags.contains(WidgetFlags::TOPLEVEL)
    }

    /// Visible, child-visible and mapped.
    #[inline]
    pub(crate) fn is_drawable(&self) -> bool {
        self.flags
            .contains(WidgetFlags::VISIBLE | WidgetFlags::MAPPED)
    }
}
