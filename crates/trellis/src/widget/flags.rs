//! Bit sets describing widget attributes, state, event masks and modifiers.

use bitflags::bitflags;

bitflags! {
    /// Boolean attributes of a widget.
    ///
    /// The low 32 bits are the public attributes; the high bits are layout
    /// and lifecycle bookkeeping owned by the core.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WidgetFlags: u64 {
        const VISIBLE = 1 << 0;
        const CHILD_VISIBLE = 1 << 1;
        const MAPPED = 1 << 2;
        const REALIZED = 1 << 3;
        const TOPLEVEL = 1 << 4;
        /// The widget draws into its parent's native window.
        const NO_WINDOW = 1 << 5;
        /// The application paints the background itself.
        const APP_PAINTABLE = 1 << 6;
        const REDRAW_ON_ALLOC = 1 << 8;
        const HAS_SHAPE_MASK = 1 << 9;
        const HAS_FOCUS = 1 << 10;
        const HAS_DEFAULT = 1 << 11;
        const HAS_GRAB = 1 << 12;
        const CAN_FOCUS = 1 << 13;
        const CAN_DEFAULT = 1 << 14;
        const RECEIVES_DEFAULT = 1 << 15;
        const FOCUS_ON_CLICK = 1 << 16;
        /// The widget's own sensitivity, ignoring ancestors.
        const SENSITIVE = 1 << 17;
        const COMPOSITE_CHILD = 1 << 18;
        const NO_SHOW_ALL = 1 << 19;
        const HAS_TOOLTIP = 1 << 20;
        const IN_DESTRUCTION = 1 << 21;
        const IN_REPARENT = 1 << 22;
        /// A grab elsewhere in the window group hides this widget from input.
        const SHADOWED = 1 << 23;
        const MULTIDEVICE = 1 << 24;

        const RESIZE_NEEDED = 1 << 32;
        const ALLOC_NEEDED = 1 << 33;
        const ALLOC_NEEDED_ON_CHILD = 1 << 34;
        const IS_RESIZE_ROOT = 1 << 35;
        const NEED_COMPUTE_EXPAND = 1 << 36;
        const HEXPAND = 1 << 37;
        const VEXPAND = 1 << 38;
        const HEXPAND_SET = 1 << 39;
        const VEXPAND_SET = 1 << 40;
        const COMPUTED_HEXPAND = 1 << 41;
        const COMPUTED_VEXPAND = 1 << 42;

        /// Created but not yet owned by a container.
        const FLOATING = 1 << 48;
        const FRAMECLOCK_CONNECTED = 1 << 49;
        /// Destroy is running; finalization is deferred until it returns.
        const DISPOSING = 1 << 50;
        /// The toplevel list holds a reference to this toplevel.
        const TOPLEVEL_REF = 1 << 51;
    }
}

bitflags! {
    /// Widget state as seen by styling and accessibility.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StateFlags: u32 {
        const ACTIVE = 1 << 0;
        const PRELIGHT = 1 << 1;
        const SELECTED = 1 << 2;
        const INSENSITIVE = 1 << 3;
        const INCONSISTENT = 1 << 4;
        const FOCUSED = 1 << 5;
        const BACKDROP = 1 << 6;
        const DIR_LTR = 1 << 7;
        const DIR_RTL = 1 << 8;
        const LINK = 1 << 9;
        const VISITED = 1 << 10;
        const CHECKED = 1 << 11;
        const DROP_ACTIVE = 1 << 12;

        /// Flags a child inherits from its parent.
        const PROPAGATING = Self::INSENSITIVE.bits() | Self::BACKDROP.bits();
        /// Flags derived from the resolved text direction.
        const DIRECTION = Self::DIR_LTR.bits() | Self::DIR_RTL.bits();
    }
}

bitflags! {
    /// Event kinds a native window reports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventMask: u32 {
        const EXPOSURE = 1 << 1;
        const POINTER_MOTION = 1 << 2;
        const BUTTON_MOTION = 1 << 4;
        const BUTTON_PRESS = 1 << 8;
        const BUTTON_RELEASE = 1 << 9;
        const KEY_PRESS = 1 << 10;
        const KEY_RELEASE = 1 << 11;
        const ENTER_NOTIFY = 1 << 12;
        const LEAVE_NOTIFY = 1 << 13;
        const FOCUS_CHANGE = 1 << 14;
        const STRUCTURE = 1 << 15;
        const PROPERTY_CHANGE = 1 << 16;
        const PROXIMITY_IN = 1 << 18;
        const PROXIMITY_OUT = 1 << 19;
        const SCROLL = 1 << 21;
        const TOUCH = 1 << 22;
        const SMOOTH_SCROLL = 1 << 23;
        const TOUCHPAD_GESTURE = 1 << 24;
        const TABLET_PAD = 1 << 25;

        /// Every input-related bit.
        const ALL_INPUT = Self::POINTER_MOTION.bits()
            | Self::BUTTON_MOTION.bits()
            | Self::BUTTON_PRESS.bits()
            | Self::BUTTON_RELEASE.bits()
            | Self::KEY_PRESS.bits()
            | Self::KEY_RELEASE.bits()
            | Self::ENTER_NOTIFY.bits()
            | Self::LEAVE_NOTIFY.bits()
            | Self::FOCUS_CHANGE.bits()
            | Self::PROXIMITY_IN.bits()
            | Self::PROXIMITY_OUT.bits()
            | Self::SCROLL.bits()
            | Self::TOUCH.bits()
            | Self::SMOOTH_SCROLL.bits()
            | Self::TOUCHPAD_GESTURE.bits()
            | Self::TABLET_PAD.bits();
    }
}

bitflags! {
    /// Keyboard modifiers and held pointer buttons.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModifierType: u32 {
        const SHIFT = 1 << 0;
        const LOCK = 1 << 1;
        const CONTROL = 1 << 2;
        const ALT = 1 << 3;
        const BUTTON1 = 1 << 8;
        const BUTTON2 = 1 << 9;
        const BUTTON3 = 1 << 10;
        const BUTTON4 = 1 << 11;
        const BUTTON5 = 1 << 12;
        const SUPER = 1 << 26;
        const HYPER = 1 << 27;
        const META = 1 << 28;

        /// Modifiers that take part in accelerator matching.
        const ACCELERATOR = Self::SHIFT.bits()
            | Self::CONTROL.bits()
            | Self::ALT.bits()
            | Self::SUPER.bits()
            | Self::HYPER.bits()
            | Self::META.bits();
    }
}

impl Default for WidgetFlags {
    fn default() -> Self {
        WidgetFlags::CHILD_VISIBLE
            | WidgetFlags::NO_WINDOW
            | WidgetFlags::FOCUS_ON_CLICK
            | WidgetFlags::SENSITIVE
            | WidgetFlags::RESIZE_NEEDED
            | WidgetFlags::ALLOC_NEEDED
            | WidgetFlags::FLOATING
    }
}
