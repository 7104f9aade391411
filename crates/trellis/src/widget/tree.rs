//! The widget arena.

use std::collections::HashMap;

use slotmap::SlotMap;
use trellis_core::logging::targets;
use trellis_core::signal;
use trellis_core::{DamageTracker, Rect, Settings};

use super::controller::ControllerEntry;
use super::crossing::PointerFocus;
use super::events::DeviceId;
use super::flags::{StateFlags, WidgetFlags};
use super::frame_clock::FrameClock;
use super::geometry::TextDirection;
use super::grab::WindowGroup;
use super::node::{WidgetNode, WidgetSignal, WidgetSignals};
use super::size_group::SizeGroup;
use super::style::{StaticStyleProvider, StyleContext, StyleProvider, StylePropertyPool};
use super::template::ClassRegistry;
use super::traits::Widget;
use super::{ControllerId, FrameClockId, SizeGroupId, WidgetId, WindowGroupId};
use crate::display::{Display, NativeWindowId};

/// Log a failed precondition and drop the error.
macro_rules! precondition {
    ($target:expr, $op:literal, $result:expr) => {
        if let Err(err) = $result {
            tracing::warn!(target: $target, operation = $op, %err, "precondition failed");
        }
    };
}
pub(crate) use precondition;

/// Look up a node, logging a warning for stale ids.
pub(crate) fn lookup(nodes: &SlotMap<WidgetId, WidgetNode>, id: WidgetId) -> Option<&WidgetNode> {
    let node = nodes.get(id);
    if node.is_none() {
        tracing::warn!(target: targets::LIFECYCLE, ?id, "invalid widget id");
    }
    node
}

/// Owner of every widget, controller, size group and frame clock.
///
/// All operations take `&mut self` and run to completion on the calling
/// thread. Signal handlers receive the tree mutably and may call back into
/// any operation, including destroying the widget that emitted.
pub struct WidgetTree {
    pub(crate) nodes: SlotMap<WidgetId, WidgetNode>,
    pub(crate) controllers: SlotMap<ControllerId, ControllerEntry>,
    pub(crate) size_groups: SlotMap<SizeGroupId, SizeGroup>,
    pub(crate) frame_clocks: SlotMap<FrameClockId, FrameClock>,
    pub(crate) window_groups: SlotMap<WindowGroupId, WindowGroup>,
    pub(crate) default_window_group: WindowGroupId,
    pub(crate) resize_queue: Vec<WidgetId>,
    pub(crate) settings: Settings,
    pub(crate) display: Box<dyn Display>,
    pub(crate) window_owners: HashMap<NativeWindowId, WidgetId>,
    pub(crate) damage: HashMap<NativeWindowId, DamageTracker>,
    pub(crate) style_provider: Box<dyn StyleProvider>,
    pub(crate) style_properties: StylePropertyPool,
    pub(crate) registry: ClassRegistry,
    pub(crate) pointer_focus: HashMap<DeviceId, PointerFocus>,
    pub(crate) implicit_grabs: HashMap<DeviceId, WidgetId>,
    pub(crate) touch_grabs: HashMap<u32, WidgetId>,
    pub(crate) emulating_sequence: Option<u32>,
    pub(crate) next_tick_id: u64,
}

impl std::fmt::Debug for WidgetTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetTree")
            .field("widgets", &self.nodes.len())
            .field("controllers", &self.controllers.len())
            .field("resize_queue", &self.resize_queue)
            .finish_non_exhaustive()
    }
}

impl WidgetTree {
    /// Create an empty tree on top of a display backend.
    pub fn new(display: Box<dyn Display>, settings: Settings) -> Self {
        let mut window_groups = SlotMap::with_key();
        let default_window_group = window_groups.insert(WindowGroup::default());
        Self {
            nodes: SlotMap::with_key(),
            controllers: SlotMap::with_key(),
            size_groups: SlotMap::with_key(),
            frame_clocks: SlotMap::with_key(),
            window_groups,
            default_window_group,
            resize_queue: Vec::new(),
            settings,
            display,
            window_owners: HashMap::new(),
            damage: HashMap::new(),
            style_provider: Box::new(StaticStyleProvider::new()),
            style_properties: StylePropertyPool::default(),
            registry: ClassRegistry::default(),
            pointer_focus: HashMap::new(),
            implicit_grabs: HashMap::new(),
            touch_grabs: HashMap::new(),
            emulating_sequence: None,
            next_tick_id: 1,
        }
    }

    /// The settings the tree was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The display backend.
    pub fn display(&self) -> &dyn Display {
        self.display.as_ref()
    }

    /// Mutable access to the display backend.
    pub fn display_mut(&mut self) -> &mut dyn Display {
        self.display.as_mut()
    }

    /// The class registry used by templates.
    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Mutable access to the class registry.
    pub fn registry_mut(&mut self) -> &mut ClassRegistry {
        &mut self.registry
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Insert a new widget. It starts floating, invisible and unrealized.
    pub fn create<W: Widget>(&mut self, class: W) -> WidgetId {
        self.create_boxed(Box::new(class))
    }

    /// Insert a new widget from a boxed class.
    pub fn create_boxed(&mut self, class: Box<dyn Widget>) -> WidgetId {
        let node = WidgetNode::new(class, self.settings.redraw_on_alloc_default);
        let type_name = node.type_name;
        let id = self.nodes.insert(node);

        let direction = self.resolved_direction(id);
        if let Some(node) = self.nodes.get_mut(id) {
            node.state = direction_state(direction);
            node.style = Some(StyleContext::new());
        }
        tracing::trace!(target: targets::LIFECYCLE, ?id, widget = type_name, "created");

        self.with_class(id, |class, tree| class.init(tree, id));
        id
    }

    /// Run `f` with the widget's class borrowed out of the tree.
    ///
    /// Returns `None` if the widget does not exist or its class is already
    /// borrowed further up the stack. If the widget was freed while the
    /// class was out, the class is finalized here.
    pub(crate) fn with_class<R>(
        &mut self,
        id: WidgetId,
        f: impl FnOnce(&mut dyn Widget, &mut WidgetTree) -> R,
    ) -> Option<R> {
        let mut class = self.nodes.get_mut(id)?.class.take()?;
        let result = f(&mut *class, self);
        match self.nodes.get_mut(id) {
            Some(node) => node.class = Some(class),
            None => class.finalize(),
        }
        Some(result)
    }

    /// Borrow the widget's class as its concrete type.
    pub fn class<T: Widget>(&self, id: WidgetId) -> Option<&T> {
        let class: &dyn Widget = self.nodes.get(id)?.class.as_deref()?;
        class.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow the widget's class as its concrete type.
    pub fn class_mut<T: Widget>(&mut self, id: WidgetId) -> Option<&mut T> {
        let class: &mut dyn Widget = self.nodes.get_mut(id)?.class.as_deref_mut()?;
        class.as_any_mut().downcast_mut::<T>()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether the id refers to a live widget.
    pub fn contains(&self, id: WidgetId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of live widgets.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds no widgets.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over every live widget id.
    pub fn widget_ids(&self) -> impl Iterator<Item = WidgetId> + '_ {
        self.nodes.keys()
    }

    /// Class name of the widget.
    pub fn type_name(&self, id: WidgetId) -> Option<&'static str> {
        self.nodes.get(id).map(|n| n.type_name)
    }

    /// Widget name, used by widget paths.
    pub fn name(&self, id: WidgetId) -> Option<&str> {
        self.nodes.get(id)?.name.as_deref()
    }

    /// Set the widget name.
    pub fn set_name(&mut self, id: WidgetId, name: Option<String>) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.name = name;
        self.invalidate_style_path(id);
        self.notify(id, "name");
    }

    /// Parent widget.
    pub fn parent(&self, id: WidgetId) -> Option<WidgetId> {
        self.nodes.get(id)?.parent
    }

    /// Children in stacking order, bottom first.
    pub fn children(&self, id: WidgetId) -> &[WidgetId] {
        self.nodes.get(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Raw widget flags.
    pub fn flags(&self, id: WidgetId) -> Option<WidgetFlags> {
        self.nodes.get(id).map(|n| n.flags)
    }

    pub(crate) fn has_flags(&self, id: WidgetId, flags: WidgetFlags) -> bool {
        self.nodes.get(id).is_some_and(|n| n.flags.contains(flags))
    }

    pub(crate) fn set_flags(&mut self, id: WidgetId, flags: WidgetFlags, value: bool) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.flags.set(flags, value);
        }
    }

    /// Whether the widget is a toplevel.
    pub fn is_toplevel(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::TOPLEVEL)
    }

    /// Whether the widget owns a native window.
    pub fn has_window(&self, id: WidgetId) -> bool {
        self.nodes.get(id).is_some_and(|n| n.has_window())
    }

    /// Whether the widget is inside an ancestor chain ending at a toplevel.
    pub fn is_anchored(&self, id: WidgetId) -> bool {
        self.toplevel(id).is_some()
    }

    /// The toplevel the widget is anchored to, which may be the widget
    /// itself.
    pub fn toplevel(&self, id: WidgetId) -> Option<WidgetId> {
        let root = self.root(id)?;
        self.is_toplevel(root).then_some(root)
    }

    /// The root of the widget's tree.
    pub fn root(&self, id: WidgetId) -> Option<WidgetId> {
        let mut current = id;
        let mut node = self.nodes.get(current)?;
        while let Some(parent) = node.parent {
            current = parent;
            node = self.nodes.get(current)?;
        }
        Some(current)
    }

    /// Whether `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor(&self, id: WidgetId, ancestor: WidgetId) -> bool {
        let mut current = self.parent(id);
        while let Some(widget) = current {
            if widget == ancestor {
                return true;
            }
            current = self.parent(widget);
        }
        false
    }

    /// `id` and its ancestors, from the root down to `id`.
    pub fn path_from_root(&self, id: WidgetId) -> Vec<WidgetId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(widget) = current {
            if !self.nodes.contains_key(widget) {
                break;
            }
            chain.push(widget);
            current = self.parent(widget);
        }
        chain.reverse();
        chain
    }

    /// `id` and all its descendants, parents before children.
    pub fn descendants(&self, id: WidgetId) -> Vec<WidgetId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(widget) = stack.pop() {
            let Some(node) = self.nodes.get(widget) else {
                continue;
            };
            out.push(widget);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Allocation in the coordinates of the window hosting the widget.
    pub fn allocation(&self, id: WidgetId) -> Rect {
        self.nodes.get(id).map_or(Rect::ZERO, |n| n.allocation)
    }

    /// The rectangle last passed to `size_allocate_with_baseline`.
    pub fn allocated_rect(&self, id: WidgetId) -> Rect {
        self.nodes.get(id).map_or(Rect::ZERO, |n| n.allocated_rect)
    }

    /// The baseline last passed to `size_allocate_with_baseline`.
    pub fn allocated_baseline(&self, id: WidgetId) -> i32 {
        self.nodes.get(id).map_or(-1, |n| n.allocated_baseline)
    }

    /// The adjusted baseline of the current allocation, `-1` if none.
    pub fn baseline(&self, id: WidgetId) -> i32 {
        self.nodes.get(id).map_or(-1, |n| n.baseline)
    }

    /// Clip rectangle, in the same coordinates as the allocation.
    pub fn clip(&self, id: WidgetId) -> Rect {
        self.nodes.get(id).map_or(Rect::ZERO, |n| n.clip)
    }

    /// The native window the widget draws into.
    pub fn window(&self, id: WidgetId) -> Option<NativeWindowId> {
        self.nodes.get(id)?.window
    }

    /// The widget owning a native window.
    pub fn window_owner(&self, window: NativeWindowId) -> Option<WidgetId> {
        self.window_owners.get(&window).copied()
    }

    /// Effective state flags.
    pub fn state_flags(&self, id: WidgetId) -> StateFlags {
        self.nodes.get(id).map_or(StateFlags::empty(), |n| n.state)
    }

    /// Mutable access to the widget's signals for connecting handlers.
    pub fn signals_mut(&mut self, id: WidgetId) -> Option<&mut WidgetSignals> {
        Some(&mut self.nodes.get_mut(id)?.signals)
    }

    /// Tooltip text.
    pub fn tooltip_text(&self, id: WidgetId) -> Option<&str> {
        self.nodes.get(id)?.tooltip_text.as_deref()
    }

    /// Set plain tooltip text. Setting text enables `has_tooltip`.
    pub fn set_tooltip_text(&mut self, id: WidgetId, text: Option<String>) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.set(WidgetFlags::HAS_TOOLTIP, text.is_some());
        node.tooltip_markup = None;
        node.tooltip_text = text;
        self.notify(id, "tooltip-text");
    }

    /// Tooltip markup.
    pub fn tooltip_markup(&self, id: WidgetId) -> Option<&str> {
        self.nodes.get(id)?.tooltip_markup.as_deref()
    }

    /// Set tooltip markup. Setting markup enables `has_tooltip`.
    pub fn set_tooltip_markup(&mut self, id: WidgetId, markup: Option<String>) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.set(WidgetFlags::HAS_TOOLTIP, markup.is_some());
        node.tooltip_text = None;
        node.tooltip_markup = markup;
        self.notify(id, "tooltip-markup");
    }

    /// Set whether the widget shows a tooltip.
    pub fn set_has_tooltip(&mut self, id: WidgetId, has_tooltip: bool) {
        if self.has_flags(id, WidgetFlags::HAS_TOOLTIP) != has_tooltip {
            self.set_flags(id, WidgetFlags::HAS_TOOLTIP, has_tooltip);
            self.notify(id, "has-tooltip");
        }
    }

    /// Register a label that activates the widget by mnemonic.
    pub fn add_mnemonic_label(&mut self, id: WidgetId, label: WidgetId) {
        if let Some(node) = self.nodes.get_mut(id) {
            if !node.mnemonic_labels.contains(&label) {
                node.mnemonic_labels.push(label);
            }
        }
    }

    /// Unregister a mnemonic label.
    pub fn remove_mnemonic_label(&mut self, id: WidgetId, label: WidgetId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.mnemonic_labels.retain(|l| *l != label);
        }
    }

    /// Labels registered for the widget that are still alive.
    pub fn mnemonic_labels(&self, id: WidgetId) -> Vec<WidgetId> {
        self.nodes.get(id).map_or_else(Vec::new, |n| {
            n.mnemonic_labels
                .iter()
                .copied()
                .filter(|l| self.nodes.contains_key(*l))
                .collect()
        })
    }

    /// Mark the widget as an internal child of a composite widget.
    pub fn set_composite_child(&mut self, id: WidgetId, composite: bool) {
        self.set_flags(id, WidgetFlags::COMPOSITE_CHILD, composite);
    }

    /// Exclude the widget from [`show_all`](Self::show_all).
    pub fn set_no_show_all(&mut self, id: WidgetId, no_show_all: bool) {
        if self.has_flags(id, WidgetFlags::NO_SHOW_ALL) != no_show_all {
            self.set_flags(id, WidgetFlags::NO_SHOW_ALL, no_show_all);
            self.notify(id, "no-show-all");
        }
    }

    /// Turn a freshly created widget into a toplevel.
    ///
    /// Toplevels are their own resize root, hold a reference on behalf of
    /// the toolkit and carry focus, default and accelerator state. Classes
    /// call this from [`Widget::init`].
    pub fn make_toplevel(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.parent.is_some() {
            tracing::warn!(
                target: targets::LIFECYCLE,
                widget = node.type_name,
                "a widget with a parent cannot become a toplevel"
            );
            return;
        }
        node.set(
            WidgetFlags::TOPLEVEL | WidgetFlags::IS_RESIZE_ROOT | WidgetFlags::TOPLEVEL_REF,
            true,
        );
        // the toolkit takes over the floating reference
        node.set(WidgetFlags::FLOATING, false);
        node.toplevel.get_or_insert_with(Default::default);
    }

    /// Whether the widget owns a native window once realized.
    pub fn set_has_window(&mut self, id: WidgetId, has_window: bool) {
        self.set_flags(id, WidgetFlags::NO_WINDOW, !has_window);
    }

    /// Make the widget the root of its own layout passes.
    pub fn set_resize_root(&mut self, id: WidgetId, resize_root: bool) {
        self.set_flags(id, WidgetFlags::IS_RESIZE_ROOT, resize_root);
    }

    // =========================================================================
    // Reference counting
    // =========================================================================

    /// Current reference count.
    pub fn ref_count(&self, id: WidgetId) -> u32 {
        self.nodes.get(id).map_or(0, |n| n.ref_count)
    }

    /// Whether nobody has taken ownership of the widget yet.
    pub fn is_floating(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::FLOATING)
    }

    /// Take an additional strong reference.
    pub fn ref_widget(&mut self, id: WidgetId) {
        match self.nodes.get_mut(id) {
            Some(node) => node.ref_count += 1,
            None => {
                tracing::warn!(target: targets::LIFECYCLE, ?id, "ref on invalid widget");
            }
        }
    }

    /// Take ownership of a floating reference, or add a reference.
    pub(crate) fn ref_sink(&mut self, id: WidgetId) {
        if let Some(node) = self.nodes.get_mut(id) {
            if node.has(WidgetFlags::FLOATING) {
                node.set(WidgetFlags::FLOATING, false);
            } else {
                node.ref_count += 1;
            }
        }
    }

    /// Drop a strong reference.
    ///
    /// Dropping the last reference destroys the widget if that has not
    /// happened yet, then finalizes it.
    pub fn unref_widget(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get_mut(id) else {
            tracing::warn!(target: targets::LIFECYCLE, ?id, "unref on invalid widget");
            return;
        };
        if node.ref_count == 0 {
            tracing::warn!(target: targets::LIFECYCLE, widget = node.type_name, "unref below zero");
            return;
        }
        node.ref_count -= 1;
        if node.ref_count > 0 || node.has(WidgetFlags::DISPOSING) {
            return;
        }
        if node.has(WidgetFlags::IN_DESTRUCTION) {
            self.finalize(id);
        } else {
            // destroy finalizes once it sees the count at zero
            self.destroy(id);
        }
    }

    /// Emit `finalize`, run the class hook and free the slot.
    pub(crate) fn finalize(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        tracing::trace!(target: targets::LIFECYCLE, widget = node.type_name, "finalize");
        self.emit(id, |s| &s.finalize, ());

        let Some(mut node) = self.nodes.remove(id) else {
            return;
        };
        if let Some(mut class) = node.class.take() {
            class.finalize();
        }
        self.window_owners.retain(|_, owner| *owner != id);
        self.pointer_focus
            .retain(|_, focus| focus.widget != id && focus.target != id);
        self.implicit_grabs.retain(|_, w| *w != id);
        self.touch_grabs.retain(|_, w| *w != id);
        self.resize_queue.retain(|w| *w != id);
        for group in node.size_groups.drain(..) {
            if let Some(group) = self.size_groups.get_mut(group) {
                group.widgets.retain(|w| *w != id);
            }
        }
    }

    // =========================================================================
    // Signals
    // =========================================================================

    /// Emit one of the widget's unit-result signals.
    pub(crate) fn emit<A: 'static>(
        &mut self,
        id: WidgetId,
        select: impl Fn(&WidgetSignals) -> &WidgetSignal<A>,
        args: A,
    ) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let slots = select(&node.signals).snapshot();
        if !slots.is_empty() {
            signal::emit(self, &slots, &(id, args));
        }
    }

    /// Emit `notify` for a property.
    pub(crate) fn notify(&mut self, id: WidgetId, property: &'static str) {
        self.emit(id, |s| &s.notify, property);
    }

    // =========================================================================
    // Invariant checking
    // =========================================================================

    pub(crate) fn push_verify_invariants(&mut self, id: WidgetId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.verify_depth += 1;
        }
    }

    pub(crate) fn pop_verify_invariants(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.verify_depth = node.verify_depth.saturating_sub(1);
        if node.verify_depth == 0 {
            if let Err(message) = self.check_node_invariants(id) {
                tracing::warn!(
                    target: targets::LIFECYCLE,
                    widget = self.type_name(id).unwrap_or("?"),
                    message,
                    "widget invariant violated"
                );
            }
        }
    }

    pub(crate) fn check_node_invariants(&self, id: WidgetId) -> Result<(), &'static str> {
        let Some(node) = self.nodes.get(id) else {
            return Ok(());
        };
        let flags = node.flags;
        if flags.contains(WidgetFlags::MAPPED) {
            if !flags.contains(WidgetFlags::REALIZED) {
                return Err("mapped widget is not realized");
            }
            if !flags.contains(WidgetFlags::VISIBLE) {
                return Err("mapped widget is not visible");
            }
            if !node.is_toplevel() && !flags.contains(WidgetFlags::CHILD_VISIBLE) {
                return Err("mapped widget is not child-visible");
            }
        }
        if let Some(parent) = node.parent.and_then(|p| self.nodes.get(p)) {
            let reparenting = flags.contains(WidgetFlags::IN_REPARENT)
                || parent.flags.contains(WidgetFlags::IN_REPARENT);
            if flags.contains(WidgetFlags::REALIZED)
                && !parent.flags.contains(WidgetFlags::REALIZED)
                && !reparenting
                && parent.verify_depth == 0
            {
                return Err("realized widget has an unrealized parent");
            }
            if flags.contains(WidgetFlags::MAPPED)
                && !parent.flags.contains(WidgetFlags::MAPPED)
                && !reparenting
                && parent.verify_depth == 0
            {
                return Err("mapped widget has an unmapped parent");
            }
        }
        Ok(())
    }

    // =========================================================================
    // Direction
    // =========================================================================

    /// The explicitly set direction, [`TextDirection::None`] if unset.
    pub fn direction(&self, id: WidgetId) -> TextDirection {
        self.nodes.get(id).map_or(TextDirection::None, |n| n.direction)
    }

    /// The direction in effect: explicit, or inherited from the nearest
    /// ancestor with an explicit one, or the default.
    pub fn resolved_direction(&self, id: WidgetId) -> TextDirection {
        let mut current = Some(id);
        while let Some(widget) = current {
            let Some(node) = self.nodes.get(widget) else {
                break;
            };
            if node.direction != TextDirection::None {
                return node.direction;
            }
            current = node.parent;
        }
        self.settings.default_direction.into()
    }
}

pub(crate) fn direction_state(direction: TextDirection) -> StateFlags {
    match direction {
        TextDirection::Rtl => StateFlags::DIR_RTL,
        _ => StateFlags::DIR_LTR,
    }
}
