//! Modal grabs, device grabs and window groups.
//!
//! Grab state is scoped to a window group. While a widget holds the top of
//! its group's grab stack, pointer and key events aimed anywhere outside it
//! are redirected to it and every widget outside it is *shadowed*.

use trellis_core::logging::targets;

use super::events::{CrossingMode, DeviceId, Event, EventKind, GrabBrokenEvent};
use super::flags::WidgetFlags;
use super::tree::lookup;
use super::{WidgetId, WidgetTree, WindowGroupId};

/// A device grabbed by a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeviceGrab {
    pub(crate) widget: WidgetId,
    pub(crate) device: DeviceId,
    /// Whether other devices are blocked from the shadowed widgets too.
    pub(crate) block_others: bool,
}

/// A set of toplevels sharing grab state.
#[derive(Debug, Clone, Default)]
pub struct WindowGroup {
    pub(crate) grabs: Vec<WidgetId>,
    pub(crate) device_grabs: Vec<DeviceGrab>,
}

impl WindowGroup {
    /// The widget at the top of the grab stack.
    pub fn current_grab(&self) -> Option<WidgetId> {
        self.grabs.last().copied()
    }

    /// Number of stacked grabs.
    pub fn grab_depth(&self) -> usize {
        self.grabs.len()
    }
}

impl WidgetTree {
    // =========================================================================
    // Window groups
    // =========================================================================

    /// Create an empty window group.
    pub fn create_window_group(&mut self) -> WindowGroupId {
        self.window_groups.insert(WindowGroup::default())
    }

    /// Move a toplevel into a window group.
    pub fn window_group_add_window(&mut self, group: WindowGroupId, toplevel: WidgetId) {
        if !self.window_groups.contains_key(group) {
            tracing::warn!(target: targets::EVENTS, ?group, "invalid window group");
            return;
        }
        let Some(node) = lookup(&self.nodes, toplevel) else {
            return;
        };
        if !node.is_toplevel() {
            tracing::warn!(
                target: targets::EVENTS,
                widget = node.type_name,
                "only toplevels join window groups"
            );
            return;
        }
        let previous = self.window_group_of(toplevel);
        if previous == group {
            return;
        }
        // grabs held inside the toplevel do not follow it
        let held: Vec<WidgetId> = self.window_groups[previous]
            .grabs
            .iter()
            .copied()
            .filter(|w| self.toplevel(*w) == Some(toplevel))
            .collect();
        for widget in held {
            self.grab_remove(widget);
        }
        if let Some(data) = self.nodes.get_mut(toplevel).and_then(|n| n.toplevel.as_mut()) {
            data.window_group = Some(group);
        }
    }

    /// Return a toplevel to the default window group.
    pub fn window_group_remove_window(&mut self, group: WindowGroupId, toplevel: WidgetId) {
        if self.window_group_of(toplevel) != group {
            return;
        }
        let default = self.default_window_group;
        self.window_group_add_window(default, toplevel);
    }

    /// The window group of the widget's toplevel; the default group for
    /// widgets that are not anchored.
    pub fn window_group_of(&self, id: WidgetId) -> WindowGroupId {
        self.toplevel(id)
            .and_then(|t| self.nodes.get(t)?.toplevel.as_ref()?.window_group)
            .filter(|g| self.window_groups.contains_key(*g))
            .unwrap_or(self.default_window_group)
    }

    /// Look up a window group.
    pub fn window_group(&self, group: WindowGroupId) -> Option<&WindowGroup> {
        self.window_groups.get(group)
    }

    // =========================================================================
    // Modal grabs
    // =========================================================================

    /// Whether the widget is on its group's grab stack.
    pub fn has_grab(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::HAS_GRAB)
    }

    /// Whether a grab outside the widget currently shadows it.
    pub fn is_shadowed(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::SHADOWED)
    }

    /// The widget holding the top grab of the widget's window group.
    pub fn current_grab(&self, id: WidgetId) -> Option<WidgetId> {
        self.window_groups
            .get(self.window_group_of(id))?
            .current_grab()
    }

    /// Push a modal grab for the widget.
    ///
    /// Insensitive widgets cannot grab.
    pub fn grab_add(&mut self, id: WidgetId) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if node.has(WidgetFlags::HAS_GRAB) {
            return;
        }
        if !self.is_sensitive(id) {
            tracing::warn!(
                target: targets::EVENTS,
                widget = node.type_name,
                "insensitive widgets cannot grab"
            );
            return;
        }
        tracing::debug!(target: targets::EVENTS, widget = node.type_name, "grab added");
        let group = self.window_group_of(id);
        let previous = self.window_groups[group].current_grab();
        self.set_flags(id, WidgetFlags::HAS_GRAB, true);
        self.window_groups[group].grabs.push(id);
        self.grab_notify(group, previous, Some(id), CrossingMode::Grab);
    }

    /// Drop the widget's modal grab.
    pub fn grab_remove(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if !node.has(WidgetFlags::HAS_GRAB) {
            return;
        }
        tracing::debug!(target: targets::EVENTS, widget = node.type_name, "grab removed");
        self.set_flags(id, WidgetFlags::HAS_GRAB, false);
        // the widget may have changed groups while holding the grab
        let mut released = None;
        for (group_id, group) in self.window_groups.iter_mut() {
            let previous = group.current_grab();
            let before = group.grabs.len();
            group.grabs.retain(|w| *w != id);
            if group.grabs.len() != before {
                released = Some((group_id, previous, group.current_grab()));
            }
        }
        if let Some((group, previous, current)) = released {
            if previous != current {
                self.grab_notify(group, previous, current, CrossingMode::Ungrab);
            }
        }
    }

    /// Recompute shadowing in a group after its top grab changed.
    ///
    /// Widgets that change shadow state get `grab_notify` and newly
    /// shadowed ones have their controllers reset. Pointers whose widget
    /// left or re-entered reach see a crossing.
    fn grab_notify(
        &mut self,
        group: WindowGroupId,
        previous: Option<WidgetId>,
        current: Option<WidgetId>,
        mode: CrossingMode,
    ) {
        let members: Vec<WidgetId> = self
            .nodes
            .keys()
            .filter(|w| self.window_group_of(*w) == group)
            .collect();
        let mut changed = Vec::new();
        for widget in members {
            let shadowed = current.is_some_and(|g| widget != g && !self.is_ancestor(widget, g));
            if shadowed != self.has_flags(widget, WidgetFlags::SHADOWED) {
                self.set_flags(widget, WidgetFlags::SHADOWED, shadowed);
                changed.push((widget, shadowed));
            }
        }
        self.cross_pointers_for_grab(previous, current, mode);
        for (widget, shadowed) in changed {
            if !self.nodes.contains_key(widget) {
                continue;
            }
            if shadowed {
                self.reset_controllers(widget);
            }
            self.emit(widget, |s| &s.grab_notify, !shadowed);
        }
    }

    // =========================================================================
    // Device grabs
    // =========================================================================

    /// Route all events of a device to the widget.
    pub fn device_grab_add(&mut self, id: WidgetId, device: DeviceId, block_others: bool) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if !node.has(WidgetFlags::MAPPED) {
            tracing::warn!(
                target: targets::EVENTS,
                widget = node.type_name,
                "device grabs need a mapped widget"
            );
            return;
        }
        let group = self.window_group_of(id);
        let grabs = &mut self.window_groups[group].device_grabs;
        grabs.retain(|g| g.device != device);
        grabs.push(DeviceGrab {
            widget: id,
            device,
            block_others,
        });
    }

    /// Release a device grab held by the widget.
    pub fn device_grab_remove(&mut self, id: WidgetId, device: DeviceId) {
        let group = self.window_group_of(id);
        if let Some(group) = self.window_groups.get_mut(group) {
            group
                .device_grabs
                .retain(|g| !(g.widget == id && g.device == device));
        }
    }

    /// The widget holding a grab on the device, if any.
    pub(crate) fn device_grab_widget(&self, group: WindowGroupId, device: DeviceId) -> Option<WidgetId> {
        self.window_groups
            .get(group)?
            .device_grabs
            .iter()
            .rev()
            .find(|g| g.device == device)
            .map(|g| g.widget)
    }

    /// Whether another device's grab blocks events from `device` reaching
    /// `id`.
    pub(crate) fn blocked_by_device_grab(&self, id: WidgetId, device: DeviceId) -> bool {
        let Some(group) = self.window_groups.get(self.window_group_of(id)) else {
            return false;
        };
        group.device_grabs.iter().any(|g| {
            g.block_others
                && g.device != device
                && g.widget != id
                && !self.is_ancestor(id, g.widget)
        })
    }

    /// Drop every device and implicit grab held by the widget, telling it
    /// the grabs are gone.
    pub(crate) fn drop_device_grabs(&mut self, id: WidgetId) {
        let mut broken = Vec::new();
        for group in self.window_groups.values_mut() {
            group.device_grabs.retain(|g| {
                if g.widget == id {
                    broken.push((g.device, false));
                    false
                } else {
                    true
                }
            });
        }
        self.implicit_grabs.retain(|device, w| {
            if *w == id {
                broken.push((*device, true));
                false
            } else {
                true
            }
        });
        let sequences: Vec<u32> = self
            .touch_grabs
            .iter()
            .filter(|(_, w)| **w == id)
            .map(|(s, _)| *s)
            .collect();
        for sequence in sequences {
            self.touch_grabs.remove(&sequence);
            if self.emulating_sequence == Some(sequence) {
                self.emulating_sequence = None;
            }
        }
        for (device, implicit) in broken {
            self.send_grab_broken(id, device, implicit);
        }
    }

    /// Break every grab held inside the subtree rooted at `id`.
    ///
    /// Called when the subtree is unmapped or made insensitive.
    pub(crate) fn break_grabs_within(&mut self, id: WidgetId) {
        for widget in self.descendants(id) {
            if self.has_flags(widget, WidgetFlags::HAS_GRAB) {
                self.grab_remove(widget);
                self.send_grab_broken(widget, DeviceId::POINTER, false);
            }
            self.drop_device_grabs(widget);
        }
    }

    fn send_grab_broken(&mut self, id: WidgetId, device: DeviceId, implicit: bool) {
        if !self.nodes.contains_key(id) {
            return;
        }
        tracing::debug!(
            target: targets::EVENTS,
            widget = self.type_name(id).unwrap_or("?"),
            implicit,
            "grab broken"
        );
        let mut event = Event::new(EventKind::GrabBroken(GrabBrokenEvent {
            keyboard: device == DeviceId::KEYBOARD,
            implicit,
            grab_widget: self.current_grab(id),
        }))
        .with_device(device);
        event.window = self.window(id);
        event.send_event = true;
        self.deliver_direct(id, &event);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use trellis_core::Settings;

    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::widget::widgets::{BoxContainer, Window};
    use crate::widget::{Orientation, Widget};

    struct Leaf;
    impl Widget for Leaf {}

    fn window_with_children() -> (WidgetTree, WidgetId, WidgetId, WidgetId) {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        let window = tree.create(Window::new());
        let column = tree.create(BoxContainer::new(Orientation::Vertical));
        let dialog = tree.create(Leaf);
        let other = tree.create(Leaf);
        tree.container_add(window, column);
        tree.container_add(column, dialog);
        tree.container_add(column, other);
        tree.show_all(window);
        (tree, window, dialog, other)
    }

    #[test]
    fn grab_shadows_everything_outside() {
        let (mut tree, window, dialog, other) = window_with_children();
        let notified = Rc::new(RefCell::new(Vec::new()));
        let log = notified.clone();
        tree.signals_mut(other)
            .unwrap()
            .grab_notify
            .connect(move |_, (_, unshadowed)| log.borrow_mut().push(*unshadowed));

        tree.grab_add(dialog);
        assert!(tree.has_grab(dialog));
        assert_eq!(tree.current_grab(window), Some(dialog));
        assert!(tree.is_shadowed(other));
        assert!(tree.is_shadowed(window));
        assert!(!tree.is_shadowed(dialog));

        tree.grab_remove(dialog);
        assert!(!tree.is_shadowed(other));
        assert_eq!(*notified.borrow(), vec![false, true]);
    }

    #[test]
    fn unmapping_the_holder_breaks_its_grab() {
        let (mut tree, window, dialog, _) = window_with_children();
        let broken = Rc::new(RefCell::new(0));
        let count = broken.clone();
        tree.signals_mut(dialog).unwrap().event.connect(move |_, (_, event)| {
            if matches!(event.kind, EventKind::GrabBroken(_)) {
                *count.borrow_mut() += 1;
            }
            crate::widget::Propagation::Proceed
        });

        tree.grab_add(dialog);
        tree.hide(dialog);
        assert!(!tree.has_grab(dialog));
        assert_eq!(tree.current_grab(window), None);
        assert_eq!(*broken.borrow(), 1);
    }

    #[test]
    fn insensitive_widgets_cannot_grab() {
        let (mut tree, window, dialog, _) = window_with_children();
        tree.set_sensitive(dialog, false);
        tree.grab_add(dialog);
        assert_eq!(tree.current_grab(window), None);
    }

    #[test]
    fn grabs_are_scoped_to_window_groups() {
        let (mut tree, window, dialog, _) = window_with_children();
        let second = tree.create(Window::new());
        tree.show(second);
        let group = tree.create_window_group();
        tree.window_group_add_window(group, second);

        tree.grab_add(dialog);
        assert!(tree.is_shadowed(window));
        assert!(!tree.is_shadowed(second));
        assert_eq!(tree.current_grab(second), None);
    }
}
