//! Keyboard focus and default widget arbitration.
//!
//! Each toplevel records one focus widget and one default widget. Focus is
//! mirrored into the tree as a chain of `focus_child` pointers from the
//! toplevel down to the focus widget, so containers know which child to
//! return focus to.

use trellis_core::logging::targets;

use super::events::{Event, EventKind};
use super::flags::{StateFlags, WidgetFlags};
use super::tree::lookup;
use super::{WidgetId, WidgetTree};

impl WidgetTree {
    /// Whether the widget can take keyboard focus.
    pub fn can_focus(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::CAN_FOCUS)
    }

    /// Allow or forbid keyboard focus.
    pub fn set_can_focus(&mut self, id: WidgetId, can_focus: bool) {
        if self.can_focus(id) == can_focus {
            return;
        }
        self.set_flags(id, WidgetFlags::CAN_FOCUS, can_focus);
        if !can_focus && self.has_focus(id) {
            self.release_focus(id);
        }
        self.notify(id, "can-focus");
    }

    /// Whether the widget can become the default widget.
    pub fn can_default(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::CAN_DEFAULT)
    }

    /// Allow or forbid becoming the default widget.
    pub fn set_can_default(&mut self, id: WidgetId, can_default: bool) {
        if self.can_default(id) != can_default {
            self.set_flags(id, WidgetFlags::CAN_DEFAULT, can_default);
            self.queue_resize(id);
            self.notify(id, "can-default");
        }
    }

    /// Whether the widget takes the default while focused.
    pub fn receives_default(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::RECEIVES_DEFAULT)
    }

    /// Make the widget take the default while focused.
    pub fn set_receives_default(&mut self, id: WidgetId, receives_default: bool) {
        if self.receives_default(id) != receives_default {
            self.set_flags(id, WidgetFlags::RECEIVES_DEFAULT, receives_default);
            self.notify(id, "receives-default");
        }
    }

    /// Whether clicking the widget focuses it.
    pub fn focus_on_click(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::FOCUS_ON_CLICK)
    }

    /// Choose whether clicking the widget focuses it.
    pub fn set_focus_on_click(&mut self, id: WidgetId, focus_on_click: bool) {
        if self.focus_on_click(id) != focus_on_click {
            self.set_flags(id, WidgetFlags::FOCUS_ON_CLICK, focus_on_click);
            self.notify(id, "focus-on-click");
        }
    }

    /// Whether the widget holds keyboard focus.
    pub fn has_focus(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::HAS_FOCUS)
    }

    /// Whether the widget is its toplevel's focus widget.
    pub fn is_focus(&self, id: WidgetId) -> bool {
        self.toplevel(id)
            .is_some_and(|t| self.focus_widget(t) == Some(id))
    }

    /// Whether the widget is the default widget of its toplevel.
    pub fn has_default(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::HAS_DEFAULT)
    }

    /// The child on the path to the focus widget.
    pub fn focus_child(&self, id: WidgetId) -> Option<WidgetId> {
        self.nodes.get(id)?.focus_child
    }

    /// The toplevel's focus widget.
    pub fn focus_widget(&self, toplevel: WidgetId) -> Option<WidgetId> {
        self.nodes.get(toplevel)?.toplevel.as_ref()?.focus_widget
    }

    /// The toplevel's default widget.
    pub fn default_widget(&self, toplevel: WidgetId) -> Option<WidgetId> {
        self.nodes.get(toplevel)?.toplevel.as_ref()?.default_widget
    }

    /// Move keyboard focus to the widget.
    ///
    /// The widget must be focusable and sensitive. Every ancestor records
    /// the child leading to it, and the toplevel switches its focus widget,
    /// sending focus-out and focus-in events.
    pub fn grab_focus(&mut self, id: WidgetId) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if !node.has(WidgetFlags::CAN_FOCUS) || !self.is_sensitive(id) {
            tracing::debug!(target: targets::EVENTS, widget = node.type_name, "widget cannot take focus");
            return;
        }
        let parent = node.parent;
        let toplevel = self.toplevel(id);
        if let Some(toplevel) = toplevel {
            let current = self.focus_widget(toplevel);
            if current == Some(id) {
                return;
            }
            // clear the old chain below the point where the new one joins
            if let Some(mut widget) = current {
                while let Some(up) = self.parent(widget) {
                    if Some(up) == parent {
                        break;
                    }
                    if let Some(node) = self.nodes.get_mut(up) {
                        node.focus_child = None;
                    }
                    widget = up;
                }
            }
        }

        let mut widget = id;
        while let Some(up) = self.parent(widget) {
            if let Some(node) = self.nodes.get_mut(up) {
                node.focus_child = Some(widget);
            }
            widget = up;
        }
        if let Some(toplevel) = toplevel {
            self.set_toplevel_focus(toplevel, Some(id));
        }
    }

    /// Switch the toplevel's focus widget, updating flags and sending
    /// focus-change events.
    fn set_toplevel_focus(&mut self, toplevel: WidgetId, focus: Option<WidgetId>) {
        let Some(data) = self.nodes.get_mut(toplevel).and_then(|n| n.toplevel.as_mut()) else {
            return;
        };
        let previous = data.focus_widget;
        if previous == focus {
            return;
        }
        data.focus_widget = focus;

        if let Some(previous) = previous.filter(|w| self.nodes.contains_key(*w)) {
            self.set_flags(previous, WidgetFlags::HAS_FOCUS, false);
            self.unset_state_flags(previous, StateFlags::FOCUSED);
            self.deliver_direct(previous, &Event::new(EventKind::FocusChange { focus_in: false }));
            self.notify(previous, "has-focus");
        }
        if let Some(focus) = focus {
            self.set_flags(focus, WidgetFlags::HAS_FOCUS, true);
            self.set_state_flags(focus, StateFlags::FOCUSED, false);
            self.deliver_direct(focus, &Event::new(EventKind::FocusChange { focus_in: true }));
            self.notify(focus, "has-focus");
        }
        self.notify(toplevel, "focus-widget");
    }

    /// Drop focus if the widget or one of its descendants holds it.
    pub(crate) fn release_focus(&mut self, id: WidgetId) {
        let Some(toplevel) = self.toplevel(id) else {
            return;
        };
        let Some(focus) = self.focus_widget(toplevel) else {
            return;
        };
        if focus != id && !self.is_ancestor(focus, id) {
            return;
        }
        let mut widget = focus;
        while let Some(up) = self.parent(widget) {
            if let Some(node) = self.nodes.get_mut(up) {
                node.focus_child = None;
            }
            widget = up;
        }
        self.set_toplevel_focus(toplevel, None);
    }

    /// Make the widget the default of its toplevel.
    pub fn grab_default(&mut self, id: WidgetId) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if !node.has(WidgetFlags::CAN_DEFAULT) {
            tracing::warn!(
                target: targets::EVENTS,
                widget = node.type_name,
                "widget cannot be the default"
            );
            return;
        }
        if !self.is_sensitive(id) {
            return;
        }
        if let Some(toplevel) = self.toplevel(id) {
            self.set_toplevel_default(toplevel, Some(id));
        }
    }

    fn set_toplevel_default(&mut self, toplevel: WidgetId, default: Option<WidgetId>) {
        let Some(data) = self.nodes.get_mut(toplevel).and_then(|n| n.toplevel.as_mut()) else {
            return;
        };
        let previous = data.default_widget;
        if previous == default {
            return;
        }
        data.default_widget = default;
        if let Some(previous) = previous.filter(|w| self.nodes.contains_key(*w)) {
            self.set_flags(previous, WidgetFlags::HAS_DEFAULT, false);
            self.queue_draw(previous);
            self.notify(previous, "has-default");
        }
        if let Some(default) = default {
            self.set_flags(default, WidgetFlags::HAS_DEFAULT, true);
            self.queue_draw(default);
            self.notify(default, "has-default");
        }
    }

    /// Clear the toplevel's focus and default widgets if `widget` is or
    /// contains them. Called before `widget` leaves the toplevel.
    pub(crate) fn unset_focus_and_default(&mut self, toplevel: WidgetId, widget: WidgetId) {
        let within = |tree: &Self, candidate: Option<WidgetId>| {
            candidate.is_some_and(|c| c == widget || tree.is_ancestor(c, widget))
        };
        if within(self, self.focus_widget(toplevel)) {
            self.release_focus(widget);
        }
        if within(self, self.default_widget(toplevel)) {
            self.set_toplevel_default(toplevel, None);
        }
    }

    /// Notify the user of an invalid action, by ringing the bell unless the
    /// settings turn it off.
    pub fn error_bell(&mut self, id: WidgetId) {
        if !self.settings.error_bell {
            return;
        }
        let window = self.toplevel(id).and_then(|t| self.window(t));
        self.display.beep(window);
    }
}

#[cfg(test)]
mod tests {
    use trellis_core::Settings;

    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::widget::widgets::{BoxContainer, Window};
    use crate::widget::{Orientation, Widget};

    struct Entry;
    impl Widget for Entry {
        fn init(&mut self, tree: &mut WidgetTree, id: WidgetId) {
            tree.set_can_focus(id, true);
            tree.set_can_default(id, true);
        }
    }

    fn window_with_two_entries() -> (WidgetTree, HeadlessDisplay, WidgetId, WidgetId, WidgetId) {
        let display = HeadlessDisplay::new();
        let mut tree = WidgetTree::new(Box::new(display.clone()), Settings::default());
        let window = tree.create(Window::new());
        let column = tree.create(BoxContainer::new(Orientation::Vertical));
        let a = tree.create(Entry);
        let b = tree.create(Entry);
        tree.container_add(window, column);
        tree.container_add(column, a);
        tree.container_add(column, b);
        tree.show_all(window);
        (tree, display, window, a, b)
    }

    #[test]
    fn only_one_widget_holds_focus() {
        let (mut tree, _, window, a, b) = window_with_two_entries();
        tree.grab_focus(a);
        assert!(tree.has_focus(a));
        assert!(tree.state_flags(a).contains(StateFlags::FOCUSED));

        tree.grab_focus(b);
        assert!(!tree.has_focus(a));
        assert!(tree.has_focus(b));
        assert_eq!(tree.focus_widget(window), Some(b));
        let column = tree.parent(b).unwrap();
        assert_eq!(tree.focus_child(column), Some(b));
        assert_eq!(tree.focus_child(window), Some(column));
    }

    #[test]
    fn insensitive_widgets_lose_and_refuse_focus() {
        let (mut tree, _, window, a, b) = window_with_two_entries();
        tree.grab_focus(a);
        tree.set_sensitive(a, false);
        assert!(!tree.has_focus(a));
        assert_eq!(tree.focus_widget(window), None);

        tree.grab_focus(a);
        assert_eq!(tree.focus_widget(window), None);
        tree.grab_focus(b);
        assert_eq!(tree.focus_widget(window), Some(b));
    }

    #[test]
    fn removing_the_default_clears_it() {
        let (mut tree, _, window, a, b) = window_with_two_entries();
        tree.grab_default(a);
        tree.grab_default(b);
        assert!(!tree.has_default(a));
        assert!(tree.has_default(b));

        let column = tree.parent(b).unwrap();
        tree.container_remove(column, b);
        assert_eq!(tree.default_widget(window), None);
    }

    #[test]
    fn error_bell_honours_settings() {
        let (mut tree, display, _, a, _) = window_with_two_entries();
        tree.error_bell(a);
        assert_eq!(display.beeps(), 1);
        tree.settings.error_bell = false;
        tree.error_bell(a);
        assert_eq!(display.beeps(), 1);
    }
}
