//! Event routing.
//!
//! Backend events arrive addressed to a native window. The dispatcher
//! resolves the widget the event is aimed at, honouring grabs, then
//! delivers it along the chain from the root down to that widget:
//!
//! 1. **Capture**: capture-phase controllers, root first.
//! 2. **Target**: target-phase controllers of the event widget.
//! 3. **Bubble**: from the event widget up, the `event` signal and class
//!    handler, then bubble-phase controllers.
//!
//! Any step may stop delivery. `event_after` is emitted on the event widget
//! in every case.

use trellis_core::logging::targets;
use trellis_core::{Point, Rect, signal};

use super::controller::PropagationPhase;
use super::events::{CrossingMode, DeviceId, Event, EventKind, EventSequence, InputSource, Propagation};
use super::flags::{EventMask, ModifierType, StateFlags, WidgetFlags};
use super::tree::{lookup, precondition};
use super::{WidgetId, WidgetTree};
use crate::display::NativeWindowId;
use crate::error::WidgetError;

impl WidgetTree {
    // =========================================================================
    // Entry point
    // =========================================================================

    /// Route a backend event to the widgets.
    ///
    /// Events for windows that stopped being viewable are dropped, except
    /// the release, leave and cancel events that let widgets clean up. A
    /// touch sequence that is the only one alive also drives an emulated
    /// pointer, delivered right after the touch event.
    #[tracing::instrument(skip_all, level = "trace", fields(event = event.type_name()))]
    pub fn dispatch_event(&mut self, event: &Event) -> Propagation {
        let Some(window) = event.window else {
            tracing::warn!(target: targets::EVENTS, event = event.type_name(), "event without a window");
            return Propagation::Proceed;
        };
        let Some(owner) = self.window_owner(window) else {
            tracing::trace!(target: targets::EVENTS, ?window, "event for an unowned window");
            return Propagation::Proceed;
        };
        if !event.is_cleanup() && !self.display.is_viewable(window) {
            tracing::trace!(target: targets::EVENTS, event = event.type_name(), "window not viewable, dropped");
            return Propagation::Proceed;
        }

        let mut event = event.clone();
        let emulated = self.track_touch_emulation(&mut event);
        let result = self.dispatch_one(owner, window, &event);
        if let Some(emulated) = emulated {
            if let Some(owner) = self.window_owner(window) {
                self.dispatch_one(owner, window, &emulated);
            }
        }

        if let EventKind::TouchEnd(touch) | EventKind::TouchCancel(touch) = &event.kind {
            if self.emulating_sequence == Some(touch.sequence) {
                self.emulating_sequence = None;
                if matches!(event.kind, EventKind::TouchCancel(_)) {
                    self.implicit_grabs.remove(&event.device);
                    self.update_pointer_focus(
                        event.device,
                        window,
                        None,
                        (touch.x, touch.y),
                        CrossingMode::TouchEnd,
                    );
                }
            }
        }
        result
    }

    /// Mark the touch sequence driving pointer emulation and build the
    /// emulated pointer event for it.
    fn track_touch_emulation(&mut self, event: &mut Event) -> Option<Event> {
        let sequence = match &event.kind {
            EventKind::TouchBegin(t) | EventKind::TouchUpdate(t) | EventKind::TouchEnd(t) => {
                t.sequence
            }
            _ => return None,
        };
        if matches!(event.kind, EventKind::TouchBegin(_))
            && self.emulating_sequence.is_none()
            && self.touch_grabs.is_empty()
        {
            self.emulating_sequence = Some(sequence);
        }
        if self.emulating_sequence != Some(sequence) {
            return None;
        }
        if let EventKind::TouchBegin(t) | EventKind::TouchUpdate(t) | EventKind::TouchEnd(t) =
            &mut event.kind
        {
            t.emulating_pointer = true;
        }
        event.emulated_pointer_event()
    }

    fn dispatch_one(&mut self, owner: WidgetId, window: NativeWindowId, event: &Event) -> Propagation {
        match &event.kind {
            EventKind::Damage(rect) => {
                self.invalidate_window_rect(window, *rect);
                return Propagation::Stop;
            }
            EventKind::Enter(crossing) => {
                let target = event.point().and_then(|p| self.pick(window, p));
                self.update_pointer_focus(
                    event.device,
                    window,
                    target,
                    (crossing.x, crossing.y),
                    crossing.mode,
                );
                return Propagation::Proceed;
            }
            EventKind::Leave(crossing) => {
                if !self.implicit_grabs.contains_key(&event.device) {
                    self.update_pointer_focus(
                        event.device,
                        window,
                        None,
                        (crossing.x, crossing.y),
                        crossing.mode,
                    );
                }
                return Propagation::Proceed;
            }
            EventKind::FocusChange { focus_in } => {
                return self.dispatch_focus_change(owner, event, *focus_in);
            }
            EventKind::TouchCancel(touch) => {
                self.cancel_sequence(EventSequence::Touch(touch.sequence));
            }
            _ => {}
        }

        if let EventKind::KeyPress(key) = &event.kind {
            let toplevel = self.toplevel(owner).unwrap_or(owner);
            let mnemonic = (event.state & ModifierType::ACCELERATOR) == ModifierType::ALT;
            if mnemonic && self.activate_mnemonic(toplevel, key.keyval) {
                return Propagation::Stop;
            }
            if self.activate_accelerator(toplevel, event) {
                return Propagation::Stop;
            }
        }

        let Some(target) = self.resolve_target(owner, window, event) else {
            return Propagation::Proceed;
        };
        self.track_pointer(window, target, event);

        if event.is_input() && !event.is_cleanup() && !self.is_sensitive(target) {
            tracing::trace!(
                target: targets::EVENTS,
                widget = self.type_name(target).unwrap_or("?"),
                event = event.type_name(),
                "insensitive target, dropped"
            );
            return Propagation::Proceed;
        }
        if self.blocked_by_device_grab(target, event.device) {
            tracing::trace!(target: targets::EVENTS, device = ?event.device, "blocked by a device grab");
            return Propagation::Proceed;
        }
        if !self.selects_event(owner, event) {
            tracing::trace!(target: targets::EVENTS, event = event.type_name(), "not in the event mask");
            return Propagation::Proceed;
        }

        match &event.kind {
            EventKind::ButtonPress(_) => {
                self.implicit_grabs.entry(event.device).or_insert(target);
            }
            EventKind::TouchBegin(touch) => {
                self.touch_grabs.insert(touch.sequence, target);
            }
            _ => {}
        }

        tracing::trace!(
            target: targets::EVENTS,
            widget = self.type_name(target).unwrap_or("?"),
            event = event.type_name(),
            "dispatching"
        );
        let chain = self.path_from_root(target);
        let result = self.propagate(&chain, event);
        if self.nodes.contains_key(target) {
            self.emit(target, |s| &s.event_after, event.clone());
        }

        match &event.kind {
            EventKind::ButtonRelease(_) => {
                self.implicit_grabs.remove(&event.device);
            }
            EventKind::TouchEnd(touch) | EventKind::TouchCancel(touch) => {
                self.touch_grabs.remove(&touch.sequence);
            }
            _ => {}
        }
        if event.is_end() {
            if let Some(sequence) = event.sequence() {
                self.finish_sequence(sequence);
            }
        }
        result
    }

    /// Toggle backdrop on the toplevel and tell its focus widget.
    fn dispatch_focus_change(&mut self, owner: WidgetId, event: &Event, focus_in: bool) -> Propagation {
        let toplevel = self.toplevel(owner).unwrap_or(owner);
        if focus_in {
            self.unset_state_flags(toplevel, StateFlags::BACKDROP);
        } else {
            self.set_state_flags(toplevel, StateFlags::BACKDROP, false);
        }
        let target = self.focus_widget(toplevel).unwrap_or(toplevel);
        self.deliver_direct(target, event)
    }

    /// The widget an event is aimed at.
    ///
    /// Key events go to the focus widget. Other events go to the widget
    /// holding a device grab, then to the implicit grab of a running press,
    /// then to the widget under the event position. Input aimed outside the
    /// current modal grab is redirected to the grab widget.
    fn resolve_target(&self, owner: WidgetId, window: NativeWindowId, event: &Event) -> Option<WidgetId> {
        if let EventKind::KeyPress(_) | EventKind::KeyRelease(_) = &event.kind {
            let toplevel = self.toplevel(owner).unwrap_or(owner);
            return Some(self.focus_widget(toplevel).unwrap_or(toplevel));
        }
        let group = self.window_group_of(owner);
        let mut target = self
            .device_grab_widget(group, event.device)
            .or_else(|| self.implicit_grab_for(event))
            .or_else(|| event.point().and_then(|p| self.pick(window, p)))
            .unwrap_or(owner);
        if !self.nodes.contains_key(target) {
            return None;
        }
        if event.is_input() {
            if let Some(grab) = self.window_groups.get(group).and_then(|g| g.current_grab()) {
                if target != grab && !self.is_ancestor(target, grab) {
                    target = grab;
                }
            }
        }
        Some(target)
    }

    fn implicit_grab_for(&self, event: &Event) -> Option<WidgetId> {
        match &event.kind {
            EventKind::TouchUpdate(t) | EventKind::TouchEnd(t) | EventKind::TouchCancel(t) => {
                self.touch_grabs.get(&t.sequence).copied()
            }
            EventKind::ButtonRelease(_) | EventKind::Motion(_) | EventKind::Scroll(_) => {
                self.implicit_grabs.get(&event.device).copied()
            }
            _ => None,
        }
    }

    /// Keep pointer focus in step with pointer and emulated pointer events.
    fn track_pointer(&mut self, window: NativeWindowId, target: WidgetId, event: &Event) {
        let Some(position) = event.position() else {
            return;
        };
        let touch = event.source == InputSource::Touchscreen;
        match &event.kind {
            EventKind::Motion(_) if !touch => {
                if !self.implicit_grabs.contains_key(&event.device) {
                    self.update_pointer_focus(
                        event.device,
                        window,
                        Some(target),
                        position,
                        CrossingMode::Normal,
                    );
                }
            }
            EventKind::ButtonPress(_) if event.pointer_emulated => {
                self.update_pointer_focus(
                    event.device,
                    window,
                    Some(target),
                    position,
                    CrossingMode::TouchBegin,
                );
            }
            EventKind::ButtonRelease(_) if event.pointer_emulated => {
                self.update_pointer_focus(event.device, window, None, position, CrossingMode::TouchEnd);
            }
            _ => {}
        }
    }

    /// Whether the window owner selected the event.
    ///
    /// Multi-device widgets use the per-device mask of the event's device
    /// when one is set. Events without a mask bit and synthesized events
    /// always pass.
    fn selects_event(&self, owner: WidgetId, event: &Event) -> bool {
        let Some(required) = event.required_mask() else {
            return true;
        };
        if event.send_event {
            return true;
        }
        let Some(node) = self.nodes.get(owner) else {
            return false;
        };
        let mask = if node.has(WidgetFlags::MULTIDEVICE) {
            node.device_events
                .get(&event.device)
                .copied()
                .unwrap_or(node.events)
        } else {
            node.events
        };
        mask.intersects(required)
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    /// Deliver an event along a chain of widgets, root first.
    pub(crate) fn propagate(&mut self, chain: &[WidgetId], event: &Event) -> Propagation {
        let Some(&target) = chain.last() else {
            return Propagation::Proceed;
        };
        for &widget in chain {
            if self.run_phase(widget, PropagationPhase::Capture, event, target).is_stop() {
                tracing::trace!(target: targets::EVENTS, widget = self.type_name(widget).unwrap_or("?"), "stopped in capture");
                return Propagation::Stop;
            }
        }
        for &widget in chain.iter().rev() {
            if !self.nodes.contains_key(widget) {
                continue;
            }
            if widget == target
                && self.run_phase(widget, PropagationPhase::Target, event, target).is_stop()
            {
                return Propagation::Stop;
            }
            if self.deliver_to_handlers(widget, event).is_stop() {
                return Propagation::Stop;
            }
            if self.run_phase(widget, PropagationPhase::Bubble, event, target).is_stop() {
                return Propagation::Stop;
            }
        }
        Propagation::Proceed
    }

    /// Deliver an event to one widget only, ignoring sensitivity and masks.
    ///
    /// Used for synthesized crossing, grab-broken and focus events.
    pub(crate) fn deliver_direct(&mut self, id: WidgetId, event: &Event) -> Propagation {
        if !self.nodes.contains_key(id) {
            return Propagation::Proceed;
        }
        let mut result = Propagation::Proceed;
        for phase in [PropagationPhase::Capture, PropagationPhase::Target] {
            if self.run_phase(id, phase, event, id).is_stop() {
                result = Propagation::Stop;
                break;
            }
        }
        if !result.is_stop() {
            result = self.deliver_to_handlers(id, event);
        }
        if !result.is_stop() {
            result = self.run_phase(id, PropagationPhase::Bubble, event, id);
        }
        if self.nodes.contains_key(id) {
            self.emit(id, |s| &s.event_after, event.clone());
        }
        result
    }

    /// Run every controller of `widget` registered for `phase`.
    ///
    /// All of them run; delivery stops afterwards if any asked for it.
    fn run_phase(
        &mut self,
        widget: WidgetId,
        phase: PropagationPhase,
        event: &Event,
        target: WidgetId,
    ) -> Propagation {
        let controllers: Vec<_> = self
            .controllers(widget)
            .iter()
            .copied()
            .filter(|c| self.controller_phase(*c) == Some(phase))
            .collect();
        let mut result = Propagation::Proceed;
        for controller in controllers {
            if self.run_controller(controller, event, target).is_stop() {
                result = Propagation::Stop;
            }
        }
        result
    }

    /// The `event` signal, then the class handler.
    fn deliver_to_handlers(&mut self, widget: WidgetId, event: &Event) -> Propagation {
        let Some(node) = self.nodes.get(widget) else {
            return Propagation::Proceed;
        };
        let slots = node.signals.event.snapshot();
        if !slots.is_empty() {
            let args = (widget, event.clone());
            if signal::emit_until(self, &slots, &args, |r| r.is_stop()).is_some() {
                return Propagation::Stop;
            }
        }
        self.with_class(widget, |class, tree| class.event(tree, widget, event))
            .unwrap_or_default()
    }

    // =========================================================================
    // Hit testing
    // =========================================================================

    /// The deepest mapped widget drawing into `window` that contains
    /// `point`, topmost child first. Falls back to the window owner.
    pub fn pick(&self, window: NativeWindowId, point: Point) -> Option<WidgetId> {
        let mut current = self.window_owner(window)?;
        'descend: loop {
            for &child in self.children(current).iter().rev() {
                let Some(node) = self.nodes.get(child) else {
                    continue;
                };
                if node.has(WidgetFlags::MAPPED)
                    && node.window == Some(window)
                    && !node.has_window()
                    && node.allocation.contains(point)
                {
                    current = child;
                    continue 'descend;
                }
            }
            return Some(current);
        }
    }

    // =========================================================================
    // Event masks and shapes
    // =========================================================================

    /// Events the widget's window selects.
    pub fn events(&self, id: WidgetId) -> EventMask {
        self.nodes.get(id).map_or(EventMask::empty(), |n| n.events)
    }

    /// Replace the widget's event mask.
    ///
    /// Not allowed once a widget without its own window is realized.
    pub fn set_events(&mut self, id: WidgetId, events: EventMask) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if node.has(WidgetFlags::REALIZED) && !node.has_window() {
            precondition!(
                targets::EVENTS,
                "set_events",
                Err::<(), _>(WidgetError::EventsAfterRealize(node.type_name))
            );
            return;
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.events = events;
        }
        self.push_event_mask(id);
        self.notify(id, "events");
    }

    /// Add to the widget's event mask.
    pub fn add_events(&mut self, id: WidgetId, events: EventMask) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.events.contains(events) {
            return;
        }
        node.events |= events;
        self.push_event_mask(id);
        self.notify(id, "events");
    }

    fn push_event_mask(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if let (true, true, Some(window)) = (node.has(WidgetFlags::REALIZED), node.has_window(), node.window) {
            let mask = node.events | EventMask::EXPOSURE | EventMask::STRUCTURE;
            self.display.set_event_mask(window, mask);
        }
    }

    /// The widget's own native window, once realized.
    fn own_window(&self, id: WidgetId) -> Option<NativeWindowId> {
        let node = self.nodes.get(id)?;
        if node.has(WidgetFlags::REALIZED) && node.has_window() {
            node.window
        } else {
            None
        }
    }

    /// Per-device event mask, if one was set.
    pub fn device_events(&self, id: WidgetId, device: DeviceId) -> Option<EventMask> {
        self.nodes.get(id)?.device_events.get(&device).copied()
    }

    /// Set the event mask used for one device.
    pub fn set_device_events(&mut self, id: WidgetId, device: DeviceId, events: EventMask) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.device_events.insert(device, events);
        if let Some(window) = self.own_window(id) {
            self.display.set_device_events(window, device, events);
        }
    }

    /// Enable or disable a device on the widget's window.
    pub fn set_device_enabled(&mut self, id: WidgetId, device: DeviceId, enabled: bool) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.enabled_devices.retain(|d| *d != device);
        if enabled {
            node.enabled_devices.push(device);
        }
        if let Some(window) = self.own_window(id) {
            self.display.set_device_enabled(window, device, enabled);
        }
    }

    /// Whether the widget uses per-device event masks.
    pub fn is_multidevice(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::MULTIDEVICE)
    }

    /// Use per-device event masks for the widget.
    pub fn set_multidevice(&mut self, id: WidgetId, multidevice: bool) {
        self.set_flags(id, WidgetFlags::MULTIDEVICE, multidevice);
    }

    /// Restrict the visible shape of the widget's window. `None` clears it.
    pub fn shape_combine(&mut self, id: WidgetId, shape: Option<Rect>) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.shape = shape;
        node.set(WidgetFlags::HAS_SHAPE_MASK, shape.is_some());
        if let Some(window) = self.own_window(id) {
            self.display.shape_combine(window, shape);
        }
    }

    /// Restrict the input shape of the widget's window. `None` clears it.
    pub fn input_shape_combine(&mut self, id: WidgetId, shape: Option<Rect>) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.input_shape = shape;
        if let Some(window) = self.own_window(id) {
            self.display.input_shape_combine(window, shape);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use trellis_core::Settings;

    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::widget::controller::{CallbackController, GestureNotify, SequenceState};
    use crate::widget::gesture::GestureDrag;
    use crate::widget::widgets::{BoxContainer, Window};
    use crate::widget::{Orientation, Widget};

    struct Leaf;
    impl Widget for Leaf {}

    type Log = Rc<RefCell<Vec<(&'static str, PropagationPhase)>>>;

    fn logger(log: &Log, name: &'static str, phase: PropagationPhase, stop: bool) -> CallbackController {
        let log = log.clone();
        CallbackController::new(move |_, event| {
            if matches!(event.kind, EventKind::Enter(_) | EventKind::Leave(_)) {
                return Propagation::Proceed;
            }
            log.borrow_mut().push((name, phase));
            if stop { Propagation::Stop } else { Propagation::Proceed }
        })
    }

    fn window_with_leaf() -> (WidgetTree, NativeWindowId, WidgetId, WidgetId, WidgetId) {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        let window = tree.create(Window::new());
        let column = tree.create(BoxContainer::new(Orientation::Vertical));
        let leaf = tree.create(Leaf);
        tree.set_size_request(leaf, 100, 100);
        tree.container_add(window, column);
        tree.container_add(column, leaf);
        tree.show_all(window);
        let native = tree.window(window).unwrap();
        (tree, native, window, column, leaf)
    }

    #[test]
    fn phases_run_capture_then_target_then_bubble() {
        let (mut tree, native, window, column, leaf) = window_with_leaf();
        let log: Log = Rc::default();
        tree.add_controller(leaf, logger(&log, "leaf", PropagationPhase::Bubble, false), PropagationPhase::Bubble);
        tree.add_controller(leaf, logger(&log, "leaf", PropagationPhase::Target, false), PropagationPhase::Target);
        tree.add_controller(column, logger(&log, "column", PropagationPhase::Capture, false), PropagationPhase::Capture);
        tree.add_controller(window, logger(&log, "window", PropagationPhase::Bubble, false), PropagationPhase::Bubble);
        tree.add_controller(window, logger(&log, "window", PropagationPhase::Capture, false), PropagationPhase::Capture);

        tree.dispatch_event(&Event::motion(5.0, 5.0).with_window(native));
        assert_eq!(
            *log.borrow(),
            vec![
                ("window", PropagationPhase::Capture),
                ("column", PropagationPhase::Capture),
                ("leaf", PropagationPhase::Target),
                ("leaf", PropagationPhase::Bubble),
                ("window", PropagationPhase::Bubble),
            ]
        );
    }

    #[test]
    fn stopping_in_capture_hides_the_event_from_the_target() {
        let (mut tree, native, _, column, leaf) = window_with_leaf();
        let log: Log = Rc::default();
        tree.add_controller(column, logger(&log, "column", PropagationPhase::Capture, true), PropagationPhase::Capture);
        tree.add_controller(leaf, logger(&log, "leaf", PropagationPhase::Bubble, false), PropagationPhase::Bubble);

        let result = tree.dispatch_event(&Event::motion(5.0, 5.0).with_window(native));
        assert_eq!(result, Propagation::Stop);
        assert_eq!(*log.borrow(), vec![("column", PropagationPhase::Capture)]);
    }

    #[test]
    fn event_after_runs_even_when_handled() {
        let (mut tree, native, _, _, leaf) = window_with_leaf();
        let seen = Rc::new(RefCell::new(0));
        let count = seen.clone();
        tree.signals_mut(leaf).unwrap().event.connect(|_, _| Propagation::Stop);
        tree.signals_mut(leaf)
            .unwrap()
            .event_after
            .connect(move |_, _| *count.borrow_mut() += 1);
        let result = tree.dispatch_event(&Event::button_press(5.0, 5.0, 1).with_window(native));
        assert_eq!(result, Propagation::Stop);
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn press_grabs_the_pointer_until_release() {
        let (mut tree, native, window, _, leaf) = window_with_leaf();
        let log: Log = Rc::default();
        tree.add_controller(leaf, logger(&log, "leaf", PropagationPhase::Target, false), PropagationPhase::Target);

        tree.dispatch_event(&Event::button_press(5.0, 5.0, 1).with_window(native));
        // outside the leaf, but the implicit grab keeps it as target
        tree.dispatch_event(&Event::motion(500.0, 500.0).with_window(native));
        tree.dispatch_event(&Event::button_release(500.0, 500.0, 1).with_window(native));
        assert_eq!(log.borrow().len(), 3);

        tree.dispatch_event(&Event::motion(500.0, 500.0).with_window(native));
        assert_eq!(log.borrow().len(), 3);
        assert_eq!(tree.pointer_widget(DeviceId::POINTER), Some(window));
    }

    #[test]
    fn unviewable_windows_only_get_cleanup_events() {
        let (mut tree, native, window, _, leaf) = window_with_leaf();
        let log: Log = Rc::default();
        tree.add_controller(leaf, logger(&log, "leaf", PropagationPhase::Target, false), PropagationPhase::Target);
        tree.dispatch_event(&Event::button_press(5.0, 5.0, 1).with_window(native));
        tree.hide(window);

        tree.dispatch_event(&Event::motion(5.0, 5.0).with_window(native));
        tree.dispatch_event(&Event::button_release(5.0, 5.0, 1).with_window(native));
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn modal_grabs_redirect_input() {
        let (mut tree, native, _, column, leaf) = window_with_leaf();
        let other = tree.create(Leaf);
        tree.container_add(column, other);
        tree.show(other);
        tree.grab_add(other);
        let log: Log = Rc::default();
        tree.add_controller(other, logger(&log, "other", PropagationPhase::Target, false), PropagationPhase::Target);
        tree.add_controller(leaf, logger(&log, "leaf", PropagationPhase::Target, false), PropagationPhase::Target);

        tree.dispatch_event(&Event::button_press(5.0, 5.0, 1).with_window(native));
        assert_eq!(*log.borrow(), vec![("other", PropagationPhase::Target)]);
    }

    #[test]
    fn events_outside_the_mask_are_dropped() {
        let (mut tree, native, window, _, leaf) = window_with_leaf();
        let log: Log = Rc::default();
        tree.add_controller(leaf, logger(&log, "leaf", PropagationPhase::Target, false), PropagationPhase::Target);
        tree.set_events(window, EventMask::BUTTON_PRESS);

        tree.dispatch_event(&Event::motion(5.0, 5.0).with_window(native));
        assert!(log.borrow().is_empty());
        tree.dispatch_event(&Event::button_press(5.0, 5.0, 1).with_window(native));
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn realized_no_window_widgets_keep_their_mask() {
        let (mut tree, _, _, column, _) = window_with_leaf();
        tree.set_events(column, EventMask::SCROLL);
        assert_eq!(tree.events(column), EventMask::empty());
        tree.add_events(column, EventMask::SCROLL);
        assert_eq!(tree.events(column), EventMask::SCROLL);
    }

    #[test]
    fn pick_finds_the_deepest_widget() {
        let (tree, native, window, _, leaf) = window_with_leaf();
        let origin = tree.allocation(leaf).origin();
        assert_eq!(tree.pick(native, origin), Some(leaf));
        let outside = Point::new(tree.allocation(window).right() + 10, 0);
        assert_eq!(tree.pick(native, outside), Some(window));
    }

    #[test]
    fn denied_capture_gesture_sees_nothing_more_of_the_sequence() {
        let (mut tree, native, _, column, leaf) = window_with_leaf();
        let drag = tree
            .add_controller(column, GestureDrag::new(), PropagationPhase::Capture)
            .unwrap();
        let notes: Rc<RefCell<Vec<GestureNotify>>> = Rc::default();
        let sink = notes.clone();
        tree.controller_signals_mut(drag)
            .unwrap()
            .notify
            .connect(move |_, (_, notify)| sink.borrow_mut().push(*notify));
        let log: Log = Rc::default();
        tree.add_controller(leaf, logger(&log, "leaf", PropagationPhase::Target, false), PropagationPhase::Target);

        // the undecided capture gesture swallows the press
        let result = tree.dispatch_event(&Event::button_press(5.0, 5.0, 1).with_window(native));
        assert_eq!(result, Propagation::Stop);
        assert!(log.borrow().is_empty());

        assert!(tree.set_sequence_state(drag, EventSequence::Pointer, SequenceState::Denied));
        assert_eq!(*log.borrow(), vec![("leaf", PropagationPhase::Target)]);
        notes.borrow_mut().clear();

        tree.dispatch_event(&Event::motion(60.0, 60.0).with_window(native));
        tree.dispatch_event(&Event::button_release(60.0, 60.0, 1).with_window(native));
        assert_eq!(log.borrow().len(), 3);
        assert!(
            !notes
                .borrow()
                .iter()
                .any(|n| matches!(n, GestureNotify::DragUpdate { .. } | GestureNotify::DragEnd { .. })),
            "denied gesture kept reporting: {:?}",
            notes.borrow()
        );
        assert!(!tree.handles_sequence(drag, EventSequence::Pointer));
    }

    #[test]
    fn touch_drives_an_emulated_pointer_for_pointer_only_widgets() {
        let (mut tree, native, _, _, leaf) = window_with_leaf();
        let seen: Rc<RefCell<Vec<(&'static str, bool, Option<EventSequence>)>>> = Rc::default();
        let sink = seen.clone();
        tree.signals_mut(leaf).unwrap().event.connect(move |_, (_, event)| {
            if let EventKind::ButtonPress(_) | EventKind::ButtonRelease(_) | EventKind::Motion(_) = &event.kind {
                sink.borrow_mut()
                    .push((event.type_name(), event.pointer_emulated, event.sequence()));
                return Propagation::Stop;
            }
            Propagation::Proceed
        });

        tree.dispatch_event(&Event::touch_begin(7, 5.0, 5.0).with_window(native));
        tree.dispatch_event(&Event::touch_update(7, 8.0, 8.0).with_window(native));
        tree.dispatch_event(&Event::touch_end(7, 8.0, 8.0).with_window(native));
        assert_eq!(
            *seen.borrow(),
            vec![
                ("button-press", true, None),
                ("motion", true, None),
                ("button-release", true, None),
            ]
        );
    }
}
