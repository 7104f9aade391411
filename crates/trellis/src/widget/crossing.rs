//! Pointer focus tracking and enter/leave synthesis.
//!
//! For every pointing device the tree remembers the widget under it. When
//! that widget changes, because the pointer moved, a grab changed or a
//! widget lost sensitivity, enter and leave events are synthesized along
//! the path between the old and the new widget, each tagged with its
//! position on the path.

use trellis_core::Point;
use trellis_core::logging::targets;

use super::events::{CrossingEvent, CrossingMode, DeviceId, Event, EventKind, NotifyType};
use super::{WidgetId, WidgetTree};
use crate::display::NativeWindowId;

/// The widget under a pointing device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PointerFocus {
    /// Nearest sensitive widget at or above `target`. Crossings are
    /// reported relative to this one.
    pub(crate) widget: WidgetId,
    /// Widget found by hit testing.
    pub(crate) target: WidgetId,
    pub(crate) window: NativeWindowId,
    pub(crate) x: f64,
    pub(crate) y: f64,
}

impl WidgetTree {
    /// The widget currently under a pointing device, as far as crossing
    /// events are concerned.
    pub fn pointer_widget(&self, device: DeviceId) -> Option<WidgetId> {
        self.pointer_focus.get(&device).map(|f| f.widget)
    }

    /// Ask the backend where a device is and resolve the widget there.
    pub fn widget_under_device(&self, device: DeviceId) -> Option<(WidgetId, Point)> {
        let (window, point) = self.display.device_position(device)?;
        Some((self.pick(window, point)?, point))
    }

    /// The nearest widget at or above `id` that is sensitive.
    fn nearest_sensitive(&self, id: WidgetId) -> Option<WidgetId> {
        self.path_from_root(id)
            .into_iter()
            .rev()
            .find(|w| self.is_sensitive(*w))
    }

    /// Record that `device` is now over `target` and synthesize crossings
    /// if the effective widget changed. `None` means the device left every
    /// widget of the window.
    pub(crate) fn update_pointer_focus(
        &mut self,
        device: DeviceId,
        window: NativeWindowId,
        target: Option<WidgetId>,
        position: (f64, f64),
        mode: CrossingMode,
    ) {
        let (x, y) = position;
        let previous = self.pointer_focus.get(&device).copied();
        let effective = target.and_then(|t| self.nearest_sensitive(t));
        match (target, effective) {
            (Some(target), Some(widget)) => {
                self.pointer_focus.insert(
                    device,
                    PointerFocus {
                        widget,
                        target,
                        window,
                        x,
                        y,
                    },
                );
            }
            _ => {
                self.pointer_focus.remove(&device);
            }
        }
        let from = previous.map(|f| f.widget);
        if from != effective {
            self.synthesize_crossing(from, effective, device, window, (x, y), mode);
        }
    }

    /// Re-evaluate the devices over the subtree rooted at `root` after its
    /// sensitivity changed.
    pub(crate) fn sync_pointer_focus(&mut self, root: WidgetId) {
        let affected: Vec<(DeviceId, PointerFocus)> = self
            .pointer_focus
            .iter()
            .filter(|(_, f)| f.target == root || self.is_ancestor(f.target, root))
            .map(|(d, f)| (*d, *f))
            .collect();
        for (device, focus) in affected {
            let effective = self.nearest_sensitive(focus.target);
            if effective == Some(focus.widget) {
                continue;
            }
            match effective {
                Some(widget) => {
                    if let Some(entry) = self.pointer_focus.get_mut(&device) {
                        entry.widget = widget;
                    }
                }
                None => {
                    self.pointer_focus.remove(&device);
                }
            }
            self.synthesize_crossing(
                Some(focus.widget),
                effective,
                device,
                focus.window,
                (focus.x, focus.y),
                CrossingMode::StateChanged,
            );
        }
    }

    /// Synthesize crossings for devices whose widget left or re-entered
    /// reach because the top grab changed from `previous` to `current`.
    pub(crate) fn cross_pointers_for_grab(
        &mut self,
        previous: Option<WidgetId>,
        current: Option<WidgetId>,
        mode: CrossingMode,
    ) {
        let reachable = |tree: &Self, widget: WidgetId, grab: Option<WidgetId>| match grab {
            Some(grab) => (widget == grab || tree.is_ancestor(widget, grab)).then_some(widget),
            None => Some(widget),
        };
        let devices: Vec<(DeviceId, PointerFocus)> =
            self.pointer_focus.iter().map(|(d, f)| (*d, *f)).collect();
        for (device, focus) in devices {
            let before = reachable(self, focus.widget, previous);
            let after = reachable(self, focus.widget, current);
            if before != after {
                self.synthesize_crossing(
                    before,
                    after,
                    device,
                    focus.window,
                    (focus.x, focus.y),
                    mode,
                );
            }
        }
    }

    /// Send leave events from `from` and enter events to `to`.
    ///
    /// `None` stands for a point outside every widget. Details follow the
    /// X11 classification: the ends get `Ancestor`, `Inferior` or
    /// `Nonlinear`, widgets strictly between them get `Virtual` or
    /// `NonlinearVirtual`. Leaves are sent innermost first, enters
    /// outermost first.
    pub(crate) fn synthesize_crossing(
        &mut self,
        from: Option<WidgetId>,
        to: Option<WidgetId>,
        device: DeviceId,
        window: NativeWindowId,
        position: (f64, f64),
        mode: CrossingMode,
    ) {
        if from == to {
            return;
        }
        tracing::trace!(target: targets::EVENTS, ?from, ?to, ?mode, "synthesizing crossing");
        let mut crossings: Vec<(WidgetId, bool, NotifyType)> = Vec::new();
        match (from, to) {
            (Some(f), Some(t)) if self.is_ancestor(f, t) => {
                crossings.push((f, false, NotifyType::Ancestor));
                for w in self.strictly_between(f, t) {
                    crossings.push((w, false, NotifyType::Virtual));
                }
                crossings.push((t, true, NotifyType::Inferior));
            }
            (Some(f), Some(t)) if self.is_ancestor(t, f) => {
                crossings.push((f, false, NotifyType::Inferior));
                for w in self.strictly_between(t, f).into_iter().rev() {
                    crossings.push((w, true, NotifyType::Virtual));
                }
                crossings.push((t, true, NotifyType::Ancestor));
            }
            _ => {
                let common = match (from, to) {
                    (Some(f), Some(t)) => self.common_ancestor(f, t),
                    _ => None,
                };
                if let Some(f) = from {
                    crossings.push((f, false, NotifyType::Nonlinear));
                    for w in self.ancestors_below(f, common) {
                        crossings.push((w, false, NotifyType::NonlinearVirtual));
                    }
                }
                if let Some(t) = to {
                    for w in self.ancestors_below(t, common).into_iter().rev() {
                        crossings.push((w, true, NotifyType::NonlinearVirtual));
                    }
                    crossings.push((t, true, NotifyType::Nonlinear));
                }
            }
        }

        let (x, y) = position;
        for (widget, enter, detail) in crossings {
            if !self.nodes.contains_key(widget) {
                continue;
            }
            let crossing = CrossingEvent {
                x,
                y,
                mode,
                detail,
            };
            let kind = if enter {
                EventKind::Enter(crossing)
            } else {
                EventKind::Leave(crossing)
            };
            let mut event = Event::new(kind).with_device(device).with_window(window);
            event.send_event = true;
            self.deliver_direct(widget, &event);
        }
    }

    /// Ancestors of `descendant` strictly below `ancestor`, innermost first.
    fn strictly_between(&self, descendant: WidgetId, ancestor: WidgetId) -> Vec<WidgetId> {
        let mut out = Vec::new();
        let mut current = self.parent(descendant);
        while let Some(widget) = current {
            if widget == ancestor {
                break;
            }
            out.push(widget);
            current = self.parent(widget);
        }
        out
    }

    /// Ancestors of `id` up to but excluding `stop`, innermost first. With
    /// no `stop` this runs to the root.
    fn ancestors_below(&self, id: WidgetId, stop: Option<WidgetId>) -> Vec<WidgetId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(widget) = current {
            if Some(widget) == stop {
                break;
            }
            out.push(widget);
            current = self.parent(widget);
        }
        out
    }

    /// Deepest widget that is an ancestor of, or equal to, both.
    pub(crate) fn common_ancestor(&self, a: WidgetId, b: WidgetId) -> Option<WidgetId> {
        let path_a = self.path_from_root(a);
        let path_b = self.path_from_root(b);
        path_a
            .iter()
            .zip(path_b.iter())
            .take_while(|(x, y)| x == y)
            .last()
            .map(|(x, _)| *x)
    }
}
