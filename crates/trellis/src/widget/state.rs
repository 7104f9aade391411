//! State flag, sensitivity, direction and scale propagation.
//!
//! A widget's effective [`StateFlags`] are computed, never stored directly
//! by callers:
//!
//! ```text
//! effective = own | (parent.effective & PROPAGATING) | direction bits
//! ```
//!
//! where `own` includes `INSENSITIVE` while the widget's own sensitive flag
//! is off. Whenever an input to that formula changes the affected subtree
//! is recomputed in one pass, parents first, and `state_flags_changed` is
//! emitted only once every widget holds its new value.
//!
//! Direction is cascaded separately: it follows explicit directions down
//! the tree and stops at the first descendant with its own.

use trellis_core::LayoutDirection;
use trellis_core::logging::targets;

use super::flags::{StateFlags, WidgetFlags};
use super::geometry::TextDirection;
use super::tree::{direction_state, lookup};
use super::{WidgetId, WidgetTree};

impl WidgetTree {
    // =========================================================================
    // State flags
    // =========================================================================

    /// Add state flags to the widget, or replace its own flags when `clear`
    /// is set.
    ///
    /// `INSENSITIVE` and `BACKDROP` also reach descendants. Direction bits
    /// are derived from the text direction and cannot be set here.
    pub fn set_state_flags(&mut self, id: WidgetId, flags: StateFlags, clear: bool) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if flags.intersects(StateFlags::DIRECTION) {
            tracing::warn!(
                target: targets::STATE,
                widget = node.type_name,
                "direction state is derived from the text direction"
            );
        }
        let flags = flags - StateFlags::DIRECTION;
        let own = if clear { flags } else { node.own_state | flags };
        if own == node.own_state {
            return;
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.own_state = own;
        }
        self.refresh_state(id);
    }

    /// Remove state flags from the widget's own flags.
    pub fn unset_state_flags(&mut self, id: WidgetId, flags: StateFlags) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        let own = node.own_state - flags;
        if own == node.own_state {
            return;
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.own_state = own;
        }
        self.refresh_state(id);
    }

    /// The widget's own state flags, without inherited or direction bits.
    pub fn own_state_flags(&self, id: WidgetId) -> StateFlags {
        self.nodes.get(id).map_or(StateFlags::empty(), |n| n.own_state)
    }

    /// Recompute inherited state after the widget moved in the tree.
    pub(crate) fn propagate_parent_state(&mut self, id: WidgetId) {
        self.refresh_state(id);
    }

    /// Recompute effective state over the subtree rooted at `id`.
    ///
    /// All new values are stored before any handler runs.
    fn refresh_state(&mut self, id: WidgetId) {
        let was_sensitive = self.is_sensitive(id);

        let mut changed = Vec::new();
        for widget in self.descendants(id) {
            let Some(node) = self.nodes.get(widget) else {
                continue;
            };
            let inherited = node
                .parent
                .and_then(|p| self.nodes.get(p))
                .map_or(StateFlags::empty(), |p| p.state & StateFlags::PROPAGATING);
            let mut state = node.own_state | inherited;
            if !node.has(WidgetFlags::SENSITIVE) {
                state |= StateFlags::INSENSITIVE;
            }
            state |= direction_state(self.resolved_direction(widget));

            let Some(node) = self.nodes.get_mut(widget) else {
                continue;
            };
            if node.state == state {
                continue;
            }
            let previous = node.state;
            node.state = state;
            if let Some(style) = node.style.as_mut() {
                style.set_state(state);
            }
            changed.push((widget, previous));
        }
        if changed.is_empty() {
            return;
        }
        tracing::trace!(target: targets::STATE, widgets = changed.len(), "state propagated");

        let now_sensitive = self.is_sensitive(id);
        for (widget, previous) in changed {
            if !self.nodes.contains_key(widget) {
                continue;
            }
            let state = self.state_flags(widget);
            let lost_sensitivity = !previous.contains(StateFlags::INSENSITIVE)
                && state.contains(StateFlags::INSENSITIVE);
            if lost_sensitivity {
                if self.has_flags(widget, WidgetFlags::HAS_FOCUS) {
                    self.release_focus(widget);
                }
                if self.has_flags(widget, WidgetFlags::HAS_GRAB) {
                    self.grab_remove(widget);
                }
                self.reset_controllers(widget);
            }
            self.emit(widget, |s| &s.state_flags_changed, previous);
            self.update_accessible_state(widget);
            self.queue_draw(widget);
        }

        if was_sensitive != now_sensitive {
            if !now_sensitive {
                self.break_grabs_within(id);
            }
            self.sync_pointer_focus(id);
        }
    }

    // =========================================================================
    // Sensitivity
    // =========================================================================

    /// Enable or disable input on the widget and its descendants.
    ///
    /// Devices over the subtree get crossing events with
    /// [`CrossingMode::StateChanged`](super::CrossingMode::StateChanged) so
    /// that prelight and press state stays coherent.
    pub fn set_sensitive(&mut self, id: WidgetId, sensitive: bool) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if node.has(WidgetFlags::SENSITIVE) == sensitive {
            return;
        }
        tracing::debug!(target: targets::STATE, widget = node.type_name, sensitive, "sensitivity");
        if let Some(node) = self.nodes.get_mut(id) {
            node.set(WidgetFlags::SENSITIVE, sensitive);
            if !sensitive {
                node.own_state -= StateFlags::PRELIGHT | StateFlags::ACTIVE;
            }
        }
        self.refresh_state(id);
        self.notify(id, "sensitive");
    }

    /// The widget's own sensitive flag.
    pub fn sensitive(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::SENSITIVE)
    }

    /// Whether the widget and all its ancestors are sensitive.
    pub fn is_sensitive(&self, id: WidgetId) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|n| !n.state.contains(StateFlags::INSENSITIVE))
    }

    // =========================================================================
    // Direction
    // =========================================================================

    /// Set the widget's reading direction. [`TextDirection::None`] inherits.
    pub fn set_direction(&mut self, id: WidgetId, direction: TextDirection) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if node.direction == direction {
            return;
        }
        let previous = self.resolved_direction(id);
        if let Some(node) = self.nodes.get_mut(id) {
            node.direction = direction;
        }
        self.cascade_direction(id, previous);
    }

    /// The direction used by widgets without one of their own.
    pub fn default_direction(&self) -> TextDirection {
        self.settings.default_direction.into()
    }

    /// Change the default direction and update every widget inheriting it.
    pub fn set_default_direction(&mut self, direction: LayoutDirection) {
        if self.settings.default_direction == direction {
            return;
        }
        let previous: TextDirection = self.settings.default_direction.into();
        let roots: Vec<WidgetId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.parent.is_none() && n.direction == TextDirection::None)
            .map(|(id, _)| id)
            .collect();
        self.settings.default_direction = direction;
        tracing::debug!(target: targets::STATE, ?direction, roots = roots.len(), "default direction");
        for root in roots {
            self.cascade_direction(root, previous);
        }
    }

    /// Emit `direction_changed` on `id` and the descendants inheriting its
    /// direction, given the direction they resolved to before.
    fn cascade_direction(&mut self, id: WidgetId, previous: TextDirection) {
        let mut pending = vec![id];
        while let Some(widget) = pending.pop() {
            let resolved = self.resolved_direction(widget);
            if resolved == previous {
                continue;
            }
            let Some(node) = self.nodes.get(widget) else {
                continue;
            };
            let inheriting: Vec<WidgetId> = node
                .children
                .iter()
                .copied()
                .filter(|c| {
                    self.nodes
                        .get(*c)
                        .is_some_and(|n| n.direction == TextDirection::None)
                })
                .collect();
            let Some(node) = self.nodes.get_mut(widget) else {
                continue;
            };
            let old_state = node.state;
            node.state = (node.state - StateFlags::DIRECTION) | direction_state(resolved);
            let new_state = node.state;
            if let Some(style) = node.style.as_mut() {
                style.set_state(new_state);
            }

            if self
                .with_class(widget, |class, tree| class.direction_changed(tree, widget, previous))
                .is_none()
            {
                self.queue_resize(widget);
            }
            self.emit(widget, |s| &s.direction_changed, previous);
            self.emit(widget, |s| &s.state_flags_changed, old_state);
            self.invalidate_style_path(widget);
            pending.extend(inheriting.into_iter().rev());
        }
    }

    // =========================================================================
    // Scale
    // =========================================================================

    /// Scale factor of the monitor showing the widget.
    pub fn scale_factor(&self, id: WidgetId) -> i32 {
        self.nodes.get(id).map_or(1, |n| n.scale)
    }

    /// Re-read the scale factor from the widget's window, cascading to
    /// descendants when it changed.
    pub(crate) fn update_scale(&mut self, id: WidgetId) {
        let mut pending = vec![id];
        while let Some(widget) = pending.pop() {
            let Some(node) = self.nodes.get(widget) else {
                continue;
            };
            let scale = match node.window {
                Some(window) if node.has_window() => self.display.scale_factor(window),
                _ => node
                    .parent
                    .and_then(|p| self.nodes.get(p))
                    .map_or(node.scale, |p| p.scale),
            };
            if scale == node.scale {
                continue;
            }
            let children = node.children.clone();
            if let Some(node) = self.nodes.get_mut(widget) {
                node.scale = scale;
                if let Some(style) = node.style.as_mut() {
                    style.set_scale(scale);
                }
            }
            tracing::debug!(target: targets::STATE, ?widget, scale, "scale changed");
            self.notify(widget, "scale-factor");
            self.queue_draw(widget);
            pending.extend(children);
        }
    }
}
