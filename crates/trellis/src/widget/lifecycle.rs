//! Visibility, realization, mapping, parenting and destruction.
//!
//! The three lifecycle states are stacked: a mapped widget is realized and
//! visible, and a realized widget has a realized parent. Every transition
//! here keeps that ordering, running parents before children on the way up
//! and children before parents on the way down.

use trellis_core::logging::targets;
use trellis_core::Rect;

use super::flags::{EventMask, WidgetFlags};
use super::frame_clock::FrameClock;
use super::tree::{lookup, precondition};
use super::{WidgetId, WidgetTree};
use crate::display::WindowAttributes;
use crate::error::{DisplayError, WidgetError};

impl WidgetTree {
    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether the widget's own visible flag is set.
    pub fn is_visible(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::VISIBLE)
    }

    /// Whether the widget and all its ancestors are visible.
    pub fn is_visible_effective(&self, id: WidgetId) -> bool {
        let mut current = Some(id);
        while let Some(widget) = current {
            let Some(node) = self.nodes.get(widget) else {
                return false;
            };
            if !node.has(WidgetFlags::VISIBLE) {
                return false;
            }
            current = node.parent;
        }
        true
    }

    /// Whether the widget is realized.
    pub fn is_realized(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::REALIZED)
    }

    /// Whether the widget is mapped.
    pub fn is_mapped(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::MAPPED)
    }

    /// Whether the parent lets the widget be mapped.
    pub fn child_visible(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::CHILD_VISIBLE)
    }

    /// Whether the widget is visible and mapped.
    pub fn is_drawable(&self, id: WidgetId) -> bool {
        self.nodes.get(id).is_some_and(|n| n.is_drawable())
    }

    /// Whether destroy has started on the widget.
    pub fn in_destruction(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::IN_DESTRUCTION)
    }

    // =========================================================================
    // Show / hide
    // =========================================================================

    /// Make the widget visible.
    ///
    /// Queues a resize on the parent and, once the parent is mapped, maps the
    /// widget. Toplevels are laid out, realized and mapped right away.
    pub fn show(&mut self, id: WidgetId) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if node.has(WidgetFlags::VISIBLE) {
            return;
        }
        let parent = node.parent;
        let needs_expand = node.flags.intersects(
            WidgetFlags::NEED_COMPUTE_EXPAND
                | WidgetFlags::COMPUTED_HEXPAND
                | WidgetFlags::COMPUTED_VEXPAND,
        );
        tracing::trace!(target: targets::LIFECYCLE, widget = node.type_name, "show");

        self.ref_widget(id);
        self.push_verify_invariants(id);
        if let Some(parent) = parent {
            self.queue_resize(parent);
            if needs_expand {
                self.queue_compute_expand(parent);
            }
        }

        if self.with_class(id, |class, tree| class.show(tree, id)).is_none() {
            self.default_show(id);
        }
        self.emit(id, |s| &s.show, ());
        self.notify(id, "visible");

        if self.is_toplevel(id) && self.is_visible(id) {
            self.present_toplevel(id);
        }
        self.update_accessible_state(id);
        self.pop_verify_invariants(id);
        self.unref_widget(id);
    }

    /// Base class show: set the visible flag and map under a mapped parent.
    pub fn default_show(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.set(WidgetFlags::VISIBLE, true);
        let child_visible = node.has(WidgetFlags::CHILD_VISIBLE);
        let mapped = node.has(WidgetFlags::MAPPED);
        let parent = node.parent;
        let parent_mapped = parent.is_some_and(|p| self.is_mapped(p));
        if parent_mapped && child_visible && !mapped {
            self.map(id);
        }
    }

    /// Lay out, realize and map a toplevel that just became visible.
    fn present_toplevel(&mut self, id: WidgetId) {
        self.layout_resize_root(id);
        self.realize(id);
        if self.is_realized(id) && !self.is_mapped(id) {
            self.map(id);
        }
    }

    /// Make the widget invisible, unmapping it.
    pub fn hide(&mut self, id: WidgetId) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if !node.has(WidgetFlags::VISIBLE) {
            return;
        }
        let parent = node.parent;
        let expanded =
            node.flags.intersects(WidgetFlags::COMPUTED_HEXPAND | WidgetFlags::COMPUTED_VEXPAND);
        tracing::trace!(target: targets::LIFECYCLE, widget = node.type_name, "hide");

        self.ref_widget(id);
        self.push_verify_invariants(id);
        if let Some(toplevel) = self.toplevel(id) {
            if toplevel != id {
                self.unset_focus_and_default(toplevel, id);
            }
        }
        if expanded {
            self.queue_compute_expand(id);
        }

        if self.with_class(id, |class, tree| class.hide(tree, id)).is_none() {
            self.default_hide(id);
        }
        self.emit(id, |s| &s.hide, ());
        if let Some(parent) = parent {
            self.queue_resize(parent);
        }
        self.notify(id, "visible");
        self.update_accessible_state(id);
        self.pop_verify_invariants(id);
        self.unref_widget(id);
    }

    /// Base class hide: clear the visible flag and unmap.
    ///
    /// The allocation is forgotten, so showing the widget again always
    /// reallocates it and everything queued inside it while hidden.
    pub fn default_hide(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.set(WidgetFlags::VISIBLE, false);
        if node.has(WidgetFlags::MAPPED) {
            self.unmap(id);
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.allocation = Rect::new(-1, -1, 1, 1);
            node.clip = node.allocation;
            node.set(WidgetFlags::ALLOC_NEEDED, true);
        }
    }

    /// Show the widget and, recursively, its children.
    ///
    /// Widgets flagged no-show-all are skipped with their subtree.
    pub fn show_all(&mut self, id: WidgetId) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if node.has(WidgetFlags::NO_SHOW_ALL) {
            return;
        }
        for child in node.children.clone() {
            self.show_all(child);
        }
        self.show(id);
    }

    /// Show or hide.
    pub fn set_visible(&mut self, id: WidgetId, visible: bool) {
        if visible {
            self.show(id);
        } else {
            self.hide(id);
        }
    }

    /// Let the parent decide whether a visible child is mapped.
    ///
    /// Containers that show only some of their children (stacks, notebooks)
    /// clear this on the hidden ones.
    pub fn set_child_visible(&mut self, id: WidgetId, child_visible: bool) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if node.is_toplevel() {
            tracing::warn!(
                target: targets::LIFECYCLE,
                widget = node.type_name,
                "child-visible has no meaning on a toplevel"
            );
            return;
        }
        if node.has(WidgetFlags::CHILD_VISIBLE) == child_visible {
            return;
        }
        let parent = node.parent;
        let visible = node.has(WidgetFlags::VISIBLE);
        let mapped = node.has(WidgetFlags::MAPPED);

        self.ref_widget(id);
        self.push_verify_invariants(id);
        self.set_flags(id, WidgetFlags::CHILD_VISIBLE, child_visible);
        if !child_visible {
            if let Some(toplevel) = self.toplevel(id) {
                if toplevel != id {
                    self.unset_focus_and_default(toplevel, id);
                }
            }
        }
        if let Some(parent) = parent {
            if self.is_realized(parent) {
                if child_visible {
                    if self.is_mapped(parent) && visible && !mapped {
                        self.map(id);
                    }
                } else if mapped {
                    self.unmap(id);
                }
            }
        }
        self.pop_verify_invariants(id);
        self.unref_widget(id);
    }

    // =========================================================================
    // Realize / unrealize
    // =========================================================================

    /// Give the widget its platform resources, realizing ancestors first.
    pub fn realize(&mut self, id: WidgetId) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if node.has(WidgetFlags::REALIZED) {
            return;
        }
        let parent = node.parent;
        let type_name = node.type_name;
        if parent.is_none() && !node.is_toplevel() {
            tracing::warn!(
                target: targets::LIFECYCLE,
                widget = type_name,
                "realizing a widget that is not inside a toplevel"
            );
        }

        self.push_verify_invariants(id);
        if let Some(parent) = parent {
            if !self.is_realized(parent) {
                self.realize(parent);
            }
        }

        let result = match self.with_class(id, |class, tree| class.realize(tree, id)) {
            Some(result) => result,
            None => self.default_realize(id),
        };
        if let Err(err) = result {
            tracing::error!(
                target: targets::BACKEND,
                widget = type_name,
                %err,
                "failed to realize widget"
            );
            self.pop_verify_invariants(id);
            return;
        }
        self.set_flags(id, WidgetFlags::REALIZED, true);
        tracing::trace!(target: targets::LIFECYCLE, widget = type_name, "realized");
        self.emit(id, |s| &s.realize, ());

        self.apply_window_attributes(id);
        if self
            .nodes
            .get(id)
            .is_some_and(|n| !n.tick_callbacks.is_empty())
        {
            self.connect_frame_clock(id);
        }
        self.update_scale(id);
        self.pop_verify_invariants(id);
    }

    /// Push shapes and per-device masks set before realization to the
    /// native window.
    fn apply_window_attributes(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let Some(window) = node.window else {
            return;
        };
        if !node.has_window() {
            return;
        }
        let shape = node
            .has(WidgetFlags::HAS_SHAPE_MASK)
            .then_some(node.shape)
            .flatten();
        let input_shape = node.input_shape;
        let device_events: Vec<_> = node.device_events.iter().map(|(d, m)| (*d, *m)).collect();
        let devices = node.enabled_devices.clone();
        if shape.is_some() {
            self.display.shape_combine(window, shape);
        }
        if input_shape.is_some() {
            self.display.input_shape_combine(window, input_shape);
        }
        for (device, mask) in device_events {
            self.display.set_device_events(window, device, mask);
        }
        for device in devices {
            self.display.set_device_enabled(window, device, true);
        }
    }

    /// Base class realize.
    ///
    /// A no-window widget adopts its parent's window; otherwise a native
    /// window is created at the allocation.
    pub fn default_realize(&mut self, id: WidgetId) -> Result<(), DisplayError> {
        let Some(node) = self.nodes.get(id) else {
            return Ok(());
        };
        if !node.has_window() {
            let window = node.parent.and_then(|p| self.window(p));
            if let Some(node) = self.nodes.get_mut(id) {
                node.window = window;
            }
            return Ok(());
        }
        let mask = node.events | EventMask::EXPOSURE | EventMask::STRUCTURE;
        let attributes = if node.is_toplevel() {
            let size = node.allocation.size();
            WindowAttributes::toplevel(Rect::new(0, 0, size.width.max(1), size.height.max(1)), mask)
        } else {
            let host = node.parent.and_then(|p| self.window(p));
            WindowAttributes::child(host, node.allocation, mask)
        };
        self.realize_with_attributes(id, &attributes)
    }

    /// Create the widget's native window from explicit attributes and
    /// register the widget as its owner.
    ///
    /// Toplevels also get their frame clock here.
    pub fn realize_with_attributes(
        &mut self,
        id: WidgetId,
        attributes: &WindowAttributes,
    ) -> Result<(), DisplayError> {
        let window = self.display.create_window(attributes)?;
        self.window_owners.insert(window, id);

        let Some(node) = self.nodes.get_mut(id) else {
            return Ok(());
        };
        node.window = Some(window);
        let toplevel = node.is_toplevel();
        let alpha = node.alpha;
        if toplevel {
            let clock = self.frame_clocks.insert(FrameClock::new(id, window));
            if let Some(data) = self.nodes.get_mut(id).and_then(|n| n.toplevel.as_mut()) {
                data.frame_clock = Some(clock);
            }
            tracing::trace!(target: targets::FRAME, ?clock, "frame clock created");
        }
        if alpha < 255 {
            self.display.set_opacity(window, f64::from(alpha) / 255.0);
        }
        Ok(())
    }

    /// Release platform resources, unrealizing children first.
    pub fn unrealize(&mut self, id: WidgetId) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if !node.has(WidgetFlags::REALIZED) {
            return;
        }
        let type_name = node.type_name;
        let has_grab = node.has(WidgetFlags::HAS_GRAB);

        self.ref_widget(id);
        self.push_verify_invariants(id);
        if self.is_mapped(id) {
            self.unmap(id);
        }
        for child in self.children(id).to_vec() {
            self.unrealize(child);
        }

        self.emit(id, |s| &s.unrealize, ());
        if self
            .with_class(id, |class, tree| class.unrealize(tree, id))
            .is_none()
        {
            self.default_unrealize(id);
        }
        self.disconnect_frame_clock(id);
        if has_grab {
            self.grab_remove(id);
        }
        self.set_flags(id, WidgetFlags::REALIZED, false);
        tracing::trace!(target: targets::LIFECYCLE, widget = type_name, "unrealized");
        self.pop_verify_invariants(id);
        self.unref_widget(id);
    }

    /// Base class unrealize: destroy an owned native window and the
    /// toplevel's frame clock.
    pub fn default_unrealize(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let window = node.window.take();
        if !node.has_window() {
            return;
        }
        let clock = node.toplevel.as_mut().and_then(|t| t.frame_clock.take());
        if let Some(clock) = clock {
            self.frame_clocks.remove(clock);
        }
        if let Some(window) = window {
            self.window_owners.remove(&window);
            self.damage.remove(&window);
            self.display.destroy_window(window);
        }
    }

    // =========================================================================
    // Map / unmap
    // =========================================================================

    /// Put the widget on screen, realizing it if needed.
    pub fn map(&mut self, id: WidgetId) {
        precondition!(targets::LIFECYCLE, "map", self.try_map(id));
    }

    fn try_map(&mut self, id: WidgetId) -> Result<(), WidgetError> {
        let node = self.nodes.get(id).ok_or(WidgetError::InvalidWidget(id))?;
        if node.has(WidgetFlags::MAPPED) {
            return Ok(());
        }
        let type_name = node.type_name;
        if !node.has(WidgetFlags::VISIBLE) {
            return Err(WidgetError::NotVisible(type_name));
        }
        if !node.is_toplevel() && !node.has(WidgetFlags::CHILD_VISIBLE) {
            return Err(WidgetError::NotChildVisible(type_name));
        }
        if let Some(parent) = node.parent {
            if !self.is_mapped(parent) {
                return Err(WidgetError::ParentNotMapped {
                    child: type_name,
                    parent: self.type_name(parent).unwrap_or("?"),
                });
            }
        }

        self.push_verify_invariants(id);
        if !self.is_realized(id) {
            self.realize(id);
        }
        if !self.is_realized(id) {
            self.pop_verify_invariants(id);
            return Ok(());
        }
        if self.with_class(id, |class, tree| class.map(tree, id)).is_none() {
            self.default_map(id);
        }
        if !self.has_window(id) {
            self.invalidate_clip(id);
        }
        tracing::trace!(target: targets::LIFECYCLE, widget = type_name, "mapped");
        self.emit(id, |s| &s.map, ());
        self.update_accessible_state(id);
        self.pop_verify_invariants(id);
        Ok(())
    }

    /// Base class map: set the mapped flag, map visible children and show
    /// an owned native window.
    pub fn default_map(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.set(WidgetFlags::MAPPED, true);
        let own_window = node.has_window().then_some(node.window).flatten();
        for child in node.children.clone() {
            let Some(child_node) = self.nodes.get(child) else {
                continue;
            };
            if child_node.has(WidgetFlags::VISIBLE | WidgetFlags::CHILD_VISIBLE)
                && !child_node.has(WidgetFlags::MAPPED)
            {
                self.map(child);
            }
        }
        if let Some(window) = own_window {
            self.display.show_window(window);
        }
    }

    /// Take the widget off screen.
    pub fn unmap(&mut self, id: WidgetId) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if !node.has(WidgetFlags::MAPPED) {
            return;
        }
        let type_name = node.type_name;
        let no_window = !node.has_window();

        self.ref_widget(id);
        self.push_verify_invariants(id);
        if no_window {
            self.invalidate_clip(id);
        }
        if self.with_class(id, |class, tree| class.unmap(tree, id)).is_none() {
            self.default_unmap(id);
        }
        tracing::trace!(target: targets::LIFECYCLE, widget = type_name, "unmapped");
        self.emit(id, |s| &s.unmap, ());
        self.break_grabs_within(id);
        self.update_accessible_state(id);
        self.pop_verify_invariants(id);
        self.unref_widget(id);
    }

    /// Base class unmap: unmap children, hide an owned native window and
    /// clear the mapped flag.
    pub fn default_unmap(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.set(WidgetFlags::MAPPED, false);
        let own_window = node.has_window().then_some(node.window).flatten();
        for child in node.children.clone() {
            if self.is_mapped(child) {
                self.unmap(child);
            }
        }
        if let Some(window) = own_window {
            self.display.hide_window(window);
        }
    }

    // =========================================================================
    // Parenting
    // =========================================================================

    /// Attach `child` under `parent`.
    ///
    /// Containers call this from their add implementation; applications use
    /// [`container_add`](Self::container_add).
    pub fn set_parent(&mut self, child: WidgetId, parent: WidgetId) {
        precondition!(targets::LIFECYCLE, "set_parent", self.try_set_parent(child, parent));
    }

    fn try_set_parent(&mut self, child: WidgetId, parent: WidgetId) -> Result<(), WidgetError> {
        let child_node = self.nodes.get(child).ok_or(WidgetError::InvalidWidget(child))?;
        let parent_node = self.nodes.get(parent).ok_or(WidgetError::InvalidWidget(parent))?;
        if let Some(existing) = child_node.parent {
            return Err(WidgetError::AlreadyParented {
                child: child_node.type_name,
                parent: self.type_name(existing).unwrap_or("?"),
            });
        }
        if child_node.is_toplevel() {
            return Err(WidgetError::ToplevelParent(child_node.type_name));
        }
        if child == parent || self.is_ancestor(parent, child) {
            return Err(WidgetError::CircularParent(child_node.type_name));
        }
        let parent_realized = parent_node.has(WidgetFlags::REALIZED);
        let parent_visible = parent_node.has(WidgetFlags::VISIBLE);
        let parent_mapped = parent_node.has(WidgetFlags::MAPPED);

        self.push_verify_invariants(child);
        self.ref_sink(child);
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        tracing::trace!(
            target: targets::LIFECYCLE,
            child = self.type_name(child).unwrap_or("?"),
            parent = self.type_name(parent).unwrap_or("?"),
            "parent set"
        );

        self.propagate_parent_state(child);
        self.reset_style(child);
        self.emit(child, |s| &s.parent_set, None);
        if self.is_anchored(parent) {
            self.propagate_hierarchy_changed(child, None);
        }

        if parent_realized {
            self.realize(child);
        }
        let (child_visible, visible) = self.nodes.get(child).map_or((false, false), |n| {
            (
                n.has(WidgetFlags::CHILD_VISIBLE),
                n.has(WidgetFlags::VISIBLE),
            )
        });
        if parent_visible && visible {
            if child_visible && parent_mapped {
                self.map(child);
            }
            self.queue_resize(parent);
        }
        if self.hexpand(child) || self.vexpand(child) {
            self.queue_compute_expand(parent);
        }
        self.pop_verify_invariants(child);
        Ok(())
    }

    /// Detach the widget from its parent, dropping the parent's reference.
    ///
    /// Unparenting a widget without a parent does nothing.
    pub fn unparent(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get(id) else {
            tracing::warn!(target: targets::LIFECYCLE, ?id, "unparent on invalid widget");
            return;
        };
        let Some(parent) = node.parent else {
            return;
        };
        let visible = node.has(WidgetFlags::VISIBLE);
        let realized = node.has(WidgetFlags::REALIZED);
        let reparenting = node.has(WidgetFlags::IN_REPARENT);
        tracing::trace!(target: targets::LIFECYCLE, widget = node.type_name, "unparent");

        self.push_verify_invariants(id);
        let old_toplevel = self.toplevel(id);
        if self.is_mapped(id) {
            self.invalidate_clip(id);
        }
        if visible && self.is_visible(parent) {
            self.queue_resize(parent);
        }
        if let Some(toplevel) = old_toplevel {
            self.unset_focus_and_default(toplevel, id);
        }
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            if parent_node.focus_child == Some(id) {
                parent_node.focus_child = None;
            }
        }

        if realized {
            if reparenting {
                self.unmap(id);
            } else {
                self.unrealize(id);
            }
        }

        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.retain(|c| *c != id);
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = None;
            node.set(WidgetFlags::CHILD_VISIBLE, true);
            // force a fresh allocation if the widget is added back
            node.allocation.width = 1;
            node.allocation.height = 1;
            node.set(WidgetFlags::RESIZE_NEEDED | WidgetFlags::ALLOC_NEEDED, true);
            node.request_cache.clear();
        }
        self.with_class(parent, |class, _| class.child_removed(id));

        self.propagate_parent_state(id);
        self.emit(id, |s| &s.parent_set, Some(parent));
        if old_toplevel.is_some() {
            self.propagate_hierarchy_changed(id, old_toplevel);
        }
        self.reset_style(id);
        self.pop_verify_invariants(id);
        self.unref_widget(id);
    }

    /// Add a child to a container.
    pub fn container_add(&mut self, container: WidgetId, child: WidgetId) {
        precondition!(
            targets::LIFECYCLE,
            "container_add",
            self.try_container_add(container, child)
        );
    }

    pub(crate) fn try_container_add(&mut self, container: WidgetId, child: WidgetId) -> Result<(), WidgetError> {
        let node = self
            .nodes
            .get(container)
            .ok_or(WidgetError::InvalidWidget(container))?;
        if !node.container {
            return Err(WidgetError::NotAContainer(node.type_name));
        }
        if let Some(class) = node.class.as_deref() {
            class.accepts_child(self, container, child)?;
        }
        self.try_set_parent(child, container)
    }

    /// Remove a child from a container.
    pub fn container_remove(&mut self, container: WidgetId, child: WidgetId) {
        precondition!(
            targets::LIFECYCLE,
            "container_remove",
            self.try_container_remove(container, child)
        );
    }

    fn try_container_remove(&mut self, container: WidgetId, child: WidgetId) -> Result<(), WidgetError> {
        let node = self
            .nodes
            .get(container)
            .ok_or(WidgetError::InvalidWidget(container))?;
        let child_node = self.nodes.get(child).ok_or(WidgetError::InvalidWidget(child))?;
        if child_node.parent != Some(container) {
            return Err(WidgetError::NotAChild {
                child: child_node.type_name,
                container: node.type_name,
            });
        }
        self.unparent(child);
        Ok(())
    }

    /// Move a widget to a new parent.
    ///
    /// When both ends are realized the widget keeps its native resources:
    /// it is unmapped, moved and mapped again.
    pub fn reparent(&mut self, id: WidgetId, new_parent: WidgetId) {
        precondition!(targets::LIFECYCLE, "reparent", self.try_reparent(id, new_parent));
    }

    fn try_reparent(&mut self, id: WidgetId, new_parent: WidgetId) -> Result<(), WidgetError> {
        let node = self.nodes.get(id).ok_or(WidgetError::InvalidWidget(id))?;
        let type_name = node.type_name;
        let old_parent = node.parent;
        if !self.nodes.contains_key(new_parent) {
            return Err(WidgetError::InvalidWidget(new_parent));
        }
        if old_parent == Some(new_parent) {
            return Err(WidgetError::SameParent(type_name));
        }
        let new_node = &self.nodes[new_parent];
        if !new_node.container {
            return Err(WidgetError::NotAContainer(new_node.type_name));
        }
        if id == new_parent || self.is_ancestor(new_parent, id) {
            return Err(WidgetError::CircularParent(type_name));
        }
        let Some(old_parent) = old_parent else {
            return self.try_container_add(new_parent, id);
        };

        self.ref_widget(id);
        let keep_resources = self.is_realized(id) && self.is_realized(new_parent);
        if keep_resources {
            self.set_flags(id, WidgetFlags::IN_REPARENT, true);
        }
        self.try_container_remove(old_parent, id)?;
        let added = self.try_container_add(new_parent, id);
        if keep_resources {
            self.rehost_windows(id);
            self.update_scale(id);
            self.set_flags(id, WidgetFlags::IN_REPARENT, false);
        }
        self.unref_widget(id);
        added
    }

    /// Point the widget's subtree at its new parent's native window.
    fn rehost_windows(&mut self, id: WidgetId) {
        let host = self.parent(id).and_then(|p| self.window(p));
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.has_window() {
            if let (Some(window), Some(host)) = (node.window, host) {
                let at = node.allocation.origin();
                self.display.reparent_window(window, host, at);
            }
            return;
        }
        node.window = host;
        for child in node.children.clone() {
            self.rehost_windows(child);
        }
    }

    /// Emit `hierarchy_changed` over a subtree whose anchoring changed and
    /// move tick callbacks to the new toplevel's frame clock.
    pub(crate) fn propagate_hierarchy_changed(
        &mut self,
        id: WidgetId,
        previous_toplevel: Option<WidgetId>,
    ) {
        for widget in self.descendants(id) {
            if !self.nodes.contains_key(widget) {
                continue;
            }
            self.refresh_frame_clock(widget);
            self.emit(widget, |s| &s.hierarchy_changed, previous_toplevel);
        }
    }

    // =========================================================================
    // Destruction
    // =========================================================================

    /// Dispose of the widget.
    ///
    /// Emits `destroy`, severs the widget from its parent, destroys its
    /// children and drops the reference its owner held. The widget is
    /// finalized once the last reference goes. Calling destroy again, or on
    /// an already freed id, does nothing.
    pub fn destroy(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.has(WidgetFlags::IN_DESTRUCTION) {
            return;
        }
        node.set(WidgetFlags::IN_DESTRUCTION | WidgetFlags::DISPOSING, true);
        tracing::trace!(target: targets::LIFECYCLE, widget = node.type_name, "destroy");

        self.emit(id, |s| &s.destroy, ());

        if self.parent(id).is_some() {
            self.unparent(id);
        } else if self.is_visible(id) {
            self.hide(id);
        }
        self.set_flags(id, WidgetFlags::VISIBLE, false);
        if self.is_realized(id) {
            self.unrealize(id);
        }

        if self.has_flags(id, WidgetFlags::HAS_GRAB) {
            self.grab_remove(id);
        }
        self.drop_device_grabs(id);
        self.remove_accelerators_for(id);

        for child in self.children(id).to_vec() {
            self.destroy(child);
        }

        let controllers = self
            .nodes
            .get(id)
            .map(|n| n.controllers.clone())
            .unwrap_or_default();
        for controller in controllers {
            self.remove_controller(controller);
        }
        self.disconnect_frame_clock(id);
        let groups = self
            .nodes
            .get(id)
            .map(|n| n.size_groups.clone())
            .unwrap_or_default();
        for group in groups {
            self.size_group_remove_widget(group, id);
        }

        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.tick_callbacks.clear();
        node.accessible = None;
        node.style = None;
        node.mnemonic_labels.clear();
        node.template_children.clear();
        node.action_groups.clear();
        node.buildable = None;
        node.focus_child = None;

        if node.has(WidgetFlags::TOPLEVEL_REF) {
            node.set(WidgetFlags::TOPLEVEL_REF, false);
            node.ref_count = node.ref_count.saturating_sub(1);
        } else if node.has(WidgetFlags::FLOATING) {
            node.set(WidgetFlags::FLOATING, false);
            node.ref_count = node.ref_count.saturating_sub(1);
        }
        node.set(WidgetFlags::DISPOSING, false);
        if node.ref_count == 0 {
            self.finalize(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use trellis_core::Settings;

    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::widget::widgets::{BoxContainer, Window};
    use crate::widget::{Orientation, Widget};

    struct Leaf;
    impl Widget for Leaf {}

    fn tree() -> (WidgetTree, HeadlessDisplay) {
        let display = HeadlessDisplay::new();
        let tree = WidgetTree::new(Box::new(display.clone()), Settings::default());
        (tree, display)
    }

    #[test]
    fn set_parent_then_unparent_floats_again() {
        let (mut tree, _) = tree();
        let container = tree.create(BoxContainer::new(Orientation::Vertical));
        let leaf = tree.create(Leaf);
        tree.ref_widget(leaf);

        tree.container_add(container, leaf);
        assert_eq!(tree.parent(leaf), Some(container));
        assert!(!tree.is_floating(leaf));

        tree.unparent(leaf);
        assert_eq!(tree.parent(leaf), None);
        assert!(!tree.is_anchored(leaf));
        assert!(tree.contains(leaf));
        assert_eq!(tree.ref_count(leaf), 1);
    }

    #[test]
    fn toplevel_cannot_be_parented() {
        let (mut tree, _) = tree();
        let outer = tree.create(BoxContainer::new(Orientation::Vertical));
        let window = tree.create(Window::new());
        tree.container_add(outer, window);
        assert_eq!(tree.parent(window), None);
    }

    #[test]
    fn circular_parenting_is_rejected() {
        let (mut tree, _) = tree();
        let a = tree.create(BoxContainer::new(Orientation::Vertical));
        let b = tree.create(BoxContainer::new(Orientation::Vertical));
        tree.container_add(a, b);
        tree.container_add(b, a);
        assert_eq!(tree.parent(a), None);
        assert_eq!(tree.parent(b), Some(a));
    }

    #[test]
    fn realize_then_unrealize_releases_window() {
        let (mut tree, display) = tree();
        let window = tree.create(Window::new());
        tree.realize(window);
        let native = tree.window(window).unwrap();
        assert!(display.contains(native));

        tree.unrealize(window);
        assert!(!tree.is_realized(window));
        assert_eq!(tree.window(window), None);
        assert!(!display.contains(native));
    }

    #[test]
    fn failed_window_creation_leaves_widget_unrealized() {
        let (mut tree, display) = tree();
        let window = tree.create(Window::new());
        display.fail_next_window_creation("out of handles");
        tree.realize(window);
        assert!(!tree.is_realized(window));
        assert_eq!(tree.window(window), None);
    }

    #[test]
    fn hide_unmaps_subtree() {
        let (mut tree, _) = tree();
        let window = tree.create(Window::new());
        let leaf = tree.create(Leaf);
        tree.container_add(window, leaf);
        tree.show_all(window);
        assert!(tree.is_mapped(leaf));

        tree.hide(window);
        assert!(!tree.is_mapped(window));
        assert!(!tree.is_mapped(leaf));
        assert!(tree.is_visible(leaf));
    }

    #[test]
    fn child_visible_controls_mapping() {
        let (mut tree, _) = tree();
        let window = tree.create(Window::new());
        let leaf = tree.create(Leaf);
        tree.container_add(window, leaf);
        tree.show_all(window);

        tree.set_child_visible(leaf, false);
        assert!(!tree.is_mapped(leaf));
        tree.set_child_visible(leaf, true);
        assert!(tree.is_mapped(leaf));
    }

    #[test]
    fn no_show_all_skips_subtree() {
        let (mut tree, _) = tree();
        let window = tree.create(Window::new());
        let column = tree.create(BoxContainer::new(Orientation::Vertical));
        let leaf = tree.create(Leaf);
        tree.container_add(window, column);
        tree.container_add(column, leaf);
        tree.set_no_show_all(column, true);

        tree.show_all(window);
        assert!(tree.is_mapped(window));
        assert!(!tree.is_visible(column));
        assert!(!tree.is_visible(leaf));
    }

    #[test]
    fn reparent_keeps_native_resources() {
        let (mut tree, _) = tree();
        let window = tree.create(Window::new());
        let column = tree.create(BoxContainer::new(Orientation::Vertical));
        let a = tree.create(BoxContainer::new(Orientation::Horizontal));
        let b = tree.create(BoxContainer::new(Orientation::Horizontal));
        let leaf = tree.create(Leaf);
        tree.container_add(window, column);
        tree.container_add(column, a);
        tree.container_add(column, b);
        tree.container_add(a, leaf);
        tree.show_all(window);
        assert!(tree.is_mapped(leaf));

        tree.reparent(leaf, b);
        assert_eq!(tree.parent(leaf), Some(b));
        assert!(tree.is_realized(leaf));
        assert!(tree.is_mapped(leaf));
        assert_eq!(tree.window(leaf), tree.window(window));
        assert!(!tree.has_flags(leaf, WidgetFlags::IN_REPARENT));
    }

    #[test]
    fn destroy_frees_unreferenced_widget() {
        let (mut tree, _) = tree();
        let leaf = tree.create(Leaf);
        tree.destroy(leaf);
        assert!(!tree.contains(leaf));
        tree.destroy(leaf);
    }

    #[test]
    fn destroying_a_window_destroys_its_children() {
        let (mut tree, display) = tree();
        let window = tree.create(Window::new());
        let leaf = tree.create(Leaf);
        tree.container_add(window, leaf);
        tree.show_all(window);
        assert_eq!(display.window_count(), 1);

        tree.destroy(window);
        assert!(!tree.contains(window));
        assert!(!tree.contains(leaf));
        assert_eq!(display.window_count(), 0);
    }
}
