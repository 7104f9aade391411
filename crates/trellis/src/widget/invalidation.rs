//! Resize, allocate and redraw queueing.
//!
//! Nothing here does layout or painting directly. The queue operations set
//! flags, record damage and ask the display for a frame; the frame clock
//! drains the resize queue and damaged windows on the next frame.

use trellis_core::logging::targets;
use trellis_core::{DamageTracker, Rect};

use super::flags::WidgetFlags;
use super::tree::lookup;
use super::{WidgetId, WidgetTree};
use crate::display::NativeWindowId;

impl WidgetTree {
    /// Ask for a new size request and allocation.
    ///
    /// The widget and its ancestors up to the first one already waiting
    /// for a resize are marked, size-group peers follow, and the nearest
    /// resize root is queued for the next frame. Calling this repeatedly
    /// before the frame runs costs nothing extra.
    pub fn queue_resize(&mut self, id: WidgetId) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if node.has(WidgetFlags::IN_DESTRUCTION) {
            return;
        }
        if node.has(WidgetFlags::REALIZED) {
            self.invalidate_clip(id);
        }

        let mut pending = vec![id];
        while let Some(widget) = pending.pop() {
            let Some(node) = self.nodes.get_mut(widget) else {
                continue;
            };
            if node.has(WidgetFlags::RESIZE_NEEDED) {
                continue;
            }
            node.set(WidgetFlags::RESIZE_NEEDED, true);
            node.request_cache.clear();
            let parent = node.parent;
            self.set_alloc_needed(widget);

            pending.extend(self.size_group_neighbours(widget));
            if let Some(parent) = parent {
                pending.push(parent);
            }
        }
    }

    /// Ask for a new allocation without re-measuring.
    ///
    /// Used when only margins or alignment changed.
    pub fn queue_allocate(&mut self, id: WidgetId) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if node.has(WidgetFlags::REALIZED) {
            self.queue_draw(id);
        }
        self.set_alloc_needed(id);
    }

    /// Mark the widget as needing allocation and its ancestors as having a
    /// child that does, queuing the resize root reached on the way.
    fn set_alloc_needed(&mut self, id: WidgetId) {
        self.set_flags(id, WidgetFlags::ALLOC_NEEDED, true);
        let mut current = id;
        loop {
            let Some(node) = self.nodes.get_mut(current) else {
                break;
            };
            if node.has(WidgetFlags::ALLOC_NEEDED_ON_CHILD) {
                break;
            }
            node.set(WidgetFlags::ALLOC_NEEDED_ON_CHILD, true);
            if !node.has(WidgetFlags::VISIBLE) {
                break;
            }
            if node.has(WidgetFlags::IS_RESIZE_ROOT) {
                self.enqueue_resize_root(current);
                break;
            }
            let Some(parent) = node.parent else {
                break;
            };
            current = parent;
        }
    }

    fn enqueue_resize_root(&mut self, root: WidgetId) {
        if self.resize_queue.contains(&root) {
            return;
        }
        tracing::trace!(
            target: targets::LAYOUT,
            root = self.type_name(root).unwrap_or("?"),
            "resize root queued"
        );
        self.resize_queue.push(root);
        if let Some(window) = self.window(root) {
            self.display.request_frame(window);
        }
    }

    /// Resize roots waiting for the next layout pass, in queue order.
    pub fn pending_resize_roots(&self) -> &[WidgetId] {
        &self.resize_queue
    }

    /// Redraw the widget's whole clip area.
    pub fn queue_draw(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let clip = node.clip;
        self.queue_draw_window_rect(id, clip);
    }

    /// Redraw part of the widget. `area` is relative to the widget's
    /// allocation.
    pub fn queue_draw_area(&mut self, id: WidgetId, area: Rect) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if area.is_empty() {
            return;
        }
        let origin = node.allocation.origin();
        self.queue_draw_window_rect(id, area.offset(origin.x, origin.y));
    }

    fn queue_draw_window_rect(&mut self, id: WidgetId, rect: Rect) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if !node.has(WidgetFlags::REALIZED) {
            return;
        }
        // nothing is on screen below an unmapped ancestor
        let mut current = Some(id);
        while let Some(widget) = current {
            let Some(node) = self.nodes.get(widget) else {
                return;
            };
            if !node.has(WidgetFlags::MAPPED) {
                return;
            }
            current = node.parent;
        }
        if let Some(window) = self.hosting_window(id) {
            self.invalidate_window_rect(window, rect);
        }
    }

    /// Invalidate the widget's clip in the window hosting it.
    ///
    /// Used around map and unmap, where the mapped check of
    /// [`queue_draw`](Self::queue_draw) would skip the widget.
    pub(crate) fn invalidate_clip(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if !node.has(WidgetFlags::REALIZED) {
            return;
        }
        let clip = node.clip;
        if let Some(window) = self.hosting_window(id) {
            self.invalidate_window_rect(window, clip);
        }
    }

    /// The native window whose coordinates the widget's allocation uses.
    ///
    /// That is the parent's window for a widget owning a child window, and
    /// the widget's window otherwise.
    pub(crate) fn hosting_window(&self, id: WidgetId) -> Option<NativeWindowId> {
        let node = self.nodes.get(id)?;
        if node.has_window() && !node.is_toplevel() {
            return node.parent.and_then(|p| self.window(p));
        }
        node.window
    }

    /// Record damage on a native window and ask for a frame.
    pub(crate) fn invalidate_window_rect(&mut self, window: NativeWindowId, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        self.damage
            .entry(window)
            .or_insert_with(DamageTracker::new)
            .add_damage(rect);
        self.display.invalidate(window, rect);
        self.display.request_frame(window);
    }

    /// Accumulated damage of a native window, if any.
    pub fn pending_damage(&self, window: NativeWindowId) -> Option<Rect> {
        self.damage.get(&window)?.damage_region()
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

    fn shown_window() -> (WidgetTree, HeadlessDisplay, WidgetId, WidgetId, WidgetId) {
        let display = HeadlessDisplay::new();
        let mut tree = WidgetTree::new(Box::new(display.clone()), Settings::default());
        let window = tree.create(Window::new());
        let column = tree.create(BoxContainer::new(Orientation::Vertical));
        let leaf = tree.create(Leaf);
        tree.container_add(window, column);
        tree.container_add(column, leaf);
        tree.show_all(window);
        (tree, display, window, column, leaf)
    }

    #[test]
    fn queue_resize_marks_ancestors_and_queues_the_root_once() {
        let (mut tree, _, window, column, leaf) = shown_window();
        assert!(tree.pending_resize_roots().is_empty());

        tree.queue_resize(leaf);
        tree.queue_resize(leaf);
        assert_eq!(tree.pending_resize_roots(), &[window]);
        for widget in [leaf, column, window] {
            assert!(tree.has_flags(widget, WidgetFlags::RESIZE_NEEDED));
            assert!(tree.has_flags(widget, WidgetFlags::ALLOC_NEEDED_ON_CHILD));
        }
    }

    #[test]
    fn queue_allocate_keeps_the_request_cache() {
        let (mut tree, _, window, _, leaf) = shown_window();
        tree.queue_allocate(leaf);
        assert!(tree.has_flags(leaf, WidgetFlags::ALLOC_NEEDED));
        assert!(!tree.has_flags(leaf, WidgetFlags::RESIZE_NEEDED));
        assert_eq!(tree.pending_resize_roots(), &[window]);
    }

    #[test]
    fn queue_draw_area_damages_the_host_window() {
        let (mut tree, display, window, _, leaf) = shown_window();
        let native = tree.window(window).unwrap();
        display.clear_log();

        let origin = tree.allocation(leaf).origin();
        tree.queue_draw_area(leaf, Rect::new(1, 2, 3, 4));
        let expected = Rect::new(origin.x + 1, origin.y + 2, 3, 4);
        assert_eq!(display.invalidations(), vec![(native, expected)]);
        assert!(display.frame_requests() > 0);
        assert!(tree.pending_damage(native).is_some());
    }

    #[test]
    fn hidden_widgets_do_not_damage() {
        let (mut tree, display, _, _, leaf) = shown_window();
        tree.hide(leaf);
        display.clear_log();
        tree.queue_draw(leaf);
        assert!(display.invalidations().is_empty());
    }
}
