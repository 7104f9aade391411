//! Allocation: the placing half of two-pass layout, plus the attributes
//! that steer it (margins, alignment, size overrides and expand flags).
//!
//! Allocations are rectangles in the coordinates of the native window the
//! widget draws into. A toplevel is allocated at the origin of its own
//! window; no-window descendants share that coordinate space.

use trellis_core::Rect;
use trellis_core::logging::targets;

use super::flags::WidgetFlags;
use super::geometry::{Align, AxisAllocation, Margin, Orientation, SizeRequestMode};
use super::tree::lookup;
use super::{WidgetId, WidgetTree};

impl WidgetTree {
    /// Allocate without a baseline.
    pub fn size_allocate(&mut self, id: WidgetId, allocation: Rect) {
        self.size_allocate_with_baseline(id, allocation, -1);
    }

    /// Give the widget its final rectangle and baseline.
    ///
    /// The rectangle is clamped to at least 1x1 and adjusted for margins
    /// and alignment before it is stored. The class then places its native
    /// window and allocates its children. Allocating below the minimum
    /// request logs a warning and proceeds.
    #[tracing::instrument(skip_all, level = "trace")]
    pub fn size_allocate_with_baseline(&mut self, id: WidgetId, allocation: Rect, baseline: i32) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        if !node.has(WidgetFlags::VISIBLE) && !node.is_toplevel() {
            return;
        }
        let type_name = node.type_name;
        let parent = node.parent;

        self.push_verify_invariants(id);
        if let Some(node) = self.nodes.get_mut(id) {
            node.allocated_rect = allocation;
            node.allocated_baseline = baseline;
        }

        let mut real = allocation;
        real.width = real.width.max(1);
        real.height = real.height.max(1);

        let (min_width, nat_width, min_height, nat_height) = match self.request_mode(id) {
            SizeRequestMode::WidthForHeight => {
                let (min_height, nat_height) = self.preferred_height(id);
                let (min_width, nat_width) = self.preferred_width_for_height(id, real.height);
                (min_width, nat_width, min_height, nat_height)
            }
            _ => {
                let (min_width, nat_width) = self.preferred_width(id);
                let (min_height, nat_height) = self.preferred_height_for_width(id, real.width);
                (min_width, nat_width, min_height, nat_height)
            }
        };
        if min_width > real.width || min_height > real.height {
            tracing::warn!(
                target: targets::LAYOUT,
                widget = type_name,
                parent = parent.and_then(|p| self.type_name(p)).unwrap_or("none"),
                width = real.width,
                height = real.height,
                min_width,
                min_height,
                "allocation is smaller than the minimum request"
            );
        }

        let mut horizontal = AxisAllocation {
            minimum: min_width,
            natural: nat_width,
            position: real.x,
            size: real.width,
        };
        let mut vertical = AxisAllocation {
            minimum: min_height,
            natural: nat_height,
            position: real.y,
            size: real.height,
        };
        let (baseline_support, adjusted) = self
            .with_class(id, |class, tree| {
                class.adjust_size_allocation(tree, id, Orientation::Horizontal, &mut horizontal);
                class.adjust_size_allocation(tree, id, Orientation::Vertical, &mut vertical);
                (class.has_baseline_support(), true)
            })
            .unwrap_or((false, false));
        if !adjusted {
            self.default_adjust_size_allocation(id, Orientation::Horizontal, &mut horizontal);
            self.default_adjust_size_allocation(id, Orientation::Vertical, &mut vertical);
        }
        let mut adjusted = Rect::new(
            horizontal.position,
            vertical.position,
            horizontal.size,
            vertical.size,
        );
        if adjusted.x < real.x
            || adjusted.y < real.y
            || adjusted.right() > real.right()
            || adjusted.bottom() > real.bottom()
        {
            tracing::warn!(
                target: targets::LAYOUT,
                widget = type_name,
                ?real,
                ?adjusted,
                "adjusted allocation must stay inside the original bounds"
            );
            adjusted = real;
        }

        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let mut baseline = baseline;
        if !(baseline_support && node.valign == Align::Baseline) {
            baseline = -1;
        } else if baseline >= 0 {
            baseline -= node.margin.top;
        }

        let old_allocation = node.allocation;
        let old_clip = node.clip;
        let size_changed = old_allocation.size() != adjusted.size();
        let position_changed = old_allocation.origin() != adjusted.origin();
        let baseline_changed = node.baseline != baseline;
        let alloc_needed = node.has(WidgetFlags::ALLOC_NEEDED);

        if !alloc_needed && !size_changed && !position_changed && !baseline_changed {
            self.ensure_allocate_children(id);
            self.set_flags(
                id,
                WidgetFlags::ALLOC_NEEDED | WidgetFlags::ALLOC_NEEDED_ON_CHILD,
                false,
            );
            self.pop_verify_invariants(id);
            return;
        }

        node.allocation = adjusted;
        node.baseline = baseline;
        node.clip = adjusted;
        if self
            .with_class(id, |class, tree| class.size_allocate(tree, id, adjusted, baseline))
            .is_none()
        {
            self.default_size_allocate(id, adjusted);
        }

        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let clip = node.clip;
        node.set(
            WidgetFlags::RESIZE_NEEDED
                | WidgetFlags::ALLOC_NEEDED
                | WidgetFlags::ALLOC_NEEDED_ON_CHILD,
            false,
        );
        let redraw = node.has(WidgetFlags::MAPPED | WidgetFlags::REDRAW_ON_ALLOC);
        self.set_clip(id, clip);

        if redraw && (size_changed || position_changed) {
            if let Some(window) = self.hosting_window(id) {
                self.invalidate_window_rect(window, old_clip.union(&clip));
            }
        }
        tracing::trace!(target: targets::LAYOUT, widget = type_name, ?adjusted, baseline, "allocated");
        self.emit(id, |s| &s.size_allocate, (adjusted, baseline));
        self.update_accessible_bounds(id);
        self.pop_verify_invariants(id);
    }

    /// Base class allocation adjustment: subtract margins, then align.
    ///
    /// Horizontal margins and alignment are mirrored for right-to-left.
    pub fn default_adjust_size_allocation(
        &self,
        id: WidgetId,
        orientation: Orientation,
        axis: &mut AxisAllocation,
    ) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let (leading, trailing, align) = match orientation {
            Orientation::Horizontal => {
                let direction = self.resolved_direction(id);
                let (left, right) = node.margin.horizontal(direction);
                (left, right, node.halign.for_direction(direction))
            }
            Orientation::Vertical => (node.margin.top, node.margin.bottom, node.valign),
        };

        axis.minimum -= leading + trailing;
        axis.natural -= leading + trailing;
        axis.position += leading;
        axis.size -= leading + trailing;

        match align {
            Align::Fill | Align::Baseline => {}
            Align::Start => axis.size = axis.size.min(axis.natural),
            Align::End => {
                if axis.size > axis.natural {
                    axis.position += axis.size - axis.natural;
                    axis.size = axis.natural;
                }
            }
            Align::Center => {
                if axis.size > axis.natural {
                    axis.position += (axis.size - axis.natural) / 2;
                    axis.size = axis.natural;
                }
            }
        }
        axis.size = axis.size.max(0);
    }

    /// Base class allocation: move an owned native window into place.
    pub fn default_size_allocate(&mut self, id: WidgetId, allocation: Rect) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if !node.has_window() || !node.has(WidgetFlags::REALIZED) {
            return;
        }
        if let Some(window) = node.window {
            self.display.move_resize(window, allocation);
        }
    }

    /// Replace the allocation without running the class handler.
    ///
    /// Classes that allocate themselves in an unusual way call this from
    /// their `size_allocate`.
    pub fn set_allocation(&mut self, id: WidgetId, allocation: Rect) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.allocation = allocation;
        }
    }

    /// Set the clip and grow the clips of ancestors sharing the native
    /// window until one already covers it.
    pub fn set_clip(&mut self, id: WidgetId, clip: Rect) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.clip = clip;
        let mut child = id;
        let mut clip = clip;
        loop {
            let Some(child_node) = self.nodes.get(child) else {
                break;
            };
            let Some(parent) = child_node.parent else {
                break;
            };
            let child_window = child_node.window;
            let child_has_window = child_node.has_window();
            let Some(parent_node) = self.nodes.get_mut(parent) else {
                break;
            };
            if child_has_window || parent_node.window != child_window {
                break;
            }
            if parent_node.clip.contains_rect(&clip) {
                break;
            }
            parent_node.clip = parent_node.clip.union(&clip);
            clip = parent_node.clip;
            child = parent;
        }
    }

    /// Re-run allocation where flags ask for it, with the rectangles used
    /// last time.
    pub fn ensure_allocate(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if !node.has(WidgetFlags::VISIBLE) && !node.is_toplevel() {
            return;
        }
        if node.has(WidgetFlags::ALLOC_NEEDED) {
            let rect = node.allocated_rect;
            let baseline = node.allocated_baseline;
            self.size_allocate_with_baseline(id, rect, baseline);
        } else if node.has(WidgetFlags::ALLOC_NEEDED_ON_CHILD) {
            self.ensure_allocate_children(id);
        }
    }

    fn ensure_allocate_children(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if !node.has(WidgetFlags::ALLOC_NEEDED_ON_CHILD) {
            return;
        }
        node.set(WidgetFlags::ALLOC_NEEDED_ON_CHILD, false);
        for child in node.children.clone() {
            self.ensure_allocate(child);
        }
    }

    // =========================================================================
    // Margins, alignment and size overrides
    // =========================================================================

    /// Margins around the widget.
    pub fn margin(&self, id: WidgetId) -> Margin {
        self.nodes.get(id).map_or_else(Margin::default, |n| n.margin)
    }

    /// Set all four margins.
    pub fn set_margin(&mut self, id: WidgetId, margin: Margin) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.margin == margin {
            return;
        }
        node.margin = margin;
        self.queue_resize(id);
        self.notify(id, "margin");
    }

    /// Set the leading margin.
    pub fn set_margin_start(&mut self, id: WidgetId, value: i32) {
        let margin = Margin {
            start: value,
            ..self.margin(id)
        };
        self.set_margin(id, margin);
    }

    /// Set the trailing margin.
    pub fn set_margin_end(&mut self, id: WidgetId, value: i32) {
        let margin = Margin {
            end: value,
            ..self.margin(id)
        };
        self.set_margin(id, margin);
    }

    /// Set the top margin.
    pub fn set_margin_top(&mut self, id: WidgetId, value: i32) {
        let margin = Margin {
            top: value,
            ..self.margin(id)
        };
        self.set_margin(id, margin);
    }

    /// Set the bottom margin.
    pub fn set_margin_bottom(&mut self, id: WidgetId, value: i32) {
        let margin = Margin {
            bottom: value,
            ..self.margin(id)
        };
        self.set_margin(id, margin);
    }

    /// Horizontal alignment.
    pub fn halign(&self, id: WidgetId) -> Align {
        self.nodes.get(id).map_or(Align::Fill, |n| n.halign)
    }

    /// Vertical alignment.
    pub fn valign(&self, id: WidgetId) -> Align {
        self.nodes.get(id).map_or(Align::Fill, |n| n.valign)
    }

    /// Set horizontal alignment. Takes effect at the next allocation.
    pub fn set_halign(&mut self, id: WidgetId, align: Align) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.halign != align {
            node.halign = align;
            self.queue_allocate(id);
            self.notify(id, "halign");
        }
    }

    /// Set vertical alignment. Takes effect at the next allocation.
    pub fn set_valign(&mut self, id: WidgetId, align: Align) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.valign != align {
            node.valign = align;
            self.queue_allocate(id);
            self.notify(id, "valign");
        }
    }

    /// The size override, `-1` where unset.
    pub fn size_request(&self, id: WidgetId) -> (i32, i32) {
        self.nodes
            .get(id)
            .map_or((-1, -1), |n| (n.width_request, n.height_request))
    }

    /// Override the minimum size. `-1` keeps the natural request.
    pub fn set_size_request(&mut self, id: WidgetId, width: i32, height: i32) {
        let Some(node) = lookup(&self.nodes, id) else {
            return;
        };
        let width = width.max(-1);
        let height = height.max(-1);
        let width_changed = node.width_request != width;
        let height_changed = node.height_request != height;
        if !width_changed && !height_changed {
            return;
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.width_request = width;
            node.height_request = height;
        }
        self.queue_resize(id);
        if width_changed {
            self.notify(id, "width-request");
        }
        if height_changed {
            self.notify(id, "height-request");
        }
    }

    /// Whether a new allocation invalidates the widget's area.
    pub fn set_redraw_on_allocate(&mut self, id: WidgetId, redraw: bool) {
        self.set_flags(id, WidgetFlags::REDRAW_ON_ALLOC, redraw);
    }

    // =========================================================================
    // Expand
    // =========================================================================

    /// Explicit horizontal expand flag.
    pub fn hexpand(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::HEXPAND)
    }

    /// Explicit vertical expand flag.
    pub fn vexpand(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::VEXPAND)
    }

    /// Whether the horizontal expand flag overrides the computed value.
    pub fn hexpand_set(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::HEXPAND_SET)
    }

    /// Whether the vertical expand flag overrides the computed value.
    pub fn vexpand_set(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::VEXPAND_SET)
    }

    /// Ask for extra horizontal space. Also marks the flag as set.
    pub fn set_hexpand(&mut self, id: WidgetId, expand: bool) {
        self.set_expand(id, Orientation::Horizontal, expand);
    }

    /// Ask for extra vertical space. Also marks the flag as set.
    pub fn set_vexpand(&mut self, id: WidgetId, expand: bool) {
        self.set_expand(id, Orientation::Vertical, expand);
    }

    fn set_expand(&mut self, id: WidgetId, orientation: Orientation, expand: bool) {
        let (flag, set_flag, name) = expand_flags(orientation);
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.has(set_flag) && node.has(flag) == expand {
            return;
        }
        node.set(set_flag, true);
        node.set(flag, expand);
        self.queue_compute_expand(id);
        self.notify(id, name);
    }

    /// Choose whether the explicit horizontal flag is used.
    pub fn set_hexpand_set(&mut self, id: WidgetId, set: bool) {
        self.set_expand_set(id, Orientation::Horizontal, set);
    }

    /// Choose whether the explicit vertical flag is used.
    pub fn set_vexpand_set(&mut self, id: WidgetId, set: bool) {
        self.set_expand_set(id, Orientation::Vertical, set);
    }

    fn set_expand_set(&mut self, id: WidgetId, orientation: Orientation, set: bool) {
        let (_, set_flag, _) = expand_flags(orientation);
        if self.has_flags(id, set_flag) == set {
            return;
        }
        self.set_flags(id, set_flag, set);
        self.queue_compute_expand(id);
    }

    /// Whether the widget wants extra space along an axis.
    ///
    /// Explicit flags win; otherwise the class derives the value, which for
    /// containers means any visible child expands. Hidden widgets never
    /// expand.
    pub fn compute_expand(&mut self, id: WidgetId, orientation: Orientation) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        if !node.has(WidgetFlags::VISIBLE) {
            return false;
        }
        if node.has(WidgetFlags::NEED_COMPUTE_EXPAND) {
            let explicit_h = node.has(WidgetFlags::HEXPAND_SET);
            let explicit_v = node.has(WidgetFlags::VEXPAND_SET);
            let (mut h, mut v) = if explicit_h && explicit_v {
                (false, false)
            } else {
                match self.with_class(id, |class, tree| class.compute_expand(tree, id)) {
                    Some(result) => result,
                    None => self.default_compute_expand(id),
                }
            };
            let Some(node) = self.nodes.get_mut(id) else {
                return false;
            };
            if explicit_h {
                h = node.has(WidgetFlags::HEXPAND);
            }
            if explicit_v {
                v = node.has(WidgetFlags::VEXPAND);
            }
            node.set(WidgetFlags::COMPUTED_HEXPAND, h);
            node.set(WidgetFlags::COMPUTED_VEXPAND, v);
            node.set(WidgetFlags::NEED_COMPUTE_EXPAND, false);
        }
        let flag = match orientation {
            Orientation::Horizontal => WidgetFlags::COMPUTED_HEXPAND,
            Orientation::Vertical => WidgetFlags::COMPUTED_VEXPAND,
        };
        self.has_flags(id, flag)
    }

    /// Base class expand: a container expands if any visible child does.
    pub fn default_compute_expand(&mut self, id: WidgetId) -> (bool, bool) {
        let Some(node) = self.nodes.get(id) else {
            return (false, false);
        };
        if !node.container {
            return (false, false);
        }
        let mut h = false;
        let mut v = false;
        for child in node.children.clone() {
            h |= self.compute_expand(child, Orientation::Horizontal);
            v |= self.compute_expand(child, Orientation::Vertical);
        }
        (h, v)
    }

    /// Mark the widget and its ancestors for expand recomputation.
    pub fn queue_compute_expand(&mut self, id: WidgetId) {
        if self.has_flags(id, WidgetFlags::NEED_COMPUTE_EXPAND) {
            return;
        }
        let mut changed = false;
        let mut current = Some(id);
        while let Some(widget) = current {
            let Some(node) = self.nodes.get_mut(widget) else {
                break;
            };
            if !node.has(WidgetFlags::NEED_COMPUTE_EXPAND) {
                node.set(WidgetFlags::NEED_COMPUTE_EXPAND, true);
                changed = true;
            }
            current = node.parent;
        }
        if changed {
            self.queue_resize(id);
        }
    }
}

fn expand_flags(orientation: Orientation) -> (WidgetFlags, WidgetFlags, &'static str) {
    match orientation {
        Orientation::Horizontal => (WidgetFlags::HEXPAND, WidgetFlags::HEXPAND_SET, "hexpand"),
        Orientation::Vertical => (WidgetFlags::VEXPAND, WidgetFlags::VEXPAND_SET, "vexpand"),
    }
}

#[cfg(test)]
mod tests {
    use trellis_core::Settings;

    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::widget::{Measurement, TextDirection, Widget};
    use crate::widget::widgets::BoxContainer;

    struct Fixed(i32, i32);

    impl Widget for Fixed {
        fn measure(&mut self, _: &mut WidgetTree, _: WidgetId, o: Orientation, _: i32) -> Measurement {
            match o {
                Orientation::Horizontal => Measurement::new(self.0, self.0),
                Orientation::Vertical => Measurement::new(self.1, self.1),
            }
        }
    }

    fn tree() -> WidgetTree {
        WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default())
    }

    fn shown(tree: &mut WidgetTree, class: Fixed) -> WidgetId {
        let id = tree.create(class);
        tree.show(id);
        id
    }

    #[test]
    fn empty_allocations_clamp_to_one_pixel() {
        let mut tree = tree();
        let id = shown(&mut tree, Fixed(0, 0));
        tree.size_allocate(id, Rect::new(5, 5, 0, 0));
        assert_eq!(tree.allocation(id), Rect::new(5, 5, 1, 1));
    }

    #[test]
    fn margins_and_alignment_shape_the_allocation() {
        let mut tree = tree();
        let id = shown(&mut tree, Fixed(20, 10));
        tree.set_margin(id, Margin::uniform(2));
        tree.set_halign(id, Align::End);
        tree.set_valign(id, Align::Center);
        tree.size_allocate(id, Rect::new(0, 0, 100, 50));
        assert_eq!(tree.allocation(id), Rect::new(78, 20, 20, 10));
        assert_eq!(tree.allocated_rect(id), Rect::new(0, 0, 100, 50));
    }

    #[test]
    fn rtl_mirrors_start_alignment_and_margins() {
        let mut tree = tree();
        let id = shown(&mut tree, Fixed(20, 10));
        tree.set_direction(id, TextDirection::Rtl);
        tree.set_margin(
            id,
            Margin {
                start: 5,
                end: 0,
                top: 0,
                bottom: 0,
            },
        );
        tree.set_halign(id, Align::Start);
        tree.size_allocate(id, Rect::new(0, 0, 100, 10));
        assert_eq!(tree.allocation(id), Rect::new(75, 0, 20, 10));
    }

    #[test]
    fn baseline_requires_support_and_baseline_alignment() {
        let mut tree = tree();
        let id = shown(&mut tree, Fixed(20, 10));
        tree.set_valign(id, Align::Baseline);
        tree.size_allocate_with_baseline(id, Rect::new(0, 0, 20, 10), 7);
        assert_eq!(tree.baseline(id), -1);
        assert_eq!(tree.allocated_baseline(id), 7);
    }

    #[test]
    fn unchanged_allocation_skips_the_class() {
        let mut tree = tree();
        let id = shown(&mut tree, Fixed(20, 10));
        let count = std::rc::Rc::new(std::cell::Cell::new(0));
        let seen = count.clone();
        tree.signals_mut(id)
            .unwrap()
            .size_allocate
            .connect(move |_, _| seen.set(seen.get() + 1));

        tree.size_allocate(id, Rect::new(0, 0, 30, 30));
        tree.size_allocate(id, Rect::new(0, 0, 30, 30));
        assert_eq!(count.get(), 1);
        tree.queue_allocate(id);
        tree.size_allocate(id, Rect::new(0, 0, 30, 30));
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn clip_grows_ancestors_sharing_the_window() {
        let mut tree = tree();
        let outer = tree.create(BoxContainer::new(Orientation::Vertical));
        let inner = tree.create(BoxContainer::new(Orientation::Vertical));
        tree.container_add(outer, inner);
        tree.set_clip(outer, Rect::new(0, 0, 10, 10));
        tree.set_clip(inner, Rect::new(0, 0, 10, 10));
        tree.set_clip(inner, Rect::new(5, 5, 20, 20));
        assert_eq!(tree.clip(outer), Rect::new(0, 0, 25, 25));
    }

    #[test]
    fn containers_expand_when_a_child_does() {
        let mut tree = tree();
        let column = tree.create(BoxContainer::new(Orientation::Vertical));
        let child = tree.create(Fixed(1, 1));
        tree.container_add(column, child);
        tree.show_all(column);
        assert!(!tree.compute_expand(column, Orientation::Horizontal));

        tree.set_hexpand(child, true);
        assert!(tree.compute_expand(column, Orientation::Horizontal));
        assert!(!tree.compute_expand(column, Orientation::Vertical));

        tree.set_hexpand(column, false);
        assert!(!tree.compute_expand(column, Orientation::Horizontal));
        tree.set_hexpand_set(column, false);
        assert!(tree.compute_expand(column, Orientation::Horizontal));
    }
}
