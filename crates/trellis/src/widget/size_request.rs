//! Size requests: the measuring half of two-pass layout.
//!
//! Requests are memoized per widget in a [`SizeRequestCache`] keyed by
//! orientation and for-size. `queue_resize` clears the cache; the first
//! measurement after a resize request also clears it, so a widget whose
//! resize flag is set never answers from stale entries.

use trellis_core::Size;
use trellis_core::logging::targets;

use super::flags::WidgetFlags;
use super::geometry::{AxisAllocation, Measurement, Orientation, SizeRequestMode};
use super::{WidgetId, WidgetTree};

/// Number of for-size entries kept per orientation, besides the
/// unconstrained one.
const CACHED_SIZES: usize = 5;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    for_size: i32,
    measurement: Measurement,
}

#[derive(Debug, Clone, Default)]
struct AxisCache {
    unconstrained: Option<Measurement>,
    /// Most recently used first.
    sized: Vec<CacheEntry>,
}

impl AxisCache {
    fn lookup(&mut self, for_size: i32) -> Option<Measurement> {
        if for_size < 0 {
            return self.unconstrained;
        }
        let index = self.sized.iter().position(|e| e.for_size == for_size)?;
        let entry = self.sized.remove(index);
        self.sized.insert(0, entry);
        Some(entry.measurement)
    }

    fn insert(&mut self, for_size: i32, measurement: Measurement) {
        if for_size < 0 {
            self.unconstrained = Some(measurement);
            return;
        }
        self.sized.retain(|e| e.for_size != for_size);
        self.sized.insert(
            0,
            CacheEntry {
                for_size,
                measurement,
            },
        );
        self.sized.truncate(CACHED_SIZES);
    }
}

/// Memoized requests of one widget.
#[derive(Debug, Clone, Default)]
pub(crate) struct SizeRequestCache {
    horizontal: AxisCache,
    vertical: AxisCache,
}

impl SizeRequestCache {
    fn axis(&mut self, orientation: Orientation) -> &mut AxisCache {
        match orientation {
            Orientation::Horizontal => &mut self.horizontal,
            Orientation::Vertical => &mut self.vertical,
        }
    }

    pub(crate) fn lookup(&mut self, orientation: Orientation, for_size: i32) -> Option<Measurement> {
        self.axis(orientation).lookup(for_size)
    }

    pub(crate) fn insert(&mut self, orientation: Orientation, for_size: i32, measurement: Measurement) {
        self.axis(orientation).insert(for_size, measurement);
    }

    pub(crate) fn clear(&mut self) {
        self.horizontal = AxisCache::default();
        self.vertical = AxisCache::default();
    }
}

impl WidgetTree {
    /// Which axis the widget negotiates first.
    pub fn request_mode(&self, id: WidgetId) -> SizeRequestMode {
        self.nodes
            .get(id)
            .and_then(|n| n.class.as_deref())
            .map_or(SizeRequestMode::ConstantSize, |class| {
                class.request_mode(self, id)
            })
    }

    /// Measure one axis, margins included.
    ///
    /// Invisible non-toplevel widgets measure as zero. Members of size
    /// groups report the maximum over their coupled peers.
    #[tracing::instrument(skip_all, level = "trace")]
    pub fn measure(&mut self, id: WidgetId, orientation: Orientation, for_size: i32) -> Measurement {
        let Some(node) = self.nodes.get(id) else {
            return Measurement::default();
        };
        if !node.has(WidgetFlags::VISIBLE) && !node.is_toplevel() {
            return Measurement::default();
        }
        if node.size_groups.is_empty() {
            return self.compute_size(id, orientation, for_size);
        }

        let own = self.compute_size(id, orientation, for_size);
        let peers = self.size_group_peers(id, orientation);
        if peers.len() <= 1 {
            return own;
        }
        let mut result = own;
        for peer in peers {
            if peer == id {
                continue;
            }
            let other = self.compute_size(peer, orientation, for_size);
            result.minimum = result.minimum.max(other.minimum);
            result.natural = result.natural.max(other.natural);
        }
        result
    }

    /// Measure without size group coupling, consulting the cache.
    pub(crate) fn compute_size(
        &mut self,
        id: WidgetId,
        orientation: Orientation,
        for_size: i32,
    ) -> Measurement {
        let mode = self.request_mode(id);
        let for_size = match (mode, orientation) {
            (SizeRequestMode::ConstantSize, _)
            | (SizeRequestMode::HeightForWidth, Orientation::Horizontal)
            | (SizeRequestMode::WidthForHeight, Orientation::Vertical) => -1,
            _ => for_size,
        };

        let Some(node) = self.nodes.get_mut(id) else {
            return Measurement::default();
        };
        if node.has(WidgetFlags::RESIZE_NEEDED) {
            node.request_cache.clear();
            node.set(WidgetFlags::RESIZE_NEEDED, false);
        }
        if let Some(cached) = node.request_cache.lookup(orientation, for_size) {
            return cached;
        }
        let type_name = node.type_name;

        // the other axis loses its margins and alignment before it
        // constrains this one
        let mut adjusted_for = for_size;
        if for_size >= 0 {
            let other = orientation.opposite();
            let other_request = self.compute_size(id, other, -1);
            let mut axis = AxisAllocation {
                minimum: other_request.minimum,
                natural: other_request.natural,
                position: 0,
                size: for_size,
            };
            if self
                .with_class(id, |class, tree| {
                    class.adjust_size_allocation(tree, id, other, &mut axis)
                })
                .is_none()
            {
                self.default_adjust_size_allocation(id, other, &mut axis);
            }
            adjusted_for = axis.size;
        }

        let (raw, baseline_support) = self
            .with_class(id, |class, tree| {
                let raw = class.measure(tree, id, orientation, adjusted_for);
                (raw, class.has_baseline_support())
            })
            .unwrap_or_default();

        let mut measurement = raw;
        if measurement.minimum < 0 || measurement.natural < measurement.minimum {
            tracing::warn!(
                target: targets::LAYOUT,
                widget = type_name,
                ?orientation,
                minimum = raw.minimum,
                natural = raw.natural,
                "natural size must be >= minimum size"
            );
            measurement.minimum = measurement.minimum.max(0);
            measurement.natural = measurement.natural.max(measurement.minimum);
        }
        if orientation == Orientation::Horizontal || !baseline_support {
            measurement.minimum_baseline = -1;
            measurement.natural_baseline = -1;
        } else if measurement.has_baseline()
            && (measurement.minimum_baseline > measurement.minimum
                || measurement.natural_baseline > measurement.natural)
        {
            tracing::warn!(
                target: targets::LAYOUT,
                widget = type_name,
                "baseline lies outside the reported height"
            );
            measurement.minimum_baseline = measurement.minimum_baseline.min(measurement.minimum);
            measurement.natural_baseline = measurement.natural_baseline.min(measurement.natural);
        }

        if self
            .with_class(id, |class, tree| {
                class.adjust_size_request(tree, id, orientation, &mut measurement)
            })
            .is_none()
        {
            self.default_adjust_size_request(id, orientation, &mut measurement);
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.request_cache.insert(orientation, for_size, measurement);
        }
        measurement
    }

    /// Base class request adjustment: apply the size request override and
    /// add margins.
    pub fn default_adjust_size_request(
        &self,
        id: WidgetId,
        orientation: Orientation,
        measurement: &mut Measurement,
    ) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let requested = match orientation {
            Orientation::Horizontal => node.width_request,
            Orientation::Vertical => node.height_request,
        };
        if requested > 0 {
            measurement.minimum = measurement.minimum.max(requested);
        }
        measurement.natural = measurement.natural.max(measurement.minimum);

        let margins = node.margin.along(orientation);
        measurement.minimum += margins;
        measurement.natural += margins;

        if orientation == Orientation::Vertical {
            if node.height_request >= 0 {
                measurement.minimum_baseline = -1;
                measurement.natural_baseline = -1;
            } else {
                if measurement.minimum_baseline >= 0 {
                    measurement.minimum_baseline += node.margin.top;
                }
                if measurement.natural_baseline >= 0 {
                    measurement.natural_baseline += node.margin.top;
                }
            }
        }
    }

    /// `(minimum, natural)` width.
    pub fn preferred_width(&mut self, id: WidgetId) -> (i32, i32) {
        let m = self.measure(id, Orientation::Horizontal, -1);
        (m.minimum, m.natural)
    }

    /// `(minimum, natural)` height.
    pub fn preferred_height(&mut self, id: WidgetId) -> (i32, i32) {
        let m = self.measure(id, Orientation::Vertical, -1);
        (m.minimum, m.natural)
    }

    /// `(minimum, natural)` width for a given height.
    pub fn preferred_width_for_height(&mut self, id: WidgetId, height: i32) -> (i32, i32) {
        let m = self.measure(id, Orientation::Horizontal, height);
        (m.minimum, m.natural)
    }

    /// `(minimum, natural)` height for a given width.
    pub fn preferred_height_for_width(&mut self, id: WidgetId, width: i32) -> (i32, i32) {
        let m = self.measure(id, Orientation::Vertical, width);
        (m.minimum, m.natural)
    }

    /// Height request with baselines for a given width, `-1` for none.
    pub fn preferred_height_and_baseline_for_width(
        &mut self,
        id: WidgetId,
        width: i32,
    ) -> Measurement {
        self.measure(id, Orientation::Vertical, width)
    }

    /// Minimum and natural size, negotiated in the widget's request mode.
    pub fn preferred_size(&mut self, id: WidgetId) -> (Size, Size) {
        match self.request_mode(id) {
            SizeRequestMode::HeightForWidth | SizeRequestMode::ConstantSize => {
                let (min_width, nat_width) = self.preferred_width(id);
                let (min_height, _) = self.preferred_height_for_width(id, min_width);
                let (_, nat_height) = self.preferred_height_for_width(id, nat_width);
                (
                    Size::new(min_width, min_height),
                    Size::new(nat_width, nat_height),
                )
            }
            SizeRequestMode::WidthForHeight => {
                let (min_height, nat_height) = self.preferred_height(id);
                let (min_width, _) = self.preferred_width_for_height(id, min_height);
                let (_, nat_width) = self.preferred_width_for_height(id, nat_height);
                (
                    Size::new(min_width, min_height),
                    Size::new(nat_width, nat_height),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use trellis_core::Settings;

    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::widget::{Margin, Widget};

    struct Fixed {
        width: i32,
        height: i32,
        calls: Rc<Cell<u32>>,
    }

    impl Widget for Fixed {
        fn measure(&mut self, _: &mut WidgetTree, _: WidgetId, o: Orientation, _: i32) -> Measurement {
            self.calls.set(self.calls.get() + 1);
            match o {
                Orientation::Horizontal => Measurement::new(self.width, self.width * 2),
                Orientation::Vertical => Measurement::new(self.height, self.height),
            }
        }
    }

    /// Area-preserving widget: wraps like text.
    struct Wrapping;

    impl Widget for Wrapping {
        fn request_mode(&self, _: &WidgetTree, _: WidgetId) -> SizeRequestMode {
            SizeRequestMode::HeightForWidth
        }

        fn measure(&mut self, _: &mut WidgetTree, _: WidgetId, o: Orientation, for_size: i32) -> Measurement {
            match o {
                Orientation::Horizontal => Measurement::new(10, 100),
                Orientation::Vertical if for_size > 0 => {
                    let h = 1000 / for_size;
                    Measurement::new(h, h)
                }
                Orientation::Vertical => Measurement::new(100, 100),
            }
        }
    }

    fn tree() -> WidgetTree {
        WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default())
    }

    #[test]
    fn cache_keeps_most_recent_sizes() {
        let mut cache = SizeRequestCache::default();
        for size in 0..7 {
            cache.insert(Orientation::Vertical, size, Measurement::new(size, size));
        }
        assert!(cache.lookup(Orientation::Vertical, 0).is_none());
        assert!(cache.lookup(Orientation::Vertical, 1).is_none());
        assert_eq!(cache.lookup(Orientation::Vertical, 6), Some(Measurement::new(6, 6)));
        assert!(cache.lookup(Orientation::Horizontal, 6).is_none());

        cache.insert(Orientation::Vertical, -1, Measurement::new(1, 2));
        assert_eq!(cache.lookup(Orientation::Vertical, -1), Some(Measurement::new(1, 2)));
        cache.clear();
        assert!(cache.lookup(Orientation::Vertical, -1).is_none());
    }

    #[test]
    fn invisible_widgets_measure_zero() {
        let mut tree = tree();
        let calls = Rc::new(Cell::new(0));
        let id = tree.create(Fixed {
            width: 10,
            height: 5,
            calls: calls.clone(),
        });
        assert_eq!(tree.preferred_width(id), (0, 0));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn requests_are_cached_until_resize() {
        let mut tree = tree();
        let calls = Rc::new(Cell::new(0));
        let id = tree.create(Fixed {
            width: 10,
            height: 5,
            calls: calls.clone(),
        });
        tree.show(id);
        assert_eq!(tree.preferred_width(id), (10, 20));
        assert_eq!(tree.preferred_width(id), (10, 20));
        assert_eq!(calls.get(), 1);

        tree.queue_resize(id);
        assert_eq!(tree.preferred_width(id), (10, 20));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn margins_and_overrides_adjust_requests() {
        let mut tree = tree();
        let id = tree.create(Fixed {
            width: 10,
            height: 5,
            calls: Rc::default(),
        });
        tree.show(id);
        tree.set_margin(
            id,
            Margin {
                start: 1,
                end: 2,
                top: 3,
                bottom: 4,
            },
        );
        tree.set_size_request(id, 30, -1);

        assert_eq!(tree.preferred_width(id), (33, 33));
        assert_eq!(tree.preferred_height(id), (12, 12));
    }

    #[test]
    fn height_for_width_uses_adjusted_width() {
        let mut tree = tree();
        let id = tree.create(Wrapping);
        tree.show(id);
        tree.set_margin(id, Margin::uniform(5));

        // 110 wide leaves 100 for content
        assert_eq!(tree.preferred_height_for_width(id, 110), (20, 20));

        let (minimum, natural) = tree.preferred_size(id);
        assert_eq!(minimum.width, 20);
        assert_eq!(natural.width, 110);
        assert_eq!(natural.height, 20);
    }
}
