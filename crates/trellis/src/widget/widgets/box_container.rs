//! Box container: packs children in a row or a column.
//!
//! Space along the main axis is handed out in three steps:
//!
//! 1. every visible child gets its minimum size;
//! 2. what is left brings children toward their natural size, smallest
//!    shortfall first so that small children are satisfied completely;
//! 3. any remainder is split evenly between children that expand.
//!
//! In homogeneous mode every child gets the same share instead. Children
//! of a horizontal box whose `valign` is [`Align::Baseline`] are lined up
//! on a common baseline.

use trellis_core::Rect;

use crate::error::WidgetError;
use crate::widget::accessibility::AccessibleRole;
use crate::widget::geometry::{Align, Measurement, Orientation, SizeRequestMode, TextDirection};
use crate::widget::properties::parse_bool;
use crate::widget::traits::Widget;
use crate::widget::{WidgetId, WidgetTree};

/// Where a baseline-aligned row sits when the box is taller than the row
/// needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BaselinePosition {
    /// At the top.
    Top,
    /// Centered.
    #[default]
    Center,
    /// At the bottom.
    Bottom,
}

impl BaselinePosition {
    /// Baseline offset for a row with `above` pixels over the baseline and
    /// `below` under it, placed in `size` pixels.
    fn place(self, above: i32, below: i32, size: i32) -> i32 {
        match self {
            Self::Top => above,
            Self::Center => above + (size - (above + below)).max(0) / 2,
            Self::Bottom => size - below,
        }
    }
}

/// A no-window container laying out children along one axis.
#[derive(Debug, Clone)]
pub struct BoxContainer {
    orientation: Orientation,
    spacing: i32,
    homogeneous: bool,
    baseline_position: BaselinePosition,
}

impl Default for BoxContainer {
    fn default() -> Self {
        Self::new(Orientation::Horizontal)
    }
}

#[derive(Debug, Clone, Copy)]
struct ChildRequest {
    id: WidgetId,
    minimum: i32,
    natural: i32,
    expand: bool,
}

impl BoxContainer {
    /// Create an empty box.
    pub fn new(orientation: Orientation) -> Self {
        Self {
            orientation,
            spacing: 0,
            homogeneous: false,
            baseline_position: BaselinePosition::default(),
        }
    }

    /// Set the spacing using builder pattern.
    pub fn with_spacing(mut self, spacing: i32) -> Self {
        self.spacing = spacing.max(0);
        self
    }

    /// Set homogeneous mode using builder pattern.
    pub fn with_homogeneous(mut self, homogeneous: bool) -> Self {
        self.homogeneous = homogeneous;
        self
    }

    /// Packing axis.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Gap between adjacent children.
    pub fn spacing(&self) -> i32 {
        self.spacing
    }

    /// Whether every child gets the same size.
    pub fn is_homogeneous(&self) -> bool {
        self.homogeneous
    }

    /// Placement of a baseline-aligned row.
    pub fn baseline_position(&self) -> BaselinePosition {
        self.baseline_position
    }

    /// Change the packing axis of a box in the tree.
    pub fn set_orientation(tree: &mut WidgetTree, id: WidgetId, orientation: Orientation) {
        Self::update(tree, id, "orientation", |b| {
            std::mem::replace(&mut b.orientation, orientation) != orientation
        });
    }

    /// Change the spacing of a box in the tree.
    pub fn set_spacing(tree: &mut WidgetTree, id: WidgetId, spacing: i32) {
        let spacing = spacing.max(0);
        Self::update(tree, id, "spacing", |b| std::mem::replace(&mut b.spacing, spacing) != spacing);
    }

    /// Change homogeneous mode of a box in the tree.
    pub fn set_homogeneous(tree: &mut WidgetTree, id: WidgetId, homogeneous: bool) {
        Self::update(tree, id, "homogeneous", |b| {
            std::mem::replace(&mut b.homogeneous, homogeneous) != homogeneous
        });
    }

    /// Change where a baseline-aligned row sits.
    pub fn set_baseline_position(tree: &mut WidgetTree, id: WidgetId, position: BaselinePosition) {
        Self::update(tree, id, "baseline-position", |b| {
            std::mem::replace(&mut b.baseline_position, position) != position
        });
    }

    fn update(
        tree: &mut WidgetTree,
        id: WidgetId,
        property: &'static str,
        apply: impl FnOnce(&mut BoxContainer) -> bool,
    ) {
        let changed = tree.class_mut::<BoxContainer>(id).is_some_and(apply);
        if changed {
            tree.notify(id, property);
            tree.queue_resize(id);
        }
    }

    fn visible_children(tree: &WidgetTree, id: WidgetId) -> Vec<WidgetId> {
        tree.children(id)
            .iter()
            .copied()
            .filter(|child| tree.is_visible(*child))
            .collect()
    }

    fn total_spacing(&self, count: usize) -> i32 {
        self.spacing * (count.saturating_sub(1) as i32)
    }

    fn requests(&self, tree: &mut WidgetTree, children: &[WidgetId], for_size: i32) -> Vec<ChildRequest> {
        children
            .iter()
            .map(|&child| {
                let m = tree.measure(child, self.orientation, for_size);
                ChildRequest {
                    id: child,
                    minimum: m.minimum,
                    natural: m.natural,
                    expand: tree.compute_expand(child, self.orientation),
                }
            })
            .collect()
    }

    /// Split `available` main-axis pixels between the children.
    fn distribute(&self, requests: &[ChildRequest], available: i32) -> Vec<i32> {
        let count = requests.len();
        if count == 0 {
            return Vec::new();
        }
        let available = (available - self.total_spacing(count)).max(0);

        if self.homogeneous {
            let share = available / count as i32;
            let remainder = (available % count as i32) as usize;
            return (0..count)
                .map(|i| share + i32::from(i < remainder))
                .collect();
        }

        let mut sizes: Vec<i32> = requests.iter().map(|r| r.minimum).collect();
        let mut extra = available - sizes.iter().sum::<i32>();
        if extra <= 0 {
            return sizes;
        }

        let mut order: Vec<usize> = (0..count).collect();
        order.sort_by_key(|&i| requests[i].natural - requests[i].minimum);
        let mut remaining = count as i32;
        for i in order {
            let gap = (requests[i].natural - requests[i].minimum).max(0);
            let glue = (extra + remaining - 1) / remaining;
            let given = glue.min(gap);
            sizes[i] += given;
            extra -= given;
            remaining -= 1;
        }

        let expanders = requests.iter().filter(|r| r.expand).count() as i32;
        if expanders > 0 && extra > 0 {
            let share = extra / expanders;
            let mut remainder = extra % expanders;
            for (size, request) in sizes.iter_mut().zip(requests) {
                if request.expand {
                    *size += share;
                    if remainder > 0 {
                        *size += 1;
                        remainder -= 1;
                    }
                }
            }
        }
        sizes
    }

    fn measure_main(&self, tree: &mut WidgetTree, children: &[WidgetId], for_size: i32) -> Measurement {
        let requests = self.requests(tree, children, for_size);
        let spacing = self.total_spacing(requests.len());
        if self.homogeneous {
            let count = requests.len() as i32;
            let minimum = requests.iter().map(|r| r.minimum).max().unwrap_or(0);
            let natural = requests.iter().map(|r| r.natural).max().unwrap_or(0);
            return Measurement::new(minimum * count + spacing, natural * count + spacing);
        }
        Measurement::new(
            requests.iter().map(|r| r.minimum).sum::<i32>() + spacing,
            requests.iter().map(|r| r.natural).sum::<i32>() + spacing,
        )
    }

    fn measure_cross(&self, tree: &mut WidgetTree, children: &[WidgetId], for_size: i32) -> Measurement {
        // a known main-axis size is split first so each child is measured
        // for the space it will actually get
        let child_sizes: Vec<i32> = if for_size >= 0 {
            let requests = self.requests(tree, children, -1);
            self.distribute(&requests, for_size)
        } else {
            vec![-1; children.len()]
        };

        let cross = self.orientation.opposite();
        let baseline_row = self.orientation == Orientation::Horizontal;
        let mut result = Measurement::default();
        let (mut min_above, mut min_below, mut nat_above, mut nat_below) = (-1, -1, -1, -1);

        for (&child, &size) in children.iter().zip(&child_sizes) {
            let m = tree.measure(child, cross, size);
            if baseline_row
                && tree.valign(child) == Align::Baseline
                && m.minimum_baseline >= 0
                && m.natural_baseline >= 0
            {
                min_above = min_above.max(m.minimum_baseline);
                min_below = min_below.max(m.minimum - m.minimum_baseline);
                nat_above = nat_above.max(m.natural_baseline);
                nat_below = nat_below.max(m.natural - m.natural_baseline);
            } else {
                result.minimum = result.minimum.max(m.minimum);
                result.natural = result.natural.max(m.natural);
            }
        }

        if min_above >= 0 {
            result.minimum = result.minimum.max(min_above + min_below);
            result.natural = result.natural.max(nat_above + nat_below);
            result.minimum_baseline = self.baseline_position.place(min_above, min_below, result.minimum);
            result.natural_baseline = self.baseline_position.place(nat_above, nat_below, result.natural);
        }
        result
    }

    /// Baseline for a horizontal row of the given sizes, relative to the
    /// top of the box, or `-1` if no child aligns on it.
    fn row_baseline(&self, tree: &mut WidgetTree, requests: &[ChildRequest], sizes: &[i32], height: i32) -> i32 {
        let (mut min_above, mut min_below, mut nat_above, mut nat_below) = (-1, -1, -1, -1);
        for (request, &width) in requests.iter().zip(sizes) {
            if tree.valign(request.id) != Align::Baseline {
                continue;
            }
            let m = tree.preferred_height_and_baseline_for_width(request.id, width);
            if m.minimum_baseline < 0 || m.natural_baseline < 0 {
                continue;
            }
            min_above = min_above.max(m.minimum_baseline);
            min_below = min_below.max(m.minimum - m.minimum_baseline);
            nat_above = nat_above.max(m.natural_baseline);
            nat_below = nat_below.max(m.natural - m.natural_baseline);
        }
        if min_above < 0 {
            return -1;
        }
        let (above, below) = if nat_above + nat_below <= height {
            (nat_above, nat_below)
        } else {
            (min_above, min_below)
        };
        self.baseline_position.place(above, below, height).clamp(0, height)
    }
}

impl Widget for BoxContainer {
    fn type_name(&self) -> &'static str {
        "BoxContainer"
    }

    fn is_container(&self) -> bool {
        true
    }

    fn request_mode(&self, tree: &WidgetTree, id: WidgetId) -> SizeRequestMode {
        tree.children(id)
            .iter()
            .filter(|child| tree.is_visible(**child))
            .map(|child| tree.request_mode(*child))
            .find(|mode| *mode != SizeRequestMode::ConstantSize)
            .unwrap_or(SizeRequestMode::ConstantSize)
    }

    fn measure(
        &mut self,
        tree: &mut WidgetTree,
        id: WidgetId,
        orientation: Orientation,
        for_size: i32,
    ) -> Measurement {
        let children = Self::visible_children(tree, id);
        if children.is_empty() {
            return Measurement::default();
        }
        if orientation == self.orientation {
            self.measure_main(tree, &children, for_size)
        } else {
            self.measure_cross(tree, &children, for_size)
        }
    }

    fn has_baseline_support(&self) -> bool {
        self.orientation == Orientation::Horizontal
    }

    fn size_allocate(&mut self, tree: &mut WidgetTree, id: WidgetId, allocation: Rect, baseline: i32) {
        tree.default_size_allocate(id, allocation);
        let children = Self::visible_children(tree, id);
        if children.is_empty() {
            return;
        }

        let (main_size, cross_size) = match self.orientation {
            Orientation::Horizontal => (allocation.width, allocation.height),
            Orientation::Vertical => (allocation.height, allocation.width),
        };
        let requests = self.requests(tree, &children, cross_size);
        let sizes = self.distribute(&requests, main_size);

        let baseline = match self.orientation {
            Orientation::Horizontal if baseline < 0 => {
                self.row_baseline(tree, &requests, &sizes, allocation.height)
            }
            Orientation::Horizontal => baseline,
            Orientation::Vertical => -1,
        };
        let mirrored =
            self.orientation == Orientation::Horizontal && tree.resolved_direction(id) == TextDirection::Rtl;

        let mut position = 0;
        for (request, size) in requests.iter().zip(sizes) {
            let rect = match self.orientation {
                Orientation::Horizontal => {
                    let x = if mirrored {
                        allocation.x + allocation.width - position - size
                    } else {
                        allocation.x + position
                    };
                    Rect::new(x, allocation.y, size, allocation.height)
                }
                Orientation::Vertical => {
                    Rect::new(allocation.x, allocation.y + position, allocation.width, size)
                }
            };
            tree.size_allocate_with_baseline(request.id, rect, baseline);
            position += size + self.spacing;
        }
    }

    fn set_class_property(
        &mut self,
        tree: &mut WidgetTree,
        id: WidgetId,
        name: &str,
        value: &str,
    ) -> Result<bool, WidgetError> {
        let invalid = || WidgetError::InvalidPropertyValue {
            property: name.to_owned(),
            value: value.to_owned(),
        };
        let text = value.trim().to_ascii_lowercase();
        match name {
            "orientation" => {
                self.orientation = match text.as_str() {
                    "horizontal" => Orientation::Horizontal,
                    "vertical" => Orientation::Vertical,
                    _ => return Err(invalid()),
                };
            }
            "spacing" => {
                self.spacing = text.parse::<i32>().map_err(|_| invalid())?.max(0);
            }
            "homogeneous" => {
                self.homogeneous = parse_bool(&text).ok_or_else(invalid)?;
            }
            "baseline-position" | "baseline_position" => {
                self.baseline_position = match text.as_str() {
                    "top" => BaselinePosition::Top,
                    "center" => BaselinePosition::Center,
                    "bottom" => BaselinePosition::Bottom,
                    _ => return Err(invalid()),
                };
            }
            _ => return Ok(false),
        }
        tree.queue_resize(id);
        Ok(true)
    }

    fn accessible_role(&self) -> AccessibleRole {
        AccessibleRole::Panel
    }
}

#[cfg(test)]
mod tests {
    use trellis_core::Settings;

    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::widget::widgets::Window;

    #[derive(Clone, Copy)]
    struct Fixed {
        width: (i32, i32),
        height: (i32, i32),
        baseline: i32,
    }

    impl Fixed {
        fn new(width: (i32, i32), height: (i32, i32)) -> Self {
            Self {
                width,
                height,
                baseline: -1,
            }
        }
    }

    impl Widget for Fixed {
        fn measure(&mut self, _: &mut WidgetTree, _: WidgetId, orientation: Orientation, _: i32) -> Measurement {
            match orientation {
                Orientation::Horizontal => Measurement::new(self.width.0, self.width.1),
                Orientation::Vertical if self.baseline >= 0 => {
                    Measurement::with_baselines(self.height.0, self.height.1, self.baseline, self.baseline)
                }
                Orientation::Vertical => Measurement::new(self.height.0, self.height.1),
            }
        }

        fn has_baseline_support(&self) -> bool {
            self.baseline >= 0
        }
    }

    fn packed(window: Window, container: BoxContainer, children: &[Fixed]) -> (WidgetTree, WidgetId, Vec<WidgetId>) {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        let window = tree.create(window);
        let container = tree.create(container);
        tree.container_add(window, container);
        let ids = children
            .iter()
            .map(|fixed| {
                let child = tree.create(*fixed);
                tree.container_add(container, child);
                child
            })
            .collect();
        (tree, container, ids)
    }

    #[test]
    fn natural_sizes_first_then_expanders() {
        let (mut tree, container, ids) = packed(
            Window::new().with_default_size(100, 20),
            BoxContainer::new(Orientation::Horizontal).with_spacing(4),
            &[Fixed::new((10, 20), (10, 10)), Fixed::new((10, 30), (10, 10))],
        );
        tree.set_hexpand(ids[1], true);
        let window = tree.parent(container).unwrap();
        tree.show_all(window);

        assert_eq!(tree.allocation(ids[0]), Rect::new(0, 0, 20, 20));
        assert_eq!(tree.allocation(ids[1]), Rect::new(24, 0, 76, 20));
        assert_eq!(tree.preferred_width(container), (24, 54));
    }

    #[test]
    fn shortfall_is_shared_smallest_gap_first() {
        let container = BoxContainer::new(Orientation::Horizontal);
        let request = |minimum, natural| ChildRequest {
            id: WidgetId::default(),
            minimum,
            natural,
            expand: false,
        };
        let requests = [request(0, 100), request(0, 10), request(0, 100)];
        assert_eq!(container.distribute(&requests, 70), vec![30, 10, 30]);
        assert_eq!(container.distribute(&requests, 36), vec![13, 10, 13]);
    }

    #[test]
    fn homogeneous_boxes_share_equally() {
        let (mut tree, container, ids) = packed(
            Window::new().with_default_size(50, 62),
            BoxContainer::new(Orientation::Vertical)
                .with_spacing(2)
                .with_homogeneous(true),
            &[
                Fixed::new((5, 5), (10, 10)),
                Fixed::new((5, 5), (5, 5)),
                Fixed::new((5, 5), (0, 0)),
            ],
        );
        let window = tree.parent(container).unwrap();
        tree.show_all(window);

        assert_eq!(tree.preferred_height(container), (34, 34));
        assert_eq!(tree.allocation(ids[0]), Rect::new(0, 0, 50, 20));
        assert_eq!(tree.allocation(ids[1]), Rect::new(0, 22, 50, 19));
        assert_eq!(tree.allocation(ids[2]), Rect::new(0, 43, 50, 19));
    }

    #[test]
    fn right_to_left_rows_are_mirrored() {
        let (mut tree, container, ids) = packed(
            Window::new().with_default_size(100, 20),
            BoxContainer::new(Orientation::Horizontal).with_spacing(4),
            &[Fixed::new((20, 20), (10, 10)), Fixed::new((10, 10), (10, 10))],
        );
        tree.set_hexpand(ids[1], true);
        tree.set_direction(container, TextDirection::Rtl);
        let window = tree.parent(container).unwrap();
        tree.show_all(window);

        assert_eq!(tree.allocation(ids[0]), Rect::new(80, 0, 20, 20));
        assert_eq!(tree.allocation(ids[1]), Rect::new(0, 0, 76, 20));
    }

    #[test]
    fn baseline_children_share_one_baseline() {
        let small = Fixed {
            baseline: 5,
            ..Fixed::new((10, 10), (10, 10))
        };
        let tall = Fixed {
            baseline: 12,
            ..Fixed::new((10, 10), (20, 20))
        };
        let (mut tree, container, ids) = packed(
            Window::new().with_default_size(100, 40),
            BoxContainer::new(Orientation::Horizontal),
            &[small, tall],
        );
        for id in &ids {
            tree.set_valign(*id, Align::Baseline);
        }
        let window = tree.parent(container).unwrap();
        tree.show_all(window);

        let row = tree.measure(container, Orientation::Vertical, -1);
        assert_eq!((row.minimum, row.natural), (20, 20));
        assert_eq!(row.natural_baseline, 12);
        assert_eq!(tree.baseline(ids[0]), 22);
        assert_eq!(tree.baseline(ids[1]), 22);
    }

    #[test]
    fn builder_strings_configure_the_box() {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        let container = tree.create(BoxContainer::default());
        tree.set_property_from_str(container, "orientation", "Vertical")
            .unwrap();
        tree.set_property_from_str(container, "spacing", "6").unwrap();
        tree.set_property_from_str(container, "homogeneous", "yes").unwrap();
        assert!(matches!(
            tree.set_property_from_str(container, "spacing", "wide"),
            Err(WidgetError::InvalidPropertyValue { .. })
        ));

        let config = tree.class::<BoxContainer>(container).unwrap();
        assert_eq!(config.orientation(), Orientation::Vertical);
        assert_eq!(config.spacing(), 6);
        assert!(config.is_homogeneous());

        BoxContainer::set_spacing(&mut tree, container, -3);
        assert_eq!(tree.class::<BoxContainer>(container).unwrap().spacing(), 0);
    }
}
