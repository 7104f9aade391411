//! Toplevel window widget.

use trellis_core::logging::targets;
use trellis_core::{Rect, Size};

use crate::display::WindowAttributes;
use crate::error::{DisplayError, WidgetError};
use crate::widget::accessibility::AccessibleRole;
use crate::widget::events::{Event, EventKind, Propagation};
use crate::widget::flags::EventMask;
use crate::widget::geometry::{Measurement, Orientation};
use crate::widget::navigation::DirectionType;
use crate::widget::traits::Widget;
use crate::widget::{WidgetId, WidgetTree};

/// A toplevel window holding at most one child.
///
/// The window owns a native window and a frame clock once realized, and is
/// the resize root of everything inside it. Its size is the default size
/// when one is set, the size the window system last configured, or the
/// natural size of its content, never below the minimum request.
///
/// # Example
///
/// ```ignore
/// let window = tree.create(Window::new().with_title("Settings").with_default_size(640, 480));
/// tree.container_add(window, content);
/// tree.show_all(window);
/// ```
#[derive(Debug, Default)]
pub struct Window {
    title: Option<String>,
    default_width: i32,
    default_height: i32,
    configured: Option<Size>,
}

impl Window {
    /// Create an untitled window sized to its content.
    pub fn new() -> Self {
        Self {
            title: None,
            default_width: -1,
            default_height: -1,
            configured: None,
        }
    }

    /// Set the title using builder pattern.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the default size using builder pattern.
    pub fn with_default_size(mut self, width: i32, height: i32) -> Self {
        self.default_width = width;
        self.default_height = height;
        self
    }

    /// The window title.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The default size. `-1` on an axis means "use the natural size".
    pub fn default_size(&self) -> (i32, i32) {
        (self.default_width, self.default_height)
    }

    /// The single child, if any.
    pub fn child(tree: &WidgetTree, id: WidgetId) -> Option<WidgetId> {
        tree.children(id).first().copied()
    }

    /// Change the default size of a window in the tree and relayout it.
    pub fn set_default_size(tree: &mut WidgetTree, id: WidgetId, width: i32, height: i32) {
        let Some(window) = tree.class_mut::<Window>(id) else {
            return;
        };
        if (window.default_width, window.default_height) == (width, height) {
            return;
        }
        window.default_width = width;
        window.default_height = height;
        // an explicit size replaces whatever the window system reported
        window.configured = None;
        tree.notify(id, "default-size");
        tree.queue_resize(id);
    }

    fn target_size(&self, minimum: Size, natural: Size) -> Size {
        let pick = |default: i32, configured: Option<i32>, natural: i32| {
            if default > 0 {
                default
            } else {
                configured.unwrap_or(natural)
            }
        };
        let width = pick(
            self.default_width,
            self.configured.map(|s| s.width),
            natural.width,
        );
        let height = pick(
            self.default_height,
            self.configured.map(|s| s.height),
            natural.height,
        );
        Size::new(width.max(minimum.width), height.max(minimum.height))
    }
}

impl Widget for Window {
    fn type_name(&self) -> &'static str {
        "Window"
    }

    fn init(&mut self, tree: &mut WidgetTree, id: WidgetId) {
        tree.make_toplevel(id);
        tree.set_has_window(id, true);
        tree.add_events(id, EventMask::ALL_INPUT | EventMask::STRUCTURE);
    }

    fn is_container(&self) -> bool {
        true
    }

    fn accepts_child(&self, tree: &WidgetTree, id: WidgetId, _child: WidgetId) -> Result<(), WidgetError> {
        if tree.children(id).is_empty() {
            Ok(())
        } else {
            Err(WidgetError::ContainerFull { container: "Window" })
        }
    }

    fn measure(
        &mut self,
        tree: &mut WidgetTree,
        id: WidgetId,
        orientation: Orientation,
        for_size: i32,
    ) -> Measurement {
        match Window::child(tree, id) {
            Some(child) => {
                let m = tree.measure(child, orientation, for_size);
                Measurement::new(m.minimum, m.natural)
            }
            None => Measurement::default(),
        }
    }

    fn size_allocate(&mut self, tree: &mut WidgetTree, id: WidgetId, allocation: Rect, _baseline: i32) {
        tree.default_size_allocate(id, allocation);
        if let Some(child) = Window::child(tree, id) {
            // children live in the window's own coordinate space
            tree.size_allocate(child, Rect::new(0, 0, allocation.width, allocation.height));
        }
    }

    fn realize(&mut self, tree: &mut WidgetTree, id: WidgetId) -> Result<(), DisplayError> {
        let size = tree.allocation(id).size();
        let mask = tree.events(id) | EventMask::EXPOSURE | EventMask::STRUCTURE;
        let mut attributes =
            WindowAttributes::toplevel(Rect::new(0, 0, size.width.max(1), size.height.max(1)), mask);
        attributes.title = self.title.clone();
        tree.realize_with_attributes(id, &attributes)
    }

    fn event(&mut self, tree: &mut WidgetTree, id: WidgetId, event: &Event) -> Propagation {
        match &event.kind {
            EventKind::Configure(rect) => {
                // a configure may follow a move to a monitor with another scale
                tree.update_scale(id);
                if rect.size() != tree.allocation(id).size() {
                    tracing::debug!(target: targets::LAYOUT, width = rect.width, height = rect.height, "window configured");
                    self.configured = Some(rect.size());
                    tree.queue_resize(id);
                }
                Propagation::Proceed
            }
            EventKind::Delete => {
                tree.hide(id);
                Propagation::Stop
            }
            EventKind::KeyPress(key) => match DirectionType::from_key(key.keyval, event.state) {
                Some(direction) => {
                    tree.move_focus(id, direction);
                    Propagation::Stop
                }
                None => Propagation::Proceed,
            },
            _ => Propagation::Proceed,
        }
    }

    fn resize_root_allocation(
        &mut self,
        _tree: &mut WidgetTree,
        _id: WidgetId,
        minimum: Size,
        natural: Size,
    ) -> Rect {
        let size = self.target_size(minimum, natural);
        Rect::new(0, 0, size.width, size.height)
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
        match name {
            "title" => {
                self.title = Some(value.to_owned());
            }
            "default-width" | "default_width" => {
                self.default_width = value.trim().parse().map_err(|_| invalid())?;
                tree.queue_resize(id);
            }
            "default-height" | "default_height" => {
                self.default_height = value.trim().parse().map_err(|_| invalid())?;
                tree.queue_resize(id);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn accessible_role(&self) -> AccessibleRole {
        AccessibleRole::Window
    }
}

#[cfg(test)]
mod tests {
    use trellis_core::Settings;

    use super::*;
    use crate::display::HeadlessDisplay;

    struct Swatch;

    impl Widget for Swatch {
        fn measure(&mut self, _: &mut WidgetTree, _: WidgetId, _: Orientation, _: i32) -> Measurement {
            Measurement::new(10, 40)
        }
    }

    fn window_with_swatch(window: Window) -> (WidgetTree, HeadlessDisplay, WidgetId, WidgetId) {
        let display = HeadlessDisplay::new();
        let mut tree = WidgetTree::new(Box::new(display.clone()), Settings::default());
        let window = tree.create(window);
        let swatch = tree.create(Swatch);
        tree.container_add(window, swatch);
        tree.show_all(window);
        (tree, display, window, swatch)
    }

    #[test]
    fn windows_size_to_their_content() {
        let (tree, display, window, swatch) = window_with_swatch(Window::new().with_title("Main"));
        assert!(tree.is_toplevel(window));
        assert!(tree.is_mapped(swatch));
        assert_eq!(tree.allocation(window), Rect::new(0, 0, 40, 40));
        assert_eq!(tree.allocation(swatch), Rect::new(0, 0, 40, 40));

        let native = display.window(tree.window(window).unwrap()).unwrap();
        assert_eq!(native.title.as_deref(), Some("Main"));
        assert!(native.event_mask.contains(EventMask::KEY_PRESS | EventMask::BUTTON_PRESS));
        assert_eq!(tree.window(swatch), tree.window(window));
    }

    #[test]
    fn default_size_wins_over_content_but_not_minimum() {
        let (mut tree, _, window, swatch) = window_with_swatch(Window::new().with_default_size(100, 5));
        assert_eq!(tree.allocation(window), Rect::new(0, 0, 100, 10));

        Window::set_default_size(&mut tree, window, 60, 60);
        let clock = tree.frame_clock(window).unwrap();
        tree.run_frame(clock, 16_000);
        assert_eq!(tree.allocation(swatch), Rect::new(0, 0, 60, 60));
        assert_eq!(tree.class::<Window>(window).unwrap().default_size(), (60, 60));
    }

    #[test]
    fn windows_hold_one_child() {
        let (mut tree, _, window, _) = window_with_swatch(Window::new());
        let extra = tree.create(Swatch);
        tree.container_add(window, extra);
        assert_eq!(tree.parent(extra), None);
        assert_eq!(tree.children(window).len(), 1);
    }

    #[test]
    fn configure_resizes_and_delete_hides() {
        let (mut tree, _, window, swatch) = window_with_swatch(Window::new());
        let native = tree.window(window).unwrap();
        tree.dispatch_event(&Event::new(EventKind::Configure(Rect::new(0, 0, 200, 120))).with_window(native));
        let clock = tree.frame_clock(window).unwrap();
        tree.run_frame(clock, 16_000);
        assert_eq!(tree.allocation(swatch), Rect::new(0, 0, 200, 120));

        tree.dispatch_event(&Event::new(EventKind::Delete).with_window(native));
        assert!(!tree.is_visible(window));
        assert!(!tree.is_mapped(swatch));
    }
}
