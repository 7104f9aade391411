//! The display-side abstraction consumed by the widget core.
//!
//! A [`Display`] owns native windows and hands out drawing contexts while a
//! frame is painted. The widget core never talks to a windowing system
//! directly; a platform backend implements this trait, and
//! [`HeadlessDisplay`] implements it in memory for tests and offscreen use.

mod headless;

pub use headless::{DrawOp, HeadlessDisplay, HeadlessWindow, PaintRecord};

use slotmap::new_key_type;
use trellis_core::{Point, Rect};

use crate::error::DisplayError;
use crate::widget::{DeviceId, EventMask};

new_key_type! {
    /// Identifier of a backend window.
    pub struct NativeWindowId;
}

/// Whether a native window is a toplevel or lives inside another window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    /// A toplevel window managed by the window system.
    Toplevel,
    /// A child window positioned inside its parent.
    Child,
}

/// Parameters for [`Display::create_window`].
#[derive(Debug, Clone, PartialEq)]
pub struct WindowAttributes {
    /// Toplevel or child.
    pub kind: WindowKind,
    /// Parent window for child windows.
    pub parent: Option<NativeWindowId>,
    /// Position and size, in parent window coordinates.
    pub rect: Rect,
    /// Events the window should report.
    pub event_mask: EventMask,
    /// Title for toplevels.
    pub title: Option<String>,
}

impl WindowAttributes {
    /// Attributes for a toplevel window.
    pub fn toplevel(rect: Rect, event_mask: EventMask) -> Self {
        Self {
            kind: WindowKind::Toplevel,
            parent: None,
            rect,
            event_mask,
            title: None,
        }
    }

    /// Attributes for a child window.
    pub fn child(parent: Option<NativeWindowId>, rect: Rect, event_mask: EventMask) -> Self {
        Self {
            kind: WindowKind::Child,
            parent,
            rect,
            event_mask,
            title: None,
        }
    }
}

/// Compositing operator used while painting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operator {
    /// Draw over existing content.
    #[default]
    Over,
    /// Replace existing content.
    Source,
    /// Clear to transparent.
    Clear,
}

/// The paint target handed to widgets during `draw`.
///
/// Owned by the backend for the duration of one frame. Coordinates are in
/// the current user space, which the render driver translates so that the
/// origin is the top-left corner of the widget being drawn.
pub trait DrawingContext {
    /// Push the current state.
    fn save(&mut self);
    /// Pop the last pushed state.
    fn restore(&mut self);
    /// Translate user space.
    fn translate(&mut self, dx: i32, dy: i32);
    /// Intersect the clip with a rectangle.
    fn clip_rect(&mut self, rect: Rect);
    /// Set the compositing operator.
    fn set_operator(&mut self, operator: Operator);
    /// Redirect drawing into an intermediate group.
    fn push_group(&mut self);
    /// End the group and make it the current source.
    fn pop_group_to_source(&mut self);
    /// Paint the current source with the given alpha.
    fn paint_with_alpha(&mut self, alpha: f64);
    /// Fill a rectangle with a packed `0xRRGGBBAA` color.
    fn fill_rect(&mut self, rect: Rect, rgba: u32);
}

/// Backend window-system surface.
///
/// All calls happen on the main thread.
pub trait Display {
    /// Create a native window.
    fn create_window(&mut self, attributes: &WindowAttributes)
    -> Result<NativeWindowId, DisplayError>;
    /// Destroy a native window and its child windows.
    fn destroy_window(&mut self, window: NativeWindowId);
    /// Make a window visible.
    fn show_window(&mut self, window: NativeWindowId);
    /// Hide a window.
    fn hide_window(&mut self, window: NativeWindowId);
    /// Move and resize a window within its parent.
    fn move_resize(&mut self, window: NativeWindowId, rect: Rect);
    /// Move a window under a new parent window.
    fn reparent_window(&mut self, window: NativeWindowId, new_parent: NativeWindowId, at: Point);
    /// Mark a region of a window as needing repaint.
    fn invalidate(&mut self, window: NativeWindowId, rect: Rect);
    /// Set the core event mask of a window.
    fn set_event_mask(&mut self, window: NativeWindowId, mask: EventMask);
    /// Set a per-device event mask of a window.
    fn set_device_events(&mut self, window: NativeWindowId, device: DeviceId, mask: EventMask);
    /// Enable or disable delivery of a device's events to a window.
    fn set_device_enabled(&mut self, window: NativeWindowId, device: DeviceId, enabled: bool);
    /// Restrict the visible shape of a window. `None` clears it.
    fn shape_combine(&mut self, window: NativeWindowId, shape: Option<Rect>);
    /// Restrict the input shape of a window. `None` clears it.
    fn input_shape_combine(&mut self, window: NativeWindowId, shape: Option<Rect>);
    /// Set window opacity in `0.0..=1.0`.
    fn set_opacity(&mut self, window: NativeWindowId, opacity: f64);
    /// Integer scale factor of the monitor showing the window.
    fn scale_factor(&self, window: NativeWindowId) -> i32;
    /// Whether the window and all its ancestors are shown.
    fn is_viewable(&self, window: NativeWindowId) -> bool;
    /// Window and position currently under a pointing device.
    fn device_position(&self, device: DeviceId) -> Option<(NativeWindowId, Point)>;
    /// Begin painting a region of a window.
    fn begin_paint(
        &mut self,
        window: NativeWindowId,
        region: Rect,
    ) -> Result<Box<dyn DrawingContext>, DisplayError>;
    /// Finish painting a window.
    fn end_paint(
        &mut self,
        window: NativeWindowId,
        context: Box<dyn DrawingContext>,
    ) -> Result<(), DisplayError>;
    /// Ask for a frame to be scheduled for the toplevel owning `window`.
    fn request_frame(&mut self, window: NativeWindowId);
    /// Ring the bell.
    fn beep(&mut self, window: Option<NativeWindowId>);
}
