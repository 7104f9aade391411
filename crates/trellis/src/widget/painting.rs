//! Frame rendering and opacity.
//!
//! Damage accumulates per native window between frames. At paint time each
//! damaged window gets one drawing context from the backend. Unless the
//! window's owner is app-paintable, the damage is first filled with its
//! `background-color` style property. Widgets are then drawn in
//! depth-first preorder, parents before children:
//!
//! 1. user space is translated to the widget's allocation and clipped to
//!    its clip rectangle;
//! 2. widgets below full opacity draw into a group composited afterwards;
//! 3. `draw` signal handlers run, then the class `draw` unless a handler
//!    stopped it;
//! 4. children sharing the native window follow. Children with their own
//!    window are painted when that window is.

use trellis_core::logging::targets;
use trellis_core::{Point, Rect, signal};

use super::flags::WidgetFlags;
use super::style::StyleValue;
use super::traits::PaintContext;
use super::{WidgetId, WidgetTree};
use crate::display::{DrawingContext, NativeWindowId};

/// Result of painting one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Windows painted.
    pub windows_painted: u32,
    /// Widgets drawn.
    pub widgets_painted: u32,
    /// Widgets outside the damaged region.
    pub widgets_skipped: u32,
}

impl WidgetTree {
    // =========================================================================
    // Opacity
    // =========================================================================

    /// Opacity set on the widget, between 0 and 1.
    pub fn opacity(&self, id: WidgetId) -> f64 {
        self.nodes
            .get(id)
            .map_or(1.0, |n| f64::from(n.user_alpha) / 255.0)
    }

    /// Set the widget's opacity, clamped to 0..=1.
    ///
    /// The effective opacity also includes the `opacity` style property.
    pub fn set_opacity(&mut self, id: WidgetId, opacity: f64) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        if node.user_alpha == alpha {
            return;
        }
        node.user_alpha = alpha;
        self.update_alpha(id);
        self.notify(id, "opacity");
    }

    /// Recompute the effective alpha from user and style opacity.
    pub(crate) fn update_alpha(&mut self, id: WidgetId) {
        let style_opacity = self
            .style_property(id, "opacity")
            .and_then(|v| v.as_float())
            .unwrap_or(1.0)
            .clamp(0.0, 1.0);
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let alpha = (f64::from(node.user_alpha) * style_opacity).round() as u8;
        if node.alpha == alpha {
            return;
        }
        node.alpha = alpha;
        let own_window = node.has(WidgetFlags::REALIZED) && node.has_window();
        if let (true, Some(window)) = (own_window, node.window) {
            self.display.set_opacity(window, f64::from(alpha) / 255.0);
        }
        self.queue_draw(id);
    }

    /// Whether the application paints the widget's background itself.
    pub fn app_paintable(&self, id: WidgetId) -> bool {
        self.has_flags(id, WidgetFlags::APP_PAINTABLE)
    }

    /// Stop or resume filling the background of the widget's window.
    pub fn set_app_paintable(&mut self, id: WidgetId, app_paintable: bool) {
        if self.app_paintable(id) == app_paintable {
            return;
        }
        self.set_flags(id, WidgetFlags::APP_PAINTABLE, app_paintable);
        if self.is_drawable(id) {
            self.queue_draw(id);
        }
        self.notify(id, "app-paintable");
    }

    // =========================================================================
    // Painting
    // =========================================================================

    /// Paint every damaged window belonging to a toplevel.
    pub(crate) fn paint_toplevel(&mut self, toplevel: WidgetId) -> FrameStats {
        let mut windows: Vec<NativeWindowId> = self
            .damage
            .iter()
            .filter(|(_, d)| d.has_damage())
            .filter_map(|(w, _)| {
                let owner = self.window_owner(*w)?;
                (self.toplevel(owner) == Some(toplevel)).then_some(*w)
            })
            .collect();
        // parents before their child windows
        windows.sort_by_key(|w| {
            self.window_owner(*w)
                .map_or(0, |o| self.path_from_root(o).len())
        });
        let mut stats = FrameStats::default();
        for window in windows {
            self.paint_window_into(window, &mut stats);
        }
        stats
    }

    /// Paint one native window now if it has damage.
    pub fn paint_window(&mut self, window: NativeWindowId) -> FrameStats {
        let mut stats = FrameStats::default();
        self.paint_window_into(window, &mut stats);
        stats
    }

    fn paint_window_into(&mut self, window: NativeWindowId, stats: &mut FrameStats) {
        let Some(region) = self.damage.get_mut(&window).and_then(|d| d.take()) else {
            return;
        };
        let Some(owner) = self.window_owner(window) else {
            return;
        };
        let Some(node) = self.nodes.get(owner) else {
            return;
        };
        if !node.is_drawable() {
            return;
        }
        let type_name = node.type_name;
        let background = if node.has(WidgetFlags::APP_PAINTABLE) {
            None
        } else {
            match self.style_property(owner, "background-color") {
                Some(StyleValue::Color(color)) => Some(color),
                _ => None,
            }
        };
        let mut cr = match self.display.begin_paint(window, region) {
            Ok(cr) => cr,
            Err(err) => {
                tracing::error!(target: targets::BACKEND, widget = type_name, %err, "begin_paint failed, frame skipped");
                return;
            }
        };
        tracing::trace!(target: targets::FRAME, widget = type_name, ?region, "painting window");
        cr.save();
        cr.clip_rect(region);
        if let Some(color) = background {
            cr.fill_rect(region, color);
        }
        // the owner sits at the origin of its own window
        let origin = Point::ZERO;
        self.draw_widget(owner, window, origin, origin, region, cr.as_mut(), stats);
        cr.restore();
        if let Err(err) = self.display.end_paint(window, cr) {
            tracing::error!(target: targets::BACKEND, widget = type_name, %err, "end_paint failed");
        }
        stats.windows_painted += 1;
    }

    /// Draw a widget at `origin` in window coordinates, `current` being the
    /// translation already applied to `cr`.
    #[allow(clippy::too_many_arguments)]
    fn draw_widget(
        &mut self,
        id: WidgetId,
        window: NativeWindowId,
        origin: Point,
        current: Point,
        region: Rect,
        cr: &mut (dyn DrawingContext + 'static),
        stats: &mut FrameStats,
    ) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if !node.is_drawable() {
            return;
        }
        let allocation = node.allocation;
        let is_owner = node.window == Some(window) && node.has_window();
        let clip = if is_owner {
            Rect::from_origin_size(Point::ZERO, node.clip.size())
        } else {
            node.clip
        };
        if clip.intersect(&region).is_none() {
            stats.widgets_skipped += 1;
            return;
        }
        let alpha = node.alpha;
        let size = allocation.size();
        let children = node.children.clone();
        let slots = node.signals.draw.snapshot();

        cr.save();
        cr.translate(origin.x - current.x, origin.y - current.y);
        cr.clip_rect(clip.offset(-origin.x, -origin.y));
        let grouped = alpha < 255 && !is_owner;
        if grouped {
            cr.push_group();
        }

        let args = (id, size);
        let handled = signal::emit_until(&mut *cr, &slots, &args, |r| r.is_stop()).is_some();
        if !handled {
            self.with_class(id, |class, tree| {
                let mut cx = PaintContext::new(&mut *cr, size);
                class.draw(tree, id, &mut cx)
            });
        }
        stats.widgets_painted += 1;

        for child in children {
            let Some(node) = self.nodes.get(child) else {
                continue;
            };
            if node.window != Some(window) || node.has_window() {
                continue;
            }
            let child_origin = node.allocation.origin();
            self.draw_widget(child, window, child_origin, origin, region, cr, stats);
        }

        if grouped {
            cr.pop_group_to_source();
            cr.paint_with_alpha(f64::from(alpha) / 255.0);
        }
        cr.restore();
    }
}
