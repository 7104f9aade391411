//! Core widget trait definitions.
//!
//! This module defines the [`Widget`] trait: the per-class behaviour a
//! concrete widget plugs into the core. Instance state shared by every
//! widget (flags, geometry, state, controllers) lives in the
//! [`WidgetTree`] arena; the trait object only holds what the class adds.
//!
//! Every method has a default that behaves like a plain leaf widget. Class
//! implementations that override a method and still want the base
//! behaviour call the matching `WidgetTree::default_*` method, which is the
//! equivalent of chaining up to the parent class.
//!
//! While a class method runs, the trait object is borrowed out of the tree.
//! A re-entrant call that would need the same object again (for example a
//! `measure` that asks for its own preferred size) gets the default
//! behaviour instead.

use std::any::Any;

use trellis_core::{Rect, Size};

use super::accessibility::{AccessibleError, AccessiblePeer, AccessibleRole};
use super::events::{Event, Propagation};
use super::geometry::{AxisAllocation, Measurement, Orientation, SizeRequestMode, TextDirection};
use super::navigation::DirectionType;
use super::{WidgetId, WidgetTree};
use crate::display::DrawingContext;
use crate::error::{DisplayError, WidgetError};

/// Downcasting support for widget and controller trait objects.
pub trait AsAny: Any {
    /// Borrow as `Any`.
    fn as_any(&self) -> &dyn Any;
    /// Mutably borrow as `Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Context provided while a widget draws.
///
/// User space is translated so that `(0, 0)` is the widget's top-left
/// corner and clipped to the widget's clip rectangle.
pub struct PaintContext<'a> {
    cr: &'a mut (dyn DrawingContext + 'static),
    size: Size,
}

impl<'a> PaintContext<'a> {
    /// Wrap a drawing context for a widget of the given size.
    pub fn new(cr: &'a mut (dyn DrawingContext + 'static), size: Size) -> Self {
        Self { cr, size }
    }

    /// The backend drawing context.
    #[inline]
    pub fn cr(&mut self) -> &mut (dyn DrawingContext + 'static) {
        self.cr
    }

    /// The widget's local rectangle.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_origin_size(trellis_core::Point::ZERO, self.size)
    }

    /// The widget's allocated size.
    #[inline]
    pub fn size(&self) -> Size {
        self.size
    }
}

/// Class behaviour of a widget.
pub trait Widget: AsAny {
    /// Short class name used in diagnostics, widget paths and templates.
    fn type_name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Instance initialisation, run once right after the widget is inserted
    /// into the tree.
    fn init(&mut self, _tree: &mut WidgetTree, _id: WidgetId) {}

    /// Whether the class holds children.
    fn is_container(&self) -> bool {
        false
    }

    /// Veto a new child before it is parented.
    fn accepts_child(
        &self,
        _tree: &WidgetTree,
        _id: WidgetId,
        _child: WidgetId,
    ) -> Result<(), WidgetError> {
        Ok(())
    }

    /// A child was removed from this widget.
    fn child_removed(&mut self, _child: WidgetId) {}

    /// Which axis is negotiated first.
    fn request_mode(&self, _tree: &WidgetTree, _id: WidgetId) -> SizeRequestMode {
        SizeRequestMode::ConstantSize
    }

    /// Measure one axis. `for_size` is the size of the other axis, or `-1`.
    ///
    /// The result excludes margins; the core adds them.
    fn measure(
        &mut self,
        _tree: &mut WidgetTree,
        _id: WidgetId,
        _orientation: Orientation,
        _for_size: i32,
    ) -> Measurement {
        Measurement::default()
    }

    /// Whether the widget reports and accepts baselines.
    fn has_baseline_support(&self) -> bool {
        false
    }

    /// Adjust a raw request for margins and size overrides.
    fn adjust_size_request(
        &mut self,
        tree: &WidgetTree,
        id: WidgetId,
        orientation: Orientation,
        measurement: &mut Measurement,
    ) {
        tree.default_adjust_size_request(id, orientation, measurement);
    }

    /// Adjust one axis of an allocation for margins and alignment.
    fn adjust_size_allocation(
        &mut self,
        tree: &WidgetTree,
        id: WidgetId,
        orientation: Orientation,
        axis: &mut AxisAllocation,
    ) {
        tree.default_adjust_size_allocation(id, orientation, axis);
    }

    /// Place the native window and allocate children.
    ///
    /// `allocation` is already adjusted and stored.
    fn size_allocate(
        &mut self,
        tree: &mut WidgetTree,
        id: WidgetId,
        allocation: Rect,
        _baseline: i32,
    ) {
        tree.default_size_allocate(id, allocation);
    }

    /// Make the widget visible.
    fn show(&mut self, tree: &mut WidgetTree, id: WidgetId) {
        tree.default_show(id);
    }

    /// Make the widget invisible.
    fn hide(&mut self, tree: &mut WidgetTree, id: WidgetId) {
        tree.default_hide(id);
    }

    /// Create or adopt the native window.
    fn realize(&mut self, tree: &mut WidgetTree, id: WidgetId) -> Result<(), DisplayError> {
        tree.default_realize(id)
    }

    /// Release the native window. Children are already unrealized.
    fn unrealize(&mut self, tree: &mut WidgetTree, id: WidgetId) {
        tree.default_unrealize(id);
    }

    /// Show the native window.
    fn map(&mut self, tree: &mut WidgetTree, id: WidgetId) {
        tree.default_map(id);
    }

    /// Hide the native window.
    fn unmap(&mut self, tree: &mut WidgetTree, id: WidgetId) {
        tree.default_unmap(id);
    }

    /// Paint the widget's own content. Children are painted by the core.
    fn draw(&mut self, _tree: &WidgetTree, _id: WidgetId, _cx: &mut PaintContext<'_>) -> Propagation {
        Propagation::Proceed
    }

    /// Derive `(hexpand, vexpand)` when they are not set explicitly.
    fn compute_expand(&mut self, tree: &mut WidgetTree, id: WidgetId) -> (bool, bool) {
        tree.default_compute_expand(id)
    }

    /// Class handler for the typed event signal.
    fn event(&mut self, _tree: &mut WidgetTree, _id: WidgetId, _event: &Event) -> Propagation {
        Propagation::Proceed
    }

    /// Move keyboard focus into or within the widget.
    ///
    /// Returns `true` if focus ended up on the widget or a descendant.
    fn focus(&mut self, tree: &mut WidgetTree, id: WidgetId, direction: DirectionType) -> bool {
        tree.default_focus(id, direction)
    }

    /// Keyboard navigation could not move on from the widget.
    ///
    /// Returning `true` keeps focus where it is.
    fn keynav_failed(&mut self, tree: &mut WidgetTree, id: WidgetId, direction: DirectionType) -> bool {
        tree.default_keynav_failed(id, direction)
    }

    /// A mnemonic for the widget was pressed. `group_cycling` is set when
    /// several widgets share it.
    ///
    /// By default a unique mnemonic runs [`activate`](Self::activate) and
    /// anything else moves focus to the widget.
    fn mnemonic_activate(&mut self, tree: &mut WidgetTree, id: WidgetId, group_cycling: bool) -> bool {
        if !group_cycling && self.activate(tree, id) {
            return true;
        }
        tree.default_mnemonic_activate(id, group_cycling)
    }

    /// Perform the widget's main action, as a click would.
    ///
    /// Returns `false` if the class has none.
    fn activate(&mut self, _tree: &mut WidgetTree, _id: WidgetId) -> bool {
        false
    }

    /// The resolved text direction changed.
    fn direction_changed(&mut self, tree: &mut WidgetTree, id: WidgetId, _previous: TextDirection) {
        tree.queue_resize(id);
    }

    /// Rectangle a resize root allocates itself during a layout pass, given
    /// its freshly measured minimum and natural sizes.
    fn resize_root_allocation(
        &mut self,
        tree: &mut WidgetTree,
        id: WidgetId,
        _minimum: Size,
        _natural: Size,
    ) -> Rect {
        tree.allocated_rect(id)
    }

    /// Set a class specific property from its builder string form.
    ///
    /// Returns `Ok(false)` if the class has no such property.
    fn set_class_property(
        &mut self,
        _tree: &mut WidgetTree,
        _id: WidgetId,
        _name: &str,
        _value: &str,
    ) -> Result<bool, WidgetError> {
        Ok(false)
    }

    /// Accessibility role of the class.
    fn accessible_role(&self) -> AccessibleRole {
        AccessibleRole::Generic
    }

    /// Build the accessible peer.
    fn create_accessible(&self, role: AccessibleRole) -> Result<AccessiblePeer, AccessibleError> {
        Ok(AccessiblePeer::new(role))
    }

    /// Last call before the instance is dropped.
    fn finalize(&mut self) {}
}

/// Strip the module path and generic arguments from a type name.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;
    impl Widget for Plain {}

    #[test]
    fn default_type_name_is_short() {
        assert_eq!(Plain.type_name(), "Plain");
        assert_eq!(short_type_name("a::b::Thing<c::D>"), "Thing");
    }
}
