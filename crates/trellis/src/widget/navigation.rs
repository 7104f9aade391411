//! Keyboard navigation, mnemonics and coordinates between widgets.
//!
//! Focus moves by asking widgets, from the toplevel down, to take focus in
//! a [`DirectionType`]. A container that cannot take focus itself tries its
//! children in an order derived from their allocations: reading order for
//! Tab, distance along the axis for the arrow keys. When nothing further
//! takes focus, Tab wraps around to the start and an arrow key reports
//! `keynav_failed` on the focus widget.
//!
//! Mnemonics are Alt+key bindings kept per toplevel. Several widgets may
//! share a key; repeated presses then cycle through them.

use trellis_core::logging::targets;
use trellis_core::{Rect, signal};

use super::accel::normalize_keyval;
use super::flags::{ModifierType, WidgetFlags};
use super::geometry::TextDirection;
use super::traits::Widget;
use super::tree::{lookup, precondition};
use super::{WidgetId, WidgetTree};
use crate::error::WidgetError;

const KEY_TAB: u32 = 0xff09;
const KEY_ISO_LEFT_TAB: u32 = 0xfe20;
const KEY_LEFT: u32 = 0xff51;
const KEY_UP: u32 = 0xff52;
const KEY_RIGHT: u32 = 0xff53;
const KEY_DOWN: u32 = 0xff54;

/// Direction of a keyboard focus move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectionType {
    /// Next widget in reading order.
    TabForward,
    /// Previous widget in reading order.
    TabBackward,
    /// Up.
    Up,
    /// Down.
    Down,
    /// Left, regardless of text direction.
    Left,
    /// Right, regardless of text direction.
    Right,
}

impl DirectionType {
    /// Whether the move follows reading order rather than geometry.
    pub fn is_tab(self) -> bool {
        matches!(self, Self::TabForward | Self::TabBackward)
    }

    /// The move a key press asks for, if any.
    ///
    /// Shift turns Tab backwards. Arrow keys only navigate without
    /// modifiers.
    pub fn from_key(keyval: u32, state: ModifierType) -> Option<Self> {
        let mods = state & ModifierType::ACCELERATOR;
        match keyval {
            KEY_TAB if mods.contains(ModifierType::SHIFT) => Some(Self::TabBackward),
            KEY_TAB => Some(Self::TabForward),
            KEY_ISO_LEFT_TAB => Some(Self::TabBackward),
            _ if !mods.is_empty() => None,
            KEY_UP => Some(Self::Up),
            KEY_DOWN => Some(Self::Down),
            KEY_LEFT => Some(Self::Left),
            KEY_RIGHT => Some(Self::Right),
            _ => None,
        }
    }
}

fn center(rect: Rect) -> (i32, i32) {
    (rect.x + rect.width / 2, rect.y + rect.height / 2)
}

impl WidgetTree {
    // =========================================================================
    // Focus navigation
    // =========================================================================

    /// Ask the widget to take focus, or to move it among its descendants.
    ///
    /// Invisible and insensitive widgets refuse at once, as do leaves that
    /// cannot focus. Otherwise the class `focus` hook decides. Returns
    /// whether focus ended up on the widget or inside it.
    pub fn child_focus(&mut self, id: WidgetId, direction: DirectionType) -> bool {
        let Some(node) = lookup(&self.nodes, id) else {
            return false;
        };
        if !node.has(WidgetFlags::VISIBLE) || !self.is_sensitive(id) {
            return false;
        }
        if !node.container && !node.has(WidgetFlags::CAN_FOCUS) {
            return false;
        }
        match self.with_class(id, |class, tree| class.focus(tree, id, direction)) {
            Some(moved) => moved,
            None => self.default_focus(id, direction),
        }
    }

    /// Base `focus` behaviour.
    ///
    /// A focusable widget takes focus unless it already holds it. A
    /// container that cannot focus passes the move on to its children,
    /// starting from the one on the path to the current focus.
    pub fn default_focus(&mut self, id: WidgetId, direction: DirectionType) -> bool {
        let Some(node) = self.nodes.get(id) else {
            return false;
        };
        if node.has(WidgetFlags::CAN_FOCUS) {
            if node.has(WidgetFlags::HAS_FOCUS) {
                return false;
            }
            self.grab_focus(id);
            return self.has_focus(id);
        }
        if !node.container {
            return false;
        }
        let focus_child = self.focus_child(id);
        for child in self.focus_order(id, direction, focus_child) {
            if self.child_focus(child, direction) {
                return true;
            }
        }
        false
    }

    /// Drawable children of `id` in the order a move tries them.
    ///
    /// The child already on the focus path comes first so it can move focus
    /// within itself. Tab drops the children before it; the arrow keys keep
    /// only the children whose centre lies beyond it, nearest first.
    fn focus_order(
        &self,
        id: WidgetId,
        direction: DirectionType,
        focus_child: Option<WidgetId>,
    ) -> Vec<WidgetId> {
        let mut children: Vec<(WidgetId, Rect)> = self
            .children(id)
            .iter()
            .copied()
            .filter(|c| self.is_drawable(*c))
            .map(|c| (c, self.allocation(c)))
            .collect();

        if direction.is_tab() {
            let rtl = self.resolved_direction(id) == TextDirection::Rtl;
            children.sort_by_key(|(_, r)| (r.y, if rtl { -r.right() } else { r.x }));
            if direction == DirectionType::TabBackward {
                children.reverse();
            }
            let mut order: Vec<WidgetId> = children.into_iter().map(|(c, _)| c).collect();
            if let Some(start) = focus_child.and_then(|f| order.iter().position(|c| *c == f)) {
                order.drain(..start);
            }
            return order;
        }

        let current = focus_child.and_then(|f| children.iter().find(|(c, _)| *c == f).map(|(_, r)| *r));
        let Some(current) = current else {
            // entering from outside: start at the edge the move comes from
            children.sort_by_key(|(_, r)| match direction {
                DirectionType::Up => (-r.bottom(), r.x),
                DirectionType::Right => (r.x, r.y),
                DirectionType::Left => (-r.right(), r.y),
                _ => (r.y, r.x),
            });
            return children.into_iter().map(|(c, _)| c).collect();
        };

        let (fx, fy) = center(current);
        let mut ahead: Vec<(i32, i32, WidgetId)> = children
            .iter()
            .filter(|(c, _)| Some(*c) != focus_child)
            .filter_map(|(c, r)| {
                let (cx, cy) = center(*r);
                let (along, across) = match direction {
                    DirectionType::Up => (fy - cy, cx - fx),
                    DirectionType::Right => (cx - fx, cy - fy),
                    DirectionType::Left => (fx - cx, cy - fy),
                    _ => (cy - fy, cx - fx),
                };
                (along > 0).then_some((along, across.abs(), *c))
            })
            .collect();
        ahead.sort_by_key(|(along, across, _)| (*along, *across));
        focus_child
            .into_iter()
            .chain(ahead.into_iter().map(|(_, _, c)| c))
            .collect()
    }

    /// Move keyboard focus inside a toplevel, as Tab or an arrow key does.
    ///
    /// Tab wraps around to the first widget once the last one is passed.
    /// An arrow move with nowhere to go is reported to the focus widget
    /// through [`keynav_failed`](Self::keynav_failed). Returns whether
    /// focus moved.
    pub fn move_focus(&mut self, toplevel: WidgetId, direction: DirectionType) -> bool {
        if let Err(err) = self.check_toplevel(toplevel) {
            precondition!(targets::EVENTS, "move_focus", Err::<(), _>(err));
            return false;
        }
        let before = self.focus_widget(toplevel);
        tracing::trace!(target: targets::EVENTS, ?direction, "moving focus");
        if self.child_focus(toplevel, direction) {
            return true;
        }
        if direction.is_tab() {
            if before.is_none() {
                return false;
            }
            self.release_focus(toplevel);
            return self.child_focus(toplevel, direction);
        }
        if let Some(focus) = before {
            self.keynav_failed(focus, direction);
        }
        false
    }

    /// Report that navigation could not leave the widget in `direction`.
    ///
    /// Handlers of the `keynav_failed` signal run first; one returning
    /// [`Propagation::Stop`](super::Propagation::Stop) answers `true`.
    /// Otherwise the class hook decides. Returns `true` if focus should
    /// stay where it is.
    pub fn keynav_failed(&mut self, id: WidgetId, direction: DirectionType) -> bool {
        let Some(node) = lookup(&self.nodes, id) else {
            return false;
        };
        let slots = node.signals.keynav_failed.snapshot();
        if !slots.is_empty()
            && signal::emit_until(self, &slots, &(id, direction), |r| r.is_stop()).is_some()
        {
            return true;
        }
        match self.with_class(id, |class, tree| class.keynav_failed(tree, id, direction)) {
            Some(stay) => stay,
            None => self.default_keynav_failed(id, direction),
        }
    }

    /// Base `keynav_failed`: Tab lets the move go on elsewhere; an arrow
    /// key rings the error bell and keeps focus.
    pub fn default_keynav_failed(&mut self, id: WidgetId, direction: DirectionType) -> bool {
        if direction.is_tab() {
            return false;
        }
        self.error_bell(id);
        true
    }

    // =========================================================================
    // Mnemonics
    // =========================================================================

    /// Bind Alt+`keyval` in the toplevel to `target`.
    pub fn add_mnemonic(&mut self, toplevel: WidgetId, keyval: u32, target: WidgetId) {
        if let Err(err) = self.check_toplevel(toplevel) {
            precondition!(targets::EVENTS, "add_mnemonic", Err::<(), _>(err));
            return;
        }
        let Some(data) = self.nodes.get_mut(toplevel).and_then(|n| n.toplevel.as_mut()) else {
            return;
        };
        let list = data.mnemonics.entry(normalize_keyval(keyval)).or_default();
        if !list.contains(&target) {
            list.push(target);
        }
    }

    /// Undo [`add_mnemonic`](Self::add_mnemonic).
    pub fn remove_mnemonic(&mut self, toplevel: WidgetId, keyval: u32, target: WidgetId) {
        let Some(data) = self.nodes.get_mut(toplevel).and_then(|n| n.toplevel.as_mut()) else {
            return;
        };
        let keyval = normalize_keyval(keyval);
        if let Some(list) = data.mnemonics.get_mut(&keyval) {
            list.retain(|w| *w != target);
            if list.is_empty() {
                data.mnemonics.remove(&keyval);
            }
        }
    }

    /// Live widgets bound to Alt+`keyval` in the toplevel.
    pub fn mnemonic_targets(&self, toplevel: WidgetId, keyval: u32) -> Vec<WidgetId> {
        self.nodes
            .get(toplevel)
            .and_then(|n| n.toplevel.as_ref())
            .and_then(|d| d.mnemonics.get(&normalize_keyval(keyval)))
            .map_or_else(Vec::new, |list| {
                list.iter()
                    .copied()
                    .filter(|w| self.nodes.contains_key(*w))
                    .collect()
            })
    }

    /// Activate the widget bound to Alt+`keyval`, as a key press does.
    ///
    /// Only drawable, sensitive targets take part. When several share the
    /// key, the one after the focus widget is chosen and activated with
    /// `group_cycling` set, so repeated presses walk through them. Returns
    /// `false` if no target took the key.
    pub fn activate_mnemonic(&mut self, toplevel: WidgetId, keyval: u32) -> bool {
        let candidates: Vec<WidgetId> = self
            .mnemonic_targets(toplevel, keyval)
            .into_iter()
            .filter(|w| self.is_drawable(*w) && self.is_sensitive(*w))
            .collect();
        let Some(&first) = candidates.first() else {
            return false;
        };
        let overloaded = candidates.len() > 1;
        let chosen = candidates
            .iter()
            .position(|w| self.is_focus(*w))
            .and_then(|i| candidates.get(i + 1))
            .copied()
            .unwrap_or(first);
        tracing::debug!(
            target: targets::EVENTS,
            widget = self.type_name(chosen).unwrap_or("?"),
            overloaded,
            "mnemonic activated"
        );
        self.mnemonic_activate(chosen, overloaded)
    }

    /// Deliver a mnemonic to the widget.
    ///
    /// An insensitive widget swallows it. Otherwise handlers of the
    /// `mnemonic_activate` signal run, then the class hook. Returns whether
    /// the mnemonic was handled.
    pub fn mnemonic_activate(&mut self, id: WidgetId, group_cycling: bool) -> bool {
        let Some(node) = lookup(&self.nodes, id) else {
            return false;
        };
        let slots = node.signals.mnemonic_activate.snapshot();
        if !self.is_sensitive(id) {
            return true;
        }
        if !slots.is_empty()
            && signal::emit_until(self, &slots, &(id, group_cycling), |r| r.is_stop()).is_some()
        {
            return true;
        }
        match self.with_class(id, |class, tree| class.mnemonic_activate(tree, id, group_cycling)) {
            Some(handled) => handled,
            None => self.default_mnemonic_activate(id, group_cycling),
        }
    }

    /// Base `mnemonic_activate` for when the class action did not apply:
    /// focus the widget, or ring the error bell if it cannot focus.
    pub fn default_mnemonic_activate(&mut self, id: WidgetId, _group_cycling: bool) -> bool {
        if self.can_focus(id) {
            self.grab_focus(id);
        } else {
            tracing::warn!(
                target: targets::EVENTS,
                widget = self.type_name(id).unwrap_or("?"),
                "widget cannot be activated by a mnemonic"
            );
            self.error_bell(id);
        }
        true
    }

    /// Run the widget's main action. Returns `false` if it has none.
    pub fn activate(&mut self, id: WidgetId) -> bool {
        if !self.is_sensitive(id) {
            return false;
        }
        self.with_class(id, |class, tree| class.activate(tree, id))
            .unwrap_or(false)
    }

    fn check_toplevel(&self, id: WidgetId) -> Result<(), WidgetError> {
        let node = self.nodes.get(id).ok_or(WidgetError::InvalidWidget(id))?;
        if node.is_toplevel() {
            Ok(())
        } else {
            Err(WidgetError::NotAToplevel(node.type_name))
        }
    }

    // =========================================================================
    // Coordinates and ancestry
    // =========================================================================

    /// Translate a point relative to `src`'s allocation into one relative
    /// to `dest`'s allocation.
    ///
    /// Returns `None` if the widgets are not in the same tree.
    pub fn translate_coordinates(
        &self,
        src: WidgetId,
        dest: WidgetId,
        x: i32,
        y: i32,
    ) -> Option<(i32, i32)> {
        if self.root(src)? != self.root(dest)? {
            tracing::debug!(target: targets::LAYOUT, "widgets in different trees");
            return None;
        }
        let (sx, sy) = self.origin_in_root(src)?;
        let (dx, dy) = self.origin_in_root(dest)?;
        Some((x + sx - dx, y + sy - dy))
    }

    /// Origin of the widget in the root's coordinate space.
    ///
    /// Allocations are relative to the enclosing native window, so the
    /// origins of window-owning ancestors below the root add up.
    fn origin_in_root(&self, id: WidgetId) -> Option<(i32, i32)> {
        let node = self.nodes.get(id)?;
        let Some(mut parent) = node.parent else {
            return Some((0, 0));
        };
        let origin = node.allocation.origin();
        let (mut x, mut y) = (origin.x, origin.y);
        loop {
            let up = self.nodes.get(parent)?;
            let Some(next) = up.parent else {
                return Some((x, y));
            };
            if up.has_window() {
                x += up.allocation.x;
                y += up.allocation.y;
            }
            parent = next;
        }
    }

    /// The nearest widget at or above `id` whose class is `T`.
    pub fn ancestor<T: Widget>(&self, id: WidgetId) -> Option<WidgetId> {
        let wanted = std::any::TypeId::of::<T>();
        let mut current = Some(id);
        while let Some(widget) = current {
            let node = self.nodes.get(widget)?;
            if node.class_type == wanted {
                return Some(widget);
            }
            current = node.parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use trellis_core::Settings;

    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::widget::events::{Event, Propagation};
    use crate::widget::tests::count_warnings;
    use crate::widget::widgets::{BoxContainer, Window};
    use crate::widget::Orientation;

    struct Entry;
    impl Widget for Entry {
        fn init(&mut self, tree: &mut WidgetTree, id: WidgetId) {
            tree.set_can_focus(id, true);
            tree.set_size_request(id, 20, 20);
        }
    }

    struct Button(Rc<Cell<u32>>);
    impl Widget for Button {
        fn init(&mut self, tree: &mut WidgetTree, id: WidgetId) {
            tree.set_size_request(id, 20, 20);
        }

        fn activate(&mut self, _: &mut WidgetTree, _: WidgetId) -> bool {
            self.0.set(self.0.get() + 1);
            true
        }
    }

    struct Form {
        tree: WidgetTree,
        display: HeadlessDisplay,
        window: WidgetId,
        row: WidgetId,
        entries: [WidgetId; 3],
    }

    fn form() -> Form {
        let display = HeadlessDisplay::new();
        let mut tree = WidgetTree::new(Box::new(display.clone()), Settings::default());
        let window = tree.create(Window::new());
        let row = tree.create(BoxContainer::new(Orientation::Horizontal));
        tree.container_add(window, row);
        let entries = [tree.create(Entry), tree.create(Entry), tree.create(Entry)];
        for entry in entries {
            tree.container_add(row, entry);
        }
        tree.show_all(window);
        Form {
            tree,
            display,
            window,
            row,
            entries,
        }
    }

    #[test]
    fn tab_walks_reading_order_and_wraps() {
        let Form {
            mut tree,
            window,
            entries: [a, b, c],
            ..
        } = form();
        let mut visited = Vec::new();
        for _ in 0..4 {
            assert!(tree.move_focus(window, DirectionType::TabForward));
            visited.push(tree.focus_widget(window));
        }
        assert_eq!(visited, vec![Some(a), Some(b), Some(c), Some(a)]);

        assert!(tree.move_focus(window, DirectionType::TabBackward));
        assert_eq!(tree.focus_widget(window), Some(c));
    }

    #[test]
    fn tab_key_presses_reach_the_window() {
        let Form {
            mut tree,
            window,
            entries: [a, b, _],
            ..
        } = form();
        let native = tree.window(window).unwrap();
        let tab = Event::key_press(KEY_TAB, ModifierType::empty()).with_window(native);
        assert_eq!(tree.dispatch_event(&tab), Propagation::Stop);
        assert_eq!(tree.focus_widget(window), Some(a));
        tree.dispatch_event(&tab);
        assert_eq!(tree.focus_widget(window), Some(b));

        let back = Event::key_press(KEY_TAB, ModifierType::SHIFT).with_window(native);
        tree.dispatch_event(&back);
        assert_eq!(tree.focus_widget(window), Some(a));
    }

    #[test]
    fn right_to_left_rows_tab_from_the_right() {
        let Form {
            mut tree,
            window,
            row,
            entries: [a, b, c],
            ..
        } = form();
        tree.set_direction(row, TextDirection::Rtl);
        let clock = tree.frame_clock(window).unwrap();
        tree.run_frame(clock, 16_000);
        assert!(tree.allocation(a).x > tree.allocation(c).x);

        tree.move_focus(window, DirectionType::TabForward);
        assert_eq!(tree.focus_widget(window), Some(a));
        tree.move_focus(window, DirectionType::TabForward);
        assert_eq!(tree.focus_widget(window), Some(b));
    }

    #[test]
    fn arrows_move_to_the_nearest_widget_beyond() {
        let Form {
            mut tree,
            display,
            window,
            entries: [a, b, _],
            ..
        } = form();
        tree.grab_focus(a);
        assert!(tree.move_focus(window, DirectionType::Right));
        assert_eq!(tree.focus_widget(window), Some(b));
        assert!(tree.move_focus(window, DirectionType::Left));
        assert_eq!(tree.focus_widget(window), Some(a));

        // nothing to the left of the first entry
        assert!(!tree.move_focus(window, DirectionType::Left));
        assert_eq!(tree.focus_widget(window), Some(a));
        assert_eq!(display.beeps(), 1);
        assert!(!tree.move_focus(window, DirectionType::Up));
        assert_eq!(display.beeps(), 2);
    }

    #[test]
    fn keynav_failed_handlers_can_take_over() {
        let Form {
            mut tree,
            display,
            window,
            entries: [a, _, c],
            ..
        } = form();
        tree.grab_focus(a);
        tree.signals_mut(a)
            .unwrap()
            .keynav_failed
            .connect(move |tree, (_, direction)| {
                // wrap around instead of beeping
                if *direction == DirectionType::Left {
                    tree.grab_focus(c);
                }
                Propagation::Stop
            });
        tree.move_focus(window, DirectionType::Left);
        assert_eq!(tree.focus_widget(window), Some(c));
        assert_eq!(display.beeps(), 0);
    }

    #[test]
    fn child_focus_skips_hidden_and_insensitive_widgets() {
        let Form {
            mut tree,
            window,
            entries: [a, b, c],
            ..
        } = form();
        tree.hide(a);
        tree.set_sensitive(b, false);
        assert!(!tree.child_focus(a, DirectionType::TabForward));
        assert!(!tree.child_focus(b, DirectionType::TabForward));
        assert!(tree.move_focus(window, DirectionType::TabForward));
        assert_eq!(tree.focus_widget(window), Some(c));
    }

    #[test]
    fn move_focus_wants_a_toplevel() {
        let Form { mut tree, row, .. } = form();
        let (moved, warnings) = count_warnings(|| tree.move_focus(row, DirectionType::TabForward));
        assert!(!moved);
        assert_eq!(warnings, 1);
    }

    #[test]
    fn mnemonics_activate_or_focus_their_target() {
        let Form {
            mut tree,
            display,
            window,
            row,
            entries: [a, _, _],
            ..
        } = form();
        let clicks = Rc::new(Cell::new(0));
        let button = tree.create(Button(clicks.clone()));
        tree.container_add(row, button);
        tree.show(button);
        tree.add_mnemonic(window, u32::from('o'), button);
        tree.add_mnemonic(window, u32::from('n'), a);

        let native = tree.window(window).unwrap();
        // upper case keyvals match too
        let alt_o = Event::key_press(u32::from('O'), ModifierType::ALT).with_window(native);
        assert_eq!(tree.dispatch_event(&alt_o), Propagation::Stop);
        assert_eq!(clicks.get(), 1);

        assert!(tree.activate_mnemonic(window, u32::from('n')));
        assert_eq!(tree.focus_widget(window), Some(a));

        // no Alt, no mnemonic
        tree.dispatch_event(&Event::key_press(u32::from('o'), ModifierType::empty()).with_window(native));
        assert_eq!(clicks.get(), 1);

        tree.remove_mnemonic(window, u32::from('o'), button);
        assert!(!tree.activate_mnemonic(window, u32::from('o')));
        assert_eq!(display.beeps(), 0);
    }

    #[test]
    fn shared_mnemonics_cycle_through_their_targets() {
        let Form {
            mut tree,
            window,
            entries: [a, b, c],
            ..
        } = form();
        for entry in [a, b, c] {
            tree.add_mnemonic(window, u32::from('x'), entry);
        }
        let cycling = Rc::new(Cell::new(false));
        let seen = cycling.clone();
        tree.signals_mut(b).unwrap().mnemonic_activate.connect(move |_, (_, group_cycling)| {
            seen.set(*group_cycling);
            Propagation::Proceed
        });

        let mut visited = Vec::new();
        for _ in 0..4 {
            assert!(tree.activate_mnemonic(window, u32::from('x')));
            visited.push(tree.focus_widget(window));
        }
        assert_eq!(visited, vec![Some(a), Some(b), Some(c), Some(a)]);
        assert!(cycling.get());
    }

    #[test]
    fn mnemonics_on_unfocusable_widgets_ring_the_bell() {
        let Form {
            mut tree,
            display,
            window,
            row,
            ..
        } = form();
        tree.add_mnemonic(window, u32::from('r'), row);
        let (handled, warnings) = count_warnings(|| tree.activate_mnemonic(window, u32::from('r')));
        assert!(handled);
        assert_eq!(warnings, 1);
        assert_eq!(display.beeps(), 1);
    }

    #[test]
    fn insensitive_widgets_swallow_mnemonics() {
        let Form {
            mut tree,
            window,
            entries: [a, _, _],
            ..
        } = form();
        tree.set_sensitive(a, false);
        assert!(tree.mnemonic_activate(a, false));
        assert_eq!(tree.focus_widget(window), None);
    }

    #[test]
    fn coordinates_translate_between_siblings_and_ancestors() {
        let Form {
            tree,
            window,
            entries: [a, b, _],
            ..
        } = form();
        let dx = tree.allocation(b).x - tree.allocation(a).x;
        assert!(dx >= 20);
        assert_eq!(tree.translate_coordinates(a, b, 5, 5), Some((5 - dx, 5)));
        assert_eq!(
            tree.translate_coordinates(b, window, 1, 2),
            Some((tree.allocation(b).x + 1, tree.allocation(b).y + 2))
        );
        assert_eq!(tree.translate_coordinates(window, window, 3, 4), Some((3, 4)));
    }

    #[test]
    fn unrelated_trees_have_no_common_coordinates() {
        let Form { mut tree, entries: [a, _, _], .. } = form();
        let loose = tree.create(Entry);
        assert_eq!(tree.translate_coordinates(a, loose, 0, 0), None);
    }

    #[test]
    fn ancestor_finds_the_nearest_class_including_itself() {
        let Form {
            tree,
            window,
            row,
            entries: [a, _, _],
            ..
        } = form();
        assert_eq!(tree.ancestor::<BoxContainer>(a), Some(row));
        assert_eq!(tree.ancestor::<Window>(a), Some(window));
        assert_eq!(tree.ancestor::<Entry>(a), Some(a));
        assert_eq!(tree.ancestor::<Button>(a), None);
    }

    #[test]
    fn keys_map_to_directions() {
        assert_eq!(DirectionType::from_key(KEY_TAB, ModifierType::empty()), Some(DirectionType::TabForward));
        assert_eq!(DirectionType::from_key(KEY_ISO_LEFT_TAB, ModifierType::SHIFT), Some(DirectionType::TabBackward));
        assert_eq!(DirectionType::from_key(KEY_DOWN, ModifierType::empty()), Some(DirectionType::Down));
        assert_eq!(DirectionType::from_key(KEY_DOWN, ModifierType::CONTROL), None);
        assert_eq!(DirectionType::from_key(u32::from('a'), ModifierType::empty()), None);
    }
}
