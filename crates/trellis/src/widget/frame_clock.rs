//! Per-toplevel frame clocks and tick callbacks.
//!
//! Every realized toplevel owns a [`FrameClock`]. The backend, or a test,
//! drives it with [`WidgetTree::run_frame`], which runs three phases in
//! order:
//!
//! 1. **Update**: the clock's `update` signal. Widgets with tick callbacks
//!    are connected to it and run their callbacks here.
//! 2. **Layout**: queued resize roots of the toplevel are measured, all of
//!    them, and then allocated.
//! 3. **Paint**: damaged native windows of the toplevel are repainted.
//!
//! The clock keeps asking the backend for frames while anything holds it
//! with [`WidgetTree::frame_clock_begin_updating`].

use std::fmt;

use trellis_core::logging::targets;
use trellis_core::{Signal, Size, signal};

use super::flags::WidgetFlags;
use super::tree::lookup;
use super::{FrameClockId, WidgetId, WidgetTree};
use crate::display::NativeWindowId;

/// Identifier of a tick callback, unique within a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickCallbackId(u64);

/// What a tick callback wants after running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickControl {
    /// Run again next frame.
    #[default]
    Continue,
    /// Remove the callback.
    Remove,
}

type TickFn = Box<dyn FnMut(&mut WidgetTree, WidgetId, FrameClockId) -> TickControl>;

pub(crate) struct TickCallback {
    id: TickCallbackId,
    /// Taken out while the callback runs.
    func: Option<TickFn>,
    /// Removed while running; dropped once it returns.
    removed: bool,
}

/// Frame ticker of one toplevel.
pub struct FrameClock {
    toplevel: WidgetId,
    window: NativeWindowId,
    updating: u32,
    frame_counter: u64,
    frame_time: i64,
    /// Emitted once per frame with the frame time in microseconds.
    pub update: Signal<WidgetTree, (FrameClockId, i64)>,
}

impl fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameClock")
            .field("toplevel", &self.toplevel)
            .field("updating", &self.updating)
            .field("frame_counter", &self.frame_counter)
            .field("frame_time", &self.frame_time)
            .finish_non_exhaustive()
    }
}

impl FrameClock {
    pub(crate) fn new(toplevel: WidgetId, window: NativeWindowId) -> Self {
        Self {
            toplevel,
            window,
            updating: 0,
            frame_counter: 0,
            frame_time: 0,
            update: Signal::new(),
        }
    }

    /// The toplevel owning the clock.
    pub fn toplevel(&self) -> WidgetId {
        self.toplevel
    }

    /// The toplevel's native window.
    pub fn window(&self) -> NativeWindowId {
        self.window
    }

    /// Time of the current frame in microseconds.
    pub fn frame_time(&self) -> i64 {
        self.frame_time
    }

    /// Frames run so far.
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    /// Outstanding `begin_updating` calls.
    pub fn updating_count(&self) -> u32 {
        self.updating
    }

    /// Whether the clock keeps requesting frames.
    pub fn is_updating(&self) -> bool {
        self.updating > 0
    }
}

impl WidgetTree {
    // =========================================================================
    // Clocks
    // =========================================================================

    /// The frame clock of the widget's toplevel, once realized.
    pub fn frame_clock(&self, id: WidgetId) -> Option<FrameClockId> {
        let toplevel = self.toplevel(id)?;
        self.nodes.get(toplevel)?.toplevel.as_ref()?.frame_clock
    }

    /// Look up a frame clock.
    pub fn clock(&self, clock: FrameClockId) -> Option<&FrameClock> {
        self.frame_clocks.get(clock)
    }

    /// Mutable access to a frame clock, to connect to its signal.
    pub fn clock_mut(&mut self, clock: FrameClockId) -> Option<&mut FrameClock> {
        self.frame_clocks.get_mut(clock)
    }

    /// Keep the clock requesting frames until the matching
    /// [`frame_clock_end_updating`](Self::frame_clock_end_updating).
    pub fn frame_clock_begin_updating(&mut self, clock: FrameClockId) {
        let Some(c) = self.frame_clocks.get_mut(clock) else {
            return;
        };
        c.updating += 1;
        if c.updating == 1 {
            let window = c.window;
            tracing::trace!(target: targets::FRAME, ?clock, "clock started updating");
            self.display.request_frame(window);
        }
    }

    /// Release one [`frame_clock_begin_updating`](Self::frame_clock_begin_updating).
    pub fn frame_clock_end_updating(&mut self, clock: FrameClockId) {
        let Some(c) = self.frame_clocks.get_mut(clock) else {
            return;
        };
        if c.updating == 0 {
            tracing::warn!(target: targets::FRAME, ?clock, "end_updating without begin_updating");
            return;
        }
        c.updating -= 1;
        if c.updating == 0 {
            tracing::trace!(target: targets::FRAME, ?clock, "clock stopped updating");
        }
    }

    // =========================================================================
    // Tick callbacks
    // =========================================================================

    /// Run `callback` once per frame while the widget is realized.
    ///
    /// A callback added while ticks are being dispatched first runs on the
    /// next frame. The closure is dropped when it returns
    /// [`TickControl::Remove`], when it is removed, or when the widget is
    /// destroyed.
    pub fn add_tick_callback<F>(&mut self, id: WidgetId, callback: F) -> Option<TickCallbackId>
    where
        F: FnMut(&mut WidgetTree, WidgetId, FrameClockId) -> TickControl + 'static,
    {
        let node = lookup(&self.nodes, id)?;
        if node.has(WidgetFlags::IN_DESTRUCTION) {
            return None;
        }
        let tick = TickCallbackId(self.next_tick_id);
        self.next_tick_id += 1;
        let node = self.nodes.get_mut(id)?;
        node.tick_callbacks.push(TickCallback {
            id: tick,
            func: Some(Box::new(callback)),
            removed: false,
        });
        let realized = node.has(WidgetFlags::REALIZED);
        tracing::trace!(target: targets::FRAME, widget = node.type_name, ?tick, "tick callback added");
        if realized {
            self.connect_frame_clock(id);
        }
        Some(tick)
    }

    /// Remove a tick callback. Returns whether it existed.
    pub fn remove_tick_callback(&mut self, id: WidgetId, tick: TickCallbackId) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        let Some(index) = node
            .tick_callbacks
            .iter()
            .position(|t| t.id == tick && !t.removed)
        else {
            return false;
        };
        if node.tick_callbacks[index].func.is_some() {
            node.tick_callbacks.remove(index);
        } else {
            node.tick_callbacks[index].removed = true;
        }
        if !self.has_tick_callbacks(id) {
            self.disconnect_frame_clock(id);
        }
        true
    }

    /// Whether the widget has live tick callbacks.
    pub fn has_tick_callbacks(&self, id: WidgetId) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|n| n.tick_callbacks.iter().any(|t| !t.removed))
    }

    /// Connect the widget's tick callbacks to its toplevel's clock.
    pub(crate) fn connect_frame_clock(&mut self, id: WidgetId) {
        if self.has_flags(id, WidgetFlags::FRAMECLOCK_CONNECTED) || !self.has_tick_callbacks(id) {
            return;
        }
        let Some(clock) = self.frame_clock(id) else {
            return;
        };
        let Some(c) = self.frame_clocks.get_mut(clock) else {
            return;
        };
        let connection = c
            .update
            .connect(move |tree: &mut WidgetTree, args: &(FrameClockId, i64)| {
                tree.run_tick_callbacks(id, args.0);
            });
        if let Some(node) = self.nodes.get_mut(id) {
            node.frame_clock = Some(clock);
            node.tick_connection = Some(connection);
            node.set(WidgetFlags::FRAMECLOCK_CONNECTED, true);
        }
        tracing::trace!(target: targets::FRAME, widget = self.type_name(id).unwrap_or("?"), ?clock, "connected to frame clock");
        self.frame_clock_begin_updating(clock);
    }

    /// Detach the widget from the clock it ticks on.
    pub(crate) fn disconnect_frame_clock(&mut self, id: WidgetId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if !node.has(WidgetFlags::FRAMECLOCK_CONNECTED) {
            return;
        }
        node.set(WidgetFlags::FRAMECLOCK_CONNECTED, false);
        let clock = node.frame_clock.take();
        let connection = node.tick_connection.take();
        let Some(clock) = clock else {
            return;
        };
        // the clock is gone with its toplevel's window
        if let (Some(c), Some(connection)) = (self.frame_clocks.get_mut(clock), connection) {
            c.update.disconnect(connection);
            self.frame_clock_end_updating(clock);
        }
        tracing::trace!(target: targets::FRAME, ?clock, "disconnected from frame clock");
    }

    /// Reattach after the widget moved to another toplevel.
    pub(crate) fn refresh_frame_clock(&mut self, id: WidgetId) {
        let current = self.frame_clock(id);
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let connected = node.has(WidgetFlags::FRAMECLOCK_CONNECTED);
        let realized = node.has(WidgetFlags::REALIZED);
        if connected && (node.frame_clock != current || !realized) {
            self.disconnect_frame_clock(id);
        }
        if realized {
            self.connect_frame_clock(id);
        }
    }

    /// Run the widget's callbacks registered before this call.
    fn run_tick_callbacks(&mut self, id: WidgetId, clock: FrameClockId) {
        let ids: Vec<TickCallbackId> = match self.nodes.get(id) {
            Some(node) => node
                .tick_callbacks
                .iter()
                .filter(|t| !t.removed)
                .map(|t| t.id)
                .collect(),
            None => return,
        };
        for tick in ids {
            let func = self
                .nodes
                .get_mut(id)
                .and_then(|n| n.tick_callbacks.iter_mut().find(|t| t.id == tick))
                .filter(|t| !t.removed)
                .and_then(|t| t.func.take());
            let Some(mut func) = func else {
                continue;
            };
            let control = func(self, id, clock);
            // the widget may be gone now, which drops the closure here
            let Some(node) = self.nodes.get_mut(id) else {
                return;
            };
            let Some(index) = node.tick_callbacks.iter().position(|t| t.id == tick) else {
                continue;
            };
            if control == TickControl::Remove || node.tick_callbacks[index].removed {
                node.tick_callbacks.remove(index);
            } else {
                node.tick_callbacks[index].func = Some(func);
            }
        }
        if !self.has_tick_callbacks(id) {
            self.disconnect_frame_clock(id);
        }
    }

    // =========================================================================
    // Frames
    // =========================================================================

    /// Run one frame of a clock: ticks, then layout, then paint.
    #[tracing::instrument(skip(self), level = "trace")]
    pub fn run_frame(&mut self, clock: FrameClockId, frame_time_us: i64) {
        let Some(c) = self.frame_clocks.get_mut(clock) else {
            tracing::warn!(target: targets::FRAME, ?clock, "frame for an unknown clock");
            return;
        };
        c.frame_counter += 1;
        c.frame_time = frame_time_us;
        let toplevel = c.toplevel;
        let slots = c.update.snapshot();
        tracing::trace!(target: targets::FRAME, frame = c.frame_counter, frame_time_us, "frame");

        signal::emit(self, &slots, &(clock, frame_time_us));
        self.process_resize_queue(Some(toplevel));
        self.paint_toplevel(toplevel);

        if let Some(c) = self.frame_clocks.get(clock) {
            if c.updating > 0 {
                let window = c.window;
                self.display.request_frame(window);
            }
        }
    }

    /// Lay out every queued resize root now, without waiting for a frame.
    pub fn flush_layout(&mut self) {
        self.process_resize_queue(None);
    }

    /// Drain the resize queue, restricted to roots under `toplevel`.
    ///
    /// Every root is measured before any is allocated.
    fn process_resize_queue(&mut self, toplevel: Option<WidgetId>) {
        let queue = std::mem::take(&mut self.resize_queue);
        let (roots, rest): (Vec<_>, Vec<_>) = queue.into_iter().partition(|root| {
            toplevel.is_none_or(|t| self.toplevel(*root) == Some(t))
        });
        self.resize_queue = rest;
        if roots.is_empty() {
            return;
        }
        tracing::trace!(target: targets::LAYOUT, roots = roots.len(), "layout pass");

        let mut measured: Vec<(WidgetId, Size, Size)> = Vec::with_capacity(roots.len());
        for root in roots {
            if !self.nodes.contains_key(root) {
                continue;
            }
            let (minimum, natural) = self.preferred_size(root);
            measured.push((root, minimum, natural));
        }
        for (root, minimum, natural) in measured {
            self.allocate_resize_root(root, minimum, natural);
        }
    }

    /// Measure and allocate a resize root immediately.
    pub(crate) fn layout_resize_root(&mut self, root: WidgetId) {
        self.resize_queue.retain(|r| *r != root);
        if !self.nodes.contains_key(root) {
            return;
        }
        let (minimum, natural) = self.preferred_size(root);
        self.allocate_resize_root(root, minimum, natural);
    }

    fn allocate_resize_root(&mut self, root: WidgetId, minimum: Size, natural: Size) {
        let Some(node) = self.nodes.get(root) else {
            return;
        };
        if !node.has(WidgetFlags::VISIBLE) && !node.is_toplevel() {
            return;
        }
        let allocated = node.allocated_rect;
        let rect = self
            .with_class(root, |class, tree| {
                class.resize_root_allocation(tree, root, minimum, natural)
            })
            .unwrap_or(allocated);
        let baseline = self.allocated_baseline(root);
        self.size_allocate_with_baseline(root, rect, baseline);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use trellis_core::Settings;

    use super::*;
    use crate::display::HeadlessDisplay;
    use crate::widget::widgets::Window;
    use crate::widget::Widget;

    struct Leaf;
    impl Widget for Leaf {}

    fn realized_window() -> (WidgetTree, WidgetId, WidgetId, FrameClockId) {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        let window = tree.create(Window::new());
        let leaf = tree.create(Leaf);
        tree.container_add(window, leaf);
        tree.show_all(window);
        let clock = tree.frame_clock(window).unwrap();
        (tree, window, leaf, clock)
    }

    #[test]
    fn add_then_remove_balances_updating() {
        let (mut tree, _, leaf, clock) = realized_window();
        assert_eq!(tree.clock(clock).unwrap().updating_count(), 0);

        let tick = tree
            .add_tick_callback(leaf, |_, _, _| TickControl::Continue)
            .unwrap();
        assert_eq!(tree.clock(clock).unwrap().updating_count(), 1);
        assert!(tree.has_flags(leaf, WidgetFlags::FRAMECLOCK_CONNECTED));

        assert!(tree.remove_tick_callback(leaf, tick));
        assert_eq!(tree.clock(clock).unwrap().updating_count(), 0);
        assert!(!tree.has_flags(leaf, WidgetFlags::FRAMECLOCK_CONNECTED));
        assert!(!tree.remove_tick_callback(leaf, tick));
    }

    #[test]
    fn callbacks_added_during_dispatch_wait_a_frame() {
        let (mut tree, _, leaf, clock) = realized_window();
        let late_runs = Rc::new(Cell::new(0));
        let added = Rc::new(Cell::new(false));
        {
            let late_runs = late_runs.clone();
            let added = added.clone();
            tree.add_tick_callback(leaf, move |tree, widget, _| {
                if !added.replace(true) {
                    let late_runs = late_runs.clone();
                    tree.add_tick_callback(widget, move |_, _, _| {
                        late_runs.set(late_runs.get() + 1);
                        TickControl::Continue
                    });
                }
                TickControl::Continue
            });
        }
        tree.run_frame(clock, 16_000);
        assert_eq!(late_runs.get(), 0);
        tree.run_frame(clock, 32_000);
        assert_eq!(late_runs.get(), 1);
    }

    #[test]
    fn returning_remove_drops_the_callback() {
        let (mut tree, _, leaf, clock) = realized_window();
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        tree.add_tick_callback(leaf, move |_, _, _| {
            counter.set(counter.get() + 1);
            TickControl::Remove
        });
        tree.run_frame(clock, 16_000);
        tree.run_frame(clock, 32_000);
        assert_eq!(runs.get(), 1);
        assert_eq!(tree.clock(clock).unwrap().updating_count(), 0);
    }

    #[test]
    fn ticks_see_the_frame_time() {
        let (mut tree, _, leaf, clock) = realized_window();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        tree.add_tick_callback(leaf, move |tree, _, clock| {
            log.borrow_mut().push(tree.clock(clock).unwrap().frame_time());
            TickControl::Continue
        });
        tree.run_frame(clock, 1_000);
        tree.run_frame(clock, 2_000);
        assert_eq!(*seen.borrow(), vec![1_000, 2_000]);
        assert_eq!(tree.clock(clock).unwrap().frame_counter(), 2);
    }

    #[test]
    fn unrealized_widgets_connect_on_realize() {
        let mut tree = WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default());
        let window = tree.create(Window::new());
        let leaf = tree.create(Leaf);
        tree.container_add(window, leaf);
        tree.add_tick_callback(leaf, |_, _, _| TickControl::Continue);
        assert!(!tree.has_flags(leaf, WidgetFlags::FRAMECLOCK_CONNECTED));

        tree.show_all(window);
        assert!(tree.has_flags(leaf, WidgetFlags::FRAMECLOCK_CONNECTED));
        tree.unrealize(window);
        assert!(!tree.has_flags(leaf, WidgetFlags::FRAMECLOCK_CONNECTED));
    }

    #[test]
    fn frames_drain_the_resize_queue() {
        let (mut tree, window, leaf, clock) = realized_window();
        tree.queue_resize(leaf);
        assert_eq!(tree.pending_resize_roots(), &[window]);
        tree.run_frame(clock, 16_000);
        assert!(tree.pending_resize_roots().is_empty());
        assert!(!tree.has_flags(leaf, WidgetFlags::ALLOC_NEEDED));
    }
}
