//! Whole-tree scenarios: lifecycle, layout, gesture arbitration, state
//! cascades and destruction working together.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use trellis_core::{LayoutDirection, Rect, Settings};

use super::gesture::{GestureDrag, GestureLongPress};
use super::*;
use crate::display::HeadlessDisplay;

/// Counts WARN events seen while installed.
#[derive(Clone, Default)]
struct WarningCounter(Arc<AtomicUsize>);

impl<S: tracing::Subscriber> Layer<S> for WarningCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub(crate) fn count_warnings<R>(f: impl FnOnce() -> R) -> (R, usize) {
    let counter = WarningCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, counter.0.load(Ordering::SeqCst))
}

/// Leaf that counts how often its class is measured.
#[derive(Default)]
struct MeasureCounter {
    horizontal: Rc<Cell<u32>>,
    vertical: Rc<Cell<u32>>,
}

impl Widget for MeasureCounter {
    fn type_name(&self) -> &'static str {
        "MeasureCounter"
    }

    fn measure(&mut self, _: &mut WidgetTree, _: WidgetId, orientation: Orientation, _: i32) -> Measurement {
        match orientation {
            Orientation::Horizontal => {
                self.horizontal.set(self.horizontal.get() + 1);
                Measurement::new(20, 30)
            }
            Orientation::Vertical => {
                self.vertical.set(self.vertical.get() + 1);
                Measurement::new(10, 15)
            }
        }
    }
}

struct Leaf;

impl Widget for Leaf {}

fn new_tree() -> WidgetTree {
    WidgetTree::new(Box::new(HeadlessDisplay::new()), Settings::default())
}

fn event_log(tree: &mut WidgetTree, id: WidgetId, log: &Rc<RefCell<Vec<(WidgetId, Event)>>>) {
    let log = log.clone();
    if let Some(signals) = tree.signals_mut(id) {
        signals.event.connect(move |_, (widget, event)| {
            log.borrow_mut().push((*widget, event.clone()));
            Propagation::Proceed
        });
    }
}

#[test]
fn realizing_a_window_maps_the_whole_tree() {
    let mut tree = new_tree();
    let window = tree.create(Window::new());
    let column = tree.create(BoxContainer::new(Orientation::Vertical));
    let leaf = tree.create(MeasureCounter::default());
    tree.container_add(window, column);
    tree.container_add(column, leaf);

    tree.show_all(window);
    tree.realize(window);

    for id in [window, column, leaf] {
        assert!(tree.is_realized(id));
        assert!(tree.is_mapped(id));
    }
    assert!(tree.window(window).is_some());
    assert_eq!(tree.window(leaf), tree.window(window));
    assert_eq!(tree.window(column), tree.window(window));
    assert_eq!(tree.allocation(column), tree.allocation(window));
    assert!(tree.allocation(column).contains_rect(&tree.allocation(leaf)));
    assert_eq!(tree.check_invariants(), Vec::new());
}

#[test]
fn repeated_resizes_collapse_into_one_layout_pass() {
    let mut tree = new_tree();
    let window = tree.create(Window::new());
    let column = tree.create(BoxContainer::new(Orientation::Vertical));
    let counter = MeasureCounter::default();
    let (horizontal, vertical) = (counter.horizontal.clone(), counter.vertical.clone());
    let leaf = tree.create(counter);
    tree.container_add(window, column);
    tree.container_add(column, leaf);
    tree.show_all(window);

    let allocations = Rc::new(Cell::new(0));
    let counter = allocations.clone();
    tree.signals_mut(window)
        .unwrap()
        .size_allocate
        .connect(move |_, _| counter.set(counter.get() + 1));
    horizontal.set(0);
    vertical.set(0);

    tree.queue_resize(leaf);
    tree.queue_resize(leaf);
    tree.queue_resize(leaf);
    let clock = tree.frame_clock(window).unwrap();
    tree.run_frame(clock, 16_000);

    assert_eq!(horizontal.get(), 1);
    assert_eq!(vertical.get(), 1);
    assert_eq!(allocations.get(), 1);
    assert!(!tree.flags(leaf).unwrap().contains(WidgetFlags::ALLOC_NEEDED));
}

#[test]
fn a_claiming_drag_denies_the_capture_long_press() {
    let mut tree = new_tree();
    let window = tree.create(Window::new());
    let column = tree.create(BoxContainer::new(Orientation::Vertical));
    let leaf = tree.create(Leaf);
    tree.set_size_request(leaf, 100, 100);
    tree.container_add(window, column);
    tree.container_add(column, leaf);
    tree.show_all(window);

    let press = tree
        .add_controller(column, GestureLongPress::new(), PropagationPhase::Capture)
        .unwrap();
    let drag = tree
        .add_controller(leaf, GestureDrag::new(), PropagationPhase::Bubble)
        .unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    event_log(&mut tree, leaf, &log);
    event_log(&mut tree, column, &log);

    let native = tree.window(window).unwrap();
    let sequence = EventSequence::Touch(1);
    tree.dispatch_event(&Event::touch_begin(1, 10.0, 10.0).with_window(native));
    assert_eq!(tree.sequence_state(press, sequence), SequenceState::None);
    assert!(!tree.handles_sequence(drag, sequence));

    tree.dispatch_event(&Event::touch_update(1, 10.0, 40.0).with_window(native));
    assert_eq!(tree.sequence_state(press, sequence), SequenceState::Denied);
    assert_eq!(tree.sequence_state(drag, sequence), SequenceState::Claimed);

    tree.dispatch_event(&Event::touch_update(1, 10.0, 60.0).with_window(native));
    let log = log.borrow();
    let begins: Vec<&Event> = log
        .iter()
        .filter(|(w, e)| *w == leaf && matches!(e.kind, EventKind::TouchBegin(_)))
        .map(|(_, e)| e)
        .collect();
    assert_eq!(begins.len(), 1);
    assert!(begins[0].send_event);
    assert!(
        !log.iter()
            .any(|(w, e)| *w == column && e.sequence() == Some(sequence))
    );
    assert_eq!(
        tree.controller::<GestureDrag>(drag).and_then(|d| d.offset()),
        Some((0.0, 50.0))
    );
}

#[test]
fn decided_sequences_cannot_change_again() {
    let mut tree = new_tree();
    let window = tree.create(Window::new());
    let leaf = tree.create(Leaf);
    tree.set_size_request(leaf, 50, 50);
    tree.container_add(window, leaf);
    tree.show_all(window);
    let drag = tree
        .add_controller(leaf, GestureDrag::new(), PropagationPhase::Bubble)
        .unwrap();
    let native = tree.window(window).unwrap();
    tree.dispatch_event(&Event::touch_begin(4, 5.0, 5.0).with_window(native));
    let sequence = EventSequence::Touch(4);

    let (denied, warnings) = count_warnings(|| tree.set_sequence_state(drag, sequence, SequenceState::Denied));
    assert!(denied);
    assert_eq!(warnings, 0);

    let (claimed, warnings) = count_warnings(|| tree.set_sequence_state(drag, sequence, SequenceState::Claimed));
    assert!(!claimed);
    assert_eq!(warnings, 1);
    assert_eq!(tree.sequence_state(drag, sequence), SequenceState::Denied);
}

#[test]
fn default_direction_reaches_only_inheriting_widgets() {
    let mut tree = new_tree();
    let root = tree.create(BoxContainer::new(Orientation::Horizontal));
    let mid = tree.create(BoxContainer::new(Orientation::Horizontal));
    let leaf = tree.create(Leaf);
    tree.container_add(root, mid);
    tree.container_add(mid, leaf);
    tree.set_direction(mid, TextDirection::Rtl);

    let changes = Rc::new(RefCell::new(Vec::new()));
    for id in [root, mid, leaf] {
        let changes = changes.clone();
        tree.signals_mut(id)
            .unwrap()
            .direction_changed
            .connect(move |_, (widget, previous)| changes.borrow_mut().push((*widget, *previous)));
    }

    tree.set_default_direction(LayoutDirection::Rtl);
    assert_eq!(*changes.borrow(), vec![(root, TextDirection::Ltr)]);
    assert_eq!(tree.resolved_direction(leaf), TextDirection::Rtl);

    tree.set_default_direction(LayoutDirection::Ltr);
    assert_eq!(
        *changes.borrow(),
        vec![(root, TextDirection::Ltr), (root, TextDirection::Rtl)]
    );
    assert_eq!(tree.resolved_direction(mid), TextDirection::Rtl);
}

#[test]
fn insensitive_containers_take_the_pointer_away() {
    let mut tree = new_tree();
    let window = tree.create(Window::new());
    let column = tree.create(BoxContainer::new(Orientation::Vertical));
    let leaf = tree.create(Leaf);
    tree.set_size_request(leaf, 40, 40);
    tree.container_add(window, column);
    tree.container_add(column, leaf);
    tree.show_all(window);
    let native = tree.window(window).unwrap();

    tree.dispatch_event(&Event::motion(5.0, 5.0).with_window(native));
    let log = Rc::new(RefCell::new(Vec::new()));
    event_log(&mut tree, leaf, &log);
    event_log(&mut tree, column, &log);

    tree.set_sensitive(column, false);
    let leaves: Vec<(WidgetId, NotifyType, CrossingMode)> = log
        .borrow()
        .iter()
        .filter_map(|(w, e)| match &e.kind {
            EventKind::Leave(crossing) => Some((*w, crossing.detail, crossing.mode)),
            _ => None,
        })
        .collect();
    assert_eq!(
        leaves,
        vec![
            (leaf, NotifyType::Ancestor, CrossingMode::StateChanged),
            (column, NotifyType::Virtual, CrossingMode::StateChanged),
        ]
    );
    assert!(!tree.is_sensitive(leaf));

    log.borrow_mut().clear();
    tree.dispatch_event(&Event::button_press(5.0, 5.0, 1).with_window(native));
    assert!(
        !log.borrow()
            .iter()
            .any(|(_, e)| matches!(e.kind, EventKind::ButtonPress(_)))
    );
}

#[test]
fn destroy_with_an_extra_reference_waits_for_the_last_unref() {
    let mut tree = new_tree();
    let parent = tree.create(BoxContainer::new(Orientation::Vertical));
    let widget = tree.create(Leaf);
    let finalized = Rc::new(Cell::new(0));
    let destroyed = Rc::new(Cell::new(0));
    {
        let finalized = finalized.clone();
        let destroyed = destroyed.clone();
        let signals = tree.signals_mut(widget).unwrap();
        signals
            .finalize
            .connect(move |_, _| finalized.set(finalized.get() + 1));
        signals.destroy.connect(move |tree, (id, ())| {
            destroyed.set(destroyed.get() + 1);
            tree.unparent(*id);
        });
    }

    let (_, warnings) = count_warnings(|| {
        tree.container_add(parent, widget);
        assert_eq!(tree.ref_count(widget), 1);
        assert!(!tree.is_floating(widget));
        tree.ref_widget(widget);
        assert_eq!(tree.ref_count(widget), 2);
        tree.container_remove(parent, widget);
        assert_eq!(tree.ref_count(widget), 1);

        tree.destroy(widget);
        tree.destroy(widget);
        assert_eq!(tree.ref_count(widget), 1);
        assert!(tree.in_destruction(widget));
        assert_eq!(finalized.get(), 0);

        tree.unref_widget(widget);
    });

    assert_eq!(warnings, 0);
    assert_eq!(destroyed.get(), 1);
    assert_eq!(finalized.get(), 1);
    assert!(!tree.contains(widget));
    assert!(tree.contains(parent));
}

#[test]
fn undersized_allocations_warn_once_per_call() {
    let mut tree = new_tree();
    let leaf = tree.create(Leaf);
    tree.set_size_request(leaf, 50, 50);
    tree.show(leaf);

    let (_, warnings) = count_warnings(|| tree.size_allocate(leaf, Rect::new(0, 0, 10, 10)));
    assert_eq!(warnings, 1);
    assert_eq!(tree.allocation(leaf), Rect::new(0, 0, 10, 10));

    let (_, warnings) = count_warnings(|| {
        tree.size_allocate(leaf, Rect::new(0, 0, 20, 60));
        tree.size_allocate(leaf, Rect::new(0, 0, 60, 60));
    });
    assert_eq!(warnings, 1);
}

#[test]
fn children_added_to_a_hidden_row_are_allocated_when_it_returns() {
    let mut tree = new_tree();
    let window = tree.create(Window::new());
    let column = tree.create(BoxContainer::new(Orientation::Vertical));
    let row = tree.create(BoxContainer::new(Orientation::Horizontal));
    let other = tree.create(BoxContainer::new(Orientation::Horizontal));
    let leaf = tree.create(Leaf);
    tree.set_size_request(row, -1, 12);
    tree.set_size_request(other, -1, 12);
    tree.set_size_request(leaf, 10, 10);
    tree.container_add(window, column);
    tree.container_add(column, row);
    tree.container_add(column, other);
    tree.container_add(other, leaf);
    tree.show_all(window);
    let clock = tree.frame_clock(window).unwrap();
    tree.run_frame(clock, 16_000);
    let row_allocation = tree.allocation(row);

    tree.hide(row);
    tree.run_frame(clock, 32_000);
    tree.ref_widget(leaf);
    tree.container_remove(other, leaf);
    tree.container_add(row, leaf);
    tree.unref_widget(leaf);
    tree.run_frame(clock, 48_000);

    tree.show(row);
    tree.run_frame(clock, 64_000);
    assert!(tree.is_mapped(leaf));
    assert!(!tree.flags(leaf).unwrap().contains(WidgetFlags::ALLOC_NEEDED));
    assert_eq!(tree.allocation(row), row_allocation);
    assert_eq!(tree.allocation(leaf).height, row_allocation.height);
    assert!(tree.allocation(row).contains_rect(&tree.allocation(leaf)));
    assert_eq!(tree.check_invariants(), Vec::new());
}

#[test]
fn invariants_hold_across_mixed_operations() {
    let mut tree = new_tree();
    let window = tree.create(Window::new());
    let column = tree.create(BoxContainer::new(Orientation::Vertical).with_spacing(2));
    let rows = [
        tree.create(BoxContainer::new(Orientation::Horizontal)),
        tree.create(BoxContainer::new(Orientation::Horizontal).with_homogeneous(true)),
    ];
    tree.container_add(window, column);
    for row in rows {
        // keeps an emptied row inside the column
        tree.set_size_request(row, -1, 12);
        tree.container_add(column, row);
    }
    let leaves: Vec<WidgetId> = (0..6)
        .map(|i| {
            let leaf = tree.create(Leaf);
            tree.set_size_request(leaf, 10 + i, 10);
            tree.container_add(rows[i as usize % 2], leaf);
            leaf
        })
        .collect();
    tree.show_all(window);
    let clock = tree.frame_clock(window).unwrap();

    let mut rng = StdRng::seed_from_u64(0x9e37_79b9_7f4a_7c15);
    let ((), warnings) = count_warnings(|| {
        for step in 0..200i64 {
            let leaf = leaves[rng.gen_range(0..leaves.len())];
            match rng.gen_range(0..5) {
                0 => {
                    let target = if rng.gen_range(0..3) == 0 { rows[rng.gen_range(0..2)] } else { leaf };
                    let visible = tree.is_visible(target);
                    tree.set_visible(target, !visible);
                }
                1 => {
                    let child_visible = tree.child_visible(leaf);
                    tree.set_child_visible(leaf, !child_visible);
                }
                2 => {
                    if let Some(parent) = tree.parent(leaf) {
                        let other = if parent == rows[0] { rows[1] } else { rows[0] };
                        tree.ref_widget(leaf);
                        tree.container_remove(parent, leaf);
                        tree.container_add(other, leaf);
                        tree.unref_widget(leaf);
                    }
                }
                3 => {
                    let sensitive = tree.is_sensitive(leaf);
                    tree.set_sensitive(leaf, !sensitive);
                }
                _ => tree.queue_resize(leaf),
            }
            tree.run_frame(clock, step * 16_000);

            assert_eq!(tree.check_invariants(), Vec::new(), "after step {step}");
            for id in tree.widget_ids() {
                if tree.is_mapped(id) {
                    assert!(
                        !tree.flags(id).unwrap().contains(WidgetFlags::ALLOC_NEEDED),
                        "mapped widget left unallocated after step {step}"
                    );
                }
            }
        }
    });
    assert_eq!(warnings, 0);
    assert_eq!(tree.len(), 10);
    for leaf in leaves {
        assert_eq!(tree.ref_count(leaf), 1);
    }
}
